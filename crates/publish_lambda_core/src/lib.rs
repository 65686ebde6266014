//! Shared publishing domain primitives.
//!
//! This crate owns function declarations, manifest parsing, storage keys and
//! reconciliation planning. It excludes the AWS SDK, pip and filesystem
//! packaging concerns, which live in `publish_lambda`.

pub mod declaration;
pub mod fingerprint;
pub mod manifest;
pub mod plan;
pub mod storage_keys;
