//! Packaging, upload and Lambda reconciliation for `publish-lambda`.
//!
//! This crate owns the integration details (pip, zip, S3, Lambda) and the
//! pipeline that strings them together. Declarations, manifests and planning
//! come from `publish_lambda_core`.

pub mod adapters;
pub mod config;
pub mod error;
pub mod exit_code;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod stages;
