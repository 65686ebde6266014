use serde::{Deserialize, Serialize};

pub const STAGING_DIR_NAME: &str = "lambda";
pub const ARCHIVE_FILE_NAME: &str = "lambda.zip";

/// Where the uploaded archive lives, handed to the function service as the
/// code source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeLocation {
    pub bucket: String,
    pub key: String,
    pub code_sha256: String,
}

/// The archive is keyed by the module name, optionally under a prefix.
pub fn archive_object_key(prefix: Option<&str>, module: &str) -> String {
    match prefix.map(|value| value.trim_matches('/')) {
        Some(trimmed) if !trimmed.is_empty() => format!("{trimmed}/{module}"),
        _ => module.to_string(),
    }
}
