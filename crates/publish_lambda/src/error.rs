//! Error types for the publish pipeline.
//!
//! Build, packaging, upload and listing failures are fatal and abort the
//! publish. [`FunctionSyncError`] is per function and only ever collected into
//! a [`crate::stages::sync::SyncReport`].

use std::path::PathBuf;

use publish_lambda_core::manifest::ManifestError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from materialising the project into the staging directory.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("project directory not found: {}", .0.display())]
    MissingProject(PathBuf),

    #[error("no setup.py or pyproject.toml found in {}", .0.display())]
    MissingDescriptor(PathBuf),

    #[error("failed to prepare staging directory {}: {source}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run installer for {target}: {message}")]
    Spawn { target: String, message: String },

    #[error("installing {target} failed ({status}): {stderr}")]
    InstallFailed {
        target: String,
        status: String,
        stderr: String,
    },
}

/// Errors from compressing the staging directory.
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("staging directory not found: {}", .0.display())]
    MissingStaging(PathBuf),

    #[error("staging directory is empty: {}", .0.display())]
    EmptyStaging(PathBuf),

    #[error("archive i/o failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk staging directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to write zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Debug, Error)]
#[error("failed to upload archive to s3://{bucket}/{key}: {message}")]
pub struct UploadError {
    pub bucket: String,
    pub key: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Create,
    UpdateConfiguration,
    UpdateCode,
    Delete,
    Unchanged,
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::UpdateConfiguration => write!(f, "update-configuration"),
            Self::UpdateCode => write!(f, "update-code"),
            Self::Delete => write!(f, "delete"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{action} of function {function} failed: {message}")]
pub struct FunctionSyncError {
    pub function: String,
    pub action: SyncAction,
    pub message: String,
}

/// Fatal publish failures.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    #[error("packaging failed: {0}")]
    Packaging(#[from] PackagingError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("failed to list remote functions: {0}")]
    ListFunctions(String),
}
