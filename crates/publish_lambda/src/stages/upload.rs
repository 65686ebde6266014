use publish_lambda_core::storage_keys::CodeLocation;

use crate::adapters::object_store::ArchiveStore;
use crate::error::UploadError;
use crate::stages::archive::Archive;

/// Puts the archive under `key`. There is no retry: a failure aborts the
/// publish.
pub fn upload_archive(
    archive: &Archive,
    bucket: &str,
    key: &str,
    store: &dyn ArchiveStore,
) -> Result<CodeLocation, UploadError> {
    tracing::info!(
        bucket,
        key,
        size_bytes = archive.bytes.len(),
        "uploading archive"
    );
    store
        .put_object(bucket, key, &archive.bytes)
        .map_err(|message| UploadError {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        })?;

    Ok(CodeLocation {
        bucket: bucket.to_string(),
        key: key.to_string(),
        code_sha256: archive.code_sha256.clone(),
    })
}
