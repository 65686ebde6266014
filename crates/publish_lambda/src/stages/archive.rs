use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use publish_lambda_core::fingerprint::code_sha256;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::PackagingError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub code_sha256: String,
    pub entries: usize,
}

/// Zips every file under `staging_dir` into `archive_path`.
///
/// Entries are written in sorted order with a fixed timestamp and normalised
/// permissions, so identical staging trees give identical archives.
pub fn archive_staging(staging_dir: &Path, archive_path: &Path) -> Result<Archive, PackagingError> {
    if !staging_dir.is_dir() {
        return Err(PackagingError::MissingStaging(staging_dir.to_path_buf()));
    }

    let io_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source| PackagingError::Io { path, source }
    };

    if archive_path.exists() {
        fs::remove_file(archive_path).map_err(io_error(archive_path))?;
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(staging_dir)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry);
        }
    }
    if files.is_empty() {
        return Err(PackagingError::EmptyStaging(staging_dir.to_path_buf()));
    }

    let file = File::create(archive_path).map_err(io_error(archive_path))?;
    let mut zip = ZipWriter::new(file);
    let base_options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    for entry in &files {
        let name = entry_name(staging_dir, entry.path());
        let metadata = entry.metadata()?;
        zip.start_file(name, base_options.unix_permissions(normalized_mode(&metadata)))?;
        let mut source = File::open(entry.path()).map_err(io_error(entry.path()))?;
        io::copy(&mut source, &mut zip).map_err(io_error(entry.path()))?;
    }
    zip.finish()?;

    let bytes = fs::read(archive_path).map_err(io_error(archive_path))?;
    let archive = Archive {
        path: archive_path.to_path_buf(),
        code_sha256: code_sha256(&bytes),
        entries: files.len(),
        bytes,
    };
    tracing::info!(
        archive = %archive.path.display(),
        entries = archive.entries,
        size_bytes = archive.bytes.len(),
        code_sha256 = %archive.code_sha256,
        "archive written"
    );
    Ok(archive)
}

fn entry_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn normalized_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    if metadata.permissions().mode() & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}

#[cfg(not(unix))]
fn normalized_mode(_metadata: &fs::Metadata) -> u32 {
    0o644
}
