use std::fs;
use std::path::{Path, PathBuf};

use publish_lambda_core::storage_keys::STAGING_DIR_NAME;

use crate::adapters::installer::PackageInstaller;
use crate::error::BuildError;

pub const PROJECT_DESCRIPTORS: [&str; 2] = ["setup.py", "pyproject.toml"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltProject {
    pub project_dir: PathBuf,
    pub staging_dir: PathBuf,
}

/// Installs the project and every extra requirement into a fresh
/// `<project>/lambda` staging directory.
pub fn build_project(
    project_dir: &Path,
    requirements: &[String],
    installer: &dyn PackageInstaller,
) -> Result<BuiltProject, BuildError> {
    let project_dir = fs::canonicalize(project_dir)
        .map_err(|_| BuildError::MissingProject(project_dir.to_path_buf()))?;
    if !project_dir.is_dir() {
        return Err(BuildError::MissingProject(project_dir));
    }

    if !PROJECT_DESCRIPTORS
        .iter()
        .any(|descriptor| project_dir.join(descriptor).is_file())
    {
        return Err(BuildError::MissingDescriptor(project_dir));
    }

    let staging_dir = project_dir.join(STAGING_DIR_NAME);
    reset_directory(&staging_dir)?;

    tracing::info!(
        project = %project_dir.display(),
        staging = %staging_dir.display(),
        requirements = requirements.len(),
        "installing project into staging directory"
    );
    installer.install(&project_dir, ".", &staging_dir)?;

    for requirement in requirements {
        let requirement = requirement.trim();
        if requirement.is_empty() {
            continue;
        }
        tracing::info!(requirement, "installing extra requirement");
        installer.install(&project_dir, requirement, &staging_dir)?;
    }

    Ok(BuiltProject {
        project_dir,
        staging_dir,
    })
}

fn reset_directory(path: &Path) -> Result<(), BuildError> {
    let staging_error = |source| BuildError::Staging {
        path: path.to_path_buf(),
        source,
    };
    if path.exists() {
        fs::remove_dir_all(path).map_err(staging_error)?;
    }
    fs::create_dir_all(path).map_err(staging_error)
}
