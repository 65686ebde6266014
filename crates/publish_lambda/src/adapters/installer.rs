use std::path::Path;
use std::process::Command;

use crate::error::BuildError;

pub trait PackageInstaller {
    /// Installs `target` (a local path or a requirement specifier) into
    /// `staging`, running from `project_dir`.
    fn install(&self, project_dir: &Path, target: &str, staging: &Path) -> Result<(), BuildError>;
}

/// Runs `<python> -m pip install --target <staging> <target>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipInstaller {
    python: String,
}

impl PipInstaller {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }

    fn command(&self, project_dir: &Path, target: &str, staging: &Path) -> Command {
        let mut command = Command::new(&self.python);
        command
            .current_dir(project_dir)
            .env("PIP_DISABLE_PIP_VERSION_CHECK", "1")
            .env("PIP_NO_INPUT", "1")
            .env("PIP_PROGRESS_BAR", "off")
            .args(["-m", "pip", "install", "--upgrade", "--target"])
            .arg(staging)
            .arg(target);
        command
    }
}

impl PackageInstaller for PipInstaller {
    fn install(&self, project_dir: &Path, target: &str, staging: &Path) -> Result<(), BuildError> {
        tracing::debug!(
            python = %self.python,
            install_target = target,
            staging = %staging.display(),
            "running pip install"
        );
        let output = self
            .command(project_dir, target, staging)
            .output()
            .map_err(|error| BuildError::Spawn {
                target: target.to_string(),
                message: format!("`{} -m pip` could not be started: {error}", self.python),
            })?;

        if !output.status.success() {
            return Err(BuildError::InstallFailed {
                target: target.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
