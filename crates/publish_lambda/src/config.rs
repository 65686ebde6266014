use std::path::PathBuf;

use clap::{ArgAction, Parser};
use publish_lambda_core::declaration::{validate_module_name, ValidationError};
use publish_lambda_core::manifest::DEFAULT_MANIFEST_FILE;
use publish_lambda_core::plan::UpdatePolicy;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(
    name = "publish-lambda",
    about = "Publish a Python module as a set of AWS Lambda functions",
    long_about = "Packages a Python project with pip, uploads the archive to S3 and\n\
                  creates, updates or deletes the Lambda functions declared for a module.",
    version
)]
pub struct PublishArgs {
    /// Dotted name of a Python module whose functions are published; repeat
    /// or comma-separate to publish several modules from one archive
    #[arg(
        long = "module",
        env = "PUBLISH_LAMBDA_MODULE",
        value_delimiter = ',',
        required = true
    )]
    pub modules: Vec<String>,
    /// S3 bucket receiving the code archive
    #[arg(long, env = "PUBLISH_LAMBDA_BUCKET")]
    pub bucket: String,
    /// Extra requirement names bundled beyond the project's own dependencies
    #[arg(long, env = "PUBLISH_LAMBDA_REQUIREMENTS", value_delimiter = ',')]
    pub requirements: Vec<String>,
    /// Root directory of the project to package
    #[arg(long, env = "PUBLISH_LAMBDA_DIR", default_value = ".")]
    pub dir: PathBuf,
    /// Function manifest (defaults to `<dir>/lambda.toml`)
    #[arg(long, env = "PUBLISH_LAMBDA_MANIFEST")]
    pub manifest: Option<PathBuf>,
    /// AWS region; the SDK default chain applies when unset
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,
    /// Prefix for the archive object key
    #[arg(long, env = "PUBLISH_LAMBDA_KEY_PREFIX")]
    pub key_prefix: Option<String>,
    /// Python interpreter used to run pip
    #[arg(long, env = "PUBLISH_LAMBDA_PYTHON", default_value = "python3")]
    pub python: String,
    /// Build and plan without uploading or changing any function
    #[arg(long)]
    pub dry_run: bool,
    /// Only push configuration or code that differs from the deployed function
    #[arg(long)]
    pub skip_unchanged: bool,
    /// Write a JSON run report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--{0} cannot be empty")]
    EmptyField(&'static str),

    #[error("invalid --module: {0}")]
    InvalidModule(#[from] ValidationError),

    #[error("manifest not found: {}", .0.display())]
    MissingManifest(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishConfig {
    pub project_dir: PathBuf,
    pub modules: Vec<String>,
    pub bucket: String,
    pub requirements: Vec<String>,
    pub manifest_path: PathBuf,
    pub region: Option<String>,
    pub key_prefix: Option<String>,
    pub python: String,
    pub dry_run: bool,
    pub policy: UpdatePolicy,
    pub report_path: Option<PathBuf>,
}

impl PublishArgs {
    /// Validates the arguments. The manifest must exist on disk.
    pub fn into_config(self) -> Result<PublishConfig, ConfigError> {
        let mut modules: Vec<String> = Vec::new();
        for module in &self.modules {
            let module = module.trim();
            if module.is_empty() {
                continue;
            }
            validate_module_name(module)?;
            if !modules.iter().any(|seen| seen == module) {
                modules.push(module.to_string());
            }
        }
        if modules.is_empty() {
            return Err(ConfigError::EmptyField("module"));
        }

        let bucket = self.bucket.trim().to_string();
        if bucket.is_empty() {
            return Err(ConfigError::EmptyField("bucket"));
        }

        let python = self.python.trim().to_string();
        if python.is_empty() {
            return Err(ConfigError::EmptyField("python"));
        }

        let manifest_path = self
            .manifest
            .unwrap_or_else(|| self.dir.join(DEFAULT_MANIFEST_FILE));
        if !manifest_path.is_file() {
            return Err(ConfigError::MissingManifest(manifest_path));
        }

        let requirements = self
            .requirements
            .into_iter()
            .map(|requirement| requirement.trim().to_string())
            .filter(|requirement| !requirement.is_empty())
            .collect();

        Ok(PublishConfig {
            project_dir: self.dir,
            modules,
            bucket,
            requirements,
            manifest_path,
            region: self.region.filter(|region| !region.trim().is_empty()),
            key_prefix: self.key_prefix,
            python,
            dry_run: self.dry_run,
            policy: if self.skip_unchanged {
                UpdatePolicy::ChangedOnly
            } else {
                UpdatePolicy::Always
            },
            report_path: self.report,
        })
    }
}
