//! The publish pipeline: build, archive, upload, synchronize.
//!
//! The project is built and archived once. The archive is then uploaded under
//! the key of every published module before any function is touched, and each
//! module is synchronized against its own declared set. Build, archive, upload
//! and listing failures are fatal. In dry-run mode the archive is built
//! locally and the plans computed, but nothing is uploaded and no function is
//! touched.

use std::path::PathBuf;

use publish_lambda_core::declaration::DeclarationRegistry;
use publish_lambda_core::plan::{SyncPlan, UpdatePolicy};
use publish_lambda_core::storage_keys::{archive_object_key, CodeLocation, ARCHIVE_FILE_NAME};
use serde::{Deserialize, Serialize};

use crate::adapters::function_api::FunctionApi;
use crate::adapters::installer::PackageInstaller;
use crate::adapters::object_store::ArchiveStore;
use crate::config::PublishConfig;
use crate::error::{FunctionSyncError, PublishError};
use crate::stages::archive::archive_staging;
use crate::stages::build::build_project;
use crate::stages::sync::{plan_against_remote, synchronize, SyncReport};
use crate::stages::upload::upload_archive;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub project_dir: PathBuf,
    pub bucket: String,
    pub key_prefix: Option<String>,
    pub requirements: Vec<String>,
    pub policy: UpdatePolicy,
    pub dry_run: bool,
}

impl From<&PublishConfig> for PublishRequest {
    fn from(config: &PublishConfig) -> Self {
        Self {
            project_dir: config.project_dir.clone(),
            bucket: config.bucket.clone(),
            key_prefix: config.key_prefix.clone(),
            requirements: config.requirements.clone(),
            policy: config.policy,
            dry_run: config.dry_run,
        }
    }
}

pub struct PublishDependencies<'a> {
    pub installer: &'a dyn PackageInstaller,
    pub store: &'a dyn ArchiveStore,
    pub functions: &'a dyn FunctionApi,
}

/// Outcome for one published module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub module: String,
    pub code: CodeLocation,
    pub plan: SyncPlan,
    pub report: SyncReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub archive_path: PathBuf,
    pub archive_size_bytes: usize,
    pub code_sha256: String,
    pub dry_run: bool,
    pub modules: Vec<ModuleSummary>,
}

impl PublishSummary {
    pub fn has_failures(&self) -> bool {
        self.modules.iter().any(|module| module.report.has_failures())
    }

    pub fn failures(&self) -> Vec<FunctionSyncError> {
        self.modules
            .iter()
            .flat_map(|module| module.report.failures())
            .collect()
    }

    pub fn module(&self, name: &str) -> Option<&ModuleSummary> {
        self.modules.iter().find(|module| module.module == name)
    }
}

pub fn publish(
    request: &PublishRequest,
    registries: &[DeclarationRegistry],
    deps: &PublishDependencies<'_>,
) -> Result<PublishSummary, PublishError> {
    let module_names: Vec<&str> = registries.iter().map(DeclarationRegistry::module).collect();
    tracing::info!(
        modules = ?module_names,
        dry_run = request.dry_run,
        "publish started"
    );

    let built = build_project(&request.project_dir, &request.requirements, deps.installer)?;
    let archive = archive_staging(
        &built.staging_dir,
        &built.project_dir.join(ARCHIVE_FILE_NAME),
    )?;

    let mut locations = Vec::with_capacity(registries.len());
    for registry in registries {
        let key = archive_object_key(request.key_prefix.as_deref(), registry.module());
        let location = if request.dry_run {
            CodeLocation {
                bucket: request.bucket.clone(),
                key,
                code_sha256: archive.code_sha256.clone(),
            }
        } else {
            upload_archive(&archive, &request.bucket, &key, deps.store)?
        };
        locations.push(location);
    }

    let mut modules = Vec::with_capacity(registries.len());
    for (registry, code) in registries.iter().zip(locations) {
        let (plan, report) = if request.dry_run {
            let plan = plan_against_remote(
                registry,
                Some(archive.code_sha256.as_str()),
                request.policy,
                deps.functions,
            )?;
            (plan, SyncReport::default())
        } else {
            synchronize(registry, &code, request.policy, deps.functions)?
        };
        modules.push(ModuleSummary {
            module: registry.module().to_string(),
            code,
            plan,
            report,
        });
    }

    let summary = PublishSummary {
        archive_path: archive.path,
        archive_size_bytes: archive.bytes.len(),
        code_sha256: archive.code_sha256,
        dry_run: request.dry_run,
        modules,
    };

    if summary.has_failures() {
        tracing::warn!(
            failures = summary.failures().len(),
            "publish finished with function failures"
        );
    } else {
        tracing::info!(modules = ?module_names, "publish finished");
    }
    Ok(summary)
}
