//! Function reconciliation.
//!
//! Planning lives in `publish_lambda_core::plan`; this module lists the remote
//! side and executes a plan against a [`FunctionApi`]. A failing call is
//! recorded and the remaining functions are still processed.

use publish_lambda_core::declaration::DeclarationRegistry;
use publish_lambda_core::plan::{plan_sync, SyncPlan, UpdatePolicy};
use publish_lambda_core::storage_keys::CodeLocation;
use serde::{Deserialize, Serialize};

use crate::adapters::function_api::FunctionApi;
use crate::error::{FunctionSyncError, PublishError, SyncAction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionOutcome {
    pub function: String,
    pub action: SyncAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub outcomes: Vec<FunctionOutcome>,
}

impl SyncReport {
    fn record(&mut self, function: &str, action: SyncAction, result: Result<(), String>) -> bool {
        let succeeded = result.is_ok();
        match &result {
            Ok(()) => tracing::info!(function, %action, "function synchronized"),
            Err(message) => {
                tracing::error!(function, %action, error = %message, "function sync failed")
            }
        }
        self.outcomes.push(FunctionOutcome {
            function: function.to_string(),
            action,
            error: result.err(),
        });
        succeeded
    }

    pub fn failures(&self) -> Vec<FunctionSyncError> {
        self.outcomes
            .iter()
            .filter_map(|outcome| {
                outcome.error.as_ref().map(|message| FunctionSyncError {
                    function: outcome.function.clone(),
                    action: outcome.action,
                    message: message.clone(),
                })
            })
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|outcome| outcome.error.is_some())
    }

    pub fn count(&self, action: SyncAction) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.action == action && outcome.error.is_none())
            .count()
    }
}

/// Lists remote functions and plans against the declared set.
pub fn plan_against_remote(
    registry: &DeclarationRegistry,
    archive_sha256: Option<&str>,
    policy: UpdatePolicy,
    api: &dyn FunctionApi,
) -> Result<SyncPlan, PublishError> {
    let remote = api.list_functions().map_err(PublishError::ListFunctions)?;
    let plan = plan_sync(registry, &remote, archive_sha256, policy);
    tracing::info!(
        module = %plan.module,
        remote = remote.len(),
        create = plan.create.len(),
        update = plan.update.len(),
        delete = plan.delete.len(),
        unchanged = plan.unchanged.len(),
        "sync plan computed"
    );
    Ok(plan)
}

/// Runs creates, then updates, then deletes.
///
/// Planned conflicts are recorded as failed creates without calling the
/// service. Within one function a failed call skips that function's remaining
/// calls; other functions are unaffected.
pub fn execute_plan(plan: &SyncPlan, code: &CodeLocation, api: &dyn FunctionApi) -> SyncReport {
    let mut report = SyncReport::default();

    for conflict in &plan.conflicts {
        report.record(&conflict.name, SyncAction::Create, Err(conflict.to_string()));
    }

    for declaration in &plan.create {
        let result = api.create_function(declaration, code);
        report.record(&declaration.name, SyncAction::Create, result);
    }

    for update in &plan.update {
        let name = &update.declaration.name;
        if update.updates_configuration(plan.policy) {
            let result = api.update_function_configuration(&update.declaration);
            if !report.record(name, SyncAction::UpdateConfiguration, result) {
                continue;
            }
        }
        if update.updates_code(plan.policy) {
            let result = api.update_function_code(name, code);
            report.record(name, SyncAction::UpdateCode, result);
        }
    }

    for name in &plan.delete {
        let result = api.delete_function(name);
        report.record(name, SyncAction::Delete, result);
    }

    for name in &plan.unchanged {
        report.record(name, SyncAction::Unchanged, Ok(()));
    }

    report
}

pub fn synchronize(
    registry: &DeclarationRegistry,
    code: &CodeLocation,
    policy: UpdatePolicy,
    api: &dyn FunctionApi,
) -> Result<(SyncPlan, SyncReport), PublishError> {
    let plan = plan_against_remote(registry, Some(code.code_sha256.as_str()), policy, api)?;
    let report = execute_plan(&plan, code, api);
    Ok((plan, report))
}
