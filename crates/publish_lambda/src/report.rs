use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::pipeline::{ModuleSummary, PublishSummary};

pub const RUN_REPORT_SCHEMA_VERSION: &str = "v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunReport {
    pub schema_version: String,
    pub event_time: String,
    pub dry_run: bool,
    pub status: String,
    pub code_sha256: String,
    pub archive_size_bytes: usize,
    pub modules: Vec<ModuleSummary>,
}

impl RunReport {
    pub fn from_summary(summary: &PublishSummary, event_time: impl Into<String>) -> Self {
        let status = if summary.dry_run {
            "planned"
        } else if summary.has_failures() {
            "partial_failure"
        } else {
            "success"
        };
        Self {
            schema_version: RUN_REPORT_SCHEMA_VERSION.to_string(),
            event_time: event_time.into(),
            dry_run: summary.dry_run,
            status: status.to_string(),
            code_sha256: summary.code_sha256.clone(),
            archive_size_bytes: summary.archive_size_bytes,
            modules: summary.modules.clone(),
        }
    }
}

pub fn write_run_report(path: &Path, summary: &PublishSummary) -> std::io::Result<()> {
    let report = RunReport::from_summary(summary, Utc::now().to_rfc3339());
    let body = serde_json::to_vec_pretty(&report)?;
    std::fs::write(path, body)
}
