//! Process exit codes for a publish run.

use crate::pipeline::PublishSummary;

pub const EXIT_SUCCESS: i32 = 0;
/// Configuration, manifest, build, archive, upload or listing failed.
pub const EXIT_FATAL: i32 = 1;
/// The run completed but at least one function operation failed.
pub const EXIT_FUNCTION_FAILURES: i32 = 2;

pub fn exit_code<E>(result: &Result<PublishSummary, E>) -> i32 {
    match result {
        Ok(summary) if summary.has_failures() => EXIT_FUNCTION_FAILURES,
        Ok(_) => EXIT_SUCCESS,
        Err(_) => EXIT_FATAL,
    }
}
