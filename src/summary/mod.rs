//! Verdict status, failure taxonomy and the run_summary.json artifact.

mod attempt_summary;
mod failure;
mod run_summary;

pub use attempt_summary::{code_sha256, AttemptSummary};
pub use failure::{ExitCode, FailureKind, Status};
pub use run_summary::{RunSummary, RUN_SUMMARY_SCHEMA_ID, RUN_SUMMARY_SCHEMA_VERSION};
