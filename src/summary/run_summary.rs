//! Run summary (run_summary.json)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use super::attempt_summary::AttemptSummary;
use super::failure::{ExitCode, FailureKind, Status};
use crate::pipeline::PipelineRun;

/// Schema version for run_summary.json
pub const RUN_SUMMARY_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for run_summary.json
pub const RUN_SUMMARY_SCHEMA_ID: &str = "spec2sim/run_summary@1";

/// Run summary (run_summary.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// Run identifier
    pub run_id: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the summary was created
    pub created_at: DateTime<Utc>,

    /// Final status
    pub status: Status,

    /// Why the run failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,

    /// Terminal verdict reason
    pub reason: String,

    /// Process exit code
    pub exit_code: i32,

    /// Retries allowed after the first attempt
    pub max_attempts: u32,

    /// Attempts actually made
    pub attempt_count: usize,

    /// Wall-clock duration of the entire run in milliseconds
    pub duration_ms: u64,

    /// Human-readable summary
    pub human_summary: String,

    pub attempts: Vec<AttemptSummary>,
}

impl RunSummary {
    pub fn from_run(run: &PipelineRun) -> Self {
        let status = run.status();
        let attempt_count = run.attempts.len();
        Self {
            schema_version: RUN_SUMMARY_SCHEMA_VERSION,
            schema_id: RUN_SUMMARY_SCHEMA_ID.to_string(),
            run_id: run.run_id.clone(),
            started_at: run.started_at,
            created_at: Utc::now(),
            status,
            failure_kind: run.failure_kind(),
            reason: run.verdict.reason.clone(),
            exit_code: status.exit_code().as_i32(),
            max_attempts: run.max_attempts,
            attempt_count,
            duration_ms: run.duration_ms,
            human_summary: Self::generate_human_summary(status, run.failure_kind(), attempt_count),
            attempts: run.attempts.iter().map(AttemptSummary::from_attempt).collect(),
        }
    }

    fn generate_human_summary(
        status: Status,
        failure_kind: Option<FailureKind>,
        attempt_count: usize,
    ) -> String {
        let attempts = if attempt_count == 1 {
            "1 attempt".to_string()
        } else {
            format!("{} attempts", attempt_count)
        };
        match (status, failure_kind) {
            (Status::Pass, _) => format!("Verification passed after {}", attempts),
            (Status::Fail, Some(kind)) => format!("{} after {}", kind.description(), attempts),
            (Status::Fail, None) => format!("Verification failed after {}", attempts),
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }

    /// Load from file
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e)))
    }

    /// Get the exit code as ExitCode enum
    pub fn exit_code_enum(&self) -> Option<ExitCode> {
        ExitCode::from_i32(self.exit_code)
    }
}
