//! Records produced by a pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spec2sim_sandbox::ExecutionResult;

use super::transcript::Transcript;
use crate::diagram::to_mermaid;
use crate::spec::Specification;
use crate::summary::{FailureKind, Status};
use crate::verify::Verdict;

/// Generate a new run ID (lowercase ULID)
pub fn new_run_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

/// One synthesize-then-verify round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based
    pub index: u32,
    /// `None` when synthesis failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionResult>,
    pub verdict: Verdict,
    pub duration_ms: u64,
}

impl Attempt {
    /// Captured output, or the failure reason when nothing ran.
    pub fn logs(&self) -> String {
        match &self.execution {
            Some(result) => result.combined_output(),
            None => self.verdict.reason.clone(),
        }
    }
}

/// A complete run: every attempt plus the terminal verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub specification: Specification,
    pub max_attempts: u32,
    pub attempts: Vec<Attempt>,
    pub verdict: Verdict,
    pub transcript: Transcript,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl PipelineRun {
    pub fn status(&self) -> Status {
        self.verdict.status
    }

    pub fn is_pass(&self) -> bool {
        self.verdict.is_pass()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.verdict.kind
    }

    pub fn last_attempt(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    /// The last attempt's code (empty when it produced none).
    pub fn code(&self) -> &str {
        self.last_attempt()
            .and_then(|a| a.code.as_deref())
            .unwrap_or("")
    }

    /// The last attempt's logs.
    pub fn logs(&self) -> String {
        self.last_attempt().map(Attempt::logs).unwrap_or_default()
    }

    pub fn result(&self) -> RunResult {
        RunResult {
            status: self.status(),
            spec: self.specification.clone(),
            diagram: to_mermaid(&self.specification),
            code: self.code().to_string(),
            logs: self.logs(),
        }
    }
}

/// The result object handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub status: Status,
    pub spec: Specification,
    pub diagram: String,
    pub code: String,
    pub logs: String,
}

impl RunResult {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
