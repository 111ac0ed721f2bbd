//! Per-attempt entry of run_summary.json

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use spec2sim_sandbox::FaultKind;

use super::failure::{FailureKind, Status};
use crate::pipeline::Attempt;

/// Hex SHA-256 of generated code
pub fn code_sha256(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// What one attempt produced, without the code and output themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub index: u32,
    pub status: Status,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,

    pub reason: String,
    pub retry: bool,

    /// Absent when synthesis failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_sha256: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_bytes: Option<usize>,

    /// Interpreter exit code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<FaultKind>,

    /// Events in the parsed trace (0 when none was kept)
    pub trace_events: usize,

    pub duration_ms: u64,
}

impl AttemptSummary {
    pub fn from_attempt(attempt: &Attempt) -> Self {
        let execution = attempt.execution.as_ref();
        Self {
            index: attempt.index,
            status: attempt.verdict.status,
            failure_kind: attempt.verdict.kind,
            reason: attempt.verdict.reason.clone(),
            retry: attempt.verdict.retryable,
            code_sha256: attempt.code.as_deref().map(code_sha256),
            code_bytes: attempt.code.as_ref().map(String::len),
            exit_code: execution.and_then(|r| r.exit_code),
            fault: execution.and_then(|r| r.fault.as_ref()).map(|f| f.kind),
            trace_events: attempt.verdict.trace.as_ref().map_or(0, Vec::len),
            duration_ms: attempt.duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::Verdict;
    use spec2sim_sandbox::ExecutionResult;

    #[test]
    fn test_code_sha256() {
        assert_eq!(
            code_sha256(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_from_failed_execution() {
        let attempt = Attempt {
            index: 3,
            code: Some("print(1)".to_string()),
            execution: Some(ExecutionResult::fault(FaultKind::Timeout, "20s")),
            verdict: Verdict::fail(FailureKind::SandboxTransport, "sandbox failure", true),
            duration_ms: 20_000,
        };
        let summary = AttemptSummary::from_attempt(&attempt);
        assert_eq!(summary.index, 3);
        assert_eq!(summary.status, Status::Fail);
        assert_eq!(summary.failure_kind, Some(FailureKind::SandboxTransport));
        assert_eq!(summary.fault, Some(FaultKind::Timeout));
        assert_eq!(summary.code_bytes, Some(8));
        assert_eq!(summary.code_sha256.as_deref(), Some(code_sha256("print(1)").as_str()));
        assert!(summary.retry);
    }

    #[test]
    fn test_from_synthesis_failure() {
        let attempt = Attempt {
            index: 1,
            code: None,
            execution: None,
            verdict: Verdict::fail(FailureKind::Synthesis, "System Error during attempt 1: x", true),
            duration_ms: 5,
        };
        let json = serde_json::to_value(AttemptSummary::from_attempt(&attempt)).unwrap();
        assert!(json.get("code_sha256").is_none());
        assert!(json.get("fault").is_none());
        assert_eq!(json["failure_kind"], "SYNTHESIS");
        assert_eq!(json["status"], "FAIL");
    }
}
