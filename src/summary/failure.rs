//! Verdict status, failure taxonomy and process exit codes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Verdict / run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pass,
    Fail,
}

impl Status {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Status::Pass => ExitCode::Success,
            Status::Fail => ExitCode::Failed,
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Status::Pass)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pass => f.write_str("PASS"),
            Status::Fail => f.write_str("FAIL"),
        }
    }
}

/// Failure kind - categorizes why a verdict or run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Specification extraction failed (aborts the run)
    Extraction,
    /// Code synthesis failed or returned no code
    Synthesis,
    /// Sandbox could not run the code to completion (timeout, spawn, I/O)
    SandboxTransport,
    /// Code raised an error or the simulation reported one
    RuntimeTrace,
    /// Trace does not satisfy the specification
    VerificationMismatch,
    /// Retry budget exhausted
    MaxAttemptsExceeded,
    /// Cancellation requested between attempts
    Cancelled,
}

impl FailureKind {
    /// Whether an attempt that failed this way may be retried.
    ///
    /// `VerificationMismatch` is retryable by default; the verifier policy
    /// can turn that off per verdict.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            FailureKind::Synthesis
                | FailureKind::SandboxTransport
                | FailureKind::RuntimeTrace
                | FailureKind::VerificationMismatch
        )
    }

    /// Whether this kind ends a run outright.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FailureKind::Extraction | FailureKind::MaxAttemptsExceeded | FailureKind::Cancelled
        )
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::Failed
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            FailureKind::Extraction => "Specification extraction failed",
            FailureKind::Synthesis => "Code synthesis failed",
            FailureKind::SandboxTransport => "Sandbox execution failed",
            FailureKind::RuntimeTrace => "Runtime error",
            FailureKind::VerificationMismatch => "Trace does not match specification",
            FailureKind::MaxAttemptsExceeded => "Maximum attempts exceeded",
            FailureKind::Cancelled => "Run cancelled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ExitCode {
    /// Verification passed
    Success = 0,
    /// Verification failed, or the run could not complete
    Failed = 1,
}

impl ExitCode {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(ExitCode::Success),
            1 => Some(ExitCode::Failed),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }
}

impl Default for ExitCode {
    fn default() -> Self {
        ExitCode::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&Status::Pass).unwrap(), r#""PASS""#);
        assert_eq!(serde_json::to_string(&Status::Fail).unwrap(), r#""FAIL""#);
    }

    #[test]
    fn test_failure_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&FailureKind::SandboxTransport).unwrap(),
            r#""SANDBOX_TRANSPORT""#
        );
        assert_eq!(
            serde_json::to_string(&FailureKind::MaxAttemptsExceeded).unwrap(),
            r#""MAX_ATTEMPTS_EXCEEDED""#
        );
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(FailureKind::Synthesis.retryable());
        assert!(FailureKind::SandboxTransport.retryable());
        assert!(FailureKind::RuntimeTrace.retryable());
        assert!(FailureKind::VerificationMismatch.retryable());
        assert!(!FailureKind::Extraction.retryable());
        assert!(!FailureKind::MaxAttemptsExceeded.retryable());
        assert!(!FailureKind::Cancelled.retryable());
    }

    #[test]
    fn test_terminal_kinds_are_not_retryable() {
        for kind in [
            FailureKind::Extraction,
            FailureKind::MaxAttemptsExceeded,
            FailureKind::Cancelled,
        ] {
            assert!(kind.is_terminal());
            assert!(!kind.retryable());
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Status::Pass.exit_code().as_i32(), 0);
        assert_eq!(Status::Fail.exit_code().as_i32(), 1);
        assert_eq!(FailureKind::RuntimeTrace.exit_code(), ExitCode::Failed);
        assert_eq!(ExitCode::from_i32(1), Some(ExitCode::Failed));
        assert_eq!(ExitCode::from_i32(42), None);
        assert!(ExitCode::default().is_success());
    }
}
