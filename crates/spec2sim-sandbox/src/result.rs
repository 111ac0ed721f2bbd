//! Execution results returned by the sandbox.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport-level failure that kept the code from running to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultKind {
    /// The execution exceeded its timeout and was killed.
    Timeout,
    /// The interpreter could not be started.
    Spawn,
    /// The session workspace could not be prepared or read.
    Io,
    /// No session could be opened.
    Unavailable,
}

impl FaultKind {
    pub fn description(&self) -> &'static str {
        match self {
            FaultKind::Timeout => "execution timed out",
            FaultKind::Spawn => "interpreter failed to start",
            FaultKind::Io => "sandbox I/O failure",
            FaultKind::Unavailable => "sandbox unavailable",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A distinguished transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxFault {
    pub kind: FaultKind,
    pub message: String,
}

/// What one code submission produced.
///
/// The executor never fails outward: any fault is folded into a result that
/// carries `fault` and a non-empty `stderr`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<SandboxFault>,

    #[serde(default)]
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// A plain captured result with no transport fault.
    pub fn captured(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code: Some(0),
            fault: None,
            duration_ms: 0,
        }
    }

    /// A transport failure. The message is mirrored into `stderr`.
    pub fn fault(kind: FaultKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            stdout: String::new(),
            stderr: format!("[sandbox] {}: {}\n", kind, message),
            exit_code: None,
            fault: Some(SandboxFault { kind, message }),
            duration_ms: 0,
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        self.fault.is_some()
    }

    /// Any stderr output at all, whitespace included.
    pub fn has_errors(&self) -> bool {
        !self.stderr.is_empty()
    }

    /// stdout followed by stderr, as fed back to the synthesizer.
    pub fn combined_output(&self) -> String {
        let mut out = self.stdout.clone();
        if self.has_errors() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}
