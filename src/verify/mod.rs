//! Verifier: execute generated code and judge its trace against a
//! specification.
//!
//! Judgement order:
//! 1. transport fault (timeout, spawn, I/O) → FAIL `SANDBOX_TRANSPORT`
//! 2. non-empty stderr → FAIL `RUNTIME_TRACE`
//! 3. an `ERROR` event in the trace → FAIL `RUNTIME_TRACE`
//! 4. no ENTER/WAIT/TRANSITION/END event → FAIL "no trace produced"
//! 5. a declared transition never observed → FAIL listing every missing one
//! 6. a timed transition fired at the wrong time → FAIL naming the constraint
//! 7. otherwise PASS, including traces that stop mid-WAIT

mod timing;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use spec2sim_sandbox::{ExecutionResult, FaultKind, SandboxExecutor, SessionGuard};
use spec2sim_trace::{parse_trace, Event, EventPayload, ParseWarning, ParsedTrace};

use crate::spec::Specification;
use crate::summary::{FailureKind, Status};

pub use timing::{check_timing, Measurement, TimingTolerance, TimingViolation};

/// Default per-execution sandbox timeout (seconds)
pub const DEFAULT_SANDBOX_TIMEOUT_SECS: u64 = 20;

/// Knobs for the structural checks.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyPolicy {
    /// Whether missing-transition, timing and empty-trace failures may be
    /// retried. Runtime and transport failures are always retryable.
    pub structural_failures_retryable: bool,
    pub tolerance: TimingTolerance,
    pub sandbox_timeout: Duration,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            structural_failures_retryable: true,
            tolerance: TimingTolerance::default(),
            sandbox_timeout: Duration::from_secs(DEFAULT_SANDBOX_TIMEOUT_SECS),
        }
    }
}

/// Outcome of judging one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: Status,
    pub reason: String,
    #[serde(rename = "retry")]
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<Event>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ParseWarning>,
}

impl Verdict {
    pub fn pass(trace: ParsedTrace) -> Self {
        Self {
            status: Status::Pass,
            reason: "trace satisfies specification".to_string(),
            retryable: false,
            kind: None,
            trace: Some(trace.events),
            warnings: trace.warnings,
        }
    }

    pub fn fail(kind: FailureKind, reason: impl Into<String>, retryable: bool) -> Self {
        Self {
            status: Status::Fail,
            reason: reason.into(),
            retryable,
            kind: Some(kind),
            trace: None,
            warnings: Vec::new(),
        }
    }

    fn with_trace(mut self, trace: ParsedTrace) -> Self {
        self.trace = Some(trace.events);
        self.warnings = trace.warnings;
        self
    }

    pub fn is_pass(&self) -> bool {
        self.status.is_pass()
    }
}

/// An execution together with its verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub result: ExecutionResult,
    pub verdict: Verdict,
}

/// Runs code in a sandbox and judges the result.
pub struct Verifier<E> {
    executor: E,
    policy: VerifyPolicy,
}

impl<E: SandboxExecutor> Verifier<E> {
    pub fn new(executor: E) -> Self {
        Self::with_policy(executor, VerifyPolicy::default())
    }

    pub fn with_policy(executor: E, policy: VerifyPolicy) -> Self {
        Self { executor, policy }
    }

    /// Execute `code` in a fresh session and judge it.
    pub fn verify(&self, spec: &Specification, code: &str) -> Verdict {
        self.check(spec, code).verdict
    }

    /// Like [`Verifier::verify`], keeping the execution result.
    pub fn check(&self, spec: &Specification, code: &str) -> Verification {
        let result = self.execute(code);
        let verdict = judge(spec, &result, &self.policy);
        Verification { result, verdict }
    }

    fn execute(&self, code: &str) -> ExecutionResult {
        let mut session = match SessionGuard::open(&self.executor) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "could not open sandbox session");
                return ExecutionResult::fault(FaultKind::Unavailable, e.to_string());
            }
        };
        let result = session.execute(code, self.policy.sandbox_timeout);
        session.release();
        result
    }

    /// Judge an execution result without running anything.
    pub fn judge(&self, spec: &Specification, result: &ExecutionResult) -> Verdict {
        judge(spec, result, &self.policy)
    }
}

/// Pure verdict over `(spec, result)`.
pub fn judge(spec: &Specification, result: &ExecutionResult, policy: &VerifyPolicy) -> Verdict {
    let trace = parse_trace(&result.stdout);

    if let Some(fault) = &result.fault {
        return Verdict::fail(
            FailureKind::SandboxTransport,
            format!("sandbox failure: {}: {}", fault.kind, fault.message),
            true,
        )
        .with_trace(trace);
    }

    if result.has_errors() {
        let reason = match last_line(&result.stderr) {
            "" => "runtime error: whitespace on stderr".to_string(),
            detail => format!("runtime error: {}", detail),
        };
        return Verdict::fail(FailureKind::RuntimeTrace, reason, true).with_trace(trace);
    }

    if let Some(text) = trace.events.iter().find_map(|e| match &e.payload {
        EventPayload::Error { text } => Some(text.clone()),
        _ => None,
    }) {
        return Verdict::fail(
            FailureKind::RuntimeTrace,
            format!("simulation reported error: {}", text),
            true,
        )
        .with_trace(trace);
    }

    let structural = policy.structural_failures_retryable;

    if !trace.has_activity() {
        return Verdict::fail(FailureKind::VerificationMismatch, "no trace produced", structural)
            .with_trace(trace);
    }

    let observed = trace.observed_transitions();
    let missing: Vec<String> = spec
        .declared_pairs()
        .into_iter()
        .filter(|(from, to)| !observed.contains(&(from.to_string(), to.to_string())))
        .map(|(from, to)| format!("{} -> {}", from, to))
        .collect();
    if !missing.is_empty() {
        return Verdict::fail(
            FailureKind::VerificationMismatch,
            format!("missing transitions: {}", missing.join(", ")),
            structural,
        )
        .with_trace(trace);
    }

    let violations = check_timing(spec, &trace.events, &policy.tolerance);
    if !violations.is_empty() {
        let details: Vec<String> = violations.iter().map(ToString::to_string).collect();
        return Verdict::fail(
            FailureKind::VerificationMismatch,
            format!("timing constraint violated: {}", details.join("; ")),
            structural,
        )
        .with_trace(trace);
    }

    Verdict::pass(trace)
}

fn last_line(text: &str) -> &str {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
}
