//! Pipeline controller: the bounded synthesize → verify → feedback loop.
//!
//! ```text
//! EXTRACTING → (per attempt) SYNTHESIZING → VERIFYING → PASS
//!                                                     → next attempt
//!                                                     → FAIL
//! ```
//!
//! A run makes at most `max_attempts + 1` attempts. Each failed attempt
//! feeds its reason and captured output into the next synthesis request.
//! Synthesis failures consume an attempt without reaching the verifier.
//! A non-retryable verdict ends the run at once. Cancellation is checked
//! before each attempt starts.

mod artifacts;
mod observer;
mod run;
mod transcript;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use spec2sim_sandbox::{ExecutionResult, SandboxExecutor};
use thiserror::Error;

use crate::oracle::{CodeSynthesizer, OracleError, SpecExtractor};
use crate::signal::SignalState;
use crate::spec::Specification;
use crate::summary::{ExitCode, FailureKind};
use crate::verify::{Verdict, Verifier};

pub use artifacts::{
    write_run_artifacts, DIAGRAM_FILE, RESULT_FILE, RUN_SUMMARY_FILE, SPEC_FILE, TRANSCRIPT_FILE,
};
pub use observer::{NoopObserver, ProgressObserver, Stage, StageReport, TracingObserver};
pub use run::{new_run_id, Attempt, PipelineRun, RunResult};
pub use transcript::{FileSink, LogSink, Transcript, TranscriptEntry};

/// Default retries after the first attempt
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("specification extraction failed: {0}")]
    Extraction(#[source] OracleError),

    #[error("cancelled before extraction")]
    Cancelled,
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Extraction(_) => FailureKind::Extraction,
            PipelineError::Cancelled => FailureKind::Cancelled,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.kind().exit_code()
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Retries allowed after the first attempt
    pub max_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Feedback handed to the synthesizer after a failed verification.
pub fn verification_feedback(verdict: &Verdict, result: &ExecutionResult) -> String {
    format!(
        "Verification Failed: {}\nLogs/Errors:\n{}{}",
        verdict.reason, result.stdout, result.stderr
    )
}

/// Drives extraction, synthesis and verification for one request at a time.
pub struct Controller<X, S, E> {
    extractor: X,
    synthesizer: S,
    verifier: Verifier<E>,
    config: PipelineConfig,
    observer: Box<dyn ProgressObserver>,
    sink: Option<Box<dyn LogSink>>,
    cancel: Arc<SignalState>,
    run_id: Option<String>,
}

impl<X, S, E> Controller<X, S, E>
where
    X: SpecExtractor,
    S: CodeSynthesizer,
    E: SandboxExecutor,
{
    pub fn new(extractor: X, synthesizer: S, verifier: Verifier<E>) -> Self {
        Self {
            extractor,
            synthesizer,
            verifier,
            config: PipelineConfig::default(),
            observer: Box::new(TracingObserver),
            sink: None,
            cancel: Arc::new(SignalState::new()),
            run_id: None,
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    pub fn with_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Mirror every transcript entry into `sink`.
    pub fn with_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn with_cancellation(mut self, state: Arc<SignalState>) -> Self {
        self.cancel = state;
        self
    }

    /// Use `run_id` instead of a fresh ULID, e.g. when artifacts for the
    /// run are placed before it starts.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn verifier(&self) -> &Verifier<E> {
        &self.verifier
    }

    /// Extract a specification from free text, then run the loop.
    pub fn run(&self, spec_text: &str) -> PipelineResult<PipelineRun> {
        if self.cancel.is_cancel_requested() {
            return Err(PipelineError::Cancelled);
        }

        let started = Instant::now();
        let run_id = self.next_run_id();
        let extracted = self.extractor.extract(spec_text).and_then(|spec| {
            spec.ensure_usable()?;
            Ok(spec)
        });

        let spec = match extracted {
            Ok(spec) => spec,
            Err(e) => {
                let detail = e.to_string();
                tracing::error!(run_id = %run_id, error = %detail, "specification extraction failed");
                self.observer.on_stage(&StageReport {
                    run_id: &run_id,
                    stage: Stage::Extracting,
                    attempt: None,
                    ok: false,
                    detail: &detail,
                });
                return Err(PipelineError::Extraction(e));
            }
        };

        let mut run = self.start_run(run_id, spec);
        let detail = format!(
            "extracted {} states, {} transitions, {} constraints",
            run.specification.states.len(),
            run.specification.transitions.len(),
            run.specification.constraints.len()
        );
        self.record(&mut run, Stage::Extracting, None, true, detail);
        Ok(self.drive(run, started))
    }

    /// Run the loop on an already structured specification.
    pub fn run_spec(&self, spec: Specification) -> PipelineRun {
        let started = Instant::now();
        let run = self.start_run(self.next_run_id(), spec);
        self.drive(run, started)
    }

    fn next_run_id(&self) -> String {
        self.run_id.clone().unwrap_or_else(new_run_id)
    }

    fn start_run(&self, run_id: String, specification: Specification) -> PipelineRun {
        tracing::info!(
            run_id = %run_id,
            max_attempts = self.config.max_attempts,
            "starting run"
        );
        for issue in specification.lint() {
            tracing::warn!(run_id = %run_id, "specification issue: {}", issue);
        }
        PipelineRun {
            run_id,
            specification,
            max_attempts: self.config.max_attempts,
            attempts: Vec::new(),
            verdict: Verdict::fail(FailureKind::Cancelled, "no attempt made", false),
            transcript: Transcript::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    fn drive(&self, mut run: PipelineRun, started: Instant) -> PipelineRun {
        let mut feedback: Option<String> = None;

        let terminal = loop {
            let index = run.attempts.len() as u32 + 1;

            if self.cancel.is_cancel_requested() {
                let reason = format!("cancelled before attempt {}", index);
                self.record(&mut run, Stage::Synthesizing, Some(index), false, reason.clone());
                break Verdict::fail(FailureKind::Cancelled, reason, false);
            }

            let attempt_started = Instant::now();
            let (mut attempt, next_feedback) = self.attempt(&mut run, index, feedback.as_deref());
            attempt.duration_ms = attempt_started.elapsed().as_millis() as u64;
            let verdict = attempt.verdict.clone();
            run.attempts.push(attempt);

            if verdict.is_pass() || !verdict.retryable {
                break verdict;
            }

            if run.attempts.len() as u32 > self.config.max_attempts {
                let reason = format!(
                    "giving up after {} attempts; last failure: {}",
                    run.attempts.len(),
                    verdict.reason
                );
                tracing::warn!(run_id = %run.run_id, "{}", reason);
                break Verdict::fail(FailureKind::MaxAttemptsExceeded, reason, false);
            }

            feedback = Some(next_feedback);
        };

        run.verdict = terminal;
        run.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            run_id = %run.run_id,
            status = %run.status(),
            attempts = run.attempts.len(),
            duration_ms = run.duration_ms,
            "run finished"
        );
        run
    }

    /// One synthesize-then-verify round. Returns the attempt and the
    /// feedback for the next one.
    fn attempt(
        &self,
        run: &mut PipelineRun,
        index: u32,
        feedback: Option<&str>,
    ) -> (Attempt, String) {
        tracing::debug!(run_id = %run.run_id, attempt = index, "synthesizing");
        let code = match self.synthesizer.synthesize(&run.specification, feedback) {
            Ok(code) if !code.trim().is_empty() => code,
            Ok(_) => return self.synthesis_failed(run, index, OracleError::EmptyAnswer),
            Err(e) => return self.synthesis_failed(run, index, e),
        };
        self.record(
            run,
            Stage::Synthesizing,
            Some(index),
            true,
            format!("received {} bytes of code", code.len()),
        );

        tracing::debug!(run_id = %run.run_id, attempt = index, "verifying");
        let verification = self.verifier.check(&run.specification, &code);
        let verdict = verification.verdict;
        let detail = if verdict.is_pass() {
            "PASS".to_string()
        } else {
            format!("FAIL (retry={}): {}", verdict.retryable, verdict.reason)
        };
        self.record(run, Stage::Verifying, Some(index), verdict.is_pass(), detail);

        let next = verification_feedback(&verdict, &verification.result);
        let attempt = Attempt {
            index,
            code: Some(code),
            execution: Some(verification.result),
            verdict,
            duration_ms: 0,
        };
        (attempt, next)
    }

    fn synthesis_failed(
        &self,
        run: &mut PipelineRun,
        index: u32,
        error: OracleError,
    ) -> (Attempt, String) {
        let reason = format!("System Error during attempt {}: {}", index, error);
        self.record(run, Stage::Synthesizing, Some(index), false, reason.clone());
        let attempt = Attempt {
            index,
            code: None,
            execution: None,
            verdict: Verdict::fail(FailureKind::Synthesis, reason.clone(), true),
            duration_ms: 0,
        };
        (attempt, reason)
    }

    /// Append to the transcript, mirror to the sink, notify the observer.
    fn record(
        &self,
        run: &mut PipelineRun,
        stage: Stage,
        attempt: Option<u32>,
        ok: bool,
        message: String,
    ) {
        let entry = run.transcript.push(TranscriptEntry {
            at: Utc::now(),
            stage,
            attempt,
            message,
        });
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.append(entry) {
                tracing::warn!(run_id = %run.run_id, error = %e, "failed to mirror transcript entry");
            }
        }
        self.observer.on_stage(&StageReport {
            run_id: &run.run_id,
            stage,
            attempt,
            ok,
            detail: &entry.message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleResult;
    use spec2sim_sandbox::{SandboxError, SandboxSession};
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    /// Returns the same output for every submission.
    struct Canned(ExecutionResult);

    struct CannedSession(ExecutionResult);

    impl SandboxSession for CannedSession {
        fn execute(&mut self, _code: &str, _timeout: Duration) -> ExecutionResult {
            self.0.clone()
        }

        fn close(self: Box<Self>) -> Result<(), SandboxError> {
            Ok(())
        }
    }

    impl SandboxExecutor for Canned {
        fn open(&self) -> Result<Box<dyn SandboxSession>, SandboxError> {
            Ok(Box::new(CannedSession(self.0.clone())))
        }
    }

    const GOOD: &str = "[SIM] Starting simulation\n\
[SIM][t=0.00] ENTER state=A\n\
[SIM][t=0.00] WAIT 1.00s for A\n\
[SIM][t=1.00] TRANSITION A -> B (reason=go)\n";

    fn spec() -> Specification {
        Specification::new()
            .state("A")
            .state("B")
            .transition("A", "B", "go")
    }

    fn no_extraction(_text: &str) -> OracleResult<Specification> {
        Err(OracleError::Other("unused".to_string()))
    }

    fn fixed_code(_spec: &Specification, _feedback: Option<&str>) -> OracleResult<String> {
        Ok("print('ok')".to_string())
    }

    #[test]
    fn test_feedback_format() {
        let verdict = Verdict::fail(FailureKind::VerificationMismatch, "missing transitions: A -> B", true);
        let result = ExecutionResult::captured("out\n", "err\n");
        assert_eq!(
            verification_feedback(&verdict, &result),
            "Verification Failed: missing transitions: A -> B\nLogs/Errors:\nout\nerr\n"
        );
    }

    #[test]
    fn test_pass_on_first_attempt() {
        let controller = Controller::new(
            no_extraction,
            fixed_code,
            Verifier::new(Canned(ExecutionResult::captured(GOOD, ""))),
        )
        .with_observer(NoopObserver)
        .with_max_attempts(0);

        let run = controller.run_spec(spec());
        assert!(run.is_pass());
        assert_eq!(run.attempts.len(), 1);
        assert_eq!(run.code(), "print('ok')");
    }

    #[test]
    fn test_feedback_reaches_next_synthesis() {
        let calls = RefCell::new(Vec::new());
        let synth = |_: &Specification, feedback: Option<&str>| -> OracleResult<String> {
            calls.borrow_mut().push(feedback.map(str::to_string));
            Ok("code".to_string())
        };
        let controller = Controller::new(
            no_extraction,
            &synth,
            Verifier::new(Canned(ExecutionResult::captured("nothing\n", ""))),
        )
        .with_observer(NoopObserver)
        .with_max_attempts(1);

        let run = controller.run_spec(spec());
        assert_eq!(run.failure_kind(), Some(FailureKind::MaxAttemptsExceeded));

        let calls = calls.into_inner();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], None);
        assert_eq!(
            calls[1].as_deref(),
            Some("Verification Failed: no trace produced\nLogs/Errors:\nnothing\n")
        );
    }

    #[test]
    fn test_synthesis_error_consumes_attempt() {
        let count = Cell::new(0);
        let synth = |_: &Specification, _: Option<&str>| -> OracleResult<String> {
            count.set(count.get() + 1);
            if count.get() == 1 {
                Err(OracleError::Other("rate limited".to_string()))
            } else {
                Ok("code".to_string())
            }
        };
        let controller = Controller::new(
            no_extraction,
            &synth,
            Verifier::new(Canned(ExecutionResult::captured(GOOD, ""))),
        )
        .with_observer(NoopObserver);

        let run = controller.run_spec(spec());
        assert!(run.is_pass());
        assert_eq!(run.attempts.len(), 2);
        assert!(run.attempts[0].code.is_none());
        assert_eq!(
            run.attempts[0].verdict.reason,
            "System Error during attempt 1: rate limited"
        );
    }

    #[test]
    fn test_cancelled_before_first_attempt() {
        let state = Arc::new(SignalState::new());
        state.request_cancel();
        let synth = |_: &Specification, _: Option<&str>| -> OracleResult<String> {
            panic!("synthesizer must not be called")
        };
        let controller = Controller::new(
            no_extraction,
            synth,
            Verifier::new(Canned(ExecutionResult::captured(GOOD, ""))),
        )
        .with_observer(NoopObserver)
        .with_cancellation(state);

        let run = controller.run_spec(spec());
        assert!(run.attempts.is_empty());
        assert_eq!(run.failure_kind(), Some(FailureKind::Cancelled));
        assert_eq!(run.transcript.len(), 1);
    }

    #[test]
    fn test_extraction_failure_aborts() {
        let controller = Controller::new(
            no_extraction,
            fixed_code,
            Verifier::new(Canned(ExecutionResult::captured(GOOD, ""))),
        )
        .with_observer(NoopObserver);

        let err = controller.run("anything").unwrap_err();
        assert_eq!(err.kind(), FailureKind::Extraction);
        assert_eq!(err.exit_code(), ExitCode::Failed);
    }

    #[test]
    fn test_empty_extraction_rejected() {
        let extract = |_: &str| -> OracleResult<Specification> { Ok(Specification::new()) };
        let controller = Controller::new(
            extract,
            fixed_code,
            Verifier::new(Canned(ExecutionResult::captured(GOOD, ""))),
        )
        .with_observer(NoopObserver);

        assert!(matches!(
            controller.run("anything"),
            Err(PipelineError::Extraction(OracleError::Spec(_)))
        ));
    }
}
