//! Shared helpers for integration tests
//!
//! - Traffic-light specification and a trace that satisfies it
//! - Scripted synthesizer (fixed replies, records feedback)
//! - Canned sandbox (maps code to output, counts sessions)
//! - Recording observer and in-memory transcript sink

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use spec2sim::oracle::{CodeSynthesizer, OracleError, OracleResult};
use spec2sim::pipeline::{LogSink, ProgressObserver, Stage, StageReport, TranscriptEntry};
use spec2sim::sandbox::{ExecutionResult, SandboxError, SandboxExecutor, SandboxSession};
use spec2sim::Specification;

/// Red 30s → Green 25s → Yellow 5s → Red
pub fn traffic_light_spec() -> Specification {
    Specification::new()
        .state("Red")
        .state("Green")
        .state("Yellow")
        .transition("Red", "Green", "after Red_duration")
        .transition("Green", "Yellow", "after Green_duration")
        .transition("Yellow", "Red", "after Yellow_duration")
        .constraint("Red_duration", 30.0)
        .constraint("Green_duration", 25.0)
        .constraint("Yellow_duration", 5.0)
}

pub const TRAFFIC_LIGHT_SPEC_JSON: &str = r#"{
  "states": [{"name": "Red"}, {"name": "Green"}, {"name": "Yellow"}],
  "transitions": [
    {"from": "Red", "to": "Green", "condition": "after Red_duration"},
    {"from": "Green", "to": "Yellow", "condition": "after Green_duration"},
    {"from": "Yellow", "to": "Red", "condition": "after Yellow_duration"}
  ],
  "constraints": [
    {"param": "Red_duration", "value": 30},
    {"param": "Green_duration", "value": "25"},
    {"param": "Yellow_duration", "value": 5}
  ]
}"#;

pub const TRAFFIC_LIGHT_TRACE: &str = "\
[SIM] Starting simulation
[SIM][t=0.00] ENTER state=Red
[SIM][t=0.00] WAIT 30.00s for Red
[SIM][t=30.00] TRANSITION Red -> Green (reason=timer)
[SIM][t=30.00] ENTER state=Green
[SIM][t=30.00] WAIT 25.00s for Green
[SIM][t=55.00] TRANSITION Green -> Yellow (reason=timer)
[SIM][t=55.00] ENTER state=Yellow
[SIM][t=55.00] WAIT 5.00s for Yellow
[SIM][t=60.00] TRANSITION Yellow -> Red (reason=timer)
[SIM][t=60.00] ENTER state=Red
[SIM][t=60.00] WAIT 30.00s for Red
";

/// Code strings the canned sandbox recognizes.
pub const GOOD_CODE: &str = "# good simulation";
pub const CRASHING_CODE: &str = "# raises";
pub const SILENT_CODE: &str = "# prints nothing";
pub const INCOMPLETE_CODE: &str = "# skips Yellow -> Red";

/// Synthesizer that returns scripted replies in order, repeating the last
/// one, and records the feedback of every call. Clones share the record.
#[derive(Clone)]
pub struct ScriptedSynthesizer {
    replies: Vec<Result<String, String>>,
    calls: Arc<Mutex<Vec<Option<String>>>>,
}

impl ScriptedSynthesizer {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(|s| Ok(s.into())).collect(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replies where `Err` becomes an oracle failure.
    pub fn with_results(replies: Vec<Result<&str, &str>>) -> Self {
        Self {
            replies: replies
                .into_iter()
                .map(|r| r.map(str::to_string).map_err(str::to_string))
                .collect(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl CodeSynthesizer for ScriptedSynthesizer {
    fn synthesize(&self, _spec: &Specification, feedback: Option<&str>) -> OracleResult<String> {
        let mut calls = self.calls.lock().unwrap();
        let index = calls.len().min(self.replies.len().saturating_sub(1));
        calls.push(feedback.map(str::to_string));
        match self.replies.get(index) {
            Some(Ok(code)) => Ok(code.clone()),
            Some(Err(message)) => Err(OracleError::Other(message.clone())),
            None => Err(OracleError::EmptyAnswer),
        }
    }
}

/// Sandbox that answers from a fixed table instead of running anything.
#[derive(Clone)]
pub struct CannedSandbox {
    outputs: HashMap<String, ExecutionResult>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    fail_open: bool,
}

impl CannedSandbox {
    /// Knows GOOD_CODE, CRASHING_CODE, SILENT_CODE and INCOMPLETE_CODE.
    pub fn traffic_light() -> Self {
        let mut outputs = HashMap::new();
        outputs.insert(
            GOOD_CODE.to_string(),
            ExecutionResult::captured(TRAFFIC_LIGHT_TRACE, ""),
        );
        outputs.insert(
            CRASHING_CODE.to_string(),
            ExecutionResult {
                stdout: "[SIM] Starting simulation\n".to_string(),
                stderr: "Traceback (most recent call last):\nNameError: name 'x' is not defined\n"
                    .to_string(),
                exit_code: Some(1),
                fault: None,
                duration_ms: 3,
            },
        );
        outputs.insert(SILENT_CODE.to_string(), ExecutionResult::captured("", ""));
        let incomplete: String = TRAFFIC_LIGHT_TRACE
            .lines()
            .take(9)
            .map(|l| format!("{}\n", l))
            .collect();
        outputs.insert(
            INCOMPLETE_CODE.to_string(),
            ExecutionResult::captured(incomplete, ""),
        );
        Self {
            outputs,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            fail_open: false,
        }
    }

    /// Every `open` fails.
    pub fn unavailable() -> Self {
        Self {
            fail_open: true,
            ..Self::traffic_light()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct CannedSession {
    outputs: HashMap<String, ExecutionResult>,
    closed: Arc<AtomicUsize>,
}

impl SandboxSession for CannedSession {
    fn execute(&mut self, code: &str, _timeout: Duration) -> ExecutionResult {
        self.outputs
            .get(code)
            .cloned()
            .unwrap_or_else(|| ExecutionResult::captured("", "SyntaxError: invalid syntax\n"))
    }

    fn close(self: Box<Self>) -> Result<(), SandboxError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl SandboxExecutor for CannedSandbox {
    fn open(&self) -> Result<Box<dyn SandboxSession>, SandboxError> {
        if self.fail_open {
            return Err(SandboxError::Unavailable("no sandbox host".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CannedSession {
            outputs: self.outputs.clone(),
            closed: Arc::clone(&self.closed),
        }))
    }
}

/// Stage reports as `(stage, attempt, ok)`.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    reports: Arc<Mutex<Vec<(Stage, Option<u32>, bool)>>>,
}

impl RecordingObserver {
    pub fn reports(&self) -> Vec<(Stage, Option<u32>, bool)> {
        self.reports.lock().unwrap().clone()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_stage(&self, report: &StageReport<'_>) {
        self.reports
            .lock()
            .unwrap()
            .push((report.stage, report.attempt, report.ok));
    }
}

/// Transcript sink that keeps rendered lines in memory.
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl LogSink for MemorySink {
    fn append(&self, entry: &TranscriptEntry) -> io::Result<()> {
        self.lines.lock().unwrap().push(entry.to_string());
        Ok(())
    }
}

/// Sink whose writes always fail.
pub struct BrokenSink;

impl LogSink for BrokenSink {
    fn append(&self, _entry: &TranscriptEntry) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "disk full"))
    }
}
