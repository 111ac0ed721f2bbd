//! Progress notifications.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Extracting,
    Synthesizing,
    Verifying,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extracting => "EXTRACTING",
            Stage::Synthesizing => "SYNTHESIZING",
            Stage::Verifying => "VERIFYING",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finished stage.
#[derive(Debug, Clone, Copy)]
pub struct StageReport<'a> {
    pub run_id: &'a str,
    pub stage: Stage,
    /// 1-based attempt number; `None` for extraction
    pub attempt: Option<u32>,
    pub ok: bool,
    pub detail: &'a str,
}

/// Receives a report after every stage, in stage order.
///
/// Observers see the run but cannot steer it.
pub trait ProgressObserver {
    fn on_stage(&self, report: &StageReport<'_>);
}

impl<F> ProgressObserver for F
where
    F: Fn(&StageReport<'_>),
{
    fn on_stage(&self, report: &StageReport<'_>) {
        self(report)
    }
}

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_stage(&self, _report: &StageReport<'_>) {}
}

/// Logs each report through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_stage(&self, report: &StageReport<'_>) {
        if report.ok {
            tracing::info!(
                run_id = report.run_id,
                stage = %report.stage,
                attempt = report.attempt,
                "{}",
                report.detail
            );
        } else {
            tracing::warn!(
                run_id = report.run_id,
                stage = %report.stage,
                attempt = report.attempt,
                "{}",
                report.detail
            );
        }
    }
}
