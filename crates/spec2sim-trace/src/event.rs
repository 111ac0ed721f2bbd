//! Trace events and their line rendering.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a trace event, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Start,
    Enter,
    Wait,
    Transition,
    End,
    Error,
}

impl EventKind {
    /// Kinds that show the simulation actually ran.
    pub fn is_activity(&self) -> bool {
        matches!(
            self,
            EventKind::Enter | EventKind::Wait | EventKind::Transition | EventKind::End
        )
    }

    /// Keyword used in the line grammar.
    pub fn keyword(&self) -> &'static str {
        match self {
            EventKind::Start => "START",
            EventKind::Enter => "ENTER",
            EventKind::Wait => "WAIT",
            EventKind::Transition => "TRANSITION",
            EventKind::End => "END",
            EventKind::Error => "ERROR",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Kind-specific event data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    Start,
    Enter {
        state: String,
    },
    Wait {
        duration: f64,
        label: String,
    },
    Transition {
        from: String,
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    End {
        state: String,
    },
    Error {
        text: String,
    },
}

/// One structured trace event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Simulation time, non-negative and monotonic within a trace.
    pub timestamp: f64,

    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn new(timestamp: f64, payload: EventPayload) -> Self {
        Self { timestamp, payload }
    }

    pub fn start() -> Self {
        Self::new(0.0, EventPayload::Start)
    }

    pub fn enter(timestamp: f64, state: impl Into<String>) -> Self {
        Self::new(timestamp, EventPayload::Enter { state: state.into() })
    }

    pub fn wait(timestamp: f64, duration: f64, label: impl Into<String>) -> Self {
        Self::new(
            timestamp,
            EventPayload::Wait {
                duration,
                label: label.into(),
            },
        )
    }

    pub fn transition(
        timestamp: f64,
        from: impl Into<String>,
        to: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(
            timestamp,
            EventPayload::Transition {
                from: from.into(),
                to: to.into(),
                reason: Some(reason.into()),
            },
        )
    }

    pub fn end(timestamp: f64, state: impl Into<String>) -> Self {
        Self::new(timestamp, EventPayload::End { state: state.into() })
    }

    pub fn error(timestamp: f64, text: impl Into<String>) -> Self {
        Self::new(timestamp, EventPayload::Error { text: text.into() })
    }

    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Start => EventKind::Start,
            EventPayload::Enter { .. } => EventKind::Enter,
            EventPayload::Wait { .. } => EventKind::Wait,
            EventPayload::Transition { .. } => EventKind::Transition,
            EventPayload::End { .. } => EventKind::End,
            EventPayload::Error { .. } => EventKind::Error,
        }
    }

    /// The `(from, to)` pair for TRANSITION events.
    pub fn transition_pair(&self) -> Option<(&str, &str)> {
        match &self.payload {
            EventPayload::Transition { from, to, .. } => Some((from.as_str(), to.as_str())),
            _ => None,
        }
    }

    /// Render the event as a grammar line (no trailing newline).
    pub fn to_line(&self) -> String {
        let t = self.timestamp;
        match &self.payload {
            EventPayload::Start => "[SIM] Starting simulation".to_string(),
            EventPayload::Enter { state } => format!("[SIM][t={:.2}] ENTER state={}", t, state),
            EventPayload::Wait { duration, label } => {
                format!("[SIM][t={:.2}] WAIT {}s for {}", t, duration, label)
            }
            EventPayload::Transition { from, to, reason } => match reason {
                Some(reason) => format!(
                    "[SIM][t={:.2}] TRANSITION {} -> {} (reason={})",
                    t, from, to, reason
                ),
                None => format!("[SIM][t={:.2}] TRANSITION {} -> {}", t, from, to),
            },
            EventPayload::End { state } => format!("[SIM][t={:.2}] END state={}", t, state),
            EventPayload::Error { text } => format!("[SIM][t={:.2}] ERROR {}", t, text),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// Render a sequence of events as newline-terminated trace text.
pub fn render<'a>(events: impl IntoIterator<Item = &'a Event>) -> String {
    let mut out = String::new();
    for event in events {
        out.push_str(&event.to_line());
        out.push('\n');
    }
    out
}
