//! Tolerant, line-oriented trace parser.
//!
//! Lines that do not carry a `[SIM]` marker are ignored without comment.
//! Lines that look like an event (`[SIM][t=...] KEYWORD ...`) but cannot be
//! decoded are dropped and reported as a [`ParseWarning`] instead of failing
//! the whole trace: generated code is untrusted and its output may be
//! partial or garbled.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{Event, EventKind, EventPayload};

/// Why an event-shaped line was dropped.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum TraceError {
    #[error("unparseable timestamp '{value}'")]
    InvalidTimestamp { value: String },

    #[error("negative timestamp {value}")]
    NegativeTimestamp { value: f64 },

    #[error("timestamp {value} regresses below previous {previous}")]
    TimestampRegressed { value: f64, previous: f64 },

    #[error("unparseable WAIT duration '{value}'")]
    InvalidDuration { value: String },

    #[error("malformed {keyword} payload '{payload}'")]
    MalformedPayload { keyword: String, payload: String },
}

/// A soft parse problem attached to one input line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// 1-based line number in the input text.
    pub line_number: usize,

    /// The offending line, trimmed.
    pub line: String,

    #[serde(flatten)]
    pub error: TraceError,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {} ({})", self.line_number, self.error, self.line)
    }
}

fn start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[SIM\]\s+Starting simulation\s*$").unwrap())
}

fn stamped_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[SIM\]\[t=([^\]]*)\]\s*(ENTER|WAIT|TRANSITION|END|ERROR)\b\s*(.*)$").unwrap()
    })
}

fn enter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^state=(.+?)\s*$").unwrap())
}

fn wait_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\S+)\s+for\s+(.+?)\s*$").unwrap())
}

fn transition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(.+?)\s*->\s*(.+?)(?:\s*\(reason=(.*)\))?\s*$").unwrap()
    })
}

/// Lazy parser over trace text.
///
/// Yields one item per event-shaped line: `Ok(event)` when the line decodes,
/// `Err(warning)` when it is dropped. Cloning the parser (or constructing a
/// new one over the same text) restarts the sequence.
#[derive(Debug, Clone)]
pub struct TraceParser<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    last_timestamp: f64,
}

impl<'a> TraceParser<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            last_timestamp: 0.0,
        }
    }

    fn parse_line(&mut self, line: &str) -> Option<Result<Event, TraceError>> {
        if start_re().is_match(line) {
            return Some(Ok(Event::new(self.last_timestamp, EventPayload::Start)));
        }

        let caps = stamped_re().captures(line)?;
        let raw_t = caps.get(1).map_or("", |m| m.as_str()).trim();
        let keyword = caps.get(2).map_or("", |m| m.as_str());
        let payload = caps.get(3).map_or("", |m| m.as_str()).trim();

        let timestamp = match raw_t.parse::<f64>() {
            Ok(t) if t.is_finite() => t,
            _ => {
                return Some(Err(TraceError::InvalidTimestamp {
                    value: raw_t.to_string(),
                }))
            }
        };
        if timestamp < 0.0 {
            return Some(Err(TraceError::NegativeTimestamp { value: timestamp }));
        }
        if timestamp < self.last_timestamp {
            return Some(Err(TraceError::TimestampRegressed {
                value: timestamp,
                previous: self.last_timestamp,
            }));
        }

        let malformed = || TraceError::MalformedPayload {
            keyword: keyword.to_string(),
            payload: payload.to_string(),
        };

        let event_payload = match keyword {
            "ENTER" => match enter_re().captures(payload) {
                Some(c) => EventPayload::Enter {
                    state: c[1].to_string(),
                },
                None => return Some(Err(malformed())),
            },
            "WAIT" => {
                let Some(c) = wait_re().captures(payload) else {
                    return Some(Err(malformed()));
                };
                let raw = &c[1];
                let number = raw.strip_suffix('s').unwrap_or(raw);
                match number.parse::<f64>() {
                    Ok(d) if d.is_finite() && d >= 0.0 => EventPayload::Wait {
                        duration: d,
                        label: c[2].to_string(),
                    },
                    _ => {
                        return Some(Err(TraceError::InvalidDuration {
                            value: raw.to_string(),
                        }))
                    }
                }
            }
            "TRANSITION" => match transition_re().captures(payload) {
                Some(c) => EventPayload::Transition {
                    from: c[1].to_string(),
                    to: c[2].to_string(),
                    reason: c.get(3).map(|m| m.as_str().trim().to_string()),
                },
                None => return Some(Err(malformed())),
            },
            "END" => match enter_re().captures(payload) {
                Some(c) => EventPayload::End {
                    state: c[1].to_string(),
                },
                None => return Some(Err(malformed())),
            },
            "ERROR" => EventPayload::Error {
                text: payload.to_string(),
            },
            _ => return None,
        };

        self.last_timestamp = timestamp;
        Some(Ok(Event::new(timestamp, event_payload)))
    }
}

impl Iterator for TraceParser<'_> {
    type Item = Result<Event, ParseWarning>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (index, raw) = self.lines.next()?;
            let line = raw.trim();
            if !line.starts_with("[SIM]") {
                continue;
            }
            match self.parse_line(line) {
                Some(Ok(event)) => return Some(Ok(event)),
                Some(Err(error)) => {
                    return Some(Err(ParseWarning {
                        line_number: index + 1,
                        line: line.to_string(),
                        error,
                    }))
                }
                None => continue,
            }
        }
    }
}

/// Lazy sequence of the well-formed events in `text`.
pub fn events(text: &str) -> impl Iterator<Item = Event> + Clone + '_ {
    TraceParser::new(text).filter_map(Result::ok)
}

/// A fully parsed trace with its soft warnings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedTrace {
    pub events: Vec<Event>,
    pub warnings: Vec<ParseWarning>,
}

impl ParsedTrace {
    /// True when at least one ENTER/WAIT/TRANSITION/END event was seen.
    pub fn has_activity(&self) -> bool {
        self.events.iter().any(|e| e.kind().is_activity())
    }

    /// Distinct `(from, to)` pairs observed in TRANSITION events.
    pub fn observed_transitions(&self) -> BTreeSet<(String, String)> {
        self.events
            .iter()
            .filter_map(|e| e.transition_pair())
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }
}

/// Parse the whole of `text`, collecting events and warnings.
pub fn parse_trace(text: &str) -> ParsedTrace {
    let mut trace = ParsedTrace::default();
    for item in TraceParser::new(text) {
        match item {
            Ok(event) => trace.events.push(event),
            Err(warning) => trace.warnings.push(warning),
        }
    }
    trace
}
