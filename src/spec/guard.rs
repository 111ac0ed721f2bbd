//! Guard text analysis: which transitions carry a timing requirement.

use std::fmt;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::Serialize;

use super::{Specification, Transition};

/// Name suffixes that mark a constraint as a duration.
pub const DURATION_SUFFIXES: &[&str] = &[
    "_duration",
    "_time",
    "_timeout",
    "_delay",
    "_interval",
    "_ms",
];

const DURATION_WORDS: &[&str] = &["elapsed", "after", "timeout", "wait", "waits", "waiting"];

fn literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:^|[^\w.])(\d+(?:\.\d+)?)\s*(milliseconds?|ms|minutes?|mins?|hours?|hrs?|h|seconds?|secs?|s)\b",
        )
        .unwrap()
    })
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)").unwrap())
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap())
}

/// Where a duration requirement came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RequirementSource {
    Constraint { name: String },
    Literal { text: String },
}

/// Expected time spent before a transition fires, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationRequirement {
    pub seconds: f64,
    #[serde(flatten)]
    pub source: RequirementSource,
}

impl fmt::Display for DurationRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            RequirementSource::Constraint { name } => f.write_str(name),
            RequirementSource::Literal { text } => write!(f, "literal '{}'", text),
        }
    }
}

/// Leading number of a string such as `"30"` or `"30 seconds"`.
pub fn leading_number(text: &str) -> Option<f64> {
    number_re()
        .captures(text)
        .and_then(|c| c[1].parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

pub fn is_duration_constraint_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    DURATION_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Identifier-like words in a guard, in order of appearance.
pub fn referenced_names(guard: &str) -> Vec<String> {
    word_re()
        .find_iter(guard)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// First duration literal in a guard as `(seconds, matched text)`.
pub fn duration_literal(guard: &str) -> Option<(f64, String)> {
    let caps = literal_re().captures(guard)?;
    let value: f64 = caps[1].parse().ok()?;
    let unit = caps[2].to_ascii_lowercase();
    let seconds = match unit.as_str() {
        "ms" | "millisecond" | "milliseconds" => value / 1000.0,
        "min" | "mins" | "minute" | "minutes" => value * 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => value * 3600.0,
        _ => value,
    };
    let text = format!("{}{}", &caps[1], &caps[2]);
    Some((seconds, text))
}

/// Whether the guard reads as "after some time".
pub fn has_duration_semantic(guard: &str) -> bool {
    duration_literal(guard).is_some()
        || referenced_names(guard)
            .iter()
            .any(|w| DURATION_WORDS.iter().any(|d| w.eq_ignore_ascii_case(d)))
}

fn constraint_seconds(name: &str, value: f64) -> f64 {
    if name.to_ascii_lowercase().ends_with("_ms") {
        value / 1000.0
    } else {
        value
    }
}

/// Resolve the timing requirement of `transition` against `spec`.
///
/// Order: a duration constraint named in the guard, then the
/// `<from>_duration` convention for timed guards, then an inline literal.
pub fn resolve(spec: &Specification, transition: &Transition) -> Option<DurationRequirement> {
    let guard = transition.condition.as_str();

    for name in referenced_names(guard) {
        if !is_duration_constraint_name(&name) {
            continue;
        }
        if let Some(c) = spec.find_constraint(&name) {
            if let Some(value) = c.value {
                return Some(DurationRequirement {
                    seconds: constraint_seconds(&c.param, value),
                    source: RequirementSource::Constraint {
                        name: c.param.clone(),
                    },
                });
            }
        }
    }

    if has_duration_semantic(guard) {
        let conventional = format!("{}_duration", transition.from);
        if let Some(c) = spec.find_constraint(&conventional) {
            if let Some(value) = c.value {
                return Some(DurationRequirement {
                    seconds: value,
                    source: RequirementSource::Constraint {
                        name: c.param.clone(),
                    },
                });
            }
        }
    }

    duration_literal(guard).map(|(seconds, text)| DurationRequirement {
        seconds,
        source: RequirementSource::Literal { text },
    })
}
