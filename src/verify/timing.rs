//! Duration checks for timed transitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use spec2sim_trace::{Event, EventPayload};

use crate::spec::{DurationRequirement, Specification};

const EXACT_EPSILON: f64 = 1e-9;

/// How closely an observed duration must match its requirement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingTolerance {
    /// Integer-valued expectations must match exactly.
    pub integer_exact: bool,
    /// Relative tolerance for everything else.
    pub relative: f64,
    /// Accept the sum of all WAITs since the previous transition when the
    /// nearest WAIT does not match, for simulations that wait in steps.
    pub sum_waits: bool,
}

impl Default for TimingTolerance {
    fn default() -> Self {
        Self {
            integer_exact: true,
            relative: 0.05,
            sum_waits: false,
        }
    }
}

impl TimingTolerance {
    pub fn matches(&self, expected: f64, observed: f64) -> bool {
        if !observed.is_finite() {
            return false;
        }
        let diff = (expected - observed).abs();
        if self.integer_exact && expected.fract() == 0.0 {
            diff <= EXACT_EPSILON
        } else {
            diff <= expected.abs() * self.relative + EXACT_EPSILON
        }
    }
}

/// How the observed duration was measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measurement {
    /// WAIT line preceding the transition
    Wait,
    /// Time since the source state was entered
    Elapsed,
}

/// An observed transition that fired at the wrong time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingViolation {
    pub transition: String,
    pub timestamp: f64,
    pub requirement: DurationRequirement,
    pub observed: f64,
    pub measured: Measurement,
}

impl fmt::Display for TimingViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let how = match self.measured {
            Measurement::Wait => "waited",
            Measurement::Elapsed => "elapsed",
        };
        write!(
            f,
            "{} at t={:.2} violates {}: expected {}s, {} {}s",
            self.transition,
            self.timestamp,
            self.requirement,
            self.requirement.seconds,
            how,
            round_display(self.observed)
        )
    }
}

fn round_display(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Check every observed occurrence of each timed transition.
///
/// The duration of an occurrence is the nearest WAIT since the previous
/// TRANSITION. With `sum_waits`, the sum of all WAITs in that window is
/// accepted as well. Without a WAIT, it is the time since the source state
/// was last entered.
pub fn check_timing(
    spec: &Specification,
    events: &[Event],
    tolerance: &TimingTolerance,
) -> Vec<TimingViolation> {
    let requirements: Vec<_> = spec
        .transitions
        .iter()
        .filter_map(|t| {
            spec.duration_requirement(t)
                .map(|r| (t.from.as_str(), t.to.as_str(), r))
        })
        .collect();
    if requirements.is_empty() {
        return Vec::new();
    }

    let mut violations = Vec::new();
    let mut window_start = 0;
    let mut last_transition_at: Option<f64> = None;

    for (i, event) in events.iter().enumerate() {
        let Some((from, to)) = event.transition_pair() else {
            continue;
        };

        if let Some((_, _, requirement)) = requirements
            .iter()
            .find(|(f, t, _)| *f == from && *t == to)
        {
            let window = &events[window_start..i];
            let (observed, measured) = match nearest_wait(window) {
                Some(nearest) => {
                    let total = wait_total(window);
                    if tolerance.sum_waits
                        && !tolerance.matches(requirement.seconds, nearest)
                        && tolerance.matches(requirement.seconds, total)
                    {
                        (total, Measurement::Wait)
                    } else {
                        (nearest, Measurement::Wait)
                    }
                }
                None => {
                    let since = last_entry(&events[..i], from)
                        .or(last_transition_at)
                        .unwrap_or(0.0);
                    (event.timestamp - since, Measurement::Elapsed)
                }
            };

            if !tolerance.matches(requirement.seconds, observed) {
                violations.push(TimingViolation {
                    transition: format!("{} -> {}", from, to),
                    timestamp: event.timestamp,
                    requirement: requirement.clone(),
                    observed,
                    measured,
                });
            }
        }

        window_start = i + 1;
        last_transition_at = Some(event.timestamp);
    }

    violations
}

fn nearest_wait(window: &[Event]) -> Option<f64> {
    window.iter().rev().find_map(|e| match e.payload {
        EventPayload::Wait { duration, .. } => Some(duration),
        _ => None,
    })
}

fn wait_total(window: &[Event]) -> f64 {
    window
        .iter()
        .filter_map(|e| match e.payload {
            EventPayload::Wait { duration, .. } => Some(duration),
            _ => None,
        })
        .sum()
}

fn last_entry(events: &[Event], state: &str) -> Option<f64> {
    events.iter().rev().find_map(|e| match &e.payload {
        EventPayload::Enter { state: s } if s == state => Some(e.timestamp),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> Specification {
        Specification::new()
            .transition("Red", "Green", "30s elapsed")
            .transition("Green", "Red", "button pressed")
            .constraint("Red_duration", 30.0)
    }

    #[test]
    fn test_tolerance_integer_exact() {
        let tol = TimingTolerance::default();
        assert!(tol.matches(30.0, 30.0));
        assert!(tol.matches(30.0, 30.000_000_000_1));
        assert!(!tol.matches(30.0, 30.5));
        assert!(!tol.matches(30.0, f64::NAN));
    }

    #[test]
    fn test_tolerance_relative() {
        let tol = TimingTolerance::default();
        assert!(tol.matches(2.5, 2.6));
        assert!(!tol.matches(2.5, 2.7));

        let loose = TimingTolerance {
            integer_exact: false,
            relative: 0.1,
            sum_waits: false,
        };
        assert!(loose.matches(30.0, 32.0));
    }

    #[test]
    fn test_matching_wait_passes() {
        let events = vec![
            Event::start(),
            Event::enter(0.0, "Red"),
            Event::wait(0.0, 30.0, "Red"),
            Event::transition(30.0, "Red", "Green", "timer"),
        ];
        assert!(check_timing(&spec(), &events, &TimingTolerance::default()).is_empty());
    }

    #[test]
    fn test_wrong_wait_reports_constraint() {
        let events = vec![
            Event::enter(0.0, "Red"),
            Event::wait(0.0, 10.0, "Red"),
            Event::transition(10.0, "Red", "Green", "timer"),
        ];
        let violations = check_timing(&spec(), &events, &TimingTolerance::default());
        assert_eq!(violations.len(), 1);
        let text = violations[0].to_string();
        assert!(text.contains("Red_duration"));
        assert!(text.contains("expected 30s"));
        assert!(text.contains("waited 10s"));
    }

    fn chunked_red() -> Vec<Event> {
        vec![
            Event::enter(0.0, "Red"),
            Event::wait(0.0, 10.0, "Red"),
            Event::wait(10.0, 20.0, "Red"),
            Event::transition(30.0, "Red", "Green", "timer"),
        ]
    }

    #[test]
    fn test_chunked_waits_use_nearest_by_default() {
        let violations = check_timing(&spec(), &chunked_red(), &TimingTolerance::default());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].observed, 20.0);
        assert_eq!(violations[0].measured, Measurement::Wait);
    }

    #[test]
    fn test_chunked_waits_sum_when_enabled() {
        let tol = TimingTolerance {
            sum_waits: true,
            ..TimingTolerance::default()
        };
        assert!(check_timing(&spec(), &chunked_red(), &tol).is_empty());
    }

    #[test]
    fn test_elapsed_fallback_without_wait() {
        let ok = vec![
            Event::enter(5.0, "Red"),
            Event::transition(35.0, "Red", "Green", "timer"),
        ];
        assert!(check_timing(&spec(), &ok, &TimingTolerance::default()).is_empty());

        let early = vec![
            Event::enter(5.0, "Red"),
            Event::transition(20.0, "Red", "Green", "timer"),
        ];
        let violations = check_timing(&spec(), &early, &TimingTolerance::default());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].measured, Measurement::Elapsed);
        assert_eq!(violations[0].observed, 15.0);
    }

    #[test]
    fn test_every_occurrence_checked() {
        let events = vec![
            Event::enter(0.0, "Red"),
            Event::wait(0.0, 30.0, "Red"),
            Event::transition(30.0, "Red", "Green", "timer"),
            Event::enter(30.0, "Green"),
            Event::transition(31.0, "Green", "Red", "timer"),
            Event::enter(31.0, "Red"),
            Event::wait(31.0, 29.0, "Red"),
            Event::transition(60.0, "Red", "Green", "timer"),
        ];
        let violations = check_timing(&spec(), &events, &TimingTolerance::default());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].timestamp, 60.0);
    }

    #[test]
    fn test_untimed_transition_ignored() {
        let events = vec![
            Event::enter(0.0, "Green"),
            Event::transition(3.0, "Green", "Red", "timer"),
        ];
        assert!(check_timing(&spec(), &events, &TimingTolerance::default()).is_empty());
    }
}
