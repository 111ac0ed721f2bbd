//! Reference simulator.
//!
//! A deterministic discrete-time model of a [`Specification`], used to
//! produce known-good traces. From each state the next transition is the
//! least recently taken outgoing one (declaration order breaks ties). A
//! timed guard fires once its duration has elapsed; an untimed guard fires
//! after one step. Runs until `until` and may stop mid-WAIT.

use spec2sim_trace::{Event, EventPayload};
use thiserror::Error;

use crate::spec::Specification;

/// Upper bound on transitions per run, for specs with zero-length guards.
pub const MAX_TRANSITIONS: usize = 10_000;

#[derive(Debug, Error, PartialEq)]
pub enum SimulateError {
    #[error("specification declares no states")]
    NoStates,

    #[error("invalid simulation option: {0}")]
    InvalidOption(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationOptions {
    /// Simulated time horizon (seconds)
    pub until: f64,
    /// Time an untimed guard waits before firing (seconds)
    pub step: f64,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            until: 120.0,
            step: 1.0,
        }
    }
}

impl SimulationOptions {
    fn validate(&self) -> Result<(), SimulateError> {
        if !self.until.is_finite() || self.until < 0.0 {
            return Err(SimulateError::InvalidOption(format!(
                "until must be a non-negative number, got {}",
                self.until
            )));
        }
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(SimulateError::InvalidOption(format!(
                "step must be positive, got {}",
                self.step
            )));
        }
        Ok(())
    }
}

/// Simulate `spec` from its first declared state.
pub fn simulate(spec: &Specification, options: SimulationOptions) -> Result<Vec<Event>, SimulateError> {
    options.validate()?;

    let initial = spec
        .states
        .first()
        .map(|s| s.name.clone())
        .or_else(|| spec.transitions.first().map(|t| t.from.clone()))
        .ok_or(SimulateError::NoStates)?;

    let delays: Vec<f64> = spec
        .transitions
        .iter()
        .map(|t| match spec.duration_requirement(t) {
            Some(req) => req.seconds.max(0.0),
            None => options.step,
        })
        .collect();
    let mut last_taken: Vec<Option<usize>> = vec![None; spec.transitions.len()];

    let mut events = vec![Event::start()];
    let mut now = 0.0;
    let mut state = initial;
    events.push(Event::enter(now, state.clone()));

    for fired in 0..MAX_TRANSITIONS {
        let next = spec
            .transitions
            .iter()
            .enumerate()
            .filter(|(_, t)| t.from == state)
            .min_by_key(|(i, _)| (last_taken[*i].map_or(0, |n| n + 1), *i))
            .map(|(i, _)| i);

        let Some(index) = next else {
            events.push(Event::end(now, state));
            break;
        };

        let transition = &spec.transitions[index];
        let delay = delays[index];
        events.push(Event::wait(now, delay, state.clone()));

        let at = now + delay;
        if at > options.until {
            break;
        }

        now = at;
        last_taken[index] = Some(fired);
        let reason = (!transition.condition.trim().is_empty()).then(|| transition.condition.clone());
        events.push(Event::new(
            now,
            EventPayload::Transition {
                from: transition.from.clone(),
                to: transition.to.clone(),
                reason,
            },
        ));
        state = transition.to.clone();
        events.push(Event::enter(now, state.clone()));
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spec2sim_trace::{parse_trace, render, EventKind};

    fn traffic_light() -> Specification {
        Specification::new()
            .state("Red")
            .state("Green")
            .state("Yellow")
            .transition("Red", "Green", "30s elapsed")
            .transition("Green", "Yellow", "25s elapsed")
            .transition("Yellow", "Red", "5s elapsed")
            .constraint("Red_duration", 30.0)
            .constraint("Green_duration", 25.0)
            .constraint("Yellow_duration", 5.0)
    }

    #[test]
    fn test_traffic_light_cycle() {
        let events = simulate(&traffic_light(), SimulationOptions::default()).unwrap();
        let transitions: Vec<_> = events
            .iter()
            .filter_map(|e| e.transition_pair().map(|p| (e.timestamp, p.0.to_string())))
            .collect();
        assert_eq!(
            transitions,
            vec![
                (30.0, "Red".to_string()),
                (55.0, "Green".to_string()),
                (60.0, "Yellow".to_string()),
                (90.0, "Red".to_string()),
                (115.0, "Green".to_string()),
                (120.0, "Yellow".to_string()),
            ]
        );
        // Ends mid-WAIT in Red.
        assert_eq!(events.last().map(Event::kind), Some(EventKind::Wait));
    }

    #[test]
    fn test_rendered_trace_parses_back() {
        let events = simulate(&traffic_light(), SimulationOptions::default()).unwrap();
        let parsed = parse_trace(&render(&events));
        assert!(parsed.warnings.is_empty());
        assert_eq!(parsed.events, events);
    }

    #[test]
    fn test_terminal_state_emits_end() {
        let spec = Specification::new()
            .state("Idle")
            .state("Done")
            .transition("Idle", "Done", "start pressed");
        let events = simulate(&spec, SimulationOptions::default()).unwrap();
        assert_eq!(events.last(), Some(&Event::end(1.0, "Done")));
    }

    #[test]
    fn test_least_recently_taken_rotates() {
        let spec = Specification::new()
            .state("Hub")
            .transition("Hub", "Hub", "tick")
            .transition("Hub", "Hub", "after 2s");
        let events = simulate(
            &spec,
            SimulationOptions {
                until: 7.0,
                step: 1.0,
            },
        )
        .unwrap();
        let times: Vec<f64> = events
            .iter()
            .filter(|e| e.kind() == EventKind::Transition)
            .map(|e| e.timestamp)
            .collect();
        assert_eq!(times, vec![1.0, 3.0, 4.0, 6.0, 7.0]);
    }

    #[test]
    fn test_invalid_options() {
        let spec = traffic_light();
        assert!(matches!(
            simulate(&spec, SimulationOptions { until: 10.0, step: 0.0 }),
            Err(SimulateError::InvalidOption(_))
        ));
        assert_eq!(
            simulate(&Specification::new(), SimulationOptions::default()),
            Err(SimulateError::NoStates)
        );
    }
}
