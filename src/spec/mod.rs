//! Structured behavioral specification.
//!
//! JSON shape:
//! `{"states": [{"name"}], "transitions": [{"from", "to", "condition"}],
//!   "constraints": [{"param", "value"}]}`
//!
//! Deserialization is lenient about what extraction oracles actually emit
//! (bare state names, numeric strings, null guards); semantic problems are
//! reported by [`Specification::lint`] rather than rejected.

pub mod guard;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub use guard::{DurationRequirement, RequirementSource};

/// Errors producing a usable specification.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("invalid specification JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("specification declares no states and no transitions")]
    Empty,
}

/// A declared state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StateRepr")]
pub struct StateDecl {
    pub name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StateRepr {
    Name(String),
    Decl { name: String },
}

impl From<StateRepr> for StateDecl {
    fn from(repr: StateRepr) -> Self {
        match repr {
            StateRepr::Name(name) | StateRepr::Decl { name } => StateDecl { name },
        }
    }
}

/// A declared transition with its guard text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
    #[serde(default, alias = "guard", deserialize_with = "nullable_string")]
    pub condition: String,
}

impl Transition {
    pub fn new(from: impl Into<String>, to: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: condition.into(),
        }
    }

    pub fn pair(&self) -> (&str, &str) {
        (&self.from, &self.to)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// A named numeric parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(alias = "name")]
    pub param: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub value: Option<f64>,
}

fn nullable_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }
    Ok(match Option::<Raw>::deserialize(d)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => guard::leading_number(&s),
        None => None,
    })
}

/// States, transitions and constraints extracted from a description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    #[serde(default)]
    pub states: Vec<StateDecl>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl Specification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, name: impl Into<String>) -> Self {
        self.states.push(StateDecl { name: name.into() });
        self
    }

    pub fn transition(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        self.transitions.push(Transition::new(from, to, condition));
        self
    }

    pub fn constraint(mut self, param: impl Into<String>, value: f64) -> Self {
        self.constraints.push(Constraint {
            param: param.into(),
            value: Some(value),
        });
        self
    }

    /// Parse from JSON without checking that anything was declared.
    pub fn from_json(text: &str) -> Result<Self, SpecError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse from JSON and reject specifications with nothing to verify.
    pub fn from_json_checked(text: &str) -> Result<Self, SpecError> {
        let spec = Self::from_json(text)?;
        spec.ensure_usable()?;
        Ok(spec)
    }

    pub fn ensure_usable(&self) -> Result<(), SpecError> {
        if self.states.is_empty() && self.transitions.is_empty() {
            return Err(SpecError::Empty);
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn state_names(&self) -> Vec<&str> {
        self.states.iter().map(|s| s.name.as_str()).collect()
    }

    /// Value of a constraint by exact name, falling back to a
    /// case-insensitive match.
    pub fn constraint_value(&self, name: &str) -> Option<f64> {
        self.find_constraint(name).and_then(|c| c.value)
    }

    pub fn find_constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints
            .iter()
            .find(|c| c.param == name)
            .or_else(|| {
                self.constraints
                    .iter()
                    .find(|c| c.param.eq_ignore_ascii_case(name))
            })
    }

    /// Declared `(from, to)` pairs in declaration order, without repeats.
    pub fn declared_pairs(&self) -> Vec<(&str, &str)> {
        let mut seen = BTreeSet::new();
        self.transitions
            .iter()
            .map(Transition::pair)
            .filter(|pair| seen.insert(*pair))
            .collect()
    }

    /// Timing requirement attached to a transition's guard, if any.
    pub fn duration_requirement(&self, transition: &Transition) -> Option<DurationRequirement> {
        guard::resolve(self, transition)
    }

    /// Specification-quality issues. None of these prevent verification.
    pub fn lint(&self) -> Vec<SpecIssue> {
        let mut issues = Vec::new();

        let mut seen = BTreeSet::new();
        for state in &self.states {
            if state.name.trim().is_empty() {
                issues.push(SpecIssue::EmptyStateName);
            } else if !seen.insert(state.name.as_str()) {
                issues.push(SpecIssue::DuplicateState {
                    name: state.name.clone(),
                });
            }
        }

        if !self.states.is_empty() {
            for t in &self.transitions {
                for endpoint in [&t.from, &t.to] {
                    if !seen.contains(endpoint.as_str()) {
                        issues.push(SpecIssue::UnknownState {
                            transition: t.to_string(),
                            name: endpoint.clone(),
                        });
                    }
                }
            }
        }

        let mut params = BTreeSet::new();
        for c in &self.constraints {
            if !params.insert(c.param.as_str()) {
                issues.push(SpecIssue::DuplicateConstraint {
                    param: c.param.clone(),
                });
            }
            if c.value.is_none() {
                issues.push(SpecIssue::MissingConstraintValue {
                    param: c.param.clone(),
                });
            }
        }

        for t in &self.transitions {
            for name in guard::referenced_names(&t.condition) {
                if guard::is_duration_constraint_name(&name) && self.find_constraint(&name).is_none()
                {
                    issues.push(SpecIssue::UnresolvedReference {
                        transition: t.to_string(),
                        name,
                    });
                }
            }
            if guard::has_duration_semantic(&t.condition) && self.duration_requirement(t).is_none() {
                issues.push(SpecIssue::UnresolvedDuration {
                    transition: t.to_string(),
                    condition: t.condition.clone(),
                });
            }
        }

        issues
    }
}

/// A specification-quality defect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum SpecIssue {
    EmptyStateName,
    DuplicateState { name: String },
    UnknownState { transition: String, name: String },
    DuplicateConstraint { param: String },
    MissingConstraintValue { param: String },
    UnresolvedReference { transition: String, name: String },
    UnresolvedDuration { transition: String, condition: String },
}

impl fmt::Display for SpecIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecIssue::EmptyStateName => write!(f, "state with empty name"),
            SpecIssue::DuplicateState { name } => write!(f, "state '{}' declared twice", name),
            SpecIssue::UnknownState { transition, name } => {
                write!(f, "transition {} references undeclared state '{}'", transition, name)
            }
            SpecIssue::DuplicateConstraint { param } => {
                write!(f, "constraint '{}' declared twice", param)
            }
            SpecIssue::MissingConstraintValue { param } => {
                write!(f, "constraint '{}' has no numeric value", param)
            }
            SpecIssue::UnresolvedReference { transition, name } => write!(
                f,
                "guard of {} references unknown constraint '{}'",
                transition, name
            ),
            SpecIssue::UnresolvedDuration {
                transition,
                condition,
            } => write!(
                f,
                "guard of {} ('{}') is timed but names no duration",
                transition, condition
            ),
        }
    }
}
