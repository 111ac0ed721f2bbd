//! Timeouts for external calls
//!
//! Every call the pipeline makes is request/response with its own bound:
//! - `sandbox_seconds`: one execution of generated code (default 20)
//! - `synthesis_seconds`: one code-generation request (default 60)
//! - `extraction_seconds`: the specification-extraction request (default 60)
//! - `termination_grace_seconds`: SIGTERM → SIGKILL grace for a timed-out
//!   sandbox process (default 2)
//!
//! A sandbox or synthesis timeout is a retryable failure that consumes one
//! attempt. An extraction timeout aborts the run.

use std::time::Duration;

/// Upper bound for any single external call
pub const MAX_CALL_SECONDS: u64 = 3600;

/// Upper bound for the termination grace period
pub const MAX_GRACE_SECONDS: u64 = 60;

/// Timeout configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub sandbox_seconds: u64,
    pub synthesis_seconds: u64,
    pub extraction_seconds: u64,
    pub termination_grace_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            sandbox_seconds: 20,
            synthesis_seconds: 60,
            extraction_seconds: 60,
            termination_grace_seconds: 2,
        }
    }
}

impl TimeoutConfig {
    /// Validate bounds
    pub fn validate(&self) -> Result<(), TimeoutValidationError> {
        for (name, value) in [
            ("sandbox", self.sandbox_seconds),
            ("synthesis", self.synthesis_seconds),
            ("extraction", self.extraction_seconds),
        ] {
            if value == 0 || value > MAX_CALL_SECONDS {
                return Err(TimeoutValidationError::CallOutOfBounds { name, value });
            }
        }

        if self.termination_grace_seconds > MAX_GRACE_SECONDS {
            return Err(TimeoutValidationError::GraceOutOfBounds {
                value: self.termination_grace_seconds,
            });
        }

        Ok(())
    }

    pub fn sandbox(&self) -> Duration {
        Duration::from_secs(self.sandbox_seconds)
    }

    pub fn synthesis(&self) -> Duration {
        Duration::from_secs(self.synthesis_seconds)
    }

    pub fn extraction(&self) -> Duration {
        Duration::from_secs(self.extraction_seconds)
    }

    pub fn termination_grace(&self) -> Duration {
        Duration::from_secs(self.termination_grace_seconds)
    }
}

/// Timeout validation errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimeoutValidationError {
    #[error("{name} timeout must be in (0, 3600] seconds, got {value}")]
    CallOutOfBounds { name: &'static str, value: u64 },

    #[error("termination_grace_seconds must be in [0, 60], got {value}")]
    GraceOutOfBounds { value: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_config_default() {
        let config = TimeoutConfig::default();
        assert_eq!(config.sandbox_seconds, 20);
        assert_eq!(config.synthesis_seconds, 60);
        assert_eq!(config.extraction_seconds, 60);
        assert_eq!(config.termination_grace_seconds, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_sandbox() {
        let config = TimeoutConfig {
            sandbox_seconds: 0,
            ..TimeoutConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(TimeoutValidationError::CallOutOfBounds {
                name: "sandbox",
                value: 0
            })
        );
    }

    #[test]
    fn test_validation_synthesis_too_large() {
        let config = TimeoutConfig {
            synthesis_seconds: MAX_CALL_SECONDS + 1,
            ..TimeoutConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TimeoutValidationError::CallOutOfBounds {
                name: "synthesis",
                ..
            })
        ));
    }

    #[test]
    fn test_validation_grace() {
        let zero = TimeoutConfig {
            termination_grace_seconds: 0,
            ..TimeoutConfig::default()
        };
        assert!(zero.validate().is_ok());

        let long = TimeoutConfig {
            termination_grace_seconds: 61,
            ..TimeoutConfig::default()
        };
        assert!(matches!(
            long.validate(),
            Err(TimeoutValidationError::GraceOutOfBounds { value: 61 })
        ));
    }

    #[test]
    fn test_error_messages() {
        let err = TimeoutValidationError::CallOutOfBounds {
            name: "extraction",
            value: 0,
        };
        assert_eq!(
            err.to_string(),
            "extraction timeout must be in (0, 3600] seconds, got 0"
        );
    }
}
