//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

use spec2sim_sandbox::ENV_ALLOWLIST;

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Retries after the first attempt (default: 10)
    pub max_attempts: u32,

    /// Interpreter for generated code (default: "python3")
    pub sandbox_interpreter: String,

    /// Per-execution timeout (default: 20)
    pub sandbox_timeout_seconds: u64,

    /// SIGTERM → SIGKILL grace (default: 2)
    pub termination_grace_seconds: u64,

    /// Per-stream capture limit (default: 1 MiB)
    pub max_output_bytes: u64,

    /// Code-generation request timeout (default: 60)
    pub synthesis_timeout_seconds: u64,

    /// Extraction request timeout (default: 60)
    pub extraction_timeout_seconds: u64,

    /// Whether structural verification failures are retried (default: true)
    pub structural_failures_retryable: bool,

    /// Integer durations must match exactly (default: true)
    pub integer_exact: bool,

    /// Relative timing tolerance (default: 0.05)
    pub relative_tolerance: f64,

    /// Accept summed WAITs before a timed transition (default: false)
    pub sum_waits: bool,

    /// Run artifact directory (default: "outputs")
    pub output_dir: String,

    /// Write run artifacts (default: true)
    pub write_artifacts: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            sandbox_interpreter: "python3".to_string(),
            sandbox_timeout_seconds: 20,
            termination_grace_seconds: 2,
            max_output_bytes: 1024 * 1024,
            synthesis_timeout_seconds: 60,
            extraction_timeout_seconds: 60,
            structural_failures_retryable: true,
            integer_exact: true,
            relative_tolerance: 0.05,
            sum_waits: false,
            output_dir: "outputs".to_string(),
            write_artifacts: true,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "pipeline": {
                "max_attempts": self.max_attempts
            },
            "sandbox": {
                "interpreter": self.sandbox_interpreter,
                "interpreter_args": [],
                "timeout_seconds": self.sandbox_timeout_seconds,
                "termination_grace_seconds": self.termination_grace_seconds,
                "max_output_bytes": self.max_output_bytes,
                "env_allowlist": ENV_ALLOWLIST
            },
            "synthesis": {
                "args": [],
                "timeout_seconds": self.synthesis_timeout_seconds,
                "env_passthrough": []
            },
            "extraction": {
                "args": [],
                "timeout_seconds": self.extraction_timeout_seconds,
                "env_passthrough": []
            },
            "verify": {
                "structural_failures_retryable": self.structural_failures_retryable,
                "tolerance": {
                    "integer_exact": self.integer_exact,
                    "relative": self.relative_tolerance,
                    "sum_waits": self.sum_waits
                }
            },
            "output": {
                "dir": self.output_dir,
                "artifacts": self.write_artifacts
            }
        })
    }
}
