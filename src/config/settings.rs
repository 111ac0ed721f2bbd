//! Typed view of the merged configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use spec2sim_sandbox::ProcessSandboxConfig;

use super::defaults::BuiltinDefaults;
use super::effective::ConfigError;
use crate::oracle::CommandOracle;
use crate::pipeline::PipelineConfig;
use crate::timeout::TimeoutConfig;
use crate::verify::{TimingTolerance, VerifyPolicy};

/// Highest accepted `pipeline.max_attempts`
pub const MAX_ATTEMPTS_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub max_attempts: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_attempts: BuiltinDefaults::default().max_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    pub interpreter: String,
    pub interpreter_args: Vec<String>,
    pub timeout_seconds: u64,
    pub termination_grace_seconds: u64,
    pub max_output_bytes: u64,
    pub env_allowlist: Vec<String>,
    pub workspace_root: Option<PathBuf>,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        let d = BuiltinDefaults::default();
        Self {
            interpreter: d.sandbox_interpreter,
            interpreter_args: Vec::new(),
            timeout_seconds: d.sandbox_timeout_seconds,
            termination_grace_seconds: d.termination_grace_seconds,
            max_output_bytes: d.max_output_bytes,
            env_allowlist: ProcessSandboxConfig::default().env_allowlist,
            workspace_root: None,
        }
    }
}

/// A command oracle (`synthesis` or `extraction` section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub command: Option<String>,
    pub args: Vec<String>,
    pub timeout_seconds: u64,
    pub env_passthrough: Vec<String>,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_seconds: BuiltinDefaults::default().synthesis_timeout_seconds,
            env_passthrough: Vec::new(),
        }
    }
}

impl OracleSettings {
    /// The configured oracle, if a command is set.
    pub fn oracle(&self) -> Option<CommandOracle> {
        let program = self.command.as_deref()?.trim();
        if program.is_empty() {
            return None;
        }
        Some(
            CommandOracle::new(program)
                .args(self.args.iter().cloned())
                .timeout(std::time::Duration::from_secs(self.timeout_seconds))
                .env_passthrough(self.env_passthrough.iter().cloned()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifySettings {
    pub structural_failures_retryable: bool,
    pub tolerance: TimingTolerance,
}

impl Default for VerifySettings {
    fn default() -> Self {
        let d = BuiltinDefaults::default();
        Self {
            structural_failures_retryable: d.structural_failures_retryable,
            tolerance: TimingTolerance {
                integer_exact: d.integer_exact,
                relative: d.relative_tolerance,
                sum_waits: d.sum_waits,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub artifacts: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        let d = BuiltinDefaults::default();
        Self {
            dir: PathBuf::from(d.output_dir),
            artifacts: d.write_artifacts,
        }
    }
}

/// All configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pipeline: PipelineSettings,
    pub sandbox: SandboxSettings,
    pub synthesis: OracleSettings,
    pub extraction: OracleSettings,
    pub verify: VerifySettings,
    pub output: OutputSettings,
}

impl Settings {
    /// Deserialize and validate a merged config value.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_value(value.clone())
            .map_err(|e| ConfigError::ParseError(format!("invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timeouts().validate()?;

        if self.pipeline.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "pipeline.max_attempts must be at most {}, got {}",
                MAX_ATTEMPTS_LIMIT, self.pipeline.max_attempts
            )));
        }

        let relative = self.verify.tolerance.relative;
        if !(0.0..1.0).contains(&relative) {
            return Err(ConfigError::ValidationError(format!(
                "verify.tolerance.relative must be in [0, 1), got {}",
                relative
            )));
        }

        if self.sandbox.interpreter.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "sandbox.interpreter must not be empty".to_string(),
            ));
        }

        if self.sandbox.max_output_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "sandbox.max_output_bytes must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn timeouts(&self) -> TimeoutConfig {
        TimeoutConfig {
            sandbox_seconds: self.sandbox.timeout_seconds,
            synthesis_seconds: self.synthesis.timeout_seconds,
            extraction_seconds: self.extraction.timeout_seconds,
            termination_grace_seconds: self.sandbox.termination_grace_seconds,
        }
    }

    pub fn verify_policy(&self) -> VerifyPolicy {
        VerifyPolicy {
            structural_failures_retryable: self.verify.structural_failures_retryable,
            tolerance: self.verify.tolerance,
            sandbox_timeout: self.timeouts().sandbox(),
        }
    }

    pub fn sandbox_config(&self) -> ProcessSandboxConfig {
        ProcessSandboxConfig {
            interpreter: self.sandbox.interpreter.clone(),
            interpreter_args: self.sandbox.interpreter_args.clone(),
            env_allowlist: self.sandbox.env_allowlist.clone(),
            workspace_root: self.sandbox.workspace_root.clone(),
            termination_grace: self.timeouts().termination_grace(),
            max_output_bytes: usize::try_from(self.sandbox.max_output_bytes).unwrap_or(usize::MAX),
            ..ProcessSandboxConfig::default()
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_attempts: self.pipeline.max_attempts,
        }
    }
}
