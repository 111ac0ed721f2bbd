//! Interpreter-process sandbox.
//!
//! Every session gets its own temporary working directory and every
//! execution is a fresh interpreter process with a cleared environment, so
//! no globals, handles or buffers survive from one submission to the next.
//! This is namespace isolation only; it does not confine filesystem,
//! network or CPU access.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use crate::process::{allowlisted_env, run_process, ProcessError, ProcessSpec};
use crate::result::{ExecutionResult, FaultKind};
use crate::session::{SandboxError, SandboxExecutor, SandboxSession};

/// Environment variables passed through from the parent.
pub const ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "LANG", "LC_ALL", "LC_CTYPE", "TMPDIR"];

/// Configuration for [`ProcessSandbox`].
#[derive(Debug, Clone)]
pub struct ProcessSandboxConfig {
    /// Interpreter program, e.g. `python3`.
    pub interpreter: String,
    /// Arguments placed before the script path.
    pub interpreter_args: Vec<String>,
    /// File name the submitted code is written to.
    pub script_name: String,
    /// Parent variables copied into the child environment.
    pub env_allowlist: Vec<String>,
    /// Extra variables always set in the child environment.
    pub extra_env: BTreeMap<String, String>,
    /// Parent directory for session workspaces (system temp dir if unset).
    pub workspace_root: Option<PathBuf>,
    pub termination_grace: Duration,
    pub max_output_bytes: usize,
}

impl Default for ProcessSandboxConfig {
    fn default() -> Self {
        let mut extra_env = BTreeMap::new();
        extra_env.insert("PYTHONUNBUFFERED".to_string(), "1".to_string());
        extra_env.insert("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string());
        Self {
            interpreter: "python3".to_string(),
            interpreter_args: Vec::new(),
            script_name: "simulation.py".to_string(),
            env_allowlist: ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect(),
            extra_env,
            workspace_root: None,
            termination_grace: Duration::from_secs(2),
            max_output_bytes: 1024 * 1024,
        }
    }
}

/// Sandbox that runs code as a separate interpreter process.
#[derive(Debug, Clone, Default)]
pub struct ProcessSandbox {
    config: ProcessSandboxConfig,
}

impl ProcessSandbox {
    pub fn new(config: ProcessSandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessSandboxConfig {
        &self.config
    }
}

impl SandboxExecutor for ProcessSandbox {
    fn open(&self) -> Result<Box<dyn SandboxSession>, SandboxError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("spec2sim-");
        let workspace = match &self.config.workspace_root {
            Some(root) => {
                fs::create_dir_all(root).map_err(SandboxError::Workspace)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(SandboxError::Workspace)?;

        tracing::debug!(workspace = %workspace.path().display(), "opened sandbox session");
        Ok(Box::new(ProcessSession {
            config: self.config.clone(),
            workspace,
            executions: 0,
        }))
    }
}

/// A session backed by one temporary directory.
pub struct ProcessSession {
    config: ProcessSandboxConfig,
    workspace: TempDir,
    executions: usize,
}

impl ProcessSession {
    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    fn process_spec(&self, script: &Path, timeout: Duration) -> ProcessSpec {
        let mut spec = ProcessSpec::new(self.config.interpreter.clone())
            .args(self.config.interpreter_args.iter().cloned())
            .args([script.to_string_lossy().into_owned()])
            .current_dir(self.workspace.path())
            .timeout(timeout);
        spec.env = allowlisted_env(&self.config.env_allowlist);
        spec.env.extend(self.config.extra_env.clone());
        spec.grace = self.config.termination_grace;
        spec.max_output_bytes = self.config.max_output_bytes;
        spec
    }
}

impl SandboxSession for ProcessSession {
    fn execute(&mut self, code: &str, timeout: Duration) -> ExecutionResult {
        self.executions += 1;
        let script = self
            .workspace
            .path()
            .join(format!("{:03}-{}", self.executions, self.config.script_name));
        if let Err(e) = fs::write(&script, code) {
            return ExecutionResult::fault(
                FaultKind::Io,
                format!("could not write {}: {}", script.display(), e),
            );
        }

        let output = match run_process(&self.process_spec(&script, timeout)) {
            Ok(output) => output,
            Err(e @ ProcessError::Spawn { .. }) => {
                return ExecutionResult::fault(FaultKind::Spawn, e.to_string())
            }
            Err(e) => return ExecutionResult::fault(FaultKind::Io, e.to_string()),
        };

        let duration_ms = output.duration.as_millis() as u64;
        if output.timed_out {
            let mut result = ExecutionResult::fault(
                FaultKind::Timeout,
                format!("killed after {:.1}s", timeout.as_secs_f64()),
            );
            // Keep what the code printed before it was killed.
            result.stdout = output.stdout;
            result.stderr = format!("{}{}", output.stderr, result.stderr);
            result.duration_ms = duration_ms;
            return result;
        }

        let mut stderr = output.stderr;
        if stderr.trim().is_empty() && output.exit_code != Some(0) {
            stderr = match (&output.exit_code, &output.signal) {
                (Some(code), _) => format!("process exited with code {}\n", code),
                (None, Some(signal)) => format!("process terminated by {}\n", signal),
                (None, None) => "process terminated abnormally\n".to_string(),
            };
        }

        tracing::debug!(
            exit_code = ?output.exit_code,
            duration_ms,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = stderr.len(),
            "sandbox execution finished"
        );

        ExecutionResult {
            stdout: output.stdout,
            stderr,
            exit_code: output.exit_code,
            fault: None,
            duration_ms,
        }
    }

    fn close(self: Box<Self>) -> Result<(), SandboxError> {
        let path = self.workspace.path().to_path_buf();
        self.workspace
            .close()
            .map_err(|e| SandboxError::Release(format!("{}: {}", path.display(), e)))
    }
}
