//! Bounded child-process execution.
//!
//! Spawns a program with piped stdio, captures both output streams on
//! reader threads, and enforces a wall-clock timeout. On timeout the child's
//! process group receives SIGTERM, then SIGKILL once the grace period has
//! passed. When the child exits on its own, whatever is left of its process
//! group is killed, and the reader threads are only waited on until the
//! deadline plus grace.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Marker appended to a stream that hit the capture limit.
pub const TRUNCATION_MARKER: &str = "\n[output truncated]\n";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors that prevent a process from producing any output at all.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error while supervising process: {0}")]
    Io(#[from] io::Error),
}

/// What to run and under which limits.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Complete environment; the parent's environment is not inherited.
    pub env: BTreeMap<String, String>,
    pub current_dir: Option<PathBuf>,
    pub stdin: Option<Vec<u8>>,
    pub timeout: Duration,
    /// Time between SIGTERM and SIGKILL.
    pub grace: Duration,
    /// Per-stream capture limit in bytes.
    pub max_output_bytes: usize,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            current_dir: None,
            stdin: None,
            timeout: Duration::from_secs(20),
            grace: Duration::from_secs(2),
            max_output_bytes: 1024 * 1024,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn stdin(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(bytes.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Captured result of a finished (or killed) process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Terminating signal name, if any.
    pub signal: Option<String>,
    pub timed_out: bool,
    pub truncated: bool,
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Build an environment from the parent's variables named in `allowlist`.
pub fn allowlisted_env(allowlist: &[String]) -> BTreeMap<String, String> {
    allowlist
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|value| (key.clone(), value)))
        .collect()
}

/// Run a process to completion or timeout.
pub fn run_process(spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
    let start = Instant::now();

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .env_clear()
        .envs(&spec.env)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &spec.current_dir {
        command.current_dir(dir);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: spec.program.clone(),
        source,
    })?;

    let stdin_handle = match (child.stdin.take(), spec.stdin.clone()) {
        (Some(mut pipe), Some(bytes)) => Some(thread::spawn(move || {
            // The child may exit without reading; a broken pipe is not our failure.
            let _ = pipe.write_all(&bytes);
        })),
        _ => None,
    };
    let stdout_handle = child
        .stdout
        .take()
        .map(|s| spawn_capture(s, spec.max_output_bytes));
    let stderr_handle = child
        .stderr
        .take()
        .map(|s| spawn_capture(s, spec.max_output_bytes));

    let mut timed_out = false;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if start.elapsed() >= spec.timeout {
            timed_out = true;
            terminate_child(&mut child, spec.grace)?;
            break child.wait()?;
        }
        thread::sleep(POLL_INTERVAL);
    };

    // Background children may still hold the output pipes.
    kill_group(&child);

    let deadline = (start + spec.timeout).max(Instant::now()) + spec.grace;
    if let Some(handle) = stdin_handle {
        if wait_finished(&handle, deadline) {
            let _ = handle.join();
        }
    }
    let (stdout, stdout_truncated, stdout_done) = join_capture(stdout_handle, deadline);
    let (stderr, stderr_truncated, stderr_done) = join_capture(stderr_handle, deadline);
    if !(stdout_done && stderr_done) {
        timed_out = true;
    }

    let exit_code = status.code();
    let signal = if exit_code.is_none() {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            status.signal().map(|s| format!("SIG{}", s))
        }
        #[cfg(not(unix))]
        {
            None
        }
    } else {
        None
    };

    Ok(ProcessOutput {
        stdout,
        stderr,
        exit_code,
        signal,
        timed_out,
        truncated: stdout_truncated || stderr_truncated,
        duration: start.elapsed(),
    })
}

type CaptureHandle = JoinHandle<(Vec<u8>, bool)>;

fn spawn_capture<R: Read + Send + 'static>(mut reader: R, limit: usize) -> CaptureHandle {
    thread::spawn(move || {
        let mut kept = Vec::new();
        let mut truncated = false;
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let room = limit.saturating_sub(kept.len());
                    if n > room {
                        truncated = true;
                    }
                    kept.extend_from_slice(&buf[..n.min(room)]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        (kept, truncated)
    })
}

fn wait_finished<T>(handle: &JoinHandle<T>, deadline: Instant) -> bool {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
    true
}

/// Collect a reader's output. A reader still blocked at `deadline` is
/// abandoned; the third field is false in that case.
fn join_capture(handle: Option<CaptureHandle>, deadline: Instant) -> (String, bool, bool) {
    let Some(handle) = handle else {
        return (String::new(), false, true);
    };
    if !wait_finished(&handle, deadline) {
        return (String::new(), false, false);
    }
    let (bytes, truncated) = handle.join().unwrap_or_default();
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if truncated {
        text.push_str(TRUNCATION_MARKER);
    }
    (text, truncated, true)
}

/// SIGKILL whatever remains of the child's process group.
fn kill_group(child: &Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let _ = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL);
    }
    #[cfg(not(unix))]
    {
        let _ = child;
    }
}

/// Terminate a child gracefully then forcefully.
fn terminate_child(child: &mut Child, grace: Duration) -> io::Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let pgid = Pid::from_raw(child.id() as i32);
        let _ = killpg(pgid, Signal::SIGTERM);

        let start = Instant::now();
        while start.elapsed() < grace {
            if child.try_wait()?.is_some() {
                // Leader is gone; make sure stragglers holding our pipes go too.
                let _ = killpg(pgid, Signal::SIGKILL);
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
        let _ = killpg(pgid, Signal::SIGKILL);
    }
    #[cfg(not(unix))]
    {
        let _ = grace;
    }

    let _ = child.kill();
    Ok(())
}
