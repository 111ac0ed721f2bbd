//! Sandbox executor and session seams.

use std::time::Duration;

use thiserror::Error;

use crate::result::ExecutionResult;

/// Failures opening or releasing a session.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to prepare session workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("failed to release session: {0}")]
    Release(String),

    #[error("sandbox unavailable: {0}")]
    Unavailable(String),
}

/// Opens isolated execution sessions.
pub trait SandboxExecutor {
    /// Open a fresh session. Nothing from an earlier session is visible.
    fn open(&self) -> Result<Box<dyn SandboxSession>, SandboxError>;
}

/// One isolated execution namespace.
pub trait SandboxSession {
    /// Run `code`; never fails outward (see [`ExecutionResult`]).
    fn execute(&mut self, code: &str, timeout: Duration) -> ExecutionResult;

    /// Release everything the session holds.
    fn close(self: Box<Self>) -> Result<(), SandboxError>;
}

/// Scoped session handle: the session is closed when the guard drops.
///
/// Release failures are logged and swallowed.
pub struct SessionGuard {
    session: Option<Box<dyn SandboxSession>>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn SandboxSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// Open a session from `executor` and guard it.
    pub fn open(executor: &dyn SandboxExecutor) -> Result<Self, SandboxError> {
        executor.open().map(Self::new)
    }

    pub fn execute(&mut self, code: &str, timeout: Duration) -> ExecutionResult {
        match self.session.as_mut() {
            Some(session) => session.execute(code, timeout),
            None => ExecutionResult::fault(
                crate::result::FaultKind::Unavailable,
                "session already released",
            ),
        }
    }

    /// Close now instead of at drop.
    pub fn release(mut self) {
        self.close_inner();
    }

    fn close_inner(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close() {
                tracing::warn!(error = %e, "sandbox session release failed");
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.close_inner();
    }
}
