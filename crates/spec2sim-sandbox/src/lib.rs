//! Sandbox executor for generated simulation code.
//!
//! The contract is a single hop: open a session, `execute(code, timeout)`,
//! get `{stdout, stderr}` back, close the session. Execution never fails
//! outward; timeouts, spawn failures and I/O trouble come back as an
//! [`ExecutionResult`] with a [`SandboxFault`] and a non-empty stderr.
//!
//! [`ProcessSandbox`] isolates namespaces (fresh process, fresh working
//! directory, cleared environment). It is not a security boundary: callers
//! that need confinement must run it under a process jail, VM or seccomp
//! profile.

pub mod process;
mod result;
mod sandbox;
mod session;

pub use process::{run_process, ProcessError, ProcessOutput, ProcessSpec};
pub use result::{ExecutionResult, FaultKind, SandboxFault};
pub use sandbox::{ProcessSandbox, ProcessSandboxConfig, ProcessSession, ENV_ALLOWLIST};
pub use session::{SandboxError, SandboxExecutor, SandboxSession, SessionGuard};
