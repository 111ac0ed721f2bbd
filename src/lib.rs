//! spec2sim - verify-and-refine loop for generated simulations
//!
//! A behavioral description is turned into a structured [`Specification`],
//! an external oracle writes simulation code for it, the code runs in a
//! sandbox, and its `[SIM]` trace is checked against the specification.
//! Failures are fed back to the oracle until the trace verifies or the
//! retry budget runs out.

pub mod config;
pub mod diagram;
pub mod oracle;
pub mod pipeline;
pub mod signal;
pub mod simulate;
pub mod spec;
pub mod summary;
pub mod timeout;
pub mod verify;

pub use spec2sim_sandbox as sandbox;
pub use spec2sim_trace as trace;

pub use config::{EffectiveConfig, Settings};
pub use oracle::{CodeSynthesizer, OracleError, SpecExtractor};
pub use pipeline::{Controller, PipelineConfig, PipelineError, PipelineRun, RunResult};
pub use spec::{Specification, SpecError};
pub use summary::{ExitCode, FailureKind, Status};
pub use verify::{judge, Verdict, Verifier, VerifyPolicy};
