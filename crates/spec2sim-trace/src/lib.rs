//! Simulation trace model and parser.
//!
//! Generated simulations report their progress as `[SIM]` lines on stdout.
//! This crate turns that text back into an ordered sequence of [`Event`]s,
//! skipping anything that does not follow the line grammar:
//!
//! ```text
//! [SIM] Starting simulation
//! [SIM][t=<float>] ENTER state=<name>
//! [SIM][t=<float>] WAIT <float>s for <name>
//! [SIM][t=<float>] TRANSITION <from> -> <to> (reason=<text>)
//! [SIM][t=<float>] END state=<final>
//! [SIM][t=<float>] ERROR <text>
//! ```

mod event;
mod parser;

pub use event::{render, Event, EventKind, EventPayload};
pub use parser::{events, parse_trace, ParseWarning, ParsedTrace, TraceError, TraceParser};
