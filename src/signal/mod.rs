//! Signal handling for cooperative cancellation (SIGINT/SIGTERM)
//!
//! On the first signal the shared [`SignalState`] records a cancellation
//! request. The pipeline checks it before starting each attempt, so the
//! attempt in flight finishes (its sandbox session is released as usual)
//! and the run ends with a `CANCELLED` failure.
//!
//! On a second signal the process exits immediately with the failure exit
//! code.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use crate::summary::ExitCode;

/// Signal handler state
#[derive(Debug, Default)]
pub struct SignalState {
    cancel_requested: AtomicBool,
    signal_count: AtomicU8,
}

impl SignalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Request cancellation without a signal (tests, embedding callers)
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }

    /// Record a signal and return what to do about it
    pub fn handle_signal(&self) -> SignalAction {
        let count = self.signal_count.fetch_add(1, Ordering::SeqCst);

        match count {
            0 => {
                self.request_cancel();
                SignalAction::InitiateCancellation
            }
            1 => SignalAction::ImmediateExit,
            _ => SignalAction::Ignore,
        }
    }

    /// Reset the signal state (for testing)
    pub fn reset(&self) {
        self.cancel_requested.store(false, Ordering::SeqCst);
        self.signal_count.store(0, Ordering::SeqCst);
    }
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: finish the current attempt, start no new one
    InitiateCancellation,
    /// Second signal: exit now
    ImmediateExit,
    /// Third+ signal: ignore
    Ignore,
}

/// Installs the process-wide Ctrl-C handler around a [`SignalState`]
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self::with_state(Arc::new(SignalState::new()))
    }

    pub fn with_state(state: Arc<SignalState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> Arc<SignalState> {
        Arc::clone(&self.state)
    }

    /// Install the handler. Must be called at most once per process.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || match state.handle_signal() {
            SignalAction::InitiateCancellation => {
                eprintln!("\nReceived interrupt, finishing current attempt...");
            }
            SignalAction::ImmediateExit => {
                eprintln!("\nReceived second interrupt, exiting immediately...");
                std::process::exit(ExitCode::Failed.as_i32());
            }
            SignalAction::Ignore => {}
        })
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
