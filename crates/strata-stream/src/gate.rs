//! Generation gate: lets mesh builders wait out a window-generation pass.
//!
//! A pass clears and refills the active table. Builders that check
//! activity call [`GenerationGate::wait_idle`] first so they never observe
//! the table half rebuilt.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct GateState {
    in_progress: bool,
    closed: bool,
}

/// Tracks whether a window-generation pass is running.
#[derive(Default)]
pub struct GenerationGate {
    state: Mutex<GateState>,
    idle: Condvar,
}

/// Marks a pass as running until dropped.
pub struct PassGuard<'a> {
    gate: &'a GenerationGate,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.gate.state.lock().in_progress = false;
        self.gate.idle.notify_all();
    }
}

impl GenerationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a pass. Passes themselves are serialized by the caller.
    pub fn begin(&self) -> PassGuard<'_> {
        self.state.lock().in_progress = true;
        PassGuard { gate: self }
    }

    pub fn is_in_progress(&self) -> bool {
        self.state.lock().in_progress
    }

    /// Waits until no pass is running.
    ///
    /// Returns `false` if the gate was closed for shutdown. `timeout` bounds
    /// each wait so a caller can re-check its own cancellation flag.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        while state.in_progress && !state.closed {
            if self.idle.wait_for(&mut state, timeout).timed_out() {
                break;
            }
        }
        !state.closed && !state.in_progress
    }

    /// Wakes every waiter and makes future waits return immediately.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.idle.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
