//! Poll signal: a raisable flag carrying a result value

use crate::poll::{PollState, PollWaiters, Pollable};
use parking_lot::Mutex;

#[derive(Debug, Default, Clone, Copy)]
struct SignalState {
    signaled: bool,
    result: i32,
}

/// Flag any thread can raise and a poller can observe
#[derive(Debug, Default)]
pub struct PollSignal {
    state: Mutex<SignalState>,
    waiters: PollWaiters,
}

impl PollSignal {
    /// Creates a signal in the reset state
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the flag and the result
    pub fn init(&self) {
        *self.state.lock() = SignalState::default();
    }

    /// Raises the signal with `result`
    pub fn raise(&self, result: i32) {
        {
            let mut state = self.state.lock();
            state.signaled = true;
            state.result = result;
        }
        self.waiters.notify();
    }

    /// Clears the flag, keeping the last result
    pub fn reset(&self) {
        self.state.lock().signaled = false;
    }

    /// Returns the result if the signal is raised
    pub fn check(&self) -> Option<i32> {
        let state = self.state.lock();
        state.signaled.then_some(state.result)
    }
}

impl Pollable for PollSignal {
    fn poll_state(&self) -> PollState {
        if self.state.lock().signaled {
            PollState::Signaled
        } else {
            PollState::NotReady
        }
    }

    fn waiters(&self) -> &PollWaiters {
        &self.waiters
    }
}
