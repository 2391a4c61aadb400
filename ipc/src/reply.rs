//! Per-call reply wiring
//!
//! A [`ReplyChannel`] is created by the caller for one command call and
//! shared with the dispatching thread through the envelope. It carries
//! the private completion signal, the response buffer and the result code.

use core_types::{ReturnCode, ZervError};
use kernel_api::Timeout;
use parking_lot::Mutex;
use sim_kernel::Semaphore;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

const WAITING: u8 = 0;
const COMPLETED: u8 = 1;
const ABANDONED: u8 = 2;

/// Function run when a deferred call is resolved
pub type CompletionCallback = Box<dyn FnOnce(ReturnCode) + Send + 'static>;

/// How the caller learns that a deferred call was resolved
pub enum Delivery {
    /// The caller collects the result itself
    Buffered,
    /// The resolver runs the callback, exactly once
    Callback(CompletionCallback),
}

impl Delivery {
    /// Wraps a completion callback
    pub fn callback(f: impl FnOnce(ReturnCode) + Send + 'static) -> Self {
        Delivery::Callback(Box::new(f))
    }

    /// Returns true for callback delivery
    pub fn is_callback(&self) -> bool {
        matches!(self, Delivery::Callback(_))
    }
}

impl Default for Delivery {
    fn default() -> Self {
        Delivery::Buffered
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivery::Buffered => f.write_str("Buffered"),
            Delivery::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

#[derive(Debug)]
struct ReplySlot {
    rc: ReturnCode,
    response: Vec<u8>,
    delivery: Delivery,
}

/// Completion signal, response buffer and result code of one call
pub struct ReplyChannel {
    signal: Semaphore,
    state: AtomicU8,
    slot: Mutex<ReplySlot>,
}

impl ReplyChannel {
    /// Creates the wiring for a call whose response buffer starts as `response`
    pub fn new(response: Vec<u8>, delivery: Delivery) -> Self {
        Self {
            signal: Semaphore::binary(),
            state: AtomicU8::new(WAITING),
            slot: Mutex::new(ReplySlot {
                rc: ReturnCode::Error,
                response,
                delivery,
            }),
        }
    }

    /// Runs `f` on the response buffer
    pub fn with_response<R>(&self, f: impl FnOnce(&mut Vec<u8>) -> R) -> R {
        f(&mut self.slot.lock().response)
    }

    /// Copy of the response buffer
    pub fn response(&self) -> Vec<u8> {
        self.slot.lock().response.clone()
    }

    /// Takes the delivery mode, leaving `Buffered` behind
    pub fn take_delivery(&self) -> Delivery {
        std::mem::take(&mut self.slot.lock().delivery)
    }

    /// Result code written by the dispatcher
    pub fn rc(&self) -> ReturnCode {
        self.slot.lock().rc
    }

    /// Records `rc` and wakes the caller.
    ///
    /// Returns false if the caller already gave up on the call; the
    /// dispatcher then owns the cleanup.
    pub fn complete(&self, rc: ReturnCode) -> bool {
        self.slot.lock().rc = rc;
        match self
            .state
            .compare_exchange(WAITING, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.signal.give();
                true
            }
            Err(_) => false,
        }
    }

    /// Waits for [`complete`](Self::complete), returning the recorded code
    pub fn wait(&self, timeout: Timeout) -> Result<ReturnCode, ZervError> {
        self.signal.take(timeout)?;
        Ok(self.rc())
    }

    /// Marks the call as abandoned by its caller.
    ///
    /// Returns false if completion won the race; the caller must then
    /// collect the result as usual.
    pub fn abandon(&self) -> bool {
        self.state
            .compare_exchange(WAITING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns true once the caller gave up
    pub fn is_abandoned(&self) -> bool {
        self.state.load(Ordering::Acquire) == ABANDONED
    }
}

impl fmt::Debug for ReplyChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyChannel")
            .field("state", &self.state.load(Ordering::Relaxed))
            .field("slot", &*self.slot.lock())
            .finish()
    }
}
