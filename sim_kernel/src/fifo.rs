//! Blocking FIFO queue
//!
//! Provides deterministic FIFO ordering. Capacity is not limited here:
//! whatever is queued was already charged to an arena by the producer.

use crate::poll::{PollState, PollWaiters, Pollable};
use kernel_api::Timeout;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;

/// FIFO queue with blocking pop and non-blocking push.
pub struct Fifo<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
    waiters: PollWaiters,
}

impl<T> Fifo<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            waiters: PollWaiters::new(),
        }
    }

    /// Returns the number of queued items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Appends an item, waking one blocked consumer and every poller.
    pub fn push(&self, item: T) {
        self.items.lock().push_back(item);
        self.available.notify_one();
        self.waiters.notify();
    }

    /// Pops the next item without blocking.
    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Pops the next item, waiting up to `timeout` for one to arrive.
    pub fn pop(&self, timeout: Timeout) -> Option<T> {
        let deadline = timeout.deadline();
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            match deadline.instant() {
                Some(at) => {
                    if self.available.wait_until(&mut items, at).timed_out() {
                        return items.pop_front();
                    }
                }
                None => self.available.wait(&mut items),
            }
        }
    }

    /// Removes the first queued item matching `pred`.
    pub fn remove_first(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        let mut items = self.items.lock();
        let index = items.iter().position(pred)?;
        items.remove(index)
    }
}

impl<T> Default for Fifo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Fifo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fifo").field("len", &self.len()).finish()
    }
}

impl<T: Send> Pollable for Fifo<T> {
    fn poll_state(&self) -> PollState {
        if self.is_empty() {
            PollState::NotReady
        } else {
            PollState::FifoDataAvailable
        }
    }

    fn waiters(&self) -> &PollWaiters {
        &self.waiters
    }
}
