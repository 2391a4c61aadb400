//! Counting semaphore with a ceiling
//!
//! A semaphore with limit 1 is the binary completion signal used by
//! callers waiting for a reply and by futures.

use crate::poll::{PollState, PollWaiters, Pollable};
use core_types::ZervError;
use kernel_api::Timeout;
use parking_lot::{Condvar, Mutex};

/// Counting semaphore
#[derive(Debug)]
pub struct Semaphore {
    count: Mutex<u32>,
    limit: u32,
    cond: Condvar,
    waiters: PollWaiters,
}

impl Semaphore {
    /// Creates a semaphore holding `initial` counts, never more than `limit`
    pub fn new(initial: u32, limit: u32) -> Self {
        Self {
            count: Mutex::new(initial.min(limit)),
            limit,
            cond: Condvar::new(),
            waiters: PollWaiters::new(),
        }
    }

    /// Creates an empty semaphore with capacity 1
    pub fn binary() -> Self {
        Self::new(0, 1)
    }

    /// Adds one count unless the limit is reached, waking one taker
    pub fn give(&self) {
        let mut count = self.count.lock();
        if *count < self.limit {
            *count += 1;
        }
        self.cond.notify_one();
        drop(count);
        self.waiters.notify();
    }

    /// Takes one count, waiting up to `timeout` for it.
    ///
    /// # Errors
    ///
    /// * `Timeout` - no count became available in time
    pub fn take(&self, timeout: Timeout) -> Result<(), ZervError> {
        let deadline = timeout.deadline();
        let mut count = self.count.lock();
        while *count == 0 {
            match deadline.instant() {
                Some(at) => {
                    if self.cond.wait_until(&mut count, at).timed_out() && *count == 0 {
                        return Err(ZervError::Timeout);
                    }
                }
                None => self.cond.wait(&mut count),
            }
        }
        *count -= 1;
        Ok(())
    }

    /// Drops every pending count
    pub fn reset(&self) {
        *self.count.lock() = 0;
    }

    /// Current count
    pub fn count(&self) -> u32 {
        *self.count.lock()
    }
}

impl Pollable for Semaphore {
    fn poll_state(&self) -> PollState {
        if self.count() > 0 {
            PollState::SemAvailable
        } else {
            PollState::NotReady
        }
    }

    fn waiters(&self) -> &PollWaiters {
        &self.waiters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_binary_semaphore_saturates() {
        let sem = Semaphore::binary();
        sem.give();
        sem.give();
        assert_eq!(sem.count(), 1);
        assert!(sem.take(Timeout::NoWait).is_ok());
        assert_eq!(sem.take(Timeout::NoWait), Err(ZervError::Timeout));
    }

    #[test]
    fn test_take_times_out() {
        let sem = Semaphore::binary();
        assert_eq!(sem.take(Timeout::from_millis(10)), Err(ZervError::Timeout));
    }

    #[test]
    fn test_take_wakes_on_give() {
        let sem = Arc::new(Semaphore::binary());
        let giver = Arc::clone(&sem);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            giver.give();
        });
        assert!(sem.take(Timeout::Forever).is_ok());
        handle.join().unwrap();
    }

    #[test]
    fn test_reset_drops_counts() {
        let sem = Semaphore::new(3, 5);
        sem.reset();
        assert_eq!(sem.count(), 0);
        assert_eq!(sem.poll_state(), PollState::NotReady);
    }

    #[test]
    fn test_poll_state_follows_count() {
        let sem = Semaphore::new(0, 2);
        assert_eq!(sem.poll_state(), PollState::NotReady);
        sem.give();
        assert_eq!(sem.poll_state(), PollState::SemAvailable);
    }
}
