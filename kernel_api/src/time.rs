//! Timeout abstractions
//!
//! Every blocking primitive takes a [`Timeout`]. Waiting code converts it
//! to a [`Deadline`] once, so retries after spurious wakeups never extend
//! the total wait.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// How long a blocking operation may wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeout {
    /// Return immediately if the operation cannot complete
    NoWait,
    /// Wait until the operation completes
    Forever,
    /// Wait at most the given duration
    After(Duration),
}

impl Timeout {
    /// Creates a bounded timeout from milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        Timeout::After(Duration::from_millis(millis))
    }

    /// Returns true if the operation must not block at all
    pub fn is_no_wait(&self) -> bool {
        match self {
            Timeout::NoWait => true,
            Timeout::Forever => false,
            Timeout::After(duration) => duration.is_zero(),
        }
    }

    /// Starts the clock for this timeout
    pub fn deadline(&self) -> Deadline {
        match self {
            Timeout::NoWait => Deadline::expired(),
            Timeout::Forever => Deadline::forever(),
            Timeout::After(duration) => Deadline::after(*duration),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Timeout::After(duration)
    }
}

/// A point in time after which a wait gives up
///
/// `None` inside means the wait is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline that never expires
    pub fn forever() -> Self {
        Self(None)
    }

    /// A deadline that has already expired
    pub fn expired() -> Self {
        Self(Some(Instant::now()))
    }

    /// A deadline `duration` from now
    pub fn after(duration: Duration) -> Self {
        // Durations too large to represent are treated as unbounded.
        Self(Instant::now().checked_add(duration))
    }

    /// Returns the instant to wait until, `None` for an unbounded wait
    pub fn instant(&self) -> Option<Instant> {
        self.0
    }

    /// Returns true once the deadline has passed
    pub fn has_expired(&self) -> bool {
        match self.0 {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    /// Time left before expiry, `None` for an unbounded wait
    pub fn remaining(&self) -> Option<Duration> {
        self.0
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_no_wait() {
        assert!(Timeout::NoWait.is_no_wait());
        assert!(Timeout::After(Duration::ZERO).is_no_wait());
        assert!(!Timeout::Forever.is_no_wait());
        assert!(!Timeout::from_millis(5).is_no_wait());
    }

    #[test]
    fn test_timeout_from_duration() {
        let timeout: Timeout = Duration::from_secs(1).into();
        assert_eq!(timeout, Timeout::from_millis(1000));
    }

    #[test]
    fn test_forever_deadline() {
        let deadline = Timeout::Forever.deadline();
        assert!(!deadline.has_expired());
        assert_eq!(deadline.remaining(), None);
        assert_eq!(deadline.instant(), None);
    }

    #[test]
    fn test_no_wait_deadline_is_expired() {
        let deadline = Timeout::NoWait.deadline();
        assert!(deadline.has_expired());
        assert_eq!(deadline.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_bounded_deadline() {
        let deadline = Timeout::from_millis(10_000).deadline();
        assert!(!deadline.has_expired());
        let remaining = deadline.remaining().unwrap();
        assert!(remaining > Duration::from_millis(9_000));
        assert!(remaining <= Duration::from_millis(10_000));
    }
}
