//! Service configuration

use kernel_api::Timeout;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Arena budget used when none is configured
pub const DEFAULT_ARENA_SIZE: usize = 1024;

/// How long `call()` waits for the service thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CallTimeout {
    /// Wait until the request is handled
    #[default]
    Unbounded,
    /// Give up after the duration, withdrawing the request if it is still
    /// queued and leaving cleanup to the service thread otherwise
    CancelAfter(Duration),
}

impl CallTimeout {
    /// The wait applied to the caller's completion signal
    pub fn as_timeout(&self) -> Timeout {
        match self {
            CallTimeout::Unbounded => Timeout::Forever,
            CallTimeout::CancelAfter(duration) => Timeout::After(*duration),
        }
    }
}

/// Configuration of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Byte budget of the envelope arena
    pub arena_size: usize,
    /// Caller-side wait policy
    pub call_timeout: CallTimeout,
}

impl ServiceConfig {
    /// Creates a configuration with the given arena budget
    pub fn new(arena_size: usize) -> Self {
        Self {
            arena_size,
            call_timeout: CallTimeout::default(),
        }
    }

    /// Sets the caller-side wait policy
    pub fn with_call_timeout(mut self, call_timeout: CallTimeout) -> Self {
        self.call_timeout = call_timeout;
        self
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ARENA_SIZE)
    }
}
