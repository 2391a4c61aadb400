//! Kernel error types

use thiserror::Error;

/// Errors that can occur when interacting with the host
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KernelError {
    /// Thread spawn failed
    #[error("Failed to spawn thread: {0}")]
    SpawnFailed(String),

    /// Descriptor cannot be satisfied by the host
    #[error("Invalid thread descriptor: {0}")]
    InvalidDescriptor(String),

    /// Thread terminated by panicking
    #[error("Thread panicked: {0}")]
    ThreadPanicked(String),
}
