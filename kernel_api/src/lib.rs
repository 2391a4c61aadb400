//! # Kernel API
//!
//! This crate defines the interface between the service runtime and the
//! host it runs on.
//!
//! ## Philosophy
//!
//! The host provides **mechanisms**, not policies:
//! - Thread creation (fixed stack, explicit priority)
//! - Waiting (explicit timeouts, never ambient)
//!
//! ## Design Goals
//!
//! 1. **Testability**: Everything above this crate runs on a plain std host
//! 2. **Explicitness**: Every blocking operation names its [`Timeout`]
//! 3. **Simplicity**: Minimal surface area
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A scheduler (priorities are carried, not interpreted)
//! - An async runtime (callers block real threads)

pub mod error;
pub mod thread;
pub mod time;

pub use error::KernelError;
pub use thread::{ThreadDescriptor, ThreadEntry, ThreadHandle, ThreadSpawner};
pub use time::{Deadline, Timeout};
