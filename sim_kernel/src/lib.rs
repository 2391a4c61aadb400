//! # Simulated Kernel
//!
//! This crate provides the host implementation of the primitives the
//! service runtime is built on.
//!
//! ## Purpose
//!
//! The runtime needs a handful of kernel objects and nothing else:
//! - A fixed-capacity arena with graceful allocation failure ([`Arena`])
//! - A FIFO with blocking pop and non-blocking push ([`Fifo`])
//! - A binary completion signal ([`Semaphore`])
//! - A raisable flag for external conditions ([`PollSignal`])
//! - A multi-source blocking wait ([`poll()`])
//! - Short scheduler-locked critical sections ([`sched`])
//! - Thread creation ([`HostThreads`]) and timers ([`Timer`])
//!
//! ## Philosophy
//!
//! **Testability is a first-class design constraint.**
//!
//! Everything here runs on plain std threads under `cargo test`. It is not
//! a mock: services running on it see the same blocking, wakeup and
//! exhaustion behaviour they would see on a real kernel.

pub mod arena;
pub mod fifo;
pub mod poll;
pub mod sched;
pub mod semaphore;
pub mod signal;
pub mod threads;
pub mod timer;

pub use arena::{Arena, ArenaError, ArenaHandle};
pub use fifo::Fifo;
pub use poll::{poll, PollEvent, PollState, PollType, PollWaiters, Pollable};
pub use semaphore::Semaphore;
pub use signal::PollSignal;
pub use threads::HostThreads;
pub use timer::Timer;
