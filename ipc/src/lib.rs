//! # Inter-Process Communication (IPC)
//!
//! This crate defines the units of transit between callers and service
//! threads.
//!
//! ## Philosophy
//!
//! - **Explicit custody**: Every envelope has exactly one owner, and only owners free
//! - **Bounded**: Envelopes are charged to the target's arena, never to a global heap
//! - **Typed at the edges**: Payloads are bytes in transit and serde types at both ends
//!
//! ## Architecture
//!
//! A call produces:
//! - An [`Envelope`] (target slot id, reply wiring, inline payload) in the service arena
//! - A [`ReplyChannel`] shared by caller and dispatcher (completion signal, response, result code)
//!
//! Messages carry no reply wiring at all.

pub mod envelope;
pub mod payload;
pub mod reply;

pub use envelope::{Custody, Envelope, EnvelopeHandle, ENVELOPE_HEADER_SIZE};
pub use payload::{decode, CodecError, Payload};
pub use reply::{CompletionCallback, Delivery, ReplyChannel};
