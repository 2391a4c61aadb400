//! Request and message envelopes
//!
//! An [`Envelope`] is the unit of transit between a caller and a service
//! thread. It lives in the service's arena from the moment the caller
//! allocates it until exactly one party frees it.
//!
//! ## Custody
//!
//! The arena block is addressed through an [`EnvelopeHandle`], which is
//! not `Clone` and carries a [`Custody`] tag:
//!
//! ```text
//! Caller --enqueue--> Queued --dispatch--> Dispatching --defer--> Future
//!   ^                   |                      |                    |
//!   +-----reclaim-------+                    release             release
//! ```
//!
//! Only `Caller`, `Dispatching` and `Future` custody may release the block.

use crate::payload::Payload;
use crate::reply::ReplyChannel;
use core_types::{SlotId, SlotKind, ZervError};
use log::trace;
use sim_kernel::{Arena, ArenaHandle};
use std::sync::Arc;

/// Bytes charged for the envelope header: id, reply pointer, result code
pub const ENVELOPE_HEADER_SIZE: usize = 16;

/// Heap-allocated unit of transit
#[derive(Debug)]
pub struct Envelope {
    /// Target slot
    pub id: SlotId,
    /// Completion wiring, present for commands only
    pub reply: Option<Arc<ReplyChannel>>,
    /// Inline payload bytes
    pub payload: Payload,
}

impl Envelope {
    /// Creates a command envelope
    pub fn command(id: SlotId, reply: Arc<ReplyChannel>, payload: Payload) -> Self {
        Self {
            id,
            reply: Some(reply),
            payload,
        }
    }

    /// Creates a message envelope, which has no reply wiring
    pub fn message(id: SlotId, payload: Payload) -> Self {
        Self {
            id,
            reply: None,
            payload,
        }
    }

    /// Bytes this envelope occupies: header plus payload
    pub fn size(&self) -> usize {
        ENVELOPE_HEADER_SIZE + self.payload.len()
    }

    /// Checks the envelope is well formed and returns its target.
    ///
    /// # Errors
    ///
    /// * `Error` - unknown id, empty payload, or a command without reply wiring
    pub fn validate(&self) -> Result<(SlotKind, usize), ZervError> {
        let (kind, index) = self.id.decode().ok_or(ZervError::Error)?;
        if self.payload.is_empty() {
            return Err(ZervError::Error);
        }
        if kind == SlotKind::Command && self.reply.is_none() {
            return Err(ZervError::Error);
        }
        Ok((kind, index))
    }
}

/// Who is currently responsible for an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Custody {
    /// Allocated, not yet queued
    Caller,
    /// Sitting in the service queue
    Queued,
    /// Popped by the service thread
    Dispatching,
    /// Kept alive by an active future
    Future,
}

/// Owning handle to an envelope in an arena
#[derive(Debug, PartialEq, Eq)]
pub struct EnvelopeHandle {
    block: ArenaHandle,
    custody: Custody,
}

impl EnvelopeHandle {
    /// Allocates `envelope` in `arena` under caller custody.
    ///
    /// # Errors
    ///
    /// * `NoMem` - the arena cannot hold the envelope
    pub fn allocate(arena: &Arena<Envelope>, envelope: Envelope) -> Result<Self, ZervError> {
        let size = envelope.size();
        let block = arena.alloc(size, envelope).map_err(|e| {
            trace!(target: "ipc", "{}: {}", arena.name(), e);
            ZervError::NoMem
        })?;
        Ok(Self {
            block,
            custody: Custody::Caller,
        })
    }

    /// Arena block backing this envelope
    pub fn block(&self) -> ArenaHandle {
        self.block
    }

    /// Current custody
    pub fn custody(&self) -> Custody {
        self.custody
    }

    fn transfer(mut self, from: Custody, to: Custody) -> Self {
        debug_assert_eq!(
            self.custody, from,
            "envelope {} moved to {:?} from {:?}",
            self.block, to, self.custody
        );
        self.custody = to;
        self
    }

    /// Caller hands the envelope to the queue
    pub fn enqueue(self) -> Self {
        self.transfer(Custody::Caller, Custody::Queued)
    }

    /// Caller takes back an envelope it withdrew from the queue
    pub fn reclaim(self) -> Self {
        self.transfer(Custody::Queued, Custody::Caller)
    }

    /// Service thread takes the envelope off the queue
    pub fn dispatch(self) -> Self {
        self.transfer(Custody::Queued, Custody::Dispatching)
    }

    /// Service thread parks the envelope in a future
    pub fn defer(self) -> Self {
        self.transfer(Custody::Dispatching, Custody::Future)
    }

    /// Runs `f` on the envelope
    pub fn with<R>(
        &self,
        arena: &Arena<Envelope>,
        f: impl FnOnce(&Envelope) -> R,
    ) -> Result<R, ZervError> {
        arena.with(self.block, f).map_err(|_| ZervError::Error)
    }

    /// Frees the envelope, returning its contents.
    ///
    /// # Errors
    ///
    /// * `Error` - the block was already freed
    pub fn release(self, arena: &Arena<Envelope>) -> Result<Envelope, ZervError> {
        debug_assert_ne!(
            self.custody,
            Custody::Queued,
            "envelope {} released while queued",
            self.block
        );
        arena.free(self.block).map_err(|_| ZervError::Error)
    }
}
