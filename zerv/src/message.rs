//! Fire-and-forget messages

use core_types::{ServiceId, SlotId, ZervError};
use ipc::Payload;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

/// A fire-and-forget unit with no response channel
pub trait Message: 'static {
    /// Name used in logs
    const NAME: &'static str;
    /// Message parameters
    type Params: Serialize + DeserializeOwned + Send + 'static;
}

/// Typed reference to a message slot of one service
pub struct MessageRef<M> {
    pub(crate) service: ServiceId,
    pub(crate) index: usize,
    _marker: PhantomData<fn() -> M>,
}

impl<M> MessageRef<M> {
    pub(crate) fn new(service: ServiceId, index: usize) -> Self {
        Self {
            service,
            index,
            _marker: PhantomData,
        }
    }
}

impl<M> Clone for MessageRef<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for MessageRef<M> {}

impl<M: Message> fmt::Debug for MessageRef<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRef")
            .field("message", &M::NAME)
            .field("service", &self.service)
            .field("index", &self.index)
            .finish()
    }
}

/// Reference to a raw message slot, whose handler receives plain bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMessageRef {
    pub(crate) service: ServiceId,
    pub(crate) index: usize,
}

pub(crate) enum MessageHandler {
    Typed(Box<dyn Fn(&Payload) -> Result<(), ZervError> + Send + Sync + 'static>),
    Raw(Box<dyn Fn(&[u8]) + Send + Sync + 'static>),
}

impl MessageHandler {
    pub(crate) fn typed<P, F>(handler: F) -> Self
    where
        P: DeserializeOwned,
        F: Fn(&P) + Send + Sync + 'static,
    {
        MessageHandler::Typed(Box::new(move |payload| {
            let params: P = payload.deserialize()?;
            handler(&params);
            Ok(())
        }))
    }

    pub(crate) fn invoke(&self, payload: &Payload) -> Result<(), ZervError> {
        match self {
            MessageHandler::Typed(handler) => handler(payload),
            MessageHandler::Raw(handler) => {
                handler(payload.as_bytes());
                Ok(())
            }
        }
    }
}

/// Runtime state of one message or topic subscription
pub(crate) struct MessageSlot {
    pub(crate) name: String,
    pub(crate) id: SlotId,
    pub(crate) locked: AtomicBool,
    pub(crate) handler: MessageHandler,
}

impl MessageSlot {
    pub(crate) fn new(name: String, id: SlotId, handler: MessageHandler) -> Self {
        Self {
            name,
            id,
            locked: AtomicBool::new(false),
            handler,
        }
    }
}

impl fmt::Debug for MessageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageSlot")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("locked", &self.locked.load(Ordering::Relaxed))
            .field("raw", &matches!(self.handler, MessageHandler::Raw(_)))
            .finish()
    }
}
