//! Command declarations and slots
//!
//! A command is declared as a marker type implementing [`Command`]. The
//! service builder turns each registered command into a [`CommandSlot`]
//! and hands back a typed [`CommandRef`] used to call it.

use core_types::{Reply, ReturnCode, ServiceId, SlotId, ZervError};
use ipc::{decode, Delivery, EnvelopeHandle, Payload};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sim_kernel::Semaphore;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

/// Outcome returned by command handlers
pub type HandlerResult = Result<Reply, ZervError>;

/// A request/response unit with at most one call in flight
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use zerv::Command;
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct Text {
///     text: String,
/// }
///
/// struct Echo;
///
/// impl Command for Echo {
///     const NAME: &'static str = "echo";
///     type Request = Text;
///     type Response = Text;
/// }
/// ```
pub trait Command: 'static {
    /// Name used in logs
    const NAME: &'static str;
    /// Request parameters
    type Request: Serialize + DeserializeOwned + Send + 'static;
    /// Response filled in by the handler
    type Response: Serialize + DeserializeOwned + Default + Send + 'static;
}

/// Typed reference to a command slot of one service
pub struct CommandRef<C> {
    pub(crate) service: ServiceId,
    pub(crate) index: usize,
    _marker: PhantomData<fn() -> C>,
}

impl<C> CommandRef<C> {
    pub(crate) fn new(service: ServiceId, index: usize) -> Self {
        Self {
            service,
            index,
            _marker: PhantomData,
        }
    }

    /// Service the command belongs to
    pub fn service(&self) -> ServiceId {
        self.service
    }
}

impl<C> Clone for CommandRef<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for CommandRef<C> {}

impl<C: Command> fmt::Debug for CommandRef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRef")
            .field("command", &C::NAME)
            .field("service", &self.service)
            .field("index", &self.index)
            .finish()
    }
}

pub(crate) type ErasedCommandHandler =
    Box<dyn Fn(&Payload, &mut Vec<u8>) -> HandlerResult + Send + Sync + 'static>;

/// Wraps a typed handler so it works on payload bytes.
///
/// The response buffer arrives holding the caller's encoded response and
/// leaves holding whatever the handler wrote, whatever it returned.
pub(crate) fn erase_handler<C, F>(handler: F) -> ErasedCommandHandler
where
    C: Command,
    F: Fn(&C::Request, &mut C::Response) -> HandlerResult + Send + Sync + 'static,
{
    Box::new(move |payload, response| {
        let request: C::Request = payload.deserialize()?;
        let mut typed: C::Response = decode(response)?;
        let result = handler(&request, &mut typed);
        *response = Payload::new(&typed)?.into_bytes();
        result
    })
}

/// Deferred completion state of a command slot
#[derive(Debug)]
pub(crate) struct FutureRecord {
    pub(crate) active: bool,
    pub(crate) resolved: bool,
    /// Caller gave up before the handler deferred; resolution reaps the slot
    pub(crate) orphaned: bool,
    pub(crate) envelope: Option<EnvelopeHandle>,
    pub(crate) response: Vec<u8>,
    pub(crate) rc: ReturnCode,
    pub(crate) delivery: Delivery,
}

impl FutureRecord {
    fn idle() -> Self {
        Self {
            active: false,
            resolved: false,
            orphaned: false,
            envelope: None,
            response: Vec::new(),
            rc: ReturnCode::Error,
            delivery: Delivery::Buffered,
        }
    }

    /// Returns the record to idle, handing back the envelope to free
    pub(crate) fn clear(&mut self) -> Option<EnvelopeHandle> {
        let envelope = self.envelope.take();
        *self = Self::idle();
        envelope
    }
}

/// Runtime state of one command
pub(crate) struct CommandSlot {
    pub(crate) name: &'static str,
    pub(crate) id: SlotId,
    pub(crate) locked: AtomicBool,
    pub(crate) handler: ErasedCommandHandler,
    pub(crate) future: Mutex<FutureRecord>,
    pub(crate) future_signal: Semaphore,
}

impl CommandSlot {
    pub(crate) fn new(name: &'static str, id: SlotId, handler: ErasedCommandHandler) -> Self {
        Self {
            name,
            id,
            locked: AtomicBool::new(false),
            handler,
            future: Mutex::new(FutureRecord::idle()),
            future_signal: Semaphore::binary(),
        }
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

impl fmt::Debug for CommandSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSlot")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("locked", &self.is_locked())
            .field("future_active", &self.future.lock().active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Count {
        n: u32,
    }

    struct Double;

    impl Command for Double {
        const NAME: &'static str = "double";
        type Request = Count;
        type Response = Count;
    }

    #[test]
    fn test_erased_handler_round_trip() {
        let handler = erase_handler::<Double, _>(|req, resp| {
            resp.n = req.n * 2;
            Ok(Reply::Ready)
        });
        let payload = Payload::new(&Count { n: 21 }).unwrap();
        let mut response = Payload::new(&Count::default()).unwrap().into_bytes();

        assert_eq!(handler(&payload, &mut response), Ok(Reply::Ready));
        assert_eq!(decode::<Count>(&response).unwrap(), Count { n: 42 });
    }

    #[test]
    fn test_erased_handler_sees_caller_response() {
        let handler = erase_handler::<Double, _>(|_, resp| {
            resp.n += 1;
            Err(ZervError::Error)
        });
        let payload = Payload::new(&Count { n: 0 }).unwrap();
        let mut response = Payload::new(&Count { n: 9 }).unwrap().into_bytes();

        assert_eq!(handler(&payload, &mut response), Err(ZervError::Error));
        assert_eq!(decode::<Count>(&response).unwrap(), Count { n: 10 });
    }

    #[test]
    fn test_erased_handler_rejects_bad_request() {
        let handler = erase_handler::<Double, _>(|_, _| Ok(Reply::Ready));
        let payload = Payload::from_bytes(b"not json".to_vec());
        let mut response = Vec::new();
        assert_eq!(handler(&payload, &mut response), Err(ZervError::Error));
    }

    #[test]
    fn test_future_record_clear() {
        let mut record = FutureRecord::idle();
        record.active = true;
        record.response = vec![1, 2, 3];
        assert!(record.clear().is_none());
        assert!(!record.active);
        assert!(record.response.is_empty());
    }
}
