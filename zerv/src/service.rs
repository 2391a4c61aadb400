//! Services: construction, calls and dispatch
//!
//! A [`Service`] owns one arena, one request queue and the tables of
//! command, message and topic slots registered on its [`ServiceBuilder`].
//! After `build()` the tables never change; only slot lock flags and
//! future records are mutated.
//!
//! ## Call protocol
//!
//! 1. The caller test-and-sets the slot lock in a critical section
//!    (`LOCKED` if busy, nothing else happens).
//! 2. The caller allocates the envelope in the service arena (`NOMEM`
//!    releases the lock) and enqueues it.
//! 3. The caller blocks on its private completion signal.
//! 4. The service thread pops the envelope, runs the handler, and either
//!    frees the envelope and completes the call, or parks the envelope in
//!    the slot's future and completes the call with `FUTURE`.
//! 5. The caller releases the lock unless the call became a future.

use crate::command::{erase_handler, Command, CommandRef, CommandSlot, HandlerResult};
use crate::config::{CallTimeout, ServiceConfig};
use crate::message::{Message, MessageHandler, MessageRef, MessageSlot, RawMessageRef};
use crate::topic::Topic;
use core_types::{Reply, ReturnCode, ServiceId, SlotId, SlotKind, ZervError};
use ipc::{decode, Delivery, Envelope, EnvelopeHandle, Payload, ReplyChannel};
use kernel_api::Timeout;
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sim_kernel::{sched, Arena, ArenaHandle, Fifo, PollEvent, PollType};
use std::fmt;
use std::sync::Arc;

type Attachment = Box<dyn FnOnce(&Arc<Service>) + Send>;

/// Collects the slots of a service before it is frozen
pub struct ServiceBuilder {
    id: ServiceId,
    name: String,
    config: ServiceConfig,
    commands: Vec<CommandSlot>,
    messages: Vec<MessageSlot>,
    topics: Vec<MessageSlot>,
    attachments: Vec<Attachment>,
}

impl ServiceBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            id: ServiceId::new(),
            name: name.into(),
            config: ServiceConfig::default(),
            commands: Vec::new(),
            messages: Vec::new(),
            topics: Vec::new(),
            attachments: Vec::new(),
        }
    }

    /// Replaces the whole configuration
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the arena budget
    pub fn with_arena_size(mut self, arena_size: usize) -> Self {
        self.config.arena_size = arena_size;
        self
    }

    /// Sets the caller-side wait policy
    pub fn with_call_timeout(mut self, call_timeout: CallTimeout) -> Self {
        self.config.call_timeout = call_timeout;
        self
    }

    /// Registers a command handler
    ///
    /// # Panics
    ///
    /// Panics if the service already has [`MAX_SLOTS_PER_KIND`](core_types::MAX_SLOTS_PER_KIND) commands.
    pub fn command<C, F>(&mut self, handler: F) -> CommandRef<C>
    where
        C: Command,
        F: Fn(&C::Request, &mut C::Response) -> HandlerResult + Send + Sync + 'static,
    {
        let index = self.commands.len();
        let id = SlotId::new(SlotKind::Command, index);
        self.commands
            .push(CommandSlot::new(C::NAME, id, erase_handler::<C, F>(handler)));
        CommandRef::new(self.id, index)
    }

    /// Registers a typed message handler
    ///
    /// # Panics
    ///
    /// Panics if the service already has [`MAX_SLOTS_PER_KIND`](core_types::MAX_SLOTS_PER_KIND) messages.
    pub fn message<M, F>(&mut self, handler: F) -> MessageRef<M>
    where
        M: Message,
        F: Fn(&M::Params) + Send + Sync + 'static,
    {
        let index = self.messages.len();
        let id = SlotId::new(SlotKind::Message, index);
        self.messages.push(MessageSlot::new(
            M::NAME.to_string(),
            id,
            MessageHandler::typed::<M::Params, F>(handler),
        ));
        MessageRef::new(self.id, index)
    }

    /// Registers a raw message handler receiving the payload bytes
    ///
    /// # Panics
    ///
    /// Panics if the service already has [`MAX_SLOTS_PER_KIND`](core_types::MAX_SLOTS_PER_KIND) messages.
    pub fn raw_message<F>(&mut self, name: impl Into<String>, handler: F) -> RawMessageRef
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        let index = self.messages.len();
        let id = SlotId::new(SlotKind::Message, index);
        self.messages.push(MessageSlot::new(
            name.into(),
            id,
            MessageHandler::Raw(Box::new(handler)),
        ));
        RawMessageRef {
            service: self.id,
            index,
        }
    }

    /// Subscribes the service to `topic`; `handler` runs on the service thread
    ///
    /// # Panics
    ///
    /// Panics if the service already has [`MAX_SLOTS_PER_KIND`](core_types::MAX_SLOTS_PER_KIND) topic subscriptions.
    pub fn subscribe<T, F>(&mut self, topic: &Arc<Topic<T>>, handler: F)
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let index = self.topics.len();
        let id = SlotId::new(SlotKind::Topic, index);
        self.topics.push(MessageSlot::new(
            format!("{}_{}_subscriber", self.name, topic.name()),
            id,
            MessageHandler::typed::<T, F>(handler),
        ));
        let topic = Arc::clone(topic);
        self.attachments
            .push(Box::new(move |service| topic.attach(service, index)));
    }

    /// Freezes the tables and creates the service
    pub fn build(self) -> Arc<Service> {
        let service = Arc::new(Service {
            id: self.id,
            arena: Arena::new(self.name.clone(), self.config.arena_size),
            name: self.name,
            config: self.config,
            queue: Arc::new(Fifo::new()),
            commands: self.commands,
            messages: self.messages,
            topics: self.topics,
        });
        for attach in self.attachments {
            attach(&service);
        }
        debug!(
            target: "zerv",
            "{}: built with {} commands, {} messages, {} topics, {} byte arena",
            service.name,
            service.commands.len(),
            service.messages.len(),
            service.topics.len(),
            service.config.arena_size
        );
        service
    }
}

/// A request popped from the queue, not yet handled
#[derive(Debug)]
pub struct PendingRequest {
    handle: EnvelopeHandle,
}

/// A named unit exposing commands and messages
pub struct Service {
    id: ServiceId,
    name: String,
    config: ServiceConfig,
    pub(crate) arena: Arena<Envelope>,
    queue: Arc<Fifo<EnvelopeHandle>>,
    pub(crate) commands: Vec<CommandSlot>,
    messages: Vec<MessageSlot>,
    topics: Vec<MessageSlot>,
}

impl Service {
    /// Starts describing a service
    pub fn builder(name: impl Into<String>) -> ServiceBuilder {
        ServiceBuilder::new(name)
    }

    /// Service identity
    pub fn id(&self) -> ServiceId {
        self.id
    }

    /// Service name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration the service was built with
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Bytes currently charged to the arena
    pub fn arena_used(&self) -> usize {
        self.arena.used()
    }

    /// Number of envelopes waiting in the queue
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true while a call holds the command's lock
    pub fn is_locked<C: Command>(&self, command: CommandRef<C>) -> bool {
        self.command_slot(command)
            .map(CommandSlot::is_locked)
            .unwrap_or(false)
    }

    /// Wait source that becomes ready when a request is queued
    pub fn poll_event(&self) -> PollEvent {
        PollEvent::new(self.queue.clone(), PollType::FifoDataAvailable)
    }

    pub(crate) fn command_slot<C>(&self, command: CommandRef<C>) -> Result<&CommandSlot, ZervError> {
        if command.service != self.id {
            return Err(ZervError::InvalidArgument);
        }
        self.commands
            .get(command.index)
            .ok_or(ZervError::InvalidArgument)
    }

    /// Calls a command and waits for the handler.
    ///
    /// Returns `Reply::Ready` with `response` filled in, or `Reply::Future`
    /// when the handler deferred; the result must then be collected with
    /// [`get_future`](Self::get_future).
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - the command belongs to another service
    /// * `Locked` - another call holds the command
    /// * `NoMem` - the service arena is full
    /// * `Timeout` - the configured call timeout expired
    /// * anything the handler returned
    pub fn call<C: Command>(
        &self,
        command: CommandRef<C>,
        request: &C::Request,
        response: &mut C::Response,
    ) -> Result<Reply, ZervError> {
        self.call_with_delivery(command, request, response, Delivery::Buffered)
    }

    /// Like [`call`](Self::call); if the handler defers, `on_complete`
    /// runs in the resolving context once the future is resolved.
    pub fn call_with_callback<C, F>(
        &self,
        command: CommandRef<C>,
        request: &C::Request,
        response: &mut C::Response,
        on_complete: F,
    ) -> Result<Reply, ZervError>
    where
        C: Command,
        F: FnOnce(ReturnCode) + Send + 'static,
    {
        self.call_with_delivery(command, request, response, Delivery::callback(on_complete))
    }

    fn call_with_delivery<C: Command>(
        &self,
        command: CommandRef<C>,
        request: &C::Request,
        response: &mut C::Response,
        delivery: Delivery,
    ) -> Result<Reply, ZervError> {
        let slot = self.command_slot(command)?;
        let payload = Payload::new(request).map_err(|_| ZervError::InvalidArgument)?;
        let initial = Payload::new(response)
            .map_err(|_| ZervError::InvalidArgument)?
            .into_bytes();

        if !sched::try_acquire(&slot.locked) {
            debug!(target: "zerv", "{}: {} is locked", self.name, slot.name);
            return Err(ZervError::Locked);
        }

        let reply = Arc::new(ReplyChannel::new(initial, delivery));
        let envelope = Envelope::command(slot.id, Arc::clone(&reply), payload);
        let handle = match EnvelopeHandle::allocate(&self.arena, envelope) {
            Ok(handle) => handle,
            Err(err) => {
                sched::release(&slot.locked);
                warn!(target: "zerv", "{}: no memory for {}", self.name, slot.name);
                return Err(err);
            }
        };
        let block = handle.block();
        self.queue.push(handle.enqueue());

        let rc = match reply.wait(self.config.call_timeout.as_timeout()) {
            Ok(rc) => rc,
            Err(_) => self.cancel_call(slot, block, &reply)?,
        };

        if rc == ReturnCode::Future {
            debug!(target: "zerv", "{}: {} deferred", self.name, slot.name);
            return Ok(Reply::Future);
        }

        let decoded = reply.with_response(|bytes| decode::<C::Response>(bytes));
        sched::release(&slot.locked);
        *response = decoded?;
        rc.into_result()
    }

    /// Cleans up after the caller's wait expired.
    ///
    /// Returns the real result if the handler finished before the call
    /// could be abandoned.
    fn cancel_call(
        &self,
        slot: &CommandSlot,
        block: ArenaHandle,
        reply: &ReplyChannel,
    ) -> Result<ReturnCode, ZervError> {
        if let Some(handle) = self.queue.remove_first(|queued| queued.block() == block) {
            if let Err(err) = handle.reclaim().release(&self.arena) {
                error!(target: "zerv", "{}: failed to free withdrawn {}: {}", self.name, slot.name, err);
            }
            sched::release(&slot.locked);
            warn!(target: "zerv", "{}: {} timed out in queue, withdrawn", self.name, slot.name);
            return Err(ZervError::Timeout);
        }

        if reply.abandon() {
            warn!(target: "zerv", "{}: {} timed out while dispatching, abandoned", self.name, slot.name);
            return Err(ZervError::Timeout);
        }

        // Completion won the race with the abandon attempt.
        reply.wait(Timeout::Forever)
    }

    /// Sends a fire-and-forget message.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - the message belongs to another service
    /// * `Locked` - another sender is enqueuing on the same slot
    /// * `NoMem` - the service arena is full
    pub fn send_message<M: Message>(
        &self,
        message: MessageRef<M>,
        params: &M::Params,
    ) -> Result<(), ZervError> {
        let slot = self.message_slot(message.service, message.index)?;
        let payload = Payload::new(params).map_err(|_| ZervError::InvalidArgument)?;
        self.post(slot, payload)
    }

    /// Sends raw bytes to a raw message slot.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - empty data, or the slot belongs to another service
    /// * `Locked` / `NoMem` - as for [`send_message`](Self::send_message)
    pub fn send_raw_message(&self, message: RawMessageRef, data: &[u8]) -> Result<(), ZervError> {
        if data.is_empty() {
            return Err(ZervError::InvalidArgument);
        }
        let slot = self.message_slot(message.service, message.index)?;
        self.post(slot, Payload::from_bytes(data.to_vec()))
    }

    pub(crate) fn post_topic(&self, index: usize, payload: Payload) -> Result<(), ZervError> {
        let slot = self.topics.get(index).ok_or(ZervError::InvalidArgument)?;
        self.post(slot, payload)
    }

    fn message_slot(&self, service: ServiceId, index: usize) -> Result<&MessageSlot, ZervError> {
        if service != self.id {
            return Err(ZervError::InvalidArgument);
        }
        self.messages.get(index).ok_or(ZervError::InvalidArgument)
    }

    /// Enqueues a message; the slot lock only covers the enqueue
    fn post(&self, slot: &MessageSlot, payload: Payload) -> Result<(), ZervError> {
        if !sched::try_acquire(&slot.locked) {
            debug!(target: "zerv", "{}: {} is locked", self.name, slot.name);
            return Err(ZervError::Locked);
        }
        let result = EnvelopeHandle::allocate(&self.arena, Envelope::message(slot.id, payload))
            .map(|handle| self.queue.push(handle.enqueue()));
        sched::release(&slot.locked);
        if result.is_err() {
            warn!(target: "zerv", "{}: no memory for {}", self.name, slot.name);
        }
        result
    }

    /// Pops the next request, waiting up to `timeout`
    pub fn pending_request(&self, timeout: Timeout) -> Option<PendingRequest> {
        self.queue.pop(timeout).map(|handle| PendingRequest {
            handle: handle.dispatch(),
        })
    }

    /// Runs the handler for a popped request.
    ///
    /// Returns `Reply::Future` when a command handler deferred; the
    /// envelope then stays alive in the command's future.
    ///
    /// # Errors
    ///
    /// * `Error` - malformed envelope (the envelope is still freed)
    /// * anything the handler returned
    pub fn handle_request(&self, request: PendingRequest) -> Result<Reply, ZervError> {
        let handle = request.handle;
        let target = handle
            .with(&self.arena, Envelope::validate)
            .and_then(|checked| checked);
        let (kind, index) = match target {
            Ok(target) => target,
            Err(err) => return self.discard(handle, err),
        };

        match kind {
            SlotKind::Command => self.dispatch_command(index, handle),
            SlotKind::Message => self.dispatch_message(self.messages.get(index), handle),
            SlotKind::Topic => self.dispatch_message(self.topics.get(index), handle),
        }
    }

    /// Frees a request that cannot be handled, failing its caller if any
    fn discard(&self, handle: EnvelopeHandle, err: ZervError) -> Result<Reply, ZervError> {
        warn!(target: "zerv", "{}: dropping malformed request: {}", self.name, err);
        match handle.release(&self.arena) {
            Ok(envelope) => {
                if let Some(reply) = envelope.reply {
                    reply.complete(err.into());
                }
            }
            Err(free_err) => {
                error!(target: "zerv", "{}: failed to free request: {}", self.name, free_err);
            }
        }
        Err(err)
    }

    fn dispatch_command(&self, index: usize, handle: EnvelopeHandle) -> Result<Reply, ZervError> {
        let Some(slot) = self.commands.get(index) else {
            return self.discard(handle, ZervError::Error);
        };
        let (reply, payload) = match handle.with(&self.arena, |e| (e.reply.clone(), e.payload.clone())) {
            Ok((Some(reply), payload)) => (reply, payload),
            Ok((None, _)) => return self.discard(handle, ZervError::Error),
            Err(err) => return Err(err),
        };

        debug!(target: "zerv", "{}: handling {}", self.name, slot.name);
        let mut response = reply.with_response(std::mem::take);
        let result = (slot.handler)(&payload, &mut response);
        reply.with_response(|buffer| *buffer = response);

        if result == Ok(Reply::Future) {
            let mut record = slot.future.lock();
            record.active = true;
            record.resolved = false;
            record.envelope = Some(handle.defer());
            record.response = reply.response();
            record.delivery = reply.take_delivery();
            slot.future_signal.reset();
            record.orphaned = !reply.complete(ReturnCode::Future);
            if record.orphaned {
                warn!(target: "zerv", "{}: {} deferred after its caller gave up", self.name, slot.name);
            }
            return result;
        }

        if let Err(err) = handle.release(&self.arena) {
            error!(target: "zerv", "{}: failed to free {} request: {}", self.name, slot.name, err);
        }
        if !reply.complete(ReturnCode::from(result)) {
            // The caller timed out while the handler ran.
            sched::release(&slot.locked);
            warn!(target: "zerv", "{}: {} finished after its caller gave up", self.name, slot.name);
        }
        result
    }

    fn dispatch_message(
        &self,
        slot: Option<&MessageSlot>,
        handle: EnvelopeHandle,
    ) -> Result<Reply, ZervError> {
        let Some(slot) = slot else {
            return self.discard(handle, ZervError::Error);
        };
        let envelope = handle.release(&self.arena)?;
        debug!(target: "zerv", "{}: handling {}", self.name, slot.name);
        slot.handler.invoke(&envelope.payload)?;
        Ok(Reply::Ready)
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("arena", &self.arena)
            .field("pending", &self.queue.len())
            .field("commands", &self.commands)
            .field("messages", &self.messages)
            .field("topics", &self.topics)
            .finish()
    }
}
