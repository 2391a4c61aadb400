//! Subscriber mailboxes
//!
//! Each subscriber owns a bounded arena and a FIFO of notification
//! handles. Publishers allocate into the arena and push; the subscriber
//! thread pops, reads in place and frees.
//!
//! The most recently received notification is remembered so that a
//! thread woken through [`poll`](sim_kernel::poll) or [`Subscriber::wait`]
//! can pick it up with [`Subscriber::receive`].

use crate::notification::{Notification, NotificationHandle, PublisherRef, Received};
use core_types::{SubscriberId, ZervError};
use kernel_api::Timeout;
use log::{debug, error, warn};
use parking_lot::Mutex;
use sim_kernel::{Arena, ArenaHandle, Fifo, PollEvent, PollType};
use std::fmt;
use std::sync::Arc;

/// Arena budget used when none is configured
pub const DEFAULT_MAILBOX_SIZE: usize = 1024;

/// Configuration of one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberConfig {
    /// Byte budget of the mailbox arena
    pub arena_size: usize,
}

impl SubscriberConfig {
    /// Creates a configuration with the given arena budget
    pub fn new(arena_size: usize) -> Self {
        Self { arena_size }
    }
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAILBOX_SIZE)
    }
}

/// Bounded mailbox receiving copies of emitted payloads
pub struct Subscriber {
    id: SubscriberId,
    name: String,
    arena: Arena<Notification>,
    mailbox: Arc<Fifo<ArenaHandle>>,
    /// Subscriber lock; guards the last received notification
    last: Mutex<Option<NotificationHandle>>,
}

impl Subscriber {
    /// Creates an empty subscriber
    pub fn new(name: impl Into<String>, config: SubscriberConfig) -> Arc<Self> {
        let name = name.into();
        Arc::new(Self {
            id: SubscriberId::new(),
            arena: Arena::new(name.clone(), config.arena_size),
            name,
            mailbox: Arc::new(Fifo::new()),
            last: Mutex::new(None),
        })
    }

    /// Subscriber identity
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Subscriber name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes currently charged to the mailbox arena
    pub fn arena_used(&self) -> usize {
        self.arena.used()
    }

    /// Notifications queued and not yet received
    pub fn pending_len(&self) -> usize {
        self.mailbox.len()
    }

    /// Wait source that becomes ready when a notification is queued
    pub fn poll_event(&self) -> PollEvent {
        PollEvent::new(self.mailbox.clone(), PollType::FifoDataAvailable)
    }

    /// Copies `data` into the mailbox
    pub(crate) fn notify(&self, publisher: &PublisherRef, data: &[u8]) -> Result<(), ZervError> {
        let _guard = self.last.lock();
        let notification = Notification::new(publisher.clone(), data);
        let size = notification.size();
        let block = self.arena.alloc(size, notification).map_err(|e| {
            error!(target: "pubsub", "{}: cannot queue notification from {}: {}", self.name, publisher, e);
            ZervError::NoMem
        })?;
        self.mailbox.push(block);
        debug!(
            target: "pubsub",
            "{}: queued {} bytes from {} ({} of {} bytes used)",
            self.name,
            data.len(),
            publisher,
            self.arena.used(),
            self.arena.capacity()
        );
        Ok(())
    }

    fn handle_for(&self, block: ArenaHandle) -> Option<NotificationHandle> {
        self.arena
            .with(block, |n| NotificationHandle::new(block, n.data.len()))
            .ok()
    }

    /// Blocks until a notification is available and buffers it.
    ///
    /// A notification buffered by an earlier wait and never freed is
    /// released first.
    ///
    /// # Errors
    ///
    /// * `Timeout` - nothing arrived in time
    pub fn wait(&self, timeout: Timeout) -> Result<(), ZervError> {
        let stale = self.last.lock().take();
        if let Some(stale) = stale {
            warn!(target: "pubsub", "{}: releasing notification that was never freed", self.name);
            if let Err(err) = self.arena.free(stale.block) {
                error!(target: "pubsub", "{}: failed to release stale notification: {}", self.name, err);
            }
        }

        let block = self.mailbox.pop(timeout).ok_or(ZervError::Timeout)?;
        let handle = self.handle_for(block).ok_or(ZervError::Error)?;
        *self.last.lock() = Some(handle);
        Ok(())
    }

    /// Returns the buffered notification, or pops one without blocking
    pub fn receive(&self) -> Option<NotificationHandle> {
        let mut last = self.last.lock();
        if last.is_none() {
            let block = self.mailbox.try_pop()?;
            *last = self.handle_for(block);
        }
        *last
    }

    /// Runs `f` on the payload of a received notification, in place
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - the notification was already freed
    pub fn with_payload<R>(
        &self,
        handle: NotificationHandle,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, ZervError> {
        self.arena
            .with(handle.block, |n| f(&n.data))
            .map_err(|_| ZervError::InvalidArgument)
    }

    /// Publisher that emitted a received notification
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - the notification was already freed
    pub fn publisher_of(&self, handle: NotificationHandle) -> Result<PublisherRef, ZervError> {
        self.arena
            .with(handle.block, |n| n.publisher.clone())
            .map_err(|_| ZervError::InvalidArgument)
    }

    /// Releases a received notification back to the arena
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - the notification was already freed
    pub fn free(&self, handle: NotificationHandle) -> Result<(), ZervError> {
        let mut last = self.last.lock();
        if *last == Some(handle) {
            *last = None;
        }
        self.arena
            .free(handle.block)
            .map(|_| ())
            .map_err(|_| ZervError::InvalidArgument)
    }

    /// Waits, copies up to `buf.len()` bytes out and frees the notification.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - `buf` is empty
    /// * `Timeout` - nothing arrived in time
    pub fn wait_and_receive(&self, buf: &mut [u8], timeout: Timeout) -> Result<Received, ZervError> {
        if buf.is_empty() {
            return Err(ZervError::InvalidArgument);
        }
        self.wait(timeout)?;
        let handle = self.receive().ok_or(ZervError::Timeout)?;
        let received = self.arena.with(handle.block, |n| {
            let len = buf.len().min(n.data.len());
            buf[..len].copy_from_slice(&n.data[..len]);
            Received {
                publisher: n.publisher.clone(),
                len,
            }
        });
        self.free(handle)?;
        received.map_err(|_| ZervError::InvalidArgument)
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("arena", &self.arena)
            .field("pending", &self.mailbox.len())
            .finish()
    }
}
