//! Notifications and the handles addressing them

use core_types::PublisherId;
use sim_kernel::ArenaHandle;
use std::fmt;
use std::sync::Arc;

/// Bytes charged for the notification header: publisher reference and size
pub const NOTIFICATION_HEADER_SIZE: usize = 16;

/// Identity of the publisher that emitted a notification
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublisherRef {
    id: PublisherId,
    name: Arc<str>,
}

impl PublisherRef {
    pub(crate) fn new(id: PublisherId, name: &str) -> Self {
        Self {
            id,
            name: Arc::from(name),
        }
    }

    /// Publisher identity
    pub fn id(&self) -> PublisherId {
        self.id
    }

    /// Publisher name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PublisherRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// One copy of an emitted payload, living in a subscriber arena
#[derive(Debug)]
pub struct Notification {
    pub(crate) publisher: PublisherRef,
    pub(crate) data: Vec<u8>,
}

impl Notification {
    pub(crate) fn new(publisher: PublisherRef, data: &[u8]) -> Self {
        Self {
            publisher,
            data: data.to_vec(),
        }
    }

    /// Bytes this notification occupies: header plus payload
    pub fn size(&self) -> usize {
        NOTIFICATION_HEADER_SIZE + self.data.len()
    }
}

/// Handle to a received notification.
///
/// Valid until the notification is freed; using it afterwards fails
/// with `InvalidArgument` instead of touching reused memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationHandle {
    pub(crate) block: ArenaHandle,
    len: usize,
}

impl NotificationHandle {
    pub(crate) fn new(block: ArenaHandle, len: usize) -> Self {
        Self { block, len }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true for a zero-length payload
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Outcome of [`Subscriber::wait_and_receive`](crate::Subscriber::wait_and_receive)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    /// Who emitted the notification
    pub publisher: PublisherRef,
    /// Bytes copied into the caller buffer
    pub len: usize,
}
