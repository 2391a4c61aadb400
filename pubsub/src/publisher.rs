//! Publishers
//!
//! A publisher owns its subscriber list and walks it under its own lock
//! on every emit, so emission is O(subscribers). Each delivery takes the
//! subscriber lock inside the publisher lock; never the other way round.

use crate::notification::PublisherRef;
use crate::subscriber::Subscriber;
use core_types::{PublisherId, ZervError};
use log::{debug, error};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Fan-out source copying each payload into every subscriber mailbox
pub struct Publisher {
    me: PublisherRef,
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
}

impl Publisher {
    /// Creates a publisher with no subscribers
    pub fn new(name: &str) -> Self {
        Self {
            me: PublisherRef::new(PublisherId::new(), name),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Publisher identity
    pub fn id(&self) -> PublisherId {
        self.me.id()
    }

    /// Publisher name
    pub fn name(&self) -> &str {
        self.me.name()
    }

    /// Reference carried by notifications from this publisher
    pub fn reference(&self) -> &PublisherRef {
        &self.me
    }

    /// Appends `subscriber` to the delivery list.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - the subscriber is already on the list
    pub fn add_subscriber(&self, subscriber: &Arc<Subscriber>) -> Result<(), ZervError> {
        let mut subscribers = self.subscribers.lock();
        if subscribers.iter().any(|s| s.id() == subscriber.id()) {
            return Err(ZervError::InvalidArgument);
        }
        subscribers.push(Arc::clone(subscriber));
        debug!(target: "pubsub", "{}: added subscriber {}", self.name(), subscriber.name());
        Ok(())
    }

    /// Removes `subscriber`; returns false if it was not on the list
    pub fn remove_subscriber(&self, subscriber: &Subscriber) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id() != subscriber.id());
        subscribers.len() != before
    }

    /// Number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Copies `data` into every subscriber mailbox, in subscription order.
    ///
    /// Stops at the first subscriber that cannot take the copy; earlier
    /// deliveries are kept. With no subscribers nothing is allocated.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - `data` is empty
    /// * `NoMem` - a subscriber mailbox is full
    pub fn emit(&self, data: &[u8]) -> Result<(), ZervError> {
        if data.is_empty() {
            return Err(ZervError::InvalidArgument);
        }
        let subscribers = self.subscribers.lock();
        for subscriber in subscribers.iter() {
            if let Err(err) = subscriber.notify(&self.me, data) {
                error!(target: "pubsub", "{}: failed to notify {}", self.name(), subscriber.name());
                return Err(err);
            }
        }
        Ok(())
    }

    /// Encodes `value` as JSON and emits it
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - `value` cannot be encoded
    /// * as for [`emit`](Self::emit)
    pub fn emit_value<T: Serialize>(&self, value: &T) -> Result<(), ZervError> {
        let data = serde_json::to_vec(value).map_err(|_| ZervError::InvalidArgument)?;
        self.emit(&data)
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("id", &self.me.id())
            .field("name", &self.me.name())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
