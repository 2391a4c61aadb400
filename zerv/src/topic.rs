//! Topics: fan-out to subscribed services
//!
//! A [`Topic`] delivers each emitted value as a message to every service
//! that subscribed to it through
//! [`ServiceBuilder::subscribe`](crate::ServiceBuilder::subscribe).
//! Emission is best effort: the first failing subscriber aborts the rest
//! and deliveries already made stay delivered.

use crate::service::Service;
use core_types::ZervError;
use ipc::Payload;
use log::{debug, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

struct Link {
    service: Weak<Service>,
    index: usize,
}

/// Named fan-out whose subscribers are services
pub struct Topic<T> {
    name: String,
    links: Mutex<Vec<Link>>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Serialize> Topic<T> {
    /// Creates a topic with no subscribers
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            links: Mutex::new(Vec::new()),
            _marker: PhantomData,
        })
    }

    /// Topic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of subscribed services still alive
    pub fn subscriber_count(&self) -> usize {
        self.links
            .lock()
            .iter()
            .filter(|link| link.service.strong_count() > 0)
            .count()
    }

    pub(crate) fn attach(&self, service: &Arc<Service>, index: usize) {
        self.links.lock().push(Link {
            service: Arc::downgrade(service),
            index,
        });
        debug!(target: "zerv", "topic {}: {} subscribed", self.name, service.name());
    }

    /// Sends `value` to every subscriber in subscription order.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - `value` cannot be encoded
    /// * the first subscriber failure (`Locked`, `NoMem`)
    pub fn emit(&self, value: &T) -> Result<(), ZervError> {
        let payload = Payload::new(value).map_err(|_| ZervError::InvalidArgument)?;
        let links = self.links.lock();
        for link in links.iter() {
            let Some(service) = link.service.upgrade() else {
                continue;
            };
            if let Err(err) = service.post_topic(link.index, payload.clone()) {
                warn!(target: "zerv", "topic {}: delivery to {} failed: {}", self.name, service.name(), err);
                return Err(err);
            }
        }
        Ok(())
    }
}

impl<T> fmt::Debug for Topic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .field("links", &self.links.lock().len())
            .finish()
    }
}
