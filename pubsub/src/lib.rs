//! # Publish/Subscribe Mailboxes
//!
//! This crate implements fan-out from publishers to subscribers with a
//! bounded mailbox per subscriber.
//!
//! ## Philosophy
//!
//! - **Every subscriber pays for itself**: Copies are charged to the receiving mailbox
//! - **Best effort fan-out**: The first full mailbox stops an emit, nothing is rolled back
//! - **Read in place**: Payloads are borrowed from the mailbox until freed
//!
//! ## Key Types
//!
//! - [`Publisher`]: Owns the subscriber list and emits
//! - [`Subscriber`]: Bounded mailbox drained by one thread
//! - [`NotificationHandle`]: Generation-checked reference to a received payload
//!
//! ## Example
//!
//! ```
//! use pubsub::{Publisher, Subscriber, SubscriberConfig};
//! use kernel_api::Timeout;
//!
//! let publisher = Publisher::new("sensor");
//! let subscriber = Subscriber::new("logger", SubscriberConfig::default());
//! publisher.add_subscriber(&subscriber).unwrap();
//!
//! publisher.emit(b"21.5").unwrap();
//! let mut buf = [0u8; 16];
//! let received = subscriber.wait_and_receive(&mut buf, Timeout::NoWait).unwrap();
//! assert_eq!(&buf[..received.len], b"21.5");
//! ```

pub mod notification;
pub mod publisher;
pub mod subscriber;

pub use notification::{
    Notification, NotificationHandle, PublisherRef, Received, NOTIFICATION_HEADER_SIZE,
};
pub use publisher::Publisher;
pub use subscriber::{Subscriber, SubscriberConfig, DEFAULT_MAILBOX_SIZE};
