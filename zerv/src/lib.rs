//! # Zerv Services
//!
//! This crate implements services: named units whose commands and
//! messages are served by one dedicated thread.
//!
//! ## Philosophy
//!
//! - **One call per command**: A busy command rejects with `Locked`, it never queues a second caller
//! - **Bounded**: Every request is charged to the service arena; exhaustion is an error, not a stall
//! - **Deferrable**: A handler may answer later through the command's future
//! - **One thread, one wait**: The service queue and every other wait source share one poll
//!
//! ## Key Types
//!
//! - [`Service`] / [`ServiceBuilder`]: The frozen slot tables and their construction
//! - [`Command`] / [`Message`]: Marker traits declaring payload types
//! - [`EventLoop`]: The reactor running on the service thread
//! - [`Topic`]: Fan-out of values to subscribed services
//! - [`ServiceRegistry`]: Startup-time lookup table
//!
//! ## Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use zerv::{Command, Reply, Service};
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Text {
//!     text: String,
//! }
//!
//! struct Echo;
//!
//! impl Command for Echo {
//!     const NAME: &'static str = "echo";
//!     type Request = Text;
//!     type Response = Text;
//! }
//!
//! let mut builder = Service::builder("echo_service");
//! let echo = builder.command::<Echo, _>(|req, resp| {
//!     resp.text = req.text.clone();
//!     Ok(Reply::Ready)
//! });
//! let service = builder.build();
//! assert!(!service.is_locked(echo));
//! ```

pub mod command;
pub mod config;
pub mod event_loop;
mod future;
pub mod message;
pub mod processor;
pub mod registry;
pub mod service;
pub mod topic;

pub use command::{Command, CommandRef, HandlerResult};
pub use config::{CallTimeout, ServiceConfig, DEFAULT_ARENA_SIZE};
pub use event_loop::EventLoop;
pub use message::{Message, MessageRef, RawMessageRef};
pub use processor::{run_request_processor, spawn_request_processor};
pub use registry::{RegistryError, ServiceRegistry};
pub use service::{PendingRequest, Service, ServiceBuilder};
pub use topic::Topic;

pub use core_types::{Reply, ReturnCode, ServiceId, ZervError};
pub use kernel_api::Timeout;
