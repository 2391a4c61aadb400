//! # Core Types
//!
//! This crate defines the fundamental types shared by services, the host
//! primitives and the pub/sub mailboxes.
//!
//! ## Philosophy
//!
//! Core types are designed with these principles:
//! - **Explicit over implicit**: Every outcome has a named code, nothing is a magic integer.
//! - **Type safety first**: Service, publisher and subscriber identities cannot be confused.
//! - **Control flow is not failure**: A deferred result is a [`Reply`], not an error.
//!
//! ## Key Types
//!
//! - [`ServiceId`]: Unique identifier for services
//! - [`PublisherId`] / [`SubscriberId`]: Identities of pub/sub endpoints
//! - [`SlotId`]: Numeric id of a command, message or topic slot
//! - [`ReturnCode`]: Flat result code taxonomy
//! - [`ZervError`]: Failures returned to callers

pub mod ids;
pub mod rc;

pub use ids::{
    PublisherId, ServiceId, SlotId, SlotKind, SubscriberId, CMD_ID_OFFSET, MAX_SLOTS_PER_KIND,
    MSG_ID_OFFSET, TOPIC_ID_OFFSET,
};
pub use rc::{Reply, ReturnCode, ZervError};
