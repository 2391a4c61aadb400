//! Result codes surfaced by services, futures and mailboxes

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const ENOMEM: i32 = 12;
const EINVAL: i32 = 22;
const EFAULT: i32 = 14;
const EAGAIN: i32 = 11;
const EBUSY: i32 = 16;

/// Failure returned to the immediate caller.
///
/// Nothing is retried internally; the caller decides what to do.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZervError {
    /// Arena of the target service or subscriber is exhausted
    #[error("out of arena memory")]
    NoMem,

    /// Argument rejected before anything was queued
    #[error("invalid argument")]
    InvalidArgument,

    /// Handler-reported or structural failure
    #[error("request failed")]
    Error,

    /// Bounded wait expired
    #[error("operation timed out")]
    Timeout,

    /// Command or message slot is busy with another call
    #[error("slot is locked by another caller")]
    Locked,
}

/// Successful outcome of a call or a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reply {
    /// Completed, the response is valid
    Ready,
    /// Completion is deferred and must be collected through the future
    Future,
}

/// Flat result code taxonomy with stable raw values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnCode {
    Ok,
    NoMem,
    NullPtr,
    Error,
    Timeout,
    Locked,
    Future,
}

impl ReturnCode {
    /// Raw integer value of the code
    pub const fn as_raw(self) -> i32 {
        match self {
            ReturnCode::Ok => 0,
            ReturnCode::Future => 1,
            ReturnCode::NoMem => -ENOMEM,
            ReturnCode::NullPtr => -EINVAL,
            ReturnCode::Error => -EFAULT,
            ReturnCode::Timeout => -EAGAIN,
            ReturnCode::Locked => -EBUSY,
        }
    }

    /// Parses a raw value, `None` if it is not part of the taxonomy
    pub fn from_raw(raw: i32) -> Option<Self> {
        [
            ReturnCode::Ok,
            ReturnCode::Future,
            ReturnCode::NoMem,
            ReturnCode::NullPtr,
            ReturnCode::Error,
            ReturnCode::Timeout,
            ReturnCode::Locked,
        ]
        .into_iter()
        .find(|code| code.as_raw() == raw)
    }

    /// Symbolic name of the code
    pub const fn name(self) -> &'static str {
        match self {
            ReturnCode::Ok => "OK",
            ReturnCode::NoMem => "NOMEM",
            ReturnCode::NullPtr => "NULLPTR",
            ReturnCode::Error => "ERROR",
            ReturnCode::Timeout => "TIMEOUT",
            ReturnCode::Locked => "LOCKED",
            ReturnCode::Future => "FUTURE",
        }
    }

    /// Symbolic name of a raw value, `"UNKNOWN"` when it is not a known code
    pub fn raw_name(raw: i32) -> &'static str {
        Self::from_raw(raw).map_or("UNKNOWN", ReturnCode::name)
    }

    /// Whether the code reports a failure (`FUTURE` does not)
    pub const fn is_error(self) -> bool {
        self.as_raw() < 0
    }

    /// Splits the code into the success and failure halves
    pub fn into_result(self) -> Result<Reply, ZervError> {
        match self {
            ReturnCode::Ok => Ok(Reply::Ready),
            ReturnCode::Future => Ok(Reply::Future),
            ReturnCode::NoMem => Err(ZervError::NoMem),
            ReturnCode::NullPtr => Err(ZervError::InvalidArgument),
            ReturnCode::Error => Err(ZervError::Error),
            ReturnCode::Timeout => Err(ZervError::Timeout),
            ReturnCode::Locked => Err(ZervError::Locked),
        }
    }
}

impl From<ZervError> for ReturnCode {
    fn from(err: ZervError) -> Self {
        match err {
            ZervError::NoMem => ReturnCode::NoMem,
            ZervError::InvalidArgument => ReturnCode::NullPtr,
            ZervError::Error => ReturnCode::Error,
            ZervError::Timeout => ReturnCode::Timeout,
            ZervError::Locked => ReturnCode::Locked,
        }
    }
}

impl From<Reply> for ReturnCode {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Ready => ReturnCode::Ok,
            Reply::Future => ReturnCode::Future,
        }
    }
}

impl From<Result<Reply, ZervError>> for ReturnCode {
    fn from(result: Result<Reply, ZervError>) -> Self {
        match result {
            Ok(reply) => reply.into(),
            Err(err) => err.into(),
        }
    }
}

impl From<Result<(), ZervError>> for ReturnCode {
    fn from(result: Result<(), ZervError>) -> Self {
        match result {
            Ok(()) => ReturnCode::Ok,
            Err(err) => err.into(),
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
