//! Payload bytes and their serde codec

use core_types::ZervError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to encode or decode a payload
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode payload: {0}")]
    Decode(#[source] serde_json::Error),
}

impl From<CodecError> for ZervError {
    fn from(_: CodecError) -> Self {
        ZervError::Error
    }
}

/// Decodes a JSON-encoded value from raw bytes
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::Decode)
}

/// Inline payload bytes of an envelope or notification
///
/// Typed payloads are JSON; raw payloads are whatever the sender passed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    data: Vec<u8>,
}

impl Payload {
    /// Creates a new payload from serializable data
    pub fn new<T: Serialize>(data: &T) -> Result<Self, CodecError> {
        let json = serde_json::to_vec(data).map_err(CodecError::Encode)?;
        Ok(Self { data: json })
    }

    /// Wraps raw bytes
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Deserializes the payload into a specific type
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        decode(&self.data)
    }

    /// Returns the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the payload, returning the raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true for a zero-length payload
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
