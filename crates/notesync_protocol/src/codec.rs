//! JSON codec helpers for protocol messages.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Result type for protocol encoding and decoding.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors produced while encoding or decoding protocol messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A message could not be encoded to JSON.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// A message could not be decoded from JSON.
    #[error("failed to decode message: {0}")]
    Decode(String),
}

/// Encodes a protocol message to JSON bytes.
pub fn encode<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    serde_json::to_vec(message).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decodes a protocol message from JSON bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ProtocolResult<T> {
    serde_json::from_slice(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))
}
