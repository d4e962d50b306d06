//! Codec trait and the JSON implementation.
//!
//! The connection handler only ever talks to a [`Codec`]; which format
//! goes over the socket is decided once, when the server is built.
//! Browser clients speak JSON, so [`JsonCodec`] is the default.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Converts wire messages to and from bytes.
///
/// `Send + Sync + 'static` because a single codec value is shared by
/// every connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or
    /// don't match `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// Output is always valid UTF-8, so the transport can ship it as a
/// WebSocket text frame.
///
/// ```rust
/// use dropfour_protocol::{ClientMessage, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let msg: ClientMessage = codec
///     .decode(br#"{"type":"move","session_id":"abc","column":3}"#)
///     .unwrap();
/// assert!(matches!(msg, ClientMessage::Move { column: 3, .. }));
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
