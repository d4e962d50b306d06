//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the bytes were wrong: they didn't
//! encode, didn't decode, or decoded into something the protocol
//! doesn't allow. Game-rule rejections (illegal move, out of turn) are
//! not protocol errors; they live in the session layer.

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The frame was not valid JSON, or didn't match any known message
    /// shape (unknown `"type"`, missing fields, wrong field types).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but breaks a protocol rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
