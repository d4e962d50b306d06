//! Error types for the Dropfour server.

use dropfour_protocol::{ProtocolError, ServerMessage, SessionId};
use dropfour_session::SessionError;
use dropfour_transport::TransportError;

use crate::analytics::AnalyticsError;
use crate::store::StoreError;

/// A client request the server refused.
///
/// Request errors never change game state. They are answered with an
/// `error` message to the connection that sent the request and nobody
/// else.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// `join` without a usable username.
    #[error("invalid username: must be 1-{max} characters", max = crate::protocol::MAX_USERNAME_LEN)]
    InvalidJoinPayload,

    /// `join` with the name the bot plays under.
    #[error("username {0} is reserved")]
    ReservedUsername(String),

    /// `join` under a new name from a connection still seated in a game.
    #[error("already playing as {0}")]
    AlreadySeated(String),

    /// The frame could not be decoded into a client message.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The connection does not hold a seat in the addressed session.
    #[error("not a participant in this session")]
    NotAParticipant,

    /// The addressed session does not exist (or already ended).
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// The session rejected the operation.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl RequestError {
    /// HTTP-style status code sent to the client.
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidJoinPayload | Self::Malformed(_) | Self::ReservedUsername(_) => 400,
            Self::AlreadySeated(_) => 409,
            Self::NotAParticipant => 403,
            Self::SessionNotFound(_) => 404,
            Self::Session(e) => match e {
                SessionError::IllegalMove(_) | SessionError::InvalidUsername => 400,
                SessionError::SessionNotFound(_) => 404,
                SessionError::OutOfTurn | SessionError::NotActive | SessionError::UsernameInUse(_) => 409,
            },
        }
    }

    /// The `error` message reporting this rejection.
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::Error {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Top-level error that wraps every crate-specific error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum DropfourError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}
