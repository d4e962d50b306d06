//! Error types for the session layer.

use dropfour_protocol::SessionId;

/// Why a session operation was rejected.
///
/// None of these change session state; the caller reports them to the
/// player who made the request and carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The column is outside the board or already full.
    #[error("illegal move: column {0}")]
    IllegalMove(i64),

    /// The player tried to move while it is the other player's turn.
    #[error("not your turn")]
    OutOfTurn,

    /// The game has already finished or been forfeited.
    #[error("session is not active")]
    NotActive,

    /// No session exists with this id.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// The username already owns a session.
    #[error("username {0} already has an active session")]
    UsernameInUse(String),

    /// Usernames must be non-empty.
    #[error("invalid username")]
    InvalidUsername,
}
