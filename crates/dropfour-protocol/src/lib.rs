//! Wire protocol for Dropfour.
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`GameSnapshot`]):
//!   what travels over the socket.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   become bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong doing so.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → ConnectionProtocol (session ops)
//! ```
//!
//! This crate knows nothing about connections or timers; it only
//! describes and (de)serializes messages.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    BoardView, ClientMessage, GameResult, GameSnapshot, PlayerRole, PlayerView,
    Seats, ServerMessage, SessionId, SessionKind, SessionStatus,
};

/// Seat marker, re-exported so protocol users don't need the engine crate.
pub use dropfour_engine::Player;
