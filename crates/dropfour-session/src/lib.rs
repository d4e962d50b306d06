//! Game sessions for Dropfour.
//!
//! 1. **GameSession**: one game's board, seats, turn order, connection
//!    bindings and timers ([`GameSession`])
//! 2. **Registry**: every live session, by id and by username
//!    ([`SessionRegistry`])
//!
//! # How it fits in the stack
//!
//! ```text
//! ConnectionProtocol (above)  ← routes requests to sessions, broadcasts outcomes
//!     ↕
//! Session layer (this crate)  ← rules, turn order, reconnect grace
//!     ↕
//! Engine + Protocol (below)   ← Board, Player, GameSnapshot
//! ```

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{
    GameSession, MoveOutcome, MoveResult, PlayerSlot, SessionConfig, UserId,
};
