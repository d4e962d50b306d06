//! Events consumed by the protocol's event loop.
//!
//! Connection handlers, timers and background store lookups all feed the
//! same channel; [`ConnectionProtocol`](crate::ConnectionProtocol)
//! handles one event at a time.

use dropfour_protocol::{ClientMessage, Player, ServerMessage, SessionId};
use dropfour_session::UserId;
use dropfour_timer::TimerId;
use dropfour_transport::ConnectionId;
use tokio::sync::mpsc;

/// Per-connection channel carrying messages to the socket writer.
pub type OutboundSender = mpsc::UnboundedSender<ServerMessage>;

/// Sending half of the protocol's event channel.
pub type EventSender = mpsc::UnboundedSender<Event>;

#[derive(Debug)]
pub enum Event {
    /// A socket opened; `outbound` delivers to it.
    Connected {
        conn: ConnectionId,
        outbound: OutboundSender,
    },

    /// A decoded client message.
    Inbound {
        conn: ConnectionId,
        message: ClientMessage,
    },

    /// The socket closed.
    Disconnected { conn: ConnectionId },

    /// A queued player waited out the bot fallback.
    MatchFallback { username: String, timer: TimerId },

    /// A disconnected player's grace period ran out.
    ReconnectExpired {
        session: SessionId,
        player: Player,
        timer: TimerId,
    },

    /// The bot's pacing delay elapsed.
    BotTurn { session: SessionId, timer: TimerId },

    /// The bot's search finished. `ply` is the piece count of the board
    /// it searched; a different count means the position moved on.
    BotMoveChosen {
        session: SessionId,
        ply: usize,
        column: Option<usize>,
    },

    /// The store returned a durable id for a seated player.
    IdentityResolved {
        session: SessionId,
        player: Player,
        user_id: UserId,
    },

    /// Stop the event loop.
    Shutdown,
}
