//! # Dropfour
//!
//! Real-time connect-four server for browser clients.
//!
//! Players join by username over a WebSocket. Two waiting players are
//! paired into a session; anyone left waiting too long gets a bot. A
//! player who drops has a grace period to reconnect before the game is
//! forfeited. Finished games go to a [`ResultStore`] and every notable
//! step to an [`AnalyticsSink`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dropfour::prelude::*;
//!
//! # async fn start() -> Result<(), DropfourError> {
//! let server = DropfourServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(MemoryStore::new(), TracingAnalytics)
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! ## Layout
//!
//! All game state lives in one [`ConnectionProtocol`] driven by a single
//! task. Connection handlers, timers and store lookups talk to it only
//! through [`Event`]s.

pub mod analytics;
pub mod config;
pub mod error;
pub mod event;
pub mod protocol;
pub mod store;

mod handler;
mod server;

pub use analytics::{AnalyticsError, AnalyticsEvent, AnalyticsSink, ChannelAnalytics, NoopAnalytics, TracingAnalytics};
pub use config::{BotStrategy, ProtocolConfig};
pub use error::{DropfourError, RequestError};
pub use event::{Event, EventSender, OutboundSender};
pub use protocol::{ConnectionProtocol, MAX_USERNAME_LEN};
pub use server::{DropfourServer, DropfourServerBuilder};
pub use store::{GameRecord, MemoryStore, RecordedPlayer, ResultStore, StoreError};

pub use dropfour_engine as engine;
pub use dropfour_matchmaking as matchmaking;
pub use dropfour_protocol as wire;
pub use dropfour_session as session;
pub use dropfour_timer as timer;
pub use dropfour_transport as transport;

/// Everything needed to run a server or drive the protocol in tests.
pub mod prelude {
    pub use crate::{
        AnalyticsEvent, AnalyticsSink, BotStrategy, ChannelAnalytics, ConnectionProtocol, DropfourError,
        DropfourServer, DropfourServerBuilder, Event, GameRecord, MemoryStore, NoopAnalytics, ProtocolConfig,
        RequestError, ResultStore, TracingAnalytics,
    };
    pub use dropfour_engine::{Board, Player, Strategy};
    pub use dropfour_matchmaking::MatchmakingConfig;
    pub use dropfour_protocol::{
        ClientMessage, GameResult, GameSnapshot, PlayerRole, Seats, ServerMessage, SessionId, SessionKind,
        SessionStatus,
    };
    pub use dropfour_session::SessionConfig;
    pub use dropfour_transport::ConnectionId;
}
