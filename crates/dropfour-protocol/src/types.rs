//! Every type that travels over the socket.
//!
//! Messages are JSON objects tagged by `"type"` in snake_case, e.g.
//! `{"type":"move","session_id":"…","column":3}`. Seats are plain numbers
//! (`1` / `2`) and board cells use `0` for empty.

use std::fmt;

use dropfour_engine::{Board, Player};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of one game session: 32 lowercase hex characters.
///
/// Serialized as a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Borrows the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// Enumerations shared by messages and snapshots
// ---------------------------------------------------------------------------

/// Who sits in a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerRole {
    Human,
    Bot,
}

/// Whether a session is player-vs-player or against the scripted opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Pvp,
    Bot,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pvp => f.write_str("pvp"),
            Self::Bot => f.write_str("bot"),
        }
    }
}

/// Lifecycle of a session. `Finished` and `Forfeited` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Finished,
    Forfeited,
}

impl SessionStatus {
    /// Returns `true` for `Finished` and `Forfeited`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Finished => f.write_str("finished"),
            Self::Forfeited => f.write_str("forfeited"),
        }
    }
}

/// How a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    Win,
    Draw,
    Forfeit,
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win => f.write_str("win"),
            Self::Draw => f.write_str("draw"),
            Self::Forfeit => f.write_str("forfeit"),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// The board as clients render it.
///
/// `grid[row][col]` is `0` (empty), `1` or `2`; row 0 is the bottom row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardView {
    pub grid: Vec<Vec<u8>>,
    pub col_heights: Vec<u8>,
}

impl From<&Board> for BoardView {
    fn from(board: &Board) -> Self {
        let grid = board
            .grid()
            .iter()
            .map(|row| row.iter().map(|cell| cell.map_or(0, Player::number)).collect())
            .collect();
        Self {
            grid,
            col_heights: board.heights().to_vec(),
        }
    }
}

/// One seat as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub username: String,
    pub role: PlayerRole,
}

/// Both seats, keyed the way clients index them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seats<T> {
    pub player1: T,
    pub player2: T,
}

impl<T> Seats<T> {
    /// The entry for `player`.
    pub fn get(&self, player: Player) -> &T {
        match player {
            Player::One => &self.player1,
            Player::Two => &self.player2,
        }
    }
}

/// Full state of a session, sent on start, on every move, on reconnect
/// and at game over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub id: SessionId,
    pub board: BoardView,
    pub players: Seats<PlayerView>,
    pub current_turn: Player,
    pub status: SessionStatus,
    /// Session start, milliseconds since the Unix epoch.
    pub start_time: u64,
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Everything a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start matchmaking, or resume the session this username already has.
    ///
    /// `username` is optional on the wire so that a missing field reaches
    /// the server's join validation instead of failing to decode.
    Join {
        #[serde(default)]
        username: Option<String>,
    },

    /// Drop a piece. `column` is signed so that out-of-range values from
    /// the client are reported as illegal moves, not decode failures.
    Move { session_id: SessionId, column: i64 },

    /// Concede the current game.
    Forfeit,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Everything the server may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// You are waiting for an opponent. `position` is the queue length
    /// right after you joined.
    Queued { position: usize },

    /// A game started and you sit in `player_slot`.
    GameStart {
        session_id: SessionId,
        players: Seats<String>,
        state: GameSnapshot,
        player_slot: Player,
    },

    /// You rejoined a game already in progress.
    GameReconnected {
        session_id: SessionId,
        state: GameSnapshot,
        player_slot: Player,
    },

    /// A piece landed.
    MoveMade {
        column: usize,
        row: usize,
        player: Player,
        state: GameSnapshot,
    },

    /// The player in that seat lost their connection; the grace timer runs.
    PlayerDisconnected { player: Player },

    /// The player in that seat is back.
    PlayerReconnected { player: Player, state: GameSnapshot },

    /// The game ended. `winner` is `None` for a draw.
    GameOver {
        winner: Option<Player>,
        winner_name: Option<String>,
        result: GameResult,
        state: GameSnapshot,
    },

    /// Your last request was rejected. Codes follow HTTP conventions
    /// (400 bad request, 403 not yours, 404 unknown, 409 conflict).
    Error { code: u16, message: String },
}

// =========================================================================
// Tests
// =========================================================================
