//! The two seats at the board.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two seats in a game.
///
/// `One` always moves first. On the wire a player is just its seat
/// number (`1` or `2`), which is what browser clients already expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Player {
    One,
    Two,
}

impl Player {
    /// Both seats in turn order.
    pub const BOTH: [Player; 2] = [Player::One, Player::Two];

    /// The opposing seat.
    pub fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }

    /// Zero-based index, handy for `[T; 2]` per-player tables.
    pub fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }

    /// Seat number as shown to clients (1 or 2).
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}

impl From<Player> for u8 {
    fn from(player: Player) -> Self {
        player.number()
    }
}

impl TryFrom<u8> for Player {
    type Error = InvalidPlayer;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(InvalidPlayer(other)),
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player{}", self.number())
    }
}

/// A seat number outside `1..=2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid player number {0} (expected 1 or 2)")]
pub struct InvalidPlayer(pub u8);
