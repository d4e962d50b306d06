//! Move selection for the scripted opponent.

use crate::heuristic::{minimax, winning_column};
use crate::{Board, Player};

/// Column preference when nothing tactical is on the board:
/// centre first, then expanding outward.
pub const CENTER_OUT: [usize; 7] = [3, 2, 4, 1, 5, 0, 6];

/// Picks a column for the scripted opponent.
///
/// In strict priority order:
/// 1. a column where `me` wins immediately (first in natural order),
/// 2. a column where `opponent` would win next move (block it),
/// 3. the first legal column in [`CENTER_OUT`] order.
///
/// Fully deterministic. Returns `None` only when the board is full.
pub fn select_move(board: &Board, me: Player, opponent: Player) -> Option<usize> {
    winning_column(board, me)
        .or_else(|| winning_column(board, opponent))
        .or_else(|| CENTER_OUT.into_iter().find(|&c| board.is_legal(c)))
}

/// A move-selection policy for the bot seat.
///
/// `Send + Sync` so the protocol layer can hold one behind a `Box`
/// regardless of which runtime thread drives it.
pub trait Strategy: Send + Sync {
    /// Chooses a legal column for `me`, or `None` if the board is full.
    fn choose(&self, board: &Board, me: Player, opponent: Player) -> Option<usize>;
}

/// The default bot: win, else block, else centre-out. See [`select_move`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Scripted;

impl Strategy for Scripted {
    fn choose(&self, board: &Board, me: Player, opponent: Player) -> Option<usize> {
        select_move(board, me, opponent)
    }
}

/// A deeper bot that scores every legal column with [`minimax`] and
/// plays the best one. Ties go to the column earliest in
/// [`CENTER_OUT`] order.
#[derive(Debug, Clone, Copy)]
pub struct Lookahead {
    /// Plies searched below each candidate move.
    pub depth: u32,
}

impl Strategy for Lookahead {
    fn choose(&self, board: &Board, me: Player, opponent: Player) -> Option<usize> {
        // Taking a win on the spot always beats searching for one.
        if let Some(col) = winning_column(board, me) {
            return Some(col);
        }

        let mut best: Option<(usize, i32)> = None;
        for col in CENTER_OUT {
            let mut sim = *board;
            if sim.place(col, me).is_none() {
                continue;
            }
            // After our move it's the opponent's turn, so score from
            // their side and negate.
            let score = -minimax(&sim, opponent, me, self.depth);
            tracing::trace!(col, score, depth = self.depth, "lookahead candidate");
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((col, score));
            }
        }
        best.map(|(col, _)| col)
    }
}
