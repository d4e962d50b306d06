//! Static position evaluation and fixed-depth minimax.
//!
//! Neither is used by the default scripted opponent; they back the
//! optional [`Lookahead`](crate::Lookahead) strategy.

use crate::{Board, Player, COLS, ROWS};

/// Score for an immediate win found during search. Depth is added so
/// that quicker wins rank higher.
pub const WIN_SCORE: i32 = 10_000;

/// Scoring directions for pattern potential: right, up, up-right, up-left.
const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// Scores `board` from `me`'s point of view. Positive is good for `me`.
///
/// For every occupied cell, each direction contributes:
/// own run of 3+ after the cell → +50, own run of 2 → +10, otherwise an
/// opposing run of 3+ → −40, opposing run of 2 → −8. Cells owned by the
/// opponent subtract the same computation done from their side. Own
/// pieces also earn a centre bonus (3 / 2 / 1 by column).
pub fn evaluate(board: &Board, me: Player, opponent: Player) -> i32 {
    let mut score = 0;

    for row in 0..ROWS {
        for col in 0..COLS {
            match board.get(row, col) {
                Some(p) if p == me => {
                    score += cell_potential(board, row, col, me, opponent);
                    score += centre_bonus(col);
                }
                Some(p) if p == opponent => {
                    score -= cell_potential(board, row, col, opponent, me);
                }
                _ => {}
            }
        }
    }

    score
}

/// Fixed-depth minimax over legal columns.
///
/// `me` is the side to move at the root. Terminal checks come first:
/// a full board is a draw (0), an immediate win for `me` scores
/// `WIN_SCORE + depth`, an immediate win for `opponent` scores
/// `-(WIN_SCORE + depth)`. At depth 0 the static evaluation is returned.
pub fn minimax(board: &Board, me: Player, opponent: Player, depth: u32) -> i32 {
    search(board, me, opponent, depth, true)
}

fn search(
    board: &Board,
    me: Player,
    opponent: Player,
    depth: u32,
    maximizing: bool,
) -> i32 {
    if board.is_full() {
        return 0;
    }

    let depth_bonus = i32::try_from(depth).unwrap_or(i32::MAX - WIN_SCORE);
    let (to_move, waiting) = if maximizing { (me, opponent) } else { (opponent, me) };

    if wins_immediately(board, to_move) {
        let score = WIN_SCORE + depth_bonus;
        return if maximizing { score } else { -score };
    }
    if wins_immediately(board, waiting) {
        // The side to move must block; if it can't, the threat stands.
        // Scoring it as a loss for the mover keeps the search honest
        // about double threats.
        let threats = board
            .legal_columns()
            .filter(|&c| {
                let mut sim = *board;
                sim.place(c, waiting)
                    .is_some_and(|row| sim.check_win(row, c, waiting))
            })
            .count();
        if threats > 1 {
            let score = WIN_SCORE + depth_bonus;
            return if maximizing { -score } else { score };
        }
    }

    if depth == 0 {
        return evaluate(board, me, opponent);
    }

    let children = board.legal_columns().filter_map(|c| {
        let mut sim = *board;
        sim.place(c, to_move)?;
        Some(search(&sim, me, opponent, depth - 1, !maximizing))
    });

    if maximizing {
        children.max().unwrap_or(0)
    } else {
        children.min().unwrap_or(0)
    }
}

/// `true` if `player` has a legal column that wins on the spot.
pub(crate) fn wins_immediately(board: &Board, player: Player) -> bool {
    winning_column(board, player).is_some()
}

/// First column (natural order) where `player` wins immediately.
pub(crate) fn winning_column(board: &Board, player: Player) -> Option<usize> {
    board.legal_columns().find(|&c| {
        let mut sim = *board;
        sim.place(c, player)
            .is_some_and(|row| sim.check_win(row, c, player))
    })
}

fn cell_potential(
    board: &Board,
    row: usize,
    col: usize,
    player: Player,
    opponent: Player,
) -> i32 {
    DIRECTIONS
        .iter()
        .map(|&(dr, dc)| {
            let own = board.count_in_direction(row, col, player, dr, dc);
            let theirs = board.count_in_direction(row, col, opponent, dr, dc);
            match (own, theirs) {
                (3.., _) => 50,
                (2, _) => 10,
                (_, 3..) => -40,
                (_, 2) => -8,
                _ => 0,
            }
        })
        .sum()
}

fn centre_bonus(col: usize) -> i32 {
    match col {
        3 => 3,
        2 | 4 => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_empty_board_is_zero() {
        assert_eq!(evaluate(&Board::new(), Player::One, Player::Two), 0);
    }

    #[test]
    fn test_evaluate_centre_piece_beats_edge_piece() {
        let mut centre = Board::new();
        centre.place(3, Player::One);
        let mut edge = Board::new();
        edge.place(0, Player::One);

        assert_eq!(evaluate(&centre, Player::One, Player::Two), 3);
        assert_eq!(evaluate(&edge, Player::One, Player::Two), 1);
    }

    #[test]
    fn test_evaluate_is_antisymmetric_without_centre_bonus() {
        // Opponent's three-in-a-row counts against us.
        let mut board = Board::new();
        for c in [0, 1, 2] {
            board.place(c, Player::Two);
        }
        let score = evaluate(&board, Player::One, Player::Two);
        assert!(score < 0, "expected negative score, got {score}");
        let mirrored = evaluate(&board, Player::Two, Player::One);
        assert!(mirrored > 0);
    }

    #[test]
    fn test_evaluate_rewards_own_run_of_three() {
        let mut board = Board::new();
        for _ in 0..3 {
            board.place(6, Player::One);
        }
        // Bottom piece sees two above it (+10), middle sees one (0),
        // plus three edge bonuses.
        assert_eq!(evaluate(&board, Player::One, Player::Two), 10 + 3);
    }

    #[test]
    fn test_minimax_finds_immediate_win() {
        let mut board = Board::new();
        for _ in 0..3 {
            board.place(2, Player::One);
        }
        let score = minimax(&board, Player::One, Player::Two, 2);
        assert_eq!(score, WIN_SCORE + 2);
    }

    #[test]
    fn test_minimax_sees_unstoppable_double_threat() {
        // Two has an open-ended three on the bottom row: columns 1..=3,
        // both 0 and 4 win. One to move cannot block both.
        let mut board = Board::new();
        for c in [1, 2, 3] {
            board.place(c, Player::Two);
        }
        board.place(6, Player::One);
        board.place(6, Player::One);
        let score = minimax(&board, Player::One, Player::Two, 1);
        assert!(score <= -WIN_SCORE, "got {score}");
    }

    #[test]
    fn test_minimax_full_board_is_draw() {
        let mut board = Board::new();
        // A full board short-circuits before any win check, so the
        // fill pattern doesn't matter.
        for c in 0..COLS {
            for r in 0..ROWS {
                let flip = (c / 2 + r / 2) % 2 == 0;
                board.place(c, if flip { Player::One } else { Player::Two });
            }
        }
        assert!(board.is_full());
        assert_eq!(minimax(&board, Player::One, Player::Two, 3), 0);
    }
}
