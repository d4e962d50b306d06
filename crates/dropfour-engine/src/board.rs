//! The 6×7 grid: legality, placement, and win detection.
//!
//! Row 0 is the bottom of the board. Pieces fall, so placing into a
//! column always lands at that column's current height.

use crate::Player;

/// Number of rows on the board.
pub const ROWS: usize = 6;
/// Number of columns on the board.
pub const COLS: usize = 7;
/// Pieces in a line needed to win.
pub const CONNECT: usize = 4;

/// The four axes a line can run along, as (row, column) steps:
/// horizontal, vertical, diagonal `/`, diagonal `\`.
const AXES: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// A connect-four board.
///
/// `Board` is `Copy` (it's 49 bytes), so handing a snapshot to the
/// opponent AI for simulation never aliases the live game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Board {
    grid: [[Option<Player>; COLS]; ROWS],
    /// Invariant: `heights[c]` equals the number of occupied cells in
    /// column `c`.
    heights: [u8; COLS],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self {
            grid: [[None; COLS]; ROWS],
            heights: [0; COLS],
        }
    }

    /// Returns `true` if a piece can be dropped into `column`.
    pub fn is_legal(&self, column: usize) -> bool {
        column < COLS && usize::from(self.heights[column]) < ROWS
    }

    /// Drops a piece for `player` into `column`.
    ///
    /// Returns the row the piece landed on, or `None` (leaving the board
    /// untouched) if the move is illegal. Callers must check.
    pub fn place(&mut self, column: usize, player: Player) -> Option<usize> {
        if !self.is_legal(column) {
            return None;
        }
        let row = usize::from(self.heights[column]);
        self.grid[row][column] = Some(player);
        self.heights[column] += 1;
        Some(row)
    }

    /// Returns `true` once every column is at full height.
    pub fn is_full(&self) -> bool {
        self.heights.iter().all(|&h| usize::from(h) == ROWS)
    }

    /// Returns `true` if `player` has four in a line through `(row, column)`.
    ///
    /// Only lines through the given cell are considered, so this must be
    /// called right after every placement with the placed cell.
    pub fn check_win(&self, row: usize, column: usize, player: Player) -> bool {
        if row >= ROWS || column >= COLS {
            return false;
        }
        AXES.iter().any(|&(dr, dc)| {
            let forward = self.count_in_direction(row, column, player, dr, dc);
            let backward =
                self.count_in_direction(row, column, player, -dr, -dc);
            forward + backward + 1 >= CONNECT
        })
    }

    /// Counts contiguous `player` cells starting one step away from
    /// `(row, column)` and walking by `(d_row, d_col)`. The start cell
    /// itself is not counted.
    pub fn count_in_direction(
        &self,
        row: usize,
        column: usize,
        player: Player,
        d_row: isize,
        d_col: isize,
    ) -> usize {
        let mut count = 0;
        let mut r = row as isize + d_row;
        let mut c = column as isize + d_col;
        while let Some(cell) = self.cell_at(r, c) {
            if cell != Some(player) {
                break;
            }
            count += 1;
            r += d_row;
            c += d_col;
        }
        count
    }

    /// The occupant of a cell, or `None` for empty or out-of-range cells.
    pub fn get(&self, row: usize, column: usize) -> Option<Player> {
        self.grid.get(row).and_then(|r| r.get(column)).copied().flatten()
    }

    /// Current fill height of `column` (0 for out-of-range columns).
    pub fn height(&self, column: usize) -> usize {
        self.heights.get(column).map_or(0, |&h| usize::from(h))
    }

    /// All columns that still accept a piece, in natural order.
    pub fn legal_columns(&self) -> impl Iterator<Item = usize> + '_ {
        (0..COLS).filter(|&c| self.is_legal(c))
    }

    /// Number of pieces on the board.
    pub fn piece_count(&self) -> usize {
        self.heights.iter().map(|&h| usize::from(h)).sum()
    }

    /// Row-major view of the grid (row 0 first).
    pub fn grid(&self) -> &[[Option<Player>; COLS]; ROWS] {
        &self.grid
    }

    /// Per-column fill heights.
    pub fn heights(&self) -> [u8; COLS] {
        self.heights
    }

    /// Bounds-checked cell lookup for signed coordinates. `None` means
    /// off the board; `Some(None)` is an empty cell.
    fn cell_at(&self, row: isize, column: isize) -> Option<Option<Player>> {
        let row = usize::try_from(row).ok()?;
        let column = usize::try_from(column).ok()?;
        self.grid.get(row)?.get(column).copied()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a board by dropping pieces column by column, alternating
    /// players starting with `Player::One`.
    fn play(columns: &[usize]) -> Board {
        let mut board = Board::new();
        let mut player = Player::One;
        for &c in columns {
            board.place(c, player).expect("test move should be legal");
            player = player.other();
        }
        board
    }

    // =====================================================================
    // place() / is_legal()
    // =====================================================================

    #[test]
    fn test_place_stacks_from_bottom() {
        let mut board = Board::new();
        assert_eq!(board.place(3, Player::One), Some(0));
        assert_eq!(board.place(3, Player::Two), Some(1));
        assert_eq!(board.get(0, 3), Some(Player::One));
        assert_eq!(board.get(1, 3), Some(Player::Two));
        assert_eq!(board.height(3), 2);
    }

    #[test]
    fn test_place_full_column_returns_none_and_leaves_board_unchanged() {
        let mut board = play(&[0, 0, 0, 0, 0, 0]);
        let before = board;

        assert!(!board.is_legal(0));
        assert_eq!(board.place(0, Player::One), None);
        assert_eq!(board, before);
    }

    #[test]
    fn test_place_out_of_range_column_returns_none() {
        let mut board = Board::new();
        assert!(!board.is_legal(COLS));
        assert_eq!(board.place(COLS, Player::One), None);
        assert_eq!(board.piece_count(), 0);
    }

    #[test]
    fn test_heights_match_occupied_cells() {
        let board = play(&[3, 3, 2, 4, 4, 4, 6]);
        for c in 0..COLS {
            let occupied = (0..ROWS).filter(|&r| board.get(r, c).is_some()).count();
            assert_eq!(board.height(c), occupied, "column {c}");
        }
    }

    #[test]
    fn test_legal_columns_skips_full_columns() {
        let board = play(&[1, 1, 1, 1, 1, 1]);
        let legal: Vec<usize> = board.legal_columns().collect();
        assert_eq!(legal, vec![0, 2, 3, 4, 5, 6]);
    }

    // =====================================================================
    // is_full()
    // =====================================================================

    #[test]
    fn test_is_full_only_when_every_column_is_full() {
        let mut board = Board::new();
        assert!(!board.is_full());
        for c in 0..COLS {
            for r in 0..ROWS {
                let p = if (r + c) % 2 == 0 { Player::One } else { Player::Two };
                board.place(c, p);
            }
            assert_eq!(board.is_full(), c == COLS - 1);
        }
    }

    // =====================================================================
    // check_win()
    // =====================================================================

    #[test]
    fn test_check_win_vertical() {
        let mut board = Board::new();
        for _ in 0..3 {
            board.place(3, Player::One);
        }
        assert!(!board.check_win(2, 3, Player::One));
        let row = board.place(3, Player::One).unwrap();
        assert_eq!(row, 3);
        assert!(board.check_win(3, 3, Player::One));
    }

    #[test]
    fn test_check_win_horizontal_with_gap_filled_last() {
        let mut board = Board::new();
        for c in [0, 1, 3] {
            board.place(c, Player::Two);
        }
        assert!(!board.check_win(0, 3, Player::Two));
        board.place(2, Player::Two);
        // The completing piece is in the middle of the line.
        assert!(board.check_win(0, 2, Player::Two));
    }

    #[test]
    fn test_check_win_rising_diagonal() {
        // One: (0,0) (1,1) (2,2) (3,3); Two fills underneath.
        let board = play(&[0, 1, 1, 2, 2, 3, 2, 3, 3, 6, 3]);
        assert_eq!(board.get(3, 3), Some(Player::One));
        assert!(board.check_win(3, 3, Player::One));
    }

    #[test]
    fn test_check_win_falling_diagonal() {
        // One: (3,0) (2,1) (1,2) (0,3).
        let board = play(&[3, 2, 2, 1, 1, 0, 1, 0, 0, 6, 0]);
        assert_eq!(board.get(3, 0), Some(Player::One));
        assert!(board.check_win(3, 0, Player::One));
        assert!(board.check_win(0, 3, Player::One));
    }

    #[test]
    fn test_check_win_three_in_a_row_is_not_a_win() {
        let board = play(&[0, 6, 1, 6, 2]);
        assert!(!board.check_win(0, 2, Player::One));
    }

    #[test]
    fn test_check_win_ignores_other_players_pieces() {
        let board = play(&[0, 1, 2, 3]);
        assert!(!board.check_win(0, 3, Player::Two));
        assert!(!board.check_win(0, 3, Player::One));
    }

    #[test]
    fn test_check_win_out_of_range_is_false() {
        let board = Board::new();
        assert!(!board.check_win(ROWS, 0, Player::One));
        assert!(!board.check_win(0, COLS, Player::One));
    }

    // =====================================================================
    // clone semantics
    // =====================================================================

    #[test]
    fn test_copy_is_independent() {
        let original = play(&[3]);
        let mut sim = original;
        sim.place(3, Player::Two);
        assert_eq!(original.height(3), 1);
        assert_eq!(sim.height(3), 2);
    }
}
