//! Game rules for Dropfour.
//!
//! This crate is pure logic with no I/O and no async:
//!
//! - **Board** ([`Board`]): the 6×7 grid, move legality, placement,
//!   and win/fill detection.
//! - **Opponent** ([`select_move`], [`Strategy`]): how the scripted
//!   opponent picks its column.
//! - **Heuristic** ([`evaluate`], [`minimax`]): static evaluation and a
//!   fixed-depth search, used only by the optional [`Lookahead`] bot.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session Layer (above)  ← owns one Board per game, asks the Strategy for bot moves
//!     ↕
//! Engine (this crate)    ← rules only, cheap to copy for simulation
//! ```

mod board;
mod heuristic;
mod opponent;
mod player;

pub use board::{Board, COLS, CONNECT, ROWS};
pub use heuristic::{evaluate, minimax, WIN_SCORE};
pub use opponent::{select_move, Lookahead, Scripted, Strategy, CENTER_OUT};
pub use player::{InvalidPlayer, Player};
