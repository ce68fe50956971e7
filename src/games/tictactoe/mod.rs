//! Tic-tac-toe board engine.

mod action;
mod rules;
mod types;

pub use action::{Move, MoveError};
pub use rules::{Game, check_winner, is_full};
pub use types::{BOARD_SIZE, Board, Cell, Mark, Outcome};
