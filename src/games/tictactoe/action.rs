//! Move requests and the reasons the engine turns them down.

use super::Mark;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A move in tic-tac-toe: a mark placed at `(row, col)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// Row, 0 at the top.
    pub row: usize,
    /// Column, 0 at the left.
    pub col: usize,
    /// The mark being placed.
    pub mark: Mark,
}

impl Move {
    /// Creates a new move.
    #[instrument]
    pub fn new(row: usize, col: usize, mark: Mark) -> Self {
        Self { row, col, mark }
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> ({}, {})", self.mark, self.row, self.col)
    }
}

/// Why a move was rejected. Rejection never changes game state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum MoveError {
    /// Coordinates outside `[0, 3)`.
    #[display("Cell ({}, {}) is off the board", row, col)]
    OutOfBounds {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
    },

    /// The target cell already holds a mark.
    #[display("Cell ({}, {}) is already occupied", row, col)]
    CellOccupied {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
    },

    /// The mark is not the one to move.
    #[display("It's not {}'s turn", _0)]
    WrongTurn(Mark),

    /// The game already has a terminal result.
    #[display("Game is already over")]
    GameOver,
}

impl std::error::Error for MoveError {}
