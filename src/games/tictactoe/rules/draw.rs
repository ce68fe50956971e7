//! Draw detection logic for tic-tac-toe.

use super::super::BOARD_SIZE;
use tracing::instrument;

/// Checks if the given move count fills the board.
///
/// A full board with no winner is a draw.
#[instrument]
pub fn is_full(move_count: usize) -> bool {
    move_count >= BOARD_SIZE * BOARD_SIZE
}
