//! Game logic and rules for tic-tac-toe.

mod draw;
mod win;

pub use draw::is_full;
pub use win::check_winner;

use super::action::MoveError;
use super::types::{BOARD_SIZE, Board, Cell, Mark, Outcome};
use tracing::{debug, instrument};

/// Tic-tac-toe engine: the single source of truth for one match.
///
/// No I/O and no locking; callers serialize access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    board: Board,
    current: Mark,
    move_count: usize,
    outcome: Option<Outcome>,
}

impl Game {
    /// Creates a new game with X to move.
    #[instrument]
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            current: Mark::X,
            move_count: 0,
            outcome: None,
        }
    }

    /// Returns the mark whose turn it is.
    pub fn current_player(&self) -> Mark {
        self.current
    }

    /// Returns the number of accepted moves.
    pub fn move_count(&self) -> usize {
        self.move_count
    }

    /// Returns the terminal result, if the game has one.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Whether the game has a terminal result.
    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// Returns a copy of the board.
    pub fn snapshot(&self) -> Board {
        self.board
    }

    /// Places `mark` at `(row, col)`.
    ///
    /// Checks, in order: bounds, empty target, turn, not already over.
    /// On success returns the terminal result after the move (`None` while
    /// the game continues). On failure nothing changes.
    #[instrument(skip(self), fields(current = %self.current, moves = self.move_count))]
    pub fn apply_move(
        &mut self,
        row: usize,
        col: usize,
        mark: Mark,
    ) -> Result<Option<Outcome>, MoveError> {
        if row >= BOARD_SIZE || col >= BOARD_SIZE {
            return Err(MoveError::OutOfBounds { row, col });
        }

        if !self.board.is_empty(row, col) {
            return Err(MoveError::CellOccupied { row, col });
        }

        if mark != self.current {
            return Err(MoveError::WrongTurn(mark));
        }

        if self.is_over() {
            return Err(MoveError::GameOver);
        }

        self.board.set(row, col, Cell::Occupied(mark));
        self.move_count += 1;

        if let Some(winner) = check_winner(&self.board) {
            self.outcome = Some(Outcome::Win(winner));
        } else if is_full(self.move_count) {
            self.outcome = Some(Outcome::Draw);
        } else {
            self.current = mark.opponent();
        }

        debug!(outcome = ?self.outcome, next = %self.current, "Move applied");
        Ok(self.outcome)
    }

    /// Restores the freshly constructed state.
    #[instrument(skip(self))]
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(game: &mut Game, moves: &[(usize, usize, Mark)]) {
        for &(row, col, mark) in moves {
            game.apply_move(row, col, mark).expect("legal move");
        }
    }

    #[test]
    fn test_new_game_x_to_move() {
        let game = Game::new();
        assert_eq!(game.current_player(), Mark::X);
        assert_eq!(game.move_count(), 0);
        assert_eq!(game.outcome(), None);
        assert_eq!(game.snapshot(), Board::new());
    }

    #[test]
    fn test_turn_alternates_until_terminal() {
        let mut game = Game::new();
        let moves = [(1, 1), (0, 0), (2, 2), (0, 2), (0, 1), (2, 1), (1, 0), (1, 2)];
        for (i, (row, col)) in moves.into_iter().enumerate() {
            let mover = game.current_player();
            assert_eq!(mover, if i % 2 == 0 { Mark::X } else { Mark::O });
            game.apply_move(row, col, mover).expect("legal move");
            assert_eq!(game.current_player(), mover.opponent());
        }
    }

    #[test]
    fn test_top_row_win() {
        let mut game = Game::new();
        play(
            &mut game,
            &[(0, 0, Mark::X), (1, 0, Mark::O), (0, 1, Mark::X), (1, 1, Mark::O)],
        );
        let outcome = game.apply_move(0, 2, Mark::X).expect("legal move");

        assert_eq!(outcome, Some(Outcome::Win(Mark::X)));
        assert!(game.is_over());
        let row = game.snapshot().rows()[0];
        assert_eq!(row, [Cell::Occupied(Mark::X); 3]);
        // Winner keeps the turn marker
        assert_eq!(game.current_player(), Mark::X);
    }

    #[test]
    fn test_column_win_for_o() {
        let mut game = Game::new();
        play(
            &mut game,
            &[
                (0, 0, Mark::X),
                (0, 2, Mark::O),
                (1, 1, Mark::X),
                (1, 2, Mark::O),
                (2, 1, Mark::X),
            ],
        );
        let outcome = game.apply_move(2, 2, Mark::O).expect("legal move");
        assert_eq!(outcome, Some(Outcome::Win(Mark::O)));
    }

    #[test]
    fn test_ninth_move_draw_or_win() {
        let mut game = Game::new();
        play(
            &mut game,
            &[
                (0, 0, Mark::X),
                (0, 1, Mark::O),
                (0, 2, Mark::X),
                (1, 1, Mark::O),
                (1, 0, Mark::X),
                (1, 2, Mark::O),
                (2, 1, Mark::X),
                (2, 0, Mark::O),
            ],
        );
        let outcome = game.apply_move(2, 2, Mark::X).expect("legal move");
        assert_eq!(game.move_count(), 9);
        assert_eq!(outcome, Some(Outcome::Draw));

        let mut game = Game::new();
        play(
            &mut game,
            &[
                (0, 0, Mark::X),
                (0, 1, Mark::O),
                (0, 2, Mark::X),
                (1, 2, Mark::O),
                (1, 1, Mark::X),
                (2, 2, Mark::O),
                (1, 0, Mark::X),
                (2, 1, Mark::O),
            ],
        );
        let outcome = game.apply_move(2, 0, Mark::X).expect("legal move");
        assert_eq!(game.move_count(), 9);
        assert_eq!(outcome, Some(Outcome::Win(Mark::X)));
    }

    #[test]
    fn test_occupied_cell_rejected_without_change() {
        let mut game = Game::new();
        play(&mut game, &[(1, 1, Mark::X)]);
        let before = game.clone();

        let err = game.apply_move(1, 1, Mark::O).unwrap_err();
        assert_eq!(err, MoveError::CellOccupied { row: 1, col: 1 });
        assert_eq!(game, before);
    }

    #[test]
    fn test_wrong_turn_rejected_without_change() {
        let mut game = Game::new();
        let before = game.clone();

        let err = game.apply_move(0, 0, Mark::O).unwrap_err();
        assert_eq!(err, MoveError::WrongTurn(Mark::O));
        assert_eq!(game, before);
    }

    #[test]
    fn test_out_of_bounds_checked_first() {
        let mut game = Game::new();
        let err = game.apply_move(3, 0, Mark::O).unwrap_err();
        assert_eq!(err, MoveError::OutOfBounds { row: 3, col: 0 });
    }

    #[test]
    fn test_no_moves_after_win() {
        let mut game = Game::new();
        play(
            &mut game,
            &[
                (0, 0, Mark::X),
                (1, 0, Mark::O),
                (0, 1, Mark::X),
                (1, 1, Mark::O),
                (0, 2, Mark::X),
            ],
        );
        let before = game.clone();
        let err = game.apply_move(2, 2, Mark::X).unwrap_err();
        assert_eq!(err, MoveError::GameOver);
        assert_eq!(game, before);
    }

    #[test]
    fn test_reset_matches_fresh_game() {
        let mut game = Game::new();
        play(&mut game, &[(0, 0, Mark::X), (2, 2, Mark::O), (1, 1, Mark::X)]);
        game.reset();
        assert_eq!(game, Game::new());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut game = Game::new();
        let snapshot = game.snapshot();
        play(&mut game, &[(0, 0, Mark::X)]);
        assert_eq!(snapshot.get(0, 0), Some(Cell::Empty));
        assert_eq!(game.snapshot().occupied(), game.move_count());
    }
}
