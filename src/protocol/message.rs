//! Wire messages exchanged between the server and a participant.

use crate::games::tictactoe::{Board, Mark, Outcome};
use serde::{Deserialize, Serialize};

/// One frame on the wire. Each variant carries only its own fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Server → client: role assigned at pairing.
    PlayerConnected {
        /// Mark the recipient plays.
        mark: Mark,
        /// Human-readable text.
        text: String,
    },
    /// Server → client: no opponent yet.
    Waiting {
        /// Human-readable text.
        text: String,
    },
    /// Server → client: match begins.
    GameStart {
        /// Board at the start of the match.
        board: Board,
    },
    /// Server → client: the recipient may move.
    YourTurn {
        /// Human-readable text.
        text: String,
    },
    /// Server → client: the recipient must wait.
    OpponentTurn {
        /// Human-readable text.
        text: String,
    },
    /// Client → server: move request.
    PlayerMove {
        /// Row, 0 at the top.
        row: u8,
        /// Column, 0 at the left.
        col: u8,
        /// Mark the sender believes it plays.
        mark: Mark,
    },
    /// Server → client: move accepted.
    GameUpdate {
        /// Board after the move.
        board: Board,
        /// Row of the accepted move.
        row: u8,
        /// Column of the accepted move.
        col: u8,
        /// Mark that moved.
        mark: Mark,
    },
    /// Server → client: move rejected.
    InvalidMove {
        /// Reason for the rejection.
        text: String,
    },
    /// Server → client: the match ended.
    GameOver {
        /// Whether the board reached a terminal result (false when the
        /// match ended because the opponent left).
        won: bool,
        /// Terminal result; `Draw` is the draw sentinel.
        outcome: Option<Outcome>,
        /// Human-readable text.
        text: String,
    },
}

impl Message {
    /// Role announcement for `mark`.
    pub fn player_connected(mark: Mark) -> Self {
        Message::PlayerConnected {
            mark,
            text: format!("You are player {}", mark),
        }
    }

    /// Waiting-for-opponent notice.
    pub fn waiting() -> Self {
        Message::Waiting {
            text: "Waiting for an opponent...".to_string(),
        }
    }

    /// Turn notice for the mark to move.
    pub fn your_turn() -> Self {
        Message::YourTurn {
            text: "Your turn!".to_string(),
        }
    }

    /// Turn notice for the mark that waits.
    pub fn opponent_turn() -> Self {
        Message::OpponentTurn {
            text: "Opponent's turn".to_string(),
        }
    }

    /// Rejection notice.
    pub fn invalid_move(reason: impl std::fmt::Display) -> Self {
        Message::InvalidMove {
            text: reason.to_string(),
        }
    }

    /// Terminal notice for a finished board.
    pub fn game_over(outcome: Outcome) -> Self {
        Message::GameOver {
            won: true,
            outcome: Some(outcome),
            text: outcome.to_string(),
        }
    }

    /// Terminal notice sent to the survivor of a disconnect.
    pub fn peer_disconnected() -> Self {
        Message::GameOver {
            won: false,
            outcome: None,
            text: "Your opponent disconnected".to_string(),
        }
    }

    /// Tag name, for logging.
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}
