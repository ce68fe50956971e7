//! Strictly Duel library - authoritative two-player tic-tac-toe over TCP
//!
//! # Architecture
//!
//! - **Board engine**: pure game state, no I/O ([`Game`])
//! - **Participant channel**: one connection as typed send/receive ([`ParticipantChannel`])
//! - **Session**: pairs two channels with one engine under a single lock ([`Session`])
//! - **Matchmaker**: accept loop that fills sessions ([`Matchmaker`])
//! - **Client**: renders notifications, forwards moves ([`run_client`])
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strictly_duel::{Matchmaker, ServerConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let matchmaker = Arc::new(Matchmaker::new(ServerConfig::default()));
//! let listener = matchmaker.bind().await?;
//! matchmaker.serve(listener).await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod channel;
mod client;
mod config;
mod error;
mod games;
mod matchmaker;
mod protocol;
mod session;

// Crate-level exports - Board engine
pub use games::tictactoe::{
    BOARD_SIZE, Board, Cell, Game, Mark, Move, MoveError, Outcome, check_winner, is_full,
};

// Crate-level exports - Wire protocol
pub use protocol::{DEFAULT_MAX_FRAME_LENGTH, Message, MessageCodec};

// Crate-level exports - Participant channel
pub use channel::{InboundHandler, InboundLoop, ParticipantChannel, ParticipantId};

// Crate-level exports - Session management
pub use session::{Session, SessionId, SessionPhase, Slot};

// Crate-level exports - Listener
pub use matchmaker::Matchmaker;

// Crate-level exports - Client
pub use client::{Presenter, TextPresenter, parse_move, run_client};

// Crate-level exports - Configuration and errors
pub use config::ServerConfig;
pub use error::{CodecError, CommunicationError, ConfigError, PairingError, ProtocolError};
