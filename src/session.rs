//! Game session: two participant slots bound to one board engine.
//!
//! All mutation (pairing, moves, disconnects, reset) happens under one
//! mutex per session. Outbound sends only enqueue onto each participant's
//! own writer, so the lock is never held across network I/O.

use crate::channel::{InboundHandler, ParticipantChannel, ParticipantId};
use crate::error::PairingError;
use crate::games::tictactoe::{Board, Game, Mark, Move, MoveError};
use crate::protocol::Message;
use std::sync::{Mutex, MutexGuard};
use strum::IntoEnumIterator;
use tracing::{debug, info, instrument, warn};

/// Unique identifier for a game session.
pub type SessionId = u64;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum SessionPhase {
    /// Zero or one participant attached.
    AwaitingPlayers,
    /// Both participants attached and the board is live.
    InProgress,
    /// The board reached a terminal result.
    Finished,
}

/// Participant slot. Slot A plays X, slot B plays O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter)]
pub enum Slot {
    /// First slot, plays X.
    A,
    /// Second slot, plays O.
    B,
}

impl Slot {
    /// The mark a participant in this slot plays.
    pub fn mark(self) -> Mark {
        match self {
            Slot::A => Mark::X,
            Slot::B => Mark::O,
        }
    }

    /// The slot playing `mark`.
    pub fn for_mark(mark: Mark) -> Self {
        match mark {
            Mark::X => Slot::A,
            Mark::O => Slot::B,
        }
    }

    /// The other slot.
    pub fn other(self) -> Self {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    game: Game,
    slots: [Option<ParticipantChannel>; 2],
}

impl SessionState {
    fn occupant(&self, slot: Slot) -> Option<&ParticipantChannel> {
        self.slots[slot.index()].as_ref()
    }

    fn slot_of(&self, id: ParticipantId) -> Option<Slot> {
        Slot::iter().find(|slot| self.occupant(*slot).map(ParticipantChannel::id) == Some(id))
    }

    fn is_live(&self, slot: Slot) -> bool {
        self.occupant(slot).is_some_and(ParticipantChannel::is_live)
    }

    /// Queues `message` for the occupant of `slot`. Failures are logged;
    /// the participant's inbound loop reports the disconnect.
    fn send_to(&self, slot: Slot, message: Message) {
        let Some(channel) = self.occupant(slot) else {
            debug!(?slot, kind = message.kind(), "No participant in slot, dropping message");
            return;
        };
        if let Err(e) = channel.send(message) {
            warn!(participant_id = channel.id(), error = %e, "Send failed");
        }
    }

    fn broadcast(&self, message: Message) {
        self.send_to(Slot::A, message.clone());
        self.send_to(Slot::B, message);
    }

    fn announce_turn(&self) {
        let to_move = Slot::for_mark(self.game.current_player());
        self.send_to(to_move, Message::your_turn());
        self.send_to(to_move.other(), Message::opponent_turn());
    }

    fn start_match(&mut self) {
        self.game.reset();
        self.phase = SessionPhase::InProgress;

        for slot in Slot::iter() {
            self.send_to(slot, Message::player_connected(slot.mark()));
        }
        self.broadcast(Message::GameStart {
            board: self.game.snapshot(),
        });
        self.announce_turn();
    }
}

/// A two-player match and its participants.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    state: Mutex<SessionState>,
}

impl Session {
    /// Creates an empty session awaiting players.
    #[instrument]
    pub fn new(id: SessionId) -> Self {
        info!(session_id = id, "Creating new game session");
        Self {
            id,
            state: Mutex::new(SessionState {
                phase: SessionPhase::AwaitingPlayers,
                game: Game::new(),
                slots: [None, None],
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!(session_id = self.id, "Session lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Returns the session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    /// Returns a copy of the board.
    pub fn snapshot(&self) -> Board {
        self.lock().game.snapshot()
    }

    /// Returns a copy of the engine state.
    pub fn game(&self) -> Game {
        self.lock().game.clone()
    }

    /// Returns the id of the participant in `slot`, if any.
    pub fn occupant(&self, slot: Slot) -> Option<ParticipantId> {
        self.lock().occupant(slot).map(ParticipantChannel::id)
    }

    /// Whether a new participant could be attached now.
    pub fn has_open_slot(&self) -> bool {
        let state = self.lock();
        state.phase == SessionPhase::AwaitingPlayers
            && Slot::iter().any(|slot| !state.is_live(slot))
    }

    /// Whether no participant is attached.
    pub fn is_vacant(&self) -> bool {
        self.lock().slots.iter().all(Option::is_none)
    }

    /// Attaches `channel` to the first open slot and returns its mark.
    ///
    /// Filling the second slot starts the match; filling only one sends
    /// the newcomer a `Waiting` notice.
    #[instrument(skip(self, channel), fields(session_id = self.id, participant_id = channel.id()))]
    pub fn attach(&self, channel: ParticipantChannel) -> Result<Mark, PairingError> {
        let mut state = self.lock();

        if state.phase != SessionPhase::AwaitingPlayers {
            warn!(phase = %state.phase, "Session is not accepting players");
            return Err(PairingError::new(format!(
                "Session {} is {}",
                self.id, state.phase
            )));
        }

        let Some(slot) = Slot::iter().find(|slot| !state.is_live(*slot)) else {
            warn!("Session already has 2 players");
            return Err(PairingError::new(format!("Session {} is full", self.id)));
        };

        if let Some(stale) = state.slots[slot.index()].take() {
            debug!(participant_id = stale.id(), ?slot, "Replacing dead participant");
            stale.close();
        }

        let mark = slot.mark();
        info!(?slot, %mark, peer = channel.peer(), "Participant attached");
        state.slots[slot.index()] = Some(channel);

        if state.is_live(slot.other()) {
            info!("Both slots filled, starting match");
            state.start_match();
        } else {
            state.send_to(slot, Message::waiting());
        }

        Ok(mark)
    }

    /// Handles a move request from participant `from`.
    ///
    /// The sender's slot decides its mark; the mark declared in `mov` is
    /// only checked for consistency. Rejections go to the sender alone.
    #[instrument(skip(self), fields(session_id = self.id))]
    pub fn on_move(&self, from: ParticipantId, mov: Move) {
        let mut state = self.lock();

        let Some(slot) = state.slot_of(from) else {
            warn!("Move from participant not in this session");
            return;
        };
        let mark = slot.mark();
        if mov.mark != mark {
            warn!(
                declared = %mov.mark,
                assigned = %mark,
                "Declared mark differs from assigned mark"
            );
        }

        match state.phase {
            SessionPhase::InProgress => {}
            SessionPhase::Finished => {
                state.send_to(slot, Message::invalid_move(MoveError::GameOver));
                return;
            }
            SessionPhase::AwaitingPlayers => {
                state.send_to(slot, Message::invalid_move("The game has not started"));
                return;
            }
        }

        if !state.is_live(slot.other()) {
            state.send_to(slot, Message::invalid_move("Waiting for your opponent"));
            return;
        }

        if mark != state.game.current_player() {
            debug!(%mark, current = %state.game.current_player(), "Move out of turn");
            state.send_to(slot, Message::invalid_move(MoveError::WrongTurn(mark)));
            return;
        }

        let outcome = match state.game.apply_move(mov.row, mov.col, mark) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(error = %e, "Move rejected");
                state.send_to(slot, Message::invalid_move(e));
                return;
            }
        };

        // Accepted moves are on the board, so both coordinates are < 3.
        state.broadcast(Message::GameUpdate {
            board: state.game.snapshot(),
            row: mov.row as u8,
            col: mov.col as u8,
            mark,
        });

        match outcome {
            Some(outcome) => {
                info!(?outcome, "Match finished");
                state.broadcast(Message::game_over(outcome));
                state.phase = SessionPhase::Finished;
            }
            None => state.announce_turn(),
        }
    }

    /// Handles the loss of participant `from`.
    ///
    /// Vacates that slot and returns to `AwaitingPlayers`. A live survivor
    /// keeps its slot and is told the match is over. The board is left as
    /// it was until the next pairing resets it.
    #[instrument(skip(self), fields(session_id = self.id))]
    pub fn on_disconnect(&self, from: ParticipantId) {
        let mut state = self.lock();

        let Some(slot) = state.slot_of(from) else {
            debug!("Disconnect from participant no longer in this session");
            return;
        };

        if let Some(channel) = state.slots[slot.index()].take() {
            channel.close();
        }
        info!(?slot, phase = %state.phase, "Participant disconnected");
        state.phase = SessionPhase::AwaitingPlayers;

        let survivor = slot.other();
        if state.is_live(survivor) {
            state.send_to(survivor, Message::peer_disconnected());
            state.send_to(survivor, Message::waiting());
        }
    }

    /// Detaches the only live participant of a session still awaiting an
    /// opponent, leaving the session vacant. Any dead occupant is closed.
    #[instrument(skip(self), fields(session_id = self.id))]
    pub(crate) fn take_waiting(&self) -> Option<ParticipantChannel> {
        let mut state = self.lock();
        if state.phase != SessionPhase::AwaitingPlayers {
            return None;
        }

        let live: Vec<Slot> = Slot::iter().filter(|slot| state.is_live(*slot)).collect();
        let &[slot] = live.as_slice() else {
            return None;
        };

        if let Some(stale) = state.slots[slot.other().index()].take() {
            stale.close();
        }
        debug!(?slot, "Detaching waiting participant");
        state.slots[slot.index()].take()
    }

    /// Clears both slots, closing their channels, and discards the board.
    #[instrument(skip(self), fields(session_id = self.id))]
    pub fn reset(&self) {
        let mut state = self.lock();
        for slot in state.slots.iter_mut() {
            if let Some(channel) = slot.take() {
                channel.close();
            }
        }
        state.game.reset();
        state.phase = SessionPhase::AwaitingPlayers;
        info!("Session reset");
    }
}

impl InboundHandler for Session {
    fn on_move(&self, from: ParticipantId, mov: Move) {
        Session::on_move(self, from, mov);
    }

    fn on_disconnect(&self, from: ParticipantId) {
        Session::on_disconnect(self, from);
    }
}
