//! Listener and matchmaker: accepts connections and pairs them into sessions.
//!
//! Every admitted participant has a seat: the session it currently sits
//! in. Inbound loops report to the lobby, which routes each event to
//! the seat's session. Routing by seat lets a waiting participant move to
//! another session, so at most one session is ever waiting for players.

use crate::channel::{InboundHandler, ParticipantChannel, ParticipantId};
use crate::config::ServerConfig;
use crate::error::PairingError;
use crate::games::tictactoe::{Mark, Move};
use crate::session::{Session, SessionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Pause after a failed accept.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Registry {
    sessions: Vec<Arc<Session>>,
    seats: HashMap<ParticipantId, Arc<Session>>,
}

impl Registry {
    /// Returns the first session with an open slot, creating one if none.
    fn pending_session(&mut self, next_session: &AtomicU64) -> Arc<Session> {
        self.sessions.retain(|session| !session.is_vacant());

        if let Some(session) = self.sessions.iter().find(|session| session.has_open_slot()) {
            debug!(session_id = session.id(), "Joining pending session");
            return session.clone();
        }

        let id: SessionId = next_session.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(Session::new(id));
        self.sessions.push(session.clone());
        session
    }

    /// Moves waiting participants into the oldest pending session until at
    /// most one session has an open slot.
    fn consolidate(&mut self) {
        self.sessions.retain(|session| !session.is_vacant());

        loop {
            let pending: Vec<_> = self
                .sessions
                .iter()
                .filter(|session| session.has_open_slot())
                .take(2)
                .cloned()
                .collect();
            let [target, donor] = pending.as_slice() else {
                break;
            };
            let Some(channel) = donor.take_waiting() else {
                break;
            };

            let id = channel.id();
            match target.attach(channel.clone()) {
                Ok(mark) => {
                    info!(
                        participant_id = id,
                        from = donor.id(),
                        to = target.id(),
                        %mark,
                        "Moved waiting participant"
                    );
                    self.seats.insert(id, target.clone());
                }
                Err(e) => {
                    warn!(participant_id = id, error = %e, "Could not move waiting participant");
                    self.seats.remove(&id);
                    channel.close();
                    break;
                }
            }
            self.sessions.retain(|session| !session.is_vacant());
        }
    }
}

/// Routes inbound events to the session each participant sits in.
#[derive(Debug, Default)]
struct Lobby {
    registry: Mutex<Registry>,
}

impl Lobby {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|poisoned| {
            warn!("Session registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl InboundHandler for Lobby {
    fn on_move(&self, from: ParticipantId, mov: Move) {
        let session = self.lock().seats.get(&from).cloned();
        match session {
            Some(session) => session.on_move(from, mov),
            None => warn!(participant_id = from, "Move from participant without a seat"),
        }
    }

    #[instrument(skip(self))]
    fn on_disconnect(&self, from: ParticipantId) {
        let mut registry = self.lock();
        let Some(session) = registry.seats.remove(&from) else {
            debug!("Disconnect from participant without a seat");
            return;
        };
        session.on_disconnect(from);
        registry.consolidate();
    }
}

/// Accepts participants and pairs them into [`Session`]s.
#[derive(Debug)]
pub struct Matchmaker {
    config: ServerConfig,
    lobby: Arc<Lobby>,
    next_participant: AtomicU64,
    next_session: AtomicU64,
    shutdown: CancellationToken,
}

impl Matchmaker {
    /// Creates a matchmaker with no sessions.
    #[instrument(skip(config), fields(addr = %config.bind_addr()))]
    pub fn new(config: ServerConfig) -> Self {
        info!("Creating matchmaker");
        Self {
            config,
            lobby: Arc::new(Lobby::default()),
            next_participant: AtomicU64::new(1),
            next_session: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the configured address.
    #[instrument(skip(self))]
    pub async fn bind(&self) -> Result<TcpListener, PairingError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| PairingError::new(format!("Failed to bind {}: {}", addr, e)))?;
        info!(%addr, "Listening for players");
        Ok(listener)
    }

    /// Accepts connections until [`Matchmaker::shutdown`] is called, then
    /// tears every session down. A failed accept or attach is logged and
    /// the loop carries on.
    #[instrument(skip_all)]
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(error = %e, %addr, "Could not disable Nagle");
                    }
                    if let Err(e) = self.admit(stream, addr.to_string()) {
                        warn!(error = %e, %addr, "Failed to pair connection");
                    }
                }
                Err(e) => {
                    let e = PairingError::from(e);
                    warn!(error = %e, "Accept failed, still listening");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }

        info!("Listener stopped");
        self.teardown();
    }

    /// Wraps `stream` in a participant channel and attaches it to the
    /// pending session. Returns the session and the assigned mark.
    #[instrument(skip(self, stream))]
    pub fn admit<S>(&self, stream: S, peer: String) -> Result<(Arc<Session>, Mark), PairingError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let id: ParticipantId = self.next_participant.fetch_add(1, Ordering::Relaxed);
        let (channel, inbound) = ParticipantChannel::open(stream, id, peer, &self.config);

        let (session, mark) = {
            let mut registry = self.lobby.lock();
            let session = registry.pending_session(&self.next_session);
            let mark = match session.attach(channel.clone()) {
                Ok(mark) => mark,
                Err(e) => {
                    channel.close();
                    return Err(e);
                }
            };
            registry.seats.insert(id, session.clone());
            (session, mark)
        };

        // Spawned only once the seat exists, so an early disconnect (even a
        // stream that is already closed) still finds its session.
        inbound.spawn(self.lobby.clone());
        info!(participant_id = id, session_id = session.id(), %mark, "Participant admitted");
        Ok((session, mark))
    }

    /// Snapshot of the live sessions.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.lobby.lock().sessions.clone()
    }

    /// Stops the accept loop.
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown.cancel();
    }

    fn teardown(&self) {
        let sessions = {
            let mut registry = self.lobby.lock();
            registry.seats.clear();
            std::mem::take(&mut registry.sessions)
        };
        info!(count = sessions.len(), "Tearing down sessions");
        for session in sessions {
            session.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionPhase, Slot};

    async fn eventually(check: impl Fn() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !check() {
            assert!(tokio::time::Instant::now() < deadline, "condition never held");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_admit_already_closed_stream_frees_seat() {
        let matchmaker = Matchmaker::new(ServerConfig::default());
        let (server, client) = tokio::io::duplex(4096);
        drop(client);

        let (session, mark) = matchmaker.admit(server, "gone".to_string()).unwrap();
        assert_eq!(mark, Mark::X);

        eventually(|| session.is_vacant()).await;
        eventually(|| matchmaker.sessions().is_empty()).await;
    }

    #[tokio::test]
    async fn test_survivor_absorbs_waiting_participant() {
        let matchmaker = Matchmaker::new(ServerConfig::default());
        assert_eq!(matchmaker.config().port(), &12345);

        let mut clients = Vec::new();
        let mut admit = |peer: &str| {
            let (server, client) = tokio::io::duplex(4096);
            clients.push(client);
            matchmaker.admit(server, peer.to_string()).unwrap()
        };
        let (first, _) = admit("a");
        admit("b");
        let (second, _) = admit("c");
        assert_ne!(first.id(), second.id());

        // Participant 1 leaves the running match
        drop(clients.remove(0));

        eventually(|| first.occupant(Slot::A) == Some(3)).await;
        assert_eq!(first.phase(), SessionPhase::InProgress);
        assert_eq!(first.occupant(Slot::B), Some(2));
        assert!(second.is_vacant());
        assert_eq!(matchmaker.sessions().len(), 1);
    }
}
