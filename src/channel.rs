//! Participant channel: one connected player as a typed send/receive pair.
//!
//! Outbound messages go through an unbounded queue drained by a dedicated
//! writer task, so [`ParticipantChannel::send`] never blocks and messages
//! to one participant leave in the order they were queued. The inbound
//! loop runs on its own task and reports to an [`InboundHandler`].

use crate::config::ServerConfig;
use crate::error::CommunicationError;
use crate::games::tictactoe::Move;
use crate::protocol::{Message, MessageCodec};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Identifier handed to each accepted connection.
pub type ParticipantId = u64;

/// Receiver of everything a participant's inbound loop produces.
pub trait InboundHandler: Send + Sync + 'static {
    /// A `PlayerMove` arrived from `from`.
    fn on_move(&self, from: ParticipantId, mov: Move);

    /// The participant's connection is gone. Called exactly once.
    fn on_disconnect(&self, from: ParticipantId);
}

#[derive(Debug)]
struct ChannelState {
    live: AtomicBool,
    reported: AtomicBool,
    shutdown: CancellationToken,
}

impl ChannelState {
    fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            reported: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    fn kill(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
    }

    /// True only for the first caller.
    fn claim_report(&self) -> bool {
        !self.reported.swap(true, Ordering::SeqCst)
    }
}

/// Send side of one participant. Cheap to clone; all clones share liveness.
#[derive(Debug, Clone)]
pub struct ParticipantChannel {
    id: ParticipantId,
    peer: Arc<str>,
    outbox: mpsc::UnboundedSender<Message>,
    state: Arc<ChannelState>,
}

impl ParticipantChannel {
    /// Wraps `stream`, spawning its writer task.
    ///
    /// The returned [`InboundLoop`] must be started with
    /// [`InboundLoop::spawn`] once the channel has somewhere to report to.
    #[instrument(skip(stream, peer, config), fields(participant_id = id, peer = %peer))]
    pub fn open<S>(
        stream: S,
        id: ParticipantId,
        peer: String,
        config: &ServerConfig,
    ) -> (Self, InboundLoop<ReadHalf<S>>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (outbox, queue) = mpsc::unbounded_channel();
        let state = Arc::new(ChannelState::new());

        let writer = FramedWrite::new(write_half, MessageCodec::new(*config.max_frame_length()));
        tokio::spawn(write_loop(
            id,
            writer,
            queue,
            state.clone(),
            config.write_timeout(),
        ));

        let inbound = InboundLoop {
            id,
            reader: FramedRead::new(read_half, MessageCodec::new(*config.max_frame_length())),
            state: state.clone(),
        };

        info!("Participant channel opened");
        let channel = Self {
            id,
            peer: peer.into(),
            outbox,
            state,
        };
        (channel, inbound)
    }

    /// A channel with no connection behind it; queued messages land in the
    /// returned receiver.
    #[cfg(test)]
    pub(crate) fn detached(id: ParticipantId) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (outbox, queue) = mpsc::unbounded_channel();
        let channel = Self {
            id,
            peer: Arc::from("detached"),
            outbox,
            state: Arc::new(ChannelState::new()),
        };
        (channel, queue)
    }

    /// Returns the participant id.
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// Returns the remote address label.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Whether the channel can still carry messages.
    pub fn is_live(&self) -> bool {
        self.state.live.load(Ordering::SeqCst)
    }

    /// Queues `message` for delivery.
    ///
    /// Fails when the channel is dead; a failure marks the channel dead,
    /// and the disconnect is reported by the inbound loop.
    #[instrument(skip(self, message), fields(participant_id = self.id, kind = message.kind()))]
    pub fn send(&self, message: Message) -> Result<(), CommunicationError> {
        if !self.is_live() {
            return Err(CommunicationError::new(format!(
                "Participant {} is disconnected",
                self.id
            )));
        }

        self.outbox.send(message).map_err(|_| {
            self.state.kill();
            CommunicationError::new(format!("Writer for participant {} has stopped", self.id))
        })
    }

    /// Releases the connection. Idempotent.
    #[instrument(skip(self), fields(participant_id = self.id))]
    pub fn close(&self) {
        if self.state.live.swap(false, Ordering::SeqCst) {
            debug!("Closing participant channel");
        }
        self.state.shutdown.cancel();
    }
}

#[instrument(skip(writer, queue, state), fields(participant_id = id))]
async fn write_loop<W>(
    id: ParticipantId,
    mut writer: FramedWrite<W, MessageCodec>,
    mut queue: mpsc::UnboundedReceiver<Message>,
    state: Arc<ChannelState>,
    write_timeout: Duration,
) where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        let message = tokio::select! {
            _ = state.shutdown.cancelled() => break,
            message = queue.recv() => message,
        };
        let Some(message) = message else {
            break;
        };

        let kind = message.kind();
        let result = match tokio::time::timeout(write_timeout, writer.send(message)).await {
            Ok(sent) => sent.map_err(CommunicationError::from),
            Err(_) => Err(CommunicationError::new(format!(
                "Write timed out after {:?}",
                write_timeout
            ))),
        };

        if let Err(e) = result {
            warn!(error = %e, kind, "Send failed, dropping participant");
            state.kill();
            break;
        }
        debug!(kind, "Message sent");
    }

    let _ = writer.close().await;
    debug!("Writer stopped");
}

/// Receive side of one participant, not yet running.
#[derive(Debug)]
pub struct InboundLoop<R> {
    id: ParticipantId,
    reader: FramedRead<R, MessageCodec>,
    state: Arc<ChannelState>,
}

impl<R> InboundLoop<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Runs the loop on its own task, reporting to `handler`.
    pub fn spawn(self, handler: Arc<dyn InboundHandler>) -> JoinHandle<()> {
        tokio::spawn(self.run(handler))
    }

    #[instrument(skip(self, handler), fields(participant_id = self.id))]
    async fn run(mut self, handler: Arc<dyn InboundHandler>) {
        loop {
            let frame = tokio::select! {
                _ = self.state.shutdown.cancelled() => {
                    debug!("Channel shut down");
                    break;
                }
                frame = self.reader.next() => frame,
            };

            match frame {
                None => {
                    info!("Participant closed the stream");
                    break;
                }
                Some(Ok(Ok(Message::PlayerMove { row, col, mark }))) => {
                    handler.on_move(self.id, Move::new(row.into(), col.into(), mark));
                }
                Some(Ok(Ok(other))) => {
                    debug!(kind = other.kind(), "Ignoring inbound message");
                }
                Some(Ok(Err(e))) => {
                    warn!(error = %e, "Skipping malformed frame");
                }
                Some(Err(e)) => {
                    let e = CommunicationError::from(e);
                    warn!(error = %e, "Receive failed");
                    break;
                }
            }
        }

        self.state.kill();
        if self.state.claim_report() {
            handler.on_disconnect(self.id);
        }
    }
}
