//! Thin client: renders server notifications and forwards move requests.

use crate::error::CommunicationError;
use crate::games::tictactoe::Mark;
use crate::protocol::{Message, MessageCodec};
use futures::{SinkExt, StreamExt};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument, warn};

/// Anything that can show the game to a human.
pub trait Presenter: Send {
    /// Shows one notification from the server.
    fn render(&mut self, message: &Message);

    /// Shows a local hint (bad input, not paired yet, ...).
    fn notice(&mut self, text: &str);
}

/// Plain-text presenter writing to any [`Write`] sink.
#[derive(Debug)]
pub struct TextPresenter<W> {
    out: W,
}

impl<W: Write + Send> TextPresenter<W> {
    /// Creates a presenter writing to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the underlying sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text) {
            warn!(error = %e, "Failed to write to terminal");
        }
    }
}

impl<W: Write + Send> Presenter for TextPresenter<W> {
    fn render(&mut self, message: &Message) {
        match message {
            Message::PlayerConnected { text, .. }
            | Message::Waiting { text }
            | Message::YourTurn { text }
            | Message::OpponentTurn { text } => self.line(text),
            Message::GameStart { board } => {
                self.line("Game on!");
                self.line(&board.display());
            }
            Message::GameUpdate { board, row, col, mark } => {
                self.line(&format!("{} played ({}, {})", mark, row, col));
                self.line(&board.display());
            }
            Message::InvalidMove { text } => self.line(&format!("Invalid move: {}", text)),
            Message::GameOver { text, .. } => self.line(&format!("Game over: {}", text)),
            Message::PlayerMove { .. } => {}
        }
    }

    fn notice(&mut self, text: &str) {
        self.line(text);
    }
}

/// Parses `"<row> <col>"` (space or comma separated) into coordinates.
pub fn parse_move(line: &str) -> Option<(u8, u8)> {
    let mut parts = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty());
    let row = parts.next()?.parse().ok()?;
    let col = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((row, col))
}

/// Plays one connection: renders everything the server sends through
/// `presenter` and turns each line of `input` into a move request.
///
/// Returns when the server closes the stream.
#[instrument(skip_all)]
pub async fn run_client<S, I, P>(
    stream: S,
    input: I,
    mut presenter: P,
) -> Result<P, CommunicationError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    I: AsyncBufRead + Unpin,
    P: Presenter,
{
    let (mut sink, mut frames) = Framed::new(stream, MessageCodec::default()).split();
    let mut lines = input.lines();
    let mut input_open = true;
    let mut mark: Option<Mark> = None;

    loop {
        tokio::select! {
            frame = frames.next() => match frame {
                None => {
                    info!("Server closed the connection");
                    return Ok(presenter);
                }
                Some(Ok(Ok(message))) => {
                    if let Message::PlayerConnected { mark: assigned, .. } = &message {
                        mark = Some(*assigned);
                    }
                    presenter.render(&message);
                }
                Some(Ok(Err(e))) => warn!(error = %e, "Skipping malformed frame"),
                Some(Err(e)) => return Err(e.into()),
            },
            line = lines.next_line(), if input_open => match line? {
                None => {
                    debug!("Input closed");
                    input_open = false;
                }
                Some(line) => match (parse_move(&line), mark) {
                    (Some((row, col)), Some(mark)) => {
                        sink.send(Message::PlayerMove { row, col, mark }).await?;
                    }
                    (None, _) => presenter.notice("Enter a move as: <row> <col>"),
                    (Some(_), None) => presenter.notice("No opponent yet"),
                },
            },
        }
    }
}
