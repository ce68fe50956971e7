//! Length-prefixed JSON framing for [`Message`].
//!
//! Each frame is a 4-byte big-endian length followed by a JSON payload.
//! A frame that is well delimited but does not decode yields
//! `Some(Err(ProtocolError))` so the reader can skip it; an oversized
//! frame is a hard [`CodecError`] that ends the stream.

use super::Message;
use crate::error::{CodecError, ProtocolError};
use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Default upper bound on a single frame payload.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Codec turning a byte stream into [`Message`] frames and back.
#[derive(Debug)]
pub struct MessageCodec {
    frames: LengthDelimitedCodec,
}

impl MessageCodec {
    /// Creates a codec rejecting payloads longer than `max_frame_length`.
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            frames: LengthDelimitedCodec::builder()
                .max_frame_length(max_frame_length)
                .new_codec(),
        }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LENGTH)
    }
}

impl Decoder for MessageCodec {
    type Item = Result<Message, ProtocolError>;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(frame) = self.frames.decode(src)? else {
            return Ok(None);
        };

        Ok(Some(serde_json::from_slice(&frame).map_err(|e| {
            ProtocolError::new(format!("Undecodable frame of {} bytes: {}", frame.len(), e))
        })))
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)?;
        self.frames.encode(Bytes::from(payload), dst)?;
        Ok(())
    }
}
