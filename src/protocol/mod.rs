//! Wire protocol: message union and frame codec.

mod codec;
mod message;

pub use codec::{DEFAULT_MAX_FRAME_LENGTH, MessageCodec};
pub use message::Message;
