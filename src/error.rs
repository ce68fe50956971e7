//! Error taxonomy for the session core.
//!
//! Every error carries the source location it was raised at. None of them
//! is fatal to the process: the accept loop is the top-level recovery
//! boundary.

use derive_more::{Display, Error, From};
use tracing::instrument;

macro_rules! located_error {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Display, Error)]
        #[display("{}: {} at {}:{}", $label, message, file, line)]
        pub struct $name {
            /// Error message.
            pub message: String,
            /// Line number where error occurred.
            pub line: u32,
            /// Source file where error occurred.
            pub file: &'static str,
        }

        impl $name {
            /// Creates a new error with caller location tracking.
            #[track_caller]
            #[instrument(skip(message))]
            pub fn new(message: impl Into<String>) -> Self {
                let loc = std::panic::Location::caller();
                Self {
                    message: message.into(),
                    line: loc.line(),
                    file: loc.file(),
                }
            }
        }
    };
}

located_error!(
    /// Malformed or unexpected inbound frame.
    ProtocolError,
    "Protocol error"
);

located_error!(
    /// I/O failure sending to or receiving from a participant.
    CommunicationError,
    "Communication error"
);

located_error!(
    /// Failure accepting or attaching a connection.
    PairingError,
    "Pairing error"
);

located_error!(
    /// Configuration could not be loaded.
    ConfigError,
    "Config error"
);

impl From<std::io::Error> for CommunicationError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        Self::new(format!("I/O error: {}", err))
    }
}

impl From<std::io::Error> for PairingError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        Self::new(format!("Accept failed: {}", err))
    }
}

/// Failure encoding or decoding a wire frame.
#[derive(Debug, Display, Error, From)]
pub enum CodecError {
    /// Transport-level failure, including oversized frames.
    #[display("Frame I/O error: {}", _0)]
    Io(std::io::Error),
    /// Payload could not be serialized.
    #[display("Frame encoding error: {}", _0)]
    Json(serde_json::Error),
}

impl From<CodecError> for CommunicationError {
    #[track_caller]
    fn from(err: CodecError) -> Self {
        Self::new(err.to_string())
    }
}
