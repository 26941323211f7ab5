//! Client error types.

use rce_core::CodecError;

/// Errors surfaced by the protocol client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network or HTTP failure during the handshake or on the stream.
    #[error("transport error ({status}): {message}")]
    Transport {
        /// HTTP status code (0 if no response).
        status: u16,
        /// Error description, including the server-reported body when present.
        message: String,
    },

    /// Malformed handshake response, malformed inbound frame, or attachments
    /// where none are allowed. Fatal to the session.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The tag is already bound to another interface.
    #[error("tag already registered: {0}")]
    DuplicateTag(String),

    /// A message type does not match the interface's declared type.
    #[error("type mismatch: expected '{expected}', got '{actual}'")]
    TypeMismatch {
        /// Declared type of the interface.
        expected: String,
        /// Type carried by the envelope.
        actual: String,
    },

    /// A response carries a correlation id with no pending call.
    #[error("no pending call '{msg_id}' on interface '{tag}'")]
    UnknownCorrelation {
        /// Interface tag.
        tag: String,
        /// Unmatched correlation id.
        msg_id: String,
    },

    /// No streaming session is attached.
    #[error("not connected")]
    NotConnected,

    /// A handshake is already in flight.
    #[error("connection already in progress")]
    AlreadyConnecting,

    /// A streaming session is already attached.
    #[error("already connected")]
    AlreadyConnected,
}

impl ClientError {
    /// Build a transport error that carries no HTTP status.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: 0,
            message: message.into(),
        }
    }

    /// Whether this error tears down the session.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::ProtocolViolation(_))
    }
}

impl From<CodecError> for ClientError {
    fn from(err: CodecError) -> Self {
        Self::ProtocolViolation(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            status: err.status().map_or(0, |s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
