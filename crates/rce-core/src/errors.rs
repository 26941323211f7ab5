//! Codec error types.

use thiserror::Error;

/// Errors raised while decoding or assembling wire frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame text is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is valid JSON but not a well-formed envelope.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// Binary frame could not be parsed as an attachment.
    #[error("invalid binary attachment: {0}")]
    InvalidAttachment(String),

    /// Too many envelopes or binaries waiting to be matched.
    #[error("frame assembly limit exceeded: {0}")]
    LimitExceeded(String),
}

impl CodecError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}
