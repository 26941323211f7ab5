//! Wire envelope encoding and decoding.
//!
//! Every unit on the streaming connection is an [`Envelope`]: one JSON text
//! frame followed by one binary frame per attachment.
//!
//! ```text
//! {"type": "<control op | message type>", "tag": "...", "msgID": "...", "data": ...}
//! ```
//!
//! Control operations omit `tag` and `msgID`. Interface messages carry both;
//! publishes use the `"nil"` sentinel as `msgID`.

pub mod assembler;
pub mod payload;

pub use assembler::FrameAssembler;
pub use payload::{Attachment, Payload, binary_references, is_attachment_id};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CodecError;
use crate::ids::CorrelationId;

/// A raw frame on the streaming connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireFrame {
    /// JSON envelope text.
    Text(String),
    /// Binary attachment (id + content).
    Binary(Bytes),
}

/// The wire unit exchanged with the cloud engine.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    /// Control-operation name or application message type.
    pub msg_type: String,
    /// Target interface tag; `None` for control operations.
    pub tag: Option<String>,
    /// Correlation id; `None` for control operations.
    pub msg_id: Option<CorrelationId>,
    /// Content and attachments.
    pub payload: Payload,
}

/// JSON shape of the text frame.
#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
    #[serde(rename = "msgID", default, skip_serializing_if = "Option::is_none")]
    msg_id: Option<String>,
    data: Value,
}

impl Envelope {
    /// Build a control-operation envelope.
    pub fn control(op: &str, data: Value) -> Self {
        Self {
            msg_type: op.to_owned(),
            tag: None,
            msg_id: None,
            payload: Payload::new(data),
        }
    }

    /// Build an interface-level envelope addressed to `tag`.
    pub fn message(
        tag: impl Into<String>,
        msg_type: impl Into<String>,
        payload: Payload,
        msg_id: CorrelationId,
    ) -> Self {
        Self {
            msg_type: msg_type.into(),
            tag: Some(tag.into()),
            msg_id: Some(msg_id),
            payload,
        }
    }

    /// Whether this envelope is a control operation.
    pub fn is_control(&self) -> bool {
        self.tag.is_none()
    }

    /// Encode into a text frame followed by one binary frame per attachment.
    pub fn encode(&self) -> Result<Vec<WireFrame>, CodecError> {
        let wire = WireEnvelope {
            msg_type: self.msg_type.clone(),
            tag: self.tag.clone(),
            msg_id: self.msg_id.as_ref().map(|id| id.as_str().to_owned()),
            data: self.payload.data.clone(),
        };
        let mut frames = Vec::with_capacity(1 + self.payload.attachments.len());
        frames.push(WireFrame::Text(serde_json::to_string(&wire)?));
        frames.extend(
            self.payload
                .attachments
                .iter()
                .map(|a| WireFrame::Binary(a.to_frame())),
        );
        Ok(frames)
    }

    /// Decode a text frame. Attachments are filled in by the [`FrameAssembler`].
    pub fn decode_text(text: &str) -> Result<Self, CodecError> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(CodecError::malformed("envelope is not a JSON object"));
        }
        let wire: WireEnvelope = serde_json::from_value(value)?;
        if wire.msg_type.is_empty() {
            return Err(CodecError::malformed("empty 'type'"));
        }
        Ok(Self {
            msg_type: wire.msg_type,
            tag: wire.tag,
            msg_id: wire.msg_id.map(CorrelationId::from),
            payload: Payload::new(wire.data),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
