//! Application payloads and their out-of-band binary attachments.
//!
//! A payload is a JSON value plus zero or more binary blobs. A blob is
//! referenced from the JSON by an object key ending in `*` whose value is
//! the attachment id:
//!
//! ```text
//! {"image*": "0190b3c2a4e07c1d9f3e2b6a5d4c3b2a", "width": 640}
//! ```
//!
//! Each attachment travels as its own binary frame: the 32-byte ASCII id
//! followed by the raw content.

use bytes::{Bytes, BytesMut};
use serde_json::Value;

use crate::constants::{ATTACHMENT_ID_LEN, BINARY_KEY_SUFFIX};
use crate::errors::CodecError;
use crate::ids::new_simple_v7;

/// A binary blob carried alongside a JSON payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// Wire id referenced from the JSON payload.
    pub id: String,
    /// Raw content.
    pub bytes: Bytes,
}

impl Attachment {
    /// Create an attachment with a fresh id.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            id: new_simple_v7(),
            bytes: bytes.into(),
        }
    }

    /// Encode as a binary frame body (id followed by content).
    pub fn to_frame(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.id.len() + self.bytes.len());
        buf.extend_from_slice(self.id.as_bytes());
        buf.extend_from_slice(&self.bytes);
        buf.freeze()
    }

    /// Parse a binary frame body.
    pub fn from_frame(frame: &Bytes) -> Result<Self, CodecError> {
        if frame.len() < ATTACHMENT_ID_LEN {
            return Err(CodecError::InvalidAttachment(format!(
                "frame of {} bytes is shorter than the {ATTACHMENT_ID_LEN}-byte id",
                frame.len()
            )));
        }
        let id_bytes = &frame[..ATTACHMENT_ID_LEN];
        if !id_bytes.iter().all(u8::is_ascii_hexdigit) {
            return Err(CodecError::InvalidAttachment(
                "attachment id is not hexadecimal".into(),
            ));
        }
        // Ids match byte for byte; case is preserved on both sides.
        let id = String::from_utf8_lossy(id_bytes).into_owned();
        Ok(Self {
            id,
            bytes: frame.slice(ATTACHMENT_ID_LEN..),
        })
    }
}

/// Whether `id` has the shape of an attachment id on the wire.
pub fn is_attachment_id(id: &str) -> bool {
    id.len() == ATTACHMENT_ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// A JSON value with its binary attachments.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Payload {
    /// Structured content.
    pub data: Value,
    /// Attachments referenced from `data`.
    pub attachments: Vec<Attachment>,
}

impl Payload {
    /// Wrap a value with no attachments.
    pub fn new(data: Value) -> Self {
        Self {
            data,
            attachments: Vec::new(),
        }
    }

    /// Attach a blob under `key` of an object payload.
    ///
    /// Inserts `"<key>*": "<id>"` into `data`. Fails if `data` is not an object.
    pub fn attach(mut self, key: &str, bytes: impl Into<Bytes>) -> Result<Self, CodecError> {
        let Value::Object(map) = &mut self.data else {
            return Err(CodecError::InvalidAttachment(
                "attachments require an object payload".into(),
            ));
        };
        let attachment = Attachment::new(bytes);
        let _ = map.insert(
            format!("{key}{BINARY_KEY_SUFFIX}"),
            Value::String(attachment.id.clone()),
        );
        self.attachments.push(attachment);
        Ok(self)
    }

    /// Look up the blob referenced by a top-level `key` (without the `*`).
    pub fn attachment(&self, key: &str) -> Option<&Bytes> {
        let id = self
            .data
            .get(format!("{key}{BINARY_KEY_SUFFIX}"))?
            .as_str()?;
        self.attachments
            .iter()
            .find(|a| a.id == id)
            .map(|a| &a.bytes)
    }

    /// Whether `data` references any attachment.
    pub fn has_binary_references(&self) -> bool {
        !binary_references(&self.data).is_empty()
    }
}

impl From<Value> for Payload {
    fn from(data: Value) -> Self {
        Self::new(data)
    }
}

/// Collect every attachment id referenced anywhere inside `value`.
///
/// Ids are returned in traversal order without duplicates.
pub fn binary_references(value: &Value) -> Vec<String> {
    let mut refs = Vec::new();
    collect_references(value, &mut refs);
    refs
}

fn collect_references(value: &Value, refs: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                match val {
                    Value::String(id) if key.ends_with(BINARY_KEY_SUFFIX) => {
                        if !refs.contains(id) {
                            refs.push(id.clone());
                        }
                    }
                    _ => collect_references(val, refs),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, refs);
            }
        }
        _ => {}
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn attach_inserts_starred_key() {
        let payload = Payload::new(json!({"width": 640}))
            .attach("image", vec![1u8, 2, 3])
            .unwrap();
        let id = payload.data["image*"].as_str().unwrap();
        assert_eq!(id.len(), ATTACHMENT_ID_LEN);
        assert_eq!(payload.attachments[0].id, id);
        assert_eq!(payload.attachment("image").unwrap().as_ref(), &[1, 2, 3]);
        assert!(payload.has_binary_references());
    }

    #[test]
    fn attach_to_non_object_fails() {
        let result = Payload::new(json!([1, 2])).attach("x", vec![0u8]);
        assert_matches!(result, Err(CodecError::InvalidAttachment(_)));
    }

    #[test]
    fn attachment_lookup_missing_key() {
        let payload = Payload::new(json!({"a": 1}));
        assert!(payload.attachment("a").is_none());
        assert!(payload.attachment("b").is_none());
    }

    #[test]
    fn frame_body_layout() {
        let attachment = Attachment::new(Bytes::from_static(b"hello"));
        let frame = attachment.to_frame();
        assert_eq!(&frame[..ATTACHMENT_ID_LEN], attachment.id.as_bytes());
        assert_eq!(&frame[ATTACHMENT_ID_LEN..], b"hello");
        assert_eq!(Attachment::from_frame(&frame).unwrap(), attachment);
    }

    #[test]
    fn short_frame_rejected() {
        let frame = Bytes::from_static(b"abc");
        assert_matches!(
            Attachment::from_frame(&frame),
            Err(CodecError::InvalidAttachment(msg)) if msg.contains("shorter")
        );
    }

    #[test]
    fn non_hex_id_rejected() {
        let frame = Bytes::from(vec![b'z'; ATTACHMENT_ID_LEN + 4]);
        assert_matches!(
            Attachment::from_frame(&frame),
            Err(CodecError::InvalidAttachment(_))
        );
    }

    #[test]
    fn uppercase_id_is_kept_verbatim() {
        let mut frame = b"0190B3C2A4E07C1D9F3E2B6A5D4C3B2A".to_vec();
        frame.extend_from_slice(b"xy");
        let parsed = Attachment::from_frame(&Bytes::from(frame)).unwrap();
        assert_eq!(parsed.id, "0190B3C2A4E07C1D9F3E2B6A5D4C3B2A");
        assert_eq!(parsed.bytes.as_ref(), b"xy");
    }

    #[test]
    fn attachment_id_shape() {
        assert!(is_attachment_id(&Attachment::new(Bytes::new()).id));
        assert!(is_attachment_id("0190B3C2A4E07C1D9F3E2B6A5D4C3B2A"));
        assert!(!is_attachment_id("hello"));
        assert!(!is_attachment_id(&"g".repeat(ATTACHMENT_ID_LEN)));
        assert!(!is_attachment_id(&"a".repeat(ATTACHMENT_ID_LEN + 1)));
    }

    #[test]
    fn empty_content_allowed() {
        let attachment = Attachment::new(Bytes::new());
        let parsed = Attachment::from_frame(&attachment.to_frame()).unwrap();
        assert!(parsed.bytes.is_empty());
    }

    #[test]
    fn references_found_in_nested_structures() {
        let value = json!({
            "a*": "id1",
            "list": [{"b*": "id2"}, {"c": {"d*": "id3"}}],
            "plain": "id4",
            "again*": "id1",
        });
        let refs = binary_references(&value);
        assert_eq!(refs.len(), 3);
        for id in ["id1", "id2", "id3"] {
            assert!(refs.contains(&id.to_owned()));
        }
    }

    #[test]
    fn starred_key_with_non_string_is_not_a_reference() {
        let value = json!({"a*": 5, "b*": {"c*": "id"}});
        assert_eq!(binary_references(&value), vec!["id".to_owned()]);
    }

    #[test]
    fn scalars_have_no_references() {
        assert!(binary_references(&json!("x*")).is_empty());
        assert!(binary_references(&Value::Null).is_empty());
    }
}
