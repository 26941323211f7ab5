//! Reassembly of envelopes and their out-of-band binary frames.
//!
//! The server may send an attachment's binary frame before or after the
//! text frame that references it. Text frames whose references are not yet
//! satisfied are parked; unclaimed binary frames are kept as orphans until a
//! text frame asks for them.

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;

use super::payload::{Attachment, binary_references, is_attachment_id};
use super::{Envelope, WireFrame};
use crate::constants::ATTACHMENT_ID_LEN;
use crate::errors::CodecError;

/// Default bound on parked envelopes.
pub const DEFAULT_MAX_PENDING_ENVELOPES: usize = 64;

/// Default bound on unclaimed binary frames.
pub const DEFAULT_MAX_ORPHAN_BINARIES: usize = 64;

/// An envelope waiting for attachments.
#[derive(Debug)]
struct Parked {
    envelope: Envelope,
    refs: Vec<String>,
    received: HashMap<String, Bytes>,
}

impl Parked {
    fn is_complete(&self) -> bool {
        self.refs.iter().all(|id| self.received.contains_key(id))
    }

    fn into_envelope(mut self) -> Envelope {
        let mut attachments = Vec::with_capacity(self.refs.len());
        for id in self.refs {
            if let Some(bytes) = self.received.remove(&id) {
                attachments.push(Attachment { id, bytes });
            }
        }
        self.envelope.payload.attachments = attachments;
        self.envelope
    }
}

/// Joins inbound text frames with the binary frames they reference.
#[derive(Debug)]
pub struct FrameAssembler {
    parked: VecDeque<Parked>,
    orphans: HashMap<String, Bytes>,
    max_pending_envelopes: usize,
    max_orphan_binaries: usize,
}

impl FrameAssembler {
    /// Create an assembler with explicit bounds.
    pub fn new(max_pending_envelopes: usize, max_orphan_binaries: usize) -> Self {
        Self {
            parked: VecDeque::new(),
            orphans: HashMap::new(),
            max_pending_envelopes,
            max_orphan_binaries,
        }
    }

    /// Feed one inbound frame; returns every envelope it completed.
    pub fn push(&mut self, frame: WireFrame) -> Result<Vec<Envelope>, CodecError> {
        match frame {
            WireFrame::Text(text) => self.push_text(&text),
            WireFrame::Binary(bytes) => self.push_binary(&bytes),
        }
    }

    /// Number of envelopes waiting for attachments.
    pub fn pending_envelopes(&self) -> usize {
        self.parked.len()
    }

    /// Number of binary frames not yet claimed by an envelope.
    pub fn orphan_binaries(&self) -> usize {
        self.orphans.len()
    }

    fn push_text(&mut self, text: &str) -> Result<Vec<Envelope>, CodecError> {
        let envelope = Envelope::decode_text(text)?;
        let refs = binary_references(&envelope.payload.data);
        if refs.is_empty() {
            return Ok(vec![envelope]);
        }
        if let Some(bad) = refs.iter().find(|id| !is_attachment_id(id)) {
            return Err(CodecError::InvalidAttachment(format!(
                "reference '{bad}' is not a {ATTACHMENT_ID_LEN}-digit hex id"
            )));
        }

        let mut received = HashMap::new();
        for id in &refs {
            if let Some(bytes) = self.orphans.remove(id) {
                let _ = received.insert(id.clone(), bytes);
            }
        }
        let parked = Parked {
            envelope,
            refs,
            received,
        };
        if parked.is_complete() {
            return Ok(vec![parked.into_envelope()]);
        }
        if self.parked.len() >= self.max_pending_envelopes {
            return Err(CodecError::LimitExceeded(format!(
                "more than {} envelopes waiting for attachments",
                self.max_pending_envelopes
            )));
        }
        self.parked.push_back(parked);
        Ok(Vec::new())
    }

    fn push_binary(&mut self, frame: &Bytes) -> Result<Vec<Envelope>, CodecError> {
        let Attachment { id, bytes } = Attachment::from_frame(frame)?;

        let claimant = self
            .parked
            .iter()
            .position(|p| p.refs.contains(&id) && !p.received.contains_key(&id));
        let Some(index) = claimant else {
            if self.orphans.len() >= self.max_orphan_binaries {
                return Err(CodecError::LimitExceeded(format!(
                    "more than {} unclaimed binary frames",
                    self.max_orphan_binaries
                )));
            }
            let _ = self.orphans.insert(id, bytes);
            return Ok(Vec::new());
        };

        let parked = &mut self.parked[index];
        let _ = parked.received.insert(id, bytes);
        if !parked.is_complete() {
            return Ok(Vec::new());
        }
        Ok(self
            .parked
            .remove(index)
            .map(Parked::into_envelope)
            .into_iter()
            .collect())
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PENDING_ENVELOPES, DEFAULT_MAX_ORPHAN_BINARIES)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
