//! In-process connector for tests and embedders.
//!
//! Each [`Connector::open`] hands the server side of the new link to the
//! receiver returned by [`MemoryConnector::new`] as a [`MemoryPeer`].

use std::collections::VecDeque;

use async_trait::async_trait;
use rce_core::{Envelope, FrameAssembler, WireFrame};
use tokio::sync::mpsc;

use super::{Connector, TransportEvent, TransportLink};
use crate::errors::ClientError;

/// Connector whose connections terminate in the same process.
#[derive(Clone, Debug)]
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    capacity: usize,
}

impl MemoryConnector {
    /// Create a connector and the receiver that yields one peer per opened link.
    pub fn new(capacity: usize) -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            peers: tx,
            capacity: capacity.max(1),
        };
        (connector, rx)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, url: &str) -> Result<TransportLink, ClientError> {
        let (out_tx, out_rx) = mpsc::channel(self.capacity);
        let (ev_tx, ev_rx) = mpsc::channel(self.capacity);
        let _ = ev_tx.try_send(TransportEvent::Opened);

        let peer = MemoryPeer {
            url: url.to_owned(),
            events: ev_tx,
            outbound: out_rx,
            assembler: FrameAssembler::default(),
            ready: VecDeque::new(),
        };
        self.peers
            .send(peer)
            .map_err(|_| ClientError::transport("memory listener is gone"))?;

        Ok(TransportLink {
            outbound: out_tx,
            events: ev_rx,
        })
    }
}

/// Server side of an in-memory link.
#[derive(Debug)]
pub struct MemoryPeer {
    url: String,
    events: mpsc::Sender<TransportEvent>,
    outbound: mpsc::Receiver<WireFrame>,
    assembler: FrameAssembler,
    ready: VecDeque<Envelope>,
}

impl MemoryPeer {
    /// URL the client opened.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver a raw frame to the client. Returns `false` once the client is gone.
    pub async fn send_frame(&self, frame: WireFrame) -> bool {
        self.events.send(TransportEvent::Frame(frame)).await.is_ok()
    }

    /// Deliver a text frame to the client.
    pub async fn send_text(&self, text: impl Into<String>) -> bool {
        self.send_frame(WireFrame::Text(text.into())).await
    }

    /// Encode and deliver an envelope with its attachments.
    pub async fn send_envelope(&self, envelope: &Envelope) -> Result<(), ClientError> {
        for frame in envelope.encode()? {
            if !self.send_frame(frame).await {
                return Err(ClientError::NotConnected);
            }
        }
        Ok(())
    }

    /// Next raw frame the client sent, or `None` once the client closed.
    pub async fn recv_frame(&mut self) -> Option<WireFrame> {
        self.outbound.recv().await
    }

    /// Next complete envelope the client sent, or `None` once the client closed.
    pub async fn recv_envelope(&mut self) -> Result<Option<Envelope>, ClientError> {
        loop {
            if let Some(envelope) = self.ready.pop_front() {
                return Ok(Some(envelope));
            }
            let Some(frame) = self.outbound.recv().await else {
                return Ok(None);
            };
            self.ready.extend(self.assembler.push(frame)?);
        }
    }

    /// Close the link from the server side.
    pub async fn close(self, reason: Option<String>) {
        let _ = self.events.send(TransportEvent::Closed(reason)).await;
    }
}
