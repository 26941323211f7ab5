//! Transport seam between the router and the streaming connection.
//!
//! A [`Connector`] opens a [`TransportLink`]: an outbound frame queue and an
//! inbound event stream. The first event on a healthy link is
//! [`TransportEvent::Opened`]. Dropping every outbound sender closes the
//! connection.

pub mod memory;
pub mod websocket;

pub use memory::{MemoryConnector, MemoryPeer};
pub use websocket::WebSocketConnector;

use async_trait::async_trait;
use rce_core::WireFrame;
use tokio::sync::mpsc;

use crate::errors::ClientError;

/// Something that happened on the streaming connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is open and frames may be sent.
    Opened,
    /// A frame arrived from the server.
    Frame(WireFrame),
    /// The connection closed, with the reason when one is known.
    Closed(Option<String>),
}

/// Both ends of an open connection, as seen by the client.
#[derive(Debug)]
pub struct TransportLink {
    /// Outbound frame queue.
    pub outbound: mpsc::Sender<WireFrame>,
    /// Inbound event stream.
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Opens streaming connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `url`.
    async fn open(&self, url: &str) -> Result<TransportLink, ClientError>;
}
