//! WebSocket connector over `tokio-tungstenite`.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use rce_core::WireFrame;
use rce_settings::ConnectionSettings;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, instrument};

use super::{Connector, TransportEvent, TransportLink};
use crate::errors::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket connections and pumps frames on a spawned task.
#[derive(Clone, Debug)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
    queue_capacity: usize,
}

impl WebSocketConnector {
    /// Create a connector with an explicit upgrade timeout and queue size.
    pub fn new(connect_timeout: Duration, queue_capacity: usize) -> Self {
        Self {
            connect_timeout,
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Create a connector from connection settings.
    pub fn from_settings(settings: &ConnectionSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.connect_timeout_ms),
            settings.outbound_queue_capacity,
        )
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::from_settings(&rce_settings::get_settings().connection)
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    #[instrument(skip(self), fields(url = %url))]
    async fn open(&self, url: &str) -> Result<TransportLink, ClientError> {
        let (ws, _) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                ClientError::transport(format!(
                    "WebSocket upgrade timed out after {:?}",
                    self.connect_timeout
                ))
            })?
            .map_err(|e| ClientError::transport(format!("WebSocket connect: {e}")))?;
        info!("streaming connection open");

        let (out_tx, out_rx) = mpsc::channel(self.queue_capacity);
        let (ev_tx, ev_rx) = mpsc::channel(self.queue_capacity);
        // Fresh channel with capacity >= 1, so this cannot fail.
        let _ = ev_tx.try_send(TransportEvent::Opened);
        drop(tokio::spawn(pump(ws, out_rx, ev_tx)));

        Ok(TransportLink {
            outbound: out_tx,
            events: ev_rx,
        })
    }
}

/// Move frames between the socket and the link until either side ends.
async fn pump(
    ws: WsStream,
    mut outbound: mpsc::Receiver<WireFrame>,
    events: mpsc::Sender<TransportEvent>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let reason = loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    debug!("outbound queue closed, sending close frame");
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return;
                };
                let msg = match frame {
                    WireFrame::Text(text) => Message::Text(text.into()),
                    WireFrame::Binary(bytes) => Message::Binary(bytes),
                };
                if let Err(e) = ws_tx.send(msg).await {
                    break Some(format!("send failed: {e}"));
                }
            }
            msg = ws_rx.next() => {
                let frame = match msg {
                    Some(Ok(Message::Text(text))) => WireFrame::Text(text.as_str().to_owned()),
                    Some(Ok(Message::Binary(bytes))) => WireFrame::Binary(bytes),
                    Some(Ok(Message::Ping(payload))) => {
                        if ws_tx.send(Message::Pong(payload)).await.is_err() {
                            break Some("pong failed".to_owned());
                        }
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break Some(frame.map_or_else(
                            || "closed by server".to_owned(),
                            |f| format!("closed by server ({}): {}", f.code, f.reason.as_str()),
                        ));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break Some("stream ended".to_owned()),
                };
                if events.send(TransportEvent::Frame(frame)).await.is_err() {
                    debug!("event receiver dropped, closing socket");
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return;
                }
            }
        }
    };

    info!(reason = reason.as_deref().unwrap_or(""), "streaming connection closed");
    let _ = events.send(TransportEvent::Closed(reason)).await;
}
