//! Client session: handshake, transport attachment, interface factories.
//!
//! ```text
//! Idle ──connect──► Handshaking ──open──► Connected ──disconnect/close──► Disconnected
//!  ▲                     │                                                    │
//!  └──── failure ────────┘                         connect ◄──────────────────┘
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rce_core::{Envelope, FrameAssembler, Payload};
use rce_settings::ConnectionSettings;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::control::{self, InterfaceRef, InterfaceType, NodeSpec, ParamValue};
use crate::errors::ClientError;
use crate::handshake::{self, Credentials, Negotiation};
use crate::interfaces::{Publisher, ServiceClient, Subscriber};
use crate::router::{Router, Stopped};
use crate::transport::{Connector, TransportEvent, TransportLink, WebSocketConnector};

/// Lifecycle state of a [`Client`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Never connected.
    Idle,
    /// Negotiating with the master manager or opening the stream.
    Handshaking,
    /// Streaming session attached.
    Connected,
    /// Session ended; may connect again.
    Disconnected,
}

struct Attached {
    router: Arc<Router>,
    cancel: CancellationToken,
    negotiation: Negotiation,
    generation: u64,
}

struct Shared {
    state: SessionState,
    attached: Option<Attached>,
    generation: u64,
}

struct ClientInner {
    credentials: Credentials,
    settings: ConnectionSettings,
    connector: Arc<dyn Connector>,
    shared: Mutex<Shared>,
}

impl ClientInner {
    /// Drop the attachment made at `generation`, if it is still current.
    fn detach(&self, generation: u64) {
        let mut shared = self.shared.lock();
        if shared
            .attached
            .as_ref()
            .is_some_and(|a| a.generation == generation)
        {
            shared.attached = None;
            shared.state = SessionState::Disconnected;
        }
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(attached) = self.shared.get_mut().attached.take() {
            attached.cancel.cancel();
            attached.router.close();
        }
    }
}

/// Handle to one cloud engine session. Cheap to clone.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Client using WebSocket transport and the global settings.
    pub fn new(credentials: Credentials) -> Self {
        let settings = rce_settings::get_settings().connection.clone();
        let connector = Arc::new(WebSocketConnector::from_settings(&settings));
        Self::with_connector(credentials, connector, settings)
    }

    /// Client with an explicit connector and connection settings.
    pub fn with_connector(
        credentials: Credentials,
        connector: Arc<dyn Connector>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                credentials,
                settings,
                connector,
                shared: Mutex::new(Shared {
                    state: SessionState::Idle,
                    attached: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.inner.shared.lock().state
    }

    /// Whether a streaming session is attached.
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Client version advertised by the master manager for this session.
    pub fn server_version(&self) -> Option<String> {
        self.inner
            .shared
            .lock()
            .attached
            .as_ref()
            .and_then(|a| a.negotiation.current.clone())
    }

    /// Negotiate with the master manager at `url` and open the streaming session.
    ///
    /// `on_connected` runs once on the blocking pool after the stream opens.
    /// On failure the client returns to the state it had before the call.
    pub async fn connect<F>(&self, url: &str, on_connected: F) -> Result<(), ClientError>
    where
        F: FnOnce(Client) + Send + 'static,
    {
        let previous = {
            let mut shared = self.inner.shared.lock();
            match shared.state {
                SessionState::Handshaking => return Err(ClientError::AlreadyConnecting),
                SessionState::Connected => return Err(ClientError::AlreadyConnected),
                state @ (SessionState::Idle | SessionState::Disconnected) => {
                    shared.state = SessionState::Handshaking;
                    state
                }
            }
        };

        match self.establish(url).await {
            Ok(()) => {
                let client = self.clone();
                drop(tokio::task::spawn_blocking(move || on_connected(client)));
                Ok(())
            }
            Err(err) => {
                let mut shared = self.inner.shared.lock();
                if shared.state == SessionState::Handshaking {
                    shared.state = previous;
                }
                warn!(error = %err, "connect failed");
                Err(err)
            }
        }
    }

    async fn establish(&self, url: &str) -> Result<(), ClientError> {
        let inner = &self.inner;
        let negotiation = handshake::negotiate(
            url,
            &inner.credentials,
            Duration::from_millis(inner.settings.handshake_timeout_ms),
        )
        .await?;
        let session_url = negotiation.session_url(&inner.credentials)?;

        let TransportLink {
            outbound,
            mut events,
        } = inner.connector.open(&session_url).await?;
        let connect_timeout = Duration::from_millis(inner.settings.connect_timeout_ms);
        match tokio::time::timeout(connect_timeout, events.recv()).await {
            Ok(Some(TransportEvent::Opened)) => {}
            Ok(Some(TransportEvent::Frame(_))) => {
                return Err(ClientError::ProtocolViolation(
                    "frame received before the stream opened".into(),
                ));
            }
            Ok(Some(TransportEvent::Closed(reason))) => {
                return Err(ClientError::transport(format!(
                    "stream closed before opening: {}",
                    reason.as_deref().unwrap_or("no reason")
                )));
            }
            Ok(None) => return Err(ClientError::transport("stream closed before opening")),
            Err(_) => {
                return Err(ClientError::transport(format!(
                    "stream did not open within {connect_timeout:?}"
                )));
            }
        }

        let router = Router::new(
            outbound,
            FrameAssembler::new(
                inner.settings.max_pending_envelopes,
                inner.settings.max_orphan_binaries,
            ),
        );
        let cancel = CancellationToken::new();
        let stream_url = negotiation.url.clone();
        let generation = {
            let mut shared = inner.shared.lock();
            if shared.state != SessionState::Handshaking {
                // Disconnected while the handshake was in flight.
                return Err(ClientError::NotConnected);
            }
            shared.generation += 1;
            let generation = shared.generation;
            shared.state = SessionState::Connected;
            shared.attached = Some(Attached {
                router: router.clone(),
                cancel: cancel.clone(),
                negotiation,
                generation,
            });
            generation
        };
        info!(url = %stream_url, "session connected");

        drop(tokio::spawn(drive(
            Arc::downgrade(inner),
            router,
            events,
            cancel,
            generation,
        )));
        Ok(())
    }

    /// Tear down the streaming session.
    ///
    /// Interfaces created on it stay alive but their sends fail with
    /// [`ClientError::NotConnected`].
    pub fn disconnect(&self) {
        let attached = {
            let mut shared = self.inner.shared.lock();
            if shared.state == SessionState::Idle {
                return;
            }
            shared.state = SessionState::Disconnected;
            shared.attached.take()
        };
        if let Some(attached) = attached {
            attached.cancel.cancel();
            attached.router.close();
            info!("session disconnected");
        }
    }

    fn router(&self) -> Result<Arc<Router>, ClientError> {
        let shared = self.inner.shared.lock();
        match (&shared.state, &shared.attached) {
            (SessionState::Connected, Some(attached)) => Ok(attached.router.clone()),
            _ => Err(ClientError::NotConnected),
        }
    }

    // ── Interfaces ──────────────────────────────────────────────────

    /// Create a service client; responses go to `callback` unless a call
    /// supplies its own.
    pub fn service(
        &self,
        tag: &str,
        srv_type: &str,
        callback: impl Fn(Payload) + Send + Sync + 'static,
    ) -> Result<ServiceClient, ClientError> {
        ServiceClient::new(&self.router()?, tag, srv_type, Arc::new(callback))
    }

    /// Create a publisher.
    pub fn publisher(&self, tag: &str, msg_type: &str) -> Result<Publisher, ClientError> {
        Ok(Publisher::new(&self.router()?, tag, msg_type))
    }

    /// Create a subscriber.
    pub fn subscriber(
        &self,
        tag: &str,
        msg_type: &str,
        callback: impl Fn(Payload) + Send + Sync + 'static,
    ) -> Result<Subscriber, ClientError> {
        Subscriber::new(&self.router()?, tag, msg_type, Arc::new(callback))
    }

    // ── Control operations ──────────────────────────────────────────

    fn send_control(&self, envelope: &Envelope) -> Result<(), ClientError> {
        debug!(op = %envelope.msg_type, "control operation");
        self.router()?.send_envelope(envelope)
    }

    /// Create a container.
    pub fn create_container(&self, container_tag: &str) -> Result<(), ClientError> {
        self.send_control(&control::create_container(container_tag))
    }

    /// Destroy a container.
    pub fn destroy_container(&self, container_tag: &str) -> Result<(), ClientError> {
        self.send_control(&control::destroy_container(container_tag))
    }

    /// Launch a node.
    pub fn add_node(&self, node: &NodeSpec) -> Result<(), ClientError> {
        self.send_control(&control::add_node(node))
    }

    /// Stop a node.
    pub fn remove_node(&self, container_tag: &str, node_tag: &str) -> Result<(), ClientError> {
        self.send_control(&control::remove_node(container_tag, node_tag))
    }

    /// Set a container parameter.
    pub fn add_parameter(
        &self,
        container_tag: &str,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> Result<(), ClientError> {
        self.send_control(&control::add_parameter(container_tag, name, value))
    }

    /// Delete a container parameter.
    pub fn remove_parameter(&self, container_tag: &str, name: &str) -> Result<(), ClientError> {
        self.send_control(&control::remove_parameter(container_tag, name))
    }

    /// Add an interface to an endpoint.
    pub fn add_interface(
        &self,
        endpoint_tag: &str,
        interface_tag: &str,
        interface_type: InterfaceType,
        class_name: &str,
        addr: Option<&str>,
    ) -> Result<(), ClientError> {
        self.send_control(&control::add_interface(
            endpoint_tag,
            interface_tag,
            interface_type,
            class_name,
            addr.unwrap_or_default(),
        ))
    }

    /// Remove an interface from an endpoint.
    pub fn remove_interface(
        &self,
        endpoint_tag: &str,
        interface_tag: &str,
    ) -> Result<(), ClientError> {
        self.send_control(&control::remove_interface(endpoint_tag, interface_tag))
    }

    /// Connect two interfaces.
    pub fn add_connection(
        &self,
        a: impl Into<InterfaceRef>,
        b: impl Into<InterfaceRef>,
    ) -> Result<(), ClientError> {
        self.send_control(&control::add_connection(&a.into(), &b.into()))
    }

    /// Disconnect two interfaces.
    pub fn remove_connection(
        &self,
        a: impl Into<InterfaceRef>,
        b: impl Into<InterfaceRef>,
    ) -> Result<(), ClientError> {
        self.send_control(&control::remove_connection(&a.into(), &b.into()))
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("credentials", &self.inner.credentials)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Run the router until the session ends, then mark the client disconnected.
async fn drive(
    inner: Weak<ClientInner>,
    router: Arc<Router>,
    events: tokio::sync::mpsc::Receiver<TransportEvent>,
    cancel: CancellationToken,
    generation: u64,
) {
    match router.run(events, cancel).await {
        Stopped::Cancelled => debug!("session drive cancelled"),
        Stopped::Closed(reason) => info!(
            reason = reason.as_deref().unwrap_or("none"),
            "streaming connection closed"
        ),
        Stopped::Fatal(err) => error!(error = %err, "session aborted"),
    }
    if let Some(inner) = inner.upgrade() {
        inner.detach(generation);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
