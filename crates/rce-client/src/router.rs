//! Protocol router: envelope construction, transmission, inbound dispatch.

use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rce_core::constants::control;
use rce_core::{CorrelationId, Envelope, FrameAssembler, Payload, WireFrame};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::ClientError;
use crate::registry::{InterfaceReceiver, InterfaceRegistry, RegistrationId};
use crate::transport::TransportEvent;

/// What became of one inbound envelope.
#[derive(Debug)]
pub enum Routed {
    /// Handled as a control notification.
    Control,
    /// Delivered to the interface bound to the tag.
    Delivered,
    /// No interface is bound to the tag; the envelope was dropped.
    Dropped {
        /// Target tag.
        tag: String,
    },
    /// The interface refused the message (wrong type, unknown correlation).
    Rejected(ClientError),
}

/// Why the drive loop stopped.
#[derive(Debug)]
pub enum Stopped {
    /// Cancelled locally.
    Cancelled,
    /// The transport closed.
    Closed(Option<String>),
    /// A session-fatal error.
    Fatal(ClientError),
}

/// Routes envelopes between interfaces and one streaming connection.
pub struct Router {
    outbound: Mutex<Option<mpsc::Sender<WireFrame>>>,
    registry: InterfaceRegistry,
    assembler: Mutex<FrameAssembler>,
}

impl Router {
    /// Create a router writing to `outbound`.
    pub fn new(outbound: mpsc::Sender<WireFrame>, assembler: FrameAssembler) -> Arc<Self> {
        Arc::new(Self {
            outbound: Mutex::new(Some(outbound)),
            registry: InterfaceRegistry::new(),
            assembler: Mutex::new(assembler),
        })
    }

    /// Send an interface-level message addressed to `tag`.
    pub fn send(
        &self,
        tag: &str,
        msg_type: &str,
        payload: Payload,
        msg_id: CorrelationId,
    ) -> Result<(), ClientError> {
        self.send_envelope(&Envelope::message(tag, msg_type, payload, msg_id))
    }

    /// Send a control operation.
    pub fn send_control(&self, op: &str, data: Value) -> Result<(), ClientError> {
        self.send_envelope(&Envelope::control(op, data))
    }

    /// Encode and enqueue an envelope; never waits on the network.
    pub fn send_envelope(&self, envelope: &Envelope) -> Result<(), ClientError> {
        let frames = envelope.encode()?;
        let guard = self.outbound.lock();
        let Some(outbound) = guard.as_ref() else {
            return Err(ClientError::NotConnected);
        };
        if frames.len() > outbound.max_capacity() {
            return Err(ClientError::transport(format!(
                "envelope of {} frames exceeds the outbound queue capacity of {}",
                frames.len(),
                outbound.max_capacity()
            )));
        }
        // Reserve every slot first so an envelope is never split.
        let permits = outbound.try_reserve_many(frames.len()).map_err(|e| match e {
            TrySendError::Full(()) => ClientError::transport("outbound queue full"),
            TrySendError::Closed(()) => ClientError::NotConnected,
        })?;
        for (permit, frame) in permits.zip(frames) {
            permit.send(frame);
        }
        debug!(
            msg_type = %envelope.msg_type,
            tag = envelope.tag.as_deref().unwrap_or(""),
            "envelope queued"
        );
        Ok(())
    }

    /// Whether the router still has a connection to write to.
    pub fn is_open(&self) -> bool {
        self.outbound.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Detach from the connection; later sends fail with `NotConnected`.
    pub fn close(&self) {
        drop(self.outbound.lock().take());
    }

    /// Bind a receiver to `tag`.
    pub fn register(
        self: &Arc<Self>,
        tag: &str,
        receiver: Arc<dyn InterfaceReceiver>,
    ) -> Result<Registration, ClientError> {
        let id = self.registry.register(tag, receiver)?;
        debug!(tag, "interface registered");
        Ok(Registration {
            tag: tag.to_owned(),
            id,
            router: Arc::downgrade(self),
            released: AtomicBool::new(false),
        })
    }

    /// Remove registration `id` from `tag`; a no-op for any other binding.
    pub fn unregister(&self, tag: &str, id: RegistrationId) -> bool {
        let removed = self.registry.unregister(tag, id);
        if removed {
            debug!(tag, "interface unregistered");
        }
        removed
    }

    /// The interface registry.
    pub fn registry(&self) -> &InterfaceRegistry {
        &self.registry
    }

    /// Handle one inbound frame.
    ///
    /// An `Err` is session-fatal. Per-message problems come back as
    /// [`Routed::Dropped`] or [`Routed::Rejected`].
    pub fn on_inbound_frame(&self, frame: WireFrame) -> Result<Vec<Routed>, ClientError> {
        let envelopes = self.assembler.lock().push(frame)?;
        Ok(envelopes
            .into_iter()
            .map(|envelope| self.route(envelope))
            .collect())
    }

    fn route(&self, envelope: Envelope) -> Routed {
        let Envelope {
            msg_type,
            tag,
            msg_id,
            payload,
        } = envelope;
        let Some(tag) = tag else {
            handle_control(&msg_type, &payload.data);
            return Routed::Control;
        };
        let msg_id = msg_id.unwrap_or_else(CorrelationId::none);

        match self.registry.dispatch(&tag, &msg_type, payload, &msg_id) {
            None => {
                warn!(
                    tag = %tag,
                    msg_type = %msg_type,
                    msg_id = %msg_id,
                    "no interface for tag, dropping message"
                );
                Routed::Dropped { tag }
            }
            Some(Ok(())) => Routed::Delivered,
            Some(Err(err)) => {
                warn!(
                    tag = %tag,
                    msg_type = %msg_type,
                    msg_id = %msg_id,
                    error = %err,
                    "interface rejected message"
                );
                Routed::Rejected(err)
            }
        }
    }

    /// Drive inbound events until cancelled, closed, or a fatal error.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<TransportEvent>,
        cancel: CancellationToken,
    ) -> Stopped {
        let stopped = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break Stopped::Cancelled,
                event = events.recv() => match event {
                    Some(TransportEvent::Frame(frame)) => {
                        if let Err(err) = self.on_inbound_frame(frame) {
                            error!(error = %err, "fatal protocol error, closing session");
                            break Stopped::Fatal(err);
                        }
                    }
                    Some(TransportEvent::Opened) => debug!("ignoring repeated open event"),
                    Some(TransportEvent::Closed(reason)) => break Stopped::Closed(reason),
                    None => break Stopped::Closed(None),
                },
            }
        };
        self.close();
        stopped
    }
}

fn handle_control(op: &str, data: &Value) {
    if !control::is_inbound(op) {
        warn!(op, "unknown control notification, ignoring");
        return;
    }
    match op {
        control::CONNECTION_ESTABLISHED => info!("server acknowledged connection"),
        control::STATUS => info!(status = %data, "server status"),
        _ => warn!(error = %data, "server reported error"),
    }
}

/// Keeps an interface bound to its tag; unregisters on drop.
#[derive(Debug)]
pub struct Registration {
    tag: String,
    id: RegistrationId,
    router: Weak<Router>,
    released: AtomicBool,
}

impl Registration {
    /// Tag this registration holds.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Whether the binding has not been released yet.
    pub fn is_active(&self) -> bool {
        !self.released.load(Ordering::SeqCst)
    }

    /// Release the binding. Idempotent; a no-op once the router is gone.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(router) = self.router.upgrade() {
            let _ = router.unregister(&self.tag, self.id);
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
