//! Service client: correlated request/response over one tag.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rce_core::{CorrelationId, Payload};
use tracing::debug;

use super::MessageCallback;
use crate::errors::ClientError;
use crate::registry::InterfaceReceiver;
use crate::router::{Registration, Router};

struct PendingCall {
    msg_id: CorrelationId,
    callback: MessageCallback,
}

/// Receive side, owned by the registry while registered.
struct ServiceState {
    tag: String,
    srv_type: String,
    /// In call order.
    pending: Mutex<Vec<PendingCall>>,
}

impl ServiceState {
    fn take_pending(&self, msg_id: &CorrelationId) -> Option<PendingCall> {
        let mut pending = self.pending.lock();
        let index = pending.iter().position(|call| &call.msg_id == msg_id)?;
        Some(pending.remove(index))
    }
}

impl InterfaceReceiver for ServiceState {
    fn receive(
        &self,
        msg_type: &str,
        payload: Payload,
        msg_id: &CorrelationId,
    ) -> Result<(), ClientError> {
        if msg_type != self.srv_type {
            return Err(ClientError::TypeMismatch {
                expected: self.srv_type.clone(),
                actual: msg_type.to_owned(),
            });
        }
        let call = self
            .take_pending(msg_id)
            .ok_or_else(|| ClientError::UnknownCorrelation {
                tag: self.tag.clone(),
                msg_id: msg_id.to_string(),
            })?;
        debug!(tag = %self.tag, msg_id = %msg_id, "service response matched");
        (call.callback)(payload);
        Ok(())
    }
}

/// Issues service calls and matches responses by correlation id.
///
/// Dropping the client unregisters its tag and discards pending calls
/// without invoking their callbacks.
pub struct ServiceClient {
    state: Arc<ServiceState>,
    default_callback: MessageCallback,
    router: Weak<Router>,
    _registration: Registration,
}

impl ServiceClient {
    /// Register a service client for `tag` on `router`.
    pub fn new(
        router: &Arc<Router>,
        tag: &str,
        srv_type: &str,
        callback: MessageCallback,
    ) -> Result<Self, ClientError> {
        let state = Arc::new(ServiceState {
            tag: tag.to_owned(),
            srv_type: srv_type.to_owned(),
            pending: Mutex::new(Vec::new()),
        });
        let registration = router.register(tag, state.clone())?;
        Ok(Self {
            state,
            default_callback: callback,
            router: Arc::downgrade(router),
            _registration: registration,
        })
    }

    /// Interface tag.
    pub fn tag(&self) -> &str {
        &self.state.tag
    }

    /// Declared service type.
    pub fn service_type(&self) -> &str {
        &self.state.srv_type
    }

    /// Number of calls awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.state.pending.lock().len()
    }

    /// Call the service; the response goes to the default callback.
    pub fn call(&self, payload: Payload) -> Result<CorrelationId, ClientError> {
        self.call_inner(payload, self.default_callback.clone())
    }

    /// Call the service with a callback for this call only.
    pub fn call_with(
        &self,
        payload: Payload,
        callback: impl Fn(Payload) + Send + Sync + 'static,
    ) -> Result<CorrelationId, ClientError> {
        self.call_inner(payload, Arc::new(callback))
    }

    fn call_inner(
        &self,
        payload: Payload,
        callback: MessageCallback,
    ) -> Result<CorrelationId, ClientError> {
        let router = self.router.upgrade().ok_or(ClientError::NotConnected)?;
        let msg_id = CorrelationId::new();
        self.state.pending.lock().push(PendingCall {
            msg_id: msg_id.clone(),
            callback,
        });

        let sent = router.send(
            &self.state.tag,
            &self.state.srv_type,
            payload,
            msg_id.clone(),
        );
        if let Err(err) = sent {
            let _ = self.state.take_pending(&msg_id);
            return Err(err);
        }
        Ok(msg_id)
    }

    /// Handle a response as if it arrived from the router.
    pub fn receive(
        &self,
        msg_type: &str,
        payload: Payload,
        msg_id: &CorrelationId,
    ) -> Result<(), ClientError> {
        self.state.receive(msg_type, payload, msg_id)
    }
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("tag", &self.state.tag)
            .field("srv_type", &self.state.srv_type)
            .field("pending", &self.pending_calls())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
