//! Subscriber: delivers every message on a tag to one callback.

use std::sync::Arc;

use rce_core::{CorrelationId, Payload};

use super::MessageCallback;
use crate::errors::ClientError;
use crate::registry::InterfaceReceiver;
use crate::router::{Registration, Router};

struct SubscriberState {
    msg_type: String,
    callback: MessageCallback,
}

impl InterfaceReceiver for SubscriberState {
    fn receive(
        &self,
        msg_type: &str,
        payload: Payload,
        _msg_id: &CorrelationId,
    ) -> Result<(), ClientError> {
        if msg_type != self.msg_type {
            return Err(ClientError::TypeMismatch {
                expected: self.msg_type.clone(),
                actual: msg_type.to_owned(),
            });
        }
        (self.callback)(payload);
        Ok(())
    }
}

/// Receives messages of one type for a tag.
pub struct Subscriber {
    state: Arc<SubscriberState>,
    registration: Registration,
}

impl Subscriber {
    /// Register a subscriber for `tag` on `router`.
    pub fn new(
        router: &Arc<Router>,
        tag: &str,
        msg_type: &str,
        callback: MessageCallback,
    ) -> Result<Self, ClientError> {
        let state = Arc::new(SubscriberState {
            msg_type: msg_type.to_owned(),
            callback,
        });
        let registration = router.register(tag, state.clone())?;
        Ok(Self {
            state,
            registration,
        })
    }

    /// Interface tag.
    pub fn tag(&self) -> &str {
        self.registration.tag()
    }

    /// Declared message type.
    pub fn message_type(&self) -> &str {
        &self.state.msg_type
    }

    /// Whether the subscriber is still registered.
    pub fn is_subscribed(&self) -> bool {
        self.registration.is_active()
    }

    /// Stop receiving. Safe to call more than once.
    pub fn unsubscribe(&self) {
        self.registration.release();
    }

    /// Handle a message as if it arrived from the router.
    pub fn receive(
        &self,
        msg_type: &str,
        payload: Payload,
        msg_id: &CorrelationId,
    ) -> Result<(), ClientError> {
        self.state.receive(msg_type, payload, msg_id)
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("tag", &self.tag())
            .field("msg_type", &self.state.msg_type)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Routed;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use rce_core::{FrameAssembler, WireFrame};
    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    fn setup() -> (Arc<Router>, mpsc::Receiver<WireFrame>) {
        let (tx, rx) = mpsc::channel(4);
        (Router::new(tx, FrameAssembler::default()), rx)
    }

    fn recording() -> (MessageCallback, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: MessageCallback =
            Arc::new(move |payload: Payload| sink.lock().push(payload.data));
        (callback, seen)
    }

    fn message(tag: &str, msg_type: &str, data: &Value) -> WireFrame {
        WireFrame::Text(
            json!({"type": msg_type, "tag": tag, "msgID": "nil", "data": data}).to_string(),
        )
    }

    #[test]
    fn delivers_matching_messages() {
        let (router, _rx) = setup();
        let (callback, seen) = recording();
        let _sub = Subscriber::new(&router, "chatter", "String", callback).unwrap();

        let routed = router
            .on_inbound_frame(message("chatter", "String", &json!({"data": "hi"})))
            .unwrap();
        assert_matches!(routed.as_slice(), [Routed::Delivered]);
        assert_eq!(*seen.lock(), vec![json!({"data": "hi"})]);
    }

    #[test]
    fn wrong_type_is_rejected() {
        let (router, _rx) = setup();
        let (callback, seen) = recording();
        let sub = Subscriber::new(&router, "chatter", "String", callback).unwrap();

        let err = sub
            .receive("Int32", Payload::default(), &CorrelationId::none())
            .unwrap_err();
        assert_matches!(err, ClientError::TypeMismatch { .. });
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let (router, _rx) = setup();
        let (callback, seen) = recording();
        let sub = Subscriber::new(&router, "chatter", "String", callback).unwrap();

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_subscribed());

        let routed = router
            .on_inbound_frame(message("chatter", "String", &json!({})))
            .unwrap();
        assert_matches!(routed.as_slice(), [Routed::Dropped { .. }]);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn dropping_unsubscribed_subscriber_keeps_new_owner() {
        let (router, _rx) = setup();
        let (callback, _) = recording();
        let old = Subscriber::new(&router, "chatter", "String", callback.clone()).unwrap();
        old.unsubscribe();
        let _new = Subscriber::new(&router, "chatter", "String", callback).unwrap();

        drop(old);
        assert!(router.registry().contains("chatter"));
    }

    #[test]
    fn drop_unsubscribes() {
        let (router, _rx) = setup();
        let (callback, _) = recording();
        let sub = Subscriber::new(&router, "chatter", "String", callback).unwrap();
        drop(sub);
        assert!(router.registry().is_empty());
    }

    #[test]
    fn unsubscribe_from_own_callback() {
        let (router, _rx) = setup();
        let slot: Arc<Mutex<Option<Subscriber>>> = Arc::new(Mutex::new(None));
        let inner = slot.clone();
        let callback: MessageCallback = Arc::new(move |_| {
            if let Some(sub) = inner.lock().as_ref() {
                sub.unsubscribe();
            }
        });
        *slot.lock() = Some(Subscriber::new(&router, "once", "String", callback).unwrap());

        let _ = router
            .on_inbound_frame(message("once", "String", &json!({})))
            .unwrap();
        assert!(!router.registry().contains("once"));
    }
}
