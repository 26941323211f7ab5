//! Publisher: fire-and-forget messages on a tag.

use std::sync::{Arc, Weak};

use rce_core::{CorrelationId, Payload};

use crate::errors::ClientError;
use crate::router::Router;

/// Sends messages of one type; never registers and never receives.
#[derive(Clone, Debug)]
pub struct Publisher {
    tag: String,
    msg_type: String,
    router: Weak<Router>,
}

impl Publisher {
    /// Create a publisher for `tag` on `router`.
    pub fn new(router: &Arc<Router>, tag: &str, msg_type: &str) -> Self {
        Self {
            tag: tag.to_owned(),
            msg_type: msg_type.to_owned(),
            router: Arc::downgrade(router),
        }
    }

    /// Interface tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Declared message type.
    pub fn message_type(&self) -> &str {
        &self.msg_type
    }

    /// Publish one message.
    pub fn publish(&self, payload: Payload) -> Result<(), ClientError> {
        let router = self.router.upgrade().ok_or(ClientError::NotConnected)?;
        router.send(&self.tag, &self.msg_type, payload, CorrelationId::none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rce_core::{Envelope, FrameAssembler, WireFrame};
    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    #[test]
    fn publish_uses_no_correlation_sentinel() {
        let (tx, mut rx) = mpsc::channel(4);
        let router = Router::new(tx, FrameAssembler::default());
        let publisher = Publisher::new(&router, "chatter", "std_msgs/String");

        publisher.publish(Payload::new(json!({"x": 1}))).unwrap();

        let WireFrame::Text(text) = rx.try_recv().unwrap() else {
            panic!("expected text frame");
        };
        let raw: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw["msgID"], "nil");
        let envelope = Envelope::decode_text(&text).unwrap();
        assert!(envelope.msg_id.unwrap().is_none());
        assert_eq!(envelope.payload.data, json!({"x": 1}));
    }

    #[test]
    fn publisher_does_not_register() {
        let (tx, _rx) = mpsc::channel(4);
        let router = Router::new(tx, FrameAssembler::default());
        let _publisher = Publisher::new(&router, "chatter", "std_msgs/String");
        assert!(router.registry().is_empty());
    }

    #[test]
    fn publish_after_router_dropped_is_not_connected() {
        let (tx, _rx) = mpsc::channel(4);
        let router = Router::new(tx, FrameAssembler::default());
        let publisher = Publisher::new(&router, "chatter", "std_msgs/String");
        drop(router);

        let err = publisher.publish(Payload::default()).unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }
}
