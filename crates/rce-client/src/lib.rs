//! # rce-client
//!
//! Protocol client core for the RoboEarth Cloud Engine.
//!
//! - **Handshake**: HTTP negotiation with the master manager ([`handshake`])
//! - **Session**: the [`Client`] lifecycle and interface factories
//! - **Router**: envelope construction and inbound dispatch ([`Router`])
//! - **Registry**: tag → interface table with synchronous unregistration
//! - **Interfaces**: [`ServiceClient`], [`Publisher`], [`Subscriber`]
//! - **Control**: container, node, parameter, interface and connection builders
//! - **Transport**: the [`Connector`] seam with WebSocket and in-memory backends
//!
//! ```no_run
//! use rce_client::{Client, Credentials};
//! use rce_core::Payload;
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), rce_client::ClientError> {
//! rce_client::init_logging(&rce_settings::get_settings().logging);
//! let client = Client::new(Credentials::new("user", "secret", "robot"));
//! client.connect("http://master:9000/", |_| println!("connected")).await?;
//!
//! let adder = client.service("adder", "Add", |resp| println!("{:?}", resp.data))?;
//! let _ = adder.call(Payload::new(json!({"a": 1, "b": 2})))?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod control;
pub mod errors;
pub mod handshake;
pub mod interfaces;
pub mod registry;
pub mod router;
pub mod session;
pub mod transport;

pub use control::{InterfaceRef, InterfaceType, NodeSpec, ParamValue};
pub use errors::ClientError;
pub use handshake::{Credentials, Negotiation};
pub use interfaces::{MessageCallback, Publisher, ServiceClient, Subscriber};
pub use registry::{InterfaceReceiver, InterfaceRegistry};
pub use router::{Registration, Routed, Router};
pub use session::{Client, SessionState};
pub use transport::{
    Connector, MemoryConnector, MemoryPeer, TransportEvent, TransportLink, WebSocketConnector,
};

use rce_core::logging::{init_json_subscriber, init_subscriber};
use rce_settings::LoggingSettings;

/// Install the global tracing subscriber described by `settings`.
///
/// JSON lines when `settings.json` is set, compact text otherwise. A no-op
/// once any global subscriber exists.
pub fn init_logging(settings: &LoggingSettings) {
    if settings.json {
        init_json_subscriber(&settings.level);
    } else {
        init_subscriber(&settings.level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_accepts_both_formats() {
        init_logging(&LoggingSettings {
            level: "debug".into(),
            json: true,
        });
        init_logging(&LoggingSettings::default());
    }
}
