//! Typed endpoints bound to a tag.
//!
//! [`ServiceClient`] and [`Subscriber`] register with the router at
//! construction and unregister when dropped. [`Publisher`] only sends.

pub mod publisher;
pub mod service;
pub mod subscriber;

pub use publisher::Publisher;
pub use service::ServiceClient;
pub use subscriber::Subscriber;

use std::sync::Arc;

use rce_core::Payload;

/// Callback receiving an inbound payload.
pub type MessageCallback = Arc<dyn Fn(Payload) + Send + Sync>;
