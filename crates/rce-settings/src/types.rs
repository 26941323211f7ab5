//! Settings types.

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RceSettings {
    /// Handshake and streaming-connection settings.
    pub connection: ConnectionSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// Handshake and streaming-connection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// Upper bound on the HTTP negotiation with the master manager.
    pub handshake_timeout_ms: u64,
    /// Upper bound on opening the streaming connection.
    pub connect_timeout_ms: u64,
    /// Outbound frames buffered before sends start failing.
    pub outbound_queue_capacity: usize,
    /// Inbound envelopes allowed to wait for their binary attachments.
    pub max_pending_envelopes: usize,
    /// Binary frames allowed to wait for the envelope that references them.
    pub max_orphan_binaries: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 10_000,
            connect_timeout_ms: 10_000,
            outbound_queue_capacity: 1024,
            max_pending_envelopes: 64,
            max_orphan_binaries: 64,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}
