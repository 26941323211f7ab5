//! Protocol-level constants.

/// Protocol version announced to the master manager during negotiation.
pub const CLIENT_VERSION: &str = "20130131";

/// `msgID` carried by envelopes that expect no response (publishes).
pub const NO_CORRELATION: &str = "nil";

/// Suffix marking an object key whose value references a binary attachment.
pub const BINARY_KEY_SUFFIX: char = '*';

/// Length of an attachment id on the wire (UUID simple form).
pub const ATTACHMENT_ID_LEN: usize = 32;

/// Outbound control operations understood by the cloud engine.
pub mod control {
    /// Create a container for the user.
    pub const CREATE_CONTAINER: &str = "create container";
    /// Destroy a container.
    pub const DESTROY_CONTAINER: &str = "destroy container";
    /// Add or remove nodes, parameters, and interfaces.
    pub const CONFIGURE_COMPONENT: &str = "configure component";
    /// Connect or disconnect interfaces.
    pub const CONFIGURE_CONNECTION: &str = "configure connection";

    /// Server acknowledgement that the streaming session is live.
    pub const CONNECTION_ESTABLISHED: &str = "connection established";
    /// Informational status text from the server.
    pub const STATUS: &str = "status";
    /// Error report from the server.
    pub const ERROR: &str = "error";

    /// Whether `msg_type` names an inbound control notification.
    pub fn is_inbound(msg_type: &str) -> bool {
        matches!(msg_type, CONNECTION_ESTABLISHED | STATUS | ERROR)
    }
}
