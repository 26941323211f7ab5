//! Identifier newtypes.
//!
//! Correlation IDs and attachment IDs are UUID v7 in simple (32 hex digit)
//! form, generated via [`uuid::Uuid::now_v7`]. v7 embeds a timestamp and a
//! random tail, so IDs never repeat within a session.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::constants::NO_CORRELATION;

/// Generate a new UUID v7 in simple form.
pub(crate) fn new_simple_v7() -> String {
    Uuid::now_v7().simple().to_string()
}

/// Token matching a service call to its response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Create a fresh, process-unique ID.
    #[must_use]
    pub fn new() -> Self {
        Self(new_simple_v7())
    }

    /// The sentinel carried by messages that expect no response.
    #[must_use]
    pub fn none() -> Self {
        Self(NO_CORRELATION.to_owned())
    }

    /// Whether this is the no-correlation sentinel.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0 == NO_CORRELATION
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume self and return the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for CorrelationId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl PartialEq<str> for CorrelationId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn new_is_uuid_v7_simple() {
        let id = CorrelationId::new();
        assert_eq!(id.len(), 32);
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn ids_are_unique() {
        let ids: HashSet<CorrelationId> = (0..1000).map(|_| CorrelationId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn none_sentinel() {
        let id = CorrelationId::none();
        assert!(id.is_none());
        assert_eq!(id.as_str(), "nil");
        assert!(!CorrelationId::new().is_none());
    }

    #[test]
    fn from_str_and_display() {
        let id = CorrelationId::from("abc-123");
        assert_eq!(format!("{id}"), "abc-123");
        assert!(id == *"abc-123");
    }

    #[test]
    fn serde_is_transparent() {
        let id = CorrelationId::from("x1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"x1\"");
    }
}
