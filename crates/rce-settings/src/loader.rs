//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RceSettings::default()`]
//! 2. If `~/.rce/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `RCE_*` environment variable overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::RceSettings;

/// Resolve the path to the settings file (`~/.rce/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".rce").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RceSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RceSettings> {
    load_with_env(path, |name| std::env::var(name).ok())
}

fn load_with_env(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<RceSettings> {
    let defaults = serde_json::to_value(RceSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: RceSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `RCE_*` overrides read through `env`.
///
/// Integers must parse and fall inside their range; invalid values are
/// ignored with a warning.
pub fn apply_env_overrides(settings: &mut RceSettings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = read_u64(&env, "RCE_HANDSHAKE_TIMEOUT_MS", 100, 600_000) {
        settings.connection.handshake_timeout_ms = v;
    }
    if let Some(v) = read_u64(&env, "RCE_CONNECT_TIMEOUT_MS", 100, 600_000) {
        settings.connection.connect_timeout_ms = v;
    }
    if let Some(v) = read_u64(&env, "RCE_OUTBOUND_QUEUE", 1, 1_000_000) {
        settings.connection.outbound_queue_capacity = usize::try_from(v).unwrap_or(usize::MAX);
    }
    if let Some(v) = env("RCE_LOG_LEVEL").filter(|v| !v.is_empty()) {
        settings.logging.level = v;
    }
}

/// Reject settings the client cannot run with.
pub fn validate(settings: &RceSettings) -> Result<()> {
    let conn = &settings.connection;
    if conn.outbound_queue_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "connection.outboundQueueCapacity must be greater than 0".into(),
        ));
    }
    if conn.max_pending_envelopes == 0 || conn.max_orphan_binaries == 0 {
        return Err(SettingsError::InvalidValue(
            "connection.maxPendingEnvelopes and connection.maxOrphanBinaries must be greater than 0"
                .into(),
        ));
    }
    if conn.handshake_timeout_ms == 0 || conn.connect_timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "connection timeouts must be greater than 0".into(),
        ));
    }
    Ok(())
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_u64(env: &impl Fn(&str) -> Option<String>, name: &str, min: u64, max: u64) -> Option<u64> {
    let val = env(name)?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid integer env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"connection": {"a": 1, "b": 2}});
        let source = serde_json::json!({"connection": {"a": 10}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["connection"]["a"], 10);
        assert_eq!(merged["connection"]["b"], 2);
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"a": null});
        assert_eq!(deep_merge(target, source)["a"], 1);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    // ── loading ─────────────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_with_env(Path::new("/nonexistent/settings.json"), no_env).unwrap();
        assert_eq!(settings, RceSettings::default());
    }

    #[test]
    fn load_merges_user_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"connection": {"handshakeTimeoutMs": 2500}, "logging": {"level": "debug"}}"#,
        )
        .unwrap();

        let settings = load_with_env(&path, no_env).unwrap();
        assert_eq!(settings.connection.handshake_timeout_ms, 2500);
        assert_eq!(settings.connection.connect_timeout_ms, 10_000);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn load_invalid_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_with_env(&path, no_env).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn load_rejects_zero_queue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"connection": {"outboundQueueCapacity": 0}}"#).unwrap();
        let err = load_with_env(&path, no_env).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
    }

    #[test]
    fn load_rejects_zero_assembly_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        for body in [
            r#"{"connection": {"maxPendingEnvelopes": 0}}"#,
            r#"{"connection": {"maxOrphanBinaries": 0}}"#,
        ] {
            std::fs::write(&path, body).unwrap();
            let err = load_with_env(&path, no_env).unwrap_err();
            assert!(matches!(err, SettingsError::InvalidValue(ref m) if m.contains("max")));
        }
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"connection": {"connectTimeoutMs": 2000}}"#).unwrap();
        let env = env_of(&[("RCE_CONNECT_TIMEOUT_MS", "3000"), ("RCE_LOG_LEVEL", "trace")]);

        let settings = load_with_env(&path, env).unwrap();
        assert_eq!(settings.connection.connect_timeout_ms, 3000);
        assert_eq!(settings.logging.level, "trace");
    }

    #[test]
    fn env_out_of_range_ignored() {
        let mut settings = RceSettings::default();
        apply_env_overrides(
            &mut settings,
            env_of(&[("RCE_HANDSHAKE_TIMEOUT_MS", "5"), ("RCE_OUTBOUND_QUEUE", "lots")]),
        );
        assert_eq!(settings, RceSettings::default());
    }

    #[test]
    fn env_queue_override() {
        let mut settings = RceSettings::default();
        apply_env_overrides(&mut settings, env_of(&[("RCE_OUTBOUND_QUEUE", "16")]));
        assert_eq!(settings.connection.outbound_queue_capacity, 16);
    }

    #[test]
    fn parse_range_bounds() {
        assert_eq!(parse_u64_range("100", 100, 200), Some(100));
        assert_eq!(parse_u64_range("200", 100, 200), Some(200));
        assert_eq!(parse_u64_range("99", 100, 200), None);
        assert_eq!(parse_u64_range("-1", 0, 200), None);
        assert_eq!(parse_u64_range("", 0, 200), None);
    }
}
