//! # rce-settings
//!
//! Client configuration loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RceSettings::default()`]
//! 2. **User file**: `~/.rce/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `RCE_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use rce_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("handshake timeout: {} ms", settings.connection.handshake_timeout_ms);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
///
/// Initialized on first access via [`get_settings`], or explicitly via
/// [`init_settings`] before first use.
static SETTINGS: OnceLock<RceSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.rce/settings.json` with env var
/// overrides. If loading fails, returns compiled defaults.
pub fn get_settings() -> &'static RceSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            RceSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns `Err(settings)` if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: RceSettings) -> std::result::Result<(), RceSettings> {
    SETTINGS.set(settings)
}
