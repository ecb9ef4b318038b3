//! # mirror-settings
//!
//! Configuration for mirror servers and sessions, loaded from three layers
//! (in priority order):
//! 1. **Compiled defaults**: [`MirrorSettings::default()`]
//! 2. **User file**: `~/.mirror/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `MIRROR_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<MirrorSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// The first call loads from disk and the environment; if loading fails the
/// compiled defaults are used.
pub fn get_settings() -> &'static MirrorSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            MirrorSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: MirrorSettings) -> std::result::Result<(), MirrorSettings> {
    SETTINGS.set(settings)
}
