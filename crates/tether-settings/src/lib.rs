//! # tether-settings
//!
//! Client settings with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`TetherSettings::default()`]
//! 2. **User file**: `~/.tether/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `TETHER_*` overrides (highest priority)
//!
//! The data directory can be moved with `TETHER_HOME`.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{data_dir, deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
static SETTINGS: OnceLock<TetherSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from disk with env var overrides. If loading
/// fails, logs the error and returns compiled defaults.
pub fn get_settings() -> &'static TetherSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            TetherSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the provided settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: TetherSettings) -> std::result::Result<(), TetherSettings> {
    SETTINGS.set(settings)
}
