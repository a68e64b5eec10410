//! # relay-settings
//!
//! Client settings loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`ClientSettings::default()`]
//! 2. **User file** — `~/.relay/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `RELAY_*` overrides (highest priority)
//!
//! The merged value is validated before it is returned, so a loaded
//! [`ClientSettings`] always has `currentShard < totalShards`.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::{ClientSettings, LoggingSettings};
