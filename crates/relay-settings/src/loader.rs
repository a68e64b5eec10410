//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ClientSettings::default()`]
//! 2. If `~/.relay/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `RELAY_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use relay_core::{AccountType, ProxyConfig};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::ClientSettings;

/// Resolve the path to the settings file (`~/.relay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".relay").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ClientSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a result that fails
/// [`ClientSettings::validate`] is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ClientSettings> {
    let defaults = serde_json::to_value(ClientSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ClientSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
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

/// Apply `RELAY_*` environment variables to loaded settings.
pub fn apply_env_overrides(settings: &mut ClientSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are ignored with a warning and leave the file/default
/// value in place. Empty strings count as unset.
pub fn apply_overrides<F>(settings: &mut ClientSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("RELAY_TOKEN") {
        settings.token = Some(v);
    }
    if let Some(v) = read("RELAY_ACCOUNT_TYPE") {
        match parse_account_type(&v) {
            Some(account_type) => settings.account_type = account_type,
            None => warn!(key = "RELAY_ACCOUNT_TYPE", value = %v, "invalid account type env var, ignoring"),
        }
    }
    if let Some(v) = read("RELAY_TOTAL_SHARDS") {
        match parse_u32_range(&v, 1, u32::MAX) {
            Some(n) => settings.total_shards = n,
            None => warn!(key = "RELAY_TOTAL_SHARDS", value = %v, "invalid u32 env var, ignoring"),
        }
    }
    if let Some(v) = read("RELAY_CURRENT_SHARD") {
        match parse_u32_range(&v, 0, u32::MAX - 1) {
            Some(n) => settings.current_shard = n,
            None => warn!(key = "RELAY_CURRENT_SHARD", value = %v, "invalid u32 env var, ignoring"),
        }
    }
    if let Some(v) = read("RELAY_WAIT_FOR_SERVERS") {
        match parse_bool(&v) {
            Some(b) => settings.wait_for_servers_on_startup = b,
            None => warn!(key = "RELAY_WAIT_FOR_SERVERS", value = %v, "invalid boolean env var, ignoring"),
        }
    }
    if let Some(v) = read("RELAY_TRUST_ALL_CERTIFICATES") {
        match parse_bool(&v) {
            Some(b) => settings.trust_all_certificates = b,
            None => warn!(key = "RELAY_TRUST_ALL_CERTIFICATES", value = %v, "invalid boolean env var, ignoring"),
        }
    }
    if let Some(v) = read("RELAY_PROXY_URL") {
        let credentials = settings.proxy.credentials.take();
        settings.proxy = ProxyConfig {
            credentials,
            ..ProxyConfig::url(v)
        };
    }
    if let Some(v) = read("RELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u32` within an inclusive range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse an account type name (`bot` or `client`, case-insensitive).
pub fn parse_account_type(val: &str) -> Option<AccountType> {
    serde_json::from_value(Value::String(val.to_lowercase())).ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
