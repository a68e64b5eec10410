//! Settings type definitions.
//!
//! Field names are camelCase on the wire. Every struct is
//! `#[serde(default)]`, so partial JSON fills the gaps with defaults.

use std::fmt;

use relay_core::{AccountType, BackoffConfig, ProxyConfig, ProxyMode, ShardAssignment};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for a relay client.
///
/// ```json
/// {
///   "token": "…",
///   "totalShards": 4,
///   "proxy": { "mode": "url", "url": "http://proxy:3128" },
///   "discovery": { "baseDelayMs": 500 }
/// }
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Login token. Required before any login or discovery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Account type of the token.
    pub account_type: AccountType,
    /// Shard this client is pinned to (0 unless pinned).
    pub current_shard: u32,
    /// Total number of shards.
    pub total_shards: u32,
    /// Whether sessions wait for every server to become available on startup.
    pub wait_for_servers_on_startup: bool,
    /// Accept any TLS certificate. Only for testing against local proxies.
    pub trust_all_certificates: bool,
    /// Proxy selection and authentication.
    pub proxy: ProxyConfig,
    /// Backoff for the recommended-shard lookup.
    pub discovery: BackoffConfig,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            token: None,
            account_type: AccountType::default(),
            current_shard: 0,
            total_shards: 1,
            wait_for_servers_on_startup: true,
            trust_all_certificates: false,
            proxy: ProxyConfig::default(),
            discovery: BackoffConfig::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("account_type", &self.account_type)
            .field("current_shard", &self.current_shard)
            .field("total_shards", &self.total_shards)
            .field("wait_for_servers_on_startup", &self.wait_for_servers_on_startup)
            .field("trust_all_certificates", &self.trust_all_certificates)
            .field("proxy", &self.proxy)
            .field("discovery", &self.discovery)
            .field("logging", &self.logging)
            .finish()
    }
}

impl ClientSettings {
    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let _ = ShardAssignment::new(self.current_shard, self.total_shards)
            .map_err(|e| SettingsError::InvalidValue(e.to_string()))?;
        if self.proxy.mode == ProxyMode::Url && self.proxy.url.is_none() {
            return Err(SettingsError::InvalidValue(
                "proxy mode \"url\" requires proxy.url".into(),
            ));
        }
        self.discovery
            .validate()
            .map_err(|reason| SettingsError::InvalidValue(format!("discovery.{reason}")))?;
        Ok(())
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of the compact human format.
    pub json: bool,
}

impl LoggingSettings {
    /// Install the process-wide `tracing` subscriber these settings describe.
    ///
    /// `RUST_LOG` still wins over `level`. Only the first install in a
    /// process takes effect.
    pub fn install(&self) {
        if self.json {
            relay_core::logging::init_json_subscriber(&self.level);
        } else {
            relay_core::logging::init_subscriber(&self.level);
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: relay_core::logging::DEFAULT_LEVEL.to_string(),
            json: false,
        }
    }
}
