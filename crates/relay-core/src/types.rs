//! Value types shared between settings, the shard orchestrator and the
//! connection collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ShardError;

// ─────────────────────────────────────────────────────────────────────────────
// Credential
// ─────────────────────────────────────────────────────────────────────────────

/// Login token for the remote service.
///
/// `Debug` and `Display` never print the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for handing to the transport.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self(token.to_owned())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Account type
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of account the credential belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Automated account (the default).
    #[default]
    Bot,
    /// Regular user account.
    Client,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bot => write!(f, "bot"),
            Self::Client => write!(f, "client"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Proxy
// ─────────────────────────────────────────────────────────────────────────────

/// How outbound connections pick a proxy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyMode {
    /// Connect directly.
    #[default]
    None,
    /// Defer to the platform's proxy selection.
    System,
    /// Always use [`ProxyConfig::url`].
    Url,
}

/// Username/password for proxies that require authentication.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyCredentials {
    /// Proxy user.
    pub username: String,
    /// Proxy password.
    pub password: String,
}

impl fmt::Debug for ProxyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Proxy selection, fixed proxy and proxy authentication in one value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyConfig {
    /// Selection strategy.
    pub mode: ProxyMode,
    /// Proxy address, used when `mode` is [`ProxyMode::Url`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Authentication sent to the proxy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<ProxyCredentials>,
}

impl ProxyConfig {
    /// A fixed proxy at `url`.
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            mode: ProxyMode::Url,
            url: Some(url.into()),
            credentials: None,
        }
    }

    /// Attach proxy credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(ProxyCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// The fixed proxy address, if one is in effect.
    pub fn fixed_url(&self) -> Option<&str> {
        match self.mode {
            ProxyMode::Url => self.url.as_deref(),
            ProxyMode::None | ProxyMode::System => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shard assignment
// ─────────────────────────────────────────────────────────────────────────────

/// A validated `(index, total)` pair identifying one shard connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ShardAssignment {
    index: u32,
    total: u32,
}

impl ShardAssignment {
    /// Validate and build an assignment.
    pub fn new(index: u32, total: u32) -> Result<Self, ShardError> {
        if total < 1 {
            return Err(ShardError::TotalBelowOne);
        }
        if index >= total {
            return Err(ShardError::CurrentOutOfRange {
                current: index,
                total,
            });
        }
        Ok(Self { index, total })
    }

    /// The unsharded assignment `0 of 1`.
    #[must_use]
    pub fn unsharded() -> Self {
        Self { index: 0, total: 1 }
    }

    /// Zero-based shard index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Total shard count.
    pub fn total(&self) -> u32 {
        self.total
    }
}

impl fmt::Display for ShardAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index + 1, self.total)
    }
}
