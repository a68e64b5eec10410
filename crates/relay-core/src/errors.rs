//! Client error taxonomy.
//!
//! Configuration, validation and usage errors are raised before any network
//! work happens. Discovery errors are transient and retried internally;
//! connection errors come back from the external connection collaborator.

use thiserror::Error;

/// Shard numbering violations. No state is changed when one is returned.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ShardError {
    /// `totalShards` must be at least one.
    #[error("totalShards cannot be less than 1")]
    TotalBelowOne,

    /// `currentShard` must stay below `totalShards`.
    #[error("currentShard ({current}) must be less than totalShards ({total})")]
    CurrentOutOfRange {
        /// Current shard that would result.
        current: u32,
        /// Total shard count that would result.
        total: u32,
    },

    /// A batch listed the same shard twice.
    #[error("shard {shard} cannot be started multiple times")]
    Duplicate {
        /// The repeated index.
        shard: u32,
    },

    /// A batch listed a shard outside `[0, totalShards)`.
    #[error("shard {shard} must be less than totalShards ({total})")]
    OutOfRange {
        /// The offending index.
        shard: u32,
        /// Total shard count at validation time.
        total: u32,
    },
}

/// Errors surfaced by the relay client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Required configuration (usually the credential) is missing.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Shard bounds or batch contents were invalid.
    #[error("Validation error: {0}")]
    Validation(#[from] ShardError),

    /// The API was used in a state that forbids the call.
    #[error("Usage error: {0}")]
    Usage(String),

    /// Looking up the recommended shard count failed. Retried with backoff.
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Opening a shard connection failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The operation was cancelled by its caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// A background task ended without producing a result.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Stable category label for logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Validation(_) => "validation",
            Self::Usage(_) => "usage",
            Self::Discovery(_) => "discovery",
            Self::Connection(_) => "connection",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}
