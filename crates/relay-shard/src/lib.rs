//! # relay-shard
//!
//! Bootstraps sharded connections to the remote service:
//!
//! - [`ShardConfig`]: current shard and total shard count, validated together
//! - [`ShardDiscovery`]: recommended shard count lookup over a disposable
//!   probe session, retried with backoff
//! - [`ShardLoginOrchestrator`]: single and batch shard login
//! - [`ClientBuilder`]: the configuration surface applications use
//!
//! The wire protocol lives behind the [`ConnectionFactory`] and
//! [`ControlPlane`] traits.

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod connection;
pub mod discovery;
pub mod login;
pub mod pending;

pub use client::ClientBuilder;
pub use config::ShardConfig;
pub use connection::{
    ConnectionFactory, ConnectionRequest, ControlPlane, ProbeRequest, ProbeSession,
    Recommendation, Session,
};
pub use discovery::{DiscoveryReport, ShardDiscovery};
pub use login::ShardLoginOrchestrator;
pub use pending::{PendingDiscovery, PendingLogin};
