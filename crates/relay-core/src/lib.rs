//! # relay-core
//!
//! Foundation types shared by every relay crate:
//!
//! - **Errors**: [`ClientError`] taxonomy and [`ShardError`] validation failures
//! - **Values**: [`Credential`], [`AccountType`], [`ProxyConfig`], [`ShardAssignment`]
//! - **IDs**: [`SessionId`] (UUID v7)
//! - **Events**: [`GatewayEvent`] and the [`ListenerCategory`] keying listeners
//! - **Retry**: [`BackoffConfig`] and the per-operation [`RetryState`]
//! - **Logging**: `tracing` subscriber bootstrap and log capture for tests

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;
pub mod retry;
pub mod types;

pub use errors::{ClientError, ShardError};
pub use events::{GatewayEvent, ListenerCategory};
pub use ids::SessionId;
pub use retry::{BackoffConfig, RetryState};
pub use types::{AccountType, Credential, ProxyConfig, ProxyCredentials, ProxyMode, ShardAssignment};
