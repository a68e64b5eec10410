//! Inbound gateway events and the categories listeners subscribe to.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Capability category a listener is registered under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerCategory {
    /// A message was posted.
    MessageCreate,
    /// A message was edited.
    MessageEdit,
    /// A message was removed.
    MessageDelete,
    /// The account joined a server.
    ServerJoin,
    /// The account left a server.
    ServerLeave,
    /// A user's presence changed.
    UserStatusChange,
    /// The session lost its connection.
    LostConnection,
    /// The session reconnected with a fresh handshake.
    Reconnect,
    /// The session resumed without a fresh handshake.
    Resume,
}

impl ListenerCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::MessageCreate,
        Self::MessageEdit,
        Self::MessageDelete,
        Self::ServerJoin,
        Self::ServerLeave,
        Self::UserStatusChange,
        Self::LostConnection,
        Self::Reconnect,
        Self::Resume,
    ];
}

impl fmt::Display for ListenerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MessageCreate => "message_create",
            Self::MessageEdit => "message_edit",
            Self::MessageDelete => "message_delete",
            Self::ServerJoin => "server_join",
            Self::ServerLeave => "server_leave",
            Self::UserStatusChange => "user_status_change",
            Self::LostConnection => "lost_connection",
            Self::Reconnect => "reconnect",
            Self::Resume => "resume",
        };
        f.write_str(s)
    }
}

/// One event delivered by a shard session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayEvent {
    /// Category the event belongs to.
    pub category: ListenerCategory,
    /// Index of the shard that received it.
    pub shard: u32,
    /// Decoded event body.
    #[serde(default)]
    pub payload: Value,
}

impl GatewayEvent {
    /// Build an event.
    #[must_use]
    pub fn new(category: ListenerCategory, shard: u32, payload: Value) -> Self {
        Self {
            category,
            shard,
            payload,
        }
    }

    /// Read a string field from the payload.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Read an integer field from the payload.
    pub fn i64_field(&self, key: &str) -> Option<i64> {
        self.payload.get(key).and_then(Value::as_i64)
    }
}
