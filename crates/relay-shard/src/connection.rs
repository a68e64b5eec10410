//! Collaborators that own the wire: shard connections and the control plane.
//!
//! The orchestrator never speaks the protocol itself. It builds a
//! [`ConnectionRequest`] per shard and hands it to a [`ConnectionFactory`];
//! shard-count discovery goes through a disposable [`ProbeSession`] opened
//! by a [`ControlPlane`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{
    AccountType, ClientError, Credential, ListenerCategory, ProxyConfig, SessionId,
    ShardAssignment,
};
use relay_pipeline::Listener;

// ─────────────────────────────────────────────────────────────────────────────
// Shard connections
// ─────────────────────────────────────────────────────────────────────────────

/// Everything needed to open one shard connection.
#[derive(Clone)]
pub struct ConnectionRequest {
    /// Kind of account the credential belongs to.
    pub account_type: AccountType,
    /// Login token.
    pub credential: Credential,
    /// Which shard to connect as.
    pub shard: ShardAssignment,
    /// Whether the session waits for every server before reporting ready.
    pub wait_for_servers_on_startup: bool,
    /// Proxy selection and authentication.
    pub proxy: ProxyConfig,
    /// Accept any TLS certificate.
    pub trust_all_certificates: bool,
    /// Gateway address recorded by discovery, if any.
    pub endpoint: Option<String>,
    /// Listeners to attach, ordered by category then registration order.
    pub listeners: Vec<(ListenerCategory, Listener)>,
}

impl fmt::Debug for ConnectionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRequest")
            .field("account_type", &self.account_type)
            .field("credential", &self.credential)
            .field("shard", &self.shard)
            .field("wait_for_servers_on_startup", &self.wait_for_servers_on_startup)
            .field("proxy", &self.proxy)
            .field("trust_all_certificates", &self.trust_all_certificates)
            .field("endpoint", &self.endpoint)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// An established shard session.
pub trait Session: fmt::Debug + Send + Sync {
    /// Unique id of this session.
    fn id(&self) -> &SessionId;

    /// The shard this session serves.
    fn shard(&self) -> ShardAssignment;
}

/// Opens shard connections.
///
/// The returned future resolves once the handshake completes, or fails
/// with [`ClientError::Connection`] if it does not.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Open one shard connection.
    async fn open(&self, request: ConnectionRequest) -> Result<Arc<dyn Session>, ClientError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Control plane
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters for a disposable probe session.
#[derive(Clone, Debug)]
pub struct ProbeRequest {
    /// Login token.
    pub credential: Credential,
    /// Proxy selection and authentication.
    pub proxy: ProxyConfig,
    /// Accept any TLS certificate.
    pub trust_all_certificates: bool,
}

/// Answer to the recommended-shards query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recommendation {
    /// Gateway address new sessions should connect to.
    pub endpoint: String,
    /// Number of shards the service recommends.
    pub shard_count: u32,
}

/// A session opened only to issue control-plane queries.
#[async_trait]
pub trait ProbeSession: Send + Sync {
    /// Ask for the recommended shard count and gateway endpoint.
    async fn recommended_shards(&self) -> Result<Recommendation, ClientError>;

    /// Release the session.
    async fn close(&self);
}

/// Opens probe sessions.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Open a disposable session for control-plane queries.
    async fn open_probe(&self, request: ProbeRequest)
    -> Result<Box<dyn ProbeSession>, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::GatewayEvent;
    use relay_pipeline::Pipeline;

    fn request() -> ConnectionRequest {
        let pipeline = Pipeline::<GatewayEvent, GatewayEvent>::start();
        ConnectionRequest {
            account_type: AccountType::Bot,
            credential: Credential::new("secret-token"),
            shard: ShardAssignment::unsharded(),
            wait_for_servers_on_startup: true,
            proxy: ProxyConfig::default(),
            trust_all_certificates: false,
            endpoint: Some("wss://gateway.example".into()),
            listeners: vec![(ListenerCategory::MessageCreate, pipeline.as_sink())],
        }
    }

    #[derive(Debug)]
    struct StubSession {
        id: SessionId,
        shard: ShardAssignment,
    }

    impl Session for StubSession {
        fn id(&self) -> &SessionId {
            &self.id
        }

        fn shard(&self) -> ShardAssignment {
            self.shard
        }
    }

    #[test]
    fn session_results_are_debuggable() {
        let session: Arc<dyn Session> = Arc::new(StubSession {
            id: SessionId::from("s-1"),
            shard: ShardAssignment::new(1, 2).unwrap(),
        });
        let result: Result<Arc<dyn Session>, ClientError> = Ok(session);
        let debug = format!("{result:?}");
        assert!(debug.contains("s-1"));
        assert!(debug.contains("index: 1"));
    }

    #[test]
    fn debug_hides_credential() {
        let debug = format!("{:?}", request());
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("listeners: 1"));
    }
}
