//! The configuration surface applications talk to.
//!
//! [`ClientBuilder`] holds the credential, shard numbering, proxy and trust
//! settings, and the listener registry. Login and discovery calls snapshot
//! that state into requests and hand them to the orchestrator, so setters
//! called later only affect later logins.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use relay_core::{
    AccountType, BackoffConfig, ClientError, Credential, GatewayEvent, ListenerCategory,
    ProxyConfig, RetryState, ShardAssignment,
};
use relay_pipeline::{Listener, ListenerRegistry, Pipeline};
use relay_settings::ClientSettings;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ShardConfig;
use crate::connection::{ConnectionFactory, ConnectionRequest, ControlPlane, ProbeRequest};
use crate::discovery::ShardDiscovery;
use crate::login::ShardLoginOrchestrator;
use crate::pending::{PendingDiscovery, PendingLogin};

const NO_TOKEN_LOGIN: &str = "cannot login without a token";
const NO_TOKEN_DISCOVERY: &str = "cannot request the recommended total shards without a token";

struct ClientState {
    credential: RwLock<Option<Credential>>,
    account_type: RwLock<AccountType>,
    wait_for_servers_on_startup: AtomicBool,
    trust_all_certificates: AtomicBool,
    proxy: RwLock<ProxyConfig>,
    endpoint: RwLock<Option<String>>,
    backoff: RwLock<BackoffConfig>,
    listeners: ListenerRegistry,
}

/// Builder-style client configuration with login entry points.
///
/// Cheap to clone; clones share state. Login and discovery methods spawn
/// onto the current Tokio runtime and must be called from within one.
#[derive(Clone)]
pub struct ClientBuilder {
    state: Arc<ClientState>,
    shards: Arc<ShardConfig>,
    orchestrator: ShardLoginOrchestrator,
    control_plane: Arc<dyn ControlPlane>,
}

impl ClientBuilder {
    /// A builder with default settings.
    pub fn new(factory: Arc<dyn ConnectionFactory>, control_plane: Arc<dyn ControlPlane>) -> Self {
        let shards = Arc::new(ShardConfig::default());
        Self {
            state: Arc::new(ClientState {
                credential: RwLock::new(None),
                account_type: RwLock::new(AccountType::default()),
                wait_for_servers_on_startup: AtomicBool::new(true),
                trust_all_certificates: AtomicBool::new(false),
                proxy: RwLock::new(ProxyConfig::default()),
                endpoint: RwLock::new(None),
                backoff: RwLock::new(BackoffConfig::default()),
                listeners: ListenerRegistry::new(),
            }),
            orchestrator: ShardLoginOrchestrator::new(factory, Arc::clone(&shards)),
            shards,
            control_plane,
        }
    }

    /// A builder initialized from loaded settings.
    ///
    /// Fails with [`ClientError::Configuration`] if the settings do not
    /// validate.
    pub fn from_settings(
        settings: &ClientSettings,
        factory: Arc<dyn ConnectionFactory>,
        control_plane: Arc<dyn ControlPlane>,
    ) -> Result<Self, ClientError> {
        settings
            .validate()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        let builder = Self::new(factory, control_plane);
        builder.shards.set(settings.current_shard, settings.total_shards)?;
        if let Some(token) = &settings.token {
            builder.set_credential(token.as_str());
        }
        builder.set_account_type(settings.account_type);
        builder.set_wait_for_servers_on_startup(settings.wait_for_servers_on_startup);
        builder.set_trust_all_certificates(settings.trust_all_certificates);
        builder.set_proxy(settings.proxy.clone());
        builder.set_backoff(settings.discovery.clone())?;
        debug!(settings = ?settings, "client configured from settings");
        Ok(builder)
    }

    // ── Credential and account ──────────────────────────────────────────────

    /// Set the login token.
    pub fn set_credential(&self, credential: impl Into<Credential>) {
        *self.state.credential.write() = Some(credential.into());
    }

    /// The login token, if set.
    pub fn credential(&self) -> Option<Credential> {
        self.state.credential.read().clone()
    }

    /// Set the account type.
    pub fn set_account_type(&self, account_type: AccountType) {
        *self.state.account_type.write() = account_type;
    }

    /// The account type.
    pub fn account_type(&self) -> AccountType {
        *self.state.account_type.read()
    }

    // ── Shard numbering ─────────────────────────────────────────────────────

    /// Set the total shard count. See [`ShardConfig::set_total_shards`].
    pub fn set_total_shards(&self, total: u32) -> Result<(), ClientError> {
        Ok(self.shards.set_total_shards(total)?)
    }

    /// The total shard count.
    pub fn total_shards(&self) -> u32 {
        self.shards.total()
    }

    /// Pin single logins to shard `current`. See [`ShardConfig::set_current_shard`].
    pub fn set_current_shard(&self, current: u32) -> Result<(), ClientError> {
        Ok(self.shards.set_current_shard(current)?)
    }

    /// The shard single logins connect as.
    pub fn current_shard(&self) -> u32 {
        self.shards.current()
    }

    // ── Connection options ──────────────────────────────────────────────────

    /// Whether sessions wait for every server before reporting ready.
    pub fn set_wait_for_servers_on_startup(&self, wait: bool) {
        self.state.wait_for_servers_on_startup.store(wait, Ordering::SeqCst);
    }

    /// See [`Self::set_wait_for_servers_on_startup`].
    pub fn wait_for_servers_on_startup(&self) -> bool {
        self.state.wait_for_servers_on_startup.load(Ordering::SeqCst)
    }

    /// Accept any TLS certificate.
    pub fn set_trust_all_certificates(&self, trust: bool) {
        self.state.trust_all_certificates.store(trust, Ordering::SeqCst);
    }

    /// See [`Self::set_trust_all_certificates`].
    pub fn trust_all_certificates(&self) -> bool {
        self.state.trust_all_certificates.load(Ordering::SeqCst)
    }

    /// Set proxy selection and authentication.
    pub fn set_proxy(&self, proxy: ProxyConfig) {
        *self.state.proxy.write() = proxy;
    }

    /// Proxy selection and authentication.
    pub fn proxy(&self) -> ProxyConfig {
        self.state.proxy.read().clone()
    }

    /// Override the gateway endpoint passed to new sessions.
    pub fn set_endpoint(&self, endpoint: impl Into<String>) {
        *self.state.endpoint.write() = Some(endpoint.into());
    }

    /// Gateway endpoint passed to new sessions, if known.
    pub fn endpoint(&self) -> Option<String> {
        self.state.endpoint.read().clone()
    }

    /// Backoff used by recommended-shard lookups started after this call.
    ///
    /// Fails with [`ClientError::Configuration`] and keeps the previous
    /// value if [`BackoffConfig::validate`] rejects `backoff`.
    pub fn set_backoff(&self, backoff: BackoffConfig) -> Result<(), ClientError> {
        backoff.validate().map_err(ClientError::Configuration)?;
        *self.state.backoff.write() = backoff;
        Ok(())
    }

    /// See [`Self::set_backoff`].
    pub fn backoff(&self) -> BackoffConfig {
        self.state.backoff.read().clone()
    }

    // ── Listeners ───────────────────────────────────────────────────────────

    /// Attach `listener` for `category` to every session created afterwards.
    pub fn add_listener(&self, category: ListenerCategory, listener: Listener) {
        self.state.listeners.register(category, listener);
    }

    /// Feed every `category` event of future sessions into `pipeline`.
    pub fn add_pipeline<O: 'static>(
        &self,
        category: ListenerCategory,
        pipeline: &Pipeline<GatewayEvent, O>,
    ) {
        self.state.listeners.register_pipeline(category, pipeline);
    }

    /// Registered listeners.
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.state.listeners
    }

    // ── Login ───────────────────────────────────────────────────────────────

    /// Log in as the current shard.
    ///
    /// Without a credential the handle is already failed with
    /// [`ClientError::Configuration`].
    pub fn login(&self) -> PendingLogin {
        let shard = self.shards.assignment();
        match self.request_for(shard) {
            Ok(request) => self.orchestrator.login_shard(request),
            Err(e) => PendingLogin::failed(shard, e),
        }
    }

    /// Log in the listed shards. See [`ShardLoginOrchestrator::login_shards`].
    pub fn login_shards(&self, shards: &[u32]) -> Result<Vec<PendingLogin>, ClientError> {
        self.orchestrator
            .login_shards(shards, |shard| self.request_for(shard))
    }

    /// Log in every shard in `[0, total)`.
    pub fn login_all_shards(&self) -> Result<Vec<PendingLogin>, ClientError> {
        let shards: Vec<u32> = (0..self.total_shards()).collect();
        self.login_shards(&shards)
    }

    /// Log in every shard in `[0, total)` accepted by `predicate`.
    pub fn login_shards_matching<P>(&self, predicate: P) -> Result<Vec<PendingLogin>, ClientError>
    where
        P: Fn(u32) -> bool,
    {
        let shards: Vec<u32> = (0..self.total_shards()).filter(|&s| predicate(s)).collect();
        self.login_shards(&shards)
    }

    fn request_for(&self, shard: ShardAssignment) -> Result<ConnectionRequest, ClientError> {
        let credential = self
            .credential()
            .ok_or_else(|| ClientError::Configuration(NO_TOKEN_LOGIN.into()))?;
        Ok(ConnectionRequest {
            account_type: self.account_type(),
            credential,
            shard,
            wait_for_servers_on_startup: self.wait_for_servers_on_startup(),
            proxy: self.proxy(),
            trust_all_certificates: self.trust_all_certificates(),
            endpoint: self.endpoint(),
            listeners: self.state.listeners.snapshot(),
        })
    }

    // ── Discovery ───────────────────────────────────────────────────────────

    /// Ask the service how many shards to use and apply the answer.
    ///
    /// Retries with backoff until a lookup succeeds. On success the
    /// recommended endpoint is recorded for later logins and the handle
    /// resolves to the new total. If the current shard is out of range for
    /// the recommended total the handle fails with
    /// [`ClientError::Validation`] and nothing is changed.
    pub fn set_recommended_total_shards(&self) -> PendingDiscovery {
        self.set_recommended_total_shards_until(CancellationToken::new())
    }

    /// Like [`Self::set_recommended_total_shards`], but gives up with
    /// [`ClientError::Cancelled`] once `cancel` fires.
    pub fn set_recommended_total_shards_until(&self, cancel: CancellationToken) -> PendingDiscovery {
        let Some(credential) = self.credential() else {
            return PendingDiscovery::failed(ClientError::Configuration(NO_TOKEN_DISCOVERY.into()));
        };
        let request = ProbeRequest {
            credential,
            proxy: self.proxy(),
            trust_all_certificates: self.trust_all_certificates(),
        };
        let discovery = ShardDiscovery::new(Arc::clone(&self.control_plane), self.backoff());
        let state = Arc::clone(&self.state);
        let shards = Arc::clone(&self.shards);

        PendingDiscovery::spawn(async move {
            let retry = RetryState::new();
            let report = discovery.discover(&request, &retry, &cancel).await?;
            let recommendation = report.recommendation;

            shards.set_total_shards(recommendation.shard_count)?;
            *state.endpoint.write() = Some(recommendation.endpoint);
            info!(
                total_shards = recommendation.shard_count,
                retries = report.retries,
                "applied recommended total shards"
            );
            Ok(recommendation.shard_count)
        })
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("credential", &self.credential())
            .field("account_type", &self.account_type())
            .field("shards", &self.shards.assignment())
            .field("endpoint", &self.endpoint())
            .field("listeners", &self.state.listeners.count())
            .finish_non_exhaustive()
    }
}
