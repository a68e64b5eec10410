//! Single and batch shard login.

use std::collections::HashSet;
use std::sync::Arc;

use relay_core::{ClientError, ShardAssignment, ShardError};
use tracing::{Instrument, debug, info, info_span};

use crate::config::ShardConfig;
use crate::connection::{ConnectionFactory, ConnectionRequest};
use crate::pending::PendingLogin;

/// Message carried by batch entries refused because the client is pinned.
pub const PINNED_BATCH_MESSAGE: &str =
    "batch login is not allowed after pinning the current shard";

/// Starts shard connections through a [`ConnectionFactory`].
#[derive(Clone)]
pub struct ShardLoginOrchestrator {
    factory: Arc<dyn ConnectionFactory>,
    config: Arc<ShardConfig>,
}

impl ShardLoginOrchestrator {
    /// Create an orchestrator over shared shard numbering.
    pub fn new(factory: Arc<dyn ConnectionFactory>, config: Arc<ShardConfig>) -> Self {
        Self { factory, config }
    }

    /// The shard numbering batches are validated against.
    pub fn config(&self) -> &Arc<ShardConfig> {
        &self.config
    }

    /// Open the shard named by `request.shard`.
    ///
    /// The connection attempt runs on a spawned task inside a `shard` span,
    /// so the returned handle is ready to await immediately.
    pub fn login_shard(&self, request: ConnectionRequest) -> PendingLogin {
        let shard = request.shard;
        let span = info_span!("shard", shard = shard.index(), total = shard.total());
        span.in_scope(|| {
            debug!("creating shard {} of {}", shard.index() + 1, shard.total());
        });

        let factory = Arc::clone(&self.factory);
        let handle = tokio::spawn(async move { factory.open(request).await }.instrument(span));
        PendingLogin::spawned(shard, handle)
    }

    /// Open several shards, one handle per index in input order.
    ///
    /// The batch is rejected as a whole, with nothing started, if it
    /// repeats an index or names one outside `[0, total)`. An empty batch
    /// yields no handles. When the client is pinned to a non-zero current
    /// shard every handle fails with [`ClientError::Usage`]. Otherwise
    /// `request_for` builds each shard's request; an error from it fails
    /// only that shard's handle.
    ///
    /// The current shard is never modified.
    pub fn login_shards<F>(
        &self,
        shards: &[u32],
        request_for: F,
    ) -> Result<Vec<PendingLogin>, ClientError>
    where
        F: Fn(ShardAssignment) -> Result<ConnectionRequest, ClientError>,
    {
        if shards.is_empty() {
            return Ok(Vec::new());
        }

        let snapshot = self.config.assignment();
        let assignments = validate_batch(shards, snapshot.total())?;

        if assignments.len() == snapshot.total() as usize {
            info!(
                "creating {} {}",
                snapshot.total(),
                if snapshot.total() == 1 { "shard" } else { "shards" }
            );
        } else {
            info!(
                "creating {} out of {} shards ({:?})",
                assignments.len(),
                snapshot.total(),
                shards
            );
        }

        let pinned = snapshot.index() != 0;
        let pending = assignments
            .into_iter()
            .map(|assignment| {
                if pinned {
                    return PendingLogin::failed(
                        assignment,
                        ClientError::Usage(PINNED_BATCH_MESSAGE.into()),
                    );
                }
                match request_for(assignment) {
                    Ok(request) => self.login_shard(request),
                    Err(e) => PendingLogin::failed(assignment, e),
                }
            })
            .collect();
        Ok(pending)
    }
}

/// Check a batch for duplicates and range, in that order.
fn validate_batch(shards: &[u32], total: u32) -> Result<Vec<ShardAssignment>, ShardError> {
    let mut seen = HashSet::with_capacity(shards.len());
    if let Some(&shard) = shards.iter().find(|shard| !seen.insert(**shard)) {
        return Err(ShardError::Duplicate { shard });
    }
    shards
        .iter()
        .map(|&shard| {
            ShardAssignment::new(shard, total).map_err(|_| ShardError::OutOfRange { shard, total })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Session;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use relay_core::logging::capture_logs;
    use relay_core::{AccountType, Credential, ProxyConfig, SessionId};
    use tracing::Level;

    #[derive(Debug)]
    struct FakeSession {
        id: SessionId,
        shard: ShardAssignment,
    }

    impl Session for FakeSession {
        fn id(&self) -> &SessionId {
            &self.id
        }

        fn shard(&self) -> ShardAssignment {
            self.shard
        }
    }

    #[derive(Default)]
    struct RecordingFactory {
        opened: parking_lot::Mutex<Vec<ShardAssignment>>,
        refused_shard: Option<u32>,
    }

    #[async_trait]
    impl ConnectionFactory for RecordingFactory {
        async fn open(&self, request: ConnectionRequest) -> Result<Arc<dyn Session>, ClientError> {
            tracing::info!("handshake");
            self.opened.lock().push(request.shard);
            if self.refused_shard == Some(request.shard.index()) {
                return Err(ClientError::Connection("handshake rejected".into()));
            }
            Ok(Arc::new(FakeSession {
                id: SessionId::new(),
                shard: request.shard,
            }))
        }
    }

    fn setup(current: u32, total: u32) -> (Arc<RecordingFactory>, ShardLoginOrchestrator) {
        let factory = Arc::new(RecordingFactory::default());
        let config = Arc::new(ShardConfig::new(ShardAssignment::new(current, total).unwrap()));
        let orchestrator = ShardLoginOrchestrator::new(factory.clone(), config);
        (factory, orchestrator)
    }

    fn request(shard: ShardAssignment) -> ConnectionRequest {
        ConnectionRequest {
            account_type: AccountType::Bot,
            credential: Credential::new("token"),
            shard,
            wait_for_servers_on_startup: true,
            proxy: ProxyConfig::default(),
            trust_all_certificates: false,
            endpoint: None,
            listeners: Vec::new(),
        }
    }

    #[allow(clippy::unnecessary_wraps)]
    fn ok_request(shard: ShardAssignment) -> Result<ConnectionRequest, ClientError> {
        Ok(request(shard))
    }

    #[tokio::test]
    async fn single_login_opens_requested_shard() {
        let (factory, orchestrator) = setup(0, 1);
        let session = orchestrator
            .login_shard(request(ShardAssignment::unsharded()))
            .await
            .unwrap();
        assert_eq!(session.shard(), ShardAssignment::unsharded());
        assert_eq!(factory.opened.lock().len(), 1);
    }

    #[tokio::test]
    async fn login_runs_inside_shard_span() {
        let (logs, _guard) = capture_logs();
        let (_factory, orchestrator) = setup(0, 3);
        let shard = ShardAssignment::new(1, 3).unwrap();

        let _ = orchestrator.login_shard(request(shard)).await.unwrap();

        let created = logs.matching("creating shard 2 of 3");
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].level, Level::DEBUG);
        assert_eq!(created[0].spans, vec!["shard".to_owned()]);
        assert_eq!(logs.matching("handshake")[0].spans, vec!["shard".to_owned()]);
    }

    #[tokio::test]
    async fn empty_batch_yields_nothing() {
        let (factory, orchestrator) = setup(0, 3);
        let pending = orchestrator.login_shards(&[], ok_request).unwrap();
        assert!(pending.is_empty());
        assert!(factory.opened.lock().is_empty());
    }

    #[tokio::test]
    async fn duplicate_batch_rejected() {
        let (factory, orchestrator) = setup(0, 3);
        assert_matches!(
            orchestrator.login_shards(&[0, 0], ok_request),
            Err(ClientError::Validation(ShardError::Duplicate { shard: 0 }))
        );
        tokio::task::yield_now().await;
        assert!(factory.opened.lock().is_empty());
    }

    #[tokio::test]
    async fn out_of_range_batch_rejected() {
        let (factory, orchestrator) = setup(0, 3);
        assert_matches!(
            orchestrator.login_shards(&[1, 5], ok_request),
            Err(ClientError::Validation(ShardError::OutOfRange { shard: 5, total: 3 }))
        );
        tokio::task::yield_now().await;
        assert!(factory.opened.lock().is_empty());
    }

    #[tokio::test]
    async fn duplicates_reported_before_range() {
        let (_factory, orchestrator) = setup(0, 3);
        assert_matches!(
            orchestrator.login_shards(&[7, 7], ok_request),
            Err(ClientError::Validation(ShardError::Duplicate { shard: 7 }))
        );
    }

    #[tokio::test]
    async fn batch_returns_handles_in_input_order() {
        let (factory, orchestrator) = setup(0, 4);
        let pending = orchestrator.login_shards(&[3, 0, 2], ok_request).unwrap();
        let order: Vec<u32> = pending.iter().map(|p| p.shard().index()).collect();
        assert_eq!(order, vec![3, 0, 2]);

        for p in pending {
            let shard = p.shard();
            assert_eq!(p.await.unwrap().shard(), shard);
        }
        let mut opened: Vec<u32> = factory.opened.lock().iter().map(|s| s.index()).collect();
        opened.sort_unstable();
        assert_eq!(opened, vec![0, 2, 3]);
        assert_eq!(orchestrator.config().current(), 0);
    }

    #[tokio::test]
    async fn pinned_client_fails_every_entry() {
        let (factory, orchestrator) = setup(1, 3);
        let pending = orchestrator.login_shards(&[0, 2], ok_request).unwrap();
        assert_eq!(pending.len(), 2);
        for p in pending {
            assert_matches!(p.await, Err(ClientError::Usage(msg)) if msg == PINNED_BATCH_MESSAGE);
        }
        assert!(factory.opened.lock().is_empty());
        assert_eq!(orchestrator.config().current(), 1);
    }

    #[tokio::test]
    async fn request_builder_errors_fail_only_that_shard() {
        let (factory, orchestrator) = setup(0, 3);
        let pending = orchestrator
            .login_shards(&[0, 1, 2], |shard| {
                if shard.index() == 1 {
                    Err(ClientError::Configuration("no token".into()))
                } else {
                    Ok(request(shard))
                }
            })
            .unwrap();

        let results: Vec<_> = futures::future::join_all(pending).await;
        assert!(results[0].is_ok());
        assert_matches!(results[1], Err(ClientError::Configuration(_)));
        assert!(results[2].is_ok());
        assert_eq!(factory.opened.lock().len(), 2);
        assert_eq!(orchestrator.config().current(), 0);
    }

    #[tokio::test]
    async fn mixed_batch_outcomes_leave_current_shard_alone() {
        let factory = Arc::new(RecordingFactory {
            refused_shard: Some(2),
            ..RecordingFactory::default()
        });
        let config = Arc::new(ShardConfig::new(ShardAssignment::new(0, 4).unwrap()));
        let orchestrator = ShardLoginOrchestrator::new(factory.clone(), Arc::clone(&config));

        let pending = orchestrator
            .login_shards(&[1, 2, 3], |shard| {
                if shard.index() == 3 {
                    Err(ClientError::Configuration("no token".into()))
                } else {
                    Ok(request(shard))
                }
            })
            .unwrap();
        assert_eq!(config.current(), 0);

        let results = futures::future::join_all(pending).await;
        assert_eq!(results[0].as_ref().unwrap().shard().index(), 1);
        assert_matches!(results[1], Err(ClientError::Connection(_)));
        assert_matches!(results[2], Err(ClientError::Configuration(_)));
        assert_eq!(factory.opened.lock().len(), 2);
        assert_eq!(config.current(), 0);
        assert_eq!(config.total(), 4);
    }

    #[tokio::test]
    async fn batch_logs_size() {
        let (logs, _guard) = capture_logs();
        let (_factory, orchestrator) = setup(0, 4);

        let _ = orchestrator.login_shards(&[0, 1, 2, 3], ok_request).unwrap();
        assert!(logs.has_event(Level::INFO, "creating 4 shards"));

        let _ = orchestrator.login_shards(&[1, 3], ok_request).unwrap();
        assert!(logs.has_event(Level::INFO, "creating 2 out of 4 shards ([1, 3])"));
    }

    #[tokio::test]
    async fn single_shard_batch_uses_singular() {
        let (logs, _guard) = capture_logs();
        let (_factory, orchestrator) = setup(0, 1);
        let _ = orchestrator.login_shards(&[0], ok_request).unwrap();
        assert!(logs.has_event(Level::INFO, "creating 1 shard"));
    }
}
