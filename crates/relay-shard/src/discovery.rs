//! Recommended shard count lookup with backoff.
//!
//! Each attempt opens a disposable probe session, asks for the recommended
//! shard count, and closes the session whatever the outcome. Failed attempts
//! are retried after [`BackoffConfig::delay_for`] until one succeeds or the
//! caller's [`CancellationToken`] fires. There is no attempt limit.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use relay_core::{BackoffConfig, ClientError, RetryState};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{ControlPlane, ProbeRequest, Recommendation};

/// Outcome of a successful lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// What the service recommended.
    pub recommendation: Recommendation,
    /// Failed attempts before the successful one.
    pub retries: u32,
}

/// Drives the probe/backoff loop against a [`ControlPlane`].
#[derive(Clone)]
pub struct ShardDiscovery {
    control_plane: Arc<dyn ControlPlane>,
    backoff: BackoffConfig,
}

impl ShardDiscovery {
    /// Create a discovery client.
    pub fn new(control_plane: Arc<dyn ControlPlane>, backoff: BackoffConfig) -> Self {
        Self {
            control_plane,
            backoff,
        }
    }

    /// Backoff parameters used between attempts.
    pub fn backoff(&self) -> &BackoffConfig {
        &self.backoff
    }

    /// One attempt: open a probe session, query it, close it.
    ///
    /// Every failure is reported as [`ClientError::Discovery`], including a
    /// panic inside the query. An opened session is closed exactly once.
    pub async fn probe_once(&self, request: &ProbeRequest) -> Result<Recommendation, ClientError> {
        let session = self
            .control_plane
            .open_probe(request.clone())
            .await
            .map_err(as_discovery)?;
        let result = match AssertUnwindSafe(session.recommended_shards())
            .catch_unwind()
            .await
        {
            Ok(answer) => answer.map_err(as_discovery),
            Err(_) => Err(ClientError::Discovery(
                "recommended shard query panicked".into(),
            )),
        };
        session.close().await;
        result
    }

    /// Probe until an attempt succeeds.
    ///
    /// `retry` is incremented on every failure and reset once an attempt
    /// succeeds. Returns [`ClientError::Cancelled`] if `cancel` fires before
    /// that; a probe already in flight is awaited first.
    pub async fn discover(
        &self,
        request: &ProbeRequest,
        retry: &RetryState,
        cancel: &CancellationToken,
    ) -> Result<DiscoveryReport, ClientError> {
        loop {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }

            match self.probe_once(request).await {
                Ok(recommendation) => {
                    let retries = retry.reset();
                    debug!(
                        shard_count = recommendation.shard_count,
                        endpoint = %recommendation.endpoint,
                        retries,
                        "recommended shard lookup succeeded"
                    );
                    return Ok(DiscoveryReport {
                        recommendation,
                        retries,
                    });
                }
                Err(e) => {
                    let attempt = retry.record_failure();
                    let delay = self.backoff.delay_for(attempt);
                    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    warn!(
                        error = %e,
                        category = e.category(),
                        attempt,
                        "recommended shard lookup failed"
                    );
                    info!(attempt, delay_ms, "retrying recommended shard lookup");

                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => {
                            debug!(attempt, "recommended shard lookup cancelled");
                            return Err(ClientError::Cancelled);
                        }
                    }
                }
            }
        }
    }
}

fn as_discovery(error: ClientError) -> ClientError {
    match error {
        ClientError::Discovery(_) => error,
        other => ClientError::Discovery(other.to_string()),
    }
}
