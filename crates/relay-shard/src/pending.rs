//! Handles returned by login and discovery calls.
//!
//! Work is spawned onto the Tokio runtime when the call is made, so the
//! handle can be awaited, dropped, or collected without blocking the caller.
//! Errors detected before any work starts are carried as already-failed
//! handles.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use relay_core::{ClientError, ShardAssignment};
use tokio::task::{JoinError, JoinHandle};

use crate::connection::Session;

enum Inner<T> {
    Spawned(JoinHandle<Result<T, ClientError>>),
    Failed(Option<ClientError>),
}

impl<T> Inner<T> {
    fn poll_result(&mut self, cx: &mut Context<'_>) -> Poll<Result<T, ClientError>> {
        match self {
            Self::Spawned(handle) => Pin::new(handle).poll(cx).map(flatten_join),
            Self::Failed(error) => Poll::Ready(Err(error
                .take()
                .unwrap_or_else(|| ClientError::Internal("polled after completion".into())))),
        }
    }

    fn is_finished(&self) -> bool {
        match self {
            Self::Spawned(handle) => handle.is_finished(),
            Self::Failed(_) => true,
        }
    }
}

fn flatten_join<T>(joined: Result<Result<T, ClientError>, JoinError>) -> Result<T, ClientError> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(ClientError::Internal(format!("task panicked: {e}"))),
        Err(e) => Err(ClientError::Internal(format!("task aborted: {e}"))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PendingLogin
// ─────────────────────────────────────────────────────────────────────────────

/// A shard login in flight. Resolves to the opened session.
pub struct PendingLogin {
    shard: ShardAssignment,
    inner: Inner<Arc<dyn Session>>,
}

impl PendingLogin {
    pub(crate) fn spawned(
        shard: ShardAssignment,
        handle: JoinHandle<Result<Arc<dyn Session>, ClientError>>,
    ) -> Self {
        Self {
            shard,
            inner: Inner::Spawned(handle),
        }
    }

    /// A login that failed before any connection was attempted.
    #[must_use]
    pub fn failed(shard: ShardAssignment, error: ClientError) -> Self {
        Self {
            shard,
            inner: Inner::Failed(Some(error)),
        }
    }

    /// The shard this login is for.
    pub fn shard(&self) -> ShardAssignment {
        self.shard
    }

    /// Whether the result is available without waiting.
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl Future for PendingLogin {
    type Output = Result<Arc<dyn Session>, ClientError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().inner.poll_result(cx)
    }
}

impl std::fmt::Debug for PendingLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLogin")
            .field("shard", &self.shard)
            .field("finished", &self.is_finished())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PendingDiscovery
// ─────────────────────────────────────────────────────────────────────────────

/// A recommended-shard lookup in flight.
///
/// Resolves to the new total shard count once it has been applied.
pub struct PendingDiscovery {
    inner: Inner<u32>,
}

impl PendingDiscovery {
    pub(crate) fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = Result<u32, ClientError>> + Send + 'static,
    {
        Self {
            inner: Inner::Spawned(tokio::spawn(work)),
        }
    }

    /// A lookup that failed before the first probe.
    #[must_use]
    pub fn failed(error: ClientError) -> Self {
        Self {
            inner: Inner::Failed(Some(error)),
        }
    }

    /// Whether the result is available without waiting.
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl Future for PendingDiscovery {
    type Output = Result<u32, ClientError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().inner.poll_result(cx)
    }
}

impl std::fmt::Debug for PendingDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingDiscovery")
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn failed_login_resolves_immediately() {
        let pending = PendingLogin::failed(
            ShardAssignment::unsharded(),
            ClientError::Usage("pinned".into()),
        );
        assert!(pending.is_finished());
        assert_matches!(pending.await, Err(ClientError::Usage(msg)) if msg == "pinned");
    }

    #[tokio::test]
    async fn spawned_discovery_yields_task_result() {
        let pending = PendingDiscovery::spawn(async { Ok(7) });
        assert_eq!(pending.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn panicking_task_becomes_internal_error() {
        let explode = true;
        let pending = PendingDiscovery::spawn(async move {
            assert!(!explode, "boom");
            Ok(0)
        });
        assert_matches!(pending.await, Err(ClientError::Internal(msg)) if msg.contains("panicked"));
    }

    #[tokio::test]
    async fn spawned_login_keeps_shard() {
        let shard = ShardAssignment::new(1, 2).unwrap();
        let handle = tokio::spawn(async {
            Err::<Arc<dyn Session>, _>(ClientError::Connection("refused".into()))
        });
        let pending = PendingLogin::spawned(shard, handle);
        assert_eq!(pending.shard(), shard);
        assert_matches!(pending.await, Err(ClientError::Connection(_)));
    }
}
