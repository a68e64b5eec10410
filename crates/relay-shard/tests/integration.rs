//! End-to-end: discovery, batch login, and events from fake sessions
//! flowing into an application pipeline.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use assert_matches::assert_matches;
use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::{
    ClientError, GatewayEvent, ListenerCategory, SessionId, ShardAssignment, ShardError,
};
use relay_pipeline::{Listener, Pipeline};
use relay_shard::{
    ClientBuilder, ConnectionFactory, ConnectionRequest, ControlPlane, ProbeRequest, ProbeSession,
    Recommendation, Session,
};
use serde_json::json;

// ── Fakes ───────────────────────────────────────────────────────────────────

struct FakeSession {
    id: SessionId,
    shard: ShardAssignment,
    listeners: Vec<(ListenerCategory, Listener)>,
}

impl FakeSession {
    /// Deliver an event the way a real session would after decoding a frame.
    fn receive(&self, category: ListenerCategory, payload: serde_json::Value) {
        let event = GatewayEvent::new(category, self.shard.index(), payload);
        for (_, listener) in self.listeners.iter().filter(|(c, _)| *c == category) {
            listener.accept(&event);
        }
    }
}

impl std::fmt::Debug for FakeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeSession")
            .field("id", &self.id)
            .field("shard", &self.shard)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Session for FakeSession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    fn shard(&self) -> ShardAssignment {
        self.shard
    }
}

/// Connection factory and control plane in one.
#[derive(Default)]
struct FakeGateway {
    sessions: Mutex<Vec<Arc<FakeSession>>>,
    endpoints: Mutex<Vec<Option<String>>>,
    answers: Mutex<VecDeque<Result<Recommendation, ClientError>>>,
    probes_closed: Arc<AtomicU32>,
}

impl FakeGateway {
    fn session(&self, shard: u32) -> Arc<FakeSession> {
        let sessions = self.sessions.lock();
        let found = sessions.iter().find(|s| s.shard.index() == shard).unwrap();
        Arc::clone(found)
    }
}

#[async_trait]
impl ConnectionFactory for FakeGateway {
    async fn open(&self, request: ConnectionRequest) -> Result<Arc<dyn Session>, ClientError> {
        let session = Arc::new(FakeSession {
            id: SessionId::new(),
            shard: request.shard,
            listeners: request.listeners,
        });
        self.endpoints.lock().push(request.endpoint);
        self.sessions.lock().push(Arc::clone(&session));
        Ok(session)
    }
}

struct FakeProbe {
    answer: Mutex<Option<Result<Recommendation, ClientError>>>,
    closed: Arc<AtomicU32>,
}

#[async_trait]
impl ProbeSession for FakeProbe {
    async fn recommended_shards(&self) -> Result<Recommendation, ClientError> {
        self.answer
            .lock()
            .take()
            .unwrap_or_else(|| Err(ClientError::Discovery("no answer".into())))
    }

    async fn close(&self) {
        let _ = self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ControlPlane for FakeGateway {
    async fn open_probe(&self, _request: ProbeRequest) -> Result<Box<dyn ProbeSession>, ClientError> {
        let answer = self
            .answers
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Discovery("gateway busy".into())));
        Ok(Box::new(FakeProbe {
            answer: Mutex::new(Some(answer)),
            closed: Arc::clone(&self.probes_closed),
        }))
    }
}

fn client() -> (Arc<FakeGateway>, ClientBuilder) {
    let gateway = Arc::new(FakeGateway::default());
    let builder = ClientBuilder::new(gateway.clone(), gateway.clone());
    builder.set_credential("integration-token");
    (gateway, builder)
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn discover_login_all_and_route_events() {
    let (gateway, builder) = client();
    gateway.answers.lock().extend([
        Err(ClientError::Discovery("busy".into())),
        Err(ClientError::Discovery("busy".into())),
        Ok(Recommendation {
            endpoint: "wss://gateway.example/v10".into(),
            shard_count: 3,
        }),
    ]);

    let received = Arc::new(Mutex::new(Vec::new()));
    let root = Pipeline::<GatewayEvent, GatewayEvent>::start();
    let sink = Arc::clone(&received);
    root.flat_map(|event: &GatewayEvent| event.i64_field("value"))
        .filter(|n: &i64| n % 2 == 0)
        .map(|n: &i64| n * 10)
        .consume(move |n: &i64| sink.lock().push(*n));
    builder.add_pipeline(ListenerCategory::MessageCreate, &root);

    let total = builder.set_recommended_total_shards().await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(gateway.probes_closed.load(Ordering::SeqCst), 3);

    let pending = builder.login_all_shards().unwrap();
    let sessions = futures::future::try_join_all(pending).await.unwrap();
    let shards: Vec<u32> = sessions.iter().map(|s| s.shard().index()).collect();
    assert_eq!(shards, vec![0, 1, 2]);
    assert!(
        gateway
            .endpoints
            .lock()
            .iter()
            .all(|e| e.as_deref() == Some("wss://gateway.example/v10"))
    );

    for (shard, value) in [(0, 1), (1, 2), (2, 3), (0, 4)] {
        gateway
            .session(shard)
            .receive(ListenerCategory::MessageCreate, json!({ "value": value }));
    }
    gateway
        .session(1)
        .receive(ListenerCategory::MessageDelete, json!({ "value": 6 }));
    gateway
        .session(2)
        .receive(ListenerCategory::MessageCreate, json!({ "text": "no value" }));

    assert_eq!(*received.lock(), vec![20, 40]);
}

#[tokio::test]
async fn listeners_added_later_only_reach_later_sessions() {
    let (gateway, builder) = client();
    builder.set_total_shards(2).unwrap();

    let early = Arc::new(AtomicU32::new(0));
    let early_root = Pipeline::<GatewayEvent, GatewayEvent>::start();
    let counter = Arc::clone(&early);
    early_root.consume(move |_: &GatewayEvent| {
        let _ = counter.fetch_add(1, Ordering::SeqCst);
    });
    builder.add_pipeline(ListenerCategory::ServerJoin, &early_root);

    let _ = builder.login_shards(&[0]).unwrap().remove(0).await.unwrap();

    let late = Arc::new(AtomicU32::new(0));
    let late_root = Pipeline::<GatewayEvent, GatewayEvent>::start();
    let counter = Arc::clone(&late);
    late_root.consume(move |_: &GatewayEvent| {
        let _ = counter.fetch_add(1, Ordering::SeqCst);
    });
    builder.add_pipeline(ListenerCategory::ServerJoin, &late_root);

    let _ = builder.login_shards(&[1]).unwrap().remove(0).await.unwrap();

    gateway.session(0).receive(ListenerCategory::ServerJoin, json!({}));
    gateway.session(1).receive(ListenerCategory::ServerJoin, json!({}));

    assert_eq!(early.load(Ordering::SeqCst), 2);
    assert_eq!(late.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_batches_open_nothing() {
    let (gateway, builder) = client();
    builder.set_total_shards(3).unwrap();

    assert!(builder.login_shards(&[]).unwrap().is_empty());
    assert_matches!(
        builder.login_shards(&[0, 0]),
        Err(ClientError::Validation(ShardError::Duplicate { shard: 0 }))
    );
    assert_matches!(
        builder.login_shards(&[5]),
        Err(ClientError::Validation(ShardError::OutOfRange { shard: 5, total: 3 }))
    );

    tokio::task::yield_now().await;
    assert!(gateway.sessions.lock().is_empty());
    assert_eq!(builder.current_shard(), 0);
}

#[tokio::test]
async fn pinned_client_logs_in_alone() {
    let (gateway, builder) = client();
    builder.set_total_shards(3).unwrap();
    builder.set_current_shard(2).unwrap();

    for pending in builder.login_all_shards().unwrap() {
        assert_matches!(pending.await, Err(ClientError::Usage(_)));
    }
    assert_eq!(builder.current_shard(), 2);

    let session = builder.login().await.unwrap();
    assert_eq!(session.shard(), ShardAssignment::new(2, 3).unwrap());
    assert_eq!(gateway.sessions.lock().len(), 1);
}
