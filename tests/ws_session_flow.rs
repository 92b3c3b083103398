//! End-to-end device protocol scenario against a running bridge.

#![allow(clippy::panic)]
#![allow(clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use neuro_bridge::api;
use neuro_bridge::app_state::AppState;
use neuro_bridge::config::BridgeConfig;
use neuro_bridge::domain::{ConnectionRegistry, EventBus};
use neuro_bridge::persistence::{LocalStore, RemoteError, RemoteStore};
use neuro_bridge::service::{HeuristicScorer, IngestPipeline, SessionBridge, SyncManager};
use neuro_bridge::ws::handler::{device_ws_handler, ui_ws_handler};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Remote store double that is always offline, so every queued
/// operation stays in the durable queue.
#[derive(Debug)]
struct OfflineRemote;

#[async_trait]
impl RemoteStore for OfflineRemote {
    async fn health_check(&self) -> Result<(), RemoteError> {
        Err(RemoteError::Unavailable("test remote is offline".to_string()))
    }

    async fn insert(&self, _table: &str, _row: &Value) -> Result<(), RemoteError> {
        Err(RemoteError::Unavailable("test remote is offline".to_string()))
    }

    async fn update(&self, _table: &str, _row_id: &str, _changes: &Value) -> Result<(), RemoteError> {
        Err(RemoteError::Unavailable("test remote is offline".to_string()))
    }

    async fn delete(&self, _table: &str, _row_id: &str) -> Result<(), RemoteError> {
        Err(RemoteError::Unavailable("test remote is offline".to_string()))
    }

    async fn select_by_id(&self, _table: &str, _row_id: &str) -> Result<Option<Value>, RemoteError> {
        Err(RemoteError::Unavailable("test remote is offline".to_string()))
    }
}

struct TestBridge {
    addr: std::net::SocketAddr,
    store: LocalStore,
    sync: Arc<SyncManager>,
    ingest: Arc<IngestPipeline>,
    _db_dir: tempfile::TempDir,
}

async fn start_bridge() -> TestBridge {
    let db_dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir failed"));
    let db_path = db_dir.path().join("bridge.db");
    let store = LocalStore::connect(&db_path.to_string_lossy())
        .await
        .unwrap_or_else(|e| panic!("store failed: {e}"));

    let registry = Arc::new(ConnectionRegistry::new());
    let event_bus = EventBus::new(1024);
    let sync = Arc::new(SyncManager::new(store.clone(), Arc::new(OfflineRemote)));
    let ingest = Arc::new(IngestPipeline::new(
        store.clone(),
        Arc::clone(&sync),
        Arc::new(HeuristicScorer::new()),
        event_bus.clone(),
        8,
    ));
    let session_bridge = Arc::new(SessionBridge::new(
        Arc::clone(&registry),
        store.clone(),
        Arc::clone(&sync),
        event_bus.clone(),
    ));

    let config = BridgeConfig::from_env().unwrap_or_else(|e| panic!("config failed: {e}"));
    let state = AppState {
        registry,
        session_bridge,
        ingest: Arc::clone(&ingest),
        sync: Arc::clone(&sync),
        event_bus,
        config: Arc::new(config),
    };

    let app = Router::new()
        .merge(api::build_router())
        .route("/ws/device", get(device_ws_handler))
        .route("/ws/ui", get(ui_ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|e| panic!("bind failed: {e}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|e| panic!("local addr failed: {e}"));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestBridge {
        addr,
        store,
        sync,
        ingest,
        _db_dir: db_dir,
    }
}

async fn connect_device(addr: std::net::SocketAddr) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{addr}/ws/device"))
        .await
        .unwrap_or_else(|e| panic!("ws connect failed: {e}"));
    ws
}

/// Reads frames until the next text frame, parsed as JSON.
async fn next_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for frame"))
            .unwrap_or_else(|| panic!("connection closed"))
            .unwrap_or_else(|e| panic!("ws error: {e}"));
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str())
                .unwrap_or_else(|e| panic!("bad frame json: {e}"));
        }
    }
}

async fn send_json(ws: &mut WsClient, value: &Value) {
    let text = value.to_string();
    ws.send(Message::Text(text.into()))
        .await
        .unwrap_or_else(|e| panic!("send failed: {e}"));
}

/// Polls until `probe` reports the expected count or the deadline hits.
async fn wait_for_count<F, Fut>(expected: i64, probe: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = i64>,
{
    for _ in 0..100 {
        if probe().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("count never reached {expected}");
}

#[tokio::test]
async fn full_session_lifecycle_over_websocket() {
    let bridge = start_bridge().await;
    let mut ws = connect_device(bridge.addr).await;

    // Greeting ACK on connect.
    let greeting = next_json(&mut ws).await;
    assert_eq!(greeting["type"], "ACK");

    // Create a session over REST; the device hears SESSION_START.
    let http = reqwest::Client::new();
    let response = http
        .post(format!("http://{}/api/v1/sessions", bridge.addr))
        .json(&json!({"patientId": "p1", "doctorId": "d1", "gameId": "g1"}))
        .send()
        .await
        .unwrap_or_else(|e| panic!("create session failed: {e}"));
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response
        .json()
        .await
        .unwrap_or_else(|e| panic!("bad body: {e}"));
    assert_eq!(body["success"], true);
    let session_id = body["data"]["id"]
        .as_str()
        .unwrap_or_else(|| panic!("missing session id"))
        .to_string();

    let broadcast = next_json(&mut ws).await;
    assert_eq!(broadcast["type"], "SESSION_START");
    assert_eq!(broadcast["sessionId"], session_id.as_str());
    assert_eq!(broadcast["patientId"], "p1");

    // Device binds to the session.
    send_json(
        &mut ws,
        &json!({"type": "SESSION_START", "sessionId": session_id, "patientId": "p1", "gameId": "g1"}),
    )
    .await;
    let ack = next_json(&mut ws).await;
    assert_eq!(ack["type"], "ACK");
    assert_eq!(ack["sessionId"], session_id.as_str());

    // Stream ten sensor frames.
    for i in 0..10 {
        send_json(
            &mut ws,
            &json!({
                "type": "VR_DATA",
                "sessionId": session_id,
                "timestamp": "2025-03-01T10:00:00Z",
                "dataType": "MOVEMENT",
                "data": {"sample": i},
            }),
        )
        .await;
    }

    // All ten raw records are persisted and ten scoring calls dispatch.
    let store = bridge.store.clone();
    let sid = session_id.clone();
    wait_for_count(10, || {
        let store = store.clone();
        let sid = sid.clone();
        async move { store.frame_count(&sid).await.unwrap_or(0) }
    })
    .await;
    wait_for_count(10, || {
        let store = store.clone();
        let sid = sid.clone();
        async move { store.analysis_count(&sid).await.unwrap_or(0) }
    })
    .await;

    // An unrecognized type gets exactly one ERROR and the connection
    // stays usable: a heartbeat still round-trips afterwards.
    send_json(&mut ws, &json!({"type": "CALIBRATE", "foo": "bar"})).await;
    let error = next_json(&mut ws).await;
    assert_eq!(error["type"], "ERROR");
    assert!(
        error["message"]
            .as_str()
            .unwrap_or_default()
            .contains("CALIBRATE")
    );

    send_json(&mut ws, &json!({"type": "HEARTBEAT"})).await;
    let heartbeat_ack = next_json(&mut ws).await;
    assert_eq!(heartbeat_ack["type"], "ACK");
    assert!(heartbeat_ack["timestamp"].is_string());

    // Complete the session from the device.
    send_json(
        &mut ws,
        &json!({"type": "SESSION_END", "sessionId": session_id, "duration": 10, "summary": {"notes": "done"}}),
    )
    .await;
    let end_ack = next_json(&mut ws).await;
    assert_eq!(end_ack["type"], "ACK");
    assert_eq!(end_ack["sessionId"], session_id.as_str());

    let response = http
        .get(format!(
            "http://{}/api/v1/sessions/{session_id}",
            bridge.addr
        ))
        .send()
        .await
        .unwrap_or_else(|e| panic!("get session failed: {e}"));
    let body: Value = response
        .json()
        .await
        .unwrap_or_else(|e| panic!("bad body: {e}"));
    assert_eq!(body["data"]["status"], "COMPLETED");

    // Everything written while offline is waiting in the sync queue:
    // 1 session insert + 10 frames + 10 analyses + 1 session update.
    let sync = Arc::clone(&bridge.sync);
    wait_for_count(22, || {
        let sync = Arc::clone(&sync);
        async move { sync.queue_len().await.unwrap_or(0) }
    })
    .await;

    // Offline drain leaves the queue untouched and does not error.
    let _ = bridge.sync.drain_queue().await;
    assert_eq!(bridge.sync.queue_len().await.unwrap_or(0), 22);

    bridge.ingest.drain(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn malformed_frames_get_error_replies_and_connection_survives() {
    let bridge = start_bridge().await;
    let mut ws = connect_device(bridge.addr).await;
    let _greeting = next_json(&mut ws).await;

    // Not JSON at all.
    ws.send(Message::Text("{not json".into()))
        .await
        .unwrap_or_else(|e| panic!("send failed: {e}"));
    let error = next_json(&mut ws).await;
    assert_eq!(error["type"], "ERROR");

    // Valid JSON without a type.
    send_json(&mut ws, &json!({"sessionId": "s1"})).await;
    let error = next_json(&mut ws).await;
    assert_eq!(error["type"], "ERROR");

    // The same connection still serves valid traffic.
    send_json(&mut ws, &json!({"type": "HEARTBEAT"})).await;
    let ack = next_json(&mut ws).await;
    assert_eq!(ack["type"], "ACK");
}

#[tokio::test]
async fn ui_feed_receives_connection_events() {
    let bridge = start_bridge().await;

    let (mut ui_ws, _) = connect_async(format!("ws://{}/ws/ui", bridge.addr))
        .await
        .unwrap_or_else(|e| panic!("ui ws connect failed: {e}"));

    // A device connecting shows up on the UI feed.
    let mut device_ws = connect_device(bridge.addr).await;
    let _greeting = next_json(&mut device_ws).await;

    let event = tokio::time::timeout(Duration::from_secs(5), ui_ws.next())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for ui event"))
        .unwrap_or_else(|| panic!("ui feed closed"))
        .unwrap_or_else(|e| panic!("ui ws error: {e}"));
    let Message::Text(text) = event else {
        panic!("expected text event");
    };
    let event: Value =
        serde_json::from_str(text.as_str()).unwrap_or_else(|e| panic!("bad event json: {e}"));
    assert_eq!(event["event"], "unity-connected");
    assert!(event["clientId"].is_string());
}
