//! neuro-bridge server entry point.
//!
//! Starts the Axum server with the device WebSocket endpoint, the UI
//! feed, and the REST API, plus the heartbeat and auto-sync timers.
//! Shutdown is sequential: stop the timers, close device sockets,
//! flush the sync queue once, drain in-flight scoring, close the store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use neuro_bridge::api;
use neuro_bridge::app_state::AppState;
use neuro_bridge::config::BridgeConfig;
use neuro_bridge::domain::{ConnectionRegistry, EventBus};
use neuro_bridge::persistence::{LocalStore, PostgrestRemote};
use neuro_bridge::service::{HeuristicScorer, IngestPipeline, SessionBridge, SyncManager};
use neuro_bridge::ws::handler::{device_ws_handler, ui_ws_handler};
use neuro_bridge::ws::heartbeat::run_heartbeat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = BridgeConfig::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    tracing::info!(addr = %config.listen_addr, "starting neuro-bridge");

    // Stores
    let store = LocalStore::connect(&config.sqlite_path)
        .await
        .context("opening local store")?;
    let remote = PostgrestRemote::new(
        &config.remote_base_url,
        &config.remote_api_key,
        Duration::from_secs(config.remote_timeout_secs),
    )
    .context("building remote store client")?;

    // Domain layer
    let registry = Arc::new(ConnectionRegistry::new());
    let event_bus = EventBus::new(config.event_bus_capacity);

    // Service layer
    let sync = Arc::new(SyncManager::new(store.clone(), Arc::new(remote)));
    let ingest = Arc::new(IngestPipeline::new(
        store.clone(),
        Arc::clone(&sync),
        Arc::new(HeuristicScorer::new()),
        event_bus.clone(),
        config.scoring_concurrency,
    ));
    let session_bridge = Arc::new(SessionBridge::new(
        Arc::clone(&registry),
        store.clone(),
        Arc::clone(&sync),
        event_bus.clone(),
    ));

    // First connectivity probe, informational only
    let online = sync.check_connection().await;
    tracing::info!(online, "remote store probe");

    let config = Arc::new(config);
    let app_state = AppState {
        registry: Arc::clone(&registry),
        session_bridge,
        ingest: Arc::clone(&ingest),
        sync: Arc::clone(&sync),
        event_bus: event_bus.clone(),
        config: Arc::clone(&config),
    };

    // Background timers
    let shutdown = CancellationToken::new();
    let heartbeat_task = tokio::spawn(run_heartbeat(
        Arc::clone(&registry),
        event_bus,
        Duration::from_secs(config.ping_interval_secs),
        shutdown.clone(),
    ));
    let sync_task = tokio::spawn(Arc::clone(&sync).run(
        Duration::from_secs(config.sync_interval_secs),
        shutdown.clone(),
    ));

    // Router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws/device", get(device_ws_handler))
        .route("/ws/ui", get(ui_ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Serve until ctrl-c
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            let registry = Arc::clone(&registry);
            async move {
                shutdown.cancelled().await;
                // Close device sockets so connection tasks can finish.
                registry.close_all().await;
            }
        })
        .await?;

    // Timers are already cancelled; flush once, drain scoring, close.
    let _ = heartbeat_task.await;
    let _ = sync_task.await;
    let outcome = sync.drain_queue().await;
    tracing::info!(?outcome, "final sync flush");
    ingest
        .drain(Duration::from_secs(config.shutdown_drain_timeout_secs))
        .await;
    store.close().await;
    tracing::info!("neuro-bridge stopped");

    Ok(())
}
