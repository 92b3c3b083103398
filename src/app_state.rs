//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::domain::{ConnectionRegistry, EventBus};
use crate::service::{IngestPipeline, SessionBridge, SyncManager};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
///
/// Every component is explicitly constructed at startup and passed by
/// handle; there is no process-wide mutable state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live device connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Session lifecycle orchestration.
    pub session_bridge: Arc<SessionBridge>,
    /// Streaming sensor ingest pipeline.
    pub ingest: Arc<IngestPipeline>,
    /// Local/remote reconciliation.
    pub sync: Arc<SyncManager>,
    /// UI notification bus.
    pub event_bus: EventBus,
    /// Startup configuration.
    pub config: Arc<BridgeConfig>,
}
