//! Streaming ingest pipeline for VR sensor frames.
//!
//! Each frame is persisted synchronously (raw data durability is the
//! hard guarantee), announced to the UI, and then handed to the scoring
//! collaborator without blocking the socket. Scoring fan-out is bounded
//! by a semaphore and tracked so shutdown can drain in-flight work.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

use super::scoring::Scorer;
use super::sync_manager::SyncManager;
use crate::domain::{EventBus, UiEvent, VrDataType};
use crate::error::BridgeError;
use crate::persistence::{AnalysisRow, LocalStore, SyncOpType, VrFrameRow};

/// Receives device sensor frames and fans them out to scoring.
#[derive(Debug)]
pub struct IngestPipeline {
    store: LocalStore,
    sync: Arc<SyncManager>,
    scorer: Arc<dyn Scorer>,
    event_bus: EventBus,
    tracker: TaskTracker,
    scoring_permits: Arc<Semaphore>,
}

impl IngestPipeline {
    /// Creates a new pipeline.
    ///
    /// `scoring_concurrency` caps how many scoring tasks may be in
    /// flight at once; excess frames wait for a permit inside their
    /// spawned task, never on the ingest path.
    #[must_use]
    pub fn new(
        store: LocalStore,
        sync: Arc<SyncManager>,
        scorer: Arc<dyn Scorer>,
        event_bus: EventBus,
        scoring_concurrency: usize,
    ) -> Self {
        Self {
            store,
            sync,
            scorer,
            event_bus,
            tracker: TaskTracker::new(),
            scoring_permits: Arc::new(Semaphore::new(scoring_concurrency.max(1))),
        }
    }

    /// Ingests one sensor frame.
    ///
    /// Persists the raw frame before returning; queues its remote sync;
    /// notifies the UI; and dispatches scoring asynchronously. Scoring
    /// results may complete out of order, which is fine — only the raw
    /// write is ordered with the socket.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] when the raw frame
    /// cannot be stored. No scoring task is spawned in that case.
    pub async fn ingest(
        &self,
        session_id: &str,
        data_type: VrDataType,
        timestamp: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Result<(), BridgeError> {
        let raw_data = serde_json::to_string(&payload)
            .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))?;
        let frame = VrFrameRow {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            timestamp,
            data_type: data_type.as_str().to_string(),
            raw_data,
            created_at: Utc::now(),
        };
        self.store.insert_vr_frame(&frame).await?;

        // The frame is durable locally; remote sync is best-effort here.
        if let Err(e) = self
            .sync
            .enqueue(
                SyncOpType::Insert,
                "vr_data",
                None,
                serde_json::to_value(&frame).unwrap_or_default(),
            )
            .await
        {
            tracing::warn!(frame_id = %frame.id, error = %e, "failed to queue frame for sync");
        }

        self.event_bus.publish(UiEvent::VrDataReceived {
            session_id: session_id.to_string(),
            timestamp,
            data_type,
            data: payload.clone(),
        });

        self.dispatch_scoring(session_id.to_string(), data_type, payload);
        Ok(())
    }

    /// Spawns the asynchronous scoring task for one frame.
    fn dispatch_scoring(&self, session_id: String, data_type: VrDataType, payload: serde_json::Value) {
        let store = self.store.clone();
        let sync = Arc::clone(&self.sync);
        let scorer = Arc::clone(&self.scorer);
        let event_bus = self.event_bus.clone();
        let permits = Arc::clone(&self.scoring_permits);

        self.tracker.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                // Semaphore closed: shutdown already past the drain point.
                return;
            };

            let analysis = scorer.analyze(data_type, &payload).await;
            let analysis_json = serde_json::to_value(&analysis).unwrap_or_default();

            let row = AnalysisRow {
                id: uuid::Uuid::new_v4().to_string(),
                session_id: session_id.clone(),
                model_version: analysis.model_version.clone(),
                analysis_result: analysis_json.to_string(),
                progress_score: analysis.score,
                confidence: analysis.confidence,
                recommendations: analysis.recommendations.clone(),
                anomalies: analysis
                    .anomalies
                    .as_ref()
                    .and_then(|a| serde_json::to_string(a).ok()),
                created_at: Utc::now(),
            };

            // Analysis is best-effort: a lost result is logged and dropped,
            // never retried, and never fails the ingest path.
            if let Err(e) = store.insert_analysis(&row).await {
                let err = BridgeError::ScoringFailure(e.to_string());
                tracing::error!(session_id = %session_id, error = %err, "dropping analysis result");
                return;
            }

            if let Err(e) = sync
                .enqueue(
                    SyncOpType::Insert,
                    "ai_analysis",
                    None,
                    serde_json::to_value(&row).unwrap_or_default(),
                )
                .await
            {
                tracing::warn!(analysis_id = %row.id, error = %e, "failed to queue analysis for sync");
            }

            event_bus.publish(UiEvent::VrDataProcessed {
                session_id,
                timestamp: Utc::now(),
                score: analysis.score,
                analysis: analysis_json,
            });
        });
    }

    /// Waits up to `timeout` for in-flight scoring tasks to finish.
    ///
    /// Called once during shutdown after the sockets are closed. Tasks
    /// still running when the timeout expires are abandoned; their
    /// results are best-effort anyway.
    pub async fn drain(&self, timeout: Duration) {
        self.tracker.close();
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            tracing::warn!(
                pending = self.tracker.len(),
                "scoring tasks still in flight at shutdown"
            );
        }
    }

    /// Returns the number of scoring tasks currently tracked.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::AnalysisResult;
    use crate::persistence::PostgrestRemote;
    use async_trait::async_trait;
    use serde_json::json;

    /// Scorer double with a fixed result.
    #[derive(Debug)]
    struct FixedScorer {
        score: f64,
    }

    #[async_trait]
    impl Scorer for FixedScorer {
        async fn analyze(
            &self,
            data_type: VrDataType,
            _payload: &serde_json::Value,
        ) -> AnalysisResult {
            AnalysisResult {
                model_version: "fixed-1.0.0".to_string(),
                score: self.score,
                confidence: 90.0,
                data_type,
                analyzed_at: Utc::now(),
                anomalies: None,
                recommendations: "test".to_string(),
            }
        }
    }

    async fn pipeline() -> (IngestPipeline, LocalStore, EventBus) {
        let Ok(store) = LocalStore::in_memory().await else {
            panic!("in-memory store failed");
        };
        // Unreachable remote: sync stays queued, which is fine here.
        let Ok(remote) = PostgrestRemote::new(
            "http://127.0.0.1:9",
            "test",
            Duration::from_millis(100),
        ) else {
            panic!("remote client failed");
        };
        let sync = Arc::new(SyncManager::new(store.clone(), Arc::new(remote)));
        let event_bus = EventBus::new(100);
        let ingest = IngestPipeline::new(
            store.clone(),
            sync,
            Arc::new(FixedScorer { score: 7.0 }),
            event_bus.clone(),
            4,
        );
        (ingest, store, event_bus)
    }

    #[tokio::test]
    async fn ingest_persists_exactly_one_raw_record() {
        let (ingest, store, _bus) = pipeline().await;

        let result = ingest
            .ingest("s1", VrDataType::Movement, Utc::now(), json!({"x": 1}))
            .await;
        assert!(result.is_ok());
        assert_eq!(store.frame_count("s1").await.ok(), Some(1));
    }

    #[tokio::test]
    async fn ingest_emits_received_event_before_returning() {
        let (ingest, _store, bus) = pipeline().await;
        let mut rx = bus.subscribe();

        let _ = ingest
            .ingest("s1", VrDataType::Gaze, Utc::now(), json!({"x": 1}))
            .await;

        let Ok(event) = rx.recv().await else {
            panic!("expected event");
        };
        assert_eq!(event.channel(), "vr-data-received");
    }

    #[tokio::test]
    async fn scoring_completion_persists_analysis_and_notifies() {
        let (ingest, store, bus) = pipeline().await;
        let mut rx = bus.subscribe();

        let _ = ingest
            .ingest("s1", VrDataType::Movement, Utc::now(), json!({"x": 1}))
            .await;

        // Drain the scoring task, then inspect its side effects.
        ingest.drain(Duration::from_secs(5)).await;
        assert_eq!(store.analysis_count("s1").await.ok(), Some(1));

        let Ok(first) = rx.recv().await else {
            panic!("expected received event");
        };
        assert_eq!(first.channel(), "vr-data-received");
        let Ok(second) = rx.recv().await else {
            panic!("expected processed event");
        };
        assert_eq!(second.channel(), "vr-data-processed");
    }

    #[tokio::test]
    async fn frames_for_multiple_sessions_do_not_block_each_other() {
        let (ingest, store, _bus) = pipeline().await;

        for i in 0..10 {
            let session = if i % 2 == 0 { "s1" } else { "s2" };
            let result = ingest
                .ingest(session, VrDataType::Interaction, Utc::now(), json!({ "i": i }))
                .await;
            assert!(result.is_ok());
        }

        assert_eq!(store.frame_count("s1").await.ok(), Some(5));
        assert_eq!(store.frame_count("s2").await.ok(), Some(5));

        ingest.drain(Duration::from_secs(5)).await;
        assert_eq!(store.analysis_count("s1").await.ok(), Some(5));
        assert_eq!(store.analysis_count("s2").await.ok(), Some(5));
    }
}
