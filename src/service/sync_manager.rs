//! Durable sync queue and remote reconciliation.
//!
//! [`SyncManager`] keeps every local write that must reach the remote
//! store in a durable queue and replays it when connectivity allows.
//! Delivery is at-least-once: a failed operation stays queued, in its
//! original relative order, until a later drain cycle succeeds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::DateTime;
use tokio_util::sync::CancellationToken;

use crate::error::BridgeError;
use crate::persistence::{LocalStore, QueuedOperation, RemoteError, RemoteStore, SyncOpType};

/// Counters from one drain cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    /// Operations attempted this cycle.
    pub attempted: usize,
    /// Operations replayed and removed from the queue.
    pub synced: usize,
    /// Operations that failed and remain queued.
    pub failed: usize,
}

/// Outcome of a [`SyncManager::drain_queue`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// A cycle ran; see the report.
    Drained(DrainReport),
    /// The queue was empty, nothing to do.
    Empty,
    /// The remote is unreachable; the queue was left untouched.
    Offline,
    /// Another drain cycle is already running.
    AlreadyRunning,
}

/// Reconciles the local store with the remote backing store.
///
/// # Concurrency
///
/// `is_syncing` is a compare-and-swap gate: at most one drain cycle
/// runs at a time system-wide, no matter how many timers or shutdown
/// paths call [`SyncManager::drain_queue`] concurrently.
#[derive(Debug)]
pub struct SyncManager {
    store: LocalStore,
    remote: Arc<dyn RemoteStore>,
    is_syncing: AtomicBool,
    is_online: AtomicBool,
}

impl SyncManager {
    /// Creates a new sync manager over the given stores.
    #[must_use]
    pub fn new(store: LocalStore, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            remote,
            is_syncing: AtomicBool::new(false),
            is_online: AtomicBool::new(true),
        }
    }

    /// Probes remote reachability and updates the cached flag.
    ///
    /// Never fails: any probe error degrades to `false`.
    pub async fn check_connection(&self) -> bool {
        let online = self.remote.health_check().await.is_ok();
        self.is_online.store(online, Ordering::Relaxed);
        online
    }

    /// Returns the last observed connectivity state.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.is_online.load(Ordering::Relaxed)
    }

    /// Appends an operation to the durable queue.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] if the queue write
    /// fails; callers on fire-and-forget paths log and continue.
    pub async fn enqueue(
        &self,
        op_type: SyncOpType,
        table: &str,
        row_id: Option<String>,
        payload: serde_json::Value,
    ) -> Result<(), BridgeError> {
        let op = QueuedOperation::new(op_type, table, row_id, payload);
        self.store.enqueue_operation(&op).await?;
        tracing::debug!(op_id = %op.id, op = op.op_type.as_str(), table, "queued sync operation");
        Ok(())
    }

    /// Returns the number of queued operations.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] on database failure.
    pub async fn queue_len(&self) -> Result<i64, BridgeError> {
        self.store.queue_len().await
    }

    /// Runs one drain cycle unless one is already running.
    ///
    /// Re-checks connectivity first; when offline the queue is left
    /// untouched. Otherwise replays queued operations in enqueue order.
    /// Successes are removed; a failure keeps its operation queued and
    /// never aborts the rest of the batch.
    pub async fn drain_queue(&self) -> DrainOutcome {
        if self
            .is_syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return DrainOutcome::AlreadyRunning;
        }

        let outcome = self.drain_cycle().await;
        self.is_syncing.store(false, Ordering::Release);
        outcome
    }

    async fn drain_cycle(&self) -> DrainOutcome {
        let ops = match self.store.pending_operations().await {
            Ok(ops) => ops,
            Err(e) => {
                tracing::error!(error = %e, "failed to load sync queue");
                return DrainOutcome::Empty;
            }
        };
        if ops.is_empty() {
            return DrainOutcome::Empty;
        }

        tracing::info!(queued = ops.len(), "processing sync queue");

        if !self.check_connection().await {
            tracing::warn!("offline - sync queue will be processed when connection is restored");
            return DrainOutcome::Offline;
        }

        let mut report = DrainReport {
            attempted: ops.len(),
            ..DrainReport::default()
        };

        for op in &ops {
            match self.replay(op).await {
                Ok(()) => {
                    if let Err(e) = self.store.delete_operation(&op.id).await {
                        tracing::error!(op_id = %op.id, error = %e, "synced but failed to dequeue");
                        report.failed += 1;
                    } else {
                        report.synced += 1;
                        tracing::debug!(op_id = %op.id, "synced operation");
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    let err = BridgeError::OperationSyncFailure {
                        operation_id: op.id.clone(),
                        reason: e.to_string(),
                    };
                    tracing::warn!(op_id = %op.id, error = %err, "sync operation failed, kept queued");
                }
            }
        }

        tracing::info!(
            synced = report.synced,
            failed = report.failed,
            "sync cycle completed"
        );
        DrainOutcome::Drained(report)
    }

    async fn replay(&self, op: &QueuedOperation) -> Result<(), RemoteError> {
        match op.op_type {
            SyncOpType::Insert => self.remote.insert(&op.table_name, &op.payload).await,
            SyncOpType::Update => {
                let Some(row_id) = op.row_id.as_deref() else {
                    return Err(RemoteError::Rejected {
                        status: 400,
                        body: "UPDATE operation missing row id".to_string(),
                    });
                };
                self.remote.update(&op.table_name, row_id, &op.payload).await
            }
            SyncOpType::Delete => {
                let Some(row_id) = op.row_id.as_deref() else {
                    return Err(RemoteError::Rejected {
                        status: 400,
                        body: "DELETE operation missing row id".to_string(),
                    });
                };
                self.remote.delete(&op.table_name, row_id).await
            }
        }
    }

    /// Picks the more recent of two records by their `updatedAt` field.
    ///
    /// Last-write-wins: the remote record is chosen only when its
    /// timestamp is strictly newer. Ties, and records whose `updatedAt`
    /// is missing or unparseable, keep the local record.
    #[must_use]
    pub fn resolve_conflict<'a>(
        local: &'a serde_json::Value,
        remote: &'a serde_json::Value,
    ) -> &'a serde_json::Value {
        let updated_at = |record: &serde_json::Value| {
            record
                .get("updatedAt")
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        };

        match (updated_at(local), updated_at(remote)) {
            (Some(local_ts), Some(remote_ts)) if remote_ts > local_ts => remote,
            _ => local,
        }
    }

    /// Timer loop: drains the queue every `interval` until `shutdown`
    /// fires. The final flush at shutdown is the caller's job so it can
    /// sequence it before closing the store.
    pub async fn run(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately; skip it so startup isn't a drain.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.drain_queue().await;
                }
                () = shutdown.cancelled() => {
                    tracing::debug!("auto-sync stopped");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Scriptable remote store double.
    #[derive(Debug, Default)]
    struct MockRemote {
        online: AtomicBool,
        /// Tables whose writes fail with a rejection.
        failing_tables: Mutex<HashSet<String>>,
        inserts: Mutex<Vec<(String, serde_json::Value)>>,
        updates: Mutex<Vec<(String, String)>>,
        deletes: Mutex<Vec<(String, String)>>,
    }

    impl MockRemote {
        fn online() -> Self {
            let remote = Self::default();
            remote.online.store(true, Ordering::Relaxed);
            remote
        }

        fn fail_table(&self, table: &str) {
            if let Ok(mut tables) = self.failing_tables.lock() {
                tables.insert(table.to_string());
            }
        }

        fn heal_table(&self, table: &str) {
            if let Ok(mut tables) = self.failing_tables.lock() {
                tables.remove(table);
            }
        }

        fn check_table(&self, table: &str) -> Result<(), RemoteError> {
            let failing = self
                .failing_tables
                .lock()
                .map(|tables| tables.contains(table))
                .unwrap_or(false);
            if failing {
                Err(RemoteError::Rejected {
                    status: 500,
                    body: "scripted failure".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RemoteStore for MockRemote {
        async fn health_check(&self) -> Result<(), RemoteError> {
            if self.online.load(Ordering::Relaxed) {
                Ok(())
            } else {
                Err(RemoteError::Unavailable("scripted offline".to_string()))
            }
        }

        async fn insert(&self, table: &str, row: &serde_json::Value) -> Result<(), RemoteError> {
            self.check_table(table)?;
            if let Ok(mut inserts) = self.inserts.lock() {
                inserts.push((table.to_string(), row.clone()));
            }
            Ok(())
        }

        async fn update(
            &self,
            table: &str,
            row_id: &str,
            _changes: &serde_json::Value,
        ) -> Result<(), RemoteError> {
            self.check_table(table)?;
            if let Ok(mut updates) = self.updates.lock() {
                updates.push((table.to_string(), row_id.to_string()));
            }
            Ok(())
        }

        async fn delete(&self, table: &str, row_id: &str) -> Result<(), RemoteError> {
            self.check_table(table)?;
            if let Ok(mut deletes) = self.deletes.lock() {
                deletes.push((table.to_string(), row_id.to_string()));
            }
            Ok(())
        }

        async fn select_by_id(
            &self,
            _table: &str,
            _row_id: &str,
        ) -> Result<Option<serde_json::Value>, RemoteError> {
            Ok(None)
        }
    }

    async fn manager_with(remote: Arc<MockRemote>) -> SyncManager {
        let Ok(store) = LocalStore::in_memory().await else {
            panic!("in-memory store failed");
        };
        SyncManager::new(store, remote)
    }

    #[tokio::test]
    async fn drain_empty_queue_is_noop() {
        let manager = manager_with(Arc::new(MockRemote::online())).await;
        assert_eq!(manager.drain_queue().await, DrainOutcome::Empty);
    }

    #[tokio::test]
    async fn successful_drain_empties_queue() {
        let remote = Arc::new(MockRemote::online());
        let manager = manager_with(Arc::clone(&remote)).await;

        let result = manager
            .enqueue(SyncOpType::Insert, "vr_data", None, json!({"id": "f1"}))
            .await;
        assert!(result.is_ok());

        let outcome = manager.drain_queue().await;
        assert_eq!(
            outcome,
            DrainOutcome::Drained(DrainReport {
                attempted: 1,
                synced: 1,
                failed: 0
            })
        );
        assert_eq!(manager.queue_len().await.ok(), Some(0));

        let inserted = remote.inserts.lock().map(|v| v.len()).unwrap_or(0);
        assert_eq!(inserted, 1);
    }

    #[tokio::test]
    async fn offline_drain_leaves_queue_untouched() {
        let remote = Arc::new(MockRemote::default());
        let manager = manager_with(Arc::clone(&remote)).await;

        let _ = manager
            .enqueue(SyncOpType::Insert, "vr_data", None, json!({"id": "f1"}))
            .await;

        assert_eq!(manager.drain_queue().await, DrainOutcome::Offline);
        assert_eq!(manager.queue_len().await.ok(), Some(1));
        assert!(!manager.is_online());
    }

    #[tokio::test]
    async fn failed_operation_stays_queued_and_retries() {
        let remote = Arc::new(MockRemote::online());
        let manager = manager_with(Arc::clone(&remote)).await;

        remote.fail_table("vr_data");
        let _ = manager
            .enqueue(SyncOpType::Insert, "vr_data", None, json!({"id": "f1"}))
            .await;

        let outcome = manager.drain_queue().await;
        assert_eq!(
            outcome,
            DrainOutcome::Drained(DrainReport {
                attempted: 1,
                synced: 0,
                failed: 1
            })
        );
        assert_eq!(manager.queue_len().await.ok(), Some(1));

        // Next cycle succeeds once the remote heals.
        remote.heal_table("vr_data");
        let outcome = manager.drain_queue().await;
        assert_eq!(
            outcome,
            DrainOutcome::Drained(DrainReport {
                attempted: 1,
                synced: 1,
                failed: 0
            })
        );
        assert_eq!(manager.queue_len().await.ok(), Some(0));
    }

    #[tokio::test]
    async fn failure_does_not_abort_batch_and_preserves_order() {
        let remote = Arc::new(MockRemote::online());
        let manager = manager_with(Arc::clone(&remote)).await;

        remote.fail_table("therapy_sessions");
        let _ = manager
            .enqueue(
                SyncOpType::Update,
                "therapy_sessions",
                Some("s1".to_string()),
                json!({"status": "COMPLETED"}),
            )
            .await;
        let _ = manager
            .enqueue(SyncOpType::Insert, "vr_data", None, json!({"id": "f1"}))
            .await;

        let outcome = manager.drain_queue().await;
        assert_eq!(
            outcome,
            DrainOutcome::Drained(DrainReport {
                attempted: 2,
                synced: 1,
                failed: 1
            })
        );

        // The failed UPDATE is still first in line for the next cycle.
        let Ok(ops) = manager.store.pending_operations().await else {
            panic!("load failed");
        };
        assert_eq!(ops.len(), 1);
        assert_eq!(ops.first().map(|op| op.op_type), Some(SyncOpType::Update));
    }

    #[tokio::test]
    async fn update_without_row_id_is_kept_for_retry() {
        let remote = Arc::new(MockRemote::online());
        let manager = manager_with(remote).await;

        let _ = manager
            .enqueue(SyncOpType::Update, "therapy_sessions", None, json!({}))
            .await;

        let outcome = manager.drain_queue().await;
        assert_eq!(
            outcome,
            DrainOutcome::Drained(DrainReport {
                attempted: 1,
                synced: 0,
                failed: 1
            })
        );
        assert_eq!(manager.queue_len().await.ok(), Some(1));
    }

    #[test]
    fn resolve_conflict_picks_strictly_newer_remote() {
        let local = json!({"id": "r1", "updatedAt": "2025-03-01T10:00:00Z"});
        let remote = json!({"id": "r1", "updatedAt": "2025-03-01T11:00:00Z"});
        let winner = SyncManager::resolve_conflict(&local, &remote);
        assert_eq!(winner, &remote);
    }

    #[test]
    fn resolve_conflict_tie_keeps_local() {
        let local = json!({"id": "r1", "updatedAt": "2025-03-01T10:00:00Z", "side": "local"});
        let remote = json!({"id": "r1", "updatedAt": "2025-03-01T10:00:00Z", "side": "remote"});
        let winner = SyncManager::resolve_conflict(&local, &remote);
        assert_eq!(winner.get("side").and_then(|v| v.as_str()), Some("local"));
    }

    #[test]
    fn resolve_conflict_unparseable_remote_keeps_local() {
        let local = json!({"id": "r1", "updatedAt": "2025-03-01T10:00:00Z"});
        let remote = json!({"id": "r1", "updatedAt": "not a date"});
        let winner = SyncManager::resolve_conflict(&local, &remote);
        assert_eq!(winner, &local);

        let remote = json!({"id": "r1"});
        let winner = SyncManager::resolve_conflict(&local, &remote);
        assert_eq!(winner, &local);
    }
}
