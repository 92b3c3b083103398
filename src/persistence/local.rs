//! SQLite implementation of the durable local store.
//!
//! Holds therapy sessions, raw sensor frames, analysis results, and the
//! sync queue. Survives process restart; the schema is created on
//! startup. Writes here are the durability guarantee of the ingest
//! path — the remote store is reconciled later by the sync manager.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::models::{
    AnalysisRow, QueuedOperation, SessionRow, SessionStatus, SyncOpType, VrFrameRow,
};
use crate::error::BridgeError;

/// Statements creating the offline storage tables.
const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS therapy_sessions (
        id TEXT PRIMARY KEY,
        patient_id TEXT NOT NULL,
        doctor_id TEXT NOT NULL,
        game_id TEXT NOT NULL,
        status TEXT NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT,
        duration_secs INTEGER,
        notes TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS vr_data (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        data_type TEXT NOT NULL,
        raw_data TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS ai_analysis (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL,
        model_version TEXT NOT NULL,
        analysis_result TEXT NOT NULL,
        progress_score REAL NOT NULL,
        confidence REAL NOT NULL,
        recommendations TEXT NOT NULL,
        anomalies TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sync_queue (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        operation TEXT NOT NULL,
        table_name TEXT NOT NULL,
        row_id TEXT,
        payload TEXT NOT NULL,
        enqueued_at TEXT NOT NULL
    )",
];

/// SQLite-backed local store using `sqlx::SqlitePool`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    /// Opens (creating if missing) the database at `path` and ensures
    /// the schema exists.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] if the file cannot
    /// be opened or the schema cannot be created.
    pub async fn connect(path: &str) -> Result<Self, BridgeError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Opens an in-memory store, used by tests and smoke setups.
    ///
    /// The pool is capped at one connection so every query sees the same
    /// in-memory database.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] if the in-memory
    /// database cannot be created.
    pub async fn in_memory() -> Result<Self, BridgeError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), BridgeError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))?;
        }
        Ok(())
    }

    /// Inserts a new therapy session row.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] on database failure.
    pub async fn insert_session(&self, row: &SessionRow) -> Result<(), BridgeError> {
        sqlx::query(
            "INSERT INTO therapy_sessions \
             (id, patient_id, doctor_id, game_id, status, start_time, end_time, \
              duration_secs, notes, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&row.id)
        .bind(&row.patient_id)
        .bind(&row.doctor_id)
        .bind(&row.game_id)
        .bind(row.status.as_str())
        .bind(row.start_time)
        .bind(row.end_time)
        .bind(row.duration_secs)
        .bind(&row.notes)
        .bind(row.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))?;

        Ok(())
    }

    /// Loads a session by ID.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] on database failure
    /// or an unrecognized stored status value.
    pub async fn get_session(&self, id: &str) -> Result<Option<SessionRow>, BridgeError> {
        type Row = (
            String,
            String,
            String,
            String,
            String,
            DateTime<Utc>,
            Option<DateTime<Utc>>,
            Option<i64>,
            Option<String>,
            DateTime<Utc>,
        );
        let row = sqlx::query_as::<_, Row>(
            "SELECT id, patient_id, doctor_id, game_id, status, start_time, end_time, \
             duration_secs, notes, created_at \
             FROM therapy_sessions WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))?;

        row.map(
            |(
                id,
                patient_id,
                doctor_id,
                game_id,
                status,
                start_time,
                end_time,
                duration_secs,
                notes,
                created_at,
            )| {
                let status = SessionStatus::parse(&status).ok_or_else(|| {
                    BridgeError::PersistenceFailure(format!("unknown session status: {status}"))
                })?;
                Ok(SessionRow {
                    id,
                    patient_id,
                    doctor_id,
                    game_id,
                    status,
                    start_time,
                    end_time,
                    duration_secs,
                    notes,
                    created_at,
                })
            },
        )
        .transpose()
    }

    /// Marks a session COMPLETED with its end time, duration, and notes.
    ///
    /// Returns the number of rows affected (0 when no such session is
    /// stored locally).
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] on database failure.
    pub async fn complete_session(
        &self,
        id: &str,
        end_time: DateTime<Utc>,
        duration_secs: Option<i64>,
        notes: Option<&str>,
    ) -> Result<u64, BridgeError> {
        let result = sqlx::query(
            "UPDATE therapy_sessions \
             SET status = ?1, end_time = ?2, duration_secs = ?3, notes = ?4 \
             WHERE id = ?5",
        )
        .bind(SessionStatus::Completed.as_str())
        .bind(end_time)
        .bind(duration_secs)
        .bind(notes)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Inserts a raw sensor frame row.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] on database failure.
    pub async fn insert_vr_frame(&self, row: &VrFrameRow) -> Result<(), BridgeError> {
        sqlx::query(
            "INSERT INTO vr_data (id, session_id, timestamp, data_type, raw_data, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&row.id)
        .bind(&row.session_id)
        .bind(row.timestamp)
        .bind(&row.data_type)
        .bind(&row.raw_data)
        .bind(row.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))?;

        Ok(())
    }

    /// Counts stored raw frames for a session.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] on database failure.
    pub async fn frame_count(&self, session_id: &str) -> Result<i64, BridgeError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM vr_data WHERE session_id = ?1")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))
    }

    /// Inserts an analysis result row.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] on database failure.
    pub async fn insert_analysis(&self, row: &AnalysisRow) -> Result<(), BridgeError> {
        sqlx::query(
            "INSERT INTO ai_analysis \
             (id, session_id, model_version, analysis_result, progress_score, confidence, \
              recommendations, anomalies, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&row.id)
        .bind(&row.session_id)
        .bind(&row.model_version)
        .bind(&row.analysis_result)
        .bind(row.progress_score)
        .bind(row.confidence)
        .bind(&row.recommendations)
        .bind(&row.anomalies)
        .bind(row.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))?;

        Ok(())
    }

    /// Counts stored analysis results for a session.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] on database failure.
    pub async fn analysis_count(&self, session_id: &str) -> Result<i64, BridgeError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ai_analysis WHERE session_id = ?1")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))
    }

    /// Appends an operation to the durable sync queue.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] on database failure.
    pub async fn enqueue_operation(&self, op: &QueuedOperation) -> Result<(), BridgeError> {
        let payload = serde_json::to_string(&op.payload)
            .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))?;

        sqlx::query(
            "INSERT INTO sync_queue (id, operation, table_name, row_id, payload, enqueued_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&op.id)
        .bind(op.op_type.as_str())
        .bind(&op.table_name)
        .bind(&op.row_id)
        .bind(payload)
        .bind(op.enqueued_at)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))?;

        Ok(())
    }

    /// Loads all queued operations in enqueue order.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] on database failure
    /// or a corrupted stored operation.
    pub async fn pending_operations(&self) -> Result<Vec<QueuedOperation>, BridgeError> {
        type Row = (
            String,
            String,
            String,
            Option<String>,
            String,
            DateTime<Utc>,
        );
        let rows = sqlx::query_as::<_, Row>(
            "SELECT id, operation, table_name, row_id, payload, enqueued_at \
             FROM sync_queue ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))?;

        rows.into_iter()
            .map(|(id, operation, table_name, row_id, payload, enqueued_at)| {
                let op_type = SyncOpType::parse(&operation).ok_or_else(|| {
                    BridgeError::PersistenceFailure(format!("unknown operation type: {operation}"))
                })?;
                let payload = serde_json::from_str(&payload)
                    .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))?;
                Ok(QueuedOperation {
                    id,
                    op_type,
                    table_name,
                    row_id,
                    payload,
                    enqueued_at,
                })
            })
            .collect()
    }

    /// Removes a successfully replayed operation from the queue.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] on database failure.
    pub async fn delete_operation(&self, id: &str) -> Result<(), BridgeError> {
        sqlx::query("DELETE FROM sync_queue WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))?;
        Ok(())
    }

    /// Returns the number of queued operations.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::PersistenceFailure`] on database failure.
    pub async fn queue_len(&self) -> Result<i64, BridgeError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sync_queue")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BridgeError::PersistenceFailure(e.to_string()))
    }

    /// Closes the underlying connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
