//! Remote backing store client.
//!
//! [`RemoteStore`] is the seam the sync manager replays queued
//! operations through. The production implementation,
//! [`PostgrestRemote`], speaks the PostgREST dialect over HTTP:
//! table-scoped inserts, updates, and deletes with `id=eq.<row_id>`
//! filters. Connectivity failures are reported distinctly from
//! not-found and from row-level rejection so the sync manager can tell
//! "go offline" apart from "drop into retry".

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::BridgeError;

/// Errors surfaced by a remote store implementation.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The remote could not be reached (DNS, connect, timeout). The
    /// sync manager treats this as "offline".
    #[error("remote unreachable: {0}")]
    Unavailable(String),

    /// The remote was reachable but rejected the request.
    #[error("remote rejected request (status {status}): {body}")]
    Rejected {
        /// HTTP status code returned.
        status: u16,
        /// Response body, truncated to a reasonable length.
        body: String,
    },

    /// The requested row does not exist.
    #[error("row not found")]
    NotFound,
}

/// Table-scoped operations against the remote backing store.
#[async_trait]
pub trait RemoteStore: Send + Sync + fmt::Debug {
    /// Probes remote reachability.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Unavailable`] when the store cannot be
    /// reached or answers with a non-success status.
    async fn health_check(&self) -> Result<(), RemoteError>;

    /// Inserts a row. Replays are upserts keyed on the row's primary
    /// key, so at-least-once delivery cannot duplicate rows.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Unavailable`] on transport failure or
    /// [`RemoteError::Rejected`] when the remote refuses the row.
    async fn insert(&self, table: &str, row: &serde_json::Value) -> Result<(), RemoteError>;

    /// Applies changes to the row with the given ID.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Unavailable`] on transport failure or
    /// [`RemoteError::Rejected`] when the remote refuses the update.
    async fn update(
        &self,
        table: &str,
        row_id: &str,
        changes: &serde_json::Value,
    ) -> Result<(), RemoteError>;

    /// Deletes the row with the given ID.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Unavailable`] on transport failure or
    /// [`RemoteError::Rejected`] when the remote refuses the delete.
    async fn delete(&self, table: &str, row_id: &str) -> Result<(), RemoteError>;

    /// Fetches the row with the given ID, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Unavailable`] on transport failure or
    /// [`RemoteError::Rejected`] on a non-success response.
    async fn select_by_id(
        &self,
        table: &str,
        row_id: &str,
    ) -> Result<Option<serde_json::Value>, RemoteError>;
}

/// PostgREST-style remote store over HTTP.
#[derive(Debug, Clone)]
pub struct PostgrestRemote {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl PostgrestRemote {
    /// Table probed by [`RemoteStore::health_check`].
    const HEALTH_TABLE: &'static str = "_health";

    /// Creates a client for the store at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError::Internal`] if the HTTP client cannot be
    /// constructed.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Internal(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let mut body = body;
        body.truncate(512);
        Err(RemoteError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn transport_error(e: &reqwest::Error) -> RemoteError {
    RemoteError::Unavailable(e.to_string())
}

#[async_trait]
impl RemoteStore for PostgrestRemote {
    async fn health_check(&self) -> Result<(), RemoteError> {
        let url = format!("{}?limit=1", self.table_url(Self::HEALTH_TABLE));
        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RemoteError::Unavailable(format!(
                "health probe answered {}",
                response.status()
            )))
        }
    }

    async fn insert(&self, table: &str, row: &serde_json::Value) -> Result<(), RemoteError> {
        let url = format!("{}?on_conflict=id", self.table_url(table));
        let response = self
            .request(reqwest::Method::POST, url)
            .header("Prefer", "resolution=merge-duplicates")
            .json(row)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        Self::check_status(response).await.map(|_| ())
    }

    async fn update(
        &self,
        table: &str,
        row_id: &str,
        changes: &serde_json::Value,
    ) -> Result<(), RemoteError> {
        let url = format!("{}?id=eq.{row_id}", self.table_url(table));
        let response = self
            .request(reqwest::Method::PATCH, url)
            .json(changes)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        Self::check_status(response).await.map(|_| ())
    }

    async fn delete(&self, table: &str, row_id: &str) -> Result<(), RemoteError> {
        let url = format!("{}?id=eq.{row_id}", self.table_url(table));
        let response = self
            .request(reqwest::Method::DELETE, url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        Self::check_status(response).await.map(|_| ())
    }

    async fn select_by_id(
        &self,
        table: &str,
        row_id: &str,
    ) -> Result<Option<serde_json::Value>, RemoteError> {
        let url = format!("{}?id=eq.{row_id}", self.table_url(table));
        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound);
        }
        let response = Self::check_status(response).await?;
        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

        Ok(rows.into_iter().next())
    }
}
