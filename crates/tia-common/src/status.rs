//! Document download status ledger.
//!
//! Entries are never deleted: they double as the dedup ledger consulted by
//! the harvester before a document event is emitted.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::Result;

pub const PROCESSING_STATUS_PREFIX: &str = "doc-processing-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatus {
    pub id: String,
    #[serde(default)]
    pub download_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub retry_count: i32,
}

impl DocumentStatus {
    /// Fresh status for a document seen for the first time.
    pub fn new(id: impl Into<String>, max_retry: i32) -> Self {
        Self { id: id.into(), download_timestamp: None, completed: false, retry_count: max_retry }
    }

    pub fn make_id(group: &str, driver: &str, mission: &str, doc_id: &str) -> String {
        format!("{group}-{driver}-{mission}-{doc_id}").replace('/', "-")
    }

    pub fn is_exhausted(&self) -> bool {
        !self.completed && self.retry_count <= 0
    }

    pub fn is_retrying(&self) -> bool {
        !self.completed && self.retry_count > 0
    }

    /// Combine a stored entry with an update without ever raising the retry
    /// budget or clearing completion.
    pub fn merge(&self, update: &DocumentStatus) -> DocumentStatus {
        DocumentStatus {
            id: self.id.clone(),
            download_timestamp: update.download_timestamp.or(self.download_timestamp),
            completed: self.completed || update.completed,
            retry_count: self.retry_count.min(update.retry_count).max(0),
        }
    }
}

/// Key/value store of [`DocumentStatus`] plus the per-document processing
/// status strings read by operators.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<DocumentStatus>>;

    /// Persist with monotonic merge semantics, see [`DocumentStatus::merge`].
    async fn put(&self, status: &DocumentStatus) -> Result<()>;

    async fn list(&self) -> Result<Vec<DocumentStatus>>;

    /// Give exhausted, uncompleted entries a fresh retry budget.
    /// Returns how many entries were reset.
    async fn reset_retries(&self, max_retry: i32) -> Result<usize>;

    async fn set_processing_status(&self, event_id: &str, value: &str) -> Result<()>;

    async fn processing_status(&self, event_id: &str) -> Result<Option<String>>;
}

/// Process-local store used by tests and single-process runs.
#[derive(Default)]
pub struct MemoryStatusStore {
    statuses: Mutex<HashMap<String, DocumentStatus>>,
    processing: Mutex<HashMap<String, String>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn get(&self, id: &str) -> Result<Option<DocumentStatus>> {
        Ok(self.statuses.lock().await.get(id).cloned())
    }

    async fn put(&self, status: &DocumentStatus) -> Result<()> {
        let mut map = self.statuses.lock().await;
        let merged = match map.get(&status.id) {
            Some(existing) => existing.merge(status),
            None => status.clone(),
        };
        map.insert(status.id.clone(), merged);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DocumentStatus>> {
        let mut all: Vec<_> = self.statuses.lock().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn reset_retries(&self, max_retry: i32) -> Result<usize> {
        let mut map = self.statuses.lock().await;
        let mut count = 0;
        for status in map.values_mut().filter(|s| s.is_exhausted()) {
            status.retry_count = max_retry;
            count += 1;
        }
        Ok(count)
    }

    async fn set_processing_status(&self, event_id: &str, value: &str) -> Result<()> {
        self.processing
            .lock()
            .await
            .insert(format!("{PROCESSING_STATUS_PREFIX}{event_id}"), value.to_string());
        Ok(())
    }

    async fn processing_status(&self, event_id: &str) -> Result<Option<String>> {
        Ok(self
            .processing
            .lock()
            .await
            .get(&format!("{PROCESSING_STATUS_PREFIX}{event_id}"))
            .cloned())
    }
}
