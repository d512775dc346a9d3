//! Per-mission harvesting low-watermark.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::dates;
use crate::error::Result;

/// Maximum publication date seen for a `(binding, repository, mission)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    #[serde(default)]
    pub id: Option<String>,
    pub search_binding_id: String,
    pub repository_id: String,
    pub mission: String,
    #[serde(with = "dates::required")]
    pub max_publication_date: NaiveDate,
}

impl Checkpoint {
    pub fn new(binding_id: &str, repo_id: &str, mission: &str, date: NaiveDate) -> Self {
        Self {
            id: Some(Self::make_id(binding_id, repo_id, mission)),
            search_binding_id: binding_id.to_string(),
            repository_id: repo_id.to_string(),
            mission: mission.to_string(),
            max_publication_date: date,
        }
    }

    pub fn make_id(binding_id: &str, repo_id: &str, mission: &str) -> String {
        format!("{binding_id}-{repo_id}-{mission}")
    }
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// `None` when no checkpoint was recorded yet.
    async fn get(&self, binding_id: &str, repo_id: &str, mission: &str) -> Result<Option<NaiveDate>>;

    async fn set(&self, binding_id: &str, repo_id: &str, mission: &str, date: NaiveDate) -> Result<()>;
}

/// Keeps the greatest date ever written per key.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    dates: Mutex<HashMap<String, NaiveDate>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, binding_id: &str, repo_id: &str, mission: &str) -> Result<Option<NaiveDate>> {
        let key = Checkpoint::make_id(binding_id, repo_id, mission);
        Ok(self.dates.lock().await.get(&key).copied())
    }

    async fn set(&self, binding_id: &str, repo_id: &str, mission: &str, date: NaiveDate) -> Result<()> {
        let key = Checkpoint::make_id(binding_id, repo_id, mission);
        let mut map = self.dates.lock().await;
        let entry = map.entry(key).or_insert(date);
        if date > *entry {
            *entry = date;
        }
        Ok(())
    }
}
