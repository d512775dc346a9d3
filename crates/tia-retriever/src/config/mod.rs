//! Configuration loading for the retriever.
//! Reads retriever.toml from the current directory or the path in the
//! TIA_RETRIEVER_CONFIG env var.

use serde::{Deserialize, Serialize};
use std::path::Path;

use tia_common::settings::{DaemonSettings, QueueNames, StoreSettings};

use crate::enrichment::EnrichmentSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Required by every mode except `--test`.
    pub store: Option<StoreSettings>,
    #[serde(default)]
    pub queues: QueueNames,
    #[serde(default)]
    pub daemon: DaemonSettings,
    pub download: DownloadSettings,
    #[serde(default)]
    pub enrichment: EnrichmentSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSettings {
    pub path: String,
    #[serde(default = "default_max_retry")]
    pub max_retry: i32,
    #[serde(default)]
    pub unpaywall_fallback_enabled: bool,
}

fn default_max_retry() -> i32 { 3 }

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("TIA_RETRIEVER_CONFIG")
            .unwrap_or_else(|_| "retriever.toml".to_string());

        if !Path::new(&path).exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy retriever.example.toml to retriever.toml and edit it.",
                path
            );
        }

        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn store(&self) -> anyhow::Result<&StoreSettings> {
        self.store
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("[store] section is required outside test mode"))
    }
}

mod tests;
