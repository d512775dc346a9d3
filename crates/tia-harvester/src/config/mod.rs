//! Configuration loading for the harvester.
//! Reads harvester.toml from the current directory or the path in the
//! TIA_HARVESTER_CONFIG env var.

use serde::{Deserialize, Serialize};
use std::path::Path;

use tia_common::models::{KeywordDictionary, RepositoryConfig};
use tia_common::settings::{ConfigServiceSettings, DaemonSettings, QueueNames, StoreSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Only the daemon needs the store; the dry-run modes never touch it.
    pub store: Option<StoreSettings>,
    #[serde(default)]
    pub queues: QueueNames,
    #[serde(default)]
    pub config_service: ConfigServiceSettings,
    #[serde(default)]
    pub daemon: DaemonSettings,
    #[serde(default)]
    pub query_mode: QueryModeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryModeSettings {
    #[serde(default = "default_output_file")]
    pub output_file: String,
    /// JSON keyword dictionary used by the print and query modes.
    pub keywords_file: Option<String>,
    #[serde(default)]
    pub repositories: Vec<QueryModeRepository>,
}

fn default_output_file() -> String { "query-report.csv".to_string() }

impl Default for QueryModeSettings {
    fn default() -> Self {
        Self {
            output_file: default_output_file(),
            keywords_file: None,
            repositories: Vec::new(),
        }
    }
}

/// A repository listed locally for the query mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryModeRepository {
    pub driver: String,
    pub url: String,
    pub credentials: Option<String>,
    /// Seconds between pages.
    pub page_delay: Option<u64>,
    pub page_size: Option<u32>,
}

impl QueryModeRepository {
    pub fn to_repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            id: self.driver.clone(),
            name: self.driver.clone(),
            url: self.url.clone(),
            driver: self.driver.clone(),
            credentials: self.credentials.clone(),
            frequency: 60,
            enabled: true,
            page_limit: self.page_size,
            pause_between_pages: self.page_delay,
            last_visit: None,
        }
    }
}

impl QueryModeSettings {
    pub fn load_dictionary(&self) -> anyhow::Result<KeywordDictionary> {
        let Some(path) = &self.keywords_file else {
            anyhow::bail!("query_mode.keywords_file is not set");
        };
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read keyword dictionary {path}: {e}"))?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("TIA_HARVESTER_CONFIG")
            .unwrap_or_else(|_| "harvester.toml".to_string());

        if !Path::new(&path).exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy harvester.example.toml to harvester.toml and edit it.",
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
            .ok_or_else(|| anyhow::anyhow!("[store] section is required in daemon mode"))
    }
}

mod tests;
