//! Config sections shared by every worker binary.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

/// Names of the three event channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueNames {
    #[serde(default = "default_repo_queue")]
    pub repo: String,
    #[serde(default = "default_docs_queue")]
    pub docs: String,
    #[serde(default = "default_metadata_queue")]
    pub metadata: String,
}

fn default_repo_queue()     -> String { "repo".to_string() }
fn default_docs_queue()     -> String { "docs".to_string() }
fn default_metadata_queue() -> String { "metadata".to_string() }

impl Default for QueueNames {
    fn default() -> Self {
        Self {
            repo: default_repo_queue(),
            docs: default_docs_queue(),
            metadata: default_metadata_queue(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigServiceSettings {
    #[serde(default = "default_config_base_url")]
    pub base_url: String,
}

fn default_config_base_url() -> String { "http://localhost:8080/tia/api/v1".to_string() }

impl Default for ConfigServiceSettings {
    fn default() -> Self {
        Self { base_url: default_config_base_url() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSettings {
    #[serde(default = "default_empty_queue_sleep")]
    pub empty_queue_sleep_secs: u64,
    #[serde(default = "default_queue_error_sleep")]
    pub queue_error_sleep_secs: u64,
}

fn default_empty_queue_sleep() -> u64 { 10 }
fn default_queue_error_sleep() -> u64 { 20 }

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            empty_queue_sleep_secs: default_empty_queue_sleep(),
            queue_error_sleep_secs: default_queue_error_sleep(),
        }
    }
}

impl DaemonSettings {
    pub fn empty_queue_sleep(&self) -> Duration {
        Duration::from_secs(self.empty_queue_sleep_secs)
    }

    pub fn queue_error_sleep(&self) -> Duration {
        Duration::from_secs(self.queue_error_sleep_secs)
    }
}
