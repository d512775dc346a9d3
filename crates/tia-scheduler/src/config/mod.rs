//! Configuration loading for the scheduler.
//! Reads scheduler.toml from the current directory or the path in the
//! TIA_SCHEDULER_CONFIG env var.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use tia_common::settings::{ConfigServiceSettings, QueueNames, StoreSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreSettings,
    #[serde(default)]
    pub queues: QueueNames,
    #[serde(default)]
    pub config_service: ConfigServiceSettings,
    #[serde(default = "default_polling_period")]
    pub polling_period_secs: u64,
}

fn default_polling_period() -> u64 { 60 }

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("TIA_SCHEDULER_CONFIG")
            .unwrap_or_else(|_| "scheduler.toml".to_string());

        if !Path::new(&path).exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy scheduler.example.toml to scheduler.toml and edit it.",
                path
            );
        }

        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn polling_period(&self) -> Duration {
        Duration::from_secs(self.polling_period_secs)
    }
}
