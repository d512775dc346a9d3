//! tia-common
//! Shared models, error kinds and store clients for the TIA harvesting
//! workers (scheduler, harvester, retriever).

pub mod checkpoint;
pub mod config_service;
pub mod daemon;
pub mod dates;
pub mod error;
pub mod http;
pub mod models;
pub mod pg;
pub mod queue;
pub mod settings;
pub mod status;

pub use checkpoint::{Checkpoint, CheckpointStore, MemoryCheckpointStore};
pub use config_service::{ConfigService, HttpConfigService};
pub use error::{Result, TiaError};
pub use http::HttpClient;
pub use queue::{EventQueue, MemoryQueue};
pub use status::{DocumentStatus, MemoryStatusStore, StatusStore};
