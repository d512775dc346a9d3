//! Per-document retrieval: dedup against the status ledger, download,
//! then record the outcome and announce completed documents.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use flate2::read::GzDecoder;
use tia_common::daemon::EventHandler;
use tia_common::models::DocumentRecord;
use tia_common::queue::push_json;
use tia_common::{DocumentStatus, EventQueue, Result, StatusStore};
use tracing::{debug, error, info, instrument, warn};

use crate::action::{DownloadAction, DownloadResult};
use crate::drivers::DownloadDriverRegistry;
use crate::enrichment::{write_service_metadata, EnrichmentSettings};
use crate::fetch::Fetcher;

pub const METADATA_FILE: &str = "document-metadata.json";
pub const ERROR_LOG_FILE: &str = "download-error.log";

pub struct RetrieverOptions {
    pub download_path: PathBuf,
    pub max_retry: i32,
    pub enrichment: EnrichmentSettings,
}

pub struct DocumentRetriever {
    statuses: Arc<dyn StatusStore>,
    metadata: Arc<dyn EventQueue>,
    drivers: DownloadDriverRegistry,
    fetcher: Arc<dyn Fetcher>,
    options: RetrieverOptions,
}

impl DocumentRetriever {
    pub fn new(
        statuses: Arc<dyn StatusStore>,
        metadata: Arc<dyn EventQueue>,
        drivers: DownloadDriverRegistry,
        fetcher: Arc<dyn Fetcher>,
        options: RetrieverOptions,
    ) -> Self {
        Self { statuses, metadata, drivers, fetcher, options }
    }

    /// Run one attempt for `record`. Re-delivered events for completed or
    /// exhausted documents come back as skipped results.
    #[instrument(skip(self, record), fields(driver = %record.repository.driver, doc_id = %record.id))]
    pub async fn retrieve(&self, record: &DocumentRecord) -> Result<DownloadResult> {
        let status_id = record.status_id();
        let mut status = match self.statuses.get(&status_id).await? {
            Some(s) if s.completed => {
                info!(at = ?s.download_timestamp, "document already downloaded");
                return Ok(DownloadResult::skipped(true));
            }
            Some(s) if s.retry_count <= 0 => {
                info!("document was not completed and has no retries left, skipped");
                return Ok(DownloadResult::skipped(false));
            }
            Some(s) => {
                info!(retries_left = s.retry_count, "document not completed, retrying");
                s
            }
            None => DocumentStatus::new(status_id, self.options.max_retry),
        };

        let driver = self.drivers.get(&record.download_info.download_driver)?;
        let action = DownloadAction::from_record(record, &self.options.download_path);
        action.create_local_directory()?;
        let event_id = action.event_id();

        write_metadata(&action.local_path, record)?;

        if record.document.doi.is_empty() {
            info!("no dois, external service metadata skipped");
        } else {
            for service in self.options.enrichment.enabled_services() {
                write_service_metadata(self.fetcher.as_ref(), &service, &action.local_path, &record.document.doi).await;
            }
        }

        delete_error_log(&action.local_path);
        self.set_processing_status(&event_id, format!("started at {}", Utc::now().to_rfc3339()))
            .await;

        let result = driver.download(&action).await?;
        if result.skipped {
            return Ok(result);
        }

        status.download_timestamp = Some(Utc::now());
        if result.below_minimum() {
            status.retry_count = (status.retry_count - 1).max(0);
            status.completed = false;
            write_error_log(&action.local_path, &result.errors);
            let mut report = format!("log time is {}\n", Utc::now().to_rfc3339());
            report.push_str(&result.errors.join("\n"));
            self.set_processing_status(&event_id, report).await;
            warn!(
                downloaded = result.file_names.len(),
                required = result.minimum_required,
                retries_left = status.retry_count,
                "download incomplete"
            );
        } else {
            status.completed = true;
            self.set_processing_status(&event_id, format!("completed at {}", Utc::now().to_rfc3339()))
                .await;
            push_json(self.metadata.as_ref(), &event_id).await?;
            info!(%event_id, "metadata event queued");
        }

        self.statuses.put(&status).await?;
        Ok(result)
    }

    async fn set_processing_status(&self, event_id: &str, value: String) {
        if let Err(e) = self.statuses.set_processing_status(event_id, &value).await {
            error!(%event_id, error = %e, "cannot write processing status");
        }
    }
}

#[async_trait]
impl EventHandler for DocumentRetriever {
    type Event = DocumentRecord;

    async fn handle(&self, record: DocumentRecord) -> Result<()> {
        self.retrieve(&record).await.map(|_| ())
    }
}

// ── Working-directory files ──────────────────────────────────────────────────

/// Write the record as pretty JSON, with a compressed full text expanded.
pub fn write_metadata(dir: &Path, record: &DocumentRecord) -> Result<()> {
    let mut record = record.clone();
    record.document.full_text = record.document.full_text.map(|text| decompress(&text).unwrap_or(text));
    let json = serde_json::to_string_pretty(&record)?;
    std::fs::write(dir.join(METADATA_FILE), json)?;
    Ok(())
}

/// Base64-wrapped gzip text, as some repositories deliver full texts.
pub fn decompress(encoded: &str) -> Option<String> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let mut text = String::new();
    GzDecoder::new(bytes.as_slice()).read_to_string(&mut text).ok()?;
    Some(text)
}

fn delete_error_log(dir: &Path) {
    let path = dir.join(ERROR_LOG_FILE);
    if path.exists() {
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("previous log file deleted"),
            Err(e) => warn!(path = %dir.display(), error = %e, "cannot remove previous log file"),
        }
    }
}

fn write_error_log(dir: &Path, errors: &[String]) {
    let mut content = errors.join("\n");
    content.push('\n');
    if let Err(e) = std::fs::write(dir.join(ERROR_LOG_FILE), content) {
        error!(path = %dir.display(), error = %e, "cannot write log file");
    }
}
