//! One download attempt for one document, and its outcome.

use std::path::{Path, PathBuf};

use tia_common::models::DocumentRecord;
use tia_common::Result;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadAction {
    pub group: String,
    pub id: String,
    pub driver: String,
    pub dois: Vec<String>,
    pub urls: Vec<String>,
    pub minimum_required: usize,
    pub credentials: Option<String>,
    pub group_path: PathBuf,
    /// Directory the files land in. Equal to `group_path` for test actions.
    pub local_path: PathBuf,
    dir_event_id: Option<String>,
}

impl DownloadAction {
    /// Action for a harvested record, downloading into
    /// `<base>/<group>/<repo>-<mission>-<id>`.
    pub fn from_record(record: &DocumentRecord, base: &Path) -> Self {
        let info = &record.download_info;
        let group_path = base.join(&record.group);
        let dir_event_id = format!(
            "{}-{}-{}",
            sanitize_component(&record.repository.driver),
            sanitize_component(record.mission()),
            sanitize_component(&record.id)
        );
        Self {
            group: record.group.clone(),
            id: record.id.clone(),
            driver: info.download_driver.clone(),
            dois: record.document.doi.clone(),
            urls: info.document_url.clone(),
            minimum_required: info
                .minimum_required
                .map(|m| m as usize)
                .unwrap_or(info.document_url.len()),
            credentials: info.credentials.clone(),
            local_path: group_path.join(&dir_event_id),
            group_path,
            dir_event_id: Some(dir_event_id),
        }
    }

    /// Action for a one-off manual download straight into `<base>/<group>`.
    #[allow(clippy::too_many_arguments)]
    pub fn for_test(
        group: &str,
        id: &str,
        driver: &str,
        dois: Vec<String>,
        urls: Vec<String>,
        minimum_required: usize,
        credentials: Option<String>,
        base: &Path,
    ) -> Self {
        let group_path = base.join(group);
        Self {
            group: group.to_string(),
            id: id.to_string(),
            driver: driver.to_string(),
            dois,
            urls,
            minimum_required,
            credentials,
            local_path: group_path.clone(),
            group_path,
            dir_event_id: None,
        }
    }

    /// `<group>/<dirEventId>`: names the attempt in the metadata queue and
    /// in the processing-status entries.
    pub fn event_id(&self) -> String {
        match &self.dir_event_id {
            Some(dir) => format!("{}/{}", self.group, dir),
            None => self.group.clone(),
        }
    }

    pub fn create_local_directory(&self) -> Result<()> {
        if !self.group_path.exists() {
            info!(path = %self.group_path.display(), "creating local group path");
            std::fs::create_dir_all(&self.group_path)?;
        }
        if self.local_path != self.group_path {
            if self.local_path.exists() {
                warn!(path = %self.local_path.display(), "directory already exists");
            } else {
                std::fs::create_dir(&self.local_path)?;
            }
        }
        Ok(())
    }
}

pub fn sanitize_component(value: &str) -> String {
    value.replace(['/', ':', '.', ' ', '-'], "_")
}

/// Outcome of a [`DownloadAction`]. Per-URL failures are collected in
/// `errors` rather than returned as `Err`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadResult {
    pub succeeded: bool,
    pub partial: bool,
    /// Nothing was attempted; the status store must not be touched.
    pub skipped: bool,
    pub file_names: Vec<PathBuf>,
    pub minimum_required: usize,
    pub errors: Vec<String>,
}

impl DownloadResult {
    pub fn skipped(succeeded: bool) -> Self {
        Self { succeeded, partial: !succeeded, skipped: true, ..Default::default() }
    }

    /// Fewer files than required, or none at all: the attempt counts
    /// against the retry budget.
    pub fn below_minimum(&self) -> bool {
        self.file_names.is_empty() || (self.partial && self.file_names.len() < self.minimum_required)
    }
}
