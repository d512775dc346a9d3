//! Operator views over the status ledger.

use std::io::Write;
use std::str::FromStr;

use tia_common::{DocumentStatus, Result, StatusStore};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Completed,
    /// Not completed, retries left.
    Retrying,
    /// Not completed, no retries left.
    Failed,
    All,
}

impl StatusFilter {
    pub fn matches(&self, status: &DocumentStatus) -> bool {
        match self {
            StatusFilter::Completed => status.completed,
            StatusFilter::Retrying => status.is_retrying(),
            StatusFilter::Failed => !status.completed && status.retry_count == 0,
            StatusFilter::All => true,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "COMPLETED" => Ok(StatusFilter::Completed),
            "RETRYING" => Ok(StatusFilter::Retrying),
            "FAILED" => Ok(StatusFilter::Failed),
            "ALL" => Ok(StatusFilter::All),
            other => Err(format!("unknown status filter {other}, expected COMPLETED|RETRYING|FAILED|ALL")),
        }
    }
}

pub fn format_status(status: &DocumentStatus) -> String {
    format!(
        "id={},completed={},retries-left={},timestamp={}",
        status.id,
        status.completed,
        status.retry_count,
        status
            .download_timestamp
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "null".to_string())
    )
}

/// Print every status matching `filter`, then `total=<n>`.
pub async fn query_statuses<W: Write>(store: &dyn StatusStore, filter: StatusFilter, out: &mut W) -> Result<usize> {
    let mut count = 0;
    for status in store.list().await?.iter().filter(|s| filter.matches(s)) {
        writeln!(out, "{}", format_status(status))?;
        count += 1;
    }
    writeln!(out, "total={count}")?;
    Ok(count)
}

/// Give every failed document a fresh retry budget.
pub async fn reset_failed(store: &dyn StatusStore, max_retry: i32) -> Result<usize> {
    let count = store.reset_retries(max_retry).await?;
    info!(count, max_retry, "retry counters reset");
    Ok(count)
}
