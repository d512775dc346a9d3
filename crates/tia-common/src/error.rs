use thiserror::Error;

/// Failure kinds shared by every TIA worker.
///
/// Per-URL download failures are not represented here: they are collected as
/// values in the download result and drive the retry decision instead.
#[derive(Debug, Error)]
pub enum TiaError {
    /// Malformed repository URL, credentials or driver name.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport or HTTP-status failure reaching an external service.
    #[error("Contact error: {0}")]
    Contact(String),

    /// Response shape does not match what the driver expects.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Condition that aborts a whole download action.
    #[error("Download error: {0}")]
    Download(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TiaError {
    /// Report generation stops on these instead of writing them inline.
    pub fn is_fatal_for_report(&self) -> bool {
        matches!(self, TiaError::Configuration(_))
    }
}

impl From<sqlx::Error> for TiaError {
    fn from(e: sqlx::Error) -> Self {
        TiaError::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TiaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_aborts_report() {
        assert!(TiaError::Configuration("bad url".into()).is_fatal_for_report());
        assert!(!TiaError::Contact("timeout".into()).is_fatal_for_report());
        assert!(!TiaError::Decode("no items".into()).is_fatal_for_report());
    }

    #[test]
    fn test_display_carries_kind() {
        let e = TiaError::Decode("\"results\" is not an array".into());
        assert_eq!(e.to_string(), "Decode error: \"results\" is not an array");
    }
}
