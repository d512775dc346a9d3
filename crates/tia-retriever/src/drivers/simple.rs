use std::sync::Arc;

use async_trait::async_trait;
use tia_common::models::SIMPLE_DOWNLOADER;
use tia_common::{Result, TiaError};
use tracing::{error, info, warn};

use super::DownloadDriver;
use crate::action::{DownloadAction, DownloadResult};
use crate::enrichment::Unpaywall;
use crate::fetch::Fetcher;

/// Downloads each URL in order until enough files are on disk.
#[derive(Clone)]
pub struct SimpleDownloader {
    fetcher: Arc<dyn Fetcher>,
    fallback: Option<Unpaywall>,
}

impl SimpleDownloader {
    pub fn new(fetcher: Arc<dyn Fetcher>, fallback: Option<Unpaywall>) -> Self {
        Self { fetcher, fallback }
    }

    async fn download_one(
        &self,
        url: &str,
        action: &DownloadAction,
        position: usize,
        result: &mut DownloadResult,
    ) -> bool {
        let url = url.replace(' ', "%20");
        let total = action.urls.len();
        let required = action.minimum_required;
        info!(id = %action.id, "document download ({position}/{total}({required})): url '{url}' in progress");

        match self.fetcher.download_file(&url, &action.local_path).await {
            Ok(path) => {
                info!(id = %action.id, "document download ({position}/{total}({required})): url '{url}' to '{}'", path.display());
                result.file_names.push(path);
                true
            }
            Err(e) => {
                error!(id = %action.id, error = %e, "document download ({position}/{total}({required})): url '{url}' failed");
                result.errors.push(format!(
                    "document download {} ({position}/{total}({required})): url '{url}' cannot download file: {e}",
                    action.id
                ));
                false
            }
        }
    }

    async fn fallback_url(&self, unpaywall: &Unpaywall, doi: &str) -> Result<String> {
        let root = self.fetcher.fetch_json(&unpaywall.resolve(doi)).await?;
        let location = root
            .get("best_oa_location")
            .filter(|v| !v.is_null())
            .ok_or_else(|| TiaError::Download(format!("cannot find best_oa_location node for doi {doi}")))?;
        location["url_for_pdf"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| TiaError::Download(format!("cannot find url_for_pdf node for doi {doi}")))
    }
}

#[async_trait]
impl DownloadDriver for SimpleDownloader {
    fn name(&self) -> &str {
        SIMPLE_DOWNLOADER
    }

    async fn download(&self, action: &DownloadAction) -> Result<DownloadResult> {
        let mut result = DownloadResult::default();
        let total = action.urls.len();
        let mut downloaded = 0;
        let mut position = 0;

        for url in &action.urls {
            position += 1;
            if url.trim().is_empty() {
                warn!(id = %action.id, "empty download url");
                result.errors.push(format!("empty download url for document {}", action.id));
                continue;
            }
            if self.download_one(url, action, position, &mut result).await {
                downloaded += 1;
            }
            if downloaded == action.minimum_required && total > downloaded {
                info!(required = action.minimum_required, "minimum required downloads reached, skipping further download urls");
                break;
            }
        }

        if downloaded == 0 && !action.dois.is_empty() {
            if let Some(unpaywall) = &self.fallback {
                for doi in &action.dois {
                    match self.fallback_url(unpaywall, doi).await {
                        Ok(url) => {
                            info!(id = %action.id, %url, "retrieved fallback url");
                            if self.download_one(&url, action, position, &mut result).await {
                                downloaded += 1;
                            }
                        }
                        Err(e) => {
                            error!(%doi, error = %e, "cannot get fallback url from unpaywall");
                            result.errors.push(format!(
                                "cannot get document or fallback url from unpaywall service for doi {doi}: {e}"
                            ));
                        }
                    }
                }
            }
        }

        result.partial = downloaded < total;
        result.succeeded = downloaded > 0;
        result.minimum_required = action.minimum_required;

        info!(
            id = %action.id,
            downloaded,
            total,
            required = action.minimum_required,
            "document download report"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::fake::FakeFetcher;
    use serde_json::json;
    use std::path::Path;

    fn action(urls: &[&str], minimum: usize, dois: &[&str], dir: &Path) -> DownloadAction {
        DownloadAction::for_test(
            "g",
            "doc-1",
            SIMPLE_DOWNLOADER,
            dois.iter().map(|d| d.to_string()).collect(),
            urls.iter().map(|u| u.to_string()).collect(),
            minimum,
            None,
            dir,
        )
    }

    fn unpaywall() -> Unpaywall {
        Unpaywall { url: "https://up.example.org/".into(), email: "ops@example.org".into() }
    }

    #[tokio::test]
    async fn test_stops_once_minimum_reached() {
        let dir = tempfile::tempdir().unwrap();
        let a = action(&["https://x.org/1.pdf", "https://x.org/2.pdf", "https://x.org/3.pdf"], 2, &[], dir.path());
        a.create_local_directory().unwrap();
        let fetcher = Arc::new(
            FakeFetcher::default()
                .with_file("https://x.org/1.pdf", "1.pdf")
                .with_file("https://x.org/2.pdf", "2.pdf")
                .with_file("https://x.org/3.pdf", "3.pdf"),
        );
        let driver = SimpleDownloader::new(fetcher.clone(), None);

        let result = driver.download(&a).await.unwrap();
        assert!(result.succeeded);
        assert!(result.partial);
        assert!(!result.below_minimum());
        assert_eq!(result.file_names.len(), 2);
        assert!(!fetcher.calls().contains(&"https://x.org/3.pdf".to_string()));
    }

    #[tokio::test]
    async fn test_failures_are_collected_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let a = action(&["", "https://x.org/missing.pdf"], 2, &[], dir.path());
        a.create_local_directory().unwrap();
        let driver = SimpleDownloader::new(Arc::new(FakeFetcher::default()), None);

        let result = driver.download(&a).await.unwrap();
        assert!(!result.succeeded);
        assert!(result.below_minimum());
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("empty download url"));
    }

    #[tokio::test]
    async fn test_unpaywall_fallback_once_per_doi() {
        let dir = tempfile::tempdir().unwrap();
        let a = action(&["https://x.org/broken"], 1, &["10.1/a"], dir.path());
        a.create_local_directory().unwrap();
        let lookup = "https://up.example.org/10.1/a?email=ops@example.org";
        let fetcher = Arc::new(
            FakeFetcher::default()
                .with_json(lookup, json!({"best_oa_location": {"url_for_pdf": "https://oa.example.org/a.pdf"}}))
                .with_file("https://oa.example.org/a.pdf", "a.pdf"),
        );
        let driver = SimpleDownloader::new(fetcher.clone(), Some(unpaywall()));

        let result = driver.download(&a).await.unwrap();
        assert!(result.succeeded);
        assert!(!result.partial);
        assert_eq!(fetcher.calls().iter().filter(|c| c.as_str() == lookup).count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_not_used_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let a = action(&["https://x.org/broken"], 1, &["10.1/a"], dir.path());
        a.create_local_directory().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let driver = SimpleDownloader::new(fetcher.clone(), None);

        driver.download(&a).await.unwrap();
        assert_eq!(fetcher.calls(), vec!["https://x.org/broken".to_string()]);
    }
}
