//! Elsevier-aware downloader.
//!
//! Scopus records point at the Elsevier article API and at doi.org. The
//! former needs the API key and an explicit PDF accept parameter; the latter
//! lands on a publisher HTML page that has to be scraped for the PDF link.
//! Scraping fails often, so DOI-derived URLs never count towards the
//! required minimum.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use tia_common::models::SCOPUS_DOWNLOADER;
use tia_common::Result;
use tracing::{debug, error, warn};
use url::Url;

use super::{DownloadDriver, SimpleDownloader};
use crate::action::{DownloadAction, DownloadResult};
use crate::fetch::Fetcher;

pub struct ScopusDownloader {
    fetcher: Arc<dyn Fetcher>,
    simple: SimpleDownloader,
}

impl ScopusDownloader {
    pub fn new(fetcher: Arc<dyn Fetcher>, simple: SimpleDownloader) -> Self {
        Self { fetcher, simple }
    }

    /// PDF URL behind a doi.org link, or `None` with the reason in `errors`.
    async fn resolve_by_doi(&self, url: &str, errors: &mut Vec<String>) -> Option<String> {
        let page = match self.fetcher.fetch_page(url).await {
            Ok(p) => p,
            Err(e) => {
                error!(%url, error = %e, "cannot download html page from doi resolution");
                errors.push(format!("cannot download html page from doi resolution for {url}: {e}"));
                return None;
            }
        };

        if page.is_pdf() {
            return Some(page.final_url.to_string());
        }
        debug!(%url, "doi resolution html page: {}", page.body);

        if let Some(found) = citation_pdf_regex().captures(&page.body) {
            return Some(found[1].to_string());
        }

        for pattern in fallback_regexes() {
            if let Some(found) = pattern.captures(&page.body) {
                match page.final_url.join(&found[1]) {
                    Ok(resolved) => return Some(resolved.to_string()),
                    Err(e) => {
                        error!(%url, link = &found[1], "doi fallback redirect url is not a valid uri");
                        errors.push(format!(
                            "doi fallback redirect url is not a valid uri ({url}): {}: {e}",
                            &found[1]
                        ));
                    }
                }
            }
        }

        warn!(%url, "no url found in doi redirect html");
        errors.push(format!("no url found in doi redirect html ({url})"));
        None
    }
}

#[async_trait]
impl DownloadDriver for ScopusDownloader {
    fn name(&self) -> &str {
        SCOPUS_DOWNLOADER
    }

    async fn download(&self, action: &DownloadAction) -> Result<DownloadResult> {
        let mut errors = Vec::new();
        let mut urls = Vec::new();
        let mut optional = 0;

        for url in &action.urls {
            let mut url = url.trim().to_string();
            if url.is_empty() {
                continue;
            }
            if url.contains("elsevier.com") {
                match with_pdf_access(&url, action.credentials.as_deref()) {
                    Ok(rewritten) => url = rewritten,
                    Err(e) => {
                        error!(%url, "cannot interpret url");
                        errors.push(format!("cannot interpret {url} as a valid url: {e}"));
                        continue;
                    }
                }
            }
            if url.contains("doi.org") {
                match self.resolve_by_doi(&url, &mut errors).await {
                    Some(resolved) => {
                        url = resolved;
                        optional += 1;
                    }
                    None => continue,
                }
            }
            urls.push(url);
        }

        let mut delegated = action.clone();
        delegated.minimum_required = urls.len() - optional;
        delegated.urls = urls;

        let mut result = self.simple.download(&delegated).await?;
        result.errors.extend(errors);
        Ok(result)
    }
}

/// Ask the Elsevier article API for the PDF rendition.
pub fn with_pdf_access(url: &str, api_key: Option<&str>) -> std::result::Result<String, url::ParseError> {
    let mut parsed = Url::parse(url)?;
    parsed
        .query_pairs_mut()
        .append_pair("httpAccept", "application/pdf")
        .append_pair("apiKey", api_key.unwrap_or_default());
    Ok(parsed.to_string())
}

fn citation_pdf_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"name="citation_pdf_url"\s+content="([=?&0-9a-zA-Z:./_-]*)""#).expect("valid regex")
    })
}

fn fallback_regexes() -> &'static [Regex; 2] {
    static RE: OnceLock<[Regex; 2]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            Regex::new(r#"href="([=?&0-9a-zA-Z:./_-]+pdf[=?&0-9a-zA-Z:./_-]*)""#).expect("valid regex"),
            Regex::new(r#"([=?&0-9a-zA-Z:./_-]+pdf[=?&0-9a-zA-Z:./_-]*)""#).expect("valid regex"),
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::fake::FakeFetcher;
    use std::path::Path;

    const ELSEVIER: &str = "https://api.elsevier.com/content/article/doi/10.1016/j.x";
    const DOI: &str = "https://www.doi.org/10.5194/tc-17";

    fn action(urls: &[&str], dir: &Path) -> DownloadAction {
        DownloadAction::for_test(
            "g",
            "SCOPUS_ID:1",
            SCOPUS_DOWNLOADER,
            vec![],
            urls.iter().map(|u| u.to_string()).collect(),
            0,
            Some("KEY".into()),
            dir,
        )
    }

    fn driver(fetcher: Arc<FakeFetcher>) -> ScopusDownloader {
        ScopusDownloader::new(fetcher.clone(), SimpleDownloader::new(fetcher, None))
    }

    #[test]
    fn test_elsevier_url_gets_key_and_accept() {
        assert_eq!(
            with_pdf_access(ELSEVIER, Some("KEY")).unwrap(),
            format!("{ELSEVIER}?httpAccept=application%2Fpdf&apiKey=KEY")
        );
    }

    #[tokio::test]
    async fn test_citation_meta_tag_wins() {
        let dir = tempfile::tempdir().unwrap();
        let a = action(&[ELSEVIER, DOI], dir.path());
        a.create_local_directory().unwrap();
        let elsevier_pdf = format!("{ELSEVIER}?httpAccept=application%2Fpdf&apiKey=KEY");
        let body = r#"<meta name="citation_pdf_url" content="https://tc.example.org/tc-17.pdf"/>
                      <a href="/other.pdf">x</a>"#;
        let fetcher = Arc::new(
            FakeFetcher::default()
                .with_page(DOI, "https://tc.example.org/articles/17", "text/html", body)
                .with_file(&elsevier_pdf, "elsevier.pdf")
                .with_file("https://tc.example.org/tc-17.pdf", "tc-17.pdf"),
        );

        let result = driver(fetcher.clone()).download(&a).await.unwrap();
        assert_eq!(result.minimum_required, 1);
        assert_eq!(result.file_names.len(), 1);
        assert!(!result.below_minimum());
        assert!(!fetcher.calls().contains(&"https://tc.example.org/tc-17.pdf".to_string()));
    }

    #[tokio::test]
    async fn test_href_fallback_resolved_against_final_url() {
        let dir = tempfile::tempdir().unwrap();
        let a = action(&[DOI], dir.path());
        a.create_local_directory().unwrap();
        let fetcher = Arc::new(
            FakeFetcher::default()
                .with_page(DOI, "https://pub.example.org/article/17", "text/html", r#"<a href="/files/17.pdf">PDF</a>"#)
                .with_file("https://pub.example.org/files/17.pdf", "17.pdf"),
        );

        let result = driver(fetcher).download(&a).await.unwrap();
        assert_eq!(result.minimum_required, 0);
        assert!(result.succeeded);
    }

    #[tokio::test]
    async fn test_pdf_content_type_uses_final_url() {
        let dir = tempfile::tempdir().unwrap();
        let a = action(&[DOI], dir.path());
        a.create_local_directory().unwrap();
        let fetcher = Arc::new(
            FakeFetcher::default()
                .with_page(DOI, "https://pub.example.org/17.pdf", "application/pdf", "%PDF")
                .with_file("https://pub.example.org/17.pdf", "17.pdf"),
        );

        let result = driver(fetcher).download(&a).await.unwrap();
        assert_eq!(result.file_names.len(), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_doi_is_recorded_and_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let a = action(&[DOI], dir.path());
        a.create_local_directory().unwrap();
        let fetcher = Arc::new(FakeFetcher::default().with_page(DOI, DOI, "text/html", "<html>nothing</html>"));

        let result = driver(fetcher).download(&a).await.unwrap();
        assert!(!result.succeeded);
        assert!(!result.partial);
        assert!(result.errors.iter().any(|e| e.contains("no url found in doi redirect html")));
    }
}
