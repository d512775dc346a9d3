//! HTTP access used by the download drivers and the enrichment services.
//!
//! Downloads follow redirects by hand so that the `Location` header can be
//! cleaned up before the next hop; publishers frequently send unencoded
//! spaces or doubly-encoded paths there.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_TYPE, LOCATION};
use reqwest::Response;
use serde_json::Value;
use tia_common::{HttpClient, Result, TiaError};
use tracing::{debug, info, instrument};
use url::Url;

pub const MAX_HOPS: usize = 10;

/// A fetched HTML (or PDF) page after redirects.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub final_url: Url,
    pub content_type: Option<String>,
    pub body: String,
}

impl Page {
    pub fn is_pdf(&self) -> bool {
        self.content_type.as_deref().is_some_and(is_pdf)
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url` into `dir` and return the written file.
    async fn download_file(&self, url: &str, dir: &Path) -> Result<PathBuf>;

    async fn fetch_page(&self, url: &str) -> Result<Page>;

    async fn fetch_json(&self, url: &str) -> Result<Value>;
}

pub struct HttpFetcher {
    downloads: HttpClient,
    api: HttpClient,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self { downloads: HttpClient::without_redirects()?, api: HttpClient::new()? })
    }

    async fn follow(&self, url: &str) -> Result<(Url, Response)> {
        let mut current = Url::parse(url)
            .map_err(|e| TiaError::Download(format!("url '{url}' is malformed: {e}")))?;

        for _ in 0..MAX_HOPS {
            let resp = self
                .downloads
                .get(current.as_str())
                .send()
                .await
                .map_err(|e| TiaError::Contact(format!("cannot contact {current}: {e}")))?;

            let status = resp.status();
            if status.is_redirection() {
                current = next_location(&current, resp.headers())?;
                continue;
            }
            if status.is_client_error() || status.is_server_error() {
                return Err(TiaError::Download(format!(
                    "http error {} returned by url {current}",
                    status.as_u16()
                )));
            }
            return Ok((current, resp));
        }
        Err(TiaError::Download("maximum number of location redirects reached".into()))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self, dir))]
    async fn download_file(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let (_, resp) = self.follow(url).await?;
        let content_type = header_str(resp.headers(), CONTENT_TYPE.as_str());
        let disposition = header_str(resp.headers(), CONTENT_DISPOSITION.as_str());

        let name = disposition
            .as_deref()
            .and_then(disposition_filename)
            .unwrap_or_else(|| url_file_name(url));
        let name = match content_type.as_deref() {
            Some(ct) if is_pdf(ct) => pdf_file_name(&name),
            _ => name,
        };

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TiaError::Download(format!("cannot read body of {url}: {e}")))?;
        let path = dir.join(name);
        tokio::fs::write(&path, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "file written");
        Ok(path)
    }

    #[instrument(skip(self))]
    async fn fetch_page(&self, url: &str) -> Result<Page> {
        let (final_url, resp) = self.follow(url).await?;
        let content_type = header_str(resp.headers(), CONTENT_TYPE.as_str());
        let body = resp
            .text()
            .await
            .map_err(|e| TiaError::Download(format!("cannot read page {final_url}: {e}")))?;
        Ok(Page { final_url, content_type, body })
    }

    async fn fetch_json(&self, url: &str) -> Result<Value> {
        self.api.get_json(url).await
    }
}

// ── Redirect and file-name helpers ───────────────────────────────────────────

/// Resolve the `Location` header of a 3xx response against `current`.
pub fn next_location(current: &Url, headers: &HeaderMap) -> Result<Url> {
    let location = header_str(headers, LOCATION.as_str()).ok_or_else(|| {
        TiaError::Download("redirection http code detected but \"Location\" header is missing".into())
    })?;
    let sanitized = urlencoding::decode(&location)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| location.clone())
        .replace(' ', "%20");
    info!(%location, %sanitized, "following redirect");
    current
        .join(&sanitized)
        .map_err(|e| TiaError::Download(format!("bad redirect location {location}: {e}")))
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn is_pdf(content_type: &str) -> bool {
    content_type.contains("application/pdf")
}

fn url_file_name(url: &str) -> String {
    let path = Url::parse(url).map(|u| u.path().to_string()).unwrap_or_default();
    match path.rsplit('/').next() {
        Some(last) if !last.is_empty() => last.to_string(),
        _ => "document".to_string(),
    }
}

fn disposition_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)filename\*?\s*=\s*(?:UTF-8'')?"?([^";]+)"?"#).expect("valid regex")
    })
}

/// File name suggested by a `Content-Disposition` header.
pub fn disposition_filename(value: &str) -> Option<String> {
    disposition_regex()
        .captures(value)
        .map(|c| c[1].trim().to_string())
        .map(|name| name.rsplit(['/', '\\']).next().unwrap_or_default().to_string())
        .filter(|name| !name.is_empty())
}

/// Force a `.pdf` extension: append it, or replace everything from the first dot.
pub fn pdf_file_name(name: &str) -> String {
    match name.find('.') {
        None => format!("{name}.pdf"),
        Some(dot) => format!("{}.pdf", &name[..dot]),
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Fetcher answering from canned responses. Unknown URLs fail.
    #[derive(Default)]
    pub struct FakeFetcher {
        pub files: HashMap<String, String>,
        pub pages: HashMap<String, Page>,
        pub json: HashMap<String, Value>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn with_file(mut self, url: &str, name: &str) -> Self {
            self.files.insert(url.to_string(), name.to_string());
            self
        }

        pub fn with_page(mut self, url: &str, final_url: &str, content_type: &str, body: &str) -> Self {
            self.pages.insert(
                url.to_string(),
                Page {
                    final_url: Url::parse(final_url).expect("valid url"),
                    content_type: Some(content_type.to_string()),
                    body: body.to_string(),
                },
            );
            self
        }

        pub fn with_json(mut self, url: &str, value: Value) -> Self {
            self.json.insert(url.to_string(), value);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("poisoned").clone()
        }

        fn record(&self, url: &str) {
            self.calls.lock().expect("poisoned").push(url.to_string());
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn download_file(&self, url: &str, dir: &Path) -> Result<PathBuf> {
            self.record(url);
            let name = self
                .files
                .get(url)
                .ok_or_else(|| TiaError::Download(format!("http error 404 returned by url {url}")))?;
            let path = dir.join(name);
            std::fs::write(&path, b"%PDF-1.4")?;
            Ok(path)
        }

        async fn fetch_page(&self, url: &str) -> Result<Page> {
            self.record(url);
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| TiaError::Download(format!("http error 404 returned by url {url}")))
        }

        async fn fetch_json(&self, url: &str) -> Result<Value> {
            self.record(url);
            self.json
                .get(url)
                .cloned()
                .ok_or_else(|| TiaError::Contact(format!("error 404 Not Found contacting {url}")))
        }
    }
}
