//! External metadata services queried per DOI while a document is retrieved.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::fetch::Fetcher;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSettings {
    #[serde(default)]
    pub unpaywall_enabled: bool,
    #[serde(default = "default_unpaywall_url")]
    pub unpaywall_url: String,
    #[serde(default)]
    pub unpaywall_email: String,
    #[serde(default)]
    pub crossref_enabled: bool,
    #[serde(default = "default_crossref_url")]
    pub crossref_url: String,
    #[serde(default)]
    pub opencitations_enabled: bool,
    #[serde(default = "default_opencitations_url")]
    pub opencitations_url: String,
}

fn default_unpaywall_url()     -> String { "https://api.unpaywall.org/v2/".to_string() }
fn default_crossref_url()      -> String { "https://api.crossref.org/works/".to_string() }
fn default_opencitations_url() -> String { "https://opencitations.net/index/api/v2/metadata/".to_string() }

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            unpaywall_enabled: false,
            unpaywall_url: default_unpaywall_url(),
            unpaywall_email: String::new(),
            crossref_enabled: false,
            crossref_url: default_crossref_url(),
            opencitations_enabled: false,
            opencitations_url: default_opencitations_url(),
        }
    }
}

impl EnrichmentSettings {
    pub fn unpaywall(&self) -> Unpaywall {
        Unpaywall { url: self.unpaywall_url.clone(), email: self.unpaywall_email.clone() }
    }

    pub fn enabled_services(&self) -> Vec<MetadataService> {
        let mut services = Vec::new();
        if self.unpaywall_enabled {
            services.push(MetadataService::Unpaywall(self.unpaywall()));
        }
        if self.crossref_enabled {
            services.push(MetadataService::CrossRef { url: self.crossref_url.clone() });
        }
        if self.opencitations_enabled {
            services.push(MetadataService::OpenCitations { url: self.opencitations_url.clone() });
        }
        services
    }
}

/// Unpaywall endpoint, also used as the last-resort PDF locator.
#[derive(Debug, Clone, PartialEq)]
pub struct Unpaywall {
    pub url: String,
    pub email: String,
}

impl Unpaywall {
    pub fn resolve(&self, doi: &str) -> String {
        format!("{}{}?email={}", self.url, doi, self.email)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataService {
    Unpaywall(Unpaywall),
    CrossRef { url: String },
    OpenCitations { url: String },
}

impl MetadataService {
    pub fn file_prefix(&self) -> &'static str {
        match self {
            MetadataService::Unpaywall(_) => "unpaywall-metadata",
            MetadataService::CrossRef { .. } => "cross-ref-metadata",
            MetadataService::OpenCitations { .. } => "open-citations-metadata",
        }
    }

    pub fn resolve(&self, doi: &str) -> String {
        match self {
            MetadataService::Unpaywall(u) => u.resolve(doi),
            MetadataService::CrossRef { url } => format!("{url}{doi}"),
            MetadataService::OpenCitations { url } => format!("{url}doi:{doi}"),
        }
    }

    /// Output file for the DOI at `index`: `<prefix>.json` for the first,
    /// `<prefix>-<index-1>.json` after that.
    pub fn file_name(&self, index: usize) -> String {
        match index {
            0 => format!("{}.json", self.file_prefix()),
            i => format!("{}-{}.json", self.file_prefix(), i - 1),
        }
    }
}

/// Query `service` for every DOI and write the responses into `dir`.
/// Failures are logged and skipped. Returns how many files were written.
pub async fn write_service_metadata(
    fetcher: &dyn Fetcher,
    service: &MetadataService,
    dir: &Path,
    dois: &[String],
) -> usize {
    let mut written = 0;
    for (i, doi) in dois.iter().enumerate() {
        let url = service.resolve(doi);
        let value = match fetcher.fetch_json(&url).await {
            Ok(v) => v,
            Err(e) => {
                error!(service = service.file_prefix(), %doi, error = %e, "cannot get metadata");
                continue;
            }
        };
        let path = dir.join(service.file_name(i));
        let pretty = match serde_json::to_string_pretty(&value) {
            Ok(p) => p,
            Err(e) => {
                error!(service = service.file_prefix(), %doi, error = %e, "cannot serialize metadata");
                continue;
            }
        };
        match std::fs::write(&path, pretty) {
            Ok(()) => {
                debug!(path = %path.display(), "metadata written");
                written += 1;
            }
            Err(e) => error!(path = %path.display(), error = %e, "cannot write metadata"),
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::fake::FakeFetcher;
    use serde_json::json;

    #[test]
    fn test_service_urls() {
        let settings = EnrichmentSettings {
            unpaywall_enabled: true,
            unpaywall_email: "ops@example.org".into(),
            crossref_enabled: true,
            opencitations_enabled: true,
            opencitations_url: "https://oc.example.org/meta/".into(),
            ..Default::default()
        };
        let services = settings.enabled_services();
        assert_eq!(services.len(), 3);
        assert_eq!(services[0].resolve("10.1/x"), "https://api.unpaywall.org/v2/10.1/x?email=ops@example.org");
        assert_eq!(services[1].resolve("10.1/x"), "https://api.crossref.org/works/10.1/x");
        assert_eq!(services[2].resolve("10.1/x"), "https://oc.example.org/meta/doi:10.1/x");
    }

    #[test]
    fn test_disabled_by_default() {
        assert!(EnrichmentSettings::default().enabled_services().is_empty());
    }

    #[tokio::test]
    async fn test_one_file_per_doi_and_failures_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let service = MetadataService::CrossRef { url: "https://cr.example.org/".into() };
        let fetcher = FakeFetcher::default()
            .with_json("https://cr.example.org/10.1/a", json!({"title": "A"}))
            .with_json("https://cr.example.org/10.1/c", json!({"title": "C"}));

        let dois = vec!["10.1/a".to_string(), "10.1/b".to_string(), "10.1/c".to_string()];
        let written = write_service_metadata(&fetcher, &service, dir.path(), &dois).await;

        assert_eq!(written, 2);
        assert!(dir.path().join("cross-ref-metadata.json").exists());
        assert!(!dir.path().join("cross-ref-metadata-0.json").exists());
        assert!(dir.path().join("cross-ref-metadata-1.json").exists());
    }
}
