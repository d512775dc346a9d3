//! tia-test-utils
//! In-process stand-ins for the configuration service and fixture builders
//! shared by the worker crates' tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tia_common::models::{
    Document, DocumentRecord, DownloadInfo, KeywordDictionary, PublicationDetails, RepositoryConfig,
    RepositoryRef, SearchBinding, SIMPLE_DOWNLOADER,
};
use tia_common::{ConfigService, Result, TiaError};
use tokio::sync::Mutex;

/// Configuration service answering from maps filled by the test.
#[derive(Default)]
pub struct StaticConfigService {
    repositories: Mutex<Vec<RepositoryConfig>>,
    bindings: HashMap<String, Vec<SearchBinding>>,
    dictionaries: HashMap<String, KeywordDictionary>,
    acronyms: HashMap<String, String>,
    fail_repositories: bool,
}

impl StaticConfigService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(mut self, repo: RepositoryConfig) -> Self {
        self.repositories.get_mut().push(repo);
        self
    }

    /// Bind dictionary `dictionary_id` to `repo_id`, owned by `group`.
    pub fn with_binding(mut self, repo_id: &str, binding_id: &str, dictionary_id: &str, group: &str) -> Self {
        self.bindings.entry(repo_id.to_string()).or_default().push(SearchBinding {
            id: binding_id.to_string(),
            initiative_id: "i1".to_string(),
            document_type_id: "dt1".to_string(),
            keyword_dictionary_id: dictionary_id.to_string(),
            document_repository_ids: vec![repo_id.to_string()],
        });
        self.acronyms.insert(binding_id.to_string(), group.to_string());
        self
    }

    pub fn with_dictionary(mut self, id: &str, dictionary: KeywordDictionary) -> Self {
        self.dictionaries.insert(id.to_string(), dictionary);
        self
    }

    /// Make `repositories()` fail with a contact error.
    pub fn unreachable(mut self) -> Self {
        self.fail_repositories = true;
        self
    }

    pub async fn set_repositories(&self, repos: Vec<RepositoryConfig>) {
        *self.repositories.lock().await = repos;
    }
}

#[async_trait]
impl ConfigService for StaticConfigService {
    async fn repositories(&self) -> Result<Vec<RepositoryConfig>> {
        if self.fail_repositories {
            return Err(TiaError::Contact("configuration service unreachable".into()));
        }
        Ok(self.repositories.lock().await.clone())
    }

    async fn search_bindings(&self, repo_id: &str) -> Result<Vec<SearchBinding>> {
        Ok(self.bindings.get(repo_id).cloned().unwrap_or_default())
    }

    async fn keyword_dictionary(&self, id: &str) -> Result<KeywordDictionary> {
        self.dictionaries
            .get(id)
            .cloned()
            .ok_or_else(|| TiaError::Contact(format!("error 404 Not Found: keyword dictionary {id}")))
    }

    async fn group_acronym(&self, binding_id: &str) -> Result<String> {
        self.acronyms
            .get(binding_id)
            .cloned()
            .ok_or_else(|| TiaError::Contact(format!("error 404 Not Found: binding {binding_id}")))
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn repository(id: &str, driver: &str, frequency: u64) -> RepositoryConfig {
    RepositoryConfig {
        id: id.to_string(),
        name: format!("{id}-name"),
        url: format!("https://{id}.example.org/api"),
        driver: driver.to_string(),
        credentials: None,
        frequency,
        enabled: true,
        page_limit: None,
        pause_between_pages: None,
        last_visit: None,
    }
}

/// Record as a repository driver would return it, with one PDF URL.
pub fn document_record(driver: &str, id: &str, published_on: Option<NaiveDate>) -> DocumentRecord {
    DocumentRecord {
        id: id.to_string(),
        group: String::new(),
        configuration: None,
        repository: RepositoryRef {
            driver: driver.to_string(),
            url: format!("https://{driver}.example.org/api"),
            credentials: None,
        },
        document: Document {
            doi: vec![format!("10.1234/{id}")],
            title: format!("Document {id}"),
            published_on,
            ..Default::default()
        },
        download_info: DownloadInfo {
            document_url: vec![format!("https://files.example.org/{id}.pdf")],
            minimum_required: Some(1),
            download_driver: SIMPLE_DOWNLOADER.to_string(),
            credentials: None,
        },
        publication_details: PublicationDetails::default(),
        raw_search_result_record: serde_json::json!({ "id": id }).to_string(),
    }
}
