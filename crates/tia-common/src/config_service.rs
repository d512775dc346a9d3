//! Client for the TIA configuration service.
//!
//! The service owns repositories, search bindings, keyword dictionaries,
//! credentials and the per-mission checkpoints.

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, instrument};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::{Result, TiaError};
use crate::http::HttpClient;
use crate::models::{merge_credentials, Credential, KeywordDictionary, RepositoryConfig, SearchBinding};

#[async_trait]
pub trait ConfigService: Send + Sync {
    /// All repositories, with credentials attached.
    async fn repositories(&self) -> Result<Vec<RepositoryConfig>>;

    async fn search_bindings(&self, repo_id: &str) -> Result<Vec<SearchBinding>>;

    async fn keyword_dictionary(&self, id: &str) -> Result<KeywordDictionary>;

    /// Acronym of the group owning a search binding.
    async fn group_acronym(&self, binding_id: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct HttpConfigService {
    client: HttpClient,
    base_url: String,
}

impl HttpConfigService {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn checkpoint_url(&self, binding_id: &str, repo_id: &str, mission: &str) -> String {
        self.endpoint(&format!(
            "query-max-publication-date/{}/{}/{}",
            urlencoding::encode(binding_id),
            urlencoding::encode(repo_id),
            urlencoding::encode(mission)
        ))
    }
}

fn clean_acronym(body: &str) -> String {
    body.trim().trim_matches('"').to_string()
}

#[async_trait]
impl ConfigService for HttpConfigService {
    #[instrument(skip(self))]
    async fn repositories(&self) -> Result<Vec<RepositoryConfig>> {
        let mut repos: Vec<RepositoryConfig> =
            self.client.get_json(&self.endpoint("document-repositories")).await?;
        let credentials: Vec<Credential> = self.client.get_json(&self.endpoint("credentials")).await?;
        merge_credentials(&mut repos, &credentials);
        debug!(count = repos.len(), "repositories loaded");
        Ok(repos)
    }

    #[instrument(skip(self))]
    async fn search_bindings(&self, repo_id: &str) -> Result<Vec<SearchBinding>> {
        let url = self.endpoint(&format!(
            "repository-search-bindings/by-doc-repo/{}",
            urlencoding::encode(repo_id)
        ));
        self.client.get_json(&url).await
    }

    #[instrument(skip(self))]
    async fn keyword_dictionary(&self, id: &str) -> Result<KeywordDictionary> {
        let url = self.endpoint(&format!("keyword-dictionaries/{}", urlencoding::encode(id)));
        self.client.get_json(&url).await
    }

    #[instrument(skip(self))]
    async fn group_acronym(&self, binding_id: &str) -> Result<String> {
        let url = self.endpoint(&format!(
            "repository-search-bindings/{}/acronym",
            urlencoding::encode(binding_id)
        ));
        let body = self.client.get_text(&url).await?;
        Ok(clean_acronym(&body))
    }
}

#[async_trait]
impl CheckpointStore for HttpConfigService {
    #[instrument(skip(self))]
    async fn get(&self, binding_id: &str, repo_id: &str, mission: &str) -> Result<Option<NaiveDate>> {
        let url = self.checkpoint_url(binding_id, repo_id, mission);
        let checkpoint: Option<Checkpoint> = self.client.get_json_opt(&url).await?;
        Ok(checkpoint.map(|c| c.max_publication_date))
    }

    #[instrument(skip(self))]
    async fn set(&self, binding_id: &str, repo_id: &str, mission: &str, date: NaiveDate) -> Result<()> {
        let url = self.endpoint("query-max-publication-date");
        let body = Checkpoint::new(binding_id, repo_id, mission, date);
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TiaError::Contact(format!("cannot contact {url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(TiaError::Contact(format!("error {} contacting {url}", resp.status())));
        }
        Ok(())
    }
}
