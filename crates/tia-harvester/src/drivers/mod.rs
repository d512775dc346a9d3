//! Repository drivers: one per external search API.

pub mod jrc;
pub mod json_path;
pub mod openalex;
pub mod scopus;

#[cfg(test)]
pub(crate) mod scripted;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tia_common::models::DocumentRecord;
use tia_common::{HttpClient, Result, TiaError};
use tracing::debug;
use url::Url;

use crate::access::RepositoryAccess;
use crate::query::Query;

/// Records returned by one page of a repository query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub records: Vec<DocumentRecord>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Common interface for all repository search clients.
///
/// A fresh driver is created per visit, so per-visit cursor state may live
/// on `self`.
#[async_trait]
pub trait RepositoryDriver: Send + Sync {
    fn name(&self) -> &str;

    /// Reset cursor state before a new pagination sequence.
    fn initialize(&mut self) {}

    /// Execute one page of `query`.
    async fn query(&mut self, group: &str, access: &RepositoryAccess, query: &Query) -> Result<QueryResult>;

    /// Outgoing request arguments for `query`, without executing it.
    fn query_as_string(&self, query: &Query, page_limit: Option<u32>) -> String;

    /// Whether [`proceed_with_next_page`](Self::proceed_with_next_page)
    /// decides the end of pagination instead of the empty-page rule.
    fn custom_pagination(&self) -> bool {
        false
    }

    fn proceed_with_next_page(&self) -> bool {
        false
    }
}

pub type DriverFactory = Arc<dyn Fn() -> Box<dyn RepositoryDriver> + Send + Sync>;

/// Name-keyed driver lookup. Unknown names are configuration errors.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    factories: BTreeMap<String, DriverFactory>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the JRC, Scopus and OpenAlex drivers.
    pub fn with_defaults(client: HttpClient) -> Self {
        let mut registry = Self::new();
        let c = client.clone();
        registry.register(jrc::DRIVER_NAME, move || Box::new(jrc::JrcDriver::new(c.clone())));
        let c = client.clone();
        registry.register(scopus::DRIVER_NAME, move || Box::new(scopus::ScopusDriver::new(c.clone())));
        registry.register(openalex::DRIVER_NAME, move || Box::new(openalex::OpenAlexDriver::new(client.clone())));
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn RepositoryDriver> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn RepositoryDriver>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| TiaError::Configuration(format!("unrecognized document repository driver: {name}")))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

/// Whether another page should be requested after `page`.
pub fn continue_pagination(driver: &dyn RepositoryDriver, page: &QueryResult) -> bool {
    if driver.custom_pagination() {
        driver.proceed_with_next_page()
    } else {
        !page.is_empty()
    }
}

/// Parse `raw` into a request URL, percent-encoding what needs it.
pub(crate) fn request_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| TiaError::Configuration(format!("bad request url {raw}: {e}")))
}

/// GET `url` and decode the JSON body. Transport failures and non-200
/// statuses are contact errors naming `repo_url`.
pub(crate) async fn get_json(
    client: &HttpClient,
    url: Url,
    headers: &[(&str, &str)],
    repo_url: &str,
) -> Result<(HeaderMap, Value)> {
    debug!(url = %url, "querying repository");
    let mut req = client.get(url.as_str());
    for (name, value) in headers {
        req = req.header(*name, *value);
    }
    let resp = req
        .send()
        .await
        .map_err(|e| TiaError::Contact(format!("cannot contact repository {repo_url}: {e}")))?;

    let status = resp.status();
    if status != reqwest::StatusCode::OK {
        return Err(TiaError::Contact(format!("Error {status} contacting repo at url {repo_url}")));
    }
    let headers = resp.headers().clone();
    let body = resp
        .text()
        .await
        .map_err(|e| TiaError::Contact(format!("cannot read response from {repo_url}: {e}")))?;
    let json = serde_json::from_str(&body)
        .map_err(|e| TiaError::Decode(format!("cannot parse json response: {e}")))?;
    Ok((headers, json))
}
