use std::time::Duration;

use reqwest::{redirect::Policy, Client, ClientBuilder, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Result, TiaError};

/// Browser identity some publishers require before serving a PDF.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin wrapper around `reqwest::Client` shared by every worker.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Client following redirects with reqwest's default policy.
    pub fn new() -> Result<Self> {
        Self::build(ClientBuilder::new())
    }

    /// Client that returns 3xx responses to the caller untouched.
    pub fn without_redirects() -> Result<Self> {
        Self::build(ClientBuilder::new().redirect(Policy::none()))
    }

    fn build(builder: ClientBuilder) -> Result<Self> {
        let client = builder
            .user_agent(BROWSER_USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TiaError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// GET `url` and return the body of a 2xx response, or `None` on 404.
    pub async fn get_text_opt(&self, url: &str) -> Result<Option<String>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TiaError::Contact(format!("cannot contact {url}: {e}")))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            debug!(url, "resource not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(TiaError::Contact(format!("error {status} contacting {url}")));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| TiaError::Contact(format!("cannot read response from {url}: {e}")))?;
        Ok(Some(body))
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.get_text_opt(url)
            .await?
            .ok_or_else(|| TiaError::Contact(format!("error 404 Not Found contacting {url}")))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_text(url).await?;
        decode_json(url, &body)
    }

    pub async fn get_json_opt<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        match self.get_text_opt(url).await? {
            Some(body) => decode_json(url, &body).map(Some),
            None => Ok(None),
        }
    }
}

fn decode_json<T: DeserializeOwned>(url: &str, body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| TiaError::Decode(format!("cannot parse json response from {url}: {e}")))
}
