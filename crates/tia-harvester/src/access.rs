use std::time::Duration;

use tia_common::models::RepositoryConfig;
use tia_common::{Result, TiaError};
use url::Url;

/// Connection details of one repository, derived from its configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryAccess {
    pub url: Url,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Opaque credential string (API key) when it is not `user:password`.
    pub credentials: Option<String>,
    pub page_limit: Option<u32>,
    pub pause_between_pages: Option<u64>,
}

impl RepositoryAccess {
    pub fn from_config(repo: &RepositoryConfig) -> Result<Self> {
        let url = Url::parse(&repo.url).map_err(|e| {
            TiaError::Configuration(format!("repository \"{}\" bad url: {} ({e})", repo.name, repo.url))
        })?;

        let (username, password, credentials) = match repo.credentials.as_deref() {
            Some(c) => match c.split_once(':') {
                Some((user, pass)) => (Some(user.to_string()), Some(pass.to_string()), None),
                None => (None, None, Some(c.to_string())),
            },
            None => (None, None, None),
        };

        Ok(Self {
            url,
            username,
            password,
            credentials,
            page_limit: repo.page_limit,
            pause_between_pages: repo.pause_between_pages,
        })
    }

    /// Repository URL as configured, without the trailing slash `Url` adds
    /// to bare hosts.
    pub fn base_url(&self) -> String {
        self.url.as_str().trim_end_matches('/').to_string()
    }

    pub fn pause(&self) -> Option<Duration> {
        self.pause_between_pages.map(Duration::from_secs)
    }
}
