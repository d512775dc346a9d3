//! Download drivers, selected by the record's `downloadDriver` name.

pub mod scopus;
pub mod simple;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tia_common::{Result, TiaError};

use crate::action::{DownloadAction, DownloadResult};
use crate::enrichment::Unpaywall;
use crate::fetch::Fetcher;

pub use scopus::ScopusDownloader;
pub use simple::SimpleDownloader;

#[async_trait]
pub trait DownloadDriver: Send + Sync {
    fn name(&self) -> &str;

    /// Attempt every URL of `action`. Only conditions that make the whole
    /// action pointless are returned as `Err`.
    async fn download(&self, action: &DownloadAction) -> Result<DownloadResult>;
}

#[derive(Clone, Default)]
pub struct DownloadDriverRegistry {
    drivers: BTreeMap<String, Arc<dyn DownloadDriver>>,
}

impl DownloadDriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the simple and Scopus downloaders. `fallback` enables
    /// the Unpaywall last-resort lookup.
    pub fn with_defaults(fetcher: Arc<dyn Fetcher>, fallback: Option<Unpaywall>) -> Self {
        let simple = SimpleDownloader::new(fetcher.clone(), fallback);
        let mut registry = Self::new();
        registry.register(Arc::new(ScopusDownloader::new(fetcher, simple.clone())));
        registry.register(Arc::new(simple));
        registry
    }

    pub fn register(&mut self, driver: Arc<dyn DownloadDriver>) {
        self.drivers.insert(driver.name().to_string(), driver);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn DownloadDriver>> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| TiaError::Configuration(format!("unrecognized download driver: {name}")))
    }
}
