//! tia-retriever
//! Downloads harvested documents with bounded retries and announces the
//! completed ones on the metadata queue.

pub mod action;
pub mod config;
pub mod drivers;
pub mod enrichment;
pub mod fetch;
pub mod retriever;
pub mod status_report;

pub use action::{DownloadAction, DownloadResult};
pub use drivers::{DownloadDriver, DownloadDriverRegistry};
pub use fetch::{Fetcher, HttpFetcher};
pub use retriever::{DocumentRetriever, RetrieverOptions};
