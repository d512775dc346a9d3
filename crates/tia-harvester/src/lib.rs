//! tia-harvester
//! Visits document repositories, translates keyword dictionaries into each
//! repository's query language and queues the new documents for download.

pub mod access;
pub mod config;
pub mod drivers;
pub mod harvester;
pub mod query;
pub mod reporter;

pub use access::RepositoryAccess;
pub use drivers::{DriverRegistry, QueryResult, RepositoryDriver};
pub use harvester::{MissionOutcome, RepositoryHarvester, VisitSummary};
pub use query::Query;
