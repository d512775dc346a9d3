//! TIA harvester entry point.
//!
//! Daemon mode (the default) consumes repository events and queues the
//! documents found. The print and query modes are dry runs that never touch
//! the queues or stores.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tia_common::daemon::run_worker;
use tia_common::pg::{self, PgQueue, PgStatusStore};
use tia_common::{HttpClient, HttpConfigService};
use tia_harvester::config::Config;
use tia_harvester::reporter::Reporter;
use tia_harvester::{DriverRegistry, RepositoryHarvester};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tia-harvester", version, about = "Harvest documents from scholarly repositories")]
struct Cli {
    /// Consume repository events and queue the documents found
    #[arg(short = 'd', long, group = "mode")]
    daemon: bool,

    /// Log the query each driver would send for every mission
    #[arg(short = 'p', long, group = "mode")]
    print_queries: bool,

    /// Run the configured queries and write a CSV report
    #[arg(short = 'q', long, group = "mode")]
    query: bool,

    /// Include abstracts and publication details in the report, and log at debug level
    #[arg(short = 'v', long)]
    verbose: bool,
}

/// Fallback used when `RUST_LOG` is unset.
fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "tia_harvester=debug,tia_common=info,info"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_filter(cli.verbose))),
        )
        .init();

    let config = Config::load()?;
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let drivers = DriverRegistry::with_defaults(HttpClient::new()?);

    if cli.print_queries {
        let dictionary = config.query_mode.load_dictionary()?;
        Reporter::new(drivers, dictionary).print_queries()?;
        return Ok(());
    }

    if cli.query {
        let dictionary = config.query_mode.load_dictionary()?;
        let path = &config.query_mode.output_file;
        let file = std::fs::File::create(path)
            .with_context(|| format!("cannot create report file {path}"))?;
        let mut out = std::io::BufWriter::new(file);
        Reporter::new(drivers, dictionary)
            .write_report(&config.query_mode.repositories, &mut out, cli.verbose)
            .await?;
        info!(report = %path, "query report written");
        return Ok(());
    }

    let pool = pg::connect(config.store()?).await?;
    info!("✅ Store connected.");

    let service = Arc::new(HttpConfigService::new(&config.config_service.base_url)?);
    let harvester = RepositoryHarvester::new(
        service.clone(),
        service,
        Arc::new(PgStatusStore::new(pool.clone())),
        Arc::new(PgQueue::new(pool.clone(), &config.queues.docs)),
        drivers,
    );
    let repo_queue = PgQueue::new(pool, &config.queues.repo);

    info!(queue = %config.queues.repo, "harvester waiting for repository events");
    run_worker(&repo_queue, &harvester, &config.daemon).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_raises_log_fallback() {
        assert_eq!(default_log_filter(true), "debug");
        assert_eq!(default_log_filter(false), "tia_harvester=debug,tia_common=info,info");

        let cli = Cli::try_parse_from(["tia-harvester", "-v"]).unwrap();
        assert!(cli.verbose);
    }
}
