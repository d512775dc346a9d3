//! TIA retriever entry point.
//!
//! Daemon mode (the default) consumes document events. The other modes are
//! operator tools: a one-off test download, a status listing and a retry
//! counter reset.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tia_common::daemon::run_worker;
use tia_common::models::SIMPLE_DOWNLOADER;
use tia_common::pg::{self, PgQueue, PgStatusStore};
use tia_retriever::config::Config;
use tia_retriever::status_report::{query_statuses, reset_failed, StatusFilter};
use tia_retriever::{DocumentRetriever, DownloadAction, DownloadDriverRegistry, Fetcher, HttpFetcher, RetrieverOptions};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum UpdateTarget {
    #[value(name = "RESET_RETRY_COUNTER")]
    ResetRetryCounter,
}

#[derive(Parser, Debug)]
#[command(name = "tia-retriever", version, about = "Download harvested documents")]
struct Cli {
    /// Consume document events (default mode)
    #[arg(long, group = "mode")]
    daemon: bool,

    /// Download one document through the given driver, bypassing the status store
    #[arg(short = 't', long, group = "mode")]
    test: bool,

    /// List document statuses
    #[arg(short = 'q', long, group = "mode")]
    query: bool,

    /// Apply an update to the status store
    #[arg(short = 'U', long, group = "mode")]
    update: bool,

    #[arg(short = 'f', long, default_value = "ALL")]
    filter: StatusFilter,

    #[arg(short = 'T', long, value_enum)]
    target: Option<UpdateTarget>,

    #[arg(short = 'i', long, default_value = "test-document")]
    id: String,

    #[arg(short = 'd', long, default_value = SIMPLE_DOWNLOADER)]
    driver: String,

    #[arg(short = 'D', long = "doi")]
    dois: Vec<String>,

    #[arg(short = 'u', long = "url")]
    urls: Vec<String>,

    #[arg(short = 'c', long)]
    credentials: Option<String>,

    /// Output directory, defaults to download.path
    #[arg(short = 'p', long)]
    path: Option<PathBuf>,

    #[arg(short = 'g', long, default_value = "test-group")]
    group: String,

    /// Log at debug level
    #[arg(short = 'v', long)]
    verbose: bool,
}

/// Fallback used when `RUST_LOG` is unset.
fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "tia_retriever=debug,tia_common=info,info"
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

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new()?);
    let fallback = config
        .download
        .unpaywall_fallback_enabled
        .then(|| config.enrichment.unpaywall());
    let drivers = DownloadDriverRegistry::with_defaults(fetcher.clone(), fallback);

    if cli.test {
        let base = cli.path.clone().unwrap_or_else(|| PathBuf::from(&config.download.path));
        let action = DownloadAction::for_test(
            &cli.group, &cli.id, &cli.driver, cli.dois, cli.urls, 1, cli.credentials, &base,
        );
        action.create_local_directory()?;
        let result = drivers.get(&action.driver)?.download(&action).await?;
        info!(
            succeeded = result.succeeded,
            partial = result.partial,
            files = ?result.file_names,
            "test download finished"
        );
        for error in &result.errors {
            warn!("{error}");
        }
        return Ok(());
    }

    let pool = pg::connect(config.store()?).await?;
    let statuses = Arc::new(PgStatusStore::new(pool.clone()));

    if cli.query {
        let mut out = std::io::stdout().lock();
        query_statuses(statuses.as_ref(), cli.filter, &mut out).await?;
        return Ok(());
    }

    if cli.update {
        match cli.target {
            Some(UpdateTarget::ResetRetryCounter) => {
                reset_failed(statuses.as_ref(), config.download.max_retry).await?;
            }
            None => anyhow::bail!("--update requires --target RESET_RETRY_COUNTER"),
        }
        return Ok(());
    }

    let retriever = DocumentRetriever::new(
        statuses,
        Arc::new(PgQueue::new(pool.clone(), &config.queues.metadata)),
        drivers,
        fetcher,
        RetrieverOptions {
            download_path: PathBuf::from(&config.download.path),
            max_retry: config.download.max_retry,
            enrichment: config.enrichment.clone(),
        },
    );
    let docs = PgQueue::new(pool, &config.queues.docs);

    info!(queue = %config.queues.docs, "retriever waiting for document events");
    run_worker(&docs, &retriever, &config.daemon).await;
    Ok(())
}
