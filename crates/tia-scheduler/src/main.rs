//! TIA scheduler entry point.

use std::sync::Arc;

use tia_common::pg::{self, PgQueue};
use tia_common::HttpConfigService;
use tia_scheduler::config::Config;
use tia_scheduler::{run, SchedulerState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tia_scheduler=debug,tia_common=info,info")),
        )
        .init();

    let config = Config::load()?;
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(polling_period_secs = config.polling_period_secs, "configuration loaded");

    let pool = pg::connect(&config.store).await?;
    let queue = PgQueue::new(pool, &config.queues.repo);
    let service = Arc::new(HttpConfigService::new(&config.config_service.base_url)?);

    let mut state = SchedulerState::new();
    run(&mut state, service, &queue, config.polling_period()).await;
    Ok(())
}
