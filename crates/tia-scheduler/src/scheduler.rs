//! Decides when each repository is due for a visit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tia_common::models::RepositoryConfig;
use tia_common::queue::push_json;
use tia_common::{ConfigService, EventQueue, Result};
use tracing::{debug, error, info};

/// When each repository was last scheduled by this process.
///
/// Not persisted: after a restart every enabled repository is due once,
/// and the status ledger absorbs the duplicate visit downstream.
#[derive(Debug, Default)]
pub struct SchedulerState {
    last_scheduled: HashMap<String, DateTime<Utc>>,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_scheduled(&self, repo_id: &str) -> Option<DateTime<Utc>> {
        self.last_scheduled.get(repo_id).copied()
    }

    /// Fails when the repository's frequency cannot be represented. A next
    /// visit beyond the calendar range is never due.
    pub fn is_due(&self, repo: &RepositoryConfig, now: DateTime<Utc>) -> Result<bool> {
        let interval = repo.visit_interval()?;
        Ok(match self.last_scheduled(&repo.id) {
            None => true,
            Some(last) => last.checked_add_signed(interval).is_some_and(|next| now >= next),
        })
    }

    /// Push a visit event for every enabled repository that is due and
    /// return the ids scheduled. A repository whose push fails stays due.
    pub async fn tick(
        &mut self,
        now: DateTime<Utc>,
        repos: &[RepositoryConfig],
        queue: &dyn EventQueue,
    ) -> Vec<String> {
        let mut scheduled = Vec::new();
        for repo in repos {
            if !repo.enabled {
                info!(repo = %repo.name, "repository is disabled by configuration");
                continue;
            }
            debug!(
                repo = %repo.name,
                last_scheduled = ?self.last_scheduled(&repo.id),
                %now,
                "evaluating repository"
            );
            match self.is_due(repo, now) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(repo = %repo.name, "repository skipped");
                    continue;
                }
                Err(e) => {
                    error!(repo = %repo.name, error = %e, "repository not scheduled");
                    continue;
                }
            }

            info!(repo = %repo.name, "scheduling repository visit");
            match push_json(queue, repo).await {
                Ok(()) => {
                    self.last_scheduled.insert(repo.id.clone(), now);
                    scheduled.push(repo.id.clone());
                }
                Err(e) => error!(repo = %repo.name, error = %e, "cannot add repository visit to queue"),
            }
        }
        scheduled
    }
}

/// Poll the repository list and schedule visits forever.
pub async fn run(
    state: &mut SchedulerState,
    config: Arc<dyn ConfigService>,
    queue: &dyn EventQueue,
    polling_period: Duration,
) {
    info!("starting repository scheduling");
    loop {
        match config.repositories().await {
            Ok(repos) => {
                state.tick(Utc::now(), &repos, queue).await;
            }
            Err(e) => error!(error = %e, "error processing repositories"),
        }
        debug!("sleeping {} seconds", polling_period.as_secs());
        tokio::time::sleep(polling_period).await;
    }
}
