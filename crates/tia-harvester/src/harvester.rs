//! Repository visit: search bindings × missions × pages.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tia_common::daemon::EventHandler;
use tia_common::dates::format_date;
use tia_common::models::{KeywordDictionary, RepositoryConfig, SearchBinding, SearchConfiguration};
use tia_common::queue::push_json;
use tia_common::{CheckpointStore, ConfigService, EventQueue, Result, StatusStore};
use tracing::{debug, error, info, instrument};

use crate::access::RepositoryAccess;
use crate::drivers::{continue_pagination, DriverRegistry, RepositoryDriver};
use crate::query::Query;

/// Counters of one mission scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissionOutcome {
    pub mission: String,
    pub found: usize,
    pub queued: usize,
    pub skipped: usize,
    pub max_published_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitSummary {
    pub repository: String,
    pub missions: Vec<MissionOutcome>,
}

impl VisitSummary {
    pub fn total_found(&self) -> usize {
        self.missions.iter().map(|m| m.found).sum()
    }

    pub fn total_queued(&self) -> usize {
        self.missions.iter().map(|m| m.queued).sum()
    }
}

pub struct RepositoryHarvester {
    config: Arc<dyn ConfigService>,
    checkpoints: Arc<dyn CheckpointStore>,
    statuses: Arc<dyn StatusStore>,
    docs: Arc<dyn EventQueue>,
    drivers: DriverRegistry,
}

impl RepositoryHarvester {
    pub fn new(
        config: Arc<dyn ConfigService>,
        checkpoints: Arc<dyn CheckpointStore>,
        statuses: Arc<dyn StatusStore>,
        docs: Arc<dyn EventQueue>,
        drivers: DriverRegistry,
    ) -> Self {
        Self { config, checkpoints, statuses, docs, drivers }
    }

    /// Visit `repo` once for every search binding attached to it.
    #[instrument(skip(self, repo), fields(repo = %repo.name))]
    pub async fn visit_repository(&self, repo: &RepositoryConfig) -> Result<VisitSummary> {
        info!("starting repository visit");
        let mut summary = VisitSummary { repository: repo.name.clone(), missions: Vec::new() };

        for binding in self.config.search_bindings(&repo.id).await? {
            debug!(binding = %binding.id, "current repository search");
            let dictionary = self.config.keyword_dictionary(&binding.keyword_dictionary_id).await?;
            let group = self.config.group_acronym(&binding.id).await?;
            info!(dictionary = %dictionary.name, %group, "visiting repository");

            let missions = self.visit_binding(repo, &binding, &dictionary, &group).await?;
            summary.missions.extend(missions);
        }

        info!(found = summary.total_found(), queued = summary.total_queued(), "repository visit finished");
        Ok(summary)
    }

    async fn visit_binding(
        &self,
        repo: &RepositoryConfig,
        binding: &SearchBinding,
        dictionary: &KeywordDictionary,
        group: &str,
    ) -> Result<Vec<MissionOutcome>> {
        let search = SearchConfiguration::from(binding);
        let mut driver = self.drivers.create(&repo.driver)?;
        let access = RepositoryAccess::from_config(repo)?;
        let root = &dictionary.dictionary_definition;

        let mut outcomes = Vec::new();
        for i in 0..root.children.len() {
            let Some(keywords) = root.with_only_child(i) else { continue };
            let mission = root.children[i].mission_name().unwrap_or_default().to_string();

            let checkpoint = self.checkpoints.get(&binding.id, &repo.id, &mission).await?;
            let query = Query::new(keywords, checkpoint);

            let outcome = self
                .harvest_mission(driver.as_mut(), &access, query, &mission, group, &search)
                .await?;
            info!(
                %mission,
                start_date = %format_date(checkpoint),
                found = outcome.found,
                max_pub_date = %format_date(outcome.max_published_on),
                "mission scanned"
            );

            if let Some(max) = outcome.max_published_on {
                if checkpoint.map_or(true, |stored| max > stored) {
                    info!(%mission, "set max publication date {}", format_date(Some(max)));
                    self.checkpoints.set(&binding.id, &repo.id, &mission, max).await?;
                }
            }
            outcomes.push(outcome);

            if i + 1 < root.children.len() {
                if let Some(pause) = access.pause() {
                    info!("pausing between repo missions scan for {} seconds", pause.as_secs());
                    tokio::time::sleep(pause).await;
                }
            }
        }
        Ok(outcomes)
    }

    /// Page through one mission, queueing every record not yet completed
    /// or exhausted.
    pub async fn harvest_mission(
        &self,
        driver: &mut dyn RepositoryDriver,
        access: &RepositoryAccess,
        mut query: Query,
        mission: &str,
        group: &str,
        search: &SearchConfiguration,
    ) -> Result<MissionOutcome> {
        driver.initialize();
        let mut outcome = MissionOutcome { mission: mission.to_string(), ..Default::default() };
        let mut pages = 0;

        loop {
            let page = driver.query(group, access, &query).await?;
            info!("found {} results", page.records.len());

            pages += 1;
            outcome.found += page.records.len();
            query.advance(pages, outcome.found as u32);

            for mut record in page.records.iter().cloned() {
                record.document.keyword_dictionary_second_level = Some(mission.to_string());
                record.group = group.to_string();
                record.configuration = Some(search.clone());

                match self.statuses.get(&record.status_id()).await? {
                    Some(status) if status.completed || status.is_exhausted() => {
                        debug!(doc_id = %record.id, ?status, "previously downloaded or out of retries, skipping");
                        outcome.skipped += 1;
                    }
                    _ => match push_json(self.docs.as_ref(), &record).await {
                        Ok(()) => outcome.queued += 1,
                        Err(e) => error!(doc_id = %record.id, error = %e, "cannot push document event to queue"),
                    },
                }

                outcome.max_published_on = outcome.max_published_on.max(record.document.published_on);
            }

            let proceed = continue_pagination(driver, &page);

            if let Some(pause) = access.pause() {
                info!("pausing for {} seconds", pause.as_secs());
                tokio::time::sleep(pause).await;
            }
            if !proceed {
                break;
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl EventHandler for RepositoryHarvester {
    type Event = RepositoryConfig;

    async fn handle(&self, repo: RepositoryConfig) -> Result<()> {
        self.visit_repository(&repo).await.map(|_| ())
    }
}
