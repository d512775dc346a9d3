//! Scheduler → harvester → retriever over in-memory queues and stores.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::Value;
use tia_common::daemon::{poll_once, Poll};
use tia_common::models::{KeywordDictionary, KeywordDictionaryNode};
use tia_common::{
    CheckpointStore, DocumentStatus, EventQueue, MemoryCheckpointStore, MemoryQueue, MemoryStatusStore, Result,
    StatusStore, TiaError,
};
use tia_harvester::{DriverRegistry, Query, QueryResult, RepositoryAccess, RepositoryDriver, RepositoryHarvester};
use tia_retriever::fetch::{Fetcher, Page};
use tia_retriever::{DocumentRetriever, DownloadDriverRegistry, RetrieverOptions};
use tia_scheduler::SchedulerState;
use tia_test_utils::{document_record, repository, StaticConfigService};

/// Repository returning two records on the first page and nothing after.
struct TwoRecordRepository;

#[async_trait]
impl RepositoryDriver for TwoRecordRepository {
    fn name(&self) -> &str {
        "fake"
    }

    async fn query(&mut self, _group: &str, _access: &RepositoryAccess, query: &Query) -> Result<QueryResult> {
        if query.page_number > 0 {
            return Ok(QueryResult::default());
        }
        Ok(QueryResult {
            records: vec![
                document_record("fake", "d1", NaiveDate::from_ymd_opt(2024, 3, 1)),
                document_record("fake", "d2", NaiveDate::from_ymd_opt(2024, 4, 1)),
            ],
        })
    }

    fn query_as_string(&self, _query: &Query, _page_limit: Option<u32>) -> String {
        String::new()
    }
}

/// Writes a small file for every URL under files.example.org.
struct LocalFiles;

#[async_trait]
impl Fetcher for LocalFiles {
    async fn download_file(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let name = url
            .strip_prefix("https://files.example.org/")
            .ok_or_else(|| TiaError::Download(format!("http error 404 returned by url {url}")))?;
        let path = dir.join(name);
        std::fs::write(&path, b"%PDF-1.4")?;
        Ok(path)
    }

    async fn fetch_page(&self, url: &str) -> Result<Page> {
        Err(TiaError::Download(format!("unexpected page fetch {url}")))
    }

    async fn fetch_json(&self, url: &str) -> Result<Value> {
        Err(TiaError::Contact(format!("unexpected json fetch {url}")))
    }
}

fn dictionary() -> KeywordDictionary {
    KeywordDictionary {
        id: Some("k1".into()),
        name: "EO".into(),
        dictionary_definition: KeywordDictionaryNode::new(
            &[],
            true,
            vec![KeywordDictionaryNode::new(&["m1"], false, vec![])],
        ),
    }
}

#[tokio::test]
async fn test_repository_to_metadata_event() {
    let repo = repository("r1", "fake", 60);
    let config = Arc::new(
        StaticConfigService::new()
            .with_repository(repo.clone())
            .with_binding("r1", "b1", "k1", "EO")
            .with_dictionary("k1", dictionary()),
    );
    let repo_queue = Arc::new(MemoryQueue::new("repo"));
    let docs_queue = Arc::new(MemoryQueue::new("docs"));
    let metadata_queue = Arc::new(MemoryQueue::new("metadata"));
    let statuses = Arc::new(MemoryStatusStore::new());
    let checkpoints = Arc::new(MemoryCheckpointStore::new());

    let mut done = DocumentStatus::new(DocumentStatus::make_id("EO", "fake", "m1", "d1"), 3);
    done.completed = true;
    statuses.put(&done).await.unwrap();

    // Scheduler
    let mut state = SchedulerState::new();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let scheduled = state.tick(now, &[repo], repo_queue.as_ref()).await;
    assert_eq!(scheduled, vec!["r1".to_string()]);

    // Harvester
    let mut drivers = DriverRegistry::new();
    drivers.register("fake", || Box::new(TwoRecordRepository));
    let harvester = RepositoryHarvester::new(
        config,
        checkpoints.clone(),
        statuses.clone(),
        docs_queue.clone(),
        drivers,
    );
    assert_eq!(poll_once(repo_queue.as_ref(), &harvester).await, Poll::Handled);
    assert_eq!(docs_queue.len().await.unwrap(), 1);
    assert_eq!(
        checkpoints.get("b1", "r1", "m1").await.unwrap(),
        NaiveDate::from_ymd_opt(2024, 4, 1)
    );

    // Retriever
    let download_dir = tempfile::tempdir().unwrap();
    let fetcher: Arc<dyn Fetcher> = Arc::new(LocalFiles);
    let retriever = DocumentRetriever::new(
        statuses.clone(),
        metadata_queue.clone(),
        DownloadDriverRegistry::with_defaults(fetcher.clone(), None),
        fetcher,
        RetrieverOptions {
            download_path: download_dir.path().to_path_buf(),
            max_retry: 3,
            enrichment: Default::default(),
        },
    );
    assert_eq!(poll_once(docs_queue.as_ref(), &retriever).await, Poll::Handled);
    assert_eq!(poll_once(docs_queue.as_ref(), &retriever).await, Poll::Empty);

    let status = statuses
        .get(&DocumentStatus::make_id("EO", "fake", "m1", "d2"))
        .await
        .unwrap()
        .unwrap();
    assert!(status.completed);
    assert_eq!(metadata_queue.items().await, vec!["\"EO/fake-m1-d2\"".to_string()]);
    assert!(download_dir.path().join("EO/fake-m1-d2/d2.pdf").exists());
}
