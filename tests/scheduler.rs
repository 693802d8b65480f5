// tests/scheduler.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use football_news_relay::dedup::{Deduplicator, PostedRecord, PostedStore, SqliteDedupStore};
use football_news_relay::error::{FetchError, StorageError};
use football_news_relay::ingest::types::{CandidateItem, SourceFeed};
use football_news_relay::orchestrator::{Orchestrator, OrchestratorCfg};
use football_news_relay::publish::{ConsolePublisher, PostFormatter};
use football_news_relay::rate_gate::RateGate;
use football_news_relay::scheduler::{self, SchedulerCfg};
use tokio::sync::watch;

struct CountingFeed {
    fetches: Arc<AtomicUsize>,
}

#[async_trait]
impl SourceFeed for CountingFeed {
    async fn fetch(&self) -> Result<Vec<CandidateItem>, FetchError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(vec![CandidateItem {
            url: format!("https://a.test/haber/{n}"),
            title: format!("Transfer gelişmesi numara {n}"),
            summary: String::new(),
            source: "Counting".into(),
            published_at: None,
        }])
    }

    fn name(&self) -> &str {
        "Counting"
    }
}

struct DeadStore;

impl PostedStore for DeadStore {
    fn contains_url(&self, _: &str) -> Result<bool, StorageError> {
        Err(StorageError::Query {
            operation: "contains_url",
            cause: "database is locked".into(),
        })
    }
    fn contains_content_since(&self, _: &str, _: DateTime<Utc>) -> Result<bool, StorageError> {
        Ok(false)
    }
    fn upsert(&self, _: &PostedRecord) -> Result<(), StorageError> {
        Ok(())
    }
    fn delete_older_than(&self, _: DateTime<Utc>) -> Result<usize, StorageError> {
        Ok(0)
    }
    fn posted_since(&self, _: DateTime<Utc>) -> Result<Vec<PostedRecord>, StorageError> {
        Ok(vec![])
    }
    fn count(&self) -> Result<usize, StorageError> {
        Ok(0)
    }
}

fn orchestrator(dedup: Deduplicator) -> Orchestrator {
    Orchestrator::new(
        dedup,
        RateGate::new(0, 30),
        Arc::new(ConsolePublisher::new()),
        PostFormatter::default(),
        OrchestratorCfg::default(),
    )
}

fn hourly() -> SchedulerCfg {
    SchedulerCfg {
        interval: Duration::from_secs(3600),
        ..Default::default()
    }
}

fn counting_feeds() -> (Vec<Box<dyn SourceFeed>>, Arc<AtomicUsize>) {
    let fetches = Arc::new(AtomicUsize::new(0));
    let feeds: Vec<Box<dyn SourceFeed>> = vec![Box::new(CountingFeed {
        fetches: fetches.clone(),
    })];
    (feeds, fetches)
}

#[tokio::test]
async fn run_once_publishes_fetched_items() {
    let (feeds, fetches) = counting_feeds();
    let mut orch = orchestrator(Deduplicator::new(Arc::new(SqliteDedupStore::in_memory().unwrap())));

    let s = scheduler::run_once(&feeds, &mut orch, &hourly().ingest).await.unwrap();
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(s.published, 1);
    assert_eq!(orch.dedup().count().unwrap(), 1);
}

#[tokio::test]
async fn shutdown_before_start_runs_nothing() {
    let (feeds, fetches) = counting_feeds();
    let mut orch = orchestrator(Deduplicator::new(Arc::new(SqliteDedupStore::in_memory().unwrap())));
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let runs = scheduler::run_loop(&feeds, &mut orch, hourly(), rx).await.unwrap();
    assert_eq!(runs, 0);
    assert_eq!(fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn shutdown_interrupts_the_sleep() {
    let (feeds, fetches) = counting_feeds();
    let mut orch = orchestrator(Deduplicator::new(Arc::new(SqliteDedupStore::in_memory().unwrap())));
    let (tx, rx) = watch::channel(false);

    let stopper = {
        let fetches = fetches.clone();
        async move {
            while fetches.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            tx.send(true).unwrap();
        }
    };

    let (runs, ()) = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(scheduler::run_loop(&feeds, &mut orch, hourly(), rx), stopper)
    })
    .await
    .expect("loop should stop long before the interval elapses");

    assert_eq!(runs.unwrap(), 1);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn storage_failure_stops_the_loop() {
    let (feeds, fetches) = counting_feeds();
    let mut orch = orchestrator(Deduplicator::new(Arc::new(DeadStore)));
    let (_tx, rx) = watch::channel(false);

    let res = scheduler::run_loop(&feeds, &mut orch, hourly(), rx).await;
    assert!(res.is_err());
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}
