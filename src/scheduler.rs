// src/scheduler.rs
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::error::PipelineError;
use crate::ingest::{self, types::SourceFeed, IngestCfg};
use crate::orchestrator::{Orchestrator, RunSummary};

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
    pub ingest: IngestCfg,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            ingest: IngestCfg::default(),
        }
    }
}

/// Ingest from every feed and push the result through one batch.
pub async fn run_once(
    feeds: &[Box<dyn SourceFeed>],
    orchestrator: &mut Orchestrator,
    cfg: &IngestCfg,
) -> Result<RunSummary, PipelineError> {
    let (items, _report) = ingest::collect(feeds, cfg, Utc::now()).await;
    if items.is_empty() {
        tracing::info!(target: "scheduler", "no candidate items this run");
    }
    orchestrator.run_batch(items).await
}

/// Run batches every `cfg.interval` until `shutdown` flips to true (or its
/// sender is dropped). Shutdown is observed before each run and during the
/// sleep, never inside a batch, so an in-flight publish always completes its
/// commit. Storage errors stop the loop. Returns the number of runs.
pub async fn run_loop(
    feeds: &[Box<dyn SourceFeed>],
    orchestrator: &mut Orchestrator,
    cfg: SchedulerCfg,
    mut shutdown: watch::Receiver<bool>,
) -> Result<u64, PipelineError> {
    let mut runs = 0u64;
    loop {
        if *shutdown.borrow() {
            break;
        }

        run_once(feeds, orchestrator, &cfg.ingest).await?;
        runs += 1;

        tokio::select! {
            _ = tokio::time::sleep(cfg.interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    tracing::info!(target: "scheduler", runs, "scheduler stopped");
    Ok(runs)
}
