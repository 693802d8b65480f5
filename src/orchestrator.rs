//! Publish Orchestrator: runs one batch of candidates through
//! dedup → rate gate → publisher, strictly in input order.
//!
//! Commit ordering on success is `mark_as_posted` then `record_post`; a failed
//! publish touches neither. Storage errors are fail-closed and abort the run.
//! Retention cleanup always runs once the batch stops.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, gauge};

use crate::dedup::{Deduplicator, DEFAULT_RETENTION_DAYS};
use crate::error::{PipelineError, PublishError};
use crate::fingerprint::fingerprint;
use crate::ingest::types::CandidateItem;
use crate::publish::{Post, PostFormatter, PublishResult, Publisher};
use crate::rate_gate::RateGate;

pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorCfg {
    pub publish_timeout: Duration,
    pub retention_days: i64,
}

impl Default for OrchestratorCfg {
    fn default() -> Self {
        Self {
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Terminal state of one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Published(PublishResult),
    SkippedDuplicate,
    SkippedRateLimited,
    Failed(String),
}

impl ItemOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Published(_) => "published",
            Self::SkippedDuplicate => "skipped_duplicate",
            Self::SkippedRateLimited => "skipped_rate_limited",
            Self::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub seen: usize,
    pub skipped_duplicate: usize,
    pub skipped_rate_limited: usize,
    pub published: usize,
    pub failed: usize,
    /// `(url, outcome)` in input order.
    pub outcomes: Vec<(String, ItemOutcome)>,
}

impl RunSummary {
    fn record(&mut self, url: &str, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Published(_) => self.published += 1,
            ItemOutcome::SkippedDuplicate => self.skipped_duplicate += 1,
            ItemOutcome::SkippedRateLimited => self.skipped_rate_limited += 1,
            ItemOutcome::Failed(_) => self.failed += 1,
        }
        counter!("pipeline_items_total", "outcome" => outcome.label()).increment(1);
        self.outcomes.push((url.to_string(), outcome));
    }

    pub fn outcome_for(&self, url: &str) -> Option<&ItemOutcome> {
        self.outcomes
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, o)| o)
    }
}

/// Owns the process-local rate gate; the dedup store and publisher are shared.
pub struct Orchestrator {
    dedup: Deduplicator,
    gate: RateGate,
    publisher: Arc<dyn Publisher>,
    formatter: PostFormatter,
    cfg: OrchestratorCfg,
}

impl Orchestrator {
    pub fn new(
        dedup: Deduplicator,
        gate: RateGate,
        publisher: Arc<dyn Publisher>,
        formatter: PostFormatter,
        cfg: OrchestratorCfg,
    ) -> Self {
        Self {
            dedup,
            gate,
            publisher,
            formatter,
            cfg,
        }
    }

    pub fn dedup(&self) -> &Deduplicator {
        &self.dedup
    }

    pub fn rate_gate(&self) -> &RateGate {
        &self.gate
    }

    /// Process one batch. Item-level failures are reported in the summary;
    /// only storage failures return `Err`.
    pub async fn run_batch(&mut self, items: Vec<CandidateItem>) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();
        let result = self.process(items, &mut summary).await;

        // finalizer: runs whether or not the batch aborted
        match self.dedup.cleanup_old_entries(self.cfg.retention_days) {
            Ok(deleted) => {
                counter!("pipeline_cleanup_deleted_total").increment(deleted as u64);
            }
            Err(e) => tracing::warn!(target: "pipeline", error = %e, "retention cleanup failed"),
        }

        counter!("pipeline_runs_total").increment(1);
        gauge!("pipeline_last_run_ts").set(Utc::now().timestamp() as f64);
        tracing::info!(
            target: "pipeline",
            seen = summary.seen,
            published = summary.published,
            skipped_duplicate = summary.skipped_duplicate,
            skipped_rate_limited = summary.skipped_rate_limited,
            failed = summary.failed,
            aborted = result.is_err(),
            "run finished"
        );

        result.map(|()| summary)
    }

    async fn process(
        &mut self,
        items: Vec<CandidateItem>,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        // Once closed, the rest of the batch is reported as rate limited
        // without probing dedup or the publisher.
        let mut gate_closed = false;

        for item in items {
            summary.seen += 1;

            if gate_closed {
                summary.record(&item.url, ItemOutcome::SkippedRateLimited);
                continue;
            }

            let now = Utc::now();
            let fp = fingerprint(&item.url, &item.title, &item.summary);
            match self.dedup.is_duplicate_at(&fp, now) {
                Ok(true) => {
                    tracing::debug!(target: "pipeline", url = %item.url, "skip duplicate");
                    summary.record(&item.url, ItemOutcome::SkippedDuplicate);
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        target: "pipeline",
                        url = %item.url,
                        error = %e,
                        "dedup check failed; not publishing and aborting run"
                    );
                    return Err(e.into());
                }
            }

            if !self.gate.can_post_at(now) {
                tracing::info!(
                    target: "pipeline",
                    daily_count = self.gate.state().daily_count,
                    next_allowed_at = ?self.gate.next_allowed_at(),
                    "rate gate closed; skipping rest of batch"
                );
                gate_closed = true;
                summary.record(&item.url, ItemOutcome::SkippedRateLimited);
                continue;
            }

            let post = Post {
                text: self.formatter.format(&item),
                media: None,
            };
            match self.publish(&post).await {
                Ok(res) => {
                    tracing::info!(
                        target: "pipeline",
                        url = %item.url,
                        source = %item.source,
                        post_id = %res.id,
                        "published"
                    );
                    // Dedup mark first: a lost rate charge is harmless, a lost mark double-posts.
                    let committed = self.dedup.mark_as_posted(
                        &item.url,
                        &item.title,
                        &item.summary,
                        &item.source,
                    );
                    self.gate.record_post();
                    summary.record(&item.url, ItemOutcome::Published(res));
                    if let Err(e) = committed {
                        tracing::error!(
                            target: "pipeline",
                            url = %item.url,
                            error = %e,
                            "published but could not mark as posted"
                        );
                        return Err(e.into());
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        target: "pipeline",
                        url = %item.url,
                        publisher = self.publisher.name(),
                        error = %e,
                        "publish failed"
                    );
                    if e.is_rate_limited() {
                        gate_closed = true;
                    }
                    summary.record(&item.url, ItemOutcome::Failed(e.to_string()));
                }
            }
        }
        Ok(())
    }

    async fn publish(&self, post: &Post) -> Result<PublishResult, PublishError> {
        match tokio::time::timeout(self.cfg.publish_timeout, self.publisher.publish(post)).await {
            Ok(res) => res,
            Err(_) => Err(PublishError::Timeout(self.cfg.publish_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::SqliteDedupStore;
    use crate::publish::ConsolePublisher;

    fn item(url: &str, title: &str) -> CandidateItem {
        CandidateItem {
            url: url.into(),
            title: title.into(),
            summary: format!("{title} detaylar belli oldu"),
            source: "Test".into(),
            published_at: None,
        }
    }

    fn orchestrator(gate: RateGate) -> Orchestrator {
        let dedup = Deduplicator::new(Arc::new(SqliteDedupStore::in_memory().unwrap()));
        Orchestrator::new(
            dedup,
            gate,
            Arc::new(ConsolePublisher::new()),
            PostFormatter::default(),
            OrchestratorCfg::default(),
        )
    }

    #[tokio::test]
    async fn empty_batch_is_ok() {
        let mut o = orchestrator(RateGate::default());
        let s = o.run_batch(vec![]).await.unwrap();
        assert_eq!(s, RunSummary::default());
    }

    #[tokio::test]
    async fn same_item_twice_in_one_batch_posts_once() {
        let mut o = orchestrator(RateGate::new(0, 30));
        let s = o
            .run_batch(vec![
                item("https://a.test/1", "Kaleci imzaladı"),
                item("https://a.test/1?utm_source=x", "Kaleci imzaladı"),
            ])
            .await
            .unwrap();
        assert_eq!(s.published, 1);
        assert_eq!(s.skipped_duplicate, 1);
    }

    #[tokio::test]
    async fn interval_closes_gate_after_first_post() {
        let mut o = orchestrator(RateGate::new(10, 30));
        let s = o
            .run_batch(vec![
                item("https://a.test/1", "Birinci haber metni"),
                item("https://a.test/2", "İkinci haber metni"),
                item("https://a.test/3", "Üçüncü haber metni"),
            ])
            .await
            .unwrap();
        assert_eq!(s.published, 1);
        assert_eq!(s.skipped_rate_limited, 2);
        assert_eq!(o.rate_gate().state().daily_count, 1);
    }
}
