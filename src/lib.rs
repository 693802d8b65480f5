// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod dedup;
pub mod error;
pub mod fingerprint;
pub mod ingest;
pub mod orchestrator;
pub mod publish;
pub mod rate_gate;
pub mod scheduler;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::dedup::{Deduplicator, PostedRecord, PostedStore, SqliteDedupStore};
pub use crate::error::{FetchError, PipelineError, PublishError, StorageError};
pub use crate::fingerprint::{fingerprint, normalize_content, normalize_url, Fingerprint};
pub use crate::ingest::types::{CandidateItem, SourceFeed};
pub use crate::orchestrator::{ItemOutcome, Orchestrator, OrchestratorCfg, RunSummary};
pub use crate::publish::{Post, PublishResult, Publisher};
pub use crate::rate_gate::{RateGate, RateState};
