// src/ingest/types.rs
use chrono::{DateTime, Utc};

use crate::error::FetchError;

/// A news item under consideration for one pipeline run. Never persisted.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CandidateItem {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub source: String, // feed name, e.g. "NTV Spor"
    pub published_at: Option<DateTime<Utc>>,
}

/// Yields the current items of one source. An empty result is not an error.
#[async_trait::async_trait]
pub trait SourceFeed: Send + Sync {
    async fn fetch(&self) -> Result<Vec<CandidateItem>, FetchError>;
    fn name(&self) -> &str;
}
