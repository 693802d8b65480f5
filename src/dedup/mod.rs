//! Dedup Store: durable record of published items.
//!
//! A URL match is a duplicate forever (until retention cleanup removes the
//! row). A content match only counts within the recency window, since an
//! older story with similar wording is legitimately newsworthy again.

pub mod sqlite;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::fingerprint::{fingerprint, Fingerprint};

pub use sqlite::SqliteDedupStore;

pub const DEFAULT_RETENTION_DAYS: i64 = 30;
pub const DEFAULT_CONTENT_RECENCY_WINDOW_DAYS: i64 = 7;

/// One row per successfully published item, keyed by `url_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedRecord {
    pub url_hash: String,
    pub content_hash: String,
    pub original_url: String,
    pub title: String,
    pub source: String,
    pub posted_at: DateTime<Utc>,
}

/// Storage backend for posted records.
///
/// Implementations must make `upsert` atomic on `url_hash` so that two
/// overlapping processes cannot create conflicting rows.
pub trait PostedStore: Send + Sync {
    fn contains_url(&self, url_hash: &str) -> Result<bool, StorageError>;

    /// True if a row with `content_hash` was posted strictly after `since`.
    fn contains_content_since(
        &self,
        content_hash: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    fn upsert(&self, record: &PostedRecord) -> Result<(), StorageError>;

    /// Removes rows posted strictly before `cutoff`; returns the count.
    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError>;

    /// Rows posted after `since`, newest first.
    fn posted_since(&self, since: DateTime<Utc>) -> Result<Vec<PostedRecord>, StorageError>;

    fn count(&self) -> Result<usize, StorageError>;
}

/// Duplicate test and commit point built on a [`PostedStore`].
#[derive(Clone)]
pub struct Deduplicator {
    store: Arc<dyn PostedStore>,
    content_window: Duration,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn PostedStore>) -> Self {
        Self {
            store,
            content_window: Duration::days(DEFAULT_CONTENT_RECENCY_WINDOW_DAYS),
        }
    }

    /// `days` < 0 is treated as 0 (content matches never count).
    pub fn with_content_window_days(mut self, days: i64) -> Self {
        self.content_window = Duration::days(days.max(0));
        self
    }

    pub fn content_window(&self) -> Duration {
        self.content_window
    }

    pub fn is_duplicate(&self, url: &str, title: &str, summary: &str) -> Result<bool, StorageError> {
        self.is_duplicate_at(&fingerprint(url, title, summary), Utc::now())
    }

    pub fn is_duplicate_at(&self, fp: &Fingerprint, now: DateTime<Utc>) -> Result<bool, StorageError> {
        if self.store.contains_url(&fp.url_hash)? {
            tracing::debug!(url_hash = %fp.url_hash, "duplicate url");
            return Ok(true);
        }
        if !fp.has_content() {
            return Ok(false);
        }
        let since = now - self.content_window;
        if self.store.contains_content_since(&fp.content_hash, since)? {
            tracing::debug!(content_hash = %fp.content_hash, "duplicate content within window");
            return Ok(true);
        }
        Ok(false)
    }

    pub fn mark_as_posted(
        &self,
        url: &str,
        title: &str,
        summary: &str,
        source: &str,
    ) -> Result<(), StorageError> {
        self.mark_as_posted_at(url, title, summary, source, Utc::now())
    }

    pub fn mark_as_posted_at(
        &self,
        url: &str,
        title: &str,
        summary: &str,
        source: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let fp = fingerprint(url, title, summary);
        self.store.upsert(&PostedRecord {
            url_hash: fp.url_hash,
            content_hash: fp.content_hash,
            original_url: url.to_string(),
            title: title.to_string(),
            source: source.to_string(),
            posted_at: now,
        })
    }

    pub fn cleanup_old_entries(&self, retention_days: i64) -> Result<usize, StorageError> {
        self.cleanup_old_entries_at(retention_days, Utc::now())
    }

    pub fn cleanup_old_entries_at(
        &self,
        retention_days: i64,
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let cutoff = now - Duration::days(retention_days.max(0));
        let deleted = self.store.delete_older_than(cutoff)?;
        if deleted > 0 {
            tracing::info!(deleted, retention_days, "cleaned up old posted entries");
        }
        Ok(deleted)
    }

    pub fn get_recent(&self, since_hours: i64) -> Result<Vec<PostedRecord>, StorageError> {
        self.get_recent_at(since_hours, Utc::now())
    }

    pub fn get_recent_at(
        &self,
        since_hours: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<PostedRecord>, StorageError> {
        self.store.posted_since(now - Duration::hours(since_hours.max(0)))
    }

    pub fn count(&self) -> Result<usize, StorageError> {
        self.store.count()
    }
}
