//! `SQLite` backend for the dedup store.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE posted_items (
//!     url_hash TEXT PRIMARY KEY,
//!     content_hash TEXT NOT NULL,
//!     original_url TEXT NOT NULL,
//!     title TEXT NOT NULL,
//!     source TEXT NOT NULL,
//!     posted_at INTEGER NOT NULL  -- unix seconds
//! );
//! ```
//!
//! WAL mode and `busy_timeout` let a second process read and write the same
//! file; the upsert is a single statement keyed on `url_hash`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::{PostedRecord, PostedStore};
use crate::error::StorageError;

pub struct SqliteDedupStore {
    conn: Mutex<Connection>,
}

/// Acquire the connection, recovering from a poisoned mutex.
fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("dedup store mutex was poisoned, recovering");
            metrics::counter!("dedup_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        }
    }
}

fn to_ts(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<PostedRecord> {
    Ok(PostedRecord {
        url_hash: row.get(0)?,
        content_hash: row.get(1)?,
        original_url: row.get(2)?,
        title: row.get(3)?,
        source: row.get(4)?,
        posted_at: from_ts(row.get(5)?),
    })
}

// Mutex guards are held only for the duration of one statement.
#[allow(clippy::significant_drop_tightening)]
impl SqliteDedupStore {
    /// Opens (or creates) the database file, creating parent dirs as needed.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let open_err = |cause: String| StorageError::Open {
            path: path.display().to_string(),
            cause,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| open_err(e.to_string()))?;
            }
        }

        let conn = Connection::open(path).map_err(|e| open_err(e.to_string()))?;
        // journal_mode answers with a row; the result is ignored
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        let _ = conn.pragma_update(None, "busy_timeout", "5000");

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    /// Fresh in-memory store, for tests and dry runs.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::Open {
            path: ":memory:".to_string(),
            cause: e.to_string(),
        })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn create_schema(&self) -> Result<(), StorageError> {
        let conn = acquire_lock(&self.conn);
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS posted_items (
                url_hash TEXT PRIMARY KEY,
                content_hash TEXT NOT NULL,
                original_url TEXT NOT NULL,
                title TEXT NOT NULL,
                source TEXT NOT NULL,
                posted_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_posted_items_content
                ON posted_items(content_hash, posted_at);
            CREATE INDEX IF NOT EXISTS idx_posted_items_posted_at
                ON posted_items(posted_at);
            ",
        )
        .map_err(|e| StorageError::query("create_schema", e))
    }
}

#[allow(clippy::significant_drop_tightening)]
impl PostedStore for SqliteDedupStore {
    fn contains_url(&self, url_hash: &str) -> Result<bool, StorageError> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM posted_items WHERE url_hash = ?1)",
            params![url_hash],
            |row| row.get(0),
        )
        .map_err(|e| StorageError::query("contains_url", e))
    }

    fn contains_content_since(
        &self,
        content_hash: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM posted_items WHERE content_hash = ?1 AND posted_at > ?2)",
            params![content_hash, to_ts(since)],
            |row| row.get(0),
        )
        .map_err(|e| StorageError::query("contains_content_since", e))
    }

    fn upsert(&self, record: &PostedRecord) -> Result<(), StorageError> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            r"
            INSERT INTO posted_items
                (url_hash, content_hash, original_url, title, source, posted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(url_hash) DO UPDATE SET
                content_hash = excluded.content_hash,
                original_url = excluded.original_url,
                title = excluded.title,
                source = excluded.source,
                posted_at = excluded.posted_at
            ",
            params![
                record.url_hash,
                record.content_hash,
                record.original_url,
                record.title,
                record.source,
                to_ts(record.posted_at),
            ],
        )
        .map_err(|e| StorageError::query("upsert_posted", e))?;
        Ok(())
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "DELETE FROM posted_items WHERE posted_at < ?1",
            params![to_ts(cutoff)],
        )
        .map_err(|e| StorageError::query("delete_older_than", e))
    }

    fn posted_since(&self, since: DateTime<Utc>) -> Result<Vec<PostedRecord>, StorageError> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                r"
                SELECT url_hash, content_hash, original_url, title, source, posted_at
                FROM posted_items
                WHERE posted_at > ?1
                ORDER BY posted_at DESC
                ",
            )
            .map_err(|e| StorageError::query("prepare_posted_since", e))?;

        let rows = stmt
            .query_map(params![to_ts(since)], map_record)
            .map_err(|e| StorageError::query("posted_since", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StorageError::query("posted_since", e))
    }

    fn count(&self) -> Result<usize, StorageError> {
        let conn = acquire_lock(&self.conn);
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM posted_items", [], |row| row.get(0))
            .map_err(|e| StorageError::query("count_posted", e))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}
