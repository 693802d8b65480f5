//! Error taxonomy for the collaborators the pipeline talks to.
//!
//! The orchestrator branches on these variants instead of inspecting messages:
//! fetch errors skip one feed, publish errors fail one item, storage errors
//! stop the run.

use thiserror::Error;

/// A source feed could not produce its items.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network request failed or returned a non-2xx status.
    #[error("feed request failed: {0}")]
    Http(String),

    /// Payload could not be parsed.
    #[error("feed parse error: {0}")]
    Parse(String),

    /// Local I/O (fixture files etc.).
    #[error("feed i/o error: {0}")]
    Io(String),
}

/// The dedup store's backing storage failed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cannot open store at {path}: {cause}")]
    Open { path: String, cause: String },

    #[error("{operation} failed: {cause}")]
    Query { operation: &'static str, cause: String },
}

impl StorageError {
    pub(crate) fn query(operation: &'static str, e: impl std::fmt::Display) -> Self {
        Self::Query {
            operation,
            cause: e.to_string(),
        }
    }
}

/// The publisher refused or failed to deliver a post.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The destination rejected the post (bad request, auth, policy).
    #[error("post rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request never completed.
    #[error("publish transport error: {0}")]
    Transport(String),

    /// The call exceeded the configured timeout.
    #[error("publish timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Remote rate limiter is exhausted (e.g. HTTP 429).
    #[error("remote rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },
}

impl PublishError {
    /// True when the remote side says no more posts will be accepted for now.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Run-level failure; only storage problems abort a batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_flagged() {
        assert!(PublishError::RateLimited {
            retry_after_secs: Some(60)
        }
        .is_rate_limited());
        assert!(!PublishError::Transport("reset".into()).is_rate_limited());
    }

    #[test]
    fn storage_error_message_names_operation() {
        let e = StorageError::query("is_duplicate", "disk I/O error");
        assert_eq!(e.to_string(), "is_duplicate failed: disk I/O error");
    }
}
