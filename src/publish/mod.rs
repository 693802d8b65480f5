pub mod console;
pub mod formatter;
pub mod webhook;

use std::path::PathBuf;

use crate::error::PublishError;

pub use console::ConsolePublisher;
pub use formatter::PostFormatter;
pub use webhook::WebhookPublisher;

/// Formatted post ready for a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub text: String,
    pub media: Option<PathBuf>,
}

/// Confirmation returned by the destination.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PublishResult {
    pub id: String,
    pub url: String,
}

/// Destination platform. Implementations don't retry; the next scheduled run
/// is the retry.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, post: &Post) -> Result<PublishResult, PublishError>;
    fn name(&self) -> &'static str;
}
