use std::sync::atomic::{AtomicU64, Ordering};

use super::{Post, PublishResult, Publisher};
use crate::error::PublishError;

/// Dry-run publisher: logs the post and hands back a synthetic id.
#[derive(Debug, Default)]
pub struct ConsolePublisher {
    published: AtomicU64,
}

impl ConsolePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Publisher for ConsolePublisher {
    async fn publish(&self, post: &Post) -> Result<PublishResult, PublishError> {
        let n = self.published.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            target: "publish",
            n,
            media = ?post.media,
            chars = post.text.chars().count(),
            "console post\n{}",
            post.text
        );
        Ok(PublishResult {
            id: format!("console-{n}"),
            url: format!("console://posts/{n}"),
        })
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ids_are_sequential() {
        let p = ConsolePublisher::new();
        let post = Post {
            text: "hello".into(),
            media: None,
        };
        assert_eq!(p.publish(&post).await.unwrap().id, "console-1");
        assert_eq!(p.publish(&post).await.unwrap().id, "console-2");
        assert_eq!(p.published_count(), 2);
    }
}
