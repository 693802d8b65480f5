use std::time::Duration;

use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{Post, PublishResult, Publisher};
use crate::error::PublishError;

/// Posts `{"text", "media"}` JSON to a webhook that relays to the platform.
#[derive(Clone)]
pub struct WebhookPublisher {
    webhook: String,
    client: Client,
    timeout: Duration,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
    media: Option<String>,
}

#[derive(Deserialize, Default)]
struct WebhookResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl WebhookPublisher {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

/// Map a non-success HTTP status to the error taxonomy.
fn status_error(status: StatusCode, retry_after: Option<&str>, body: &str) -> PublishError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return PublishError::RateLimited {
            retry_after_secs: retry_after.and_then(|v| v.trim().parse().ok()),
        };
    }
    let message: String = body.chars().take(200).collect();
    PublishError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[async_trait::async_trait]
impl Publisher for WebhookPublisher {
    async fn publish(&self, post: &Post) -> Result<PublishResult, PublishError> {
        let payload = WebhookPayload {
            text: &post.text,
            media: post.media.as_ref().map(|p| p.display().to_string()),
        };

        let rsp = self
            .client
            .post(&self.webhook)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PublishError::Timeout(self.timeout)
                } else {
                    PublishError::Transport(e.to_string())
                }
            })?;

        let status = rsp.status();
        if !status.is_success() {
            let retry_after = rsp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let body = rsp.text().await.unwrap_or_default();
            return Err(status_error(status, retry_after.as_deref(), &body));
        }

        // Relays that answer 2xx without a JSON body still count as published.
        let body = rsp.text().await.unwrap_or_default();
        let parsed: WebhookResponse = serde_json::from_str(&body).unwrap_or_default();
        Ok(PublishResult {
            id: parsed.id.unwrap_or_default(),
            url: parsed.url.unwrap_or_default(),
        })
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
