//! Slack notification channel.
//!
//! Posts with `chat.postMessage` when a bot `token` and `channel` are set,
//! otherwise to an incoming `webhook_url`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::{NotificationChannel, default_timeout, http_client};
use crate::{Error, Result};

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

/// Slack channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`).
    pub token: Option<String>,
    /// Channel id or name for `chat.postMessage`.
    pub channel: Option<String>,
    /// Incoming webhook URL.
    pub webhook_url: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: None,
            channel: None,
            webhook_url: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl SlackConfig {
    fn api_target(&self) -> Option<(&str, &str)> {
        let token = self.token.as_deref().filter(|t| !t.is_empty())?;
        let channel = self.channel.as_deref().filter(|c| !c.is_empty())?;
        Some((token, channel))
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_target().is_none() && self.webhook_url.as_deref().is_none_or(str::is_empty) {
            return Err(Error::config(
                "slack channel requires token and channel, or a webhook_url",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    error: Option<String>,
}

impl ApiResponse {
    fn into_result(self) -> Result<()> {
        if self.ok {
            Ok(())
        } else {
            Err(Error::notification(format!(
                "Slack API error: {}",
                self.error.unwrap_or_else(|| "unknown".to_string())
            )))
        }
    }
}

/// Slack notification channel.
pub struct SlackChannel {
    config: SlackConfig,
    client: Client,
}

impl SlackChannel {
    pub fn new(config: SlackConfig) -> Self {
        let client = http_client(config.timeout_secs);
        Self { config, client }
    }

    fn build_payload(channel: Option<&str>, text: &str) -> serde_json::Value {
        match channel {
            Some(channel) => json!({ "channel": channel, "text": text }),
            None => json!({ "text": text }),
        }
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn channel_type(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, text: &str) -> Result<()> {
        if let Some((token, channel)) = self.config.api_target() {
            let response: ApiResponse = self
                .client
                .post(POST_MESSAGE_URL)
                .bearer_auth(token)
                .json(&Self::build_payload(Some(channel), text))
                .send()
                .await
                .map_err(|e| Error::notification(format!("Slack request failed: {}", e)))?
                .json()
                .await
                .map_err(|e| Error::notification(format!("Slack response invalid: {}", e)))?;
            response.into_result()?;
        } else {
            let url = self.config.webhook_url.as_deref().unwrap_or_default();
            let response = self
                .client
                .post(url)
                .json(&Self::build_payload(None, text))
                .send()
                .await
                .map_err(|e| Error::notification(format!("Slack webhook request failed: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!("Slack webhook failed: {} - {}", status, body);
                return Err(Error::notification(format!(
                    "Slack webhook failed: {} - {}",
                    status, body
                )));
            }
        }

        debug!("Slack notification sent");
        Ok(())
    }
}
