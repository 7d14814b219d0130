//! Lark/Feishu notification channel.
//!
//! Two modes:
//! - app mode sends a direct message to `receiver` (user id) or
//!   `receiver_email` with a tenant access token obtained from
//!   `app_id`/`app_secret`;
//! - webhook mode posts to a custom bot `webhook_url`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::token::TokenCache;
use super::{NotificationChannel, default_timeout, http_client};
use crate::{Error, Result};

const TENANT_TOKEN_URL: &str =
    "https://open.feishu.cn/open-apis/auth/v3/tenant_access_token/internal";
const SEND_MESSAGE_URL: &str = "https://open.feishu.cn/open-apis/message/v4/send/";

/// Lark channel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LarkConfig {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_secret: String,
    /// Receiving user id (app mode).
    pub receiver: Option<String>,
    /// Receiving user email (app mode, when `receiver` is unset).
    pub receiver_email: Option<String>,
    /// Custom bot webhook (used when no receiver is configured).
    pub webhook_url: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl LarkConfig {
    fn receiver(&self) -> Option<&str> {
        self.receiver.as_deref().filter(|r| !r.is_empty())
    }

    fn receiver_email(&self) -> Option<&str> {
        self.receiver_email.as_deref().filter(|r| !r.is_empty())
    }

    /// App mode applies whenever a receiver is configured.
    pub fn is_app_mode(&self) -> bool {
        self.receiver().is_some() || self.receiver_email().is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_app_mode() {
            if self.app_id.is_empty() || self.app_secret.is_empty() {
                return Err(Error::config(
                    "lark app mode requires app_id and app_secret",
                ));
            }
        } else if self.webhook_url.as_deref().is_none_or(str::is_empty) {
            return Err(Error::config(
                "lark channel requires a receiver or a webhook_url",
            ));
        }
        Ok(())
    }
}

/// Body returned by both the bot webhook and the open API.
///
/// Bot webhooks answer with `StatusCode`/`StatusMessage` (older bots) or
/// `code`/`msg`; zero means success.
#[derive(Debug, Default, Deserialize)]
struct LarkResponse {
    #[serde(rename = "StatusCode")]
    status_code: Option<i64>,
    #[serde(rename = "StatusMessage")]
    status_message: Option<String>,
    code: Option<i64>,
    msg: Option<String>,
}

impl LarkResponse {
    fn into_result(self) -> Result<()> {
        if let Some(code) = self.status_code.filter(|c| *c != 0) {
            return Err(Error::notification(format!(
                "Lark error {}: {}",
                code,
                self.status_message.unwrap_or_default()
            )));
        }
        if let Some(code) = self.code.filter(|c| *c != 0) {
            return Err(Error::notification(format!(
                "Lark error {}: {}",
                code,
                self.msg.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TenantTokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: String,
    /// Seconds until expiry.
    #[serde(default)]
    expire: u64,
}

/// Lark notification channel.
pub struct LarkChannel {
    config: LarkConfig,
    client: Client,
    token: TokenCache,
}

impl LarkChannel {
    pub fn new(config: LarkConfig) -> Self {
        let client = http_client(config.timeout_secs);
        Self {
            config,
            client,
            token: TokenCache::new(),
        }
    }

    fn build_webhook_payload(text: &str) -> serde_json::Value {
        json!({
            "msg_type": "text",
            "content": { "text": text }
        })
    }

    fn build_app_payload(&self, text: &str) -> serde_json::Value {
        let mut payload = json!({
            "msg_type": "text",
            "content": { "text": text }
        });
        if let Some(receiver) = self.config.receiver() {
            payload["user_id"] = json!(receiver);
        } else if let Some(email) = self.config.receiver_email() {
            payload["email"] = json!(email);
        }
        payload
    }

    async fn tenant_token(&self) -> Result<String> {
        if let Some(token) = self.token.get() {
            return Ok(token);
        }

        let response: TenantTokenResponse = self
            .client
            .post(TENANT_TOKEN_URL)
            .json(&json!({
                "app_id": self.config.app_id,
                "app_secret": self.config.app_secret,
            }))
            .send()
            .await
            .map_err(|e| Error::notification(format!("Lark token request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::notification(format!("Lark token response invalid: {}", e)))?;

        if response.code != 0 {
            return Err(Error::notification(format!(
                "Lark token error {}: {}",
                response.code, response.msg
            )));
        }

        debug!(expire = response.expire, "refreshed Lark tenant access token");
        self.token.store(
            response.tenant_access_token.clone(),
            Duration::from_secs(response.expire),
        );
        Ok(response.tenant_access_token)
    }

    async fn send_app(&self, text: &str) -> Result<()> {
        let token = self.tenant_token().await?;
        let response = self
            .client
            .post(SEND_MESSAGE_URL)
            .bearer_auth(token)
            .json(&self.build_app_payload(text))
            .send()
            .await
            .map_err(|e| Error::notification(format!("Lark request failed: {}", e)))?;

        let status = response.status();
        let body: LarkResponse = response.json().await.unwrap_or_default();
        if status.as_u16() == 401 {
            self.token.clear();
        }
        if !status.is_success() {
            warn!("Lark message failed: {}", status);
            return Err(Error::notification(format!("Lark message failed: {}", status)));
        }
        body.into_result()
    }

    async fn send_webhook(&self, url: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(url)
            .json(&Self::build_webhook_payload(text))
            .send()
            .await
            .map_err(|e| Error::notification(format!("Lark webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("Lark webhook failed: {}", status);
            return Err(Error::notification(format!("Lark webhook failed: {}", status)));
        }

        let body: LarkResponse = response
            .json()
            .await
            .map_err(|e| Error::notification(format!("Lark webhook response invalid: {}", e)))?;
        body.into_result()
    }
}

#[async_trait]
impl NotificationChannel for LarkChannel {
    fn channel_type(&self) -> &'static str {
        "lark"
    }

    async fn send(&self, text: &str) -> Result<()> {
        if self.config.is_app_mode() {
            self.send_app(text).await?;
        } else {
            let url = self.config.webhook_url.as_deref().unwrap_or_default();
            self.send_webhook(url, text).await?;
        }
        debug!("Lark notification sent");
        Ok(())
    }
}
