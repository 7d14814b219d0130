//! WeCom (WeChat Work) application message channel.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::token::TokenCache;
use super::{NotificationChannel, default_timeout, http_client};
use crate::{Error, Result};

const TOKEN_URL: &str = "https://qyapi.weixin.qq.com/cgi-bin/gettoken";
const SEND_URL: &str = "https://qyapi.weixin.qq.com/cgi-bin/message/send";

/// WeCom channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WecomConfig {
    pub corp_id: String,
    pub corp_secret: String,
    pub agent_id: i64,
    /// User ids to notify.
    #[serde(default)]
    pub receivers: Vec<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl WecomConfig {
    pub fn validate(&self) -> Result<()> {
        if self.corp_id.is_empty() || self.corp_secret.is_empty() {
            return Err(Error::config("wecom channel requires corp_id and corp_secret"));
        }
        if self.receivers.is_empty() {
            return Err(Error::config("wecom channel requires at least one receiver"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct WecomResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

impl WecomResponse {
    fn into_result(self) -> Result<()> {
        if self.errcode == 0 {
            Ok(())
        } else {
            Err(Error::notification(format!(
                "WeCom error {}: {}",
                self.errcode, self.errmsg
            )))
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

/// WeCom notification channel.
pub struct WecomChannel {
    config: WecomConfig,
    client: Client,
    token: TokenCache,
}

impl WecomChannel {
    pub fn new(config: WecomConfig) -> Self {
        let client = http_client(config.timeout_secs);
        Self {
            config,
            client,
            token: TokenCache::new(),
        }
    }

    fn build_payload(&self, text: &str) -> serde_json::Value {
        json!({
            "agentid": self.config.agent_id,
            "msgtype": "text",
            "touser": self.config.receivers.join("|"),
            "text": { "content": text }
        })
    }

    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.token.get() {
            return Ok(token);
        }

        let response = self
            .client
            .get(TOKEN_URL)
            .query(&[
                ("corpid", self.config.corp_id.as_str()),
                ("corpsecret", self.config.corp_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::notification(format!("WeCom token request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::notification(format!(
                "WeCom token request failed: {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::notification(format!("WeCom token response invalid: {}", e)))?;
        if token.errcode != 0 {
            warn!(errcode = token.errcode, errmsg = %token.errmsg, "WeCom token refresh rejected");
            return Err(Error::notification(format!(
                "WeCom token error {}: {}",
                token.errcode, token.errmsg
            )));
        }

        debug!(expires_in = token.expires_in, "refreshed WeCom access token");
        self.token
            .store(token.access_token.clone(), Duration::from_secs(token.expires_in));
        Ok(token.access_token)
    }
}

#[async_trait]
impl NotificationChannel for WecomChannel {
    fn channel_type(&self) -> &'static str {
        "wecom"
    }

    async fn send(&self, text: &str) -> Result<()> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(SEND_URL)
            .query(&[("access_token", token.as_str())])
            .json(&self.build_payload(text))
            .send()
            .await
            .map_err(|e| Error::notification(format!("WeCom request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("WeCom message failed: {}", status);
            return Err(Error::notification(format!("WeCom message failed: {}", status)));
        }

        let body: WecomResponse = response
            .json()
            .await
            .map_err(|e| Error::notification(format!("WeCom response invalid: {}", e)))?;
        // 40014/42001: token invalid or expired
        if matches!(body.errcode, 40014 | 42001) {
            self.token.clear();
        }
        body.into_result()?;

        debug!("WeCom notification sent");
        Ok(())
    }
}
