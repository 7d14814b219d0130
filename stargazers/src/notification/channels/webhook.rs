//! Plain HTTP webhook.
//!
//! By default the body mimics a Lark bot message, which several chat
//! services accept. Set `text_field` to post `{"<field>": "<text>"}` instead.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::{NotificationChannel, default_timeout, http_client};
use crate::{Error, Result};

/// Longest response body quoted in an error.
const MAX_ERROR_BODY: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookMethod {
    #[default]
    Post,
    Put,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WebhookAuth {
    Bearer { token: String },
    Basic { username: String, password: String },
    /// Arbitrary header, e.g. an API key.
    Header { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub method: WebhookMethod,
    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub auth: Option<WebhookAuth>,
    pub text_field: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: WebhookMethod::Post,
            headers: BTreeMap::new(),
            auth: None,
            text_field: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl WebhookConfig {
    /// Reject configs that could never produce a valid request.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::config("webhook channel requires a url"));
        }
        for (name, value) in &self.headers {
            parse_header(name, value)?;
        }
        if let Some(WebhookAuth::Header { name, value }) = &self.auth {
            parse_header(name, value)?;
        }
        if self.text_field.as_deref().is_some_and(|f| f.trim().is_empty()) {
            return Err(Error::config("webhook text_field must not be empty"));
        }
        Ok(())
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| Error::config(format!("invalid webhook header name {name:?}")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|_| Error::config(format!("invalid value for webhook header {name}")))?;
    Ok((header_name, header_value))
}

pub struct WebhookChannel {
    config: WebhookConfig,
    client: Client,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Self {
        let client = http_client(config.timeout_secs);
        Self { config, client }
    }

    fn payload(&self, text: &str) -> Value {
        match &self.config.text_field {
            Some(field) => {
                let mut body = Map::new();
                body.insert(field.clone(), Value::String(text.to_string()));
                Value::Object(body)
            }
            None => json!({
                "msg_type": "text",
                "content": { "text": text },
            }),
        }
    }

    fn request(&self, text: &str) -> RequestBuilder {
        let mut request = match self.config.method {
            WebhookMethod::Post => self.client.post(&self.config.url),
            WebhookMethod::Put => self.client.put(&self.config.url),
        };

        // validated at load; anything unparsable here is skipped
        for (name, value) in &self.config.headers {
            if let Ok((name, value)) = parse_header(name, value) {
                request = request.header(name, value);
            }
        }

        request = match &self.config.auth {
            Some(WebhookAuth::Bearer { token }) => request.bearer_auth(token),
            Some(WebhookAuth::Basic { username, password }) => {
                request.basic_auth(username, Some(password))
            }
            Some(WebhookAuth::Header { name, value }) => match parse_header(name, value) {
                Ok((name, value)) => request.header(name, value),
                Err(_) => request,
            },
            None => request,
        };

        request.json(&self.payload(text))
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn channel_type(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, text: &str) -> Result<()> {
        let response = self
            .request(text)
            .send()
            .await
            .map_err(|e| Error::notification(format!("webhook request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            warn!(%status, url = %self.config.url, "webhook rejected notification");
            return Err(Error::notification(format!("webhook returned {status}: {body}")));
        }

        debug!(url = %self.config.url, "webhook notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::AUTHORIZATION;

    use super::*;

    fn channel(config: WebhookConfig) -> WebhookChannel {
        WebhookChannel::new(WebhookConfig {
            url: "https://example.com/hook".to_string(),
            ..config
        })
    }

    #[test]
    fn test_config_from_toml() {
        let config: WebhookConfig = toml::from_str(
            r#"
                url = "https://example.com/hook"
                method = "PUT"
                headers = { "X-Source" = "stargazers" }
                auth = { kind = "bearer", token = "t0k" }
            "#,
        )
        .unwrap();
        assert_eq!(config.method, WebhookMethod::Put);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.auth, Some(WebhookAuth::Bearer { token: "t0k".to_string() }));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(WebhookConfig::default().validate().is_err());

        let mut config = WebhookConfig {
            url: "https://example.com/hook".to_string(),
            ..Default::default()
        };
        config.headers.insert("bad header".to_string(), "x".to_string());
        assert!(config.validate().is_err());

        config.headers.clear();
        config.text_field = Some(" ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_payload() {
        let payload = channel(WebhookConfig::default()).payload("stars: 1");
        assert_eq!(payload["msg_type"], "text");
        assert_eq!(payload["content"]["text"], "stars: 1");
    }

    #[test]
    fn test_text_field_payload() {
        let channel = channel(WebhookConfig {
            text_field: Some("message".to_string()),
            ..Default::default()
        });
        assert_eq!(channel.payload("stars: 1"), json!({ "message": "stars: 1" }));
    }

    #[test]
    fn test_request_carries_auth_and_headers() {
        let mut headers = BTreeMap::new();
        headers.insert("X-Source".to_string(), "stargazers".to_string());
        let channel = channel(WebhookConfig {
            method: WebhookMethod::Put,
            headers,
            auth: Some(WebhookAuth::Bearer {
                token: "t0k".to_string(),
            }),
            ..Default::default()
        });

        let request = channel.request("hi").build().unwrap();
        assert_eq!(request.method(), reqwest::Method::PUT);
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer t0k");
        assert_eq!(request.headers()["x-source"], "stargazers");
    }

    #[test]
    fn test_request_with_custom_auth_header() {
        let channel = channel(WebhookConfig {
            auth: Some(WebhookAuth::Header {
                name: "X-Api-Key".to_string(),
                value: "secret".to_string(),
            }),
            ..Default::default()
        });

        let request = channel.request("hi").build().unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.headers()["x-api-key"], "secret");
    }
}
