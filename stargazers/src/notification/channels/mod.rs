//! Notification channels.
//!
//! This module provides the transports a formatted message can go out on:
//! - Lark/Feishu (app message or bot webhook)
//! - Slack (Web API or incoming webhook)
//! - WeCom application message
//! - Generic webhooks (HTTP POST)
//!
//! Several configured channels are combined into one [`CompositeChannel`].

mod composite;
mod lark;
#[cfg(test)]
pub(crate) mod mock;
mod slack;
mod token;
mod webhook;
mod wecom;

pub use composite::CompositeChannel;
pub use lark::{LarkChannel, LarkConfig};
pub use slack::{SlackChannel, SlackConfig};
pub use webhook::{WebhookAuth, WebhookChannel, WebhookConfig, WebhookMethod};
pub use wecom::{WecomChannel, WecomConfig};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Message sent by [`NotificationChannel::test`].
pub const TEST_MESSAGE: &str = "stargazers: test notification";

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Get the channel type name.
    fn channel_type(&self) -> &'static str;

    /// Send one formatted message.
    async fn send(&self, text: &str) -> Result<()>;

    /// Test the channel configuration.
    async fn test(&self) -> Result<()> {
        self.send(TEST_MESSAGE).await
    }
}

/// Channel configuration wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelConfig {
    /// Lark/Feishu channel.
    Lark(LarkConfig),
    /// Slack channel.
    Slack(SlackConfig),
    /// WeCom application channel.
    Wecom(WecomConfig),
    /// Generic webhook channel.
    Webhook(WebhookConfig),
}

impl ChannelConfig {
    /// Get the channel type name.
    pub fn channel_type(&self) -> &'static str {
        match self {
            Self::Lark(_) => "lark",
            Self::Slack(_) => "slack",
            Self::Wecom(_) => "wecom",
            Self::Webhook(_) => "webhook",
        }
    }

    /// Check that the required fields for the selected mode are present.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Lark(c) => c.validate(),
            Self::Slack(c) => c.validate(),
            Self::Wecom(c) => c.validate(),
            Self::Webhook(c) => c.validate(),
        }
    }

    /// Build the channel this configuration describes.
    pub fn build(&self) -> Arc<dyn NotificationChannel> {
        match self {
            Self::Lark(c) => Arc::new(LarkChannel::new(c.clone())),
            Self::Slack(c) => Arc::new(SlackChannel::new(c.clone())),
            Self::Wecom(c) => Arc::new(WecomChannel::new(c.clone())),
            Self::Webhook(c) => Arc::new(WebhookChannel::new(c.clone())),
        }
    }
}

/// Build one channel fanning out to every configured transport.
pub fn build_channels(configs: &[ChannelConfig]) -> CompositeChannel {
    CompositeChannel::new(configs.iter().map(ChannelConfig::build).collect())
}

fn default_timeout() -> u64 {
    30
}

fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}
