//! Fan-out over several channels.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

use super::NotificationChannel;
use crate::{Error, Result};

/// Sends every message to all child channels.
///
/// Fails if any child failed. A retried message is sent again to every
/// child, so healthy channels may see duplicates.
pub struct CompositeChannel {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl CompositeChannel {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> &[Arc<dyn NotificationChannel>] {
        &self.channels
    }
}

#[async_trait]
impl NotificationChannel for CompositeChannel {
    fn channel_type(&self) -> &'static str {
        "composite"
    }

    async fn send(&self, text: &str) -> Result<()> {
        let results = join_all(self.channels.iter().map(|c| c.send(text))).await;

        let failures: Vec<String> = self
            .channels
            .iter()
            .zip(results)
            .filter_map(|(channel, result)| {
                result.err().map(|e| {
                    warn!(channel = channel.channel_type(), error = %e, "channel send failed");
                    format!("{}: {}", channel.channel_type(), e)
                })
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::notification(failures.join("; ")))
        }
    }

    async fn test(&self) -> Result<()> {
        let results = join_all(self.channels.iter().map(|c| c.test())).await;
        let failures: Vec<String> = self
            .channels
            .iter()
            .zip(results)
            .filter_map(|(channel, result)| {
                result
                    .err()
                    .map(|e| format!("{}: {}", channel.channel_type(), e))
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::notification(failures.join("; ")))
        }
    }
}
