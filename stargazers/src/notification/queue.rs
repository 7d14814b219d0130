//! Bounded outbound queue with at-least-once handoff.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::channels::NotificationChannel;

/// Default number of messages the queue holds.
pub const DEFAULT_QUEUE_SIZE: usize = 100;

/// Outcome of a drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub sent: usize,
    pub remaining: usize,
}

/// FIFO of formatted messages waiting for delivery.
///
/// `put` never blocks. When full, the oldest message is dropped.
pub struct DeliveryQueue {
    items: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl DeliveryQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn put(&self, message: String) {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            if let Some(dropped) = items.pop_front() {
                warn!(
                    capacity = self.capacity,
                    dropped = %first_line(&dropped),
                    "delivery queue full, dropping oldest message"
                );
            }
        }
        items.push_back(message);
    }

    /// Send queued messages in order until the first failure.
    ///
    /// The failed message goes back to the front and draining stops.
    pub async fn drain(&self, channel: &dyn NotificationChannel) -> DrainReport {
        let mut sent = 0;

        loop {
            let next = self.items.lock().pop_front();
            let Some(message) = next else {
                break;
            };

            match channel.send(&message).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(
                        channel = channel.channel_type(),
                        error = %e,
                        "failed to deliver notification, will retry next tick"
                    );
                    let mut items = self.items.lock();
                    items.push_front(message);
                    if items.len() > self.capacity {
                        if let Some(dropped) = items.pop_back() {
                            warn!(
                                dropped = %first_line(&dropped),
                                "delivery queue overflowed during send, dropping newest message"
                            );
                        }
                    }
                    break;
                }
            }
        }

        let remaining = self.len();
        if sent > 0 {
            debug!(sent, remaining, "drained delivery queue");
        }
        DrainReport { sent, remaining }
    }

    /// Copy of the queued messages, front first.
    pub fn pending(&self) -> Vec<String> {
        self.items.lock().iter().cloned().collect()
    }
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_SIZE)
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or_default()
}
