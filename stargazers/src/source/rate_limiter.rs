//! Client-side throttling of GitHub API calls.
//!
//! One token bucket is shared by every request the process makes, so a
//! burst of profile lookups from retry tasks cannot eat the hourly quota.
//! When GitHub reports the quota exhausted anyway, the bucket is frozen
//! until the advertised reset.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::{Error, Result};

/// Longest freeze honored from a rate-limit reset header.
const MAX_PAUSE: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Bucket size, i.e. the largest burst.
    pub burst: u32,
    /// Requests allowed per second once the burst is spent.
    pub per_second: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            burst: 10,
            per_second: 5.0,
        }
    }
}

impl RateLimiterConfig {
    /// Config for `rps` requests per second with a burst of twice that.
    pub fn with_rps(rps: f64) -> Result<Self> {
        if !rps.is_finite() || rps <= 0.0 {
            return Err(Error::config(format!(
                "requests_per_second must be a positive number, got {rps}"
            )));
        }
        Ok(Self {
            burst: (rps * 2.0).ceil().max(1.0) as u32,
            per_second: rps,
        })
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    burst: f64,
    per_second: f64,
    refilled_at: Instant,
    frozen_until: Option<Instant>,
}

impl Bucket {
    fn new(config: &RateLimiterConfig) -> Self {
        Self {
            tokens: f64::from(config.burst),
            burst: f64::from(config.burst),
            per_second: config.per_second,
            refilled_at: Instant::now(),
            frozen_until: None,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.refilled_at);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.per_second).min(self.burst);
        self.refilled_at = now;
    }

    /// Take a token, or report how long until one is available.
    fn take(&mut self, now: Instant) -> std::result::Result<(), Duration> {
        if let Some(until) = self.frozen_until {
            if until > now {
                return Err(until - now);
            }
            self.frozen_until = None;
            self.refilled_at = now;
        }

        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / self.per_second))
        }
    }
}

/// Cloneable handle to the shared bucket.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    bucket: Arc<Mutex<Bucket>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            bucket: Arc::new(Mutex::new(Bucket::new(&config))),
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.bucket.lock().take(Instant::now()).is_ok()
    }

    /// Wait for a token. Returns the time spent waiting.
    ///
    /// The lock is never held across the sleep, so dropping the future
    /// mid-wait consumes nothing.
    pub async fn acquire(&self) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            let wait = match self.bucket.lock().take(Instant::now()) {
                Ok(()) => return waited,
                Err(wait) => wait,
            };
            trace!(?wait, "throttled");
            tokio::time::sleep(wait).await;
            waited += wait;
        }
    }

    /// Stop handing out tokens for `duration` (capped at one hour).
    pub fn pause_for(&self, duration: Duration) {
        let duration = duration.min(MAX_PAUSE);
        let until = Instant::now() + duration;
        let mut bucket = self.bucket.lock();
        if bucket.frozen_until.is_none_or(|current| current < until) {
            warn!(pause = ?duration, "GitHub quota exhausted, pausing requests");
            bucket.frozen_until = Some(until);
            bucket.tokens = 0.0;
        }
    }

    /// Pause until a Unix timestamp taken from `x-ratelimit-reset`.
    pub fn pause_until_epoch(&self, reset: i64) {
        let remaining = reset.saturating_sub(chrono::Utc::now().timestamp());
        if remaining > 0 {
            self.pause_for(Duration::from_secs(remaining as u64));
        }
    }

    pub fn is_paused(&self) -> bool {
        self.bucket
            .lock()
            .frozen_until
            .is_some_and(|until| until > Instant::now())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}
