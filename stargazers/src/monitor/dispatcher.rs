//! Retry-once dispatcher.
//!
//! Runs a fallible action once inline. If it fails, a supervised background
//! loop keeps retrying on a fixed interval until it succeeds or the
//! dispatcher shuts down.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;

/// Supervisor for retry loops.
pub struct RetryDispatcher {
    cancellation_token: CancellationToken,
    tasks: parking_lot::Mutex<Option<JoinSet<()>>>,
    active: Arc<AtomicUsize>,
}

impl RetryDispatcher {
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Create a dispatcher whose loops also stop when `parent` is cancelled.
    pub fn with_cancellation(parent: CancellationToken) -> Self {
        Self {
            cancellation_token: parent.child_token(),
            tasks: parking_lot::Mutex::new(Some(JoinSet::new())),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run `action` once; on failure hand it to a background retry loop.
    ///
    /// Returns `true` if the first attempt succeeded. Returns `false`
    /// immediately otherwise; the first retry happens one `interval` later.
    pub async fn ensure_once<F, Fut>(&self, name: &str, interval: Duration, action: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        match action().await {
            Ok(()) => return true,
            Err(e) => warn!(task = %name, error = %e, "first attempt failed, retrying in background"),
        }

        let mut tasks = self.tasks.lock();
        let Some(join_set) = tasks.as_mut() else {
            warn!(task = %name, "dispatcher is shut down, dropping retry");
            return false;
        };

        // Reap loops that already finished.
        while join_set.try_join_next().is_some() {}

        let name = name.to_string();
        let token = self.cancellation_token.clone();
        let active = self.active.clone();
        active.fetch_add(1, Ordering::SeqCst);

        join_set.spawn(async move {
            retry_loop(&name, interval, token, action).await;
            active.fetch_sub(1, Ordering::SeqCst);
        });

        false
    }

    /// Number of retry loops that have not finished.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Cancel every outstanding loop and wait for them to exit.
    pub async fn shutdown(&self) {
        self.cancellation_token.cancel();

        let join_set = {
            let mut tasks = self.tasks.lock();
            tasks.take()
        };

        if let Some(mut join_set) = join_set {
            let pending = join_set.len();
            while join_set.join_next().await.is_some() {}
            debug!(pending, "retry dispatcher stopped");
        }
    }
}

impl Default for RetryDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

async fn retry_loop<F, Fut>(name: &str, interval: Duration, token: CancellationToken, action: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempt: u32 = 1;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(task = %name, attempt, "retry cancelled");
                return;
            }
            _ = ticker.tick() => {}
        }

        attempt += 1;
        let result = tokio::select! {
            _ = token.cancelled() => {
                debug!(task = %name, attempt, "retry cancelled");
                return;
            }
            result = action() => result,
        };

        match result {
            Ok(()) => {
                info!(task = %name, attempt, "retry succeeded");
                return;
            }
            Err(e) => warn!(task = %name, attempt, error = %e, "retry failed"),
        }
    }
}
