//! Star monitor service.
//!
//! The StarMonitor drives detection ticks for one repository: it refreshes
//! the count, turns detected changes into notifications, and drains the
//! delivery queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::diff::DiffEngine;
use super::dispatcher::RetryDispatcher;
use super::events::Delta;
use crate::Result;
use crate::domain::{Expectation, RepoId, StargazerRecord, UserProfile};
use crate::notification::{
    Comparison, DEFAULT_QUEUE_SIZE, DeliveryQueue, DrainReport, Notification, NotificationChannel,
    NotificationKind,
};

/// Configuration for the star monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub repo: RepoId,
    /// Time between ticks.
    pub interval: Duration,
    /// Time between background retries of a new-star notification.
    pub retry_interval: Duration,
    /// Also notify when an unstar came from a deleted account.
    pub verbose: bool,
    /// Repositories whose counts are shown next to ours.
    pub comparisons: Vec<RepoId>,
    pub expectation: Option<Expectation>,
    pub queue_size: usize,
}

impl MonitorConfig {
    pub fn new(repo: RepoId) -> Self {
        Self {
            repo,
            interval: Duration::from_secs(60),
            retry_interval: Duration::from_secs(60),
            verbose: false,
            comparisons: Vec::new(),
            expectation: None,
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Star count, if the refresh succeeded.
    pub total: Option<u64>,
    pub new_stars: usize,
    pub removals: usize,
    pub drain: DrainReport,
}

/// The Star Monitor service.
pub struct StarMonitor {
    config: MonitorConfig,
    engine: Arc<DiffEngine>,
    queue: Arc<DeliveryQueue>,
    channel: Arc<dyn NotificationChannel>,
    dispatcher: RetryDispatcher,
    cancellation_token: CancellationToken,
}

impl StarMonitor {
    pub fn new(
        config: MonitorConfig,
        engine: DiffEngine,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        let cancellation_token = CancellationToken::new();
        Self {
            queue: Arc::new(DeliveryQueue::new(config.queue_size)),
            dispatcher: RetryDispatcher::with_cancellation(cancellation_token.clone()),
            engine: Arc::new(engine),
            config,
            channel,
            cancellation_token,
        }
    }

    pub fn engine(&self) -> &Arc<DiffEngine> {
        &self.engine
    }

    pub fn queue(&self) -> &Arc<DeliveryQueue> {
        &self.queue
    }

    pub fn dispatcher(&self) -> &RetryDispatcher {
        &self.dispatcher
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Load the baseline and tick until stopped.
    ///
    /// A failed baseline load is returned; failures inside a tick are logged
    /// and the next tick tries again.
    pub async fn start(&self) -> Result<()> {
        let repo = &self.config.repo;
        let count = tokio::select! {
            _ = self.cancellation_token.cancelled() => return Ok(()),
            result = self.engine.initialize(repo) => result?,
        };
        info!(
            repo = %repo,
            stargazers = count,
            interval_secs = self.config.interval.as_secs(),
            "Starting star monitor"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; the baseline was just loaded.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => break,
                report = self.tick() => {
                    debug!(?report, "tick finished");
                }
            }
        }

        info!("Star monitor shutting down");
        self.dispatcher.shutdown().await;
        let pending = self.queue.len();
        if pending > 0 {
            warn!(pending, "undelivered notifications dropped at shutdown");
        }
        Ok(())
    }

    /// Stop the tick loop and every outstanding retry.
    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }

    /// Run one detection pass, then drain the queue.
    ///
    /// The queue is drained even when detection failed.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        if let Err(e) = self.detect(&mut report).await {
            warn!(repo = %self.config.repo, error = %e, "tick aborted");
        }
        report.drain = self.queue.drain(self.channel.as_ref()).await;
        report
    }

    async fn detect(&self, report: &mut TickReport) -> Result<()> {
        let repo = &self.config.repo;
        let refresh = self.engine.refresh_count(repo).await?;
        report.total = Some(refresh.total);
        // Fetched on the first message that needs them.
        let mut comparisons = None;

        // Removals go out before anything found this tick.
        for delta in refresh.removals() {
            let (kind, record, profile) = match delta {
                Delta::Unstar { record, profile } => {
                    (NotificationKind::Unstar, record, profile.clone())
                }
                Delta::AccountDeleted { record } if self.config.verbose => {
                    (NotificationKind::AccountDeleted, record, UserProfile::default())
                }
                Delta::AccountDeleted { record } => {
                    debug!(user = %record.id, "unstar by deleted account, not notifying");
                    continue;
                }
                Delta::NewStar { .. } => continue,
            };

            let today = self.engine.counts_today(refresh.total);
            let text = Notification::new(kind, record.id.clone(), record.starred_at)
                .with_counts(refresh.total, today)
                .with_profile(profile)
                .with_comparisons(self.comparisons(&mut comparisons).await)
                .with_expectation(self.config.expectation)
                .render();
            debug!(kind = delta.kind(), user = %record.id, "removal queued");
            self.queue.put(text);
            report.removals += 1;
        }

        let mut new_stars: Vec<StargazerRecord> = refresh.new_stars().cloned().collect();
        new_stars.extend(self.engine.find_new_stars(repo, refresh.total).await?);

        if new_stars.is_empty() {
            return Ok(());
        }
        let comparisons = self.comparisons(&mut comparisons).await;
        for record in new_stars {
            self.notify_new_star(record, refresh.total, comparisons.clone())
                .await;
            report.new_stars += 1;
        }

        Ok(())
    }

    async fn comparisons(&self, cached: &mut Option<Vec<Comparison>>) -> Vec<Comparison> {
        if cached.is_none() {
            *cached = Some(self.fetch_comparisons().await);
        }
        cached.clone().unwrap_or_default()
    }

    async fn fetch_comparisons(&self) -> Vec<Comparison> {
        let mut comparisons = Vec::with_capacity(self.config.comparisons.len());
        for other in &self.config.comparisons {
            match self.engine.fetcher().fetch_total_count(other).await {
                Ok(stars) => comparisons.push(Comparison {
                    project: other.project().to_string(),
                    stars,
                }),
                Err(e) => warn!(repo = %other, error = %e, "failed to fetch comparison count"),
            }
        }
        comparisons
    }

    async fn notify_new_star(&self, record: StargazerRecord, total: u64, comparisons: Vec<Comparison>) {
        let name = format!("notify {}", record.id);
        let job = Arc::new(NewStarJob {
            engine: self.engine.clone(),
            queue: self.queue.clone(),
            repo: self.config.repo.clone(),
            record,
            known_total: total,
            comparisons,
            expectation: self.config.expectation,
        });

        let action = move || {
            let job = job.clone();
            async move { job.run().await }
        };
        self.dispatcher
            .ensure_once(&name, self.config.retry_interval, action)
            .await;
    }
}

/// Enrich, format and enqueue one new star.
struct NewStarJob {
    engine: Arc<DiffEngine>,
    queue: Arc<DeliveryQueue>,
    repo: RepoId,
    record: StargazerRecord,
    known_total: u64,
    comparisons: Vec<Comparison>,
    expectation: Option<Expectation>,
}

impl NewStarJob {
    async fn run(&self) -> Result<()> {
        let profile = match self.engine.enricher().resolve(&self.record.id).await {
            Ok(profile) => profile,
            Err(e) if e.is_not_found() => {
                debug!(user = %self.record.id, "new stargazer has no profile");
                UserProfile::default()
            }
            Err(e) => return Err(e),
        };

        let total = match self.engine.fetcher().fetch_total_count(&self.repo).await {
            Ok(total) => total,
            Err(e) => {
                debug!(error = %e, "using the count from the tick");
                self.known_total
            }
        };
        let today = self.engine.counts_today(total);

        let text = Notification::new(
            NotificationKind::NewStar,
            self.record.id.clone(),
            self.record.starred_at,
        )
        .with_counts(total, today)
        .with_profile(profile)
        .with_comparisons(self.comparisons.clone())
        .with_expectation(self.expectation)
        .render();

        info!(user = %self.record.id, total, today, "new stargazer");
        self.queue.put(text);
        Ok(())
    }
}
