//! Subcommand implementations.

use std::sync::Arc;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use stargazers::config::AppConfig;
use stargazers::kol::rank_stargazers;
use stargazers::monitor::{DiffEngine, SnapshotFetcher, StarMonitor, UserEnricher};
use stargazers::notification::{NotificationChannel, build_channels};
use stargazers::source::{GithubSource, RateLimiter, RepositorySource};

fn connect(config: &AppConfig) -> anyhow::Result<Arc<dyn RepositorySource>> {
    if config.token.is_none() {
        warn!("No GitHub token configured, API rate limits will be low");
    }
    let limiter = RateLimiter::new(config.rate_limit.clone());
    let source = GithubSource::connect(config.token.as_deref(), config.request_timeout, limiter)
        .context("Failed to create GitHub client")?;
    Ok(Arc::new(source))
}

/// Run the monitor until Ctrl-C.
pub async fn watch(config: &AppConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    if config.channels.is_empty() {
        warn!("No notification channels configured, changes will only be logged");
    }

    let source = connect(config)?;
    let engine = DiffEngine::new(
        SnapshotFetcher::new(source.clone(), config.page_size),
        UserEnricher::new(source),
    )
    .with_max_backward_pages(config.max_backward_pages);
    let channel: Arc<dyn NotificationChannel> = Arc::new(build_channels(&config.channels));
    let monitor = StarMonitor::new(config.monitor_config(), engine, channel);

    let token = monitor.cancellation_token();
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                    return;
                }
                info!("Received Ctrl-C, shutting down");
            }
            _ = shutdown.cancelled() => {}
        }
        token.cancel();
    });

    monitor
        .start()
        .await
        .with_context(|| format!("Monitor for {} failed", config.repo))
}

/// Print stargazers ordered by follower count.
pub async fn kol(config: &AppConfig, top: Option<usize>, concurrency: usize) -> anyhow::Result<()> {
    let source = connect(config)?;
    let fetcher = SnapshotFetcher::new(source.clone(), config.page_size);
    let enricher = UserEnricher::new(source);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_message("resolving stargazers");

    let entries = rank_stargazers(&fetcher, &enricher, &config.repo, concurrency, |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })
    .await
    .with_context(|| format!("Failed to rank stargazers of {}", config.repo))?;
    pb.finish_and_clear();

    let shown = top.unwrap_or(entries.len()).min(entries.len());
    println!();
    // Most followed last, so the top of the list stays on screen.
    for entry in entries[..shown].iter().rev() {
        println!("{}", entry.render());
    }
    Ok(())
}

/// Send a test message through every configured channel.
pub async fn test_channels(config: &AppConfig) -> anyhow::Result<()> {
    if config.channels.is_empty() {
        anyhow::bail!("No notification channels configured");
    }

    let mut failed = 0;
    for channel_config in &config.channels {
        let channel = channel_config.build();
        match channel.test().await {
            Ok(()) => println!("{}: ok", channel.channel_type()),
            Err(e) => {
                failed += 1;
                println!("{}: {}", channel.channel_type(), e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} channels failed", failed, config.channels.len());
    }
    Ok(())
}
