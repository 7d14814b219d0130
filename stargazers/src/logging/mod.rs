//! Logging setup.
//!
//! This module provides:
//! - Console output with local timezone timestamps
//! - Optional daily-rolling file output, plain text or JSON lines
//! - Log file retention cleanup (7 days unless configured)

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::{Error, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "stargazers=info,github_client=info";

/// Filter used by `--verbose` when nothing else is configured.
pub const VERBOSE_LOG_FILTER: &str = "stargazers=debug,github_client=debug";

/// File name prefix of the rolling log files.
const LOG_FILE_PREFIX: &str = "stargazers.log";

const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Custom timer that uses the local timezone via chrono.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Text,
    Json,
}

/// `[logging]` section of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `stargazers=debug`.
    pub filter: Option<String>,
    /// Directory for rolling log files; console only when unset.
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub format: FileFormat,
    /// Days of log files to keep; 0 keeps everything.
    pub retention_days: Option<u32>,
}

impl LoggingSettings {
    fn retention_days(&self) -> u32 {
        self.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS)
    }

    /// Filter to install. `RUST_LOG` always wins.
    fn resolve_filter(&self, verbose: bool) -> EnvFilter {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
        let directive = match (&self.filter, verbose) {
            (Some(filter), _) if !filter.trim().is_empty() => filter.as_str(),
            (_, true) => VERBOSE_LOG_FILTER,
            _ => DEFAULT_LOG_FILTER,
        };
        EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    }
}

/// Keeps the file writer alive; drop it at exit to flush.
pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
    log_dir: Option<PathBuf>,
    retention_days: u32,
}

impl LoggingGuard {
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    /// Start the daily log retention cleanup task.
    ///
    /// No-op without a log directory or with retention disabled.
    pub fn start_retention_cleanup(&self, cancel_token: CancellationToken) {
        let Some(log_dir) = self.log_dir.clone() else {
            return;
        };
        let retention_days = self.retention_days;
        if retention_days == 0 {
            return;
        }

        tokio::spawn(async move {
            let cleanup_interval = Duration::from_secs(24 * 60 * 60);

            loop {
                if let Err(e) = cleanup_old_logs(&log_dir, retention_days).await {
                    warn!(error = %e, "Failed to cleanup old logs");
                }

                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Log retention cleanup task shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(cleanup_interval) => {}
                }
            }
        });
    }
}

/// Initialize the global subscriber.
///
/// Keep the returned guard alive for the lifetime of the program.
pub fn init_logging(settings: &LoggingSettings, verbose: bool) -> Result<LoggingGuard> {
    let filter = settings.resolve_filter(verbose);

    let mut text_layer = None;
    let mut json_layer = None;
    let mut guard = None;
    if let Some(dir) = &settings.dir {
        std::fs::create_dir_all(dir)?;
        let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        match settings.format {
            FileFormat::Text => {
                text_layer = Some(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_timer(LocalTimer),
                );
            }
            FileFormat::Json => {
                json_layer = Some(
                    fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_timer(LocalTimer),
                );
            }
        }
        guard = Some(worker_guard);
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(text_layer)
        .with(json_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to set global default subscriber: {}", e)))?;

    Ok(LoggingGuard {
        _guard: guard,
        log_dir: settings.dir.clone(),
        retention_days: settings.retention_days(),
    })
}

/// Delete log files older than the specified number of days.
async fn cleanup_old_logs(log_dir: &Path, retention_days: u32) -> std::io::Result<usize> {
    let cutoff = (Utc::now() - chrono::Duration::days(i64::from(retention_days))).date_naive();
    let prefix = format!("{LOG_FILE_PREFIX}.");

    let mut entries = tokio::fs::read_dir(log_dir).await?;
    let mut deleted_count = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        // stargazers.log.YYYY-MM-DD
        let Some(date_str) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(prefix.as_str()))
        else {
            continue;
        };

        let Ok(file_date) = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
            continue;
        };

        if file_date < cutoff {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to delete old log file");
            } else {
                deleted_count += 1;
                debug!(path = %path.display(), "Deleted old log file");
            }
        }
    }

    if deleted_count > 0 {
        info!(count = deleted_count, "Cleaned up old log files");
    }

    Ok(deleted_count)
}
