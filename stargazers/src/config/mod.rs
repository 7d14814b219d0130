//! Application configuration.
//!
//! Configuration comes from a TOML file. The GitHub token may instead come
//! from `GITHUB_TOKEN`, which is also read from a `.env` file when present.
//! Lookup order for the file: the `--config` argument, `./config.toml`,
//! then `<config dir>/stargazers/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Expectation, RepoId};
use crate::logging::LoggingSettings;
use crate::monitor::{DEFAULT_MAX_BACKWARD_PAGES, DEFAULT_PAGE_SIZE, MonitorConfig};
use crate::notification::{ChannelConfig, DEFAULT_QUEUE_SIZE};
use crate::source::RateLimiterConfig;
use crate::{Error, Result};

/// Environment variable holding the GitHub token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

const CONFIG_FILE: &str = "config.toml";

/// GitHub caps `per_page` at 100.
const MAX_PAGE_SIZE: u32 = 100;

/// The configuration file as written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Watched repository, `owner/project`.
    pub repo: String,
    pub token: Option<String>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub comparisons: Vec<String>,
    #[serde(default = "default_interval_secs")]
    pub retry_interval_secs: u64,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_backward_pages")]
    pub max_backward_pages: u32,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
    pub expect: Option<ExpectSection>,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// `[expect]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectSection {
    pub date: String,
    pub stars: u64,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_queue_size() -> usize {
    DEFAULT_QUEUE_SIZE
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_backward_pages() -> u32 {
    DEFAULT_MAX_BACKWARD_PAGES
}

fn default_requests_per_second() -> f64 {
    5.0
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub repo: RepoId,
    pub token: Option<String>,
    pub interval: Duration,
    pub page_size: u32,
    pub verbose: bool,
    pub comparisons: Vec<RepoId>,
    pub retry_interval: Duration,
    pub queue_size: usize,
    pub request_timeout: Duration,
    pub max_backward_pages: u32,
    pub rate_limit: RateLimiterConfig,
    pub expectation: Option<Expectation>,
    pub logging: LoggingSettings,
    pub channels: Vec<ChannelConfig>,
}

impl AppConfig {
    /// Load and validate the configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!(path = %env_file.display(), "loaded environment file");
        }

        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path().ok_or_else(|| {
                Error::config(format!(
                    "no {CONFIG_FILE} found in the working directory or the user config directory"
                ))
            })?,
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let env_token = std::env::var(TOKEN_ENV).ok();
        Self::from_toml(&content, env_token)
    }

    /// First existing default location.
    pub fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        Self::user_config_path().filter(|p| p.exists())
    }

    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("stargazers").join(CONFIG_FILE))
    }

    /// Parse and validate TOML content. `env_token` is used when the file has none.
    pub fn from_toml(content: &str, env_token: Option<String>) -> Result<Self> {
        let file: FileConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("invalid configuration: {}", e)))?;
        Self::validate(file, env_token)
    }

    fn validate(file: FileConfig, env_token: Option<String>) -> Result<Self> {
        let repo = RepoId::parse(&file.repo)
            .map_err(|e| Error::config(format!("invalid repo {:?}: {}", file.repo, e)))?;

        let comparisons = file
            .comparisons
            .iter()
            .map(|c| {
                RepoId::parse(c)
                    .map_err(|e| Error::config(format!("invalid comparison {:?}: {}", c, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let expectation = file
            .expect
            .as_ref()
            .map(|e| Expectation::parse(&e.date, e.stars))
            .transpose()
            .map_err(|e| Error::config(e.to_string()))?;

        if file.interval_secs == 0 {
            return Err(Error::config("interval_secs must be positive"));
        }
        if file.retry_interval_secs == 0 {
            return Err(Error::config("retry_interval_secs must be positive"));
        }
        if file.request_timeout_secs == 0 {
            return Err(Error::config("request_timeout_secs must be positive"));
        }
        if file.page_size == 0 || file.page_size > MAX_PAGE_SIZE {
            return Err(Error::config(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if file.queue_size == 0 {
            return Err(Error::config("queue_size must be positive"));
        }
        if file.max_backward_pages == 0 {
            return Err(Error::config("max_backward_pages must be positive"));
        }
        let rate_limit = RateLimiterConfig::with_rps(file.requests_per_second)?;

        for channel in &file.channels {
            channel.validate()?;
        }

        let token = file
            .token
            .filter(|t| !t.trim().is_empty())
            .or_else(|| env_token.filter(|t| !t.trim().is_empty()));

        Ok(Self {
            repo,
            token,
            interval: Duration::from_secs(file.interval_secs),
            page_size: file.page_size,
            verbose: file.verbose,
            comparisons,
            retry_interval: Duration::from_secs(file.retry_interval_secs),
            queue_size: file.queue_size,
            request_timeout: Duration::from_secs(file.request_timeout_secs),
            max_backward_pages: file.max_backward_pages,
            rate_limit,
            expectation,
            logging: file.logging,
            channels: file.channels,
        })
    }

    /// Settings for the monitor service.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            repo: self.repo.clone(),
            interval: self.interval,
            retry_interval: self.retry_interval,
            verbose: self.verbose,
            comparisons: self.comparisons.clone(),
            expectation: self.expectation,
            queue_size: self.queue_size,
        }
    }
}
