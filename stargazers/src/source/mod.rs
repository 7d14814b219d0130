//! Repository data sources.
//!
//! The monitor never talks to GitHub directly; it goes through
//! [`RepositorySource`], which keeps the change-detection logic testable
//! against an in-memory source.

mod github;
#[cfg(test)]
pub(crate) mod mock;
mod rate_limiter;

pub use github::GithubSource;
pub use rate_limiter::{RateLimiter, RateLimiterConfig};

use async_trait::async_trait;

use crate::Result;
use crate::domain::{RepoId, StargazerRecord, UserProfile};

/// One page of stargazers in ascending `starred_at` order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StargazerPage {
    pub page: u32,
    pub records: Vec<StargazerRecord>,
    pub next_page: Option<u32>,
    pub prev_page: Option<u32>,
}

/// Read access to a code host's stargazer data.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Fetch one page of the stargazer list (1-based).
    async fn list_stargazers(
        &self,
        repo: &RepoId,
        page: u32,
        per_page: u32,
    ) -> Result<StargazerPage>;

    /// Current star count of a repository.
    async fn star_count(&self, repo: &RepoId) -> Result<u64>;

    /// Resolve a user's profile. A vanished account yields `Error::NotFound`.
    async fn user(&self, id: &str) -> Result<UserProfile>;
}
