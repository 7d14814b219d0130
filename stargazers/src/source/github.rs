//! GitHub-backed repository source.

use std::time::Duration;

use async_trait::async_trait;
use github_client::{GithubClient, GithubError};
use tracing::debug;

use super::{RateLimiter, RepositorySource, StargazerPage};
use crate::Result;
use crate::domain::{RepoId, StargazerRecord, UserProfile};

/// [`RepositorySource`] over the GitHub REST API, throttled by a shared
/// token bucket.
#[derive(Debug, Clone)]
pub struct GithubSource {
    client: GithubClient,
    limiter: RateLimiter,
}

impl GithubSource {
    pub fn new(client: GithubClient, limiter: RateLimiter) -> Self {
        Self { client, limiter }
    }

    /// Build a client for the public API with the given token and timeout.
    pub fn connect(token: Option<&str>, timeout: Duration, limiter: RateLimiter) -> Result<Self> {
        let client = GithubClient::new(token, timeout)?;
        Ok(Self::new(client, limiter))
    }

    async fn throttle(&self) {
        let waited = self.limiter.acquire().await;
        if !waited.is_zero() {
            debug!("Rate limited for {:?}", waited);
        }
    }

    /// Convert a client result, freezing the limiter on quota exhaustion.
    fn observe<T>(&self, result: std::result::Result<T, GithubError>) -> Result<T> {
        if let Err(GithubError::RateLimited { reset: Some(reset) }) = &result {
            self.limiter.pause_until_epoch(*reset);
        }
        Ok(result?)
    }
}

#[async_trait]
impl RepositorySource for GithubSource {
    async fn list_stargazers(
        &self,
        repo: &RepoId,
        page: u32,
        per_page: u32,
    ) -> Result<StargazerPage> {
        self.throttle().await;
        let page = self.observe(
            self.client
                .list_stargazers(repo.owner(), repo.project(), page, per_page)
                .await,
        )?;

        let records = page
            .stargazers
            .iter()
            .filter_map(|gazer| {
                gazer
                    .login()
                    .map(|login| StargazerRecord::new(login, gazer.starred_at))
            })
            .collect();

        Ok(StargazerPage {
            page: page.page,
            records,
            next_page: page.next_page,
            prev_page: page.prev_page,
        })
    }

    async fn star_count(&self, repo: &RepoId) -> Result<u64> {
        self.throttle().await;
        let repository =
            self.observe(self.client.get_repository(repo.owner(), repo.project()).await)?;
        Ok(repository.stargazers_count)
    }

    async fn user(&self, id: &str) -> Result<UserProfile> {
        self.throttle().await;
        let user = self.observe(self.client.get_user(id).await)?;
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RateLimiterConfig;

    fn source() -> GithubSource {
        let limiter = RateLimiter::new(RateLimiterConfig::default());
        GithubSource::connect(None, Duration::from_secs(1), limiter).unwrap()
    }

    #[test]
    fn test_rate_limit_pauses_limiter() {
        let source = source();
        let reset = chrono::Utc::now().timestamp() + 120;
        let result: Result<()> = source.observe(Err(GithubError::RateLimited { reset: Some(reset) }));

        assert!(result.is_err());
        assert!(source.limiter.is_paused());
    }

    #[test]
    fn test_not_found_passes_through() {
        let source = source();
        let result: Result<()> = source.observe(Err(GithubError::NotFound("ghost".to_string())));

        assert!(result.unwrap_err().is_not_found());
        assert!(!source.limiter.is_paused());
    }
}
