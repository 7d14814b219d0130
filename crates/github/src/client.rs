use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::GithubError;
use crate::models::{Repository, Stargazer, StargazerPage, User};
use crate::pagination::PageLinks;

pub const DEFAULT_API_URL: &str = "https://api.github.com/";

/// Media type that makes the stargazers endpoint include `starred_at`.
const STAR_MEDIA_TYPE: &str = "application/vnd.github.star+json";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Clone)]
pub struct GithubClient {
    client: Client,
    base_url: Url,
}

impl GithubClient {
    /// Create a client against the public API.
    ///
    /// A zero `timeout` disables the request timeout.
    pub fn new(token: Option<&str>, timeout: Duration) -> Result<Self, GithubError> {
        Self::with_base_url(DEFAULT_API_URL, token, timeout)
    }

    /// Create a client against a custom API root (GitHub Enterprise, test servers).
    pub fn with_base_url(
        base_url: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, GithubError> {
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("github-client/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| GithubError::InvalidToken)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if timeout > Duration::ZERO {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    /// Fetch one page of stargazers, oldest first.
    pub async fn list_stargazers(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
        per_page: u32,
    ) -> Result<StargazerPage, GithubError> {
        let mut url = self.base_url.join(&format!("repos/{owner}/{repo}/stargazers"))?;
        url.query_pairs_mut()
            .append_pair("per_page", &per_page.to_string())
            .append_pair("page", &page.to_string());

        trace!(%url, "requesting stargazers page");
        let response = self
            .client
            .get(url)
            .header(ACCEPT, STAR_MEDIA_TYPE)
            .send()
            .await?;
        let response = check_status(response, &format!("{owner}/{repo}")).await?;

        let links = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .map(PageLinks::parse)
            .unwrap_or_default();
        let stargazers: Vec<Stargazer> = decode(response).await?;

        debug!(
            page,
            count = stargazers.len(),
            next = ?links.next,
            "fetched stargazers page"
        );

        Ok(StargazerPage {
            page,
            stargazers,
            next_page: links.next,
            prev_page: links.prev,
            last_page: links.last,
        })
    }

    pub async fn get_repository(&self, owner: &str, repo: &str) -> Result<Repository, GithubError> {
        let url = self.base_url.join(&format!("repos/{owner}/{repo}"))?;
        self.get_json(url, &format!("{owner}/{repo}")).await
    }

    pub async fn get_user(&self, login: &str) -> Result<User, GithubError> {
        let url = self.base_url.join(&format!("users/{login}"))?;
        self.get_json(url, login).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, resource: &str) -> Result<T, GithubError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .send()
            .await?;
        let response = check_status(response, resource).await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GithubError> {
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

async fn check_status(response: Response, resource: &str) -> Result<Response, GithubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(GithubError::NotFound(resource.to_string()));
    }

    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        let headers = response.headers();
        let exhausted = headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "0");
        if exhausted || status == StatusCode::TOO_MANY_REQUESTS {
            let reset = headers
                .get("x-ratelimit-reset")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(GithubError::RateLimited { reset });
        }
    }

    let body = response.text().await.unwrap_or_default();
    Err(GithubError::Status {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Pull `message` out of a GitHub error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client =
            GithubClient::with_base_url("http://localhost:9000/api/v3", None, Duration::ZERO)
                .unwrap();
        assert_eq!(client.base_url.as_str(), "http://localhost:9000/api/v3/");
        let joined = client.base_url.join("users/octocat").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:9000/api/v3/users/octocat");
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"message": "Bad credentials", "documentation_url": "x"}"#),
            "Bad credentials"
        );
        assert_eq!(error_message("  upstream timeout \n"), "upstream timeout");
    }

    #[test]
    fn test_invalid_token_rejected() {
        let result = GithubClient::new(Some("bad\ntoken"), Duration::from_secs(1));
        assert!(result.is_err());
    }
}
