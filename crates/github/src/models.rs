//! Response models for the subset of the GitHub REST API used here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimal user reference embedded in other payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleUser {
    pub login: String,
    #[serde(default)]
    pub id: u64,
}

/// A stargazer entry as returned with the `star+json` media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stargazer {
    pub starred_at: DateTime<Utc>,
    /// `null` for accounts GitHub has fully removed.
    pub user: Option<SimpleUser>,
}

impl Stargazer {
    pub fn login(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.login.as_str())
    }
}

/// Repository metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub full_name: String,
    pub stargazers_count: u64,
}

/// Full user profile. Every descriptive field is optional on GitHub's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub followers: Option<u64>,
}

/// One page of stargazers together with its pagination links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StargazerPage {
    pub page: u32,
    pub stargazers: Vec<Stargazer>,
    pub next_page: Option<u32>,
    pub prev_page: Option<u32>,
    pub last_page: Option<u32>,
}
