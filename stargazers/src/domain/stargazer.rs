//! Stargazer entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stargazer and the moment they starred the repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StargazerRecord {
    pub id: String,
    pub starred_at: DateTime<Utc>,
}

impl StargazerRecord {
    pub fn new(id: impl Into<String>, starred_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            starred_at,
        }
    }
}

/// Display fields resolved for a stargazer. Both may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: Option<String>,
    pub followers: Option<u64>,
}

impl From<github_client::User> for UserProfile {
    fn from(user: github_client::User) -> Self {
        Self {
            name: user.name.filter(|n| !n.trim().is_empty()),
            followers: user.followers,
        }
    }
}
