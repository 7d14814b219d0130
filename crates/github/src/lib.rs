//! Minimal GitHub REST client.
//!
//! Covers the three calls a stargazer watcher needs: paging through a
//! repository's stargazers (with `starred_at`), reading repository metadata
//! and resolving a user profile.

mod client;
mod error;
mod models;
mod pagination;

pub use client::{DEFAULT_API_URL, GithubClient};
pub use error::GithubError;
pub use models::{Repository, SimpleUser, Stargazer, StargazerPage, User};
pub use pagination::PageLinks;
