//! In-memory source for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{RepositorySource, StargazerPage};
use crate::domain::{RepoId, StargazerRecord, UserProfile};
use crate::{Error, Result};

#[derive(Default)]
struct MockState {
    /// Stargazers in ascending `starred_at` order.
    stargazers: Vec<StargazerRecord>,
    /// Overrides the reported count of the watched repo.
    count_override: Option<u64>,
    /// Counts for other repositories, keyed by `owner/project`.
    other_counts: HashMap<String, u64>,
    profiles: HashMap<String, UserProfile>,
    deleted_users: HashSet<String>,
    /// Remaining transient failures per user id.
    flaky_users: HashMap<String, u32>,
    fail_counts: bool,
    /// Count calls from this (1-based) call on fail.
    fail_counts_from: Option<u32>,
    fail_pages: bool,
}

pub(crate) struct MockSource {
    state: Mutex<MockState>,
    pub page_calls: AtomicU32,
    pub user_calls: AtomicU32,
    pub count_calls: AtomicU32,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            page_calls: AtomicU32::new(0),
            user_calls: AtomicU32::new(0),
            count_calls: AtomicU32::new(0),
        }
    }

    pub fn with_stargazers(records: &[(&str, DateTime<Utc>)]) -> Self {
        let source = Self::new();
        for (id, at) in records {
            source.star(id, *at);
        }
        source
    }

    pub fn star(&self, id: &str, at: DateTime<Utc>) {
        let mut state = self.state.lock();
        state.stargazers.retain(|r| r.id != id);
        state.stargazers.push(StargazerRecord::new(id, at));
        state.stargazers.sort_by_key(|r| r.starred_at);
    }

    /// Append a second entry for `id` at the end of the list, unsorted, as
    /// if the list shifted between page reads.
    pub fn append_duplicate(&self, id: &str, at: DateTime<Utc>) {
        self.state.lock().stargazers.push(StargazerRecord::new(id, at));
    }

    pub fn unstar(&self, id: &str) {
        self.state.lock().stargazers.retain(|r| r.id != id);
    }

    pub fn set_count(&self, count: Option<u64>) {
        self.state.lock().count_override = count;
    }

    pub fn set_other_count(&self, repo: &str, count: u64) {
        self.state.lock().other_counts.insert(repo.to_string(), count);
    }

    pub fn set_profile(&self, id: &str, name: Option<&str>, followers: Option<u64>) {
        self.state.lock().profiles.insert(
            id.to_string(),
            UserProfile {
                name: name.map(str::to_string),
                followers,
            },
        );
    }

    pub fn delete_user(&self, id: &str) {
        self.state.lock().deleted_users.insert(id.to_string());
    }

    pub fn make_flaky(&self, id: &str, failures: u32) {
        self.state.lock().flaky_users.insert(id.to_string(), failures);
    }

    pub fn fail_counts(&self, fail: bool) {
        self.state.lock().fail_counts = fail;
    }

    pub fn fail_counts_from(&self, call: u32) {
        self.state.lock().fail_counts_from = Some(call);
    }

    pub fn fail_pages(&self, fail: bool) {
        self.state.lock().fail_pages = fail;
    }
}

#[async_trait]
impl RepositorySource for MockSource {
    async fn list_stargazers(
        &self,
        _repo: &RepoId,
        page: u32,
        per_page: u32,
    ) -> Result<StargazerPage> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        if state.fail_pages {
            return Err(Error::Transport("page unavailable".to_string()));
        }

        let page = page.max(1);
        let per_page = per_page as usize;
        let start = (page as usize - 1) * per_page;
        let records: Vec<_> = state
            .stargazers
            .iter()
            .skip(start)
            .take(per_page)
            .cloned()
            .collect();
        let next_page = (start + per_page < state.stargazers.len()).then_some(page + 1);
        let prev_page = (page > 1).then_some(page - 1);

        Ok(StargazerPage {
            page,
            records,
            next_page,
            prev_page,
        })
    }

    async fn star_count(&self, repo: &RepoId) -> Result<u64> {
        let call = self.count_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let state = self.state.lock();
        if state.fail_counts || state.fail_counts_from.is_some_and(|from| call >= from) {
            return Err(Error::Transport("metadata unavailable".to_string()));
        }
        if let Some(count) = state.other_counts.get(&repo.to_string()) {
            return Ok(*count);
        }
        Ok(state
            .count_override
            .unwrap_or(state.stargazers.len() as u64))
    }

    async fn user(&self, id: &str) -> Result<UserProfile> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if state.deleted_users.contains(id) {
            return Err(Error::not_found("user", id));
        }
        if let Some(remaining) = state.flaky_users.get_mut(id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::Transport(format!("lookup of {id} timed out")));
            }
        }
        Ok(state.profiles.get(id).cloned().unwrap_or_default())
    }
}
