//! Snapshot fetching: whole-list pagination and repository metadata.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::RepoId;
use crate::source::{RepositorySource, StargazerPage};
use crate::{Error, Result};

/// Default GitHub page size (the API maximum).
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Full stargazer snapshot, id to starred-at.
pub type Snapshot = HashMap<String, DateTime<Utc>>;

#[derive(Clone)]
pub struct SnapshotFetcher {
    source: Arc<dyn RepositorySource>,
    page_size: u32,
}

impl SnapshotFetcher {
    pub fn new(source: Arc<dyn RepositorySource>, page_size: u32) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Page through the entire stargazer list.
    ///
    /// An id seen on more than one page keeps its earliest timestamp. Any page
    /// failure aborts the whole fetch.
    pub async fn fetch_all(&self, repo: &RepoId) -> Result<Snapshot> {
        let mut stars = Snapshot::new();
        let mut page = 1;

        loop {
            info!("requesting page {}", page);
            let current = self.fetch_page(repo, page).await?;

            for record in current.records {
                match stars.entry(record.id) {
                    Entry::Vacant(entry) => {
                        entry.insert(record.starred_at);
                    }
                    Entry::Occupied(mut entry) => {
                        if record.starred_at < *entry.get() {
                            entry.insert(record.starred_at);
                        }
                    }
                }
            }

            match current.next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        debug!(repo = %repo, stargazers = stars.len(), "fetched full snapshot");
        Ok(stars)
    }

    /// Fetch a single page.
    pub async fn fetch_page(&self, repo: &RepoId, page: u32) -> Result<StargazerPage> {
        self.source
            .list_stargazers(repo, page, self.page_size)
            .await
            .map_err(|e| Error::Fetch {
                page,
                source: Box::new(e),
            })
    }

    /// Current star count of `repo`.
    pub async fn fetch_total_count(&self, repo: &RepoId) -> Result<u64> {
        self.source.star_count(repo).await
    }
}
