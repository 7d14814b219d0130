//! Ranking a repository's stargazers by follower count.

use chrono::{DateTime, Local, Utc};
use futures::stream::{self, StreamExt};
use tracing::warn;

use crate::Result;
use crate::domain::{RepoId, UserProfile};
use crate::monitor::{SnapshotFetcher, UserEnricher};

const STAR_TIME_FORMAT: &str = "%m-%d %H:%M:%S";

/// One resolved stargazer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KolEntry {
    pub id: String,
    pub starred_at: DateTime<Utc>,
    pub profile: UserProfile,
}

impl KolEntry {
    pub fn followers(&self) -> u64 {
        self.profile.followers.unwrap_or(0)
    }

    pub fn render(&self) -> String {
        let at = self.starred_at.with_timezone(&Local).format(STAR_TIME_FORMAT);
        match &self.profile.name {
            Some(name) => format!(
                "id: {}, name: {}, followers: {}, starAt: {}",
                self.id,
                name,
                self.followers(),
                at
            ),
            None => format!(
                "id: {}, followers: {}, starAt: {}",
                self.id,
                self.followers(),
                at
            ),
        }
    }
}

/// Fetch every stargazer of `repo` and resolve their profiles.
///
/// `on_progress(done, total)` runs once per resolved (or failed) user. Users that cannot
/// be resolved are logged and left out. The result is ordered by followers,
/// most first.
pub async fn rank_stargazers<F>(
    fetcher: &SnapshotFetcher,
    enricher: &UserEnricher,
    repo: &RepoId,
    concurrency: usize,
    on_progress: F,
) -> Result<Vec<KolEntry>>
where
    F: Fn(usize, usize),
{
    let snapshot = fetcher.fetch_all(repo).await?;
    let total = snapshot.len();
    let mut done = 0;

    let mut entries: Vec<KolEntry> = stream::iter(snapshot)
        .map(|(id, starred_at)| async move {
            let result = enricher.resolve(&id).await;
            (id, starred_at, result)
        })
        .buffer_unordered(concurrency.max(1))
        .filter_map(|(id, starred_at, result)| {
            done += 1;
            on_progress(done, total);
            let entry = match result {
                Ok(profile) => Some(KolEntry {
                    id,
                    starred_at,
                    profile,
                }),
                Err(e) => {
                    warn!(user = %id, error = %e, "failed to resolve stargazer");
                    None
                }
            };
            futures::future::ready(entry)
        })
        .collect()
        .await;

    entries.sort_by(|a, b| b.followers().cmp(&a.followers()).then(a.id.cmp(&b.id)));
    Ok(entries)
}
