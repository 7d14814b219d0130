//! Change detection against the in-memory baseline.
//!
//! The diff engine owns the baseline (who starred, and when) and the daily
//! counter (latest total seen per local calendar day). Nothing else touches
//! either map; readers go through the accessors below, which take the lock
//! only for synchronous sections.
//!
//! Detection works in two halves per tick:
//! - [`DiffEngine::refresh_count`] reads the star total. A total lower than
//!   the one already recorded for today means someone left, which triggers a
//!   full re-fetch to find out who.
//! - [`DiffEngine::find_new_stars`] walks the stargazer pages backward from
//!   the last one, stopping once a page starts before local midnight.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::enricher::UserEnricher;
use super::events::{CountRefresh, Delta};
use super::fetcher::SnapshotFetcher;
use crate::Result;
use crate::domain::{RepoId, StargazerRecord};

/// Default bound on pages walked backward in one tick.
pub const DEFAULT_MAX_BACKWARD_PAGES: u32 = 10;

/// The most recent count observation.
#[derive(Debug, Clone, Copy)]
struct Observation {
    total: u64,
    /// Total from the observation before this one.
    prior_total: Option<u64>,
    at: DateTime<Utc>,
    /// Whether this observation ran a full reconciliation.
    reconciled: bool,
}

#[derive(Debug, Default)]
struct DiffState {
    baseline: HashMap<String, DateTime<Utc>>,
    daily: BTreeMap<NaiveDate, u64>,
    latest: Option<Observation>,
    /// Membership changed without the total shrinking; reconcile next refresh.
    reconcile_pending: bool,
}

/// Stargazer change-detection engine for one repository.
pub struct DiffEngine {
    fetcher: SnapshotFetcher,
    enricher: UserEnricher,
    state: RwLock<DiffState>,
    start_time: DateTime<Utc>,
    max_backward_pages: u32,
}

impl DiffEngine {
    pub fn new(fetcher: SnapshotFetcher, enricher: UserEnricher) -> Self {
        Self::with_start_time(fetcher, enricher, Utc::now())
    }

    /// Create an engine treating every star at or before `start_time` as pre-existing.
    pub fn with_start_time(
        fetcher: SnapshotFetcher,
        enricher: UserEnricher,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            fetcher,
            enricher,
            state: RwLock::new(DiffState::default()),
            start_time,
            max_backward_pages: DEFAULT_MAX_BACKWARD_PAGES,
        }
    }

    pub fn with_max_backward_pages(mut self, pages: u32) -> Self {
        self.max_backward_pages = pages.max(1);
        self
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn fetcher(&self) -> &SnapshotFetcher {
        &self.fetcher
    }

    pub fn enricher(&self) -> &UserEnricher {
        &self.enricher
    }

    /// Build the baseline from a full fetch and record the starting total.
    /// Returns the number of stargazers.
    ///
    /// A total below the fetched list means someone left while the pages
    /// were read; the first refresh then reconciles.
    pub async fn initialize(&self, repo: &RepoId) -> Result<usize> {
        let snapshot = self.fetcher.fetch_all(repo).await?;
        let total = self.fetcher.fetch_total_count(repo).await?;
        let counted_at = Utc::now();
        let count = snapshot.len();

        {
            let mut state = self.state.write();
            state.baseline = snapshot;
            state.daily.insert(Local::now().date_naive(), total);
            state.latest = Some(Observation {
                total,
                prior_total: None,
                at: counted_at,
                reconciled: false,
            });
            state.reconcile_pending = count as u64 > total;
        }

        if count as u64 > total {
            info!(repo = %repo, listed = count, total, "count below the fetched list, reconciling next refresh");
        }
        info!(repo = %repo, stargazers = count, total, "baseline loaded");
        Ok(count)
    }

    pub fn baseline_len(&self) -> usize {
        self.state.read().baseline.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.read().baseline.contains_key(id)
    }

    pub fn starred_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.state.read().baseline.get(id).copied()
    }

    /// Total recorded for `day`, if any.
    pub fn day_total(&self, day: NaiveDate) -> Option<u64> {
        self.state.read().daily.get(&day).copied()
    }

    pub fn record_day_total(&self, day: NaiveDate, total: u64) {
        self.state.write().daily.insert(day, total);
    }

    pub fn reconcile_pending(&self) -> bool {
        self.state.read().reconcile_pending
    }

    /// Refresh the star total, reconciling the baseline when it shrank.
    pub async fn refresh_count(&self, repo: &RepoId) -> Result<CountRefresh> {
        self.refresh_count_on(repo, Local::now().date_naive()).await
    }

    pub(crate) async fn refresh_count_on(
        &self,
        repo: &RepoId,
        today: NaiveDate,
    ) -> Result<CountRefresh> {
        let current = self.fetcher.fetch_total_count(repo).await?;
        let counted_at = Utc::now();

        // Today's last total, else the last total seen on any day.
        let (prev, pending) = {
            let state = self.state.read();
            let prev = state
                .daily
                .get(&today)
                .copied()
                .or(state.latest.map(|o| o.total))
                .unwrap_or(0);
            (prev, state.reconcile_pending)
        };

        let mut deltas = Vec::new();
        let reconcile = current < prev || pending;
        if reconcile {
            if current < prev {
                info!(repo = %repo, previous = prev, current, "star count dropped, reconciling");
            } else {
                info!(repo = %repo, current, "membership changed, reconciling");
            }
            deltas = self.reconcile(repo).await?;
        }

        let mut state = self.state.write();
        state.daily.insert(today, current);
        let prior_total = state.latest.map(|o| o.total);
        state.latest = Some(Observation {
            total: current,
            prior_total,
            at: counted_at,
            reconciled: reconcile,
        });

        Ok(CountRefresh {
            total: current,
            deltas,
        })
    }

    /// Full re-fetch; classify every change against the baseline and replace it.
    async fn reconcile(&self, repo: &RepoId) -> Result<Vec<Delta>> {
        let fresh = self.fetcher.fetch_all(repo).await?;

        let (mut removed, mut added) = {
            let state = self.state.read();
            let removed: Vec<StargazerRecord> = state
                .baseline
                .iter()
                .filter(|(id, _)| !fresh.contains_key(*id))
                .map(|(id, at)| StargazerRecord::new(id.clone(), *at))
                .collect();
            let added: Vec<StargazerRecord> = fresh
                .iter()
                .filter(|(id, _)| !state.baseline.contains_key(*id))
                .map(|(id, at)| StargazerRecord::new(id.clone(), *at))
                .collect();
            (removed, added)
        };
        removed.sort_by(|a, b| a.starred_at.cmp(&b.starred_at).then(a.id.cmp(&b.id)));
        added.sort_by(|a, b| a.starred_at.cmp(&b.starred_at).then(a.id.cmp(&b.id)));

        let mut deltas = Vec::with_capacity(removed.len() + added.len());
        for record in removed {
            match self.enricher.resolve(&record.id).await {
                Ok(profile) => {
                    info!(user = %record.id, "unstar detected");
                    deltas.push(Delta::Unstar { record, profile });
                }
                Err(e) if e.is_not_found() => {
                    info!(user = %record.id, "unstar by deleted account");
                    deltas.push(Delta::AccountDeleted { record });
                }
                Err(e) => {
                    warn!(user = %record.id, error = %e, "failed to resolve unstarred user, skipping");
                }
            }
        }

        for record in added {
            if record.starred_at > self.start_time {
                deltas.push(Delta::NewStar { record });
            }
        }

        let mut state = self.state.write();
        state.baseline = fresh;
        state.reconcile_pending = false;

        Ok(deltas)
    }

    /// Walk pages backward from the last one and record stargazers not yet in
    /// the baseline. Returns the ones that starred after the engine started.
    pub async fn find_new_stars(&self, repo: &RepoId, count: u64) -> Result<Vec<StargazerRecord>> {
        self.find_new_stars_since(repo, count, beginning_of_day(&Local::now()))
            .await
    }

    pub(crate) async fn find_new_stars_since(
        &self,
        repo: &RepoId,
        count: u64,
        day_start: DateTime<Utc>,
    ) -> Result<Vec<StargazerRecord>> {
        let page_size = u64::from(self.fetcher.page_size());
        let mut page = u32::try_from(count.div_ceil(page_size).max(1)).unwrap_or(u32::MAX);
        let counted_at = self.state.read().latest.map(|o| o.at);

        let mut found = Vec::new();
        let mut discovered = 0u64;
        let mut stepped_back = false;
        let mut walked = 0;

        loop {
            if walked >= self.max_backward_pages {
                warn!(
                    repo = %repo,
                    pages = walked,
                    "stopped paging backward at the page limit"
                );
                break;
            }
            walked += 1;

            let current = self.fetcher.fetch_page(repo, page).await?;

            // The count can run ahead of the list; look one page further back.
            if current.records.is_empty() {
                if page > 1 && !stepped_back {
                    stepped_back = true;
                    page -= 1;
                    continue;
                }
                break;
            }

            {
                let mut state = self.state.write();
                for record in &current.records {
                    if state.baseline.contains_key(&record.id) {
                        continue;
                    }
                    state.baseline.insert(record.id.clone(), record.starred_at);
                    if counted_at.is_none_or(|at| record.starred_at <= at) {
                        discovered += 1;
                    }

                    if record.starred_at > self.start_time {
                        found.push(record.clone());
                    } else {
                        debug!(user = %record.id, "pre-existing stargazer, not notifying");
                    }
                }
            }

            let starts_today = current
                .records
                .first()
                .is_some_and(|first| first.starred_at > day_start);
            if !starts_today {
                break;
            }
            match current.prev_page {
                Some(prev) if prev < page => page = prev,
                _ => break,
            }
        }

        self.check_hidden_removal(count, discovered);
        Ok(found)
    }

    /// Flag a reconciliation when more stargazers appeared than the total grew by.
    fn check_hidden_removal(&self, count: u64, discovered: u64) {
        let mut state = self.state.write();
        let Some(latest) = state.latest else {
            return;
        };
        if latest.reconciled || latest.total != count {
            return;
        }
        let Some(prior) = latest.prior_total else {
            return;
        };
        if prior + discovered > count {
            warn!(
                prior,
                current = count,
                discovered,
                "more new stargazers than the count grew by, scheduling reconciliation"
            );
            state.reconcile_pending = true;
        }
    }

    /// Stars gained today.
    ///
    /// Uses yesterday's recorded total when available, otherwise counts
    /// baseline entries starred after local midnight.
    pub fn counts_today(&self, total: u64) -> u64 {
        let now = Local::now();
        self.counts_today_on(total, now.date_naive(), beginning_of_day(&now))
    }

    pub(crate) fn counts_today_on(
        &self,
        total: u64,
        today: NaiveDate,
        day_start: DateTime<Utc>,
    ) -> u64 {
        let state = self.state.read();
        let yesterday = today.checked_sub_days(Days::new(1));
        if let Some(stars) = yesterday.and_then(|day| state.daily.get(&day)) {
            return total.saturating_sub(*stars);
        }

        state
            .baseline
            .values()
            .filter(|at| **at > day_start)
            .count() as u64
    }
}

/// Midnight of `now`'s calendar day in its own time zone.
pub fn beginning_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    now.timezone()
        .from_local_datetime(&now.date_naive().and_time(NaiveTime::MIN))
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use chrono::Duration;

    use super::*;
    use crate::source::mock::MockSource;

    fn repo() -> RepoId {
        RepoId::parse("octo/cat").unwrap()
    }

    fn t(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn engine(source: &Arc<MockSource>, page_size: u32, start: DateTime<Utc>) -> DiffEngine {
        let source: Arc<dyn crate::source::RepositorySource> = source.clone();
        DiffEngine::with_start_time(
            SnapshotFetcher::new(source.clone(), page_size),
            UserEnricher::new(source),
            start,
        )
    }

    #[tokio::test]
    async fn test_initialize_builds_baseline() {
        let source = Arc::new(MockSource::with_stargazers(&[("alice", t(1, 1)), ("bob", t(1, 2))]));
        let engine = engine(&source, 100, t(2, 0));

        assert_eq!(engine.initialize(&repo()).await.unwrap(), 2);
        assert!(engine.contains("alice"));
        assert_eq!(engine.starred_at("bob"), Some(t(1, 2)));
    }

    #[tokio::test]
    async fn test_initialize_records_starting_total() {
        let source = Arc::new(MockSource::with_stargazers(&[("alice", t(1, 1)), ("bob", t(1, 2))]));
        let engine = engine(&source, 100, t(2, 0));
        engine.initialize(&repo()).await.unwrap();

        assert_eq!(engine.day_total(Local::now().date_naive()), Some(2));
        assert!(!engine.reconcile_pending());
    }

    #[tokio::test]
    async fn test_unstar_before_first_refresh_is_detected() {
        let source = Arc::new(MockSource::with_stargazers(&[("alice", t(1, 1)), ("bob", t(1, 2))]));
        let engine = engine(&source, 100, t(2, 0));
        engine.initialize(&repo()).await.unwrap();

        source.unstar("bob");

        let refresh = engine.refresh_count_on(&repo(), day(3)).await.unwrap();
        let removed: Vec<&str> = refresh.removals().map(|d| d.record().id.as_str()).collect();
        assert_eq!(removed, vec!["bob"]);
        assert!(!engine.contains("bob"));
        assert_eq!(engine.baseline_len(), 1);
    }

    #[tokio::test]
    async fn test_count_below_listed_schedules_reconciliation() {
        // bob leaves between the page reads and the count read
        let source = Arc::new(MockSource::with_stargazers(&[("alice", t(1, 1)), ("bob", t(1, 2))]));
        source.set_count(Some(1));
        let engine = engine(&source, 100, t(2, 0));
        engine.initialize(&repo()).await.unwrap();
        assert!(engine.reconcile_pending());

        source.unstar("bob");
        source.set_count(None);

        let refresh = engine.refresh_count_on(&repo(), day(3)).await.unwrap();
        assert_eq!(refresh.total, 1);
        let removed: Vec<&str> = refresh.removals().map(|d| d.record().id.as_str()).collect();
        assert_eq!(removed, vec!["bob"]);
        assert!(!engine.reconcile_pending());
    }

    #[tokio::test]
    async fn test_initialize_fails_when_count_unavailable() {
        let source = Arc::new(MockSource::with_stargazers(&[("alice", t(1, 1))]));
        source.fail_counts(true);
        let engine = engine(&source, 100, t(2, 0));

        assert!(engine.initialize(&repo()).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_records_daily_total() {
        let source = Arc::new(MockSource::with_stargazers(&[("alice", t(1, 1))]));
        let engine = engine(&source, 100, t(2, 0));
        engine.initialize(&repo()).await.unwrap();

        let refresh = engine.refresh_count_on(&repo(), day(3)).await.unwrap();
        assert_eq!(refresh.total, 1);
        assert!(refresh.deltas.is_empty());
        assert_eq!(engine.day_total(day(3)), Some(1));
    }

    #[tokio::test]
    async fn test_shrink_triggers_reconciliation() {
        let stars: Vec<(String, DateTime<Utc>)> =
            (0..100).map(|i| (format!("user{i:03}"), t(1, 0) + Duration::minutes(i))).collect();
        let refs: Vec<(&str, DateTime<Utc>)> = stars.iter().map(|(id, at)| (id.as_str(), *at)).collect();
        let source = Arc::new(MockSource::with_stargazers(&refs));
        let engine = engine(&source, 30, t(2, 0));
        engine.initialize(&repo()).await.unwrap();
        engine.record_day_total(day(3), 100);

        source.unstar("user010");
        source.unstar("user050");
        source.unstar("user099");
        source.set_profile("user050", Some("Fifty"), Some(5));

        let calls_before = source.page_calls.load(Ordering::SeqCst);
        let refresh = engine.refresh_count_on(&repo(), day(3)).await.unwrap();
        assert_eq!(refresh.total, 97);
        assert!(source.page_calls.load(Ordering::SeqCst) > calls_before);

        let removed: Vec<&str> = refresh.removals().map(|d| d.record().id.as_str()).collect();
        assert_eq!(removed, vec!["user010", "user050", "user099"]);
        assert!(refresh.deltas.iter().all(|d| matches!(d, Delta::Unstar { .. })));
        assert_eq!(engine.baseline_len(), 97);
        assert!(!engine.contains("user050"));
        assert_eq!(engine.day_total(day(3)), Some(97));
    }

    #[tokio::test]
    async fn test_unstar_by_deleted_account() {
        let source = Arc::new(MockSource::with_stargazers(&[("alice", t(1, 1)), ("ghost", t(1, 2))]));
        let engine = engine(&source, 100, t(2, 0));
        engine.initialize(&repo()).await.unwrap();
        engine.record_day_total(day(3), 2);

        source.unstar("ghost");
        source.delete_user("ghost");

        let refresh = engine.refresh_count_on(&repo(), day(3)).await.unwrap();
        assert_eq!(
            refresh.deltas,
            vec![Delta::AccountDeleted {
                record: StargazerRecord::new("ghost", t(1, 2))
            }]
        );
    }

    #[tokio::test]
    async fn test_unstar_lookup_failure_is_skipped() {
        let source = Arc::new(MockSource::with_stargazers(&[
            ("alice", t(1, 1)),
            ("bob", t(1, 2)),
            ("carol", t(1, 3)),
        ]));
        let engine = engine(&source, 100, t(2, 0));
        engine.initialize(&repo()).await.unwrap();
        engine.record_day_total(day(3), 3);

        source.unstar("bob");
        source.unstar("carol");
        source.make_flaky("bob", 1);

        let refresh = engine.refresh_count_on(&repo(), day(3)).await.unwrap();
        let removed: Vec<&str> = refresh.removals().map(|d| d.record().id.as_str()).collect();
        assert_eq!(removed, vec!["carol"]);
        // bob is still gone from the baseline even though the lookup failed
        assert!(!engine.contains("bob"));
        assert_eq!(engine.baseline_len(), 1);
    }

    #[tokio::test]
    async fn test_failed_reconciliation_leaves_state_untouched() {
        let source = Arc::new(MockSource::with_stargazers(&[("alice", t(1, 1)), ("bob", t(1, 2))]));
        let engine = engine(&source, 100, t(2, 0));
        engine.initialize(&repo()).await.unwrap();
        engine.record_day_total(day(3), 2);

        source.unstar("bob");
        source.fail_pages(true);

        assert!(engine.refresh_count_on(&repo(), day(3)).await.is_err());
        assert!(engine.contains("bob"));
        assert_eq!(engine.day_total(day(3)), Some(2));
    }

    #[tokio::test]
    async fn test_reconciliation_reports_concurrent_new_star() {
        let source = Arc::new(MockSource::with_stargazers(&[("alice", t(1, 1)), ("bob", t(1, 2))]));
        let engine = engine(&source, 100, t(2, 0));
        engine.initialize(&repo()).await.unwrap();
        engine.record_day_total(day(3), 5);

        source.unstar("bob");
        source.star("dave", t(3, 9));

        let refresh = engine.refresh_count_on(&repo(), day(3)).await.unwrap();
        assert_eq!(refresh.removals().count(), 1);
        let new: Vec<&str> = refresh.new_stars().map(|r| r.id.as_str()).collect();
        assert_eq!(new, vec!["dave"]);
        assert!(engine.contains("dave"));
    }

    #[tokio::test]
    async fn test_find_new_stars_walks_backward_within_today() {
        // three pages of history, then today's stars spill over two pages
        let stars: Vec<(String, DateTime<Utc>)> =
            (0..6).map(|i| (format!("old{i}"), t(1, i))).collect();
        let refs: Vec<(&str, DateTime<Utc>)> = stars.iter().map(|(id, at)| (id.as_str(), *at)).collect();
        let source = Arc::new(MockSource::with_stargazers(&refs));
        let engine = engine(&source, 2, t(2, 0));
        engine.initialize(&repo()).await.unwrap();

        for (id, hour) in [("n1", 8), ("n2", 9), ("n3", 10)] {
            source.star(id, t(3, hour));
        }
        // pages: [old0 old1] [old2 old3] [old4 old5] [n1 n2] [n3]
        let calls_before = source.page_calls.load(Ordering::SeqCst);
        let found = engine
            .find_new_stars_since(&repo(), 9, t(3, 0))
            .await
            .unwrap();

        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["n3", "n1", "n2"]);
        // page 5, page 4 (starts today), page 3 (starts yesterday) then stop
        assert_eq!(source.page_calls.load(Ordering::SeqCst) - calls_before, 3);
        assert_eq!(engine.baseline_len(), 9);
    }

    #[tokio::test]
    async fn test_pre_existing_star_is_recorded_but_not_reported() {
        let start = t(3, 12);
        let source = Arc::new(MockSource::new());
        let engine = engine(&source, 100, start);
        engine.initialize(&repo()).await.unwrap();

        source.star("alice", start);
        source.star("bob", start + Duration::seconds(1));

        let found = engine.find_new_stars_since(&repo(), 2, t(3, 0)).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["bob"]);
        assert!(engine.contains("alice"));
        assert!(engine.contains("bob"));
    }

    #[tokio::test]
    async fn test_find_new_stars_is_idempotent() {
        let source = Arc::new(MockSource::with_stargazers(&[("bob", t(1, 1))]));
        let engine = engine(&source, 100, t(2, 0));
        engine.initialize(&repo()).await.unwrap();
        source.star("carol", t(3, 8));

        let first = engine.find_new_stars_since(&repo(), 2, t(3, 0)).await.unwrap();
        let second = engine.find_new_stars_since(&repo(), 2, t(3, 0)).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_restar_after_unstar_is_new_again() {
        let source = Arc::new(MockSource::with_stargazers(&[("alice", t(1, 1)), ("bob", t(1, 2))]));
        let engine = engine(&source, 100, t(2, 0));
        engine.initialize(&repo()).await.unwrap();
        engine.record_day_total(day(3), 2);

        source.unstar("bob");
        engine.refresh_count_on(&repo(), day(3)).await.unwrap();
        assert!(!engine.contains("bob"));

        source.star("bob", t(3, 15));
        let refresh = engine.refresh_count_on(&repo(), day(3)).await.unwrap();
        let found = engine
            .find_new_stars_since(&repo(), refresh.total, t(3, 0))
            .await
            .unwrap();
        assert_eq!(found, vec![StargazerRecord::new("bob", t(3, 15))]);
    }

    #[tokio::test]
    async fn test_page_limit_bounds_backward_walk() {
        let source = Arc::new(MockSource::new());
        let engine = engine(&source, 1, t(2, 0)).with_max_backward_pages(3);
        engine.initialize(&repo()).await.unwrap();
        for i in 0..10 {
            source.star(&format!("u{i}"), t(3, i + 1));
        }

        let found = engine.find_new_stars_since(&repo(), 10, t(3, 0)).await.unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(source.page_calls.load(Ordering::SeqCst), 1 + 3);
    }

    #[tokio::test]
    async fn test_empty_estimated_page_steps_back() {
        let source = Arc::new(MockSource::with_stargazers(&[("a", t(1, 1))]));
        let engine = engine(&source, 1, t(2, 0));
        engine.initialize(&repo()).await.unwrap();
        source.star("b", t(3, 4));

        // count claims three stars but only two are listed
        let found = engine.find_new_stars_since(&repo(), 3, t(3, 0)).await.unwrap();
        assert_eq!(found, vec![StargazerRecord::new("b", t(3, 4))]);
    }

    #[tokio::test]
    async fn test_hidden_unstar_schedules_reconciliation() {
        let source = Arc::new(MockSource::with_stargazers(&[("alice", t(1, 1)), ("bob", t(1, 2))]));
        let engine = engine(&source, 100, t(2, 0));
        engine.initialize(&repo()).await.unwrap();

        engine.refresh_count_on(&repo(), day(3)).await.unwrap();

        // bob leaves and carol arrives: the total does not move
        source.unstar("bob");
        source.star("carol", Utc::now() - Duration::seconds(5));

        let refresh = engine.refresh_count_on(&repo(), day(3)).await.unwrap();
        assert_eq!(refresh.total, 2);
        assert!(refresh.deltas.is_empty());
        engine
            .find_new_stars_since(&repo(), refresh.total, t(3, 0))
            .await
            .unwrap();
        assert!(engine.reconcile_pending());

        let refresh = engine.refresh_count_on(&repo(), day(3)).await.unwrap();
        let removed: Vec<&str> = refresh.removals().map(|d| d.record().id.as_str()).collect();
        assert_eq!(removed, vec!["bob"]);
        assert!(!engine.reconcile_pending());
        assert!(!engine.contains("bob"));
    }

    #[tokio::test]
    async fn test_counts_today_prefers_yesterday_total() {
        let source = Arc::new(MockSource::with_stargazers(&[("alice", t(2, 23)), ("bob", t(3, 1))]));
        let engine = engine(&source, 100, t(2, 0));
        engine.initialize(&repo()).await.unwrap();

        // no anchor yet: scan the baseline
        assert_eq!(engine.counts_today_on(2, day(3), t(3, 0)), 1);

        engine.record_day_total(day(2), 1);
        assert_eq!(engine.counts_today_on(5, day(3), t(3, 0)), 4);
        assert_eq!(engine.counts_today_on(5, day(3), t(3, 0)), 4);
        // a total below yesterday's never underflows
        assert_eq!(engine.counts_today_on(0, day(3), t(3, 0)), 0);
    }

    #[test]
    fn test_beginning_of_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 3, 17, 45, 12).unwrap();
        assert_eq!(beginning_of_day(&now), t(3, 0));

        let offset = chrono::FixedOffset::east_opt(8 * 3600).unwrap();
        let local = now.with_timezone(&offset); // 2026-03-04 01:45 +08:00
        assert_eq!(
            beginning_of_day(&local),
            Utc.with_ymd_and_hms(2026, 3, 3, 16, 0, 0).unwrap()
        );
    }
}
