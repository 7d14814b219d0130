//! Plain-text rendering of stargazer changes.

use std::fmt::Write;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

use crate::domain::{Expectation, UserProfile};

const STAR_TIME_FORMAT: &str = "%m-%d %H:%M:%S";
const UNSTAR_TIME_FORMAT: &str = "%Y %m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    NewStar,
    Unstar,
    AccountDeleted,
}

impl NotificationKind {
    fn header(self) -> Option<&'static str> {
        match self {
            NotificationKind::NewStar => None,
            NotificationKind::Unstar => Some("unstar"),
            NotificationKind::AccountDeleted => Some("account deleted"),
        }
    }
}

/// Star count of a sibling repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub project: String,
    pub stars: u64,
}

/// Everything a notification message shows.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub total: u64,
    pub today: u64,
    pub user: String,
    pub profile: UserProfile,
    pub starred_at: DateTime<Utc>,
    pub comparisons: Vec<Comparison>,
    pub expectation: Option<Expectation>,
}

impl Notification {
    pub fn new(kind: NotificationKind, user: impl Into<String>, starred_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            total: 0,
            today: 0,
            user: user.into(),
            profile: UserProfile::default(),
            starred_at,
            comparisons: Vec::new(),
            expectation: None,
        }
    }

    pub fn with_counts(mut self, total: u64, today: u64) -> Self {
        self.total = total;
        self.today = today;
        self
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_comparisons(mut self, comparisons: Vec<Comparison>) -> Self {
        self.comparisons = comparisons;
        self
    }

    pub fn with_expectation(mut self, expectation: Option<Expectation>) -> Self {
        self.expectation = expectation;
        self
    }

    /// Render in the local time zone.
    pub fn render(&self) -> String {
        self.render_in(&Local)
    }

    /// Render with timestamps and "today" taken in `tz`.
    pub fn render_in<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let today = Utc::now().with_timezone(tz).date_naive();
        self.render_on(tz, today)
    }

    pub(crate) fn render_on<Tz>(&self, tz: &Tz, today: NaiveDate) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let mut out = String::new();
        if let Some(header) = self.kind.header() {
            let _ = writeln!(out, "{header}");
        }
        let _ = writeln!(out, "stars: {}", self.total);
        let _ = writeln!(out, "today: {}", self.today);
        let _ = writeln!(out, "user: {}", self.user);
        if let Some(name) = self.profile.name.as_deref().filter(|n| !n.is_empty()) {
            let _ = writeln!(out, "name: {name}");
        }
        if let Some(followers) = self.profile.followers.filter(|f| *f > 0) {
            let _ = writeln!(out, "followers: {followers}");
        }

        let at = self.starred_at.with_timezone(tz);
        match self.kind {
            NotificationKind::NewStar => {
                let _ = write!(out, "time: {}", at.format(STAR_TIME_FORMAT));
            }
            NotificationKind::Unstar | NotificationKind::AccountDeleted => {
                let _ = write!(out, "starAt: {}", at.format(UNSTAR_TIME_FORMAT));
            }
        }

        for comparison in &self.comparisons {
            let diff = self.total as i64 - comparison.stars as i64;
            let _ = write!(out, "\n{}: {}/{}", comparison.project, diff, comparison.stars);
        }

        if let Some(expectation) = &self.expectation {
            if let Some(per_day) = expectation.needed_per_day(self.total, today) {
                let days = expectation.days_remaining(today).unwrap_or(0);
                let _ = write!(out, "\nexpect: {per_day}/day, {days} days left");
            }
        }

        out
    }
}
