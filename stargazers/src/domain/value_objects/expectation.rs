//! Star-count goal value object.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Accepted date layouts for the goal deadline.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y %m-%d"];

/// A target star count to reach by a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    pub date: NaiveDate,
    pub stars: u64,
}

impl Expectation {
    pub fn new(date: NaiveDate, stars: u64) -> Self {
        Self { date, stars }
    }

    /// Build from the raw configuration values.
    pub fn parse(date: &str, stars: u64) -> Result<Self, Error> {
        let date = DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(date.trim(), fmt).ok())
            .ok_or_else(|| Error::validation(format!("unparsable expectation date {date:?}")))?;
        Ok(Self { date, stars })
    }

    /// Days left until the deadline, today included. `None` once it has passed.
    pub fn days_remaining(&self, today: NaiveDate) -> Option<u64> {
        let days = (self.date - today).num_days();
        (days >= 0).then(|| days as u64 + 1)
    }

    /// Stars per day still needed to reach the goal, rounded up.
    ///
    /// `None` when the goal is already reached or the deadline has passed.
    pub fn needed_per_day(&self, current: u64, today: NaiveDate) -> Option<u64> {
        if current >= self.stars {
            return None;
        }
        let days = self.days_remaining(today)?;
        Some((self.stars - current).div_ceil(days))
    }
}
