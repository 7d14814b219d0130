//! Change events produced by the diff engine.

use serde::{Deserialize, Serialize};

use crate::domain::{StargazerRecord, UserProfile};

/// A classified change between two observations of the stargazer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delta {
    /// A stargazer not present in the baseline.
    NewStar { record: StargazerRecord },
    /// A stargazer that left; `record` holds the last known star time.
    Unstar {
        record: StargazerRecord,
        profile: UserProfile,
    },
    /// A stargazer that left because the account no longer exists.
    AccountDeleted { record: StargazerRecord },
}

impl Delta {
    pub fn record(&self) -> &StargazerRecord {
        match self {
            Delta::NewStar { record }
            | Delta::Unstar { record, .. }
            | Delta::AccountDeleted { record } => record,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Delta::NewStar { .. } => "new_star",
            Delta::Unstar { .. } => "unstar",
            Delta::AccountDeleted { .. } => "account_deleted",
        }
    }

    pub fn is_removal(&self) -> bool {
        !matches!(self, Delta::NewStar { .. })
    }
}

/// Result of a count refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountRefresh {
    /// Star count reported by the repository metadata.
    pub total: u64,
    /// Changes found by a full reconciliation, if one ran.
    pub deltas: Vec<Delta>,
}

impl CountRefresh {
    pub fn removals(&self) -> impl Iterator<Item = &Delta> {
        self.deltas.iter().filter(|d| d.is_removal())
    }

    pub fn new_stars(&self) -> impl Iterator<Item = &StargazerRecord> {
        self.deltas.iter().filter_map(|d| match d {
            Delta::NewStar { record } => Some(record),
            _ => None,
        })
    }
}
