//! Stargazer monitoring.
//!
//! This module contains the change-detection core:
//! - Snapshot fetching and user enrichment
//! - The diff engine holding the baseline and daily counters
//! - The retry-once dispatcher for new-star notifications
//! - The StarMonitor service driving ticks

mod diff;
mod dispatcher;
mod enricher;
mod events;
mod fetcher;
mod service;

pub use diff::{DEFAULT_MAX_BACKWARD_PAGES, DiffEngine, beginning_of_day};
pub use dispatcher::RetryDispatcher;
pub use enricher::UserEnricher;
pub use events::{CountRefresh, Delta};
pub use fetcher::{DEFAULT_PAGE_SIZE, Snapshot, SnapshotFetcher};
pub use service::{MonitorConfig, StarMonitor, TickReport};
