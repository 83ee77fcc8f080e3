//! # Search State
//!
//! Worker lifecycle states, per-search counters and the slot table the
//! coordinator keeps. Only the coordinator task writes any of this.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one search run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchId(pub Uuid);

impl SearchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SearchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of one page worker: `Working` until it settles in a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageWorkerState {
    Working,
    /// The page lists nothing; the source has no more data.
    NoResults,
    Finished,
    Error,
}

impl PageWorkerState {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Working)
    }
}

impl fmt::Display for PageWorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Working => "working",
            Self::NoResults => "no results",
            Self::Finished => "finished",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// One concurrency unit of the pool, bound to one page at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSlot {
    pub page_number: u32,
    pub state: PageWorkerState,
}

/// Running totals for a search
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Listing fragments processed, including rejected and skipped ones
    pub fragments_considered: u64,

    /// Listings that passed every check
    pub valid_results: u32,

    pub pages_dispatched: u32,
    pub pages_finished: u32,
    pub pages_empty: u32,
    pub pages_failed: u32,

    /// Pages abandoned part-way because the search was halted
    pub pages_abandoned: u32,
}

/// `round(100 * valid / target)`, capped at 100. A zero target counts as done.
pub fn percent_complete(valid: u32, target: u32) -> u8 {
    if target == 0 {
        return 100;
    }
    let valid = u64::from(valid);
    let target = u64::from(target);
    let rounded = (valid * 200 + target) / (2 * target);
    u8::try_from(rounded.min(100)).unwrap_or(100)
}
