//! Page workers
//!
//! A page worker owns one search results page: it fetches the page, splits
//! it into listing fragments and reports one `Outcome` per fragment before
//! settling in a terminal state.

pub mod page_worker;

pub use page_worker::PageWorker;

use std::time::Duration;

use thiserror::Error;

use super::state::PageWorkerState;
use crate::domain::Outcome;
use crate::infrastructure::config::{SearchConfig, defaults};
use crate::infrastructure::{FetchError, ParsingError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkerError {
    #[error("Invalid page number {0}: pages start at 1")]
    InvalidPageNumber(u32),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Parsing(#[from] ParsingError),
}

/// Per-worker knobs shared by every page of a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Upper bound for each individual fetch
    pub fetch_timeout: Duration,
    pub fetch_thumbnails: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(defaults::FETCH_TIMEOUT_SECONDS),
            fetch_thumbnails: defaults::FETCH_THUMBNAILS,
        }
    }
}

impl From<&SearchConfig> for WorkerSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            fetch_timeout: config.fetch_timeout(),
            fetch_thumbnails: config.fetch_thumbnails,
        }
    }
}

/// Messages from workers to the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Outcome { page_number: u32, outcome: Outcome },
    Completed(PageReport),
}

/// Final word from a worker about its page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    pub page_number: u32,
    pub state: PageWorkerState,
    pub result_count: usize,
    pub fragments_processed: usize,
    /// The worker stopped early because the search was halted.
    pub cancelled: bool,
    pub error: Option<String>,
}

impl PageReport {
    pub const fn new(page_number: u32) -> Self {
        Self {
            page_number,
            state: PageWorkerState::Working,
            result_count: 0,
            fragments_processed: 0,
            cancelled: false,
            error: None,
        }
    }

    pub fn failed(page_number: u32, error: impl Into<String>) -> Self {
        Self {
            state: PageWorkerState::Error,
            error: Some(error.into()),
            ..Self::new(page_number)
        }
    }
}
