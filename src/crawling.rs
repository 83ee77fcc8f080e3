//! # Search crawling
//!
//! - `source`: where result pages and histograms come from
//! - `workers`: one page worker per result page
//! - `orchestrator`: the coordinator keeping a fixed pool of workers busy
//! - `events`: what the coordinator reports while it runs

use thiserror::Error;

pub mod events;
pub mod orchestrator;
pub mod source;
pub mod state;
pub mod workers;

pub use events::{
    ChannelEventSink, CollectingEventSink, LoggingEventSink, SearchEvent, SearchEventSink,
    SearchSummary, SearchTermination,
};
pub use orchestrator::{CoordinatorConfig, SearchCoordinator, SearchHandle};
pub use source::{HttpPageSource, PageSource};
pub use state::{PageWorkerState, SearchId, SearchStats};
pub use workers::{PageEvent, PageReport, PageWorker, WorkerError, WorkerSettings};

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Concurrency must be at least {minimum}, got {requested}")]
    InvalidConcurrency { requested: usize, minimum: usize },

    #[error("Invalid search configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Search task failed: {0}")]
    TaskFailed(String),
}
