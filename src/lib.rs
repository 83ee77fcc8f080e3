//! Amazon Scrape - concurrent product search scraper
//!
//! Fetches paginated search results, extracts typed product records from the
//! raw listing HTML, filters them against user criteria and streams the
//! passing records to a consumer while the search is still running.

// Module declarations
pub mod crawling;
pub mod domain;
pub mod infrastructure;
pub mod test_utils;

// Re-export the types most callers need
pub use crawling::{
    CoordinatorConfig, PageSource, SearchCoordinator, SearchError, SearchEvent, SearchHandle,
    SearchSummary, SearchTermination,
};
pub use domain::{NumericRange, Outcome, ProductRecord, ScoreDistribution, SearchCriteria};
