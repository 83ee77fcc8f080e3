//! # Page Worker
//!
//! Processes one search results page. Fragments are handled in page order
//! and each produces exactly one `Outcome`. The cheap checks run first so
//! the expensive lookups (review histogram, product page, thumbnail) only
//! happen for listings that can still pass.
//!
//! Cancellation is cooperative: it is observed after the page fetch and
//! before each fragment. A fetch already in flight runs to completion or
//! to its timeout.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use super::{PageEvent, PageReport, WorkerError, WorkerSettings};
use crate::crawling::source::PageSource;
use crate::crawling::state::PageWorkerState;
use crate::domain::{Outcome, ProductRecord, SearchCriteria, validation};
use crate::infrastructure::parsing::product_fields::strict_prime_marker;
use crate::infrastructure::parsing::{
    HistogramFields, ListingFields, ParsingError, ParsingResult, result_count, split_fragments,
};
use crate::infrastructure::FetchError;

pub struct PageWorker {
    page_number: u32,
    criteria: Arc<SearchCriteria>,
    source: Arc<dyn PageSource>,
    settings: WorkerSettings,
    cancellation_token: CancellationToken,
    state: PageWorkerState,
}

impl PageWorker {
    pub fn new(
        page_number: u32,
        criteria: Arc<SearchCriteria>,
        source: Arc<dyn PageSource>,
        settings: WorkerSettings,
        cancellation_token: CancellationToken,
    ) -> Result<Self, WorkerError> {
        if page_number == 0 {
            return Err(WorkerError::InvalidPageNumber(page_number));
        }
        Ok(Self {
            page_number,
            criteria,
            source,
            settings,
            cancellation_token,
            state: PageWorkerState::Working,
        })
    }

    pub const fn page_number(&self) -> u32 {
        self.page_number
    }

    pub const fn state(&self) -> PageWorkerState {
        self.state
    }

    /// Runs the page to a terminal state, sending one `PageEvent::Outcome`
    /// per processed fragment. The caller reports the returned `PageReport`.
    pub async fn run(self, events: mpsc::Sender<PageEvent>) -> PageReport {
        let span = info_span!("page_worker", page = self.page_number);
        self.process_page(events).instrument(span).await
    }

    async fn process_page(mut self, events: mpsc::Sender<PageEvent>) -> PageReport {
        let mut report = PageReport::new(self.page_number);

        if self.cancellation_token.is_cancelled() {
            debug!("Cancelled before fetching");
            return self.finish(report.cancelled());
        }

        let fetch = self
            .source
            .fetch_page(self.page_number, self.criteria.search_text());
        let html = match self.with_timeout(fetch).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Failed to fetch page {}: {}", self.page_number, e);
                return self.fail(report, e);
            }
        };

        if self.cancellation_token.is_cancelled() {
            return self.finish(report.cancelled());
        }

        let count = result_count(&html);
        if count == 0 {
            debug!("Page {} has no results", self.page_number);
            self.state = PageWorkerState::NoResults;
            return self.finish(report);
        }
        report.result_count = count;

        let fragments = match split_fragments(&html, count) {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!("Page {} is malformed: {}", self.page_number, e);
                return self.fail(report, e.into());
            }
        };

        for fragment in fragments {
            if self.cancellation_token.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let outcome = match self.process_fragment(fragment).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        "Page {} stopped at fragment {}: {}",
                        self.page_number, report.fragments_processed, e
                    );
                    return self.fail(report, e.into());
                }
            };
            report.fragments_processed += 1;

            let event = PageEvent::Outcome {
                page_number: self.page_number,
                outcome,
            };
            if events.send(event).await.is_err() {
                debug!("Coordinator stopped listening");
                report.cancelled = true;
                break;
            }
        }

        self.state = PageWorkerState::Finished;
        self.finish(report)
    }

    fn fail(&mut self, mut report: PageReport, error: WorkerError) -> PageReport {
        self.state = PageWorkerState::Error;
        report.error = Some(error.to_string());
        self.finish(report)
    }

    fn finish(&self, mut report: PageReport) -> PageReport {
        report.state = if report.cancelled && self.state == PageWorkerState::Working {
            PageWorkerState::Finished
        } else {
            self.state
        };
        debug!(
            "Page {} {} ({}/{} fragments)",
            self.page_number, report.state, report.fragments_processed, report.result_count
        );
        report
    }

    /// Runs one listing through extraction and the criteria. Listing-level
    /// failures become `Outcome::failed`; only errors that are not
    /// recoverable come back as `Err` and end the page.
    async fn process_fragment(&self, fragment: &str) -> ParsingResult<Outcome> {
        let listing = ListingFields::extract(fragment, self.source.base_url());

        let Some(name) = listing.name.as_deref() else {
            return Ok(Outcome::skipped());
        };
        if let Err(rejection) = validation::check_name(&self.criteria, Some(name)) {
            return Ok(Outcome::rejected(rejection.to_string()));
        }

        let Some(product_id) = listing.product_id.as_deref() else {
            return listing_failure(name, ParsingError::required_field_missing("product id"));
        };

        let histogram = match self
            .with_timeout(self.source.fetch_review_histogram(product_id))
            .await
        {
            Ok(payload) => HistogramFields::extract(&payload),
            Err(e) => {
                return listing_failure(name, ParsingError::histogram_unavailable(product_id, e));
            }
        };

        if let Err(rejection) =
            validation::check_review_count(&self.criteria, name, histogram.review_count)
        {
            return Ok(Outcome::rejected(rejection.to_string()));
        }

        let price = match listing.price {
            Ok(price) => price,
            Err(e) => return listing_failure(name, e),
        };
        if let Err(rejection) = validation::check_price(&self.criteria, name, &price) {
            return Ok(Outcome::rejected(rejection.to_string()));
        }

        if let Err(rejection) = validation::check_distribution(
            &self.criteria,
            name,
            histogram.score_distribution.as_ref(),
        ) {
            return Ok(Outcome::rejected(rejection.to_string()));
        }

        let prime_eligible = if self.criteria.strict_prime_eligibility() {
            match &listing.url {
                Some(url) => match self.with_timeout(self.source.fetch_text(url)).await {
                    Ok(page) => strict_prime_marker(&page),
                    Err(e) => {
                        let error = ParsingError::eligibility_unavailable(url.as_str(), e);
                        return listing_failure(name, error);
                    }
                },
                None => false,
            }
        } else {
            listing.fuzzy_prime_eligible
        };

        let thumbnail = match &listing.thumbnail_url {
            Some(url) if self.settings.fetch_thumbnails => {
                match self.with_timeout(self.source.fetch_bytes(url)).await {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        debug!("No thumbnail for {}: {}", name, e);
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(Outcome::accepted(ProductRecord {
            name: name.to_string(),
            review_count: histogram.review_count,
            price,
            score_distribution: histogram.score_distribution,
            url: listing.url,
            rating: histogram.rating,
            prime_eligible,
            thumbnail_url: listing.thumbnail_url,
            thumbnail,
        }))
    }

    async fn with_timeout<T>(
        &self,
        fetch: impl Future<Output = Result<T, FetchError>>,
    ) -> Result<T, WorkerError> {
        match tokio::time::timeout(self.settings.fetch_timeout, fetch).await {
            Ok(result) => result.map_err(WorkerError::from),
            Err(_) => Err(WorkerError::Timeout(self.settings.fetch_timeout)),
        }
    }
}

fn listing_failure(name: &str, error: ParsingError) -> ParsingResult<Outcome> {
    if error.is_recoverable() {
        Ok(Outcome::failed(format!("{name}: {error}")))
    } else {
        Err(error)
    }
}

impl PageReport {
    fn cancelled(mut self) -> Self {
        self.cancelled = true;
        self
    }
}
