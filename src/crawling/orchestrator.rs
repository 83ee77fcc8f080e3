//! # Search Coordinator
//!
//! Runs a bounded pool of page workers against consecutive result pages
//! until enough valid products were found, the source runs dry, or the
//! caller cancels.
//!
//! The coordinator task is the only writer of the page counter, the valid
//! result count and the slot table. Workers talk to it exclusively through
//! an mpsc channel, so no lock guards any of that state.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use super::SearchError;
use super::events::{ChannelEventSink, SearchEvent, SearchEventSink, SearchSummary, SearchTermination};
use super::source::PageSource;
use super::state::{PageWorkerState, SearchId, SearchStats, WorkerSlot, percent_complete};
use super::workers::{PageEvent, PageReport, PageWorker, WorkerSettings};
use crate::domain::{Outcome, SearchCriteria};
use crate::infrastructure::config::{SearchConfig, defaults};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Pool settings for one search
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Number of page workers kept busy (at least 2)
    pub concurrency: usize,

    pub worker: WorkerSettings,

    /// Failed pages in a row before the search stops dispatching
    pub max_consecutive_errors: u32,

    /// Highest page number that will be requested
    pub max_page: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            concurrency: defaults::CONCURRENCY,
            worker: WorkerSettings::default(),
            max_consecutive_errors: defaults::MAX_CONSECUTIVE_ERRORS,
            max_page: defaults::MAX_PAGE,
        }
    }
}

impl From<&SearchConfig> for CoordinatorConfig {
    fn from(config: &SearchConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            worker: WorkerSettings::from(config),
            max_consecutive_errors: config.max_consecutive_errors,
            max_page: config.max_page,
        }
    }
}

pub struct SearchCoordinator {
    search_id: SearchId,
    criteria: Arc<SearchCriteria>,
    source: Arc<dyn PageSource>,
    config: CoordinatorConfig,
    cancellation_token: CancellationToken,
}

impl SearchCoordinator {
    pub fn new(
        criteria: SearchCriteria,
        source: Arc<dyn PageSource>,
        config: CoordinatorConfig,
    ) -> Result<Self, SearchError> {
        if config.concurrency < defaults::MIN_CONCURRENCY {
            return Err(SearchError::InvalidConcurrency {
                requested: config.concurrency,
                minimum: defaults::MIN_CONCURRENCY,
            });
        }
        if config.max_page == 0 {
            return Err(SearchError::InvalidConfiguration(
                "max_page must be at least 1".into(),
            ));
        }

        Ok(Self {
            search_id: SearchId::new(),
            criteria: Arc::new(criteria),
            source,
            config,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Ties the search to an external token; cancelling it halts the search.
    #[must_use]
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub const fn search_id(&self) -> SearchId {
        self.search_id
    }

    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Runs the search to completion, reporting every event to `sink`.
    ///
    /// The returned summary is also emitted as the final `Finished` event.
    pub async fn run<S>(self, sink: &S) -> SearchSummary
    where
        S: SearchEventSink + ?Sized,
    {
        let span = info_span!("search", search_id = %self.search_id);
        SearchRun::new(self, sink).execute().instrument(span).await
    }

    /// Starts the search on its own task and hands back a handle for
    /// streaming events, cancelling and awaiting the summary.
    pub fn spawn(self) -> SearchHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        let search_id = self.search_id;
        let cancellation_token = self.cancellation_token.clone();

        let task = tokio::spawn(async move {
            let sink = ChannelEventSink::new(sender);
            self.run(&sink).await
        });

        SearchHandle {
            search_id,
            events: UnboundedReceiverStream::new(receiver),
            cancellation_token,
            task,
        }
    }
}

/// Handle to a search running on its own task
pub struct SearchHandle {
    search_id: SearchId,
    events: UnboundedReceiverStream<SearchEvent>,
    cancellation_token: CancellationToken,
    task: JoinHandle<SearchSummary>,
}

impl SearchHandle {
    pub const fn search_id(&self) -> SearchId {
        self.search_id
    }

    /// Requests cancellation. Pages already being processed stop at their
    /// next fragment boundary; no new page is dispatched.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Next event; `None` once the search finished and all events were read.
    pub async fn next_event(&mut self) -> Option<SearchEvent> {
        self.events.next().await
    }

    pub fn events(&mut self) -> &mut UnboundedReceiverStream<SearchEvent> {
        &mut self.events
    }

    pub async fn wait(self) -> Result<SearchSummary, SearchError> {
        self.task
            .await
            .map_err(|e| SearchError::TaskFailed(e.to_string()))
    }
}

/// Mutable state of one search run. Lives entirely on the coordinator task.
struct SearchRun<'s, S: ?Sized> {
    coordinator: SearchCoordinator,
    sink: &'s S,
    started_at: chrono::DateTime<Utc>,
    slots: Vec<WorkerSlot>,
    next_page: u32,
    source_exhausted: bool,
    consecutive_errors: u32,
    stats: SearchStats,
    halt_token: CancellationToken,
    events_tx: Option<mpsc::Sender<PageEvent>>,
    workers: JoinSet<()>,
    termination: Option<SearchTermination>,
}

impl<'s, S> SearchRun<'s, S>
where
    S: SearchEventSink + ?Sized,
{
    fn new(coordinator: SearchCoordinator, sink: &'s S) -> Self {
        let halt_token = coordinator.cancellation_token.child_token();
        let slots = Vec::with_capacity(coordinator.config.concurrency);
        Self {
            coordinator,
            sink,
            started_at: Utc::now(),
            slots,
            next_page: 1,
            source_exhausted: false,
            consecutive_errors: 0,
            stats: SearchStats::default(),
            halt_token,
            events_tx: None,
            workers: JoinSet::new(),
            termination: None,
        }
    }

    fn target(&self) -> u32 {
        self.coordinator.criteria.target_result_count()
    }

    async fn execute(mut self) -> SearchSummary {
        info!(
            "Searching for '{}' ({} workers, target {})",
            self.coordinator.criteria.search_text(),
            self.coordinator.config.concurrency,
            self.target()
        );

        let (events_tx, mut events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.events_tx = Some(events_tx);

        if self.coordinator.cancellation_token.is_cancelled() {
            self.halt(SearchTermination::Cancelled);
        } else if self.target() == 0 {
            self.halt(SearchTermination::TargetReached);
        } else {
            for _ in 0..self.coordinator.config.concurrency {
                if self.next_page > self.coordinator.config.max_page {
                    break;
                }
                self.slots.push(WorkerSlot {
                    page_number: self.next_page,
                    state: PageWorkerState::Working,
                });
                let slot = self.slots.len() - 1;
                self.dispatch(slot);
            }
        }

        let cancellation_token = self.coordinator.cancellation_token.clone();
        while self.termination.is_none() {
            tokio::select! {
                biased;

                () = cancellation_token.cancelled() => {
                    info!("Search cancelled");
                    self.halt(SearchTermination::Cancelled);
                }
                message = events_rx.recv() => match message {
                    Some(PageEvent::Outcome { page_number, outcome }) => {
                        self.on_outcome(page_number, outcome).await;
                    }
                    Some(PageEvent::Completed(report)) => {
                        self.on_page_completed(report).await;
                    }
                    // The coordinator holds a sender until it halts.
                    None => self.halt(SearchTermination::SourceExhausted),
                },
            }
        }

        self.shutdown(&mut events_rx).await;
        let summary = self.summary();
        if summary.termination == SearchTermination::SourceExhausted
            && summary.percent_complete < 100
        {
            warn!(
                "Source exhausted after {} of {} requested results",
                summary.stats.valid_results,
                self.target()
            );
        }
        info!(
            "Search finished: {} ({} valid, {} considered, {} pages)",
            summary.termination,
            summary.stats.valid_results,
            summary.stats.fragments_considered,
            summary.stats.pages_dispatched
        );
        self.sink.emit(SearchEvent::Finished(summary.clone())).await;
        summary
    }

    /// Starts a worker for the next page in `slot`.
    fn dispatch(&mut self, slot: usize) {
        let Some(events_tx) = self.events_tx.clone() else {
            return;
        };
        let page_number = self.next_page;
        let worker = match PageWorker::new(
            page_number,
            Arc::clone(&self.coordinator.criteria),
            Arc::clone(&self.coordinator.source),
            self.coordinator.config.worker.clone(),
            self.halt_token.child_token(),
        ) {
            Ok(worker) => worker,
            Err(e) => {
                warn!("Could not start worker for page {}: {}", page_number, e);
                self.slots[slot].state = PageWorkerState::Error;
                self.source_exhausted = true;
                return;
            }
        };

        self.next_page += 1;
        self.slots[slot] = WorkerSlot {
            page_number,
            state: PageWorkerState::Working,
        };
        self.stats.pages_dispatched += 1;
        debug!("Dispatching page {} to slot {}", page_number, slot);

        self.workers.spawn(async move {
            let report = AssertUnwindSafe(worker.run(events_tx.clone()))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| PageReport::failed(page_number, "page worker panicked"));
            // Only fails once the coordinator has stopped listening.
            let _ = events_tx.send(PageEvent::Completed(report)).await;
        });
    }

    async fn on_outcome(&mut self, page_number: u32, outcome: Outcome) {
        self.stats.fragments_considered += 1;
        if outcome.is_accepted() {
            self.stats.valid_results += 1;
        }

        self.sink
            .emit(SearchEvent::Outcome {
                page_number,
                outcome,
            })
            .await;
        self.sink
            .emit(SearchEvent::Progress {
                percent_complete: percent_complete(self.stats.valid_results, self.target()),
                valid_results: self.stats.valid_results,
                fragments_considered: self.stats.fragments_considered,
            })
            .await;

        if self.stats.valid_results >= self.target() {
            info!("Found {} valid results", self.stats.valid_results);
            self.halt(SearchTermination::TargetReached);
        }
    }

    async fn on_page_completed(&mut self, report: PageReport) {
        let Some(slot) = self.slot_for(report.page_number) else {
            warn!("Completion for unknown page {}", report.page_number);
            return;
        };
        self.slots[slot].state = report.state;
        self.record_page(&report);

        self.sink
            .emit(SearchEvent::PageCompleted {
                page_number: report.page_number,
                state: report.state,
            })
            .await;

        match report.state {
            PageWorkerState::NoResults => {
                debug!("Page {} is past the last result", report.page_number);
                self.source_exhausted = true;
            }
            PageWorkerState::Error => {
                self.consecutive_errors += 1;
                if self.consecutive_errors >= self.coordinator.config.max_consecutive_errors
                    && !self.source_exhausted
                {
                    warn!(
                        "{} pages failed in a row, no more pages will be requested",
                        self.consecutive_errors
                    );
                    self.source_exhausted = true;
                }
            }
            PageWorkerState::Finished => self.consecutive_errors = 0,
            PageWorkerState::Working => {}
        }

        if self.next_page > self.coordinator.config.max_page && !self.source_exhausted {
            debug!("Reached page limit {}", self.coordinator.config.max_page);
            self.source_exhausted = true;
        }

        if self.source_exhausted {
            if !self.any_working() {
                self.halt(SearchTermination::SourceExhausted);
            }
        } else {
            self.dispatch(slot);
        }
    }

    fn record_page(&mut self, report: &PageReport) {
        if report.cancelled {
            self.stats.pages_abandoned += 1;
            return;
        }
        match report.state {
            PageWorkerState::Finished => self.stats.pages_finished += 1,
            PageWorkerState::NoResults => self.stats.pages_empty += 1,
            PageWorkerState::Error => self.stats.pages_failed += 1,
            PageWorkerState::Working => {}
        }
    }

    fn slot_for(&self, page_number: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.page_number == page_number)
    }

    fn any_working(&self) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.state == PageWorkerState::Working)
    }

    fn halt(&mut self, termination: SearchTermination) {
        if self.termination.is_none() {
            debug!("Halting search: {}", termination);
            self.termination = Some(termination);
            self.halt_token.cancel();
        }
    }

    /// Stops every worker and waits for them. Outcomes that arrive after
    /// the halt are discarded.
    async fn shutdown(&mut self, events_rx: &mut mpsc::Receiver<PageEvent>) {
        self.halt_token.cancel();
        self.events_tx = None;

        let mut discarded = 0_usize;
        while let Some(message) = events_rx.recv().await {
            match message {
                PageEvent::Outcome { .. } => discarded += 1,
                PageEvent::Completed(report) => {
                    if let Some(slot) = self.slot_for(report.page_number) {
                        self.slots[slot].state = report.state;
                    }
                    self.record_page(&report);
                }
            }
        }
        if discarded > 0 {
            debug!("Discarded {} outcomes received after halt", discarded);
        }

        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                warn!("Page worker task failed: {}", e);
            }
        }
    }

    fn summary(&self) -> SearchSummary {
        SearchSummary {
            search_id: self.coordinator.search_id,
            termination: self
                .termination
                .unwrap_or(SearchTermination::SourceExhausted),
            percent_complete: percent_complete(self.stats.valid_results, self.target()),
            stats: self.stats.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawling::events::CollectingEventSink;
    use crate::test_utils::{FakePageSource, page_of_matches, search_page};

    fn criteria(target: u32) -> SearchCriteria {
        SearchCriteria::builder("usb cable")
            .with_match_all_terms(true)
            .with_target_result_count(target)
            .build()
    }

    fn config(concurrency: usize) -> CoordinatorConfig {
        CoordinatorConfig {
            concurrency,
            worker: WorkerSettings {
                fetch_thumbnails: false,
                ..WorkerSettings::default()
            },
            ..CoordinatorConfig::default()
        }
    }

    #[test]
    fn test_concurrency_below_two_is_rejected() {
        let result = SearchCoordinator::new(criteria(5), Arc::new(FakePageSource::new()), config(1));
        assert!(matches!(
            result,
            Err(SearchError::InvalidConcurrency {
                requested: 1,
                minimum: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_zero_target_finishes_without_fetching() {
        let source = Arc::new(FakePageSource::new().with_page(1, page_of_matches(1, 3, "usb cable")));
        let coordinator = SearchCoordinator::new(criteria(0), source.clone(), config(2)).unwrap();
        let sink = CollectingEventSink::new();

        let summary = coordinator.run(&sink).await;
        assert_eq!(summary.termination, SearchTermination::TargetReached);
        assert_eq!(summary.percent_complete, 100);
        assert!(source.requested_pages().is_empty());
    }

    #[tokio::test]
    async fn test_single_page_source_is_exhausted() {
        let source = FakePageSource::new()
            .with_page(1, page_of_matches(1, 3, "usb cable"))
            .with_page(2, search_page(2, &[]))
            .with_page(3, search_page(3, &[]));
        let coordinator = SearchCoordinator::new(criteria(10), Arc::new(source), config(2)).unwrap();
        let sink = CollectingEventSink::new();

        let summary = coordinator.run(&sink).await;
        assert_eq!(summary.termination, SearchTermination::SourceExhausted);
        assert_eq!(summary.stats.valid_results, 3);
        assert_eq!(summary.percent_complete, 30);
        assert_eq!(sink.records().len(), 3);
        assert!(matches!(sink.events().last(), Some(SearchEvent::Finished(_))));
    }

    #[tokio::test]
    async fn test_consecutive_errors_stop_dispatching() {
        // No canned pages at all: every fetch is a 404.
        let source = Arc::new(FakePageSource::new());
        let config = CoordinatorConfig {
            max_consecutive_errors: 3,
            ..config(2)
        };
        let coordinator = SearchCoordinator::new(criteria(5), source.clone(), config).unwrap();

        let summary = coordinator.run(&CollectingEventSink::new()).await;
        assert_eq!(summary.termination, SearchTermination::SourceExhausted);
        assert!(summary.stats.pages_failed >= 3);
        assert!(source.requested_pages().len() <= 4);
    }

    #[tokio::test]
    async fn test_page_limit_is_respected() {
        let mut source = FakePageSource::new();
        for page in 1..=10 {
            source = source.with_page(page, page_of_matches(page, 1, "usb cable"));
        }
        let source = Arc::new(source);
        let config = CoordinatorConfig {
            max_page: 4,
            ..config(2)
        };
        let coordinator = SearchCoordinator::new(criteria(50), source.clone(), config).unwrap();

        let summary = coordinator.run(&CollectingEventSink::new()).await;
        assert_eq!(summary.termination, SearchTermination::SourceExhausted);
        assert_eq!(summary.stats.valid_results, 4);
        assert!(source.requested_pages().iter().all(|page| *page <= 4));
    }
}
