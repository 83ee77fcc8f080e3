//! End-to-end coordinator scenarios against an in-memory page source

use std::sync::Arc;
use std::time::Duration;

use amazon_scrape::crawling::events::CollectingEventSink;
use amazon_scrape::crawling::{PageWorkerState, WorkerSettings};
use amazon_scrape::test_utils::{FakePageSource, listing, page_of_matches, search_page};
use amazon_scrape::{
    CoordinatorConfig, SearchCoordinator, SearchCriteria, SearchEvent, SearchTermination,
};
use tokio_test::assert_ok;

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
            fetch_timeout: Duration::from_secs(5),
            fetch_thumbnails: false,
        },
        ..CoordinatorConfig::default()
    }
}

/// Pages 1..=pages, each with `passing` matching listings followed by
/// `failing` listings that miss a search term.
fn mixed_source(pages: u32, passing: usize, failing: usize) -> FakePageSource {
    let mut source = FakePageSource::new();
    for page in 1..=pages {
        let mut listings = Vec::new();
        for i in 0..passing {
            let id = format!("OK{page:02}{i:02}");
            listings.push(listing(i, &id, &format!("USB Cable {page}-{i}"), "$8.50"));
        }
        for i in passing..passing + failing {
            let id = format!("NO{page:02}{i:02}");
            listings.push(listing(i, &id, &format!("Lightning Adapter {page}-{i}"), "$8.50"));
        }
        source = source.with_page(page, search_page(page, &listings));
    }
    source
}

#[tokio::test]
async fn stops_at_target_without_fetching_far_ahead() {
    let source = Arc::new(mixed_source(20, 5, 3));
    let coordinator = SearchCoordinator::new(criteria(10), source.clone(), config(3)).unwrap();
    let sink = CollectingEventSink::new();

    let summary = coordinator.run(&sink).await;

    assert_eq!(summary.termination, SearchTermination::TargetReached);
    assert_eq!(summary.percent_complete, 100);
    assert_eq!(sink.records().len(), 10);
    let furthest = source.requested_pages().into_iter().max().unwrap();
    assert!(furthest <= 5, "fetched up to page {furthest}");
}

#[tokio::test(start_paused = true)]
async fn no_results_page_stops_further_dispatch() {
    let mut source = FakePageSource::new();
    for page in 1..=3 {
        source = source
            .with_page(page, page_of_matches(page, 2, "usb cable"))
            .with_page_delay(page, Duration::from_millis(200));
    }
    for page in 4..=12 {
        source = source.with_page(page, search_page(page, &[]));
    }
    let source = Arc::new(source);
    let coordinator = SearchCoordinator::new(criteria(100), source.clone(), config(4)).unwrap();
    let sink = CollectingEventSink::new();

    let summary = coordinator.run(&sink).await;

    assert_eq!(summary.termination, SearchTermination::SourceExhausted);
    assert_eq!(summary.stats.valid_results, 6);
    assert!(summary.stats.pages_empty >= 1);
    let no_results: Vec<u32> = sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            SearchEvent::PageCompleted {
                page_number,
                state: PageWorkerState::NoResults,
            } => Some(page_number),
            _ => None,
        })
        .collect();
    assert_eq!(no_results, vec![4]);
    // Pages 1-3 were still working when page 4 came back empty.
    let mut requested = source.requested_pages();
    requested.sort_unstable();
    assert_eq!(requested, vec![1, 2, 3, 4]);
    assert_eq!(summary.stats.pages_finished, 3);
}

#[tokio::test]
async fn outcomes_are_counted_and_progress_is_monotonic() {
    let source = Arc::new(mixed_source(2, 2, 2).with_page(3, search_page(3, &[])));
    let coordinator = SearchCoordinator::new(criteria(100), source, config(2)).unwrap();
    let sink = CollectingEventSink::new();

    let summary = coordinator.run(&sink).await;

    assert_eq!(summary.termination, SearchTermination::SourceExhausted);
    assert_eq!(summary.stats.valid_results, 4);
    assert_eq!(summary.percent_complete, 4);

    let events = sink.events();
    let percents: Vec<u8> = events
        .iter()
        .filter_map(|event| match event {
            SearchEvent::Progress {
                percent_complete, ..
            } => Some(*percent_complete),
            _ => None,
        })
        .collect();
    assert!(percents.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(percents.last().copied(), Some(4));

    let rejections = events
        .iter()
        .filter(|event| {
            matches!(event, SearchEvent::Outcome { outcome, .. }
                if outcome.status.as_deref().is_some_and(|s| s.contains("doesn't contain all search criteria")))
        })
        .count();
    assert_eq!(rejections, 4);

    let outcomes = events
        .iter()
        .filter(|event| matches!(event, SearchEvent::Outcome { .. }))
        .count();
    assert_eq!(summary.stats.fragments_considered, 8);
    assert_eq!(outcomes, 8);
}

#[tokio::test]
async fn records_stream_in_page_order_within_a_page() {
    let source = Arc::new(mixed_source(1, 4, 0).with_page(2, search_page(2, &[])));
    let coordinator = SearchCoordinator::new(criteria(4), source, config(2)).unwrap();
    let sink = CollectingEventSink::new();

    coordinator.run(&sink).await;

    let names: Vec<String> = sink.records().into_iter().map(|record| record.name).collect();
    assert_eq!(
        names,
        vec!["USB Cable 1-0", "USB Cable 1-1", "USB Cable 1-2", "USB Cable 1-3"]
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_leaves_nothing_in_flight() {
    let source = Arc::new(mixed_source(50, 1, 0).with_delay(Duration::from_secs(2)));
    let coordinator = SearchCoordinator::new(criteria(1_000), source.clone(), config(3)).unwrap();
    let mut handle = coordinator.spawn();

    // Let a few pages complete, then cancel.
    tokio::time::sleep(Duration::from_secs(5)).await;
    handle.cancel();

    let mut finished = None;
    while let Some(event) = handle.next_event().await {
        if let SearchEvent::Finished(summary) = event {
            assert_eq!(source.in_flight(), 0);
            finished = Some(summary);
        }
    }
    let finished = finished.expect("search emits a Finished event");
    assert_eq!(finished.termination, SearchTermination::Cancelled);

    let requested_at_finish = source.requested_pages().len();
    let summary = assert_ok!(handle.wait().await);
    assert_eq!(summary.termination, SearchTermination::Cancelled);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(source.requested_pages().len(), requested_at_finish);
}

#[tokio::test(start_paused = true)]
async fn pool_never_exceeds_concurrency() {
    let source = Arc::new(
        mixed_source(12, 1, 0)
            .with_page(13, search_page(13, &[]))
            .with_delay(Duration::from_millis(300)),
    );
    let coordinator = SearchCoordinator::new(criteria(500), source.clone(), config(3)).unwrap();

    let summary = coordinator.run(&CollectingEventSink::new()).await;

    assert_eq!(summary.termination, SearchTermination::SourceExhausted);
    assert_eq!(summary.stats.valid_results, 12);
    assert!(source.max_in_flight() <= 3);
    assert_eq!(source.in_flight(), 0);
}

#[tokio::test]
async fn failed_histogram_does_not_stop_the_page() {
    let source = Arc::new(
        mixed_source(1, 3, 0)
            .with_page(2, search_page(2, &[]))
            .without_histogram("OK0101"),
    );
    let coordinator = SearchCoordinator::new(criteria(10), source, config(2)).unwrap();
    let sink = CollectingEventSink::new();

    let summary = coordinator.run(&sink).await;

    assert_eq!(summary.stats.valid_results, 2);
    assert_eq!(summary.stats.pages_finished, 1);
    let failed = sink.events().into_iter().any(|event| {
        matches!(event, SearchEvent::Outcome { outcome, .. }
            if outcome.status.as_deref().is_some_and(|s| s.contains("OK0101")))
    });
    assert!(failed);
}

#[tokio::test]
async fn external_token_cancels_before_start() {
    let token = tokio_util::sync::CancellationToken::new();
    token.cancel();
    let source = Arc::new(mixed_source(3, 2, 0));
    let coordinator = SearchCoordinator::new(criteria(5), source.clone(), config(2))
        .unwrap()
        .with_cancellation_token(token);

    let summary = coordinator.run(&CollectingEventSink::new()).await;

    assert_eq!(summary.termination, SearchTermination::Cancelled);
    assert_eq!(summary.stats.valid_results, 0);
    assert!(source.requested_pages().is_empty());
}
