//! Test utilities for amazon-scrape
//!
//! Canned search pages, listing fragments and review histograms in the
//! markup the extraction engine reads, plus an in-memory `PageSource` that
//! serves them with optional latency and records what was requested.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use url::Url;

use crate::crawling::source::PageSource;
use crate::infrastructure::FetchError;

static FAKE_BASE_URL: Lazy<Url> =
    Lazy::new(|| Url::parse("https://www.amazon.com/").expect("valid fake base URL"));

const LISTINGS_PER_PAGE: usize = 16;

/// One listing fragment as it appears on a results page.
pub fn listing(index: usize, product_id: &str, name: &str, price: &str) -> String {
    let slug = name.to_lowercase().replace(' ', "-");
    format!(
        r#"<li id="result_{index}" class="s-result-item" data-asin="{product_id}" name="{product_id}"><div class="s-item-container"><a class="a-link-normal" href="https://www.amazon.com/{slug}/dp/{product_id}/ref=sr_1_{index}"><img src="https://images-na.ssl-images-amazon.com/images/I/{product_id}.jpg" class="s-access-image"></a><a class="a-link-normal" href="https://www.amazon.com/{slug}/dp/{product_id}"><h2 class="a-size-medium s-access-title">{name}</h2></a><span class="a-size-base a-color-price">{price}</span><span class="a-size-small">FREE Shipping on eligible orders</span></div></li>"#
    )
}

/// A full results page. An empty slice yields the "no results" page.
pub fn search_page(page_number: u32, listings: &[String]) -> String {
    let header = if listings.is_empty() {
        "Your search did not match any products.".to_string()
    } else {
        let page_index = usize::try_from(page_number.saturating_sub(1)).unwrap_or(0);
        let first = page_index * LISTINGS_PER_PAGE + 1;
        let last = first + listings.len() - 1;
        format!("Showing {first} - {last} of 1,000 results")
    };
    format!(
        r#"<html><body><h2 id="resultCount" class="a-size-base"><span>{header}</span></h2><div id="atfResults"><ul>{}<li id="result_98" class="s-result-item cached"></li><li id="result_99" class="s-result-item cached"></li></ul></div></body></html>"#,
        listings.concat()
    )
}

/// Page `page_number` with `count` listings named after the search text.
pub fn page_of_matches(page_number: u32, count: usize, search_text: &str) -> String {
    let listings: Vec<String> = (0..count)
        .map(|i| {
            let id = format!("P{page_number:03}{i:03}");
            listing(i, &id, &format!("{search_text} model {page_number}-{i}"), "$19.99")
        })
        .collect();
    search_page(page_number, &listings)
}

/// Histogram payload; `percentages` are listed five-star first.
pub fn histogram(review_count: u32, percentages: [u32; 5]) -> String {
    let stars = [5, 4, 3, 2, 1];
    let buckets: String = stars
        .iter()
        .zip(percentages)
        .map(|(star, percent)| {
            format!(r#"<a class="histogram-row" title="{percent}% of reviews have {star} stars">{star} star</a>"#)
        })
        .collect();
    format!(
        r#"<div class="a-popover-preload"><span class="a-icon-alt">4.4 out of 5 stars</span>{buckets}<a class="a-link-emphasis" href="/product-reviews">See all {review_count} reviews</a></div>"#
    )
}

/// In-memory `PageSource`.
///
/// Pages without canned HTML fail with a 404. Every product gets the default
/// histogram unless overridden or marked unavailable.
pub struct FakePageSource {
    pages: HashMap<u32, String>,
    histograms: HashMap<String, Option<String>>,
    default_histogram: String,
    product_pages: HashMap<String, String>,
    delay: Option<Duration>,
    page_delays: HashMap<u32, Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requested_pages: Mutex<Vec<u32>>,
}

impl Default for FakePageSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePageSource {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            histograms: HashMap::new(),
            default_histogram: histogram(120, [70, 15, 8, 4, 3]),
            product_pages: HashMap::new(),
            delay: None,
            page_delays: HashMap::new(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requested_pages: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_page(mut self, page_number: u32, html: String) -> Self {
        self.pages.insert(page_number, html);
        self
    }

    #[must_use]
    pub fn with_histogram(mut self, product_id: &str, payload: String) -> Self {
        self.histograms.insert(product_id.to_string(), Some(payload));
        self
    }

    #[must_use]
    pub fn without_histogram(mut self, product_id: &str) -> Self {
        self.histograms.insert(product_id.to_string(), None);
        self
    }

    #[must_use]
    pub fn with_default_histogram(mut self, payload: String) -> Self {
        self.default_histogram = payload;
        self
    }

    #[must_use]
    pub fn with_product_page(mut self, url: &str, html: String) -> Self {
        self.product_pages.insert(url.to_string(), html);
        self
    }

    /// Latency added to every page fetch.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn with_page_delay(mut self, page_number: u32, delay: Duration) -> Self {
        self.page_delays.insert(page_number, delay);
        self
    }

    /// Page numbers in the order their fetches started.
    pub fn requested_pages(&self) -> Vec<u32> {
        self.requested_pages
            .lock()
            .map(|pages| pages.clone())
            .unwrap_or_default()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of page fetches ever running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn not_found(url: &str) -> FetchError {
        FetchError::Status {
            status: 404,
            url: url.to_string(),
        }
    }
}

/// Decrements the in-flight counter even when the fetch future is dropped.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PageSource for FakePageSource {
    async fn fetch_page(&self, page_number: u32, _search_text: &str) -> Result<String, FetchError> {
        if let Ok(mut pages) = self.requested_pages.lock() {
            pages.push(page_number);
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        if let Some(delay) = self.page_delays.get(&page_number).copied().or(self.delay) {
            tokio::time::sleep(delay).await;
        }

        self.pages
            .get(&page_number)
            .cloned()
            .ok_or_else(|| Self::not_found(&format!("fake://search?page={page_number}")))
    }

    async fn fetch_review_histogram(&self, product_id: &str) -> Result<String, FetchError> {
        match self.histograms.get(product_id) {
            Some(Some(payload)) => Ok(payload.clone()),
            Some(None) => Err(Self::not_found(&format!("fake://histogram/{product_id}"))),
            None => Ok(self.default_histogram.clone()),
        }
    }

    async fn fetch_text(&self, url: &Url) -> Result<String, FetchError> {
        self.product_pages
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| Self::not_found(url.as_str()))
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        Ok(url.as_str().as_bytes().to_vec())
    }

    fn base_url(&self) -> &Url {
        &FAKE_BASE_URL
    }
}
