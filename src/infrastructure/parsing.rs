//! Field extraction engine for search result pages
//!
//! Stateless functions that turn raw HTML into typed fields. The page worker
//! decides what to do with missing or failed fields; nothing in here performs
//! I/O, so tests can feed canned markup directly.

pub mod numbers;
pub mod product_fields;
pub mod review_histogram;
pub mod search_page;

pub use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};
pub use numbers::{parse_count, parse_numbers};
pub use search_page::{result_count, split_fragments};

use url::Url;

use crate::domain::{NumericRange, ScoreDistribution};

/// Everything the listing fragment itself reveals about a product.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFields {
    pub name: Option<String>,
    pub price: ParsingResult<NumericRange<f64>>,
    pub product_id: Option<String>,
    pub url: Option<Url>,
    pub fuzzy_prime_eligible: bool,
    pub thumbnail_url: Option<Url>,
}

impl ListingFields {
    /// Extracts each field independently; relative links resolve against `base_url`.
    pub fn extract(fragment: &str, base_url: &Url) -> Self {
        Self {
            name: product_fields::product_name(fragment),
            price: product_fields::price_range(fragment),
            product_id: product_fields::product_id(fragment),
            url: product_fields::canonical_url(fragment, base_url),
            fuzzy_prime_eligible: product_fields::fuzzy_prime_eligibility(fragment),
            thumbnail_url: product_fields::thumbnail_url(fragment),
        }
    }
}

/// Review details read from the histogram payload.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramFields {
    pub review_count: u32,
    pub score_distribution: Option<ScoreDistribution>,
    pub rating: Option<f64>,
}

impl HistogramFields {
    pub fn extract(histogram: &str) -> Self {
        Self {
            review_count: review_histogram::review_count(histogram),
            score_distribution: review_histogram::score_distribution(histogram),
            rating: review_histogram::rating(histogram),
        }
    }
}
