//! Product records and the per-fragment outcome envelope

use serde::{Deserialize, Serialize};
use url::Url;

use super::numeric_range::NumericRange;
use super::score_distribution::ScoreDistribution;

/// A listing that passed every check. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub review_count: u32,
    pub price: NumericRange<f64>,
    pub score_distribution: Option<ScoreDistribution>,
    pub url: Option<Url>,
    pub rating: Option<f64>,
    pub prime_eligible: bool,
    pub thumbnail_url: Option<Url>,
    #[serde(skip)]
    pub thumbnail: Option<Vec<u8>>,
}

impl ProductRecord {
    /// Lowest advertised price, if the listing showed any.
    pub fn low_price(&self) -> Option<f64> {
        self.price.has_low().then(|| self.price.low())
    }

    /// Upper end of a price range; `None` for single-price listings.
    pub fn high_price(&self) -> Option<f64> {
        let low = self.low_price();
        let high = self.price.has_high().then(|| self.price.high());
        high.filter(|h| Some(*h) != low)
    }

    pub const fn has_thumbnail(&self) -> bool {
        self.thumbnail.is_some()
    }
}

/// Result of processing one listing fragment.
///
/// `record` is set only when every check passed. `status` explains rejections
/// and extraction failures. Both are empty for non-product filler.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Outcome {
    pub record: Option<ProductRecord>,
    pub status: Option<String>,
}

impl Outcome {
    pub const fn accepted(record: ProductRecord) -> Self {
        Self {
            record: Some(record),
            status: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            record: None,
            status: Some(reason.into()),
        }
    }

    /// Extraction failed for a listing that clearly exists.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::rejected(reason)
    }

    /// Non-product filler; counted but carries nothing.
    pub const fn skipped() -> Self {
        Self {
            record: None,
            status: None,
        }
    }

    pub const fn is_accepted(&self) -> bool {
        self.record.is_some()
    }

    pub const fn is_skipped(&self) -> bool {
        self.record.is_none() && self.status.is_none()
    }
}
