//! Review histogram payload extraction
//!
//! The histogram is a small secondary document keyed by product id. It holds
//! the review count, the star distribution and the average rating.

use once_cell::sync::Lazy;
use regex::Regex;

use super::numbers::parse_count;
use crate::domain::score_distribution::STAR_BUCKETS;
use crate::domain::ScoreDistribution;

static REVIEW_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)See all (.*?) reviews").expect("valid review count pattern"));

static PERCENT_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)title="(.*?)%"#).expect("valid percentage pattern"));

static TRAILING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*$").expect("valid trailing number pattern"));

static RATING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-5](?:\.[0-9])?) out of 5 stars").expect("valid rating pattern"));

/// Total number of reviews; 0 when the payload doesn't say.
pub fn review_count(histogram: &str) -> u32 {
    REVIEW_COUNT
        .captures(histogram)
        .and_then(|captures| captures.get(1))
        .and_then(|count| parse_count(count.as_str()))
        .unwrap_or(0)
}

/// Star distribution with index 0 holding the one-star percentage.
///
/// The payload lists buckets five-star first. Fewer than five readable
/// percentages means the distribution is unavailable.
pub fn score_distribution(histogram: &str) -> Option<ScoreDistribution> {
    let values: Vec<f64> = PERCENT_TITLE
        .captures_iter(histogram)
        .take(STAR_BUCKETS)
        .map(|captures| {
            let title = captures.get(1).map_or("", |title| title.as_str());
            TRAILING_NUMBER
                .captures(title)
                .and_then(|number| number.get(1))
                .and_then(|number| number.as_str().parse::<f64>().ok())
        })
        .collect::<Option<Vec<_>>>()?;

    let mut percentages: [f64; STAR_BUCKETS] = values.try_into().ok()?;
    percentages.reverse();
    Some(ScoreDistribution::from_percentages(percentages))
}

/// Average star rating such as `4.5`; `None` when the payload has none.
pub fn rating(histogram: &str) -> Option<f64> {
    RATING
        .captures(histogram)
        .and_then(|captures| captures.get(1))
        .and_then(|rating| rating.as_str().parse().ok())
}
