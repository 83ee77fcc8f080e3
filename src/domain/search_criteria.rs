//! Immutable per-search filter settings

use serde::{Deserialize, Serialize};

use super::numeric_range::NumericRange;
use super::score_distribution::ScoreDistribution;

pub mod defaults {
    pub const TARGET_RESULT_COUNT: u32 = 20;
    pub const MINIMUM_REVIEW_COUNT: u32 = 0;
    pub const MATCH_ALL_TERMS: bool = false;
    pub const STRICT_PRIME_ELIGIBILITY: bool = false;
}

/// Built once before a search starts and shared read-only with every worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    search_text: String,
    target_result_count: u32,
    minimum_review_count: u32,
    match_all_terms: bool,
    strict_prime_eligibility: bool,
    price: NumericRange<f64>,
    score_distribution: ScoreDistribution,
}

impl SearchCriteria {
    pub fn builder(search_text: impl Into<String>) -> SearchCriteriaBuilder {
        SearchCriteriaBuilder::new(search_text)
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub const fn target_result_count(&self) -> u32 {
        self.target_result_count
    }

    pub const fn minimum_review_count(&self) -> u32 {
        self.minimum_review_count
    }

    pub const fn match_all_terms(&self) -> bool {
        self.match_all_terms
    }

    pub const fn strict_prime_eligibility(&self) -> bool {
        self.strict_prime_eligibility
    }

    pub const fn price(&self) -> &NumericRange<f64> {
        &self.price
    }

    pub const fn score_distribution(&self) -> &ScoreDistribution {
        &self.score_distribution
    }

    /// Lowercased whitespace-separated tokens of the search text.
    pub fn search_terms(&self) -> Vec<String> {
        self.search_text
            .split_whitespace()
            .map(str::to_lowercase)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SearchCriteriaBuilder {
    criteria: SearchCriteria,
}

impl SearchCriteriaBuilder {
    pub fn new(search_text: impl Into<String>) -> Self {
        Self {
            criteria: SearchCriteria {
                search_text: search_text.into(),
                target_result_count: defaults::TARGET_RESULT_COUNT,
                minimum_review_count: defaults::MINIMUM_REVIEW_COUNT,
                match_all_terms: defaults::MATCH_ALL_TERMS,
                strict_prime_eligibility: defaults::STRICT_PRIME_ELIGIBILITY,
                price: NumericRange::unbounded(),
                score_distribution: ScoreDistribution::unconstrained(),
            },
        }
    }

    #[must_use]
    pub fn with_target_result_count(mut self, count: u32) -> Self {
        self.criteria.target_result_count = count;
        self
    }

    #[must_use]
    pub fn with_minimum_review_count(mut self, count: u32) -> Self {
        self.criteria.minimum_review_count = count;
        self
    }

    #[must_use]
    pub fn with_match_all_terms(mut self, enabled: bool) -> Self {
        self.criteria.match_all_terms = enabled;
        self
    }

    #[must_use]
    pub fn with_strict_prime_eligibility(mut self, enabled: bool) -> Self {
        self.criteria.strict_prime_eligibility = enabled;
        self
    }

    #[must_use]
    pub fn with_price(mut self, price: NumericRange<f64>) -> Self {
        self.criteria.price = price;
        self
    }

    #[must_use]
    pub fn with_score_distribution(mut self, distribution: ScoreDistribution) -> Self {
        self.criteria.score_distribution = distribution;
        self
    }

    pub fn build(self) -> SearchCriteria {
        self.criteria
    }
}
