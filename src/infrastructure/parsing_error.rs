//! Parsing error types for listing and histogram extraction
//!
//! Field absence (no rating, no thumbnail) is not an error and is modelled
//! as `Option`. These variants cover the cases where a listing clearly
//! exists but a detail could not be recovered.

use thiserror::Error;

use crate::domain::RangeError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Required field '{field}' not found in listing")]
    RequiredFieldMissing { field: String },

    #[error("Invalid price range in listing: {0}")]
    InvalidPriceRange(#[from] RangeError),

    #[error("Expected {expected} listings on the page but found {found}")]
    FragmentCountMismatch { expected: usize, found: usize },

    #[error("Couldn't obtain review histogram data for {product_id}: {reason}")]
    HistogramUnavailable { product_id: String, reason: String },

    #[error("Couldn't confirm shipping eligibility for {url}: {reason}")]
    EligibilityUnavailable { url: String, reason: String },
}

impl ParsingError {
    pub fn required_field_missing(field: &str) -> Self {
        Self::RequiredFieldMissing {
            field: field.to_string(),
        }
    }

    pub fn histogram_unavailable(product_id: &str, reason: impl ToString) -> Self {
        Self::HistogramUnavailable {
            product_id: product_id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn eligibility_unavailable(url: &str, reason: impl ToString) -> Self {
        Self::EligibilityUnavailable {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Recoverable errors only affect one listing; the rest of the page goes on.
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::RequiredFieldMissing { .. }
            | Self::InvalidPriceRange(_)
            | Self::HistogramUnavailable { .. }
            | Self::EligibilityUnavailable { .. } => true,
            Self::FragmentCountMismatch { .. } => false,
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_level_errors_are_not_recoverable() {
        let err = ParsingError::FragmentCountMismatch {
            expected: 16,
            found: 3,
        };
        assert!(!err.is_recoverable());
        assert!(ParsingError::required_field_missing("product id").is_recoverable());
    }

    #[test]
    fn test_histogram_message() {
        let err = ParsingError::histogram_unavailable("B00TEST", "timed out");
        assert_eq!(
            err.to_string(),
            "Couldn't obtain review histogram data for B00TEST: timed out"
        );
    }
}
