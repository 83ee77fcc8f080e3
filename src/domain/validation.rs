//! Admission rules for candidate listings
//!
//! Each rule is a pure predicate over the criteria and one extracted field.
//! Callers run them in a fixed order (name, review count, price, score
//! distribution) and stop at the first failure, since the fields later rules
//! need get progressively more expensive to fetch.

use thiserror::Error;

use super::numeric_range::NumericRange;
use super::score_distribution::ScoreDistribution;
use super::search_criteria::SearchCriteria;

/// Why a listing was turned away. The `Display` text is shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Listing has no product name.")]
    NameMissing,

    #[error("{name} doesn't contain all search criteria.")]
    NameMismatch { name: String },

    #[error("{name} doesn't have any reviews.")]
    NoReviews { name: String },

    #[error("{name} only has {count} reviews.")]
    TooFewReviews { name: String, count: u32 },

    #[error("{name} doesn't fit in your price range.")]
    PriceOutOfRange { name: String },

    #[error("{name} doesn't fall within your review distribution.")]
    DistributionMismatch { name: String },
}

pub fn name_matches(criteria: &SearchCriteria, name: Option<&str>) -> bool {
    let Some(name) = name else {
        return false;
    };
    if !criteria.match_all_terms() {
        return true;
    }
    let haystack = name.to_lowercase();
    criteria
        .search_terms()
        .iter()
        .all(|term| haystack.contains(term.as_str()))
}

pub const fn review_count_sufficient(criteria: &SearchCriteria, review_count: u32) -> bool {
    review_count >= criteria.minimum_review_count()
}

pub fn price_fits(criteria: &SearchCriteria, price: &NumericRange<f64>) -> bool {
    let wanted = criteria.price();
    if !wanted.has_range_specified() {
        return true;
    }
    price.has_range_specified() && wanted.overlaps(price)
}

/// A listing without a distribution passes: missing data never disqualifies here.
pub fn distribution_fits(criteria: &SearchCriteria, observed: Option<&ScoreDistribution>) -> bool {
    observed.is_none_or(|distribution| criteria.score_distribution().admits(distribution))
}

pub fn check_name(criteria: &SearchCriteria, name: Option<&str>) -> Result<(), Rejection> {
    match name {
        None => Err(Rejection::NameMissing),
        Some(_) if name_matches(criteria, name) => Ok(()),
        Some(name) => Err(Rejection::NameMismatch {
            name: name.to_string(),
        }),
    }
}

pub fn check_review_count(
    criteria: &SearchCriteria,
    name: &str,
    review_count: u32,
) -> Result<(), Rejection> {
    if review_count_sufficient(criteria, review_count) {
        return Ok(());
    }
    let name = name.to_string();
    if review_count == 0 {
        Err(Rejection::NoReviews { name })
    } else {
        Err(Rejection::TooFewReviews {
            name,
            count: review_count,
        })
    }
}

pub fn check_price(
    criteria: &SearchCriteria,
    name: &str,
    price: &NumericRange<f64>,
) -> Result<(), Rejection> {
    if price_fits(criteria, price) {
        Ok(())
    } else {
        Err(Rejection::PriceOutOfRange {
            name: name.to_string(),
        })
    }
}

pub fn check_distribution(
    criteria: &SearchCriteria,
    name: &str,
    observed: Option<&ScoreDistribution>,
) -> Result<(), Rejection> {
    if distribution_fits(criteria, observed) {
        Ok(())
    } else {
        Err(Rejection::DistributionMismatch {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn criteria(match_all: bool) -> SearchCriteria {
        SearchCriteria::builder("USB Cable")
            .with_match_all_terms(match_all)
            .with_minimum_review_count(10)
            .build()
    }

    #[rstest]
    #[case(true, Some("Anker usb-c CABLE 6ft"), true)]
    #[case(true, Some("Anker charger"), false)]
    #[case(false, Some("Anker charger"), true)]
    #[case(true, None, false)]
    #[case(false, None, false)]
    fn test_name_matches(
        #[case] match_all: bool,
        #[case] name: Option<&str>,
        #[case] expected: bool,
    ) {
        assert_eq!(name_matches(&criteria(match_all), name), expected);
    }

    #[test]
    fn test_review_count_below_minimum_fails() {
        let criteria = criteria(false);
        assert!(!review_count_sufficient(&criteria, 5));
        assert!(review_count_sufficient(&criteria, 10));
        assert_eq!(
            check_review_count(&criteria, "Cable", 5),
            Err(Rejection::TooFewReviews {
                name: "Cable".into(),
                count: 5
            })
        );
        assert_eq!(
            check_review_count(&criteria, "Cable", 0).unwrap_err().to_string(),
            "Cable doesn't have any reviews."
        );
    }

    #[rstest]
    #[case(NumericRange::single(19.99), true)]
    #[case(NumericRange::new(25.0, 40.0).unwrap(), true)]
    #[case(NumericRange::single(30.0), true)]
    #[case(NumericRange::single(30.01), false)]
    #[case(NumericRange::unbounded(), false)]
    fn test_price_fits_constrained_criteria(
        #[case] price: NumericRange<f64>,
        #[case] expected: bool,
    ) {
        let criteria = SearchCriteria::builder("cable")
            .with_price(NumericRange::new(5.0, 30.0).unwrap())
            .build();
        assert_eq!(price_fits(&criteria, &price), expected);
    }

    #[test]
    fn test_unconstrained_price_admits_missing_price() {
        let criteria = SearchCriteria::builder("cable").build();
        assert!(price_fits(&criteria, &NumericRange::unbounded()));
    }

    #[test]
    fn test_missing_distribution_passes_any_criteria() {
        let strict = ScoreDistribution::unconstrained()
            .with_bucket(5, NumericRange::new(99.0, 100.0).unwrap());
        let criteria = SearchCriteria::builder("cable")
            .with_score_distribution(strict)
            .build();
        assert!(distribution_fits(&criteria, None));
        assert!(check_distribution(&criteria, "Cable", None).is_ok());

        let observed = ScoreDistribution::from_percentages([10.0, 5.0, 5.0, 20.0, 60.0]);
        assert!(!distribution_fits(&criteria, Some(&observed)));
    }

    #[test]
    fn test_rejection_messages() {
        let criteria = criteria(true);
        let err = check_name(&criteria, Some("Phone charger")).unwrap_err();
        assert_eq!(err.to_string(), "Phone charger doesn't contain all search criteria.");
        assert_eq!(check_name(&criteria, None), Err(Rejection::NameMissing));
    }
}
