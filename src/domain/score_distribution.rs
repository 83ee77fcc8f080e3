//! Five-bucket review star distribution
//!
//! Index 0 is the one-star bucket and index 4 the five-star bucket, no matter
//! which order the source page lists them in.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::numeric_range::NumericRange;

pub const STAR_BUCKETS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreDistribution {
    buckets: [NumericRange<f64>; STAR_BUCKETS],
}

impl ScoreDistribution {
    /// Criteria form: every bucket accepts any percentage.
    pub fn unconstrained() -> Self {
        Self::default()
    }

    /// Observed form: one percentage per bucket, one-star first.
    pub fn from_percentages(percentages: [f64; STAR_BUCKETS]) -> Self {
        Self {
            buckets: percentages.map(NumericRange::single),
        }
    }

    pub const fn from_buckets(buckets: [NumericRange<f64>; STAR_BUCKETS]) -> Self {
        Self { buckets }
    }

    /// Replaces the bucket for `stars` (1..=5); out-of-range star counts are ignored.
    #[must_use]
    pub fn with_bucket(mut self, stars: u8, range: NumericRange<f64>) -> Self {
        if let Some(slot) = Self::index(stars).and_then(|i| self.buckets.get_mut(i)) {
            *slot = range;
        }
        self
    }

    pub fn bucket(&self, stars: u8) -> Option<&NumericRange<f64>> {
        Self::index(stars).and_then(|i| self.buckets.get(i))
    }

    /// The observed percentage for `stars`, read from the bucket's low bound.
    pub fn observed(&self, stars: u8) -> Option<f64> {
        self.bucket(stars).map(NumericRange::low)
    }

    pub const fn buckets(&self) -> &[NumericRange<f64>; STAR_BUCKETS] {
        &self.buckets
    }

    /// Sum of the explicitly set low bounds. An input form should keep this at or below 100.
    pub fn specified_low_total(&self) -> f64 {
        self.buckets
            .iter()
            .filter(|bucket| bucket.has_low())
            .map(NumericRange::low)
            .sum()
    }

    /// True when every criteria bucket contains the matching observed value.
    pub fn admits(&self, observed: &Self) -> bool {
        self.buckets
            .iter()
            .zip(observed.buckets.iter())
            .all(|(allowed, seen)| allowed.contains(seen.low()))
    }

    fn index(stars: u8) -> Option<usize> {
        (1..=5).contains(&stars).then(|| usize::from(stars - 1))
    }
}

impl fmt::Display for ScoreDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, stars) in (1..=5_u8).rev().enumerate() {
            if position > 0 {
                f.write_str("\n")?;
            }
            let percent = self.observed(stars).unwrap_or_default();
            write!(f, "{stars} star: {percent}%")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_percentages_keeps_one_star_first() {
        let distribution = ScoreDistribution::from_percentages([5.0, 3.0, 7.0, 20.0, 65.0]);
        assert_eq!(distribution.observed(1), Some(5.0));
        assert_eq!(distribution.observed(5), Some(65.0));
        assert_eq!(distribution.observed(0), None);
        assert_eq!(distribution.observed(6), None);
    }

    #[test]
    fn test_unconstrained_admits_anything() {
        let criteria = ScoreDistribution::unconstrained();
        let observed = ScoreDistribution::from_percentages([90.0, 0.0, 0.0, 0.0, 10.0]);
        assert!(criteria.admits(&observed));
    }

    #[test]
    fn test_admits_checks_every_bucket() {
        let criteria = ScoreDistribution::unconstrained()
            .with_bucket(1, NumericRange::at_most(10.0).unwrap())
            .with_bucket(5, NumericRange::at_least(50.0).unwrap());

        let good = ScoreDistribution::from_percentages([4.0, 3.0, 8.0, 20.0, 65.0]);
        let too_many_one_star = ScoreDistribution::from_percentages([30.0, 3.0, 2.0, 10.0, 55.0]);
        let too_few_five_star = ScoreDistribution::from_percentages([4.0, 20.0, 20.0, 20.0, 36.0]);

        assert!(criteria.admits(&good));
        assert!(!criteria.admits(&too_many_one_star));
        assert!(!criteria.admits(&too_few_five_star));
    }

    #[test]
    fn test_specified_low_total_ignores_unset_buckets() {
        let criteria = ScoreDistribution::unconstrained()
            .with_bucket(4, NumericRange::at_least(20.0).unwrap())
            .with_bucket(5, NumericRange::new(40.0, 100.0).unwrap());
        assert!((criteria.specified_low_total() - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display_lists_five_star_first() {
        let distribution = ScoreDistribution::from_percentages([1.0, 2.0, 3.0, 4.0, 90.0]);
        let text = distribution.to_string();
        assert!(text.starts_with("5 star: 90%"));
        assert!(text.ends_with("1 star: 1%"));
    }
}
