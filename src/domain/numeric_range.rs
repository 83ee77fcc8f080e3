//! Closed numeric interval shared by search criteria and extracted facts
//!
//! A `NumericRange` is used both as "an allowed range" (a price filter the
//! user typed in) and as "one or two observed values" (the price a listing
//! advertises). Both meanings share the same invariant: `low <= high` holds
//! after every construction and mutation.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric types usable as interval bounds.
///
/// `MIN` and `MAX` are the sentinels an unset bound defaults to.
pub trait Bounded: Copy + PartialOrd + fmt::Debug + fmt::Display {
    const MIN: Self;
    const MAX: Self;
}

macro_rules! impl_bounded {
    ($($t:ty),* $(,)?) => {
        $(
            impl Bounded for $t {
                const MIN: Self = <$t>::MIN;
                const MAX: Self = <$t>::MAX;
            }
        )*
    };
}

impl_bounded!(f64, u32, i32, i64, u64);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("Invalid range: low bound {low} is greater than high bound {high}")]
    InvalidRange { low: String, high: String },

    #[error("Malformed range '{input}': {reason}")]
    Malformed { input: String, reason: String },
}

impl RangeError {
    fn invalid<T: fmt::Display>(low: T, high: T) -> Self {
        Self::InvalidRange {
            low: low.to_string(),
            high: high.to_string(),
        }
    }
}

/// `a <= b`, treating unordered values (NaN) as a violation.
fn ordered<T: PartialOrd>(a: &T, b: &T) -> bool {
    matches!(a.partial_cmp(b), Some(Ordering::Less | Ordering::Equal))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "RangeBounds<T>",
    into = "RangeBounds<T>",
    bound(
        serialize = "T: Bounded + Serialize",
        deserialize = "T: Bounded + Deserialize<'de>"
    )
)]
pub struct NumericRange<T: Bounded> {
    low: T,
    high: T,
    has_low: bool,
    has_high: bool,
}

/// Serialized form: an absent side means "no bound".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeBounds<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<T>,
}

impl<T: Bounded> NumericRange<T> {
    /// Creates a range with both bounds explicitly set.
    pub fn new(low: T, high: T) -> Result<Self, RangeError> {
        if !ordered(&low, &high) {
            return Err(RangeError::invalid(low, high));
        }
        Ok(Self {
            low,
            high,
            has_low: true,
            has_high: true,
        })
    }

    /// The unconstrained range `[MIN, MAX]`.
    pub const fn unbounded() -> Self {
        Self {
            low: T::MIN,
            high: T::MAX,
            has_low: false,
            has_high: false,
        }
    }

    /// A single observed value, `low == high`.
    pub const fn single(value: T) -> Self {
        Self {
            low: value,
            high: value,
            has_low: true,
            has_high: true,
        }
    }

    pub fn at_least(low: T) -> Result<Self, RangeError> {
        let mut range = Self::unbounded();
        range.set_low(low)?;
        Ok(range)
    }

    pub fn at_most(high: T) -> Result<Self, RangeError> {
        let mut range = Self::unbounded();
        range.set_high(high)?;
        Ok(range)
    }

    pub fn set_low(&mut self, low: T) -> Result<(), RangeError> {
        if !ordered(&low, &self.high) {
            return Err(RangeError::invalid(low, self.high));
        }
        self.low = low;
        self.has_low = true;
        Ok(())
    }

    pub fn set_high(&mut self, high: T) -> Result<(), RangeError> {
        if !ordered(&self.low, &high) {
            return Err(RangeError::invalid(self.low, high));
        }
        self.high = high;
        self.has_high = true;
        Ok(())
    }

    pub const fn low(&self) -> T {
        self.low
    }

    pub const fn high(&self) -> T {
        self.high
    }

    pub const fn has_low(&self) -> bool {
        self.has_low
    }

    pub const fn has_high(&self) -> bool {
        self.has_high
    }

    /// True when at least one bound was set, i.e. the range constrains anything.
    pub const fn has_range_specified(&self) -> bool {
        self.has_low || self.has_high
    }

    /// Inclusive on both ends.
    pub fn contains(&self, value: T) -> bool {
        ordered(&self.low, &value) && ordered(&value, &self.high)
    }

    /// Subset test: every point of `other` lies inside `self`.
    pub fn contains_range(&self, other: &Self) -> bool {
        ordered(&self.low, &other.low) && ordered(&other.high, &self.high)
    }

    /// True when the two ranges share at least one point, boundary touches included.
    pub fn overlaps(&self, other: &Self) -> bool {
        ordered(&self.low, &other.high) && ordered(&other.low, &self.high)
    }
}

impl NumericRange<f64> {
    pub fn span(&self) -> f64 {
        self.high - self.low
    }
}

impl<T: Bounded> Default for NumericRange<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T: Bounded> TryFrom<RangeBounds<T>> for NumericRange<T> {
    type Error = RangeError;

    fn try_from(bounds: RangeBounds<T>) -> Result<Self, Self::Error> {
        let mut range = Self::unbounded();
        if let Some(low) = bounds.low {
            range.set_low(low)?;
        }
        if let Some(high) = bounds.high {
            range.set_high(high)?;
        }
        Ok(range)
    }
}

impl<T: Bounded> From<NumericRange<T>> for RangeBounds<T> {
    fn from(range: NumericRange<T>) -> Self {
        Self {
            low: range.has_low.then_some(range.low),
            high: range.has_high.then_some(range.high),
        }
    }
}

/// Renders as `low,high`, leaving a side blank when it was never set.
impl<T: Bounded> fmt::Display for NumericRange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_low {
            write!(f, "{}", self.low)?;
        }
        f.write_str(",")?;
        if self.has_high {
            write!(f, "{}", self.high)?;
        }
        Ok(())
    }
}

impl<T> FromStr for NumericRange<T>
where
    T: Bounded + FromStr,
{
    type Err = RangeError;

    /// Parses `"low,high"`; either side may be blank.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| RangeError::Malformed {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = input.split(',').map(str::trim).collect();
        let &[low, high] = parts.as_slice() else {
            return Err(malformed("expected exactly one comma"));
        };

        let parse_side = |side: &str| -> Result<Option<T>, RangeError> {
            if side.is_empty() {
                return Ok(None);
            }
            side.parse::<T>()
                .map(Some)
                .map_err(|_| malformed(&format!("'{side}' is not a number")))
        };

        Self::try_from(RangeBounds {
            low: parse_side(low)?,
            high: parse_side(high)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_rejects_inverted_bounds() {
        let result = NumericRange::new(5.0, 1.0);
        assert!(matches!(result, Err(RangeError::InvalidRange { .. })));
    }

    #[test]
    fn test_new_rejects_nan() {
        assert!(NumericRange::new(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_default_is_unconstrained() {
        let range = NumericRange::<f64>::default();
        assert!(!range.has_range_specified());
        assert!(range.contains(f64::MIN));
        assert!(range.contains(f64::MAX));
        assert!(range.contains(0.0));
    }

    #[test]
    fn test_setters_enforce_invariant() {
        let mut range = NumericRange::new(10_u32, 20).unwrap();
        assert!(range.set_low(25).is_err());
        assert!(range.set_high(5).is_err());
        assert_eq!(range.low(), 10);
        assert_eq!(range.high(), 20);

        range.set_low(20).unwrap();
        assert_eq!(range.low(), 20);
    }

    #[test]
    fn test_one_sided_ranges() {
        let at_least = NumericRange::at_least(10.0).unwrap();
        assert!(at_least.has_low());
        assert!(!at_least.has_high());
        assert!(at_least.contains(1e9));
        assert!(!at_least.contains(9.99));

        let at_most = NumericRange::at_most(10.0).unwrap();
        assert!(at_most.contains(-1e9));
        assert!(!at_most.contains(10.01));
    }

    #[test]
    fn test_overlaps_touching_boundary() {
        let a = NumericRange::new(1.0, 5.0).unwrap();
        let b = NumericRange::new(5.0, 9.0).unwrap();
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));

        let c = NumericRange::new(5.01, 9.0).unwrap();
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_contains_range() {
        let outer = NumericRange::new(0, 100).unwrap();
        let inner = NumericRange::new(10, 20).unwrap();
        assert!(outer.contains_range(&inner));
        assert!(!inner.contains_range(&outer));
        assert!(outer.overlaps(&inner));
    }

    #[test]
    fn test_parse_and_display() {
        let range: NumericRange<f64> = "5,30".parse().unwrap();
        assert_eq!(range, NumericRange::new(5.0, 30.0).unwrap());
        assert_eq!(range.to_string(), "5,30");

        let lower_only: NumericRange<f64> = " 12.5 , ".parse().unwrap();
        assert!(lower_only.has_low());
        assert!(!lower_only.has_high());
        assert_eq!(lower_only.to_string(), "12.5,");

        let blank: NumericRange<f64> = ",".parse().unwrap();
        assert!(!blank.has_range_specified());
        assert_eq!(blank.to_string(), ",");
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(matches!(
            "1,2,3".parse::<NumericRange<f64>>(),
            Err(RangeError::Malformed { .. })
        ));
        assert!(matches!(
            "12".parse::<NumericRange<f64>>(),
            Err(RangeError::Malformed { .. })
        ));
        assert!(matches!(
            "abc,5".parse::<NumericRange<f64>>(),
            Err(RangeError::Malformed { .. })
        ));
        assert!(matches!(
            "9,5".parse::<NumericRange<f64>>(),
            Err(RangeError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_span() {
        let range = NumericRange::new(19.99, 29.99).unwrap();
        assert!((range.span() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_serde_keeps_unset_sides_absent() {
        let range = NumericRange::at_least(3_u32).unwrap();
        let json = serde_json::to_string(&range).unwrap();
        assert_eq!(json, r#"{"low":3}"#);

        let back: NumericRange<u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, range);

        let inverted = serde_json::from_str::<NumericRange<u32>>(r#"{"low":9,"high":2}"#);
        assert!(inverted.is_err());
    }

    #[test]
    fn test_serde_missing_sides_are_unbounded() {
        let capped: NumericRange<f64> = serde_json::from_str(r#"{"high":25.0}"#).unwrap();
        assert_eq!(capped, NumericRange::at_most(25.0).unwrap());

        let open: NumericRange<i64> = serde_json::from_str("{}").unwrap();
        assert_eq!(open, NumericRange::unbounded());
    }

    proptest! {
        #[test]
        fn prop_contains_own_bounds(a in -1.0e6..1.0e6_f64, b in -1.0e6..1.0e6_f64) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let range = NumericRange::new(low, high).unwrap();
            prop_assert!(range.contains(low));
            prop_assert!(range.contains(high));
            prop_assert!(!range.contains(low - 1.0));
            prop_assert!(!range.contains(high + 1.0));
        }

        #[test]
        fn prop_overlaps_is_symmetric(
            a in any::<i64>(), b in any::<i64>(), c in any::<i64>(), d in any::<i64>()
        ) {
            let x = NumericRange::new(a.min(b), a.max(b)).unwrap();
            let y = NumericRange::new(c.min(d), c.max(d)).unwrap();
            prop_assert_eq!(x.overlaps(&y), y.overlaps(&x));
        }

        #[test]
        fn prop_subset_implies_overlap(lo in 0_u32..1000, width in 0_u32..1000, inset in 0_u32..500) {
            let outer = NumericRange::new(lo, lo + width).unwrap();
            let inner_low = (lo + inset).min(lo + width);
            let inner = NumericRange::new(inner_low, lo + width).unwrap();
            prop_assert!(outer.contains_range(&inner));
            prop_assert!(outer.overlaps(&inner));
        }
    }
}
