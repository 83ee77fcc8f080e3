//! Domain module - value types, entities and validation rules
//!
//! Everything in here is synchronous and free of I/O so it can be exercised
//! with canned data in tests.

pub mod numeric_range;
pub mod product;
pub mod score_distribution;
pub mod search_criteria;
pub mod validation;

pub use numeric_range::{Bounded, NumericRange, RangeError};
pub use product::{Outcome, ProductRecord};
pub use score_distribution::ScoreDistribution;
pub use search_criteria::{SearchCriteria, SearchCriteriaBuilder};
pub use validation::Rejection;
