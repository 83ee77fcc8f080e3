//! Numeric token scanning for free-form listing text

use once_cell::sync::Lazy;
use regex::Regex;

/// Signed or unsigned, integer or decimal, with optional thousands grouping.
static NUMBER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d*)?|-?\.\d+").expect("valid number pattern")
});

/// Returns the numbers found in `text` in document order.
///
/// Grouping commas are dropped before parsing. Tokens that still fail to
/// parse are skipped. `limit` caps how many values are returned.
pub fn parse_numbers(text: &str, limit: Option<usize>) -> Vec<f64> {
    let values = NUMBER_PATTERN
        .find_iter(text)
        .filter_map(|token| token.as_str().replace(',', "").parse::<f64>().ok());

    match limit {
        Some(limit) => values.take(limit).collect(),
        None => values.collect(),
    }
}

/// Parses an integer count such as `"1,234"`; `None` when it isn't one.
pub fn parse_count(text: &str) -> Option<u32> {
    text.trim().replace(',', "").parse().ok()
}
