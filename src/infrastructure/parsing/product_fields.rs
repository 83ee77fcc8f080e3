//! Field extraction from a single listing fragment
//!
//! Every function looks at the fragment independently, so one missing or
//! malformed field never stops the others from being read.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use url::Url;

use super::numbers::parse_numbers;
use crate::domain::NumericRange;
use crate::infrastructure::parsing_error::ParsingResult;

static NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)access-title[^>]*>(.*?)</").expect("valid name pattern"));

static PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r">\$(\d{1,3}(?:,\d{3})*)\.(\d{2})(?:\s+-\s+\$(\d{1,3}(?:,\d{3})*)\.(\d{2}))?<")
        .expect("valid price pattern")
});

static PRODUCT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)name="(.*?)">"#).expect("valid product id pattern"));

static PRODUCT_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href="([^"]*?/dp/[^/"?#\s]+)"#).expect("valid product link pattern"));

static FREE_SHIPPING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)FREE.*?Shipping").expect("valid shipping pattern"));

static STRICT_PRIME_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"bbopJS.initialize\(1,").expect("valid eligibility pattern"));

static IMAGE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://(?:[^/\s"'<>]+/)+[^/\s"'<>]+\.(?:jpg|gif|png)"#)
        .expect("valid image pattern")
});

/// Product title with HTML entities decoded. `None` marks non-product filler.
pub fn product_name(fragment: &str) -> Option<String> {
    let raw = NAME.captures(fragment)?.get(1)?.as_str();
    let decoded: String = Html::parse_fragment(raw).root_element().text().collect();
    let name = decoded.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Advertised price: a single amount becomes `[p, p]`, a `$a - $b` pair
/// becomes `[a, b]`, and no price at all is the unconstrained range.
pub fn price_range(fragment: &str) -> ParsingResult<NumericRange<f64>> {
    let Some(found) = PRICE.find(fragment) else {
        return Ok(NumericRange::unbounded());
    };

    match parse_numbers(found.as_str(), Some(2)).as_slice() {
        [single] => Ok(NumericRange::single(*single)),
        [low, high] => Ok(NumericRange::new(*low, *high)?),
        _ => Ok(NumericRange::unbounded()),
    }
}

/// Listing identifier used to look up the review histogram.
pub fn product_id(fragment: &str) -> Option<String> {
    let raw = PRODUCT_ID.captures(fragment)?.get(1)?.as_str();
    let id = raw.split('"').next().unwrap_or_default().trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// Canonical product page, cut right after the `/dp/<id>` segment.
///
/// Relative and scheme-less links are resolved against `base`.
pub fn canonical_url(fragment: &str, base: &Url) -> Option<Url> {
    let href = PRODUCT_LINK.captures(fragment)?.get(1)?.as_str();
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Cheap eligibility guess from the listing's shipping text.
pub fn fuzzy_prime_eligibility(fragment: &str) -> bool {
    FREE_SHIPPING.is_match(fragment)
}

/// Definitive eligibility marker on the product page itself.
pub fn strict_prime_marker(product_page: &str) -> bool {
    STRICT_PRIME_MARKER.is_match(product_page)
}

/// First absolute jpg/gif/png URL; anything unparseable counts as no image.
pub fn thumbnail_url(fragment: &str) -> Option<Url> {
    IMAGE_URL
        .find(fragment)
        .and_then(|found| Url::parse(found.as_str()).ok())
}
