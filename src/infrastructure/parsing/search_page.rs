//! Page-level extraction: visible result count and per-listing fragments

use once_cell::sync::Lazy;
use regex::Regex;

use super::numbers::parse_numbers;
use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};

/// Header section holding the "N results" or "X - Y of Z results" text.
static RESULT_COUNT_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)id="resultCount"(.*?) id="#).expect("valid result count pattern"));

/// Each listing starts at a `result_<n>` marker.
static RESULT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"result_[0-9]?[0-9]").expect("valid result marker pattern"));

static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*(?:>|$)").expect("valid markup pattern"));

const NO_RESULTS_PHRASE: &str = "did not match any products";

/// Number of listings shown on this page.
///
/// Accepts a single count (`"16 Results"`), a window (`"17 - 32 of 65,130"`,
/// giving `32 - (17 - 1)`), or the "no results" phrase. Anything else is 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn result_count(html: &str) -> usize {
    let Some(section) = RESULT_COUNT_SECTION
        .captures(html)
        .and_then(|captures| captures.get(1))
        .map(|section| section.as_str())
    else {
        return 0;
    };

    if section.contains(NO_RESULTS_PHRASE) {
        return 0;
    }

    // The capture starts inside the header tag; tag names like `h2` would scan as numbers.
    let section = section.split_once('>').map_or(section, |(_, rest)| rest);
    let text = MARKUP.replace_all(section, " ");

    // The hyphen in "17-32" scans as a sign, hence the absolute values.
    let count = match parse_numbers(&text, Some(2)).as_slice() {
        [single] => single.abs(),
        [first, last] => last.abs() - (first.abs() - 1.0),
        _ => 0.0,
    };

    if count.is_finite() && count > 0.0 {
        count as usize
    } else {
        0
    }
}

/// Splits a results page into exactly `count` listing fragments.
///
/// A fragment is the text between two consecutive result markers; the last
/// one runs to the end of the document. Pages
/// append hidden cached listings after the visible ones, so only the first
/// `count` fragments in document order are returned.
pub fn split_fragments(html: &str, count: usize) -> ParsingResult<Vec<&str>> {
    let markers: Vec<_> = RESULT_MARKER.find_iter(html).collect();
    let fragments: Vec<&str> = markers
        .iter()
        .enumerate()
        .map(|(i, marker)| {
            let end = markers.get(i + 1).map_or(html.len(), |next| next.start());
            &html[marker.end()..end]
        })
        .collect();

    if fragments.len() < count {
        return Err(ParsingError::FragmentCountMismatch {
            expected: count,
            found: fragments.len(),
        });
    }

    Ok(fragments.into_iter().take(count).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn header(text: &str) -> String {
        format!(r#"<h2 id="resultCount" class="resultCount"><span>{text}</span></h2><div id="atfResults">"#)
    }

    #[rstest]
    #[case("Showing 17 - 32 of 65,130 Results", 16)]
    #[case("Showing 1-16 of 2,000 Results", 16)]
    #[case("12 Results", 12)]
    #[case("Your search did not match any products.", 0)]
    #[case("Results", 0)]
    fn test_result_count_formats(#[case] text: &str, #[case] expected: usize) {
        assert_eq!(result_count(&header(text)), expected);
    }

    #[test]
    fn test_result_count_missing_header() {
        assert_eq!(result_count("<html><body>nothing</body></html>"), 0);
    }

    #[test]
    fn test_split_fragments_discards_cached_listings() {
        let html = concat!(
            r#"<li id="result_0">first</li>"#,
            r#"<li id="result_1">second</li>"#,
            r#"<li id="result_2">cached</li>"#,
            r#"<li id="result_3">cached</li>"#,
        );
        let fragments = split_fragments(html, 2).unwrap();
        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].contains("first"));
        assert!(fragments[1].contains("second"));
    }

    #[test]
    fn test_split_fragments_reports_short_pages() {
        let html = r#"<li id="result_0">only</li><li id="result_1">"#;
        let err = split_fragments(html, 3).unwrap_err();
        assert_eq!(
            err,
            ParsingError::FragmentCountMismatch {
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_split_fragments_last_listing_runs_to_end() {
        let html = format!(
            "{}{}{}",
            header("Showing 1 - 2 of 2 Results"),
            r#"<li id="result_0">first</li>"#,
            r#"<li id="result_1">second</li></div></body></html>"#,
        );
        let count = result_count(&html);
        assert_eq!(count, 2);

        let fragments = split_fragments(&html, count).unwrap();
        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].contains("first"));
        assert!(fragments[1].contains("second"));
        assert!(!fragments[0].contains("second"));
    }
}
