//! Lookup identifier extraction and content-id suffix handling.
//!
//! The same identifier appears under two legacy addressing conventions: a
//! project-prefixed key (`TSRC-ABC-123456`) embedded anywhere in the address,
//! and a `docid=` query parameter. The prefixed key is unambiguous and always
//! tried first.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

/// Project-prefixed key: 3-4 letter prefix, free-form segment, 6-digit suffix.
#[allow(clippy::expect_used)]
static PRIMARY_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z]{3,4}-[a-z0-9-]+?-\d{6}\b").expect("primary id regex is valid") // Static pattern, safe to panic
});

/// Legacy `docid=` query parameter.
#[allow(clippy::expect_used)]
static DOCID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)docid=([^&#\s]+)").expect("docid regex is valid") // Static pattern, safe to panic
});

/// Trailing parenthesized 5-6 digit content id, e.g. `Policy (123456)`.
#[allow(clippy::expect_used)]
static CONTENT_ID_SUFFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\((\d{5,6})\)\s*$").expect("content id suffix regex is valid") // Static pattern, safe to panic
});

/// Derives the normalized lookup identifier for an address/anchor pair.
///
/// Returns an empty string when neither addressing convention matches; the
/// caller must treat that record as not eligible for lookup.
///
/// # Examples
///
/// ```
/// use hyperlink_core::identifier::extract_lookup_id;
///
/// assert_eq!(
///     extract_lookup_id("https://docs.example.com/view", "tsrc-abc-123456"),
///     "TSRC-ABC-123456"
/// );
/// assert_eq!(extract_lookup_id("https://x.example.com/?docid=DOC-9&v=1", ""), "DOC-9");
/// assert_eq!(extract_lookup_id("https://x.example.com/", ""), "");
/// ```
#[must_use]
pub fn extract_lookup_id(address: &str, anchor: &str) -> String {
    let target = if anchor.is_empty() {
        address.to_string()
    } else {
        format!("{address}#{anchor}")
    };

    if let Some(found) = PRIMARY_ID_PATTERN.find(&target) {
        trace!(id = found.as_str(), "primary identifier matched");
        return found.as_str().to_uppercase();
    }

    if let Some(captures) = DOCID_PATTERN.captures(&target)
        && let Some(value) = captures.get(1)
    {
        trace!(id = value.as_str(), "docid fallback matched");
        return value.as_str().trim().to_string();
    }

    String::new()
}

/// Returns the digits of a trailing `(12345)` / `(123456)` suffix, if any.
#[must_use]
pub fn content_id_suffix(text: &str) -> Option<&str> {
    CONTENT_ID_SUFFIX_PATTERN
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|digits| digits.as_str())
}

/// Removes a trailing parenthesized content id and trims the result.
#[must_use]
pub fn strip_content_id_suffix(text: &str) -> String {
    CONTENT_ID_SUFFIX_PATTERN
        .replace(text, "")
        .trim()
        .to_string()
}

/// Compares two display titles ignoring case (Unicode-aware) and outer whitespace.
#[must_use]
pub fn titles_match(left: &str, right: &str) -> bool {
    left.trim().to_lowercase() == right.trim().to_lowercase()
}

/// Returns the last `count` characters of `value` (all of it when shorter).
#[must_use]
pub fn last_chars(value: &str, count: usize) -> &str {
    let len = value.chars().count();
    if len <= count {
        return value;
    }
    let skip = len - count;
    value
        .char_indices()
        .nth(skip)
        .map_or(value, |(index, _)| &value[index..])
}
