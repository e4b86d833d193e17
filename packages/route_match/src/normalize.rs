//! Place-name normalization for route matching.
//!
//! Applied symmetrically to stored endpoints and search terms so that
//! "Colombo Fort", "colombo  central" and "Colombo" compare equal.

use regex::Regex;
use std::sync::LazyLock;

/// Generic suffix words that don't distinguish one place from another.
///
/// Matched as substrings after whitespace has been removed, so `bus stand`
/// is listed in its collapsed form.
static GENERIC_WORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"fort|central|main|busstand|station").expect("valid regex"));

/// Normalizes a place name.
///
/// The pipeline:
/// 1. Lowercase
/// 2. Remove all whitespace
/// 3. Remove `fort`, `central`, `main`, `busstand`, `station`
#[must_use]
pub fn normalize_location(input: &str) -> String {
    let compact: String = input
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    GENERIC_WORDS_RE.replace_all(&compact, "").into_owned()
}
