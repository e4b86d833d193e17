//! Free-text trip queries such as `"ja ela to kandy"`.

use regex::Regex;
use std::sync::LazyLock;

use crate::direction::RouteQuery;

/// `<place> to <place>`, split on the first standalone `to`.
static TRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(.+?)\s+to\s+(.+?)\s*$").expect("valid regex"));

/// Parses a free-text query of the form `"<from> to <to>"`.
///
/// Returns `None` when the query doesn't have that shape or either side is
/// blank.
#[must_use]
pub fn parse_trip(query: &str) -> Option<RouteQuery> {
    let captures = TRIP_RE.captures(query)?;
    let from = captures.get(1)?.as_str().trim();
    let to = captures.get(2)?.as_str().trim();
    if from.is_empty() || to.is_empty() {
        return None;
    }
    Some(RouteQuery::new(from, to))
}
