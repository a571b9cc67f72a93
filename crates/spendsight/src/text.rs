//! Text normalization helpers for OCR-derived fields.
//!
//! Vendor names and amounts come back from document analysis with
//! irregular whitespace, embedded newlines, and the occasional
//! non-numeric value. These helpers are the single place such fields are
//! cleaned up before they are used as grouping keys or shown to a user.

/// Collapses every whitespace run (spaces, newlines, tabs) to a single
/// space and trims both ends.
///
/// Vendor names are grouped and displayed by this normalized form, so two
/// names differing only in whitespace map to the same key.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates `s` to at most `max` characters, replacing the tail with
/// `...` when it is longer.
///
/// Counts characters rather than bytes so a multibyte vendor name cannot
/// be cut mid-codepoint.
pub fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let head: String = s.chars().take(keep).collect();
    format!("{}...", head)
}

/// Parses a decimal-as-string field (e.g. `"12.50"`) into a float.
///
/// Returns `None` instead of an error so call sites can make the
/// skip-this-data-point decision explicitly.
pub fn parse_decimal(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}
