//! Text canonicalization.
//!
//! Extracted text carries noise that has nothing to do with authorship:
//! case, punctuation, stray OCR symbols, PDF line-break spacing. [`normalize`]
//! strips all of it so that downstream comparison sees only `[a-z0-9 ]`.
//!
//! # Example
//!
//! ```rust
//! use copycat_core::normalize::normalize;
//!
//! assert_eq!(normalize("  The Quick,\n\tBrown FOX!! "), "the quick brown fox");
//! ```

/// Canonicalize `raw` text.
///
/// 1. Lowercase.
/// 2. Replace every character outside `[a-z0-9 ]` with a space.
/// 3. Collapse runs of spaces into one.
/// 4. Trim.
///
/// The function is total and idempotent.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }

    out
}

/// Number of characters in already-normalized text.
///
/// Normalized text is pure ASCII, so this equals its byte length.
pub fn normalized_len(text: &str) -> usize {
    text.len()
}
