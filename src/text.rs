//! Case and accent folding for text filters.
//!
//! Search and platform filters compare folded strings: the input is
//! decomposed (NFD), combining marks are dropped and the rest is lowercased,
//! so "Canción" and "CANCION" fold to the same key.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Folds `input` to its case- and accent-insensitive comparison key.
#[must_use]
pub fn fold(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// True if `folded_needle` occurs in `haystack` once folded.
///
/// The needle must already be folded; callers fold it once per query.
pub fn contains_folded(haystack: &str, folded_needle: &str) -> bool {
    fold(haystack).contains(folded_needle)
}
