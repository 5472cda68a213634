//! Token-set similarity between event names.

use std::collections::HashSet;

use crate::normalize::{normalize_name, normalize_name_joined};

/// Similarity of two event names in `[0, 1]`.
///
/// Jaccard index over the whitespace tokens of the normalized names. Names
/// are compared twice, once with word-joining hyphens read as a break
/// ("non farm") and once with them dropped ("nonfarm"); the higher score
/// wins. Both comparisons are symmetric, so the result is too.
///
/// A name with no tokens left after normalization (blank, or only ™/®/©
/// glyphs) scores 0 against everything, itself included, so it can never
/// be matched.
pub fn similarity(a: &str, b: &str) -> f64 {
    let spaced = jaccard(&normalize_name(a), &normalize_name(b));
    let joined = jaccard(&normalize_name_joined(a), &normalize_name_joined(b));
    spaced.max(joined)
}

/// Jaccard index of the whitespace token sets of two already-normalized names.
/// Zero when both are empty.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let a: HashSet<&str> = a.split_whitespace().collect();
    let b: HashSet<&str> = b.split_whitespace().collect();

    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }

    let intersection = a.intersection(&b).count();
    intersection as f64 / union as f64
}
