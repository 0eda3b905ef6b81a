// WHY: Local, cheap approximation of how much a document changed since the last
// scan. Only gates rescans; never shown to the user as an originality score.

use std::collections::HashSet;

/// Lower-cased whitespace-separated token set
fn token_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Jaccard index of the two token sets as a rounded percentage in `0..=100`.
///
/// Returns `0` when both texts contain no tokens.
///
/// # Example
/// ```
/// use originality_scan::similarity::estimate_similarity;
/// assert_eq!(estimate_similarity("a b c d", "a b c e"), 60);
/// ```
pub fn estimate_similarity(a: &str, b: &str) -> u8 {
    let set_a = token_set(a);
    let set_b = token_set(b);

    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0;
    }
    let intersection = set_a.intersection(&set_b).count();

    // intersection <= union, so the result always fits in 0..=100
    ((intersection as f64 / union as f64) * 100.0).round() as u8
}
