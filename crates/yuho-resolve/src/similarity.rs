//! Similarity scoring between company names.

use crate::normalize::normalize_company_name;

/// Similarity of two already-normalized names in `[0, 1]`.
///
/// Normalized Levenshtein over characters: `1 - distance / longer length`.
/// Empty input scores 0 so that a name with nothing left after
/// normalization never matches anything.
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(a, b).clamp(0.0, 1.0)
}

/// Similarity of two raw company names.
///
/// # Examples
///
/// ```
/// use yuho_resolve::similarity::name_similarity;
///
/// assert_eq!(name_similarity("Acme Data", "ACME DATA Corporation"), 1.0);
/// assert!(name_similarity("Acme Data", "Nonexistent Corp") < 0.5);
/// ```
pub fn name_similarity(a: &str, b: &str) -> f64 {
    normalized_similarity(&normalize_company_name(a), &normalize_company_name(b))
}
