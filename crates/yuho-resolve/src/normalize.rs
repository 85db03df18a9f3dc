//! Company name normalization.
//!
//! Registered names and user input differ in width, case, punctuation and the
//! legal form they spell out. Normalization folds those differences away:
//! - Unicode NFKC (full-width to half-width, `㈱` to `(株)`)
//! - Japanese legal-form affixes removed (`株式会社`, `(株)`, ...)
//! - lowercase
//! - English legal-form tokens removed from either end (`Co.`, `Ltd.`, ...)
//! - whitespace and punctuation removed, hyphenated words joined

use unicode_normalization::UnicodeNormalization;

/// Japanese legal forms, removed wherever they appear (after NFKC).
const JAPANESE_LEGAL_FORMS: &[&str] = &[
    "株式会社",
    "有限会社",
    "合同会社",
    "合資会社",
    "合名会社",
    "(株)",
    "(有)",
    "(同)",
];

/// English and romanized legal-form tokens.
const LEGAL_SUFFIXES: &[&str] = &[
    "co",
    "ltd",
    "inc",
    "corp",
    "corporation",
    "company",
    "limited",
    "kk",
    "kabushiki",
    "kaisha",
    "plc",
    "llc",
    "gk",
];

/// Normalize a company name for similarity scoring.
///
/// # Examples
///
/// ```
/// use yuho_resolve::normalize::normalize_company_name;
///
/// assert_eq!(normalize_company_name("Acme Data Corporation"), "acmedata");
/// assert_eq!(normalize_company_name("ＡＣＭＥ　ＤＡＴＡ"), "acmedata");
/// assert_eq!(normalize_company_name("トヨタ自動車株式会社"), "トヨタ自動車");
/// assert_eq!(normalize_company_name("㈱ソニー"), "ソニー");
/// ```
pub fn normalize_company_name(name: &str) -> String {
    tokenize(name).concat()
}

/// Split a name into normalized tokens, leading and trailing legal forms removed.
///
/// Hyphens join rather than split, so "Co-op" is one token. Legal forms
/// between other words are kept. A name made only of legal forms keeps them,
/// so that "Company Limited" does not normalize to nothing.
pub fn tokenize(name: &str) -> Vec<String> {
    let mut folded: String = name.nfkc().collect();
    for form in JAPANESE_LEGAL_FORMS {
        if folded.contains(form) {
            folded = folded.replace(form, " ");
        }
    }

    let mut tokens: Vec<String> = folded
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .map(|word| word.replace('-', ""))
        .filter(|token| !token.is_empty())
        .collect();

    let first = tokens.iter().position(|token| !is_legal_suffix(token));
    let last = tokens.iter().rposition(|token| !is_legal_suffix(token));
    match (first, last) {
        (Some(first), Some(last)) => tokens.drain(first..=last).collect(),
        _ => tokens,
    }
}

fn is_legal_suffix(token: &str) -> bool {
    LEGAL_SUFFIXES.contains(&token)
}
