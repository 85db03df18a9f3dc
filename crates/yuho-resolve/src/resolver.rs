//! Best-match resolution of a query name against registered filers.

use crate::error::{ResolveError, Result};
use crate::normalize::normalize_company_name;
use crate::similarity::normalized_similarity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use yuho_registry::FilerId;

/// Minimum similarity for a match, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(f64);

impl Threshold {
    /// Default minimum similarity.
    pub const DEFAULT: Self = Self(0.5);

    /// Validate a threshold in `[0, 1]`.
    pub fn new(value: f64) -> Result<Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ResolveError::InvalidThreshold(value))
        }
    }

    /// The raw value.
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Whether `score` clears the threshold.
    pub fn accepts(self, score: f64) -> bool {
        score >= self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<f64> for Threshold {
    type Error = ResolveError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Threshold> for f64 {
    fn from(threshold: Threshold) -> Self {
        threshold.0
    }
}

impl FromStr for Threshold {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s
            .trim()
            .parse::<f64>()
            .map_err(|_| ResolveError::InvalidThreshold(f64::NAN))?;
        Self::new(value)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered filer that a query may resolve to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateFiler {
    /// EDINET code
    pub filer_id: FilerId,
    /// Name as registered
    pub registered_name: String,
}

impl CandidateFiler {
    /// Create a candidate.
    pub fn new(filer_id: impl Into<FilerId>, registered_name: impl Into<String>) -> Self {
        Self {
            filer_id: filer_id.into(),
            registered_name: registered_name.into(),
        }
    }
}

/// A candidate together with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    /// The candidate
    pub candidate: CandidateFiler,
    /// Similarity in `[0, 1]`
    pub score: f64,
}

/// Outcome of resolving one query name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Name as supplied
    pub query_name: String,
    /// Highest-scoring candidate, kept even when below the threshold
    pub best: Option<ScoredCandidate>,
    /// Score of `best`, 0 when there are no candidates
    pub similarity_score: f64,
    /// Whether `similarity_score` clears the threshold
    pub matched: bool,
}

impl ResolutionResult {
    /// The matched filer, if the best candidate cleared the threshold.
    pub fn matched_filer(&self) -> Option<&CandidateFiler> {
        self.best
            .as_ref()
            .filter(|_| self.matched)
            .map(|scored| &scored.candidate)
    }
}

/// Resolver over a fixed candidate list, normalizing each candidate once.
#[derive(Debug, Clone, Default)]
pub struct NameResolver {
    candidates: Vec<(CandidateFiler, String)>,
}

impl NameResolver {
    /// Build a resolver. Candidate order is significant for tie-breaking.
    pub fn new(candidates: impl IntoIterator<Item = CandidateFiler>) -> Self {
        let candidates = candidates
            .into_iter()
            .map(|candidate| {
                let normalized = normalize_company_name(&candidate.registered_name);
                (candidate, normalized)
            })
            .collect();
        Self { candidates }
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether there are no candidates.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidates in resolution order.
    pub fn candidates(&self) -> impl Iterator<Item = &CandidateFiler> {
        self.candidates.iter().map(|(candidate, _)| candidate)
    }

    /// Resolve `query_name` to the best-scoring candidate.
    ///
    /// Only a strictly higher score replaces the current best, so among equal
    /// scores the earliest candidate wins.
    pub fn resolve(&self, query_name: &str, threshold: Threshold) -> ResolutionResult {
        let query = normalize_company_name(query_name);

        let mut best: Option<(&CandidateFiler, f64)> = None;
        for (candidate, normalized) in &self.candidates {
            let score = normalized_similarity(&query, normalized);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((candidate, score));
            }
        }

        let similarity_score = best.map_or(0.0, |(_, score)| score);
        ResolutionResult {
            query_name: query_name.to_string(),
            best: best.map(|(candidate, score)| ScoredCandidate {
                candidate: candidate.clone(),
                score,
            }),
            similarity_score,
            matched: best.is_some() && threshold.accepts(similarity_score),
        }
    }
}

/// Resolve a single name against `candidates`.
///
/// Equivalent to `NameResolver::new(candidates).resolve(query_name, threshold)`.
pub fn resolve(
    query_name: &str,
    candidates: &[CandidateFiler],
    threshold: Threshold,
) -> ResolutionResult {
    NameResolver::new(candidates.iter().cloned()).resolve(query_name, threshold)
}
