//! Result rows: one per requested company name.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use yuho_extract::ExtractedIndicators;
use yuho_registry::{DocumentId, DocumentMetadata, RegistryError};
use yuho_resolve::{CandidateFiler, ResolutionResult};

/// Why a company has no extracted indicators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// No filer cleared the similarity threshold
    Unmatched,
    /// Filer resolved but has no eligible annual report in the range
    NoAnnualReportFound,
    /// The selected report was filed without XBRL
    MissingXbrl,
    /// Payload could not be parsed into facts
    MalformedReport(String),
    /// Network failure or timeout after all retries
    Transient(String),
    /// Still rate limited after all retries
    RateLimited(String),
    /// Daily call budget spent before this company was fetched
    BudgetExhausted,
    /// Document disappeared from the registry
    NotFound(String),
    /// Batch stopped before or while processing this company
    Aborted(String),
}

impl FailureReason {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unmatched => "unmatched",
            Self::NoAnnualReportFound => "no_annual_report_found",
            Self::MissingXbrl => "missing_xbrl",
            Self::MalformedReport(_) => "malformed_report",
            Self::Transient(_) => "transient",
            Self::RateLimited(_) => "rate_limited",
            Self::BudgetExhausted => "budget_exhausted",
            Self::NotFound(_) => "not_found",
            Self::Aborted(_) => "aborted",
        }
    }

    /// Free-text detail, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::MalformedReport(detail)
            | Self::Transient(detail)
            | Self::RateLimited(detail)
            | Self::NotFound(detail)
            | Self::Aborted(detail) => Some(detail),
            Self::Unmatched | Self::NoAnnualReportFound | Self::MissingXbrl | Self::BudgetExhausted => {
                None
            }
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}: {detail}", self.code()),
            None => f.write_str(self.code()),
        }
    }
}

impl From<RegistryError> for FailureReason {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::XbrlParse(msg) | RegistryError::Archive(msg) => {
                Self::MalformedReport(msg)
            }
            RegistryError::Transient(msg) => Self::Transient(msg),
            RegistryError::RateLimited { .. } => Self::RateLimited(err.to_string()),
            RegistryError::BudgetExhausted { .. } => Self::BudgetExhausted,
            RegistryError::NotFound(msg) => Self::NotFound(msg),
            RegistryError::Api { .. } | RegistryError::Parse(_) => Self::Transient(err.to_string()),
            RegistryError::Unauthorized(_)
            | RegistryError::Configuration(_)
            | RegistryError::InvalidDateRange { .. } => Self::Aborted(err.to_string()),
        }
    }
}

/// The document a row's indicators were taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// EDINET document id
    pub document_id: DocumentId,
    /// Document title as listed
    pub description: String,
    /// Submission date
    pub submission_date: NaiveDate,
}

impl From<&DocumentMetadata> for DocumentSummary {
    fn from(document: &DocumentMetadata) -> Self {
        Self {
            document_id: document.document_id.clone(),
            description: document.description.clone(),
            submission_date: document.submission_date,
        }
    }
}

/// Either the extracted indicators or the reason there are none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOutcome {
    /// One entry per configured indicator
    Extracted(ExtractedIndicators),
    /// Named failure
    Failed(FailureReason),
}

/// Final result for one requested company name.
///
/// Built only through the constructors below and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    query_name: String,
    filer: Option<CandidateFiler>,
    similarity: f64,
    document: Option<DocumentSummary>,
    outcome: RowOutcome,
}

impl ResultRow {
    /// Row for a name that matched no filer.
    pub fn unmatched(resolution: &ResolutionResult) -> Self {
        Self {
            query_name: resolution.query_name.clone(),
            filer: None,
            similarity: resolution.similarity_score,
            document: None,
            outcome: RowOutcome::Failed(FailureReason::Unmatched),
        }
    }

    /// Row for a company whose indicators were extracted from `document`.
    pub fn extracted(
        resolution: &ResolutionResult,
        document: &DocumentMetadata,
        indicators: ExtractedIndicators,
    ) -> Self {
        Self {
            query_name: resolution.query_name.clone(),
            filer: resolution.matched_filer().cloned(),
            similarity: resolution.similarity_score,
            document: Some(document.into()),
            outcome: RowOutcome::Extracted(indicators),
        }
    }

    /// Row for a company that failed after resolution.
    ///
    /// `document` is the selected report when the failure happened after
    /// selection.
    pub fn failed(
        resolution: &ResolutionResult,
        document: Option<&DocumentMetadata>,
        reason: FailureReason,
    ) -> Self {
        Self {
            query_name: resolution.query_name.clone(),
            filer: resolution.matched_filer().cloned(),
            similarity: resolution.similarity_score,
            document: document.map(DocumentSummary::from),
            outcome: RowOutcome::Failed(reason),
        }
    }

    /// Name as requested.
    pub fn query_name(&self) -> &str {
        &self.query_name
    }

    /// Matched filer, if any.
    pub const fn filer(&self) -> Option<&CandidateFiler> {
        self.filer.as_ref()
    }

    /// Similarity of the best candidate.
    pub const fn similarity(&self) -> f64 {
        self.similarity
    }

    /// Selected document, if any.
    pub const fn document(&self) -> Option<&DocumentSummary> {
        self.document.as_ref()
    }

    /// Outcome.
    pub const fn outcome(&self) -> &RowOutcome {
        &self.outcome
    }

    /// Extracted indicators, if successful.
    pub const fn indicators(&self) -> Option<&ExtractedIndicators> {
        match &self.outcome {
            RowOutcome::Extracted(indicators) => Some(indicators),
            RowOutcome::Failed(_) => None,
        }
    }

    /// Failure reason, if failed.
    pub const fn failure(&self) -> Option<&FailureReason> {
        match &self.outcome {
            RowOutcome::Extracted(_) => None,
            RowOutcome::Failed(reason) => Some(reason),
        }
    }

    /// Whether indicators were extracted.
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, RowOutcome::Extracted(_))
    }

    /// `ok` or the failure code.
    pub const fn status(&self) -> &'static str {
        match &self.outcome {
            RowOutcome::Extracted(_) => "ok",
            RowOutcome::Failed(reason) => reason.code(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_extracted_row() {
        let row = extracted_row();
        assert!(row.is_success());
        assert_eq!(row.status(), "ok");
        assert_eq!(row.filer().unwrap().filer_id.as_str(), "E00001");
        assert_eq!(row.document().unwrap().document_id.as_str(), "S100AAAA");
        assert_eq!(row.indicators().unwrap().len(), 2);
        assert!(row.failure().is_none());
    }

    #[test]
    fn test_unmatched_row() {
        let row = unmatched_row();
        assert!(!row.is_success());
        assert_eq!(row.failure(), Some(&FailureReason::Unmatched));
        assert!(row.filer().is_none());
        assert!(row.document().is_none());
    }

    #[rstest]
    #[case(RegistryError::XbrlParse("bad".into()), "malformed_report")]
    #[case(RegistryError::Archive("bad".into()), "malformed_report")]
    #[case(RegistryError::Transient("timeout".into()), "transient")]
    #[case(RegistryError::RateLimited { retry_after_ms: 0 }, "rate_limited")]
    #[case(RegistryError::BudgetExhausted { limit: 5 }, "budget_exhausted")]
    #[case(RegistryError::NotFound("S100".into()), "not_found")]
    #[case(RegistryError::Unauthorized("key".into()), "aborted")]
    fn test_failure_from_registry_error(#[case] err: RegistryError, #[case] code: &str) {
        assert_eq!(FailureReason::from(err).code(), code);
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(FailureReason::Unmatched.to_string(), "unmatched");
        assert_eq!(
            FailureReason::Transient("timed out".into()).to_string(),
            "transient: timed out"
        );
    }
}
