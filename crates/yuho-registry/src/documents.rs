//! EDINET document metadata and annual report selection.
//!
//! This module provides:
//! - Identifier newtypes for filers (EDINET codes) and documents (docIDs)
//! - Document type classification from EDINET `docTypeCode` values
//! - Conversion of the raw `documents.json` listing into [`DocumentMetadata`]
//! - Selection of a filer's most recent annual securities report

use crate::error::{RegistryError, Result};
use chrono::{Days, NaiveDate};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// EDINET code identifying a filer (e.g. `E02144`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilerId(String);

impl FilerId {
    /// Wrap an EDINET code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FilerId {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// EDINET document identifier (e.g. `S100ABCD`).
///
/// docIDs are issued monotonically, so the lexicographic order doubles as a
/// recency proxy when two documents share a submission date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap a docID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Document category, from the EDINET `docTypeCode`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    /// 有価証券報告書 (`120`)
    AnnualSecuritiesReport,
    /// 訂正有価証券報告書 (`130`)
    AmendedAnnualSecuritiesReport,
    /// 四半期報告書 (`140`)
    QuarterlyReport,
    /// 半期報告書 (`160`)
    SemiAnnualReport,
    /// 臨時報告書 (`180`)
    ExtraordinaryReport,
    /// Any other code
    Other(String),
}

impl DocumentType {
    /// Convert a `docTypeCode` to a document type.
    pub fn from_code(code: &str) -> Self {
        match code {
            "120" => Self::AnnualSecuritiesReport,
            "130" => Self::AmendedAnnualSecuritiesReport,
            "140" => Self::QuarterlyReport,
            "160" => Self::SemiAnnualReport,
            "180" => Self::ExtraordinaryReport,
            other => Self::Other(other.to_string()),
        }
    }

    /// The `docTypeCode` for this type.
    pub fn code(&self) -> &str {
        match self {
            Self::AnnualSecuritiesReport => "120",
            Self::AmendedAnnualSecuritiesReport => "130",
            Self::QuarterlyReport => "140",
            Self::SemiAnnualReport => "160",
            Self::ExtraordinaryReport => "180",
            Self::Other(code) => code,
        }
    }

    /// Returns true for the only type eligible for indicator extraction.
    pub const fn is_annual_securities_report(&self) -> bool {
        matches!(self, Self::AnnualSecuritiesReport)
    }
}

/// Metadata for one submitted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Document identifier
    pub document_id: DocumentId,
    /// Filer that submitted the document
    pub filer_id: FilerId,
    /// Filer name as registered
    pub registered_name: String,
    /// Free-text description (e.g. "有価証券報告書－第120期")
    pub description: String,
    /// Document category
    pub document_type: DocumentType,
    /// Submission date
    pub submission_date: NaiveDate,
    /// Whether the document carries XBRL data
    pub has_xbrl: bool,
    /// Whether the document was withdrawn after submission
    pub withdrawn: bool,
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(RegistryError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// The `days` calendar days ending at `end` (inclusive).
    pub fn ending_at(end: NaiveDate, days: u32) -> Result<Self> {
        let span = u64::from(days.max(1) - 1);
        let start = end.checked_sub_days(Days::new(span)).ok_or_else(|| {
            RegistryError::InvalidDateRange {
                start: format!("{end} - {span} days"),
                end: end.to_string(),
            }
        })?;
        Self::new(start, end)
    }

    /// First day of the range.
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the range.
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered.
    pub fn len(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    /// A range always covers at least one day.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Whether `day` falls inside the range, both ends included.
    pub fn contains(&self, day: NaiveDate) -> bool {
        (self.start..=self.end).contains(&day)
    }

    /// Iterate the days in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |day| *day <= self.end)
    }
}

/// Errors from document selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// The filer has no eligible annual securities report in the listing
    #[error("No annual securities report found for filer {0}")]
    NoAnnualReportFound(FilerId),
}

/// Pick the filer's most recent annual securities report.
///
/// Candidates are the filer's non-withdrawn documents of type `120`. The latest
/// submission date wins; on equal dates the greatest docID wins. The result does
/// not depend on the order of `documents`.
pub fn select_latest_annual_report<'a>(
    filer_id: &FilerId,
    documents: &'a [DocumentMetadata],
) -> std::result::Result<&'a DocumentMetadata, SelectionError> {
    documents
        .iter()
        .filter(|doc| {
            doc.filer_id == *filer_id
                && doc.document_type.is_annual_securities_report()
                && !doc.withdrawn
        })
        .max_by(|a, b| {
            a.submission_date
                .cmp(&b.submission_date)
                .then_with(|| a.document_id.cmp(&b.document_id))
        })
        .ok_or_else(|| SelectionError::NoAnnualReportFound(filer_id.clone()))
}

// EDINET API v2 listing structure
// Based on: EDINET API specification, `documents.json` with `type=2`

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentListResponse {
    pub(crate) metadata: ListMetadata,
    #[serde(default)]
    pub(crate) results: Vec<DocumentRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListMetadata {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentRecord {
    #[serde(rename = "docID")]
    doc_id: String,
    edinet_code: Option<String>,
    filer_name: Option<String>,
    doc_type_code: Option<String>,
    submit_date_time: Option<String>,
    doc_description: Option<String>,
    #[serde(default)]
    withdrawal_status: Option<String>,
    #[serde(default)]
    xbrl_flag: Option<String>,
}

impl DocumentRecord {
    /// Convert a listing record, skipping records without a filer code.
    pub(crate) fn into_metadata(self) -> Result<Option<DocumentMetadata>> {
        let Some(filer_id) = self.edinet_code.filter(|code| !code.is_empty()) else {
            return Ok(None);
        };
        let Some(submitted) = self.submit_date_time else {
            return Ok(None);
        };

        // "2024-06-25 15:00"
        let date_part = submitted.get(..10).unwrap_or(&submitted);
        let submission_date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| {
            RegistryError::Parse(format!(
                "Invalid submitDateTime {submitted:?} for {}: {e}",
                self.doc_id
            ))
        })?;

        Ok(Some(DocumentMetadata {
            document_id: DocumentId::new(self.doc_id),
            filer_id: FilerId::new(filer_id),
            registered_name: self.filer_name.unwrap_or_default(),
            description: self.doc_description.unwrap_or_default(),
            document_type: DocumentType::from_code(self.doc_type_code.as_deref().unwrap_or("")),
            submission_date,
            has_xbrl: self.xbrl_flag.as_deref() == Some("1"),
            withdrawn: self.withdrawal_status.as_deref().is_some_and(|s| s != "0"),
        }))
    }
}

/// Parse a `documents.json` body into metadata records.
pub(crate) fn parse_document_list(json: &str) -> Result<Vec<DocumentMetadata>> {
    let response: DocumentListResponse = serde_json::from_str(json)
        .map_err(|e| RegistryError::Parse(format!("Failed to parse document list: {e}")))?;

    if response.metadata.status != "200" {
        let status = response.metadata.status.parse().unwrap_or(0);
        return Err(RegistryError::from_status(status, response.metadata.message));
    }

    let mut documents = Vec::with_capacity(response.results.len());
    for record in response.results {
        if let Some(doc) = record.into_metadata()? {
            documents.push(doc);
        }
    }
    Ok(documents)
}
