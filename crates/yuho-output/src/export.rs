//! Export of result rows and the validation report.
//!
//! Both exports support CSV, compact JSON, pretty JSON and a plain-text
//! summary. The results CSV has one value and one unit column per indicator;
//! indicators that were not found hold [`NOT_FOUND`], and failed rows leave
//! indicator cells empty and name the reason in the `status` column.

use crate::row::{ResultRow, RowOutcome};
use crate::summary::{render_results, render_validation};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use yuho_extract::{ContextMatch, IndicatorSpec, IndicatorValue};
use yuho_registry::FilerId;
use yuho_resolve::{ResolutionResult, Threshold};

/// Cell value for an indicator with no fact in the report.
pub const NOT_FOUND: &str = "NOT_FOUND";

/// Byte order mark prepended to CSV files meant for spreadsheet applications.
pub const UTF8_BOM: &str = "\u{feff}";

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Comma-separated values format.
    #[default]
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,

    /// Human-readable summary.
    Text,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
            Self::Text => "txt",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" | "prettyjson" => Ok(Self::PrettyJson),
            "text" | "txt" => Ok(Self::Text),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    /// Export CSV with a UTF-8 byte order mark, for spreadsheet applications.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_spreadsheet_csv(&self, path: &Path) -> Result<(), ExportError> {
        let content = self.export_to_string(ExportFormat::Csv)?;
        let mut file = File::create(path)?;
        file.write_all(UTF8_BOM.as_bytes())?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn csv_to_string(writer: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

/// The result rows of a batch together with the indicator columns.
#[derive(Debug, Clone, Copy)]
pub struct ResultTable<'a> {
    spec: &'a IndicatorSpec,
    rows: &'a [ResultRow],
}

impl<'a> ResultTable<'a> {
    /// Table over `rows`, with one column pair per indicator of `spec`.
    pub const fn new(spec: &'a IndicatorSpec, rows: &'a [ResultRow]) -> Self {
        Self { spec, rows }
    }

    /// Indicator spec defining the columns.
    pub const fn spec(&self) -> &'a IndicatorSpec {
        self.spec
    }

    /// Rows in input order.
    pub const fn rows(&self) -> &'a [ResultRow] {
        self.rows
    }

    fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = [
            "query_name",
            "status",
            "detail",
            "filer_id",
            "registered_name",
            "similarity",
            "document_id",
            "description",
            "submission_date",
            "fallback_indicators",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        for name in self.spec.names() {
            header.push(name.to_string());
            header.push(format!("{name}_unit"));
        }
        header
    }

    fn record(&self, row: &ResultRow) -> Vec<String> {
        let filer = row.filer();
        let document = row.document();
        let fallbacks = row
            .indicators()
            .map(|indicators| {
                indicators
                    .iter()
                    .filter(|fact| {
                        matches!(
                            fact.value,
                            IndicatorValue::Found {
                                context_match: ContextMatch::Fallback,
                                ..
                            }
                        )
                    })
                    .map(|fact| fact.indicator.as_str())
                    .collect::<Vec<_>>()
                    .join(";")
            })
            .unwrap_or_default();

        let mut record = vec![
            row.query_name().to_string(),
            row.status().to_string(),
            row.failure()
                .and_then(|reason| reason.detail())
                .unwrap_or_default()
                .to_string(),
            filer.map(|f| f.filer_id.to_string()).unwrap_or_default(),
            filer.map(|f| f.registered_name.clone()).unwrap_or_default(),
            format!("{:.4}", row.similarity()),
            document
                .map(|d| d.document_id.to_string())
                .unwrap_or_default(),
            document.map(|d| d.description.clone()).unwrap_or_default(),
            document
                .map(|d| d.submission_date.to_string())
                .unwrap_or_default(),
            fallbacks,
        ];

        for name in self.spec.names() {
            let (value, unit) = match row.outcome() {
                RowOutcome::Failed(_) => (String::new(), String::new()),
                RowOutcome::Extracted(indicators) => match indicators.get(name) {
                    Some(IndicatorValue::Found { value, unit, .. }) => {
                        (value.to_string(), unit.clone().unwrap_or_default())
                    }
                    Some(IndicatorValue::NotFound) | None => {
                        (NOT_FOUND.to_string(), String::new())
                    }
                },
            };
            record.push(value);
            record.push(unit);
        }
        record
    }
}

impl Exporter for ResultTable<'_> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                wtr.write_record(self.header())?;
                for row in self.rows {
                    wtr.write_record(self.record(row))?;
                }
                csv_to_string(wtr)
            }
            ExportFormat::Json => Ok(serde_json::to_string(self.rows)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self.rows)?),
            ExportFormat::Text => Ok(render_results(self)),
        }
    }
}

/// Resolution diagnostics for one requested name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationEntry {
    /// Name as requested
    pub query_name: String,
    /// Whether the best candidate cleared the threshold
    pub matched: bool,
    /// Similarity of the best candidate
    pub similarity: f64,
    /// Best candidate's EDINET code, matched or not
    pub best_filer_id: Option<FilerId>,
    /// Best candidate's registered name, matched or not
    pub best_registered_name: Option<String>,
}

impl From<&ResolutionResult> for ValidationEntry {
    fn from(resolution: &ResolutionResult) -> Self {
        let best = resolution.best.as_ref().map(|scored| &scored.candidate);
        Self {
            query_name: resolution.query_name.clone(),
            matched: resolution.matched,
            similarity: resolution.similarity_score,
            best_filer_id: best.map(|c| c.filer_id.clone()),
            best_registered_name: best.map(|c| c.registered_name.clone()),
        }
    }
}

/// A day of the listing window whose documents could not be listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDay {
    /// Submission date that was skipped
    pub date: NaiveDate,
    /// Registry error once retries ran out
    pub reason: String,
}

/// Per-name similarity report, produced before any document is fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Threshold the names were resolved with
    pub threshold: f64,
    /// One entry per requested name, in input order
    pub entries: Vec<ValidationEntry>,
    /// Why the batch stopped early, if it did
    pub aborted: Option<String>,
    /// Days missing from the candidate listing
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_days: Vec<SkippedDay>,
}

impl ValidationReport {
    /// Report over `resolutions`.
    pub fn new(resolutions: &[ResolutionResult], threshold: Threshold) -> Self {
        Self {
            threshold: threshold.value(),
            entries: resolutions.iter().map(ValidationEntry::from).collect(),
            aborted: None,
            skipped_days: Vec::new(),
        }
    }

    /// Record that the batch was stopped.
    pub fn with_abort(mut self, reason: impl Into<String>) -> Self {
        self.aborted = Some(reason.into());
        self
    }

    /// Record days the candidates were listed without.
    pub fn with_skipped_days(mut self, skipped: impl IntoIterator<Item = SkippedDay>) -> Self {
        self.skipped_days.extend(skipped);
        self
    }

    /// Number of names that matched a filer.
    pub fn matched_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.matched).count()
    }
}

impl Exporter for ValidationReport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                wtr.write_record([
                    "query_name",
                    "matched",
                    "similarity",
                    "best_filer_id",
                    "best_registered_name",
                ])?;
                for entry in &self.entries {
                    let similarity = format!("{:.4}", entry.similarity);
                    wtr.write_record([
                        entry.query_name.as_str(),
                        if entry.matched { "true" } else { "false" },
                        similarity.as_str(),
                        entry.best_filer_id.as_ref().map_or("", |id| id.as_str()),
                        entry.best_registered_name.as_deref().unwrap_or_default(),
                    ])?;
                }
                csv_to_string(wtr)
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
            ExportFormat::Text => Ok(render_validation(self)),
        }
    }
}
