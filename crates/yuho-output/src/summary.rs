//! Plain-text rendering of results and resolution diagnostics.

use crate::export::{ResultTable, ValidationReport};
use crate::row::{ResultRow, RowOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use yuho_extract::{ContextMatch, IndicatorValue};

/// Placeholder for values that are absent.
pub const MISSING: &str = "n/a";

/// Counts over the rows of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Rows in the batch
    pub total: usize,
    /// Rows with extracted indicators
    pub extracted: usize,
    /// Failed rows by failure code
    pub failures: BTreeMap<String, usize>,
}

impl BatchSummary {
    /// Count the outcomes of `rows`.
    ///
    /// # Examples
    ///
    /// ```
    /// use yuho_output::BatchSummary;
    ///
    /// let summary = BatchSummary::from_rows(&[]);
    /// assert_eq!(summary.total, 0);
    /// assert_eq!(summary.failed(), 0);
    /// ```
    pub fn from_rows(rows: &[ResultRow]) -> Self {
        let mut summary = Self {
            total: rows.len(),
            ..Self::default()
        };
        for row in rows {
            match row.failure() {
                None => summary.extracted += 1,
                Some(reason) => {
                    *summary.failures.entry(reason.code().to_string()).or_default() += 1;
                }
            }
        }
        summary
    }

    /// Number of failed rows.
    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} companies: {} extracted, {} failed",
            self.total,
            self.extracted,
            self.failed()
        )?;
        if !self.failures.is_empty() {
            let parts: Vec<String> = self
                .failures
                .iter()
                .map(|(code, count)| format!("{code} {count}"))
                .collect();
            write!(f, " ({})", parts.join(", "))?;
        }
        Ok(())
    }
}

fn render_value(value: &IndicatorValue) -> String {
    match value {
        IndicatorValue::Found {
            value,
            unit,
            context_match,
            context_ref,
            ..
        } => {
            let mut out = value.to_string();
            if let Some(unit) = unit {
                out.push(' ');
                out.push_str(unit);
            }
            if *context_match == ContextMatch::Fallback {
                out.push_str(&format!(" (fallback: {context_ref})"));
            }
            out
        }
        IndicatorValue::NotFound => MISSING.to_string(),
    }
}

/// Render every row as a block of labelled lines.
pub fn render_results(table: &ResultTable<'_>) -> String {
    let width = table
        .spec()
        .names()
        .map(str::len)
        .chain(std::iter::once("Document".len()))
        .max()
        .unwrap_or_default()
        + 2;

    let mut output = String::new();
    for row in table.rows() {
        output.push_str(&format!("\n{}\n", row.query_name()));
        output.push_str(&"-".repeat(60));
        output.push('\n');

        output.push_str(&format!("  {:<width$}{}\n", "Status", row.status()));
        if let Some(detail) = row.failure().and_then(|reason| reason.detail()) {
            output.push_str(&format!("  {:<width$}{}\n", "Detail", detail));
        }
        let filer = row.filer().map_or_else(
            || MISSING.to_string(),
            |f| format!("{} {}", f.filer_id, f.registered_name),
        );
        output.push_str(&format!(
            "  {:<width$}{} (similarity {:.2})\n",
            "Filer",
            filer,
            row.similarity()
        ));
        let document = row.document().map_or_else(
            || MISSING.to_string(),
            |d| format!("{} {} ({})", d.document_id, d.description, d.submission_date),
        );
        output.push_str(&format!("  {:<width$}{}\n", "Document", document));

        for name in table.spec().names() {
            let value = match row.outcome() {
                RowOutcome::Extracted(indicators) => indicators
                    .get(name)
                    .map_or_else(|| MISSING.to_string(), render_value),
                RowOutcome::Failed(_) => MISSING.to_string(),
            };
            output.push_str(&format!("  {name:<width$}{value}\n"));
        }
    }

    output.push('\n');
    output.push_str(&"=".repeat(60));
    output.push('\n');
    output.push_str(&BatchSummary::from_rows(table.rows()).to_string());
    output.push('\n');
    output
}

/// Render the validation report as an aligned table.
pub fn render_validation(report: &ValidationReport) -> String {
    let width = report
        .entries
        .iter()
        .map(|entry| entry.query_name.chars().count())
        .max()
        .unwrap_or_default()
        .max("Query".len())
        + 2;

    let mut output = String::new();
    output.push_str(&format!(
        "Name resolution (threshold {:.2}): {}/{} matched\n",
        report.threshold,
        report.matched_count(),
        report.entries.len()
    ));
    output.push_str(&"=".repeat(60));
    output.push('\n');
    output.push_str(&format!(
        "{:<width$}{:<8}{:>8}  {}\n",
        "Query", "Match", "Score", "Best candidate"
    ));
    output.push_str(&"-".repeat(60));
    output.push('\n');

    for entry in &report.entries {
        let candidate = match (&entry.best_filer_id, &entry.best_registered_name) {
            (Some(id), Some(name)) => format!("{id} {name}"),
            _ => MISSING.to_string(),
        };
        // Pad by characters, not bytes, for Japanese names
        let padding = width.saturating_sub(entry.query_name.chars().count());
        output.push_str(&format!(
            "{}{}{:<8}{:>8.4}  {}\n",
            entry.query_name,
            " ".repeat(padding),
            if entry.matched { "yes" } else { "no" },
            entry.similarity,
            candidate
        ));
    }

    if !report.skipped_days.is_empty() {
        output.push_str(&format!(
            "\nListing incomplete, {} day(s) skipped:\n",
            report.skipped_days.len()
        ));
        for skipped in &report.skipped_days {
            output.push_str(&format!("  {}  {}\n", skipped.date, skipped.reason));
        }
    }
    if let Some(reason) = &report.aborted {
        output.push_str(&format!("\nBatch aborted: {reason}\n"));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{ExportFormat, Exporter, SkippedDay};
    use crate::row::fixtures::{candidates, extracted_row, spec, unmatched_row};
    use chrono::NaiveDate;
    use yuho_resolve::{Threshold, resolve};

    #[test]
    fn test_batch_summary() {
        let rows = vec![extracted_row(), unmatched_row(), unmatched_row()];
        let summary = BatchSummary::from_rows(&rows);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.extracted, 1);
        assert_eq!(summary.failed(), 2);
        assert_eq!(
            summary.to_string(),
            "3 companies: 1 extracted, 2 failed (unmatched 2)"
        );
    }

    #[test]
    fn test_render_results_uses_placeholder() {
        let rows = vec![extracted_row(), unmatched_row()];
        let spec = spec();
        let text = ResultTable::new(&spec, &rows)
            .export_to_string(ExportFormat::Text)
            .unwrap();

        assert!(text.contains("Acme Data\n"));
        assert!(text.contains("1000000 JPY"));
        assert!(text.contains(&format!("Employees  {MISSING}")));
        assert!(text.contains("Nonexistent Corp"));
        assert!(text.contains("unmatched"));
        assert!(text.contains("2 companies: 1 extracted, 1 failed"));
    }

    #[test]
    fn test_render_validation() {
        let resolutions = vec![
            resolve("Acme Data", &candidates(), Threshold::default()),
            resolve("Nonexistent Corp", &candidates(), Threshold::default()),
        ];
        let report = ValidationReport::new(&resolutions, Threshold::default())
            .with_abort("unauthorized: invalid key");
        let text = render_validation(&report);

        assert!(text.contains("1/2 matched"));
        assert!(text.contains("E00001 Acme Data Corporation"));
        assert!(text.contains("Batch aborted: unauthorized: invalid key"));
        assert!(!text.contains("Listing incomplete"));
    }

    #[test]
    fn test_render_validation_lists_skipped_days() {
        let resolutions = vec![resolve("Acme Data", &candidates(), Threshold::default())];
        let report = ValidationReport::new(&resolutions, Threshold::default()).with_skipped_days([
            SkippedDay {
                date: NaiveDate::from_ymd_opt(2024, 6, 17).unwrap(),
                reason: "Transient network error: HTTP 503".to_string(),
            },
        ]);
        let text = render_validation(&report);

        assert!(text.contains("Listing incomplete, 1 day(s) skipped"));
        assert!(text.contains("2024-06-17  Transient network error: HTTP 503"));
        assert!(!text.contains("Batch aborted"));
    }
}
