//! Batch pipeline over a list of company names.
//!
//! One listing of the date range feeds both the candidate filers and the
//! document selection. Every name is resolved before any payload is fetched;
//! matched companies are then processed concurrently and the rows restored to
//! input order. Per-company failures stay in their row. A fatal registry error
//! (rejected credential) stops new work and marks the remaining companies as
//! aborted.
//!
//! The window is listed one day at a time. A day that still fails after the
//! client's retries is skipped and recorded in the report; only a fatal error
//! stops the batch before it starts. When no day could be listed at all, every
//! row carries the listing failure.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info, warn};
use yuho_extract::{IndicatorSpec, extract};
use yuho_output::{
    BatchSummary, FailureReason, ResultRow, ResultTable, SkippedDay, ValidationReport,
};
use yuho_registry::{
    DateRange, DocumentMetadata, Registry, RegistryError, SelectionError,
    select_latest_annual_report,
};
use yuho_resolve::{CandidateFiler, NameResolver, ResolutionResult, Threshold};

/// Default number of companies in flight.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Errors that stop a batch before any company is processed.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The registry rejected the listing outright
    #[error("Document listing failed: {0}")]
    Listing(#[from] RegistryError),
}

/// Settings for one batch.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum similarity for a name match
    pub threshold: Threshold,
    /// Companies processed concurrently
    pub concurrency: usize,
    /// Indicators to extract
    pub spec: IndicatorSpec,
    /// Listing window
    pub range: DateRange,
}

impl PipelineConfig {
    /// Default threshold, concurrency and indicators over `range`.
    pub fn new(range: DateRange) -> Self {
        Self {
            threshold: Threshold::DEFAULT,
            concurrency: DEFAULT_CONCURRENCY,
            spec: IndicatorSpec::default(),
            range,
        }
    }
}

/// Documents listed for the window and the filers derived from them.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    documents: Vec<DocumentMetadata>,
    candidates: Vec<CandidateFiler>,
    skipped_days: Vec<SkippedDay>,
    unlisted: Option<FailureReason>,
}

impl RegistrySnapshot {
    /// One candidate per filer id, in first-seen order, named as first seen.
    pub fn from_documents(documents: Vec<DocumentMetadata>) -> Self {
        let mut seen = HashSet::new();
        let candidates = documents
            .iter()
            .filter(|doc| seen.insert(doc.filer_id.clone()))
            .map(|doc| CandidateFiler::new(doc.filer_id.clone(), doc.registered_name.clone()))
            .collect();
        Self {
            documents,
            candidates,
            skipped_days: Vec::new(),
            unlisted: None,
        }
    }

    /// All listed documents.
    pub fn documents(&self) -> &[DocumentMetadata] {
        &self.documents
    }

    /// Candidate filers.
    pub fn candidates(&self) -> &[CandidateFiler] {
        &self.candidates
    }

    /// Days of the window that could not be listed.
    pub fn skipped_days(&self) -> &[SkippedDay] {
        &self.skipped_days
    }

    /// Failure shared by every company when no day of the window was listed.
    pub const fn unlisted(&self) -> Option<&FailureReason> {
        self.unlisted.as_ref()
    }
}

/// Outcome of a batch: one row per requested name, in input order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Threshold the names were resolved with
    pub threshold: Threshold,
    /// Result rows
    pub rows: Vec<ResultRow>,
    /// Resolution of each name
    pub resolutions: Vec<ResolutionResult>,
    /// Why the batch stopped early, if it did
    pub aborted: Option<String>,
    /// Days missing from the listing
    pub skipped_days: Vec<SkippedDay>,
}

impl BatchReport {
    /// Similarity report over the resolutions, noting skipped days and any abort.
    pub fn validation_report(&self) -> ValidationReport {
        let mut report = ValidationReport::new(&self.resolutions, self.threshold)
            .with_skipped_days(self.skipped_days.iter().cloned());
        if let Some(reason) = &self.aborted {
            report = report.with_abort(reason.clone());
        }
        report
    }

    /// Counts of extracted and failed rows.
    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_rows(&self.rows)
    }

    /// Exportable view of the rows.
    pub fn table<'a>(&'a self, spec: &'a IndicatorSpec) -> ResultTable<'a> {
        ResultTable::new(spec, &self.rows)
    }
}

/// Resolves names and extracts indicators through a [`Registry`].
#[derive(Debug)]
pub struct Pipeline<R> {
    registry: R,
    config: PipelineConfig,
}

impl<R: Registry> Pipeline<R> {
    /// Create a pipeline.
    pub const fn new(registry: R, config: PipelineConfig) -> Self {
        Self { registry, config }
    }

    /// Batch settings.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The underlying registry.
    pub const fn registry(&self) -> &R {
        &self.registry
    }

    /// List the window day by day and derive candidate filers.
    ///
    /// Days that fail with a non-fatal error are skipped. Once the call budget
    /// is spent the rest of the window is skipped without further requests.
    ///
    /// # Errors
    /// Returns `BatchError::Listing` if the registry rejects the credential or
    /// the client configuration
    pub async fn snapshot(&self) -> Result<RegistrySnapshot, BatchError> {
        let range = &self.config.range;
        let mut documents = Vec::new();
        let mut skipped_days = Vec::new();
        let mut last_failure = None;

        let mut days = range.days();
        while let Some(day) = days.next() {
            let err = match self.registry.list_documents(&DateRange::new(day, day)?).await {
                Ok(listed) => {
                    documents.extend(listed);
                    continue;
                }
                Err(err) if err.is_fatal() => return Err(BatchError::Listing(err)),
                Err(err) => err,
            };

            warn!(date = %day, error = %err, "Skipping day that could not be listed");
            let reason = err.to_string();
            skipped_days.push(SkippedDay {
                date: day,
                reason: reason.clone(),
            });
            if matches!(err, RegistryError::BudgetExhausted { .. }) {
                skipped_days.extend(days.by_ref().map(|date| SkippedDay {
                    date,
                    reason: reason.clone(),
                }));
            }
            last_failure = Some(FailureReason::from(err));
        }

        let mut snapshot = RegistrySnapshot::from_documents(documents);
        if skipped_days.len() == range.len() {
            snapshot.unlisted = last_failure;
        }
        snapshot.skipped_days = skipped_days;
        info!(
            start = %range.start(),
            end = %range.end(),
            documents = snapshot.documents().len(),
            filers = snapshot.candidates().len(),
            skipped_days = snapshot.skipped_days().len(),
            "Listed documents"
        );
        Ok(snapshot)
    }

    /// Resolve every name against the snapshot's candidates, in input order.
    pub fn resolve_all(
        &self,
        snapshot: &RegistrySnapshot,
        names: &[String],
    ) -> Vec<ResolutionResult> {
        let resolver = NameResolver::new(snapshot.candidates().iter().cloned());
        names
            .iter()
            .map(|name| {
                let resolution = resolver.resolve(name, self.config.threshold);
                let best = resolution.best.as_ref().map(|scored| &scored.candidate);
                info!(
                    query = %name,
                    filer = best.map_or("-", |c| c.filer_id.as_str()),
                    registered_name = best.map_or("-", |c| c.registered_name.as_str()),
                    similarity = resolution.similarity_score,
                    matched = resolution.matched,
                    "Resolved name"
                );
                resolution
            })
            .collect()
    }

    /// Resolve the names without fetching any report.
    ///
    /// # Errors
    /// Returns `BatchError::Listing` on a fatal listing error
    pub async fn validate(&self, names: &[String]) -> Result<ValidationReport, BatchError> {
        let snapshot = self.snapshot().await?;
        let resolutions = self.resolve_all(&snapshot, names);
        Ok(ValidationReport::new(&resolutions, self.config.threshold)
            .with_skipped_days(snapshot.skipped_days().iter().cloned()))
    }

    /// Run the full batch.
    ///
    /// # Errors
    /// Returns `BatchError::Listing` on a fatal listing error. Every other
    /// failure is recorded in the affected rows.
    pub async fn run(&self, names: &[String]) -> Result<BatchReport, BatchError> {
        self.run_with_progress(names, |_| {}).await
    }

    /// Run the full batch, calling `on_row` as each company completes.
    ///
    /// # Errors
    /// Returns `BatchError::Listing` on a fatal listing error
    pub async fn run_with_progress(
        &self,
        names: &[String],
        mut on_row: impl FnMut(&ResultRow),
    ) -> Result<BatchReport, BatchError> {
        let snapshot = self.snapshot().await?;
        let resolutions = self.resolve_all(&snapshot, names);
        if let Some(reason) = snapshot.unlisted() {
            warn!(%reason, "No day of the window could be listed");
        }
        let abort = OnceLock::new();

        let mut indexed = Vec::with_capacity(resolutions.len());
        {
            let snapshot = &snapshot;
            let abort = &abort;
            let mut completed = stream::iter(resolutions.iter().enumerate())
                .map(|(index, resolution)| async move {
                    (index, self.process(snapshot, resolution, abort).await)
                })
                .buffer_unordered(self.config.concurrency.max(1));

            while let Some((index, row)) = completed.next().await {
                on_row(&row);
                indexed.push((index, row));
            }
        }
        indexed.sort_by_key(|(index, _)| *index);

        let aborted = abort.into_inner();
        if let Some(reason) = &aborted {
            warn!(%reason, "Batch aborted");
        }

        let report = BatchReport {
            threshold: self.config.threshold,
            rows: indexed.into_iter().map(|(_, row)| row).collect(),
            resolutions,
            aborted,
            skipped_days: snapshot.skipped_days,
        };
        info!("{}", report.summary());
        Ok(report)
    }

    async fn process(
        &self,
        snapshot: &RegistrySnapshot,
        resolution: &ResolutionResult,
        abort: &OnceLock<String>,
    ) -> ResultRow {
        if let Some(reason) = snapshot.unlisted() {
            return ResultRow::failed(resolution, None, reason.clone());
        }
        let Some(filer) = resolution.matched_filer() else {
            return ResultRow::unmatched(resolution);
        };
        if let Some(reason) = abort.get() {
            return ResultRow::failed(
                resolution,
                None,
                FailureReason::Aborted(format!("not started: {reason}")),
            );
        }

        let document = match select_latest_annual_report(&filer.filer_id, snapshot.documents()) {
            Ok(document) => document,
            Err(SelectionError::NoAnnualReportFound(filer_id)) => {
                debug!(query = %resolution.query_name, %filer_id, "No annual report in window");
                return ResultRow::failed(resolution, None, FailureReason::NoAnnualReportFound);
            }
        };
        if !document.has_xbrl {
            return ResultRow::failed(resolution, Some(document), FailureReason::MissingXbrl);
        }

        match self
            .registry
            .fetch_report_payload(&document.document_id)
            .await
        {
            Ok(payload) => {
                let indicators = extract(&payload, &self.config.spec);
                debug!(
                    query = %resolution.query_name,
                    document = %document.document_id,
                    found = indicators.found_count(),
                    of = indicators.len(),
                    "Extracted indicators"
                );
                ResultRow::extracted(resolution, document, indicators)
            }
            Err(err) => {
                warn!(
                    query = %resolution.query_name,
                    document = %document.document_id,
                    error = %err,
                    "Report fetch failed"
                );
                if err.is_fatal() {
                    let _ = abort.set(err.to_string());
                }
                ResultRow::failed(resolution, Some(document), FailureReason::from(err))
            }
        }
    }
}
