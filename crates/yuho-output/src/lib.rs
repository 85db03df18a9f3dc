#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/yuho/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod row;
pub mod summary;

pub use export::{
    ExportError, ExportFormat, Exporter, NOT_FOUND, ResultTable, SkippedDay, UTF8_BOM,
    ValidationEntry, ValidationReport,
};
pub use row::{DocumentSummary, FailureReason, ResultRow, RowOutcome};
pub use summary::{BatchSummary, render_results, render_validation};
