#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/yuho/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod client;
pub mod documents;
pub mod error;
pub mod xbrl;

use std::future::Future;

pub use client::{CallBudget, EdinetClient, EdinetClientBuilder, RetryPolicy};
pub use documents::{
    DateRange, DocumentId, DocumentMetadata, DocumentType, FilerId, SelectionError,
    select_latest_annual_report,
};
pub use error::{RegistryError, Result};
pub use xbrl::{FactValue, ReportingContext, XbrlDocument, XbrlFact};

/// A source of disclosure documents and their XBRL payloads.
///
/// Both operations may be called concurrently from several in-flight
/// companies; implementations own whatever rate limiting they need.
pub trait Registry {
    /// List every document submitted within `range`, oldest day first.
    fn list_documents(
        &self,
        range: &DateRange,
    ) -> impl Future<Output = Result<Vec<DocumentMetadata>>> + Send;

    /// Fetch and parse the XBRL instance of a document.
    fn fetch_report_payload(
        &self,
        document_id: &DocumentId,
    ) -> impl Future<Output = Result<XbrlDocument>> + Send;
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
