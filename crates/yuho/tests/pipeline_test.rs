//! End-to-end batch tests against an in-memory registry

use chrono::NaiveDate;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use yuho::output::{FailureReason, ResultRow};
use yuho::registry::{
    DateRange, DocumentId, DocumentMetadata, DocumentType, FilerId, Registry, RegistryError,
    XbrlDocument,
};
use yuho::{BatchError, Pipeline, PipelineConfig};

const INSTANCE: &str = r#"<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance"
    xmlns:jppfs_cor="http://example.com/jppfs">
  <xbrli:context id="CurrentYearDuration">
    <xbrli:entity><xbrli:identifier scheme="http://disclosure.edinet-fsa.go.jp">E00001-000</xbrli:identifier></xbrli:entity>
    <xbrli:period><xbrli:startDate>2023-04-01</xbrli:startDate><xbrli:endDate>2024-03-31</xbrli:endDate></xbrli:period>
  </xbrli:context>
  <jppfs_cor:NetSales contextRef="CurrentYearDuration" unitRef="JPY" decimals="0">1000000</jppfs_cor:NetSales>
</xbrli:xbrl>"#;

#[derive(Debug, Clone, Copy)]
enum Payload {
    Instance,
    Malformed,
    Unauthorized,
    Transient,
    Slow(Duration),
}

#[derive(Debug, Clone, Copy)]
enum ListingFailure {
    Unauthorized,
    Transient,
    BudgetExhausted,
}

impl ListingFailure {
    fn error(self) -> RegistryError {
        match self {
            Self::Unauthorized => {
                RegistryError::Unauthorized("invalid subscription key".to_string())
            }
            Self::Transient => {
                RegistryError::Transient("HTTP 503: Service Unavailable".to_string())
            }
            Self::BudgetExhausted => RegistryError::BudgetExhausted { limit: 1 },
        }
    }
}

#[derive(Debug, Default)]
struct FakeRegistry {
    documents: Vec<DocumentMetadata>,
    payloads: HashMap<String, Payload>,
    failing_days: HashMap<NaiveDate, ListingFailure>,
    listings: AtomicUsize,
    fetches: AtomicUsize,
}

impl FakeRegistry {
    fn with_document(mut self, document: DocumentMetadata, payload: Payload) -> Self {
        self.payloads
            .insert(document.document_id.as_str().to_string(), payload);
        self.documents.push(document);
        self
    }

    fn failing_on(mut self, day: NaiveDate, failure: ListingFailure) -> Self {
        self.failing_days.insert(day, failure);
        self
    }

    fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Registry for FakeRegistry {
    fn list_documents(
        &self,
        range: &DateRange,
    ) -> impl Future<Output = yuho::registry::Result<Vec<DocumentMetadata>>> + Send {
        self.listings.fetch_add(1, Ordering::SeqCst);
        let failure = range.days().find_map(|day| self.failing_days.get(&day).copied());
        let result = match failure {
            Some(failure) => Err(failure.error()),
            None => Ok(self
                .documents
                .iter()
                .filter(|doc| range.contains(doc.submission_date))
                .cloned()
                .collect()),
        };
        async move { result }
    }

    fn fetch_report_payload(
        &self,
        document_id: &DocumentId,
    ) -> impl Future<Output = yuho::registry::Result<XbrlDocument>> + Send {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let payload = self.payloads.get(document_id.as_str()).copied();
        let id = document_id.to_string();
        async move {
            match payload {
                Some(Payload::Instance) => XbrlDocument::parse_xml(INSTANCE),
                Some(Payload::Slow(delay)) => {
                    tokio::time::sleep(delay).await;
                    XbrlDocument::parse_xml(INSTANCE)
                }
                Some(Payload::Malformed) => {
                    Err(RegistryError::XbrlParse("unexpected end of document".to_string()))
                }
                Some(Payload::Unauthorized) => Err(ListingFailure::Unauthorized.error()),
                Some(Payload::Transient) => Err(ListingFailure::Transient.error()),
                None => Err(RegistryError::NotFound(id)),
            }
        }
    }
}

fn document(id: &str, filer: &str, name: &str, doc_type: &str) -> DocumentMetadata {
    DocumentMetadata {
        document_id: DocumentId::new(id),
        filer_id: FilerId::new(filer),
        registered_name: name.to_string(),
        description: "有価証券報告書－第10期".to_string(),
        document_type: DocumentType::from_code(doc_type),
        submission_date: NaiveDate::from_ymd_opt(2024, 6, 18).unwrap(),
        has_xbrl: true,
        withdrawn: false,
    }
}

fn june(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

fn pipeline(registry: FakeRegistry, concurrency: usize) -> Pipeline<FakeRegistry> {
    pipeline_over(registry, june(18), june(18), concurrency)
}

fn pipeline_over(
    registry: FakeRegistry,
    start: NaiveDate,
    end: NaiveDate,
    concurrency: usize,
) -> Pipeline<FakeRegistry> {
    let mut config = PipelineConfig::new(DateRange::new(start, end).unwrap());
    config.concurrency = concurrency;
    Pipeline::new(registry, config)
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn failure(row: &ResultRow) -> Option<&FailureReason> {
    row.failure()
}

#[tokio::test]
async fn test_end_to_end_match_and_unmatched() {
    let registry = FakeRegistry::default()
        .with_document(
            document("S100AAAA", "E00001", "Acme Data Corporation", "120"),
            Payload::Instance,
        )
        .with_document(
            document("S100BBBB", "E00002", "Beta Holdings", "180"),
            Payload::Instance,
        );
    let pipeline = pipeline(registry, 4);

    let report = pipeline
        .run(&names(&["Acme Data", "Nonexistent Corp"]))
        .await
        .unwrap();

    assert_eq!(report.rows.len(), 2);
    assert!(report.aborted.is_none());

    let acme = &report.rows[0];
    assert_eq!(acme.query_name(), "Acme Data");
    assert!(acme.is_success());
    assert_eq!(acme.filer().unwrap().filer_id.as_str(), "E00001");
    let net_sales = acme.indicators().unwrap().get("NetSales").unwrap();
    assert_eq!(net_sales.value().and_then(|v| v.as_number()), Some(1_000_000.0));
    assert_eq!(net_sales.unit(), Some("JPY"));

    let missing = &report.rows[1];
    assert_eq!(missing.query_name(), "Nonexistent Corp");
    assert_eq!(failure(missing), Some(&FailureReason::Unmatched));
    assert!(missing.filer().is_none());

    // Only the matched company's report was fetched
    assert_eq!(pipeline.registry().fetches(), 1);
}

#[tokio::test]
async fn test_filer_without_annual_report() {
    let registry = FakeRegistry::default().with_document(
        document("S100BBBB", "E00002", "Beta Holdings", "180"),
        Payload::Instance,
    );
    let pipeline = pipeline(registry, 1);

    let report = pipeline.run(&names(&["Beta Holdings"])).await.unwrap();

    assert_eq!(
        failure(&report.rows[0]),
        Some(&FailureReason::NoAnnualReportFound)
    );
    assert_eq!(report.rows[0].filer().unwrap().filer_id.as_str(), "E00002");
    assert_eq!(pipeline.registry().fetches(), 0);
}

#[tokio::test]
async fn test_report_without_xbrl_is_not_fetched() {
    let mut without_xbrl = document("S100CCCC", "E00003", "Gamma Foods", "120");
    without_xbrl.has_xbrl = false;
    let registry = FakeRegistry::default().with_document(without_xbrl, Payload::Instance);
    let pipeline = pipeline(registry, 1);

    let report = pipeline.run(&names(&["Gamma Foods"])).await.unwrap();

    assert_eq!(failure(&report.rows[0]), Some(&FailureReason::MissingXbrl));
    assert_eq!(
        report.rows[0].document().unwrap().document_id.as_str(),
        "S100CCCC"
    );
    assert_eq!(pipeline.registry().fetches(), 0);
}

#[tokio::test]
async fn test_malformed_report_does_not_stop_batch() {
    let registry = FakeRegistry::default()
        .with_document(
            document("S100AAAA", "E00001", "Acme Data", "120"),
            Payload::Malformed,
        )
        .with_document(
            document("S100DDDD", "E00004", "Delta Motors", "120"),
            Payload::Instance,
        );
    let pipeline = pipeline(registry, 2);

    let report = pipeline
        .run(&names(&["Acme Data", "Delta Motors"]))
        .await
        .unwrap();

    assert!(matches!(
        failure(&report.rows[0]),
        Some(FailureReason::MalformedReport(_))
    ));
    assert!(report.rows[1].is_success());
    assert!(report.aborted.is_none());
}

#[tokio::test]
async fn test_transient_fetch_fails_only_its_row() {
    let registry = FakeRegistry::default()
        .with_document(
            document("S100AAAA", "E00001", "Acme Data", "120"),
            Payload::Transient,
        )
        .with_document(
            document("S100DDDD", "E00004", "Delta Motors", "120"),
            Payload::Instance,
        );
    let pipeline = pipeline(registry, 2);

    let report = pipeline
        .run(&names(&["Acme Data", "Delta Motors"]))
        .await
        .unwrap();

    match failure(&report.rows[0]) {
        Some(FailureReason::Transient(detail)) => assert!(detail.contains("503")),
        other => panic!("expected transient failure, got {other:?}"),
    }
    assert_eq!(
        report.rows[0].document().unwrap().document_id.as_str(),
        "S100AAAA"
    );
    assert!(report.rows[1].is_success());
    assert!(report.aborted.is_none());
    assert_eq!(report.summary().failed(), 1);
    assert_eq!(pipeline.registry().fetches(), 2);
}

#[tokio::test]
async fn test_tie_resolves_to_first_listed_filer() {
    for concurrency in [1, 8] {
        let registry = FakeRegistry::default()
            .with_document(
                document("S100AAAA", "E00001", "Acme Data", "120"),
                Payload::Instance,
            )
            .with_document(
                document("S100EEEE", "E00005", "Acme Data", "120"),
                Payload::Instance,
            );
        let pipeline = pipeline(registry, concurrency);

        let report = pipeline
            .run(&names(&["Acme Data", "ACME DATA"]))
            .await
            .unwrap();

        for row in &report.rows {
            assert_eq!(row.filer().unwrap().filer_id.as_str(), "E00001");
        }
    }
}

#[tokio::test]
async fn test_rows_follow_input_order() {
    let registry = FakeRegistry::default()
        .with_document(
            document("S100AAAA", "E00001", "Acme Data", "120"),
            Payload::Slow(Duration::from_millis(100)),
        )
        .with_document(
            document("S100DDDD", "E00004", "Delta Motors", "120"),
            Payload::Instance,
        );
    let pipeline = pipeline(registry, 4);
    let mut completed = Vec::new();

    let report = pipeline
        .run_with_progress(
            &names(&["Acme Data", "Unknown Trading", "Delta Motors"]),
            |row| completed.push(row.query_name().to_string()),
        )
        .await
        .unwrap();

    assert_eq!(completed.len(), 3);
    assert_eq!(completed.last().map(String::as_str), Some("Acme Data"));
    let order: Vec<_> = report.rows.iter().map(ResultRow::query_name).collect();
    assert_eq!(order, ["Acme Data", "Unknown Trading", "Delta Motors"]);
}

#[tokio::test]
async fn test_unauthorized_aborts_remaining_companies() {
    let registry = FakeRegistry::default()
        .with_document(
            document("S100AAAA", "E00001", "Acme Data", "120"),
            Payload::Unauthorized,
        )
        .with_document(
            document("S100DDDD", "E00004", "Delta Motors", "120"),
            Payload::Instance,
        )
        .with_document(
            document("S100FFFF", "E00006", "Foxtrot Energy", "120"),
            Payload::Instance,
        );
    let pipeline = pipeline(registry, 1);

    let report = pipeline
        .run(&names(&[
            "Acme Data",
            "Delta Motors",
            "Nonexistent Corp",
            "Foxtrot Energy",
        ]))
        .await
        .unwrap();

    // Every name still has exactly one row
    assert_eq!(report.rows.len(), 4);
    assert!(report.aborted.as_deref().unwrap().contains("invalid subscription key"));
    assert!(matches!(
        failure(&report.rows[0]),
        Some(FailureReason::Aborted(_))
    ));
    assert!(matches!(
        failure(&report.rows[1]),
        Some(FailureReason::Aborted(_))
    ));
    assert_eq!(failure(&report.rows[2]), Some(&FailureReason::Unmatched));
    assert!(matches!(
        failure(&report.rows[3]),
        Some(FailureReason::Aborted(_))
    ));
    assert_eq!(pipeline.registry().fetches(), 1);

    let validation = report.validation_report();
    assert_eq!(validation.entries.len(), 4);
    assert!(validation.aborted.is_some());
}

#[tokio::test]
async fn test_unauthorized_listing_stops_before_any_company() {
    let registry = FakeRegistry::default()
        .with_document(
            document("S100AAAA", "E00001", "Acme Data", "120"),
            Payload::Instance,
        )
        .failing_on(june(18), ListingFailure::Unauthorized);
    let pipeline = pipeline(registry, 1);

    let result = pipeline.run(&names(&["Acme Data"])).await;

    assert!(matches!(
        result,
        Err(BatchError::Listing(RegistryError::Unauthorized(_)))
    ));
    assert_eq!(pipeline.registry().fetches(), 0);
}

#[tokio::test]
async fn test_transient_listing_fails_every_row() {
    let registry = FakeRegistry::default()
        .with_document(
            document("S100AAAA", "E00001", "Acme Data", "120"),
            Payload::Instance,
        )
        .failing_on(june(18), ListingFailure::Transient);
    let pipeline = pipeline(registry, 2);

    let report = pipeline.run(&names(&["Acme Data", "Beta"])).await.unwrap();

    assert_eq!(report.rows.len(), 2);
    for row in &report.rows {
        assert!(matches!(failure(row), Some(FailureReason::Transient(_))));
    }
    assert!(report.aborted.is_none());
    assert_eq!(report.skipped_days.len(), 1);
    assert_eq!(report.skipped_days[0].date, june(18));
    assert!(report.skipped_days[0].reason.contains("HTTP 503"));
    assert_eq!(pipeline.registry().fetches(), 0);

    let validation = report.validation_report();
    assert_eq!(validation.entries.len(), 2);
    assert_eq!(validation.skipped_days, report.skipped_days);
}

#[tokio::test]
async fn test_flaky_day_is_skipped() {
    let registry = FakeRegistry::default()
        .with_document(
            document("S100AAAA", "E00001", "Acme Data", "120"),
            Payload::Instance,
        )
        .failing_on(june(17), ListingFailure::Transient);
    let pipeline = pipeline_over(registry, june(17), june(19), 1);

    let report = pipeline.run(&names(&["Acme Data"])).await.unwrap();

    assert!(report.rows[0].is_success());
    assert_eq!(report.skipped_days.len(), 1);
    assert_eq!(report.skipped_days[0].date, june(17));
    // One listing call per day
    assert_eq!(pipeline.registry().listings(), 3);
}

#[tokio::test]
async fn test_budget_exhaustion_skips_rest_of_window() {
    let registry = FakeRegistry::default()
        .with_document(
            document("S100AAAA", "E00001", "Acme Data", "120"),
            Payload::Instance,
        )
        .failing_on(june(16), ListingFailure::BudgetExhausted);
    let pipeline = pipeline_over(registry, june(16), june(19), 1);

    let report = pipeline.run(&names(&["Acme Data"])).await.unwrap();

    assert_eq!(pipeline.registry().listings(), 1);
    let skipped: Vec<_> = report.skipped_days.iter().map(|day| day.date).collect();
    assert_eq!(skipped, [june(16), june(17), june(18), june(19)]);
    assert_eq!(failure(&report.rows[0]), Some(&FailureReason::BudgetExhausted));
}

#[tokio::test]
async fn test_validate_records_skipped_days() {
    let registry = FakeRegistry::default()
        .with_document(
            document("S100AAAA", "E00001", "Acme Data", "120"),
            Payload::Instance,
        )
        .failing_on(june(19), ListingFailure::Transient);
    let pipeline = pipeline_over(registry, june(18), june(19), 1);

    let report = pipeline.validate(&names(&["Acme Data"])).await.unwrap();

    assert_eq!(report.matched_count(), 1);
    assert_eq!(report.skipped_days.len(), 1);
    assert_eq!(report.skipped_days[0].date, june(19));
}

#[tokio::test]
async fn test_validate_fetches_nothing() {
    let registry = FakeRegistry::default().with_document(
        document("S100AAAA", "E00001", "アクメデータ株式会社", "120"),
        Payload::Instance,
    );
    let pipeline = pipeline(registry, 1);

    let report = pipeline
        .validate(&names(&["アクメデータ", "Zeta"]))
        .await
        .unwrap();

    assert_eq!(report.matched_count(), 1);
    assert!(report.entries[0].matched);
    assert!(!report.entries[1].matched);
    assert_eq!(
        report.entries[1].best_filer_id.as_ref().map(FilerId::as_str),
        Some("E00001")
    );
    assert_eq!(pipeline.registry().fetches(), 0);
}
