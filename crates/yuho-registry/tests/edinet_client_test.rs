//! Integration tests for the EDINET client against a mock server

use chrono::NaiveDate;
use std::io::{Cursor, Write};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use yuho_registry::documents::{DateRange, DocumentId, DocumentType};
use yuho_registry::xbrl::FactValue;
use yuho_registry::{EdinetClient, Registry, RegistryError, RetryPolicy};

const LISTING: &str = r#"{
    "metadata": {"title": "提出された書類を把握するためのAPI", "status": "200", "message": "OK",
                 "resultset": {"count": 2}},
    "results": [
        {"seqNumber": 1, "docID": "S100AAAA", "edinetCode": "E00001",
         "filerName": "Acme Data Corporation", "docTypeCode": "120",
         "submitDateTime": "2024-06-18 15:00", "docDescription": "有価証券報告書－第10期",
         "withdrawalStatus": "0", "xbrlFlag": "1"},
        {"seqNumber": 2, "docID": "S100BBBB", "edinetCode": "E00002",
         "filerName": "Beta Holdings", "docTypeCode": "180",
         "submitDateTime": "2024-06-18 15:30", "docDescription": "臨時報告書",
         "withdrawalStatus": "0", "xbrlFlag": "0"}
    ]
}"#;

const INSTANCE: &str = r#"<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance"
    xmlns:jppfs_cor="http://example.com/jppfs">
  <xbrli:context id="CurrentYearDuration">
    <xbrli:entity><xbrli:identifier scheme="http://disclosure.edinet-fsa.go.jp">E00001-000</xbrli:identifier></xbrli:entity>
    <xbrli:period><xbrli:startDate>2023-04-01</xbrli:startDate><xbrli:endDate>2024-03-31</xbrli:endDate></xbrli:period>
  </xbrli:context>
  <jppfs_cor:NetSales contextRef="CurrentYearDuration" unitRef="JPY" decimals="0">1000000</jppfs_cor:NetSales>
</xbrli:xbrl>"#;

fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn client(server: &MockServer, retry: RetryPolicy) -> EdinetClient {
    EdinetClient::builder("test-key")
        .base_url(server.uri())
        .min_interval(Duration::ZERO)
        .retry(retry)
        .build()
        .unwrap()
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(5),
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

#[tokio::test]
async fn test_list_documents_over_range() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents.json"))
        .and(query_param("date", "2024-06-18"))
        .and(query_param("type", "2"))
        .and(query_param("Subscription-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/documents.json"))
        .and(query_param("date", "2024-06-19"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"metadata": {"status": "200", "message": "OK"}, "results": []}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, RetryPolicy::none());
    let range = DateRange::new(day(18), day(19)).unwrap();
    let documents = client.list_documents(&range).await.unwrap();

    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].document_id.as_str(), "S100AAAA");
    assert_eq!(documents[0].document_type, DocumentType::AnnualSecuritiesReport);
    assert_eq!(documents[1].document_type, DocumentType::ExtraordinaryReport);
    assert!(!documents[1].has_xbrl);
    assert_eq!(client.budget().used(), 2);
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents.json"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            r#"{"StatusCode": 401, "message": "Access denied due to invalid subscription key."}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, fast_retry(3));
    let range = DateRange::new(day(18), day(18)).unwrap();
    let result = client.list_documents(&range).await;

    assert!(matches!(result, Err(RegistryError::Unauthorized(_))));
    assert!(result.unwrap_err().is_fatal());
}

#[tokio::test]
async fn test_server_errors_are_retried_then_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents.json"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = client(&server, fast_retry(3));
    let result = client.documents_on(day(18)).await;

    assert!(matches!(result, Err(RegistryError::Transient(_))));
    assert_eq!(client.budget().used(), 3);
}

#[tokio::test]
async fn test_request_timeout_is_transient_and_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(LISTING)
                .set_delay(Duration::from_millis(500)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = EdinetClient::builder("test-key")
        .base_url(server.uri())
        .min_interval(Duration::ZERO)
        .timeout(Duration::from_millis(50))
        .retry(fast_retry(2))
        .build()
        .unwrap();
    let result = client.documents_on(day(18)).await;

    let err = result.unwrap_err();
    assert!(matches!(err, RegistryError::Transient(_)), "{err:?}");
    assert!(err.is_retryable());
    assert_eq!(client.budget().used(), 2);
}

#[tokio::test]
async fn test_rate_limited_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents.json"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/documents.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
        .mount(&server)
        .await;

    let client = client(&server, fast_retry(2));
    let documents = client.documents_on(day(18)).await.unwrap();
    assert_eq!(documents.len(), 2);
}

#[tokio::test]
async fn test_budget_exhaustion_stops_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
        .expect(1)
        .mount(&server)
        .await;

    let client = EdinetClient::builder("test-key")
        .base_url(server.uri())
        .min_interval(Duration::ZERO)
        .daily_call_limit(1)
        .build()
        .unwrap();

    assert!(client.documents_on(day(18)).await.is_ok());
    let result = client.documents_on(day(19)).await;
    assert!(matches!(result, Err(RegistryError::BudgetExhausted { limit: 1 })));
}

#[tokio::test]
async fn test_fetch_report_payload_from_archive() {
    let server = MockServer::start().await;
    let body = archive(&[
        ("XBRL/AuditDoc/jpaud-aar-cn-001.xbrl", "<ignored/>"),
        ("XBRL/PublicDoc/jpcrp030000-asr-001_E00001-000.xbrl", INSTANCE),
    ]);
    Mock::given(method("GET"))
        .and(path("/documents/S100AAAA"))
        .and(query_param("type", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/octet-stream")
                .set_body_bytes(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, RetryPolicy::none());
    let payload = client
        .fetch_report_payload(&DocumentId::new("S100AAAA"))
        .await
        .unwrap();

    assert_eq!(payload.facts.len(), 1);
    assert_eq!(payload.facts[0].value, FactValue::Number(1_000_000.0));
}

#[tokio::test]
async fn test_fetch_missing_document_reports_json_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/S100ZZZZ"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json; charset=utf-8")
                .set_body_raw(
                    r#"{"metadata": {"status": "404", "message": "Not Found"}}"#,
                    "application/json; charset=utf-8",
                ),
        )
        .mount(&server)
        .await;

    let client = client(&server, RetryPolicy::none());
    let result = client
        .fetch_report_payload(&DocumentId::new("S100ZZZZ"))
        .await;
    assert!(matches!(result, Err(RegistryError::NotFound(_))));
}

#[tokio::test]
async fn test_archive_without_instance_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/S100AAAA"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/octet-stream")
                .set_body_bytes(archive(&[("PublicDoc/report.htm", "<html/>")])),
        )
        .mount(&server)
        .await;

    let client = client(&server, RetryPolicy::none());
    let result = client
        .fetch_report_payload(&DocumentId::new("S100AAAA"))
        .await;
    assert!(matches!(result, Err(RegistryError::XbrlParse(_))));
}
