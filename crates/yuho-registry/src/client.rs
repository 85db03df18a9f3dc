//! EDINET API v2 client with rate limiting, a daily call budget and retries.

use crate::documents::{DateRange, DocumentId, DocumentMetadata, parse_document_list};
use crate::error::{RegistryError, Result};
use crate::xbrl::XbrlDocument;
use crate::Registry;
use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

/// EDINET API v2 base URL
const EDINET_BASE_URL: &str = "https://api.edinet-fsa.go.jp/api/v2";

/// Default pacing: 2 requests per second
const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(500);

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default daily call ceiling
const DEFAULT_DAILY_CALL_LIMIT: u32 = 1_000;

/// User agent sent with every request
const USER_AGENT: &str = concat!("yuho/", env!("CARGO_PKG_VERSION"));

/// `type=2`: listing with full metadata
const LIST_TYPE_METADATA: &str = "2";

/// `type=1`: submitted document and audit report, XBRL included
const DOCUMENT_TYPE_XBRL: &str = "1";

/// Rate limiter to keep a minimum interval between requests
#[derive(Debug)]
struct RateLimiter {
    last_request: Instant,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            last_request: now.checked_sub(min_interval).unwrap_or(now),
            min_interval,
        }
    }

    async fn wait(&mut self) {
        let elapsed = self.last_request.elapsed();
        if elapsed < self.min_interval {
            sleep(self.min_interval - elapsed).await;
        }
        self.last_request = Instant::now();
    }
}

/// Daily ceiling on outbound calls, shared by every task using the client.
#[derive(Debug)]
pub struct CallBudget {
    limit: u32,
    used: AtomicU32,
}

impl CallBudget {
    /// A budget allowing `limit` calls.
    pub const fn new(limit: u32) -> Self {
        Self {
            limit,
            used: AtomicU32::new(0),
        }
    }

    /// Reserve one call, failing once the ceiling is reached.
    pub fn try_acquire(&self) -> Result<()> {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < self.limit).then_some(used + 1)
            })
            .map(|_| ())
            .map_err(|_| RegistryError::BudgetExhausted { limit: self.limit })
    }

    /// Calls spent so far.
    pub fn used(&self) -> u32 {
        self.used.load(Ordering::Acquire)
    }

    /// Calls left.
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used())
    }

    /// Configured ceiling.
    pub const fn limit(&self) -> u32 {
        self.limit
    }
}

/// Bounded retry with exponential backoff for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Builder for [`EdinetClient`].
#[derive(Clone)]
pub struct EdinetClientBuilder {
    api_key: String,
    base_url: String,
    min_interval: Duration,
    timeout: Duration,
    daily_call_limit: u32,
    retry: RetryPolicy,
}

impl EdinetClientBuilder {
    /// Override the API base URL (tests point this at a mock server).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Minimum duration between requests.
    pub const fn min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Per-request timeout.
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Daily call ceiling.
    pub const fn daily_call_limit(mut self, limit: u32) -> Self {
        self.daily_call_limit = limit;
        self
    }

    /// Retry policy for transient failures.
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    /// Returns `RegistryError::Configuration` for an empty key or invalid base URL
    pub fn build(self) -> Result<EdinetClient> {
        if self.api_key.trim().is_empty() {
            return Err(RegistryError::Configuration(
                "EDINET API key is empty".to_string(),
            ));
        }
        reqwest::Url::parse(&self.base_url).map_err(|e| {
            RegistryError::Configuration(format!("Invalid base URL {:?}: {e}", self.base_url))
        })?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .build()?;

        Ok(EdinetClient {
            client,
            api_key: self.api_key,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(self.min_interval))),
            budget: Arc::new(CallBudget::new(self.daily_call_limit)),
            retry: self.retry,
        })
    }
}

/// EDINET API client with rate limiting
///
/// Clones share the rate limiter and call budget.
#[derive(Clone)]
pub struct EdinetClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    budget: Arc<CallBudget>,
    retry: RetryPolicy,
}

impl EdinetClient {
    /// Create a client with default pacing, timeout, budget and retries.
    ///
    /// # Example
    /// ```no_run
    /// use yuho_registry::{EdinetClient, Registry};
    /// use yuho_registry::documents::DateRange;
    /// use chrono::NaiveDate;
    ///
    /// # async fn example() -> yuho_registry::Result<()> {
    /// let client = EdinetClient::new("my-subscription-key")?;
    /// let day = NaiveDate::from_ymd_opt(2024, 6, 18).unwrap();
    /// let documents = client.list_documents(&DateRange::new(day, day)?).await?;
    /// println!("Found {} documents", documents.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    /// Start configuring a client.
    pub fn builder(api_key: impl Into<String>) -> EdinetClientBuilder {
        EdinetClientBuilder {
            api_key: api_key.into(),
            base_url: EDINET_BASE_URL.to_string(),
            min_interval: DEFAULT_RATE_LIMIT,
            timeout: DEFAULT_TIMEOUT,
            daily_call_limit: DEFAULT_DAILY_CALL_LIMIT,
            retry: RetryPolicy::default(),
        }
    }

    /// The shared call budget.
    pub fn budget(&self) -> &CallBudget {
        &self.budget
    }

    /// List the documents submitted on one day.
    pub async fn documents_on(&self, date: NaiveDate) -> Result<Vec<DocumentMetadata>> {
        let date = date.format("%Y-%m-%d").to_string();
        let url = format!("{}/documents.json", self.base_url);
        let (date, url) = (date.as_str(), url.as_str());

        self.with_retry("documents.json", || async move {
            let request = self.client.get(url).query(&[
                ("date", date),
                ("type", LIST_TYPE_METADATA),
                ("Subscription-Key", self.api_key.as_str()),
            ]);
            let body = self.send(request).await?.text().await?;
            parse_document_list(&body)
        })
        .await
    }

    /// Download the zip archive of a document.
    pub async fn fetch_document_archive(&self, document_id: &DocumentId) -> Result<Vec<u8>> {
        if document_id.as_str().is_empty() {
            return Err(RegistryError::NotFound("Empty document id".to_string()));
        }
        let url = format!("{}/documents/{}", self.base_url, document_id);
        let url = url.as_str();

        self.with_retry("documents", || async move {
            let request = self.client.get(url).query(&[
                ("type", DOCUMENT_TYPE_XBRL),
                ("Subscription-Key", self.api_key.as_str()),
            ]);
            let response = self.send(request).await?;

            // Errors on this endpoint come back as JSON with a 200 status
            let is_json = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("json"));
            if is_json {
                let body = response.text().await?;
                return Err(error_from_body(200, &body));
            }

            Ok(response.bytes().await?.to_vec())
        })
        .await
    }

    /// Reserve budget, wait for the rate limiter and send a request.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        self.budget.try_acquire()?;
        self.rate_limiter.lock().await.wait().await;

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map_or(0, |secs| secs.saturating_mul(1_000));
            return Err(RegistryError::RateLimited { retry_after_ms });
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_from_body(status.as_u16(), &body))
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = match err {
                        RegistryError::RateLimited { retry_after_ms } if retry_after_ms > 0 => {
                            Duration::from_millis(retry_after_ms).min(self.retry.max_delay)
                        }
                        _ => self.retry.delay_for(attempt),
                    };
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying EDINET request"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl Registry for EdinetClient {
    async fn list_documents(&self, range: &DateRange) -> Result<Vec<DocumentMetadata>> {
        debug!(
            start = %range.start(),
            end = %range.end(),
            days = range.len(),
            "Listing EDINET documents"
        );

        let mut documents = Vec::new();
        for day in range.days() {
            let listed = self.documents_on(day).await?;
            debug!(date = %day, count = listed.len(), "Listed documents");
            documents.extend(listed);
        }
        Ok(documents)
    }

    async fn fetch_report_payload(&self, document_id: &DocumentId) -> Result<XbrlDocument> {
        let archive = self.fetch_document_archive(document_id).await?;
        debug!(document = %document_id, bytes = archive.len(), "Fetched document archive");
        XbrlDocument::from_archive(&archive)
    }
}

impl std::fmt::Debug for EdinetClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdinetClientBuilder")
            .field("base_url", &self.base_url)
            .field("min_interval", &self.min_interval)
            .field("timeout", &self.timeout)
            .field("daily_call_limit", &self.daily_call_limit)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for EdinetClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdinetClient")
            .field("base_url", &self.base_url)
            .field("budget", &self.budget)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Build an error from a JSON error body, falling back to the HTTP status.
///
/// EDINET answers either `{"StatusCode": 401, "message": ...}` or
/// `{"metadata": {"status": "404", "message": ...}}`.
fn error_from_body(http_status: u16, body: &str) -> RegistryError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let field = |value: &serde_json::Value, key: &str| -> Option<serde_json::Value> {
        value
            .get(key)
            .or_else(|| value.get("metadata").and_then(|m| m.get(key)))
            .cloned()
    };

    let (status, message) = parsed.as_ref().map_or((http_status, body.to_string()), |json| {
        let status = ["StatusCode", "statusCode", "status"]
            .iter()
            .find_map(|key| field(json, key))
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .and_then(|v| u16::try_from(v).ok())
            .unwrap_or(http_status);
        let message = field(json, "message")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| body.to_string());
        (status, message)
    });

    if status == 200 {
        return RegistryError::Api { status, message };
    }
    RegistryError::from_status(status, message)
}
