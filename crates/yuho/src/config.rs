//! Runtime configuration loaded from the environment.
//!
//! `.env` in the working directory is read first (via `dotenvy`), then the
//! process environment. Every variable is optional except the API key, which
//! is only demanded when a registry client is built. Unparseable values are
//! reported, never replaced by defaults.

use crate::pipeline::{DEFAULT_CONCURRENCY, PipelineConfig};
use chrono::NaiveDate;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use yuho_extract::IndicatorSpec;
use yuho_registry::{DateRange, EdinetClient, RegistryError, RetryPolicy};
use yuho_resolve::Threshold;

/// EDINET subscription key.
pub const API_KEY_VAR: &str = "EDINET_API_KEY";
/// Alternative API base URL.
pub const BASE_URL_VAR: &str = "EDINET_BASE_URL";
/// Minimum similarity for a name match.
pub const THRESHOLD_VAR: &str = "YUHO_THRESHOLD";
/// Number of days of listings to scan.
pub const LOOKBACK_DAYS_VAR: &str = "YUHO_LOOKBACK_DAYS";
/// Companies processed concurrently.
pub const CONCURRENCY_VAR: &str = "YUHO_CONCURRENCY";
/// Daily call ceiling.
pub const DAILY_CALL_LIMIT_VAR: &str = "YUHO_DAILY_CALL_LIMIT";
/// Minimum milliseconds between requests.
pub const MIN_INTERVAL_MS_VAR: &str = "YUHO_MIN_INTERVAL_MS";
/// Per-request timeout in seconds.
pub const TIMEOUT_SECS_VAR: &str = "YUHO_TIMEOUT_SECS";
/// Retries after the first attempt.
pub const MAX_RETRIES_VAR: &str = "YUHO_MAX_RETRIES";

/// Annual reports are filed once a year.
const DEFAULT_LOOKBACK_DAYS: u32 = 365;
const DEFAULT_DAILY_CALL_LIMIT: u32 = 1_000;
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Configuration errors. All of them stop the run before any company is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No subscription key was supplied
    #[error("Missing EDINET API key: set EDINET_API_KEY or pass --api-key")]
    MissingApiKey,

    /// A variable or flag could not be parsed
    #[error("Invalid value {value:?} for {name}: {reason}")]
    Invalid {
        /// Variable or flag name
        name: String,
        /// Raw value
        value: String,
        /// Parse failure
        reason: String,
    },

    /// The registry client rejected its settings
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Settings for one run.
#[derive(Clone, PartialEq)]
pub struct Config {
    /// EDINET subscription key
    pub api_key: Option<String>,
    /// Alternative API base URL
    pub base_url: Option<String>,
    /// Minimum similarity for a match
    pub threshold: Threshold,
    /// Days of listings to scan, ending at `end_date`
    pub lookback_days: u32,
    /// Last day to scan; today when unset
    pub end_date: Option<NaiveDate>,
    /// Companies processed concurrently
    pub concurrency: usize,
    /// Daily call ceiling
    pub daily_call_limit: u32,
    /// Minimum delay between requests
    pub min_interval: Duration,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("threshold", &self.threshold)
            .field("lookback_days", &self.lookback_days)
            .field("end_date", &self.end_date)
            .field("concurrency", &self.concurrency)
            .field("daily_call_limit", &self.daily_call_limit)
            .field("min_interval", &self.min_interval)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            threshold: Threshold::DEFAULT,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            end_date: None,
            concurrency: DEFAULT_CONCURRENCY,
            daily_call_limit: DEFAULT_DAILY_CALL_LIMIT,
            min_interval: DEFAULT_MIN_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl Config {
    /// Load `.env` (if present) and then read the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for any variable that fails to parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is the normal case.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for any variable that fails to parse
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            api_key: lookup(API_KEY_VAR).filter(|key| !key.trim().is_empty()),
            base_url: lookup(BASE_URL_VAR).filter(|url| !url.trim().is_empty()),
            threshold: parse_var(&lookup, THRESHOLD_VAR)?.unwrap_or(defaults.threshold),
            lookback_days: parse_var(&lookup, LOOKBACK_DAYS_VAR)?
                .unwrap_or(defaults.lookback_days),
            end_date: None,
            concurrency: parse_var(&lookup, CONCURRENCY_VAR)?.unwrap_or(defaults.concurrency),
            daily_call_limit: parse_var(&lookup, DAILY_CALL_LIMIT_VAR)?
                .unwrap_or(defaults.daily_call_limit),
            min_interval: parse_var(&lookup, MIN_INTERVAL_MS_VAR)?
                .map_or(defaults.min_interval, Duration::from_millis),
            timeout: parse_var(&lookup, TIMEOUT_SECS_VAR)?
                .map_or(defaults.timeout, Duration::from_secs),
            max_retries: parse_var(&lookup, MAX_RETRIES_VAR)?.unwrap_or(defaults.max_retries),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the ranges that the types alone do not enforce.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for a zero lookback, concurrency or timeout
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookback_days == 0 {
            return Err(invalid(LOOKBACK_DAYS_VAR, "0", "must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(invalid(CONCURRENCY_VAR, "0", "must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(invalid(TIMEOUT_SECS_VAR, "0", "must be at least 1"));
        }
        Ok(())
    }

    /// Build the EDINET client described by this configuration.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingApiKey` without a key, or the client's own
    /// configuration error for an invalid base URL
    pub fn client(&self) -> Result<EdinetClient, ConfigError> {
        let api_key = self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)?;
        let mut builder = EdinetClient::builder(api_key)
            .min_interval(self.min_interval)
            .timeout(self.timeout)
            .daily_call_limit(self.daily_call_limit)
            .retry(RetryPolicy {
                max_attempts: self.max_retries.saturating_add(1),
                ..RetryPolicy::default()
            });
        if let Some(base_url) = &self.base_url {
            builder = builder.base_url(base_url.clone());
        }
        Ok(builder.build()?)
    }

    /// The listing window: `lookback_days` days ending at `end_date` or `today`.
    ///
    /// # Errors
    /// Returns `ConfigError::Registry` if the window cannot be represented
    pub fn date_range(&self, today: NaiveDate) -> Result<DateRange, ConfigError> {
        let end = self.end_date.unwrap_or(today);
        Ok(DateRange::ending_at(end, self.lookback_days)?)
    }

    /// Pipeline settings for this configuration.
    ///
    /// # Errors
    /// Propagates [`Config::validate`] and [`Config::date_range`] failures
    pub fn pipeline_config(
        &self,
        spec: IndicatorSpec,
        today: NaiveDate,
    ) -> Result<PipelineConfig, ConfigError> {
        self.validate()?;
        Ok(PipelineConfig {
            threshold: self.threshold,
            concurrency: self.concurrency,
            spec,
            range: self.date_range(today)?,
        })
    }
}

fn invalid(name: &str, value: &str, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| invalid(name, &raw, e)),
    }
}
