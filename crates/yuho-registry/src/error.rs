//! Error types for registry operations.

use thiserror::Error;

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while talking to the registry or parsing its payloads.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The subscription key was rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The service asked us to slow down
    #[error("Rate limit exceeded, please retry after {retry_after_ms}ms")]
    RateLimited {
        /// Milliseconds to wait before retrying
        retry_after_ms: u64,
    },

    /// The daily call ceiling has been spent
    #[error("Daily call budget of {limit} requests exhausted")]
    BudgetExhausted {
        /// Configured ceiling
        limit: u32,
    },

    /// Document or endpoint does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network failure or timeout
    #[error("Transient network error: {0}")]
    Transient(String),

    /// Any other non-success answer from the API
    #[error("EDINET API error (status {status}): {message}")]
    Api {
        /// Status reported by the API
        status: u16,
        /// Message reported by the API
        message: String,
    },

    /// Listing response could not be parsed
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// XBRL payload could not be parsed into facts
    #[error("XBRL parsing error: {0}")]
    XbrlParse(String),

    /// Document archive could not be read
    #[error("Archive error: {0}")]
    Archive(String),

    /// Client misconfiguration (missing key, bad base URL)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid date range
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date of the range
        start: String,
        /// End date of the range
        end: String,
    },
}

impl RegistryError {
    /// Whether the failed call may succeed if repeated after a delay.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited { .. })
    }

    /// Whether no further call made with the same credentials can succeed.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::Configuration(_))
    }

    /// Map an HTTP status and message reported by EDINET to an error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Unauthorized(message),
            404 => Self::NotFound(message),
            429 => Self::RateLimited {
                retry_after_ms: 0,
            },
            500..=599 => Self::Transient(format!("HTTP {status}: {message}")),
            _ => Self::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else if err.is_builder() {
            Self::Configuration(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), err.to_string())
        } else {
            Self::Transient(err.to_string())
        }
    }
}

impl From<zip::result::ZipError> for RegistryError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

impl From<quick_xml::Error> for RegistryError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XbrlParse(err.to_string())
    }
}
