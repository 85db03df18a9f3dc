//! Error types for indicator configuration.

use thiserror::Error;

/// Result type for extraction configuration.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Errors raised while building or loading an indicator spec.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Spec file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Spec file is not valid JSON
    #[error("Invalid indicator spec JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Spec lists no indicators
    #[error("Indicator spec is empty")]
    EmptySpec,

    /// Indicator without a name
    #[error("Indicator at position {0} has an empty name")]
    EmptyName(usize),

    /// Two indicators share a name
    #[error("Duplicate indicator name: {0}")]
    DuplicateIndicator(String),

    /// Indicator without candidate tags
    #[error("Indicator {0} lists no tags")]
    NoTags(String),
}
