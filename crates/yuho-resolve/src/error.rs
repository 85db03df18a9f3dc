//! Error types for name resolution.

use thiserror::Error;

/// Result type for resolution operations.
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Errors raised while configuring resolution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// Threshold outside `[0, 1]` or not a number
    #[error("Invalid similarity threshold {0}: must be between 0 and 1")]
    InvalidThreshold(f64),
}
