#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/yuho/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod pipeline;

// Re-export main types from sub-crates
pub use yuho_extract as extract;
pub use yuho_output as output;
pub use yuho_registry as registry;
pub use yuho_resolve as resolve;

pub use config::{Config, ConfigError};
pub use pipeline::{BatchError, BatchReport, Pipeline, PipelineConfig, RegistrySnapshot};

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
