#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/yuho/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod extractor;
pub mod indicators;

pub use error::{ExtractError, Result};
pub use extractor::{
    ContextMatch, ExtractedFact, ExtractedIndicators, IndicatorValue, extract, extract_indicator,
};
pub use indicators::{Indicator, IndicatorSpec};
