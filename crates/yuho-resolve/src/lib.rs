#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/yuho/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod normalize;
pub mod resolver;
pub mod similarity;

pub use error::{ResolveError, Result};
pub use normalize::normalize_company_name;
pub use resolver::{
    CandidateFiler, NameResolver, ResolutionResult, ScoredCandidate, Threshold, resolve,
};
pub use similarity::name_similarity;
