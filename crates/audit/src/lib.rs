//! Consistency auditing of language-model oracle output.
//!
//! The oracle sorts prior marks into identical and near-identical buckets,
//! but its sorting is not trusted: every near-identical entry is re-filed by
//! edit distance against the proposed mark, and missing fields are filled
//! with fixed defaults instead of failing.

pub mod buckets;
pub mod components;
pub mod overlap;
pub mod parse;

pub use buckets::{
    audit_classification, audit_oracle_text, CorrectedBucketSet, CrowdedField, DistanceBucket,
    MarkEntry, OracleClassification,
};
pub use components::{parse_component_analysis, repair_component_analysis, Component, ComponentAnalysis, Distinctiveness};
pub use overlap::filter_by_overlap;
pub use parse::{extract_json, parse_oracle_json, OracleOutputError};
