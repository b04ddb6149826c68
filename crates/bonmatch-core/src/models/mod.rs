//! Data model and configuration.

pub mod config;
pub mod receipt;

pub use config::{BonmatchConfig, NormalizationConfig, OcrConfig, OracleConfig, PipelineConfig};
pub use receipt::{
    Candidate, CategorizedMapping, MappingEntry, MatchResult, Matched, ReceiptLine,
    ReferenceItemSet,
};
