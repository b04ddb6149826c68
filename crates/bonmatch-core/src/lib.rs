//! Core library for reconciling receipt photos with shopping lists.
//!
//! This crate provides:
//! - Receipt text extraction (pure Rust PaddleOCR via `pure-onnx-ocr`)
//! - Candidate filtering of noisy OCR lines
//! - A streaming client for a local generative model used as a fuzzy matcher
//! - Categorization of receipt lines against the open items of a list
//! - A JSON-backed shopping list store and fulfillment of matched items

pub mod error;
pub mod models;
pub mod normalize;
pub mod oracle;
pub mod categorize;
pub mod ocr;
pub mod list;
pub mod pipeline;

pub use error::{BonmatchError, ConfigError, ExtractionError, ListError, OracleError, Result};
pub use models::config::{BonmatchConfig, NormalizationConfig, OcrConfig, OracleConfig, PipelineConfig};
pub use models::receipt::{
    Candidate, CategorizedMapping, MappingEntry, MatchResult, Matched, ReceiptLine,
    ReferenceItemSet,
};
pub use normalize::TextNormalizer;
pub use oracle::{NO_MATCH_SENTINEL, OracleClient, SemanticMatcher};
pub use categorize::Categorizer;
pub use ocr::{ReceiptExtractor, ReceiptPreprocessor, TextBox, TextFileExtractor};
#[cfg(feature = "ocr")]
pub use ocr::OcrReceiptExtractor;
pub use list::{
    FulfillmentReport, Fulfillment, JsonShoppingList, ListSummary, ShoppingList, apply_mapping,
};
pub use pipeline::{PipelineReport, ReceiptPipeline};
