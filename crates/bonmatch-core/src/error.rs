//! Error types for the bonmatch-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the bonmatch library.
///
/// Only configuration and extraction failures abort a run. Oracle failures
/// are absorbed per candidate and never surface here.
#[derive(Error, Debug)]
pub enum BonmatchError {
    /// Configuration error (fatal, raised before any run starts).
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Receipt text extraction error (fatal for that receipt).
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Shopping list collaborator error.
    #[error("list error: {0}")]
    List(#[from] ListError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors related to configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The oracle bearer credential is not configured.
    #[error("missing oracle credential: set `oracle.api_token` or the {env_var} environment variable")]
    MissingCredential { env_var: String },

    /// The oracle endpoint URL could not be parsed.
    #[error("invalid oracle URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Any other invalid setting.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors related to extracting text lines from a receipt image.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The image file does not exist.
    #[error("receipt image not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The image exists but could not be read or decoded.
    #[error("failed to decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    /// OCR models could not be loaded.
    #[error("failed to load OCR models: {0}")]
    ModelLoad(String),

    /// The OCR engine failed on a decoded image.
    #[error("OCR failed: {0}")]
    Ocr(String),
}

/// Errors from a single matching oracle call.
///
/// These never abort a run: the categorizer logs them and resolves the
/// candidate to no match.
#[derive(Error, Debug)]
pub enum OracleError {
    /// Network or HTTP client failure.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// A streamed line was not a valid response fragment.
    #[error("malformed response fragment {line:?}: {reason}")]
    MalformedFragment { line: String, reason: String },

    /// The endpoint reported an error inside the stream.
    #[error("oracle reported an error: {0}")]
    Remote(String),
}

/// Errors from the shopping list collaborator.
#[derive(Error, Debug)]
pub enum ListError {
    /// The named item is not on the list.
    #[error("item {item:?} not found on list {list:?}")]
    NotFound { list: String, item: String },

    /// No list matches the given identifier.
    #[error("unknown shopping list: {0}")]
    UnknownList(String),

    /// The list document could not be read or written.
    #[error("list store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The list document is not valid JSON.
    #[error("invalid list document: {0}")]
    Format(#[from] serde_json::Error),
}

/// Result type for the bonmatch library.
pub type Result<T> = std::result::Result<T, BonmatchError>;
