//! Configuration structures for the receipt matching pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Main configuration for the bonmatch pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BonmatchConfig {
    /// Matching oracle configuration.
    pub oracle: OracleConfig,

    /// OCR configuration.
    pub ocr: OcrConfig,

    /// Candidate normalization policy.
    pub normalization: NormalizationConfig,

    /// Pipeline run configuration.
    pub pipeline: PipelineConfig,
}

/// Matching oracle (local inference endpoint) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Base URL of the inference server.
    pub base_url: String,

    /// Path of the streaming generate endpoint.
    pub generate_path: String,

    /// Model identifier sent with every request.
    pub model: String,

    /// Bearer credential. Falls back to the `token_env` variable when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Environment variable holding the bearer credential.
    pub token_env: String,

    /// Timeout for one oracle call, including the streamed body.
    pub request_timeout_secs: u64,

    /// Maximum number of oracle calls in flight (1 = sequential).
    pub concurrency: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            generate_path: "/api/generate".to_string(),
            model: "mistral".to_string(),
            api_token: None,
            token_env: "OLLAMA_API_TOKEN".to_string(),
            request_timeout_secs: 120,
            concurrency: 1,
        }
    }
}

impl OracleConfig {
    /// Full URL of the generate endpoint.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.generate_path.trim_start_matches('/')
        )
    }

    /// Per-call request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolve the bearer credential from the config or the process environment.
    pub fn resolve_token(&self) -> Result<String, ConfigError> {
        self.resolve_token_with(|key| std::env::var(key).ok())
    }

    /// Resolve the bearer credential using a custom environment lookup.
    pub fn resolve_token_with<F>(&self, lookup: F) -> Result<String, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.api_token
            .clone()
            .or_else(|| lookup(&self.token_env))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential {
                env_var: self.token_env.clone(),
            })
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Keep `[UNK]` tokens in recognized text.
    pub keep_unk: bool,

    /// Convert to grayscale before recognition.
    pub grayscale: bool,

    /// Apply Otsu binarization (implies grayscale).
    pub binarize: bool,

    /// Gaussian blur sigma applied after binarization (0 disables).
    pub blur_sigma: f32,

    /// Upscale factor applied before recognition.
    pub upscale: f32,

    /// Maximum image dimension (longer side) after upscaling.
    pub max_image_size: u32,

    /// Vertical distance (pixels) within which text boxes share a line.
    pub row_tolerance: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            keep_unk: false,
            grayscale: true,
            binarize: true,
            blur_sigma: 1.0,
            upscale: 2.0,
            max_image_size: 4096,
            row_tolerance: 12.0,
        }
    }
}

impl OcrConfig {
    /// Get full path to a model file.
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.model_dir.join(model_name)
    }
}

/// Local normalization policy for candidate lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Minimum trimmed length (in characters) of a candidate.
    pub min_length: usize,

    /// Lowercase candidates before matching.
    pub casefold: bool,

    /// Collapse internal whitespace runs to a single space.
    pub collapse_whitespace: bool,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            min_length: 2,
            casefold: false,
            collapse_whitespace: false,
        }
    }
}

/// Pipeline run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Abort categorization after this many seconds, keeping partial results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,
}

impl PipelineConfig {
    /// Run deadline as a duration.
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

impl BonmatchConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
