//! CLI command implementations.

pub mod ask;
pub mod batch;
pub mod config;
pub mod extract;
pub mod list;
pub mod match_cmd;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use bonmatch_core::models::config::{BonmatchConfig, OcrConfig};
use bonmatch_core::{
    ExtractionError, JsonShoppingList, OcrReceiptExtractor, OracleClient, ReceiptExtractor,
    ReceiptLine, ReferenceItemSet, ShoppingList, TextFileExtractor,
};

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bonmatch")
        .join("config.json")
}

/// Default location of the shopping list file.
pub fn default_list_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bonmatch")
        .join("lists.json")
}

/// Load the config from `-c`, else the default file, else defaults.
pub fn load_config(config_path: Option<&Path>) -> anyhow::Result<BonmatchConfig> {
    match config_path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Ok(BonmatchConfig::from_file(path)?)
        }
        None => {
            let path = default_config_path();
            if path.exists() {
                debug!("Using config file {}", path.display());
                Ok(BonmatchConfig::from_file(&path)?)
            } else {
                Ok(BonmatchConfig::default())
            }
        }
    }
}

/// Where the reference items come from.
#[derive(Args, Clone)]
pub struct ReferenceArgs {
    /// Shopping list file (default: data dir)
    #[arg(long)]
    pub list_file: Option<PathBuf>,

    /// List uuid or name (default: first list)
    #[arg(short, long)]
    pub list: Option<String>,

    /// Use these items instead of reading a list (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub items: Vec<String>,
}

impl ReferenceArgs {
    pub fn list_path(&self) -> PathBuf {
        self.list_file.clone().unwrap_or_else(default_list_path)
    }

    pub fn open_store(&self) -> anyhow::Result<JsonShoppingList> {
        let path = self.list_path();
        if !path.exists() {
            anyhow::bail!(
                "Shopping list file not found at {}.\n\n\
                 Run 'bonmatch list add <ITEM>' to create one, or pass --items.",
                path.display()
            );
        }
        Ok(JsonShoppingList::open(&path)?)
    }

    /// Snapshot the reference items, opening the list store when needed.
    pub async fn load(
        &self,
        need_store: bool,
    ) -> anyhow::Result<(ReferenceItemSet, Option<JsonShoppingList>)> {
        let store = if need_store || self.items.is_empty() {
            Some(self.open_store()?)
        } else {
            None
        };

        let references: ReferenceItemSet = if !self.items.is_empty() {
            self.items
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .collect()
        } else {
            match &store {
                Some(store) => store.load_reference_items(self.list.as_deref()).await?,
                None => ReferenceItemSet::new(),
            }
        };

        if references.is_empty() {
            warn!("Reference list is empty, nothing can match");
        } else {
            info!("Matching against {} list items", references.len());
        }

        Ok((references, store))
    }
}

/// Build the oracle client, applying a `--model` override.
pub fn build_matcher(config: &mut BonmatchConfig, model: Option<&str>) -> anyhow::Result<OracleClient> {
    if let Some(model) = model {
        config.oracle.model = model.to_string();
    }
    let client = OracleClient::new(&config.oracle)?;
    debug!("Using model {} at {}", client.model(), config.oracle.endpoint());
    Ok(client)
}

/// Picks the extractor by file extension: `.txt` is read as text, anything
/// else goes through OCR. OCR models are loaded on first use.
pub struct ReceiptSource {
    ocr_config: OcrConfig,
    ocr: OnceLock<Result<OcrReceiptExtractor, String>>,
}

impl ReceiptSource {
    pub fn new(ocr_config: OcrConfig) -> Self {
        Self {
            ocr_config,
            ocr: OnceLock::new(),
        }
    }

    fn ocr(&self) -> Result<&OcrReceiptExtractor, ExtractionError> {
        self.ocr
            .get_or_init(|| {
                OcrReceiptExtractor::from_config(self.ocr_config.clone()).map_err(|e| e.to_string())
            })
            .as_ref()
            .map_err(|msg| ExtractionError::ModelLoad(msg.clone()))
    }
}

impl ReceiptExtractor for ReceiptSource {
    fn extract(&self, image: &Path) -> Result<Vec<ReceiptLine>, ExtractionError> {
        if is_text_file(image) {
            TextFileExtractor.extract(image)
        } else {
            if !image.exists() {
                return Err(ExtractionError::NotFound(image.to_path_buf()));
            }
            // Model loading and inference are CPU bound; keep them off the
            // async workers.
            tokio::task::block_in_place(|| self.ocr()?.extract(image))
        }
    }
}

pub fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
}

pub fn is_supported_input(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    matches!(
        ext.to_lowercase().as_str(),
        "txt" | "png" | "jpg" | "jpeg" | "tiff" | "bmp" | "webp"
    )
}

/// Spinner reporting each processed candidate.
pub fn item_spinner() -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} items {msg}")?,
    );
    Ok(pb)
}

/// Write output to a file, or print it.
pub fn emit(output: &str, path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, output)?;
            println!(
                "{} Output written to {}",
                style("✓").green(),
                path.display()
            );
        }
        None => println!("{}", output),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_detection() {
        assert!(is_text_file(Path::new("receipt.TXT")));
        assert!(!is_text_file(Path::new("receipt.jpg")));
        assert!(is_supported_input(Path::new("scan.JPEG")));
        assert!(!is_supported_input(Path::new("notes.pdf")));
    }

    #[test]
    fn test_receipt_source_reads_text_without_models() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.txt");
        std::fs::write(&path, "Milch\nBrot\n").unwrap();

        let source = ReceiptSource::new(OcrConfig {
            model_dir: dir.path().join("missing"),
            ..OcrConfig::default()
        });
        let lines = source.extract(&path).unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_receipt_source_missing_image() {
        let source = ReceiptSource::new(OcrConfig::default());
        let err = source.extract(Path::new("/no/such/receipt.jpg")).unwrap_err();
        assert!(matches!(err, ExtractionError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_receipt_source_runs_ocr_inside_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.jpg");
        std::fs::write(&path, [0xff, 0xd8, 0xff]).unwrap();

        let source = ReceiptSource::new(OcrConfig {
            model_dir: dir.path().join("models"),
            ..OcrConfig::default()
        });
        let err = source.extract(&path).unwrap_err();
        assert!(matches!(err, ExtractionError::ModelLoad(_)));

        // The load failure is remembered rather than retried.
        let again = source.extract(&path).unwrap_err();
        assert!(matches!(again, ExtractionError::ModelLoad(_)));
    }
}
