//! Receipt extractor backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).

use std::path::Path;
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use crate::error::ExtractionError;
use crate::models::config::OcrConfig;
use crate::models::receipt::ReceiptLine;

use super::preprocessing::ReceiptPreprocessor;
use super::{ReceiptExtractor, TextBox, group_into_lines};

/// OCR extractor for receipt photos.
pub struct OcrReceiptExtractor {
    engine: pure_onnx_ocr::engine::OcrEngine,
    preprocessor: ReceiptPreprocessor,
    config: OcrConfig,
}

impl OcrReceiptExtractor {
    /// Load detection and recognition models from `config.model_dir`.
    pub fn from_config(config: OcrConfig) -> Result<Self, ExtractionError> {
        let det_path = config.model_path(&config.detection_model);
        let rec_path = config.model_path(&config.recognition_model);
        let dict_path = config.model_path(&config.dictionary);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(ExtractionError::ModelLoad(format!(
                    "missing model file {}",
                    path.display()
                )));
            }
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| ExtractionError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", config.model_dir.display());

        Ok(Self {
            engine,
            preprocessor: ReceiptPreprocessor::from_config(&config),
            config,
        })
    }

    /// Recognize text regions in a decoded image.
    pub fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextBox>, ExtractionError> {
        let start = Instant::now();
        let prepared = self.preprocessor.prepare(image);
        let (width, height) = prepared.dimensions();

        debug!("Running OCR on {}x{} image", width, height);

        let results = self
            .engine
            .run_from_image(&prepared)
            .map_err(|e| ExtractionError::Ocr(format!("pure-onnx-ocr: {}", e)))?;

        let boxes: Vec<TextBox> = results
            .iter()
            .map(|r| TextBox {
                rect: polygon_to_rect(&r.bounding_box),
                text: if self.config.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                },
                confidence: r.confidence,
            })
            .collect();

        info!(
            "OCR complete: {} text boxes in {}ms",
            boxes.len(),
            start.elapsed().as_millis()
        );

        Ok(boxes)
    }
}

impl ReceiptExtractor for OcrReceiptExtractor {
    fn extract(&self, image: &Path) -> Result<Vec<ReceiptLine>, ExtractionError> {
        if !image.exists() {
            return Err(ExtractionError::NotFound(image.to_path_buf()));
        }

        let decoded = image::open(image).map_err(|e| ExtractionError::Decode {
            path: image.to_path_buf(),
            reason: e.to_string(),
        })?;

        let boxes = self.recognize(&decoded)?;
        let lines = group_into_lines(boxes, self.config.row_tolerance);

        debug!("Grouped text boxes into {} lines", lines.len());

        Ok(ReceiptLine::from_lines(lines))
    }
}

/// Convert a `Polygon<f64>` to axis-aligned `[min_x, min_y, max_x, max_y]`.
fn polygon_to_rect(polygon: &pure_onnx_ocr::Polygon<f64>) -> [f32; 4] {
    let mut rect = [f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY];
    for coord in polygon.exterior().coords() {
        rect[0] = rect[0].min(coord.x as f32);
        rect[1] = rect[1].min(coord.y as f32);
        rect[2] = rect[2].max(coord.x as f32);
        rect[3] = rect[3].max(coord.y as f32);
    }
    if rect[0] > rect[2] {
        return [0.0; 4];
    }
    rect
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_models_reported_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let config = OcrConfig {
            model_dir: dir.path().to_path_buf(),
            ..OcrConfig::default()
        };
        let err = OcrReceiptExtractor::from_config(config).err().unwrap();
        assert!(matches!(err, ExtractionError::ModelLoad(ref msg) if msg.contains("det.onnx")));
    }
}
