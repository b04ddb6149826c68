//! Receipt text extraction.
//!
//! The pipeline only needs an ordered sequence of text lines per image; the
//! [`ReceiptExtractor`] trait is that seam. [`OcrReceiptExtractor`] runs a
//! PaddleOCR model pair through `pure-onnx-ocr`, [`TextFileExtractor`] reads
//! lines that were extracted elsewhere.

mod preprocessing;
#[cfg(feature = "ocr")]
mod pure_engine;

pub use preprocessing::ReceiptPreprocessor;
#[cfg(feature = "ocr")]
pub use pure_engine::OcrReceiptExtractor;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;
use crate::models::receipt::ReceiptLine;

/// Turns a receipt image reference into ordered text lines.
pub trait ReceiptExtractor {
    /// Extract lines in reading order (top to bottom).
    fn extract(&self, image: &Path) -> Result<Vec<ReceiptLine>, ExtractionError>;
}

impl<E: ReceiptExtractor + ?Sized> ReceiptExtractor for &E {
    fn extract(&self, image: &Path) -> Result<Vec<ReceiptLine>, ExtractionError> {
        (**self).extract(image)
    }
}

/// A recognized text region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBox {
    /// Axis-aligned bounds (min_x, min_y, max_x, max_y).
    pub rect: [f32; 4],

    /// Recognized text content.
    pub text: String,

    /// Recognition confidence score (0.0 - 1.0).
    pub confidence: f32,
}

impl TextBox {
    /// Get the vertical center of the box.
    pub fn center_y(&self) -> f32 {
        (self.rect[1] + self.rect[3]) / 2.0
    }

    /// Get the height of the box.
    pub fn height(&self) -> f32 {
        (self.rect[3] - self.rect[1]).max(0.0)
    }
}

/// Group text boxes into receipt lines.
///
/// Boxes whose vertical centers lie within `row_tolerance` (or half the box
/// height, whichever is larger) of the current line's first box join that
/// line. Lines are ordered top to bottom, boxes left to right, joined by a
/// single space. Empty lines are dropped.
pub fn group_into_lines(mut boxes: Vec<TextBox>, row_tolerance: f32) -> Vec<String> {
    boxes.sort_by(|a, b| a.center_y().total_cmp(&b.center_y()));

    let mut rows: Vec<Vec<TextBox>> = Vec::new();
    for text_box in boxes {
        let joins_last = rows.last().and_then(|row| row.first()).is_some_and(|anchor| {
            let tolerance = row_tolerance.max(anchor.height() / 2.0);
            (text_box.center_y() - anchor.center_y()).abs() <= tolerance
        });

        match rows.last_mut() {
            Some(row) if joins_last => row.push(text_box),
            _ => rows.push(vec![text_box]),
        }
    }

    rows.into_iter()
        .filter_map(|mut row| {
            row.sort_by(|a, b| a.rect[0].total_cmp(&b.rect[0]));
            let line = row
                .iter()
                .map(|b| b.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            (!line.is_empty()).then_some(line)
        })
        .collect()
}

/// Reads pre-extracted receipt lines from a UTF-8 text file, one per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFileExtractor;

impl ReceiptExtractor for TextFileExtractor {
    fn extract(&self, image: &Path) -> Result<Vec<ReceiptLine>, ExtractionError> {
        if !image.exists() {
            return Err(ExtractionError::NotFound(image.to_path_buf()));
        }

        let content = std::fs::read_to_string(image).map_err(|e| ExtractionError::Decode {
            path: image.to_path_buf(),
            reason: e.to_string(),
        })?;

        let lines = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty());
        Ok(ReceiptLine::from_lines(lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_box(x: f32, y: f32, w: f32, h: f32, text: &str) -> TextBox {
        TextBox {
            rect: [x, y, x + w, y + h],
            text: text.to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_boxes_on_one_row_join_left_to_right() {
        let boxes = vec![
            text_box(300.0, 102.0, 60.0, 20.0, "1,29"),
            text_box(10.0, 100.0, 200.0, 20.0, "Frischmilch 1L"),
            text_box(10.0, 140.0, 120.0, 20.0, "Kiwi gold"),
        ];
        assert_eq!(
            group_into_lines(boxes, 8.0),
            vec!["Frischmilch 1L 1,29", "Kiwi gold"]
        );
    }

    #[test]
    fn test_rows_ordered_top_to_bottom() {
        let boxes = vec![
            text_box(10.0, 300.0, 50.0, 20.0, "SUMME"),
            text_box(10.0, 10.0, 50.0, 20.0, "REWE"),
            text_box(10.0, 150.0, 50.0, 20.0, "Brot"),
        ];
        assert_eq!(group_into_lines(boxes, 8.0), vec!["REWE", "Brot", "SUMME"]);
    }

    #[test]
    fn test_blank_boxes_dropped() {
        let boxes = vec![
            text_box(10.0, 10.0, 50.0, 20.0, "  "),
            text_box(10.0, 60.0, 50.0, 20.0, "Ei"),
        ];
        assert_eq!(group_into_lines(boxes, 8.0), vec!["Ei"]);
    }

    #[test]
    fn test_text_file_extractor_reads_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.txt");
        std::fs::write(&path, "REWE\n\n  3.50\nFrischmilch 1L\n").unwrap();

        let lines = TextFileExtractor.extract(&path).unwrap();
        assert_eq!(
            lines,
            ReceiptLine::from_lines(["REWE", "3.50", "Frischmilch 1L"])
        );
    }

    #[test]
    fn test_text_file_extractor_missing_file() {
        let err = TextFileExtractor
            .extract(Path::new("/definitely/not/here.txt"))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NotFound(_)));
    }

    #[test]
    fn test_text_file_extractor_rejects_binary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x9f]).unwrap();

        let err = TextFileExtractor.extract(&path).unwrap_err();
        assert!(matches!(err, ExtractionError::Decode { .. }));
    }
}
