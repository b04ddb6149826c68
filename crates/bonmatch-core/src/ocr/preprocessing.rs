//! Image preprocessing for receipt photos.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use tracing::debug;

use crate::models::config::OcrConfig;

/// Prepares receipt photos for recognition.
///
/// Steps, each optional: grayscale, Otsu binarization, Gaussian blur,
/// upscaling capped at a maximum dimension.
#[derive(Debug, Clone)]
pub struct ReceiptPreprocessor {
    grayscale: bool,
    binarize: bool,
    blur_sigma: f32,
    upscale: f32,
    max_size: u32,
}

impl ReceiptPreprocessor {
    /// Create a preprocessor with default settings.
    pub fn new() -> Self {
        Self::from_config(&OcrConfig::default())
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            grayscale: config.grayscale,
            binarize: config.binarize,
            blur_sigma: config.blur_sigma,
            upscale: config.upscale,
            max_size: config.max_image_size,
        }
    }

    /// Set maximum image dimension.
    pub fn with_max_size(mut self, size: u32) -> Self {
        self.max_size = size;
        self
    }

    /// Run the configured steps.
    pub fn prepare(&self, image: &DynamicImage) -> DynamicImage {
        let (orig_width, orig_height) = image.dimensions();

        let mut prepared = if self.binarize {
            let gray = image.to_luma8();
            let threshold = otsu_threshold(&gray);
            debug!("Otsu threshold: {}", threshold);
            DynamicImage::ImageLuma8(binarize(&gray, threshold))
        } else if self.grayscale {
            DynamicImage::ImageLuma8(image.to_luma8())
        } else {
            image.clone()
        };

        if self.blur_sigma > 0.0 {
            prepared = prepared.blur(self.blur_sigma);
        }

        let (new_width, new_height) =
            self.calculate_scaled_dimensions(orig_width, orig_height);
        if (new_width, new_height) != (orig_width, orig_height) {
            prepared = prepared.resize_exact(new_width, new_height, FilterType::Triangle);
        }

        debug!(
            "Preprocessed {}x{} -> {}x{}",
            orig_width, orig_height, new_width, new_height
        );

        prepared
    }

    fn calculate_scaled_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = if self.upscale > 0.0 { self.upscale } else { 1.0 };
        let max_dim = width.max(height) as f32 * scale;

        let scale = if self.max_size > 0 && max_dim > self.max_size as f32 {
            // Never shrink below the original size.
            (self.max_size as f32 / width.max(height) as f32).max(1.0).min(scale)
        } else {
            scale
        };

        let new_width = (width as f32 * scale).round() as u32;
        let new_height = (height as f32 * scale).round() as u32;

        (new_width.max(1), new_height.max(1))
    }
}

impl Default for ReceiptPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Otsu's method: the threshold maximizing between-class variance.
pub fn otsu_threshold(image: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 127;
    }

    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(value, count)| value as f64 * *count as f64)
        .sum();

    let mut background_weight = 0u64;
    let mut background_sum = 0f64;
    let mut best_threshold = 0u8;
    let mut best_variance = -1f64;

    for (value, count) in histogram.iter().enumerate() {
        background_weight += count;
        if background_weight == 0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0 {
            break;
        }

        background_sum += value as f64 * *count as f64;
        let background_mean = background_sum / background_weight as f64;
        let foreground_mean = (weighted_total - background_sum) / foreground_weight as f64;

        let variance = background_weight as f64
            * foreground_weight as f64
            * (background_mean - foreground_mean).powi(2);

        if variance > best_variance {
            best_variance = variance;
            best_threshold = value as u8;
        }
    }

    best_threshold
}

fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut result = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let output = if pixel[0] > threshold { 255 } else { 0 };
        result.put_pixel(x, y, Luma([output]));
    }

    result
}
