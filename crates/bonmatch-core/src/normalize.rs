//! Candidate filtering for raw receipt lines.
//!
//! Removes lines that cannot be item names (too short, or a bare price) and
//! applies the configured local normalization policy to the survivors.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace};

use crate::models::config::NormalizationConfig;
use crate::models::receipt::{Candidate, ReceiptLine};

lazy_static! {
    /// Bare price or numeric token: optional currency symbol, digits, and an
    /// optional `.`/`,` decimal part of one or two digits.
    pub static ref PRICE_LINE: Regex = Regex::new(
        r"^\p{Sc}?\d+(?:[.,]\d{1,2})?$"
    ).unwrap();

    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Returns true if the trimmed text is only a price or number.
pub fn is_price_line(text: &str) -> bool {
    PRICE_LINE.is_match(text.trim())
}

/// Filters and normalizes receipt lines into match candidates.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    config: NormalizationConfig,
}

impl TextNormalizer {
    pub fn new(config: NormalizationConfig) -> Self {
        Self { config }
    }

    /// Decide whether a single line is a candidate, returning its normalized text.
    pub fn normalize_line(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();

        if trimmed.chars().count() < self.config.min_length {
            trace!("Dropping short line {:?}", raw);
            return None;
        }

        if PRICE_LINE.is_match(trimmed) {
            trace!("Dropping price line {:?}", raw);
            return None;
        }

        let mut text = if self.config.collapse_whitespace {
            WHITESPACE_RUN.replace_all(trimmed, " ").into_owned()
        } else {
            trimmed.to_string()
        };

        if self.config.casefold {
            text = text.to_lowercase();
        }

        Some(text)
    }

    /// Filter an ordered sequence of receipt lines, preserving order.
    pub fn normalize(&self, lines: &[ReceiptLine]) -> Vec<Candidate> {
        let candidates: Vec<Candidate> = lines
            .iter()
            .filter_map(|line| {
                self.normalize_line(&line.text).map(|text| Candidate {
                    line: line.index,
                    text,
                })
            })
            .collect();

        debug!(
            "Normalized {} lines into {} candidates",
            lines.len(),
            candidates.len()
        );

        candidates
    }
}
