//! Receipt pipeline: extraction, normalization, categorization.
//!
//! The pipeline never touches the shopping list. Callers apply the returned
//! mapping themselves, see [`crate::list::apply_mapping`].

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::categorize::Categorizer;
use crate::error::Result;
use crate::models::config::BonmatchConfig;
use crate::models::receipt::{Candidate, CategorizedMapping, MatchResult, ReferenceItemSet};
use crate::normalize::TextNormalizer;
use crate::ocr::ReceiptExtractor;
use crate::oracle::SemanticMatcher;

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub image: PathBuf,
    /// Lines returned by the extractor before filtering.
    pub line_count: usize,
    pub candidates: Vec<Candidate>,
    /// Confirmed matches; flagged partial when the run deadline cut it short.
    pub mapping: CategorizedMapping,
    pub elapsed_ms: u64,
    pub processed_at: DateTime<Utc>,
}

/// Runs one receipt through extraction, filtering and matching.
pub struct ReceiptPipeline<E, M> {
    extractor: E,
    normalizer: TextNormalizer,
    categorizer: Categorizer<M>,
}

impl<E: ReceiptExtractor, M: SemanticMatcher> ReceiptPipeline<E, M> {
    pub fn new(extractor: E, normalizer: TextNormalizer, categorizer: Categorizer<M>) -> Self {
        Self {
            extractor,
            normalizer,
            categorizer,
        }
    }

    /// Build a pipeline with normalization, concurrency and deadline from config.
    pub fn from_config(extractor: E, matcher: M, config: &BonmatchConfig) -> Self {
        let categorizer = Categorizer::new(matcher)
            .with_concurrency(config.oracle.concurrency)
            .with_optional_deadline(config.pipeline.run_timeout());

        Self::new(
            extractor,
            TextNormalizer::new(config.normalization.clone()),
            categorizer,
        )
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn categorizer(&self) -> &Categorizer<M> {
        &self.categorizer
    }

    /// Process one receipt against a reference snapshot.
    ///
    /// Fails only when the image cannot be read; matching problems are
    /// absorbed per candidate and show up as missing mapping entries.
    pub async fn process(&self, image: &Path, references: &ReferenceItemSet) -> Result<PipelineReport> {
        self.process_with(image, references, |_| {}).await
    }

    /// Like [`process`](Self::process), calling `on_result` after each candidate.
    pub async fn process_with<F>(
        &self,
        image: &Path,
        references: &ReferenceItemSet,
        on_result: F,
    ) -> Result<PipelineReport>
    where
        F: FnMut(&MatchResult),
    {
        let start = Instant::now();
        info!("Processing receipt: {}", image.display());

        let lines = self.extractor.extract(image)?;
        let candidates = self.normalizer.normalize(&lines);

        info!(
            "Extracted {} lines, {} candidates, {} list items",
            lines.len(),
            candidates.len(),
            references.len()
        );

        let mapping = self
            .categorizer
            .categorize_with(&candidates, references, on_result)
            .await;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            "Finished {} in {}ms: {} matches",
            image.display(),
            elapsed_ms,
            mapping.len()
        );

        Ok(PipelineReport {
            image: image.to_path_buf(),
            line_count: lines.len(),
            candidates,
            mapping,
            elapsed_ms,
            processed_at: Utc::now(),
        })
    }
}
