//! Receipt and matching data model.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One line of OCR output, with its position in the extracted sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    /// Zero-based position in the original ordered sequence.
    pub index: usize,
    /// Raw text as produced by the extractor.
    pub text: String,
}

impl ReceiptLine {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// Number a sequence of raw lines in order.
    pub fn from_lines<I, S>(lines: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lines
            .into_iter()
            .enumerate()
            .map(|(index, text)| Self::new(index, text))
            .collect()
    }
}

/// A receipt line that survived normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Position of the source line on the receipt.
    pub line: usize,
    /// Normalized text sent to the matcher.
    pub text: String,
}

/// Names of the entries on the target list, snapshotted for one run.
///
/// Names are unique; iteration order is the order of first insertion so
/// prompts are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceItemSet {
    items: Vec<String>,
}

impl ReferenceItemSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a name, returning false if it was already present.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.items.push(name);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|item| item == name)
    }

    /// Resolve an oracle answer to the canonical reference name.
    ///
    /// Exact matches win; otherwise a single case-insensitive match is
    /// accepted. Ambiguous or unknown answers resolve to `None`.
    pub fn resolve(&self, answer: &str) -> Option<&str> {
        if let Some(item) = self.items.iter().find(|item| *item == answer) {
            return Some(item.as_str());
        }

        let folded = answer.to_lowercase();
        let mut hits = self
            .items
            .iter()
            .filter(|item| item.to_lowercase() == folded);
        match (hits.next(), hits.next()) {
            (Some(item), None) => Some(item.as_str()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }
}

impl<S: Into<String>> FromIterator<S> for ReferenceItemSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for name in iter {
            set.insert(name);
        }
        set
    }
}

/// Outcome of matching one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reference", rename_all = "snake_case")]
pub enum Matched {
    /// The candidate corresponds to this reference entry.
    Reference(String),
    /// No correspondence found (including absorbed failures).
    NoMatch,
}

impl Matched {
    pub fn reference(&self) -> Option<&str> {
        match self {
            Matched::Reference(name) => Some(name),
            Matched::NoMatch => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Matched::Reference(_))
    }
}

/// Result of matching one filtered candidate. Never revised within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub candidate: Candidate,
    pub matched: Matched,
}

/// A confirmed receipt-line to list-entry correspondence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Candidate text from the receipt.
    pub receipt: String,
    /// Matched reference name.
    pub reference: String,
}

/// Ordered mapping of candidate text to matched reference name.
///
/// Only confirmed matches are stored. Entries follow receipt order; a
/// repeated candidate text keeps its first position and takes the latest
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizedMapping {
    entries: Vec<MappingEntry>,
    /// True when the run stopped before every candidate was processed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    partial: bool,
}

impl CategorizedMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a match for a candidate.
    pub fn insert(&mut self, receipt: impl Into<String>, reference: impl Into<String>) {
        let receipt = receipt.into();
        let reference = reference.into();
        match self.entries.iter_mut().find(|entry| entry.receipt == receipt) {
            Some(entry) => entry.reference = reference,
            None => self.entries.push(MappingEntry { receipt, reference }),
        }
    }

    /// Record the outcome of a match, ignoring non-matches.
    pub fn record(&mut self, result: &MatchResult) {
        if let Matched::Reference(name) = &result.matched {
            self.insert(result.candidate.text.clone(), name.clone());
        }
    }

    pub fn get(&self, receipt: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.receipt == receipt)
            .map(|entry| entry.reference.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|entry| (entry.receipt.as_str(), entry.reference.as_str()))
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    /// Distinct reference names in first-match order.
    pub fn matched_references(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.entries
            .iter()
            .map(|entry| entry.reference.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub(crate) fn mark_partial(&mut self) {
        self.partial = true;
    }
}
