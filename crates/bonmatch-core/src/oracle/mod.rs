//! Matching oracle: decides which list entry, if any, a receipt line names.
//!
//! The [`SemanticMatcher`] trait is the seam between the categorizer and
//! whatever does the fuzzy matching. [`OracleClient`] implements it on top of
//! a local generative model server.

mod client;
mod prompt;
mod stream;

pub use client::OracleClient;
pub use prompt::build_prompt;
pub use stream::{FragmentDecoder, GenerateFragment, collect_response};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OracleError;
use crate::models::receipt::ReferenceItemSet;

/// Literal answer meaning the candidate is not on the list.
pub const NO_MATCH_SENTINEL: &str = "No match found";

/// A capability that maps a candidate string to at most one reference entry.
#[async_trait]
pub trait SemanticMatcher: Send + Sync {
    /// Matcher name used in logs.
    fn name(&self) -> &str;

    /// Match one candidate against the full reference set.
    ///
    /// `Ok(None)` means no match. A returned name is only a claim: callers
    /// must check it against `references` before trusting it.
    async fn match_candidate(
        &self,
        candidate: &str,
        references: &ReferenceItemSet,
    ) -> Result<Option<String>, OracleError>;
}

#[async_trait]
impl<M: SemanticMatcher + ?Sized> SemanticMatcher for Arc<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn match_candidate(
        &self,
        candidate: &str,
        references: &ReferenceItemSet,
    ) -> Result<Option<String>, OracleError> {
        (**self).match_candidate(candidate, references).await
    }
}

/// Interpret an aggregated oracle answer.
///
/// Strips whitespace, a trailing period and one pair of surrounding quotes.
/// Empty answers and the sentinel (any casing) mean no match.
pub fn interpret_answer(raw: &str) -> Option<String> {
    let mut answer = strip_period(raw);

    for quote in ['"', '\'', '`'] {
        if answer.len() >= 2 && answer.starts_with(quote) && answer.ends_with(quote) {
            answer = strip_period(&answer[1..answer.len() - 1]);
            break;
        }
    }

    if answer.is_empty() || answer.eq_ignore_ascii_case(NO_MATCH_SENTINEL) {
        None
    } else {
        Some(answer.to_string())
    }
}

fn strip_period(text: &str) -> &str {
    let text = text.trim();
    text.strip_suffix('.').unwrap_or(text).trim_end()
}
