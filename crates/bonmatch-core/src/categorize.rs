//! Drives the matcher over every candidate and builds the categorized mapping.

use std::time::Duration;

use futures_util::{StreamExt, stream};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::receipt::{
    Candidate, CategorizedMapping, MatchResult, Matched, ReferenceItemSet,
};
use crate::oracle::SemanticMatcher;

/// Matches filtered candidates against a reference set.
pub struct Categorizer<M> {
    matcher: M,
    concurrency: usize,
    deadline: Option<Duration>,
}

impl<M: SemanticMatcher> Categorizer<M> {
    /// Create a sequential categorizer with no deadline.
    pub fn new(matcher: M) -> Self {
        Self {
            matcher,
            concurrency: 1,
            deadline: None,
        }
    }

    /// Allow up to `n` matcher calls in flight. Results keep receipt order.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Stop between candidates once `timeout` has elapsed since the run began.
    pub fn with_deadline(mut self, timeout: Duration) -> Self {
        self.deadline = Some(timeout);
        self
    }

    /// Set or clear the run deadline.
    pub fn with_optional_deadline(mut self, timeout: Option<Duration>) -> Self {
        self.deadline = timeout;
        self
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    /// Match one candidate, absorbing failures and unknown answers into `NoMatch`.
    pub async fn match_one(&self, candidate: &Candidate, references: &ReferenceItemSet) -> MatchResult {
        info!("Processing receipt item: {}", candidate.text);

        let matched = match self.matcher.match_candidate(&candidate.text, references).await {
            Ok(Some(answer)) => match references.resolve(&answer) {
                Some(name) => Matched::Reference(name.to_string()),
                None => {
                    warn!(
                        candidate = %candidate.text,
                        answer = %answer,
                        matcher = self.matcher.name(),
                        "Matcher returned an item that is not on the list, ignoring"
                    );
                    Matched::NoMatch
                }
            },
            Ok(None) => Matched::NoMatch,
            Err(e) => {
                warn!(
                    candidate = %candidate.text,
                    error = %e,
                    matcher = self.matcher.name(),
                    "Matching failed, treating as no match"
                );
                Matched::NoMatch
            }
        };

        match &matched {
            Matched::Reference(name) => info!("Matched '{}' -> '{}'", candidate.text, name),
            Matched::NoMatch => debug!("No match for '{}'", candidate.text),
        }

        MatchResult {
            candidate: candidate.clone(),
            matched,
        }
    }

    /// Match every candidate in order and collect the confirmed matches.
    pub async fn categorize(
        &self,
        candidates: &[Candidate],
        references: &ReferenceItemSet,
    ) -> CategorizedMapping {
        self.categorize_with(candidates, references, |_| {}).await
    }

    /// Like [`categorize`](Self::categorize), reporting each result as it lands.
    ///
    /// `on_result` sees results in candidate order. If the deadline passes,
    /// the remaining candidates are skipped and the mapping is marked partial.
    pub async fn categorize_with<F>(
        &self,
        candidates: &[Candidate],
        references: &ReferenceItemSet,
        mut on_result: F,
    ) -> CategorizedMapping
    where
        F: FnMut(&MatchResult),
    {
        let mut mapping = CategorizedMapping::new();
        let deadline = self.deadline.map(|timeout| Instant::now() + timeout);

        let mut results = std::pin::pin!(
            stream::iter(candidates)
                .map(|candidate| self.match_one(candidate, references))
                .buffered(self.concurrency)
        );

        let mut processed = 0usize;
        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, results.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            "Run deadline reached after {}/{} candidates, keeping partial results",
                            processed,
                            candidates.len()
                        );
                        mapping.mark_partial();
                        break;
                    }
                },
                None => results.next().await,
            };

            let Some(result) = next else {
                break;
            };

            processed += 1;
            mapping.record(&result);
            on_result(&result);
        }

        info!(
            "Categorized {} candidates, {} matched",
            processed,
            mapping.len()
        );

        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;
    use crate::models::receipt::ReceiptLine;
    use crate::normalize::TextNormalizer;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// Formatted log output collected by a test-local subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        /// Route this thread's events here until the guard drops.
        fn install(&self) -> tracing::subscriber::DefaultGuard {
            let subscriber = tracing_subscriber::fmt()
                .with_writer(self.clone())
                .with_ansi(false)
                .with_max_level(tracing::Level::WARN)
                .finish();
            tracing::subscriber::set_default(subscriber)
        }

        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Deterministic matcher driven by a lookup table.
    #[derive(Default)]
    struct ScriptedMatcher {
        answers: HashMap<String, Result<String, String>>,
        delays: HashMap<String, u64>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedMatcher {
        fn answer(mut self, candidate: &str, answer: &str) -> Self {
            self.answers.insert(candidate.into(), Ok(answer.into()));
            self
        }

        fn fail(mut self, candidate: &str) -> Self {
            self.answers.insert(candidate.into(), Err("connection reset".into()));
            self
        }

        fn delay(mut self, candidate: &str, millis: u64) -> Self {
            self.delays.insert(candidate.into(), millis);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SemanticMatcher for ScriptedMatcher {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn match_candidate(
            &self,
            candidate: &str,
            _references: &ReferenceItemSet,
        ) -> Result<Option<String>, OracleError> {
            self.calls.lock().unwrap().push(candidate.to_string());
            if let Some(millis) = self.delays.get(candidate) {
                tokio::time::sleep(Duration::from_millis(*millis)).await;
            }
            match self.answers.get(candidate) {
                Some(Ok(answer)) => Ok(crate::oracle::interpret_answer(answer)),
                Some(Err(reason)) => Err(OracleError::Remote(reason.clone())),
                None => Ok(None),
            }
        }
    }

    fn candidates(texts: &[&str]) -> Vec<Candidate> {
        texts
            .iter()
            .enumerate()
            .map(|(line, text)| Candidate { line, text: text.to_string() })
            .collect()
    }

    fn refs(names: &[&str]) -> ReferenceItemSet {
        names.iter().copied().collect()
    }

    fn pairs(mapping: &CategorizedMapping) -> Vec<(&str, &str)> {
        mapping.iter().collect()
    }

    #[tokio::test]
    async fn test_scenario_a_single_match() {
        let matcher = ScriptedMatcher::default().answer("Frischmilch 1L", "Milk");
        let lines = ReceiptLine::from_lines(["3.50", "Frischmilch 1L", "x"]);
        let filtered = TextNormalizer::default().normalize(&lines);

        let categorizer = Categorizer::new(matcher);
        let mapping = categorizer
            .categorize(&filtered, &refs(&["Milk", "Kiwis", "Bread"]))
            .await;

        assert_eq!(pairs(&mapping), vec![("Frischmilch 1L", "Milk")]);
        assert_eq!(categorizer.matcher().calls(), vec!["Frischmilch 1L"]);
    }

    #[tokio::test]
    async fn test_scenario_b_empty_reference_set() {
        let matcher = ScriptedMatcher::default().answer("Brot", "Bread");
        let mapping = Categorizer::new(matcher)
            .categorize(&candidates(&["Brot", "Milch"]), &ReferenceItemSet::new())
            .await;
        assert!(mapping.is_empty());
    }

    #[tokio::test]
    async fn test_scenario_d_unknown_answer_is_dropped() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();

        let matcher = ScriptedMatcher::default().answer("Joghurt Natur", "Yogurt");
        let mapping = Categorizer::new(matcher)
            .categorize(&candidates(&["Joghurt Natur"]), &refs(&["Milk"]))
            .await;
        assert!(mapping.is_empty());

        let output = logs.contents();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("Joghurt Natur"), "{output}");
        assert!(output.contains("Yogurt"), "{output}");
    }

    #[tokio::test]
    async fn test_answer_casing_is_canonicalized() {
        let matcher = ScriptedMatcher::default().answer("KIWI GOLD", "kiwis");
        let mapping = Categorizer::new(matcher)
            .categorize(&candidates(&["KIWI GOLD"]), &refs(&["Milk", "Kiwis"]))
            .await;
        assert_eq!(mapping.get("KIWI GOLD"), Some("Kiwis"));
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_batch() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();

        let matcher = ScriptedMatcher::default()
            .answer("Vollkornbrot", "Bread")
            .fail("Frischmilch")
            .answer("Kiwi", "Kiwis");
        let categorizer = Categorizer::new(matcher);
        let mapping = categorizer
            .categorize(
                &candidates(&["Vollkornbrot", "Frischmilch", "Kiwi"]),
                &refs(&["Milk", "Kiwis", "Bread"]),
            )
            .await;

        assert_eq!(
            pairs(&mapping),
            vec![
                ("Vollkornbrot", "Bread"),
                ("Kiwi", "Kiwis"),
            ]
        );
        assert_eq!(categorizer.matcher().calls().len(), 3);

        let output = logs.contents();
        let warning = output
            .lines()
            .find(|line| line.contains("WARN") && line.contains("Frischmilch"))
            .unwrap_or_else(|| panic!("no warning for failed candidate in:\n{output}"));
        assert!(warning.contains("connection reset"), "{warning}");
    }

    #[tokio::test]
    async fn test_values_always_come_from_reference_set() {
        let matcher = ScriptedMatcher::default()
            .answer("a1", "Milk")
            .answer("b2", "Cheese")
            .answer("c3", "Milk, Bread")
            .answer("d4", "No match found")
            .answer("e5", "\"Bread\"");
        let references = refs(&["Milk", "Bread"]);
        let mapping = Categorizer::new(matcher)
            .categorize(&candidates(&["a1", "b2", "c3", "d4", "e5"]), &references)
            .await;

        assert!(mapping.iter().all(|(_, value)| references.contains(value)));
        assert_eq!(mapping.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_matches_are_kept() {
        let matcher = ScriptedMatcher::default()
            .answer("Frischmilch", "Milk")
            .answer("H-Milch", "Milk");
        let mapping = Categorizer::new(matcher)
            .categorize(&candidates(&["Frischmilch", "H-Milch"]), &refs(&["Milk"]))
            .await;
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.matched_references(), vec!["Milk"]);
    }

    #[tokio::test]
    async fn test_idempotent_for_deterministic_matcher() {
        let build = || {
            ScriptedMatcher::default()
                .answer("Bananen", "Bananas")
                .answer("Milch", "Milk")
        };
        let input = candidates(&["Milch", "Pfand", "Bananen"]);
        let references = refs(&["Milk", "Bananas"]);

        let first = Categorizer::new(build()).categorize(&input, &references).await;
        let second = Categorizer::new(build()).categorize(&input, &references).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_results_keep_receipt_order() {
        let matcher = ScriptedMatcher::default()
            .answer("slow", "Milk")
            .delay("slow", 50)
            .answer("fast", "Bread");
        let mut seen = Vec::new();
        let mapping = Categorizer::new(matcher)
            .with_concurrency(4)
            .categorize_with(
                &candidates(&["slow", "fast"]),
                &refs(&["Milk", "Bread"]),
                |result| seen.push(result.candidate.text.clone()),
            )
            .await;

        assert_eq!(seen, vec!["slow", "fast"]);
        assert_eq!(
            pairs(&mapping),
            vec![("slow", "Milk"), ("fast", "Bread")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_returns_partial_mapping() {
        let matcher = ScriptedMatcher::default()
            .answer("Milch", "Milk")
            .answer("Brot", "Bread")
            .delay("Brot", 10_000);
        let mapping = Categorizer::new(matcher)
            .with_deadline(Duration::from_secs(1))
            .categorize(&candidates(&["Milch", "Brot"]), &refs(&["Milk", "Bread"]))
            .await;

        assert!(mapping.is_partial());
        assert_eq!(pairs(&mapping), vec![("Milch", "Milk")]);
    }
}
