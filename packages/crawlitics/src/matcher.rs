//! Blended lexical + semantic relevance scoring.
//!
//! Used by the navigator (listing titles vs the user query, filter
//! names vs on-page section titles) and by the reconciliation engine's
//! value comparison. Lexical scoring is always available; semantic
//! scoring comes from the optional [`Embedder`] and the matcher
//! degrades to lexical-only when it is absent or failing.

use std::sync::Arc;

use tracing::warn;

use crate::traits::embedder::Embedder;
use crate::types::config::MatcherConfig;

/// Lexical similarity in [0, 1], tolerant of partial overlap.
///
/// Containment of the shorter string in the longer one scores 1.0
/// (titles usually embed the query verbatim plus noise); otherwise the
/// best of Jaro-Winkler, normalized Levenshtein and query-token
/// coverage wins.
pub fn lexical_score(query: &str, candidate: &str) -> f32 {
    let a = query.trim().to_lowercase();
    let b = candidate.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    if longer.contains(shorter.as_str()) {
        return 1.0;
    }

    let jaro = strsim::jaro_winkler(&a, &b) as f32;
    let leven = strsim::normalized_levenshtein(&a, &b) as f32;

    let query_tokens: Vec<&str> = a.split_whitespace().collect();
    let coverage = if query_tokens.is_empty() {
        0.0
    } else {
        let hit = query_tokens.iter().filter(|t| b.contains(**t)).count();
        hit as f32 / query_tokens.len() as f32
    };

    jaro.max(leven).max(coverage)
}

/// Scores one query against candidate strings.
pub struct RelevanceMatcher {
    config: MatcherConfig,
    embedder: Option<Arc<dyn Embedder>>,
}

impl RelevanceMatcher {
    /// Lexical-only matcher.
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            config,
            embedder: None,
        }
    }

    /// Attach an embedding service for semantic scoring.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Score one query against a batch of candidates.
    ///
    /// Makes at most one embedder call per batch, never one per pair.
    pub async fn score_batch(&self, query: &str, candidates: &[String]) -> Vec<f32> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let lexical: Vec<f32> = candidates
            .iter()
            .map(|c| lexical_score(query, c))
            .collect();

        let semantic = match &self.embedder {
            Some(embedder) => match embedder.embed_and_compare(query, candidates).await {
                Ok(scores) if scores.len() == candidates.len() => Some(scores),
                Ok(scores) => {
                    warn!(
                        expected = candidates.len(),
                        got = scores.len(),
                        "embedder returned wrong batch size, falling back to lexical"
                    );
                    None
                }
                Err(e) => {
                    warn!("embedder unavailable, falling back to lexical: {e}");
                    None
                }
            },
            None => None,
        };

        match semantic {
            Some(semantic) => lexical
                .iter()
                .zip(semantic)
                .map(|(lex, sem)| {
                    let blended = lex * self.config.lexical_weight
                        + sem.max(0.0) * self.config.semantic_weight;
                    blended.min(1.0)
                })
                .collect(),
            None => lexical,
        }
    }

    /// Best-scoring candidate at or above a threshold.
    ///
    /// Deterministic tie-breaking: the earliest candidate wins, so a
    /// fixed candidate list always yields the same match.
    pub async fn best_match(
        &self,
        query: &str,
        candidates: &[String],
        threshold: f32,
    ) -> Option<(usize, f32)> {
        let scores = self.score_batch(query, candidates).await;
        let mut best: Option<(usize, f32)> = None;
        for (index, score) in scores.into_iter().enumerate() {
            if score < threshold {
                continue;
            }
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((index, score)),
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEmbedder;

    #[test]
    fn test_containment_scores_full() {
        let score = lexical_score(
            "samsung galaxy s25",
            "Смартфон SAMSUNG Galaxy S25 5G 256GB Iceblue",
        );
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_unrelated_scores_low() {
        assert!(lexical_score("samsung galaxy s25", "Lenovo IdeaPad Flex 5") < 0.55);
    }

    #[tokio::test]
    async fn test_lexical_only_fallback() {
        let matcher = RelevanceMatcher::new(MatcherConfig::default());
        let candidates = vec!["Samsung Galaxy S25".to_string(), "iPhone 15".to_string()];
        let scores = matcher.score_batch("samsung galaxy s25", &candidates).await;
        assert!(scores[0] > scores[1]);
    }

    #[tokio::test]
    async fn test_one_embedder_call_per_batch() {
        let embedder = Arc::new(MockEmbedder::new());
        let matcher =
            RelevanceMatcher::new(MatcherConfig::default()).with_embedder(embedder.clone());

        let candidates: Vec<String> = (0..10).map(|i| format!("candidate {i}")).collect();
        matcher.score_batch("query", &candidates).await;

        assert_eq!(embedder.call_count(), 1);
    }

    #[tokio::test]
    async fn test_best_match_deterministic_tie_break() {
        let matcher = RelevanceMatcher::new(MatcherConfig::default());
        let candidates = vec!["Цена".to_string(), "Цена".to_string()];

        for _ in 0..5 {
            let (index, _) = matcher.best_match("Цена", &candidates, 0.3).await.unwrap();
            assert_eq!(index, 0);
        }
    }

    #[tokio::test]
    async fn test_below_threshold_is_no_match() {
        let matcher = RelevanceMatcher::new(MatcherConfig::default());
        let candidates = vec!["qwxyz".to_string()];
        assert!(matcher
            .best_match("samsung galaxy", &candidates, 0.8)
            .await
            .is_none());
    }
}
