//! Tunables for every pipeline stage.
//!
//! Components receive their config (and their semaphores) as
//! constructor arguments; there are no process-wide limiters.

use chrono::Duration;
use std::collections::BTreeSet;

/// Weights and thresholds for the relevance matcher.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Weight of the lexical (edit-distance) score in the blend
    pub lexical_weight: f32,

    /// Weight of the semantic (embedding cosine) score in the blend
    pub semantic_weight: f32,

    /// Minimum score for a listing title to count as a query match
    pub title_threshold: f32,

    /// Minimum score for a filter name to match an on-page section
    pub filter_threshold: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            lexical_weight: 0.45,
            semantic_weight: 0.7,
            title_threshold: 0.55,
            filter_threshold: 0.3,
        }
    }
}

/// Page/browser concurrency and retry policy.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Cap on simultaneous browser sessions
    pub max_sessions: usize,

    /// Sustained request rate across all sessions
    pub requests_per_second: u32,

    /// Retry policy for transient navigation faults
    pub retry: RetryPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_sessions: 8,
            requests_per_second: 4,
            retry: RetryPolicy::default(),
        }
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts after the first failure
    pub max_retries: u32,

    /// First backoff delay
    pub base_delay_ms: u64,

    /// Backoff ceiling
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given (zero-based) retry attempt.
    pub fn delay_for(&self, attempt: u32) -> std::time::Duration {
        let exp = self.base_delay_ms.saturating_mul(1u64 << attempt.min(16));
        std::time::Duration::from_millis(exp.min(self.max_delay_ms))
    }
}

/// Structured-extraction concurrency, separate from page concurrency
/// because the extraction call is the scarcer resource.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub concurrency: usize,

    /// Retry policy for extraction-service faults
    pub retry: RetryPolicy,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retry: RetryPolicy::default(),
        }
    }
}

/// Clustering and key-partition tuning.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Minimum holistic similarity for a record to join an existing
    /// cluster
    pub cluster_cutoff: f64,

    /// Minimum fuzzy similarity for two spec values to count as
    /// equivalent when their numeric tokens agree
    pub value_fuzzy_cutoff: f64,

    /// Keys always forced to variant (free-text fields)
    pub deny_keys: BTreeSet<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            cluster_cutoff: 0.90,
            value_fuzzy_cutoff: 0.85,
            deny_keys: BTreeSet::from(["features".to_string()]),
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub matcher: MatcherConfig,
    pub dispatch: DispatchConfig,
    pub extractor: ExtractorConfig,
    pub reconcile: ReconcileConfig,

    /// Freshness TTL for cached variants
    pub freshness_ttl: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            matcher: MatcherConfig::default(),
            dispatch: DispatchConfig::default(),
            extractor: ExtractorConfig::default(),
            reconcile: ReconcileConfig::default(),
            freshness_ttl: Duration::hours(24),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_bounded() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0).as_millis(), 1_000);
        assert_eq!(policy.delay_for(1).as_millis(), 2_000);
        assert_eq!(policy.delay_for(10).as_millis(), 30_000);
    }
}
