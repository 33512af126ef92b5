//! Embedding-similarity service seam (optional collaborator).

use async_trait::async_trait;

use crate::error::Result;

/// Remote embedding service, consumed one batch at a time.
///
/// The matcher degrades to lexical-only scoring when no embedder is
/// configured or a call fails.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Cosine similarity of `query` against each candidate, in order.
    ///
    /// One remote call per batch; scores are in [-1, 1].
    async fn embed_and_compare(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>>;
}
