//! Structured-extraction service seam.
//!
//! Treated as a remote call with latency and failure modes, not a
//! library call. Retry decisions key off
//! [`ExtractError::is_retryable`](crate::error::ExtractError::is_retryable).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ExtractResult;
use crate::types::schema::ExtractionSchema;

/// Result of the combined "design a schema, then extract this page
/// with it" seed call.
#[derive(Debug, Clone)]
pub struct GeneratedSchema {
    /// The schema the service designed for the category
    pub schema: ExtractionSchema,

    /// The seed page's own extracted data, reused rather than
    /// re-extracted
    pub record_json: Value,
}

/// Remote structured-extraction service.
#[async_trait]
pub trait SchemaExtractor: Send + Sync {
    /// Design a schema for a category from one sample page and extract
    /// that page with it, in a single call.
    async fn generate_schema(
        &self,
        category: &str,
        sample_text: &str,
    ) -> ExtractResult<GeneratedSchema>;

    /// Extract one page against an existing schema.
    async fn extract(&self, text: &str, schema: &ExtractionSchema) -> ExtractResult<Value>;
}
