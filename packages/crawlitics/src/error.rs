//! Typed errors for the pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Errors are split by
//! concern: navigation, extraction, persistence, and the pipeline
//! umbrella that composes them.

use thiserror::Error;

/// Errors that can occur while driving a browser session through a site.
#[derive(Debug, Error)]
pub enum NavigationError {
    /// Selector did not match anything before the wait deadline
    #[error("selector not found: {selector}")]
    SelectorNotFound { selector: String },

    /// Element exists but is missing a required attribute
    #[error("element missing attribute '{attribute}'")]
    MissingAttribute { attribute: String },

    /// URL could not be parsed or resolved against the site base
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Navigation or fetch timed out
    #[error("timeout navigating to: {url}")]
    Timeout { url: String },

    /// The site answered with a transient rejection (429/503-class)
    #[error("transient rejection (HTTP {status})")]
    Transient { status: u16 },

    /// Browser engine failure
    #[error("browser error: {0}")]
    Browser(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The per-site task was abandoned
    #[error("navigation cancelled")]
    Cancelled,
}

impl NavigationError {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NavigationError::Transient { .. } | NavigationError::Timeout { .. }
        )
    }
}

/// Errors from the structured-extraction service and record validation.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Extraction service unreachable, rate-limited or failed
    #[error("extraction service error: {0}")]
    Service(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Service output was not parseable JSON
    #[error("malformed JSON from extractor: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// Extracted JSON does not conform to the category schema
    #[error("schema violation for {url}: {reason}")]
    SchemaViolation { url: String, reason: String },

    /// The per-URL task was abandoned
    #[error("extraction cancelled")]
    Cancelled,
}

impl ExtractError {
    /// Whether retrying the same call may succeed.
    ///
    /// Validation failures are deterministic and never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractError::Service(_))
    }
}

/// Errors from the persistence store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-constraint race (schema-per-category, variant-per-url).
    ///
    /// Callers treat this as "another writer already completed it".
    #[error("conflicting write: {what}")]
    Conflict { what: String },

    /// Referenced row does not exist
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Backend failure
    #[error("storage error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Top-level pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("navigation failed: {0}")]
    Navigation(#[from] NavigationError),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("storage failed: {0}")]
    Store(#[from] StoreError),

    /// Embedding service unavailable or returned garbage
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Run input failed validation before any work started
    #[error("invalid criteria: {reason}")]
    InvalidCriteria { reason: String },

    /// A site profile failed load-time validation
    #[error("invalid site profile '{site}': {reason}")]
    InvalidProfile { site: String, reason: String },

    /// Every configured site failed; partial results are impossible
    #[error("all {count} sites failed")]
    AllSitesFailed { count: usize },

    /// No schema exists for the category and none could be derived
    /// from any candidate page
    #[error("could not resolve a schema for category '{category}'")]
    SchemaUnresolved { category: String },
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for navigation operations.
pub type NavResult<T> = std::result::Result<T, NavigationError>;

/// Result type alias for extraction operations.
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
