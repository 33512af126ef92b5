//! The end-to-end crawl/extract/reconcile pipeline.
//!
//! Stage order for one run: crawl all sites for candidate URLs, gate
//! them through the freshness cache, resolve the category schema,
//! extract the stale/unseen pages, reconcile everything into product
//! families, and report.

pub mod extract;
pub mod freshness;
pub mod run;
pub mod schema;

pub use extract::{extract_batch, ExtractionOutcome};
pub use freshness::{FreshnessGate, FreshnessSplit};
pub use run::{Pipeline, PipelineReport};
pub use schema::{resolve_schema, SchemaResolution};
