//! Trait seams for the external collaborators.
//!
//! - [`browser`] - Browser automation engine (open/query/click/fill/wait)
//! - [`extractor`] - Structured-extraction (LLM) service
//! - [`embedder`] - Embedding-similarity service (optional)
//! - [`store`] - Persistence engine

pub mod browser;
pub mod embedder;
pub mod extractor;
pub mod store;
