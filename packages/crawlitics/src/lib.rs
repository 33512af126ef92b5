//! Price-Comparison Crawl and Extraction Pipeline
//!
//! A multi-site product data pipeline: navigate retail sites by
//! imitating a shopper (search, category discovery, sidebar filters,
//! pagination), extract structured product data through a
//! schema-guided extraction service, and reconcile the results into
//! canonical products with variants and append-only price history.
//!
//! # Design Philosophy
//!
//! - Sites are described by selector profiles, never by per-site code
//! - One extraction schema per category, derived once and reused
//! - A freshness TTL gates every page visit; pages are never
//!   re-scraped while their stored variant is fresh
//! - Reconciliation is plan-then-apply: planning is pure computation,
//!   the store applies plans transactionally
//! - Every remote collaborator (browser, extraction service, embedder,
//!   store) sits behind a trait, so the full pipeline runs in tests
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use crawlitics::{Pipeline, PipelineConfig, SearchCriteria, MemoryStore};
//! use tokio_util::sync::CancellationToken;
//!
//! let pipeline = Pipeline::new(browser, extractor, Arc::new(MemoryStore::new()),
//!                              site_profiles, PipelineConfig::default());
//!
//! let criteria = SearchCriteria::new("Samsung Galaxy S25", "Smartphone")
//!     .with_filter("Цена", "1500-2500")
//!     .with_filter("Color", "black, silver");
//!
//! let report = pipeline.run(&criteria, &CancellationToken::new()).await?;
//! for family in &report.families {
//!     println!("{} ({} variants)", family.product.name, family.variants.len());
//! }
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Collaborator seams (Browser, SchemaExtractor, Embedder, ProductStore)
//! - [`types`] - Domain types: criteria, profiles, records, products, schemas, config
//! - [`navigator`] - Per-site crawl state machine (filters, pagination)
//! - [`matcher`] - Blended lexical/semantic relevance scoring
//! - [`dispatch`] - Session caps, rate limiting and retries for page fetches
//! - [`pipeline`] - Freshness gate, schema resolution, extraction, the run loop
//! - [`reconcile`] - Identity clustering, spec-key partitioning, write plans
//! - [`stores`] - Storage implementations (MemoryStore)
//! - [`testing`] - Mock implementations for testing

pub mod dispatch;
pub mod error;
pub mod matcher;
pub mod navigator;
pub mod pipeline;
pub mod reconcile;
pub mod stores;
pub mod testing;
pub mod text;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{ExtractError, NavigationError, PipelineError, StoreError};
pub use traits::{
    browser::{Browser, BrowserPage, ElementHandle},
    embedder::Embedder,
    extractor::{GeneratedSchema, SchemaExtractor},
    store::ProductStore,
};
pub use types::{
    config::{
        DispatchConfig, ExtractorConfig, MatcherConfig, PipelineConfig, ReconcileConfig,
        RetryPolicy,
    },
    criteria::{FilterSpec, SearchCriteria},
    listing::CandidateListing,
    product::{PriceHistoryEntry, Product, ProductFamily, ProductVariant},
    record::{Availability, RawProductRecord},
    schema::{ExtractionSchema, SchemaDefinition},
    site::{FilterSelectors, SiteProfile},
};

// Re-export the pipeline entry points
pub use pipeline::{Pipeline, PipelineReport};

// Re-export navigation and reconciliation components
pub use dispatch::PageDispatcher;
pub use matcher::RelevanceMatcher;
pub use navigator::{crawl_sites, CrawlOutcome, Navigator, SiteOutcome};
pub use reconcile::{
    plan::{ApplyOutcome, ReconcilePlan},
    Reconciler,
};

// Re-export stores
pub use stores::memory::MemoryStore;
