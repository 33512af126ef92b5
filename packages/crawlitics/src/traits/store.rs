//! Persistence seam.
//!
//! The store is the synchronization point for concurrent runs: it
//! enforces the schema-per-category and variant-per-url unique
//! constraints and applies a whole [`ReconcilePlan`] within one
//! transaction boundary. Unique-constraint races surface as
//! [`StoreError::Conflict`](crate::error::StoreError) and are treated
//! by callers as "another writer already completed it".

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::reconcile::plan::{ApplyOutcome, ReconcilePlan};
use crate::types::product::{PriceHistoryEntry, ProductFamily, ProductVariant};
use crate::types::schema::ExtractionSchema;

/// Persistence operations used by the pipeline.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Look up a variant by its natural key.
    async fn variant_by_url(&self, source_url: &str) -> StoreResult<Option<ProductVariant>>;

    /// Load a product and all of its variants.
    async fn family_by_id(&self, id: Uuid) -> StoreResult<Option<ProductFamily>>;

    /// Find the full family for a canonical product name.
    ///
    /// Reconciliation always loads the complete family because adding
    /// one SKU can change which keys are common across all of them.
    async fn family_by_name(&self, name: &str) -> StoreResult<Option<ProductFamily>>;

    /// Most recent price entry for a variant, if any.
    async fn latest_price(&self, variant_id: Uuid) -> StoreResult<Option<PriceHistoryEntry>>;

    /// Full history for a variant, newest first.
    async fn price_history(&self, variant_id: Uuid) -> StoreResult<Vec<PriceHistoryEntry>>;

    /// The persisted schema for a category, if one exists.
    async fn schema_by_category(&self, category: &str) -> StoreResult<Option<ExtractionSchema>>;

    /// Persist a schema for a category.
    ///
    /// Returns the winning schema: the given one if this writer won,
    /// or the already-persisted one when another run got there first.
    /// A duplicate is not an error.
    async fn put_schema(&self, schema: &ExtractionSchema) -> StoreResult<ExtractionSchema>;

    /// Apply a reconciliation plan transactionally.
    ///
    /// Either the whole plan lands or none of it does; constraint
    /// races inside are resolved in favor of the earlier writer and
    /// reported in the outcome, not as errors.
    async fn apply(&self, plan: &ReconcilePlan) -> StoreResult<ApplyOutcome>;
}
