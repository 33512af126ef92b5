//! Reconciliation write plans.
//!
//! A plan is the full, explicit set of writes one reconciliation pass
//! wants to make. Building it is pure computation; the store applies
//! it inside one transaction boundary so a crashed run never leaves a
//! family half-updated.

use serde::{Deserialize, Serialize};

use crate::types::product::{Product, ProductVariant};

/// Planned write for one variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantPlan {
    /// The variant row as it should exist after the pass, including
    /// wholesale-recomputed `variant_specs`
    pub variant: ProductVariant,

    /// Insert vs update
    pub is_new: bool,

    /// Price observed this run, if the page yielded one. The store
    /// appends a history entry only when it differs from the latest.
    pub observed_price: Option<(f64, String)>,
}

/// Planned writes for one product family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyPlan {
    /// The product row, `common_specs` fully recomputed
    pub product: Product,

    pub is_new_product: bool,

    /// Every variant of the family, touched or not: a key-partition
    /// shift can rewrite the specs of variants this run never scraped.
    pub variants: Vec<VariantPlan>,
}

/// Everything one reconciliation pass wants to persist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcilePlan {
    pub upserts: Vec<FamilyPlan>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty()
    }
}

/// What actually landed when a plan was applied.
///
/// Constraint races lost to another writer show up in
/// `conflicts_ignored`, never as errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub products_created: usize,
    pub variants_created: usize,
    pub variants_updated: usize,
    pub prices_appended: usize,
    pub conflicts_ignored: usize,
}
