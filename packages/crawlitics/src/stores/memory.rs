//! In-memory store.
//!
//! Backs tests and single-process runs. All maps live behind one
//! `RwLock`, so applying a plan is atomic with respect to every other
//! operation, which is exactly the transaction boundary the trait
//! promises.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::reconcile::plan::{ApplyOutcome, ReconcilePlan};
use crate::traits::store::ProductStore;
use crate::types::product::{PriceHistoryEntry, Product, ProductFamily, ProductVariant};
use crate::types::schema::ExtractionSchema;

/// Two observations closer than this are the same price; history only
/// records actual movement.
const PRICE_EPSILON: f64 = 0.005;

#[derive(Default)]
struct Inner {
    products: HashMap<Uuid, Product>,
    variants: HashMap<Uuid, ProductVariant>,

    /// source_url -> variant id (the variant unique constraint)
    url_index: HashMap<String, Uuid>,

    /// lowercase product name -> product id
    name_index: HashMap<String, Uuid>,

    /// variant id -> price entries, newest first
    prices: HashMap<Uuid, Vec<PriceHistoryEntry>>,

    /// category -> schema (the schema-per-category unique constraint)
    schemas: HashMap<String, ExtractionSchema>,
}

/// [`ProductStore`] over process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }
}

impl Inner {
    fn family_of(&self, product: &Product) -> ProductFamily {
        let mut variants: Vec<ProductVariant> = self
            .variants
            .values()
            .filter(|v| v.parent_id == product.id)
            .cloned()
            .collect();
        variants.sort_by(|a, b| a.source_url.cmp(&b.source_url));
        ProductFamily {
            product: product.clone(),
            variants,
        }
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn variant_by_url(&self, source_url: &str) -> StoreResult<Option<ProductVariant>> {
        let inner = self.read()?;
        Ok(inner
            .url_index
            .get(source_url)
            .and_then(|id| inner.variants.get(id))
            .cloned())
    }

    async fn family_by_id(&self, id: Uuid) -> StoreResult<Option<ProductFamily>> {
        let inner = self.read()?;
        Ok(inner.products.get(&id).map(|p| inner.family_of(p)))
    }

    async fn family_by_name(&self, name: &str) -> StoreResult<Option<ProductFamily>> {
        let inner = self.read()?;
        Ok(inner
            .name_index
            .get(&name.trim().to_lowercase())
            .and_then(|id| inner.products.get(id))
            .map(|p| inner.family_of(p)))
    }

    async fn latest_price(&self, variant_id: Uuid) -> StoreResult<Option<PriceHistoryEntry>> {
        let inner = self.read()?;
        Ok(inner
            .prices
            .get(&variant_id)
            .and_then(|entries| entries.first())
            .cloned())
    }

    async fn price_history(&self, variant_id: Uuid) -> StoreResult<Vec<PriceHistoryEntry>> {
        Ok(self
            .read()?
            .prices
            .get(&variant_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn schema_by_category(&self, category: &str) -> StoreResult<Option<ExtractionSchema>> {
        Ok(self.read()?.schemas.get(category).cloned())
    }

    async fn put_schema(&self, schema: &ExtractionSchema) -> StoreResult<ExtractionSchema> {
        let mut inner = self.write()?;
        if let Some(existing) = inner.schemas.get(&schema.category) {
            // Another run won the race; its schema is the one in force.
            return Ok(existing.clone());
        }
        inner
            .schemas
            .insert(schema.category.clone(), schema.clone());
        Ok(schema.clone())
    }

    async fn apply(&self, plan: &ReconcilePlan) -> StoreResult<ApplyOutcome> {
        let mut inner = self.write()?;
        let mut outcome = ApplyOutcome::default();

        for family in &plan.upserts {
            let name_key = family.product.name.trim().to_lowercase();

            // Resolve the product row, yielding to an earlier writer on
            // a name collision.
            let product_id = if family.is_new_product {
                match inner.name_index.get(&name_key) {
                    Some(existing) => {
                        outcome.conflicts_ignored += 1;
                        *existing
                    }
                    None => {
                        let id = family.product.id;
                        inner.products.insert(id, family.product.clone());
                        inner.name_index.insert(name_key, id);
                        outcome.products_created += 1;
                        id
                    }
                }
            } else {
                let id = family.product.id;
                inner.products.insert(id, family.product.clone());
                id
            };

            for planned in &family.variants {
                let mut variant = planned.variant.clone();
                variant.parent_id = product_id;

                if planned.is_new {
                    if inner.url_index.contains_key(&variant.source_url) {
                        // Another writer inserted this URL first; their
                        // row (and its price entry) stands.
                        outcome.conflicts_ignored += 1;
                        continue;
                    }
                    inner
                        .url_index
                        .insert(variant.source_url.clone(), variant.id);
                    outcome.variants_created += 1;
                } else {
                    outcome.variants_updated += 1;
                }

                let variant_id = variant.id;
                inner.variants.insert(variant_id, variant);

                if let Some((price, currency)) = &planned.observed_price {
                    let entries = inner.prices.entry(variant_id).or_default();
                    let moved = entries
                        .first()
                        .map(|latest| (latest.price - price).abs() > PRICE_EPSILON)
                        .unwrap_or(true);
                    if moved {
                        entries.insert(0, PriceHistoryEntry::new(variant_id, *price, currency));
                        outcome.prices_appended += 1;
                    }
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::plan::{FamilyPlan, VariantPlan};
    use chrono::Utc;

    fn seed_plan(name: &str, url: &str, price: f64) -> ReconcilePlan {
        let product = Product::new(name, "Samsung", "smartphones", "desc");
        let variant = ProductVariant::new(product.id, url);
        ReconcilePlan {
            upserts: vec![FamilyPlan {
                product,
                is_new_product: true,
                variants: vec![VariantPlan {
                    variant,
                    is_new: true,
                    observed_price: Some((price, "BGN".to_string())),
                }],
            }],
        }
    }

    #[tokio::test]
    async fn test_apply_then_lookup() {
        let store = MemoryStore::new();
        let outcome = store
            .apply(&seed_plan("Galaxy S25", "https://a.bg/s25", 1999.0))
            .await
            .unwrap();
        assert_eq!(outcome.products_created, 1);
        assert_eq!(outcome.variants_created, 1);
        assert_eq!(outcome.prices_appended, 1);

        let family = store.family_by_name("galaxy s25").await.unwrap().unwrap();
        assert_eq!(family.variants.len(), 1);

        let variant = store
            .variant_by_url("https://a.bg/s25")
            .await
            .unwrap()
            .unwrap();
        let latest = store.latest_price(variant.id).await.unwrap().unwrap();
        assert_eq!(latest.price, 1999.0);
    }

    #[tokio::test]
    async fn test_duplicate_url_insert_is_ignored_not_an_error() {
        let store = MemoryStore::new();
        store
            .apply(&seed_plan("Galaxy S25", "https://a.bg/s25", 1999.0))
            .await
            .unwrap();

        // A racing run planned the same inserts from scratch.
        let outcome = store
            .apply(&seed_plan("Galaxy S25", "https://a.bg/s25", 1999.0))
            .await
            .unwrap();
        assert_eq!(outcome.products_created, 0);
        assert_eq!(outcome.variants_created, 0);
        assert_eq!(outcome.prices_appended, 0);
        assert_eq!(outcome.conflicts_ignored, 2);

        let family = store.family_by_name("Galaxy S25").await.unwrap().unwrap();
        assert_eq!(family.variants.len(), 1);
    }

    #[tokio::test]
    async fn test_price_history_is_append_only_on_change() {
        let store = MemoryStore::new();
        store
            .apply(&seed_plan("Galaxy S25", "https://a.bg/s25", 1999.0))
            .await
            .unwrap();
        let variant = store
            .variant_by_url("https://a.bg/s25")
            .await
            .unwrap()
            .unwrap();

        let update = |price| {
            let mut v = variant.clone();
            v.last_scraped_at = Utc::now();
            ReconcilePlan {
                upserts: vec![FamilyPlan {
                    product: Product::new("Galaxy S25", "Samsung", "smartphones", "desc"),
                    is_new_product: false,
                    variants: vec![VariantPlan {
                        variant: v,
                        is_new: false,
                        observed_price: Some((price, "BGN".to_string())),
                    }],
                }],
            }
        };

        // Unchanged price: nothing recorded
        let outcome = store.apply(&update(1999.0)).await.unwrap();
        assert_eq!(outcome.prices_appended, 0);

        // Movement: one entry, newest first
        let outcome = store.apply(&update(1899.0)).await.unwrap();
        assert_eq!(outcome.prices_appended, 1);

        let history = store.price_history(variant.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].price, 1899.0);
        assert_eq!(history[1].price, 1999.0);
    }

    #[tokio::test]
    async fn test_schema_race_returns_winner() {
        let store = MemoryStore::new();
        let first = ExtractionSchema::new(
            "smartphones",
            crate::types::schema::SchemaDefinition::new(["ram"]),
        );
        let second = ExtractionSchema::new(
            "smartphones",
            crate::types::schema::SchemaDefinition::new(["storage"]),
        );

        let winner = store.put_schema(&first).await.unwrap();
        assert_eq!(winner.definition.spec_fields, first.definition.spec_fields);

        // Loser gets the persisted schema back, not an error
        let winner = store.put_schema(&second).await.unwrap();
        assert_eq!(winner.definition.spec_fields, first.definition.spec_fields);
    }
}
