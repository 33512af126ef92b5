//! Product identity and variant reconciliation.
//!
//! Turns a batch of raw extracted records into transactional write
//! plans: records cluster into product families, each family's spec
//! keys are re-partitioned into common vs variant over ALL members
//! (stored ones included), and price observations become append-only
//! history entries. Building a plan only reads; the store applies it.

pub mod cluster;
pub mod partition;
pub mod plan;

use chrono::Utc;
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::Result;
use crate::text;
use crate::traits::store::ProductStore;
use crate::types::config::ReconcileConfig;
use crate::types::product::{Product, ProductFamily, ProductVariant};
use crate::types::record::RawProductRecord;

use self::partition::KeyPartition;
use self::plan::{FamilyPlan, ReconcilePlan, VariantPlan};

/// Builds reconciliation plans from raw records.
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    /// Plan the writes for a batch of records.
    ///
    /// Pure with respect to the store: only lookups happen here, so a
    /// failed run leaves no partial state behind.
    pub async fn build_plan(
        &self,
        store: &dyn ProductStore,
        records: &[RawProductRecord],
    ) -> Result<ReconcilePlan> {
        let clusters = cluster::cluster_records(records, self.config.cluster_cutoff);
        info!(
            records = records.len(),
            clusters = clusters.len(),
            "clustered records into product families"
        );

        let mut plan = ReconcilePlan::default();
        for (key, members) in &clusters {
            let existing = self.find_family(store, members).await?;
            debug!(
                cluster = %key,
                new_records = members.len(),
                existing = existing.is_some(),
                "planning family"
            );
            plan.upserts
                .push(self.plan_family(existing, members));
        }
        Ok(plan)
    }

    /// Look up the stored family a cluster belongs to, trying each
    /// member's canonical name. Retailer titles drift, so the first
    /// record's spelling is not always the stored one.
    async fn find_family(
        &self,
        store: &dyn ProductStore,
        members: &[RawProductRecord],
    ) -> Result<Option<ProductFamily>> {
        for record in members {
            let name = cluster::canonical_name(&record.name);
            if let Some(family) = store.family_by_name(&name).await? {
                return Ok(Some(family));
            }
        }
        Ok(None)
    }

    fn plan_family(
        &self,
        existing: Option<ProductFamily>,
        records: &[RawProductRecord],
    ) -> FamilyPlan {
        // Last observation of a URL within the batch wins
        let mut by_url: IndexMap<&str, &RawProductRecord> = IndexMap::new();
        for record in records {
            by_url.insert(record.source_url.as_str(), record);
        }

        // Full spec view per family member. For a stored variant this
        // is common + variant specs, overlaid with the new record for
        // its URL when one arrived this run.
        let mut member_specs: Vec<IndexMap<String, String>> = Vec::new();
        let mut stored_variants: Vec<(ProductVariant, Option<&RawProductRecord>)> = Vec::new();

        if let Some(family) = &existing {
            for variant in &family.variants {
                let mut full = family.product.common_specs.clone();
                for (k, v) in &variant.variant_specs {
                    full.insert(k.clone(), v.clone());
                }
                let update = by_url.shift_remove(variant.source_url.as_str());
                if let Some(record) = update {
                    for (k, v) in &record.specs {
                        full.insert(k.clone(), text::normalize_value(v));
                    }
                }
                member_specs.push(full);
                stored_variants.push((variant.clone(), update));
            }
        }

        let fresh_records: Vec<&RawProductRecord> = by_url.into_values().collect();
        for record in &fresh_records {
            member_specs.push(normalized_specs(record));
        }

        let member_refs: Vec<&IndexMap<String, String>> = member_specs.iter().collect();
        let partition = partition::partition_keys(&member_refs, &self.config);

        let seed = &records[0];
        let (mut product, is_new_product) = match existing {
            Some(family) => (family.product, false),
            None => (
                Product::new(
                    cluster::canonical_name(&seed.name),
                    seed.brand.trim(),
                    &seed.category,
                    &seed.description,
                ),
                true,
            ),
        };
        product.common_specs = common_values(&member_refs, &partition);

        let now = Utc::now();
        let mut variants = Vec::new();
        for (index, (mut variant, update)) in stored_variants.into_iter().enumerate() {
            variant.variant_specs = restrict(&member_specs[index], &partition);
            let mut observed_price = None;
            if let Some(record) = update {
                variant.availability = record.availability;
                if record.image_url.is_some() {
                    variant.image_url = record.image_url.clone();
                }
                variant.last_scraped_at = now;
                observed_price = price_of(record);
            }
            variants.push(VariantPlan {
                variant,
                is_new: false,
                observed_price,
            });
        }

        let offset = variants.len();
        for (index, record) in fresh_records.iter().enumerate() {
            let mut variant = ProductVariant::new(product.id, &record.source_url)
                .with_availability(record.availability)
                .with_specs(restrict(&member_specs[offset + index], &partition));
            variant.image_url = record.image_url.clone();
            variants.push(VariantPlan {
                variant,
                is_new: true,
                observed_price: price_of(record),
            });
        }

        FamilyPlan {
            product,
            is_new_product,
            variants,
        }
    }
}

fn normalized_specs(record: &RawProductRecord) -> IndexMap<String, String> {
    record
        .specs
        .iter()
        .map(|(k, v)| (k.clone(), text::normalize_value(v)))
        .collect()
}

fn price_of(record: &RawProductRecord) -> Option<(f64, String)> {
    (record.price > 0.0).then(|| (record.price, record.currency.clone()))
}

/// Common-spec map in first-appearance order, values from the first
/// member that carries each key.
fn common_values(
    members: &[&IndexMap<String, String>],
    partition: &KeyPartition,
) -> IndexMap<String, String> {
    let mut common = IndexMap::new();
    for member in members {
        for (k, v) in member.iter() {
            if partition.common.contains(k) && !common.contains_key(k) {
                common.insert(k.clone(), v.clone());
            }
        }
    }
    common
}

/// A member's spec map restricted to the variant side of the split.
fn restrict(
    specs: &IndexMap<String, String>,
    partition: &KeyPartition,
) -> IndexMap<String, String> {
    specs
        .iter()
        .filter(|(k, _)| partition.variant.contains(k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::MemoryStore;
    use crate::types::record::Availability;

    fn record(url: &str, name: &str, specs: &[(&str, &str)], price: f64) -> RawProductRecord {
        RawProductRecord {
            source_url: url.to_string(),
            name: name.to_string(),
            brand: "Samsung".to_string(),
            category: "smartphones".to_string(),
            price,
            currency: "BGN".to_string(),
            description: "Flagship phone".to_string(),
            specs: specs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            availability: Availability::InStock,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_new_family_partitions_specs() {
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(ReconcileConfig::default());

        let records = vec![
            record(
                "https://a.bg/s25",
                "Galaxy S25, 256GB",
                &[("ram", "8 GB"), ("storage", "256 GB")],
                1999.0,
            ),
            record(
                "https://b.bg/s25",
                "Galaxy S25, 512GB",
                &[("ram", "8 GB"), ("storage", "512 GB")],
                2199.0,
            ),
        ];

        let plan = reconciler.build_plan(&store, &records).await.unwrap();
        assert_eq!(plan.upserts.len(), 1);

        let family = &plan.upserts[0];
        assert!(family.is_new_product);
        assert_eq!(family.product.name, "Galaxy S25");
        assert_eq!(family.product.common_specs.get("ram").unwrap(), "8 GB");
        assert!(!family.product.common_specs.contains_key("storage"));

        assert_eq!(family.variants.len(), 2);
        for variant in &family.variants {
            assert!(variant.is_new);
            assert!(variant.variant.variant_specs.contains_key("storage"));
            assert!(!variant.variant.variant_specs.contains_key("ram"));
        }
    }

    #[tokio::test]
    async fn test_replay_is_idempotent() {
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(ReconcileConfig::default());
        let records = vec![record(
            "https://a.bg/s25",
            "Galaxy S25, 256GB",
            &[("ram", "8 GB")],
            1999.0,
        )];

        let first = reconciler.build_plan(&store, &records).await.unwrap();
        let outcome = store.apply(&first).await.unwrap();
        assert_eq!(outcome.products_created, 1);
        assert_eq!(outcome.variants_created, 1);
        assert_eq!(outcome.prices_appended, 1);

        let second = reconciler.build_plan(&store, &records).await.unwrap();
        assert!(!second.upserts[0].is_new_product);
        assert!(!second.upserts[0].variants[0].is_new);

        let outcome = store.apply(&second).await.unwrap();
        assert_eq!(outcome.products_created, 0);
        assert_eq!(outcome.variants_created, 0);
        // Same price again: no new history entry
        assert_eq!(outcome.prices_appended, 0);
    }

    #[tokio::test]
    async fn test_new_sku_flips_common_key_and_rewrites_siblings() {
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(ReconcileConfig::default());

        let first_batch = vec![
            record("https://a.bg/s25", "Galaxy S25", &[("color", "Iceblue")], 1999.0),
            record("https://b.bg/s25", "Galaxy S25", &[("color", "Iceblue")], 2049.0),
        ];
        let plan = reconciler.build_plan(&store, &first_batch).await.unwrap();
        assert!(plan.upserts[0].product.common_specs.contains_key("color"));
        store.apply(&plan).await.unwrap();

        // A navy SKU arrives; color can no longer be common.
        let second_batch = vec![record(
            "https://c.bg/s25-navy",
            "Galaxy S25",
            &[("color", "Navy")],
            2099.0,
        )];
        let plan = reconciler.build_plan(&store, &second_batch).await.unwrap();

        let family = &plan.upserts[0];
        assert!(!family.product.common_specs.contains_key("color"));
        assert_eq!(family.variants.len(), 3);
        // Every variant, including the two untouched ones, now carries
        // color on the variant side.
        for variant in &family.variants {
            assert!(variant.variant.variant_specs.contains_key("color"));
        }
    }

    #[tokio::test]
    async fn test_rescrape_updates_availability_and_price() {
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(ReconcileConfig::default());

        let mut first = record("https://a.bg/s25", "Galaxy S25", &[], 1999.0);
        first.availability = Availability::InStock;
        let plan = reconciler.build_plan(&store, &[first]).await.unwrap();
        store.apply(&plan).await.unwrap();

        let mut second = record("https://a.bg/s25", "Galaxy S25", &[], 1899.0);
        second.availability = Availability::OutOfStock;
        let plan = reconciler.build_plan(&store, &[second]).await.unwrap();
        let outcome = store.apply(&plan).await.unwrap();

        assert_eq!(outcome.variants_updated, 1);
        assert_eq!(outcome.prices_appended, 1);

        let variant = store
            .variant_by_url("https://a.bg/s25")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(variant.availability, Availability::OutOfStock);

        let history = store.price_history(variant.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].price, 1899.0);
    }
}
