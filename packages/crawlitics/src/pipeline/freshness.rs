//! Freshness gate: the cache layer between crawling and extraction.
//!
//! A URL whose stored variant was scraped within the TTL is served
//! from the store, rehydrated into the same record shape extraction
//! would produce. Freshness is computed from `last_scraped_at` at
//! query time; nothing is ever marked stale in storage.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::error::Result;
use crate::traits::store::ProductStore;
use crate::types::product::{PriceHistoryEntry, ProductFamily};
use crate::types::record::RawProductRecord;

/// How a batch of candidate URLs split against the cache.
#[derive(Debug, Default)]
pub struct FreshnessSplit {
    /// Records rehydrated from fresh stored variants
    pub cached: Vec<RawProductRecord>,

    /// URLs that are stale or unseen and need a page visit
    pub to_fetch: Vec<String>,
}

/// TTL-based partitioner over candidate URLs.
pub struct FreshnessGate {
    ttl: Duration,
}

impl FreshnessGate {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Partition against the current clock.
    pub async fn partition(
        &self,
        store: &dyn ProductStore,
        urls: &[String],
    ) -> Result<FreshnessSplit> {
        self.partition_at(store, urls, Utc::now()).await
    }

    /// Partition against an explicit clock. A variant exactly at the
    /// TTL is still fresh; staleness starts strictly past it.
    pub async fn partition_at(
        &self,
        store: &dyn ProductStore,
        urls: &[String],
        now: DateTime<Utc>,
    ) -> Result<FreshnessSplit> {
        let mut split = FreshnessSplit::default();

        for url in urls {
            let Some(variant) = store.variant_by_url(url).await? else {
                split.to_fetch.push(url.clone());
                continue;
            };
            if variant.is_stale_at(now, self.ttl) {
                debug!(url = %url, "stale variant, re-fetching");
                split.to_fetch.push(url.clone());
                continue;
            }

            let Some(family) = store.family_by_id(variant.parent_id).await? else {
                // Orphaned variant; treat as unseen rather than guess
                split.to_fetch.push(url.clone());
                continue;
            };
            let latest = store.latest_price(variant.id).await?;
            match rehydrate(&family, url, latest.as_ref()) {
                Some(record) => split.cached.push(record),
                None => split.to_fetch.push(url.clone()),
            }
        }

        info!(
            cached = split.cached.len(),
            to_fetch = split.to_fetch.len(),
            "freshness partition complete"
        );
        Ok(split)
    }
}

/// Rebuild the record a fresh variant would have produced: common
/// specs overlaid with variant specs, plus the latest known price.
/// A variant with no price history yet keeps a zero price.
fn rehydrate(
    family: &ProductFamily,
    url: &str,
    latest_price: Option<&PriceHistoryEntry>,
) -> Option<RawProductRecord> {
    let variant = family.variants.iter().find(|v| v.source_url == url)?;

    let mut specs = family.product.common_specs.clone();
    for (k, v) in &variant.variant_specs {
        specs.insert(k.clone(), v.clone());
    }

    Some(RawProductRecord {
        source_url: variant.source_url.clone(),
        name: family.product.name.clone(),
        brand: family.product.brand.clone(),
        category: family.product.category.clone(),
        price: latest_price.map(|entry| entry.price).unwrap_or(0.0),
        currency: latest_price
            .map(|entry| entry.currency.clone())
            .unwrap_or_else(|| "BGN".to_string()),
        description: family.product.description.clone(),
        specs,
        availability: variant.availability,
        image_url: variant.image_url.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::plan::{FamilyPlan, ReconcilePlan, VariantPlan};
    use crate::stores::memory::MemoryStore;
    use crate::types::product::{Product, ProductVariant};

    async fn seed(store: &MemoryStore, url: &str, age: Duration) {
        let product = Product::new("Galaxy S25", "Samsung", "smartphones", "desc");
        let variant = ProductVariant::new(product.id, url)
            .with_last_scraped_at(Utc::now() - age);
        store
            .apply(&ReconcilePlan {
                upserts: vec![FamilyPlan {
                    product,
                    is_new_product: true,
                    variants: vec![VariantPlan {
                        variant,
                        is_new: true,
                        observed_price: Some((1999.0, "BGN".to_string())),
                    }],
                }],
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fresh_url_served_from_cache() {
        let store = MemoryStore::new();
        seed(&store, "https://a.bg/s25", Duration::hours(1)).await;

        let gate = FreshnessGate::new(Duration::hours(24));
        let split = gate
            .partition(&store, &["https://a.bg/s25".to_string()])
            .await
            .unwrap();

        assert_eq!(split.cached.len(), 1);
        assert!(split.to_fetch.is_empty());
        assert_eq!(split.cached[0].name, "Galaxy S25");
        // The rehydrated record carries the stored price, not a blank
        assert_eq!(split.cached[0].price, 1999.0);
        assert_eq!(split.cached[0].currency, "BGN");
    }

    #[tokio::test]
    async fn test_stale_and_unseen_need_fetching() {
        let store = MemoryStore::new();
        seed(&store, "https://a.bg/s25", Duration::hours(25)).await;

        let gate = FreshnessGate::new(Duration::hours(24));
        let urls = vec![
            "https://a.bg/s25".to_string(),
            "https://b.bg/never-seen".to_string(),
        ];
        let split = gate.partition(&store, &urls).await.unwrap();

        assert!(split.cached.is_empty());
        assert_eq!(split.to_fetch, urls);
    }

    #[tokio::test]
    async fn test_ttl_boundary_is_inclusive() {
        let store = MemoryStore::new();
        let gate = FreshnessGate::new(Duration::hours(24));

        let product = Product::new("Galaxy S25", "Samsung", "smartphones", "desc");
        let now = Utc::now();
        let variant = ProductVariant::new(product.id, "https://a.bg/s25")
            .with_last_scraped_at(now - Duration::hours(24));
        store
            .apply(&ReconcilePlan {
                upserts: vec![FamilyPlan {
                    product,
                    is_new_product: true,
                    variants: vec![VariantPlan {
                        variant,
                        is_new: true,
                        observed_price: None,
                    }],
                }],
            })
            .await
            .unwrap();

        let split = gate
            .partition_at(&store, &["https://a.bg/s25".to_string()], now)
            .await
            .unwrap();
        assert_eq!(split.cached.len(), 1);

        let split = gate
            .partition_at(
                &store,
                &["https://a.bg/s25".to_string()],
                now + Duration::seconds(1),
            )
            .await
            .unwrap();
        assert_eq!(split.to_fetch.len(), 1);
    }
}
