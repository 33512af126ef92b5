//! Canonical products, variants and price history.

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::Availability;

/// The canonical parent identity shared by retailer-specific listings
/// of "the same" item.
///
/// `common_specs` is fully replaceable: every reconciliation pass that
/// touches the family recomputes the common/variant key partition and
/// writes the whole map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub description: String,

    /// Specs whose value is identical (up to normalization) across all
    /// variants of this product
    pub common_specs: IndexMap<String, String>,

    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        name: impl Into<String>,
        brand: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            brand: brand.into(),
            category: category.into(),
            description: description.into(),
            common_specs: IndexMap::new(),
            created_at: Utc::now(),
        }
    }
}

/// One retailer/SKU-specific listing belonging to a [`Product`].
///
/// `source_url` is the natural key: globally unique, used for freshness
/// lookups. `variant_specs` is recomputed wholesale whenever the key
/// partition changes, even for variants not touched in the current run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub source_url: String,
    pub availability: Availability,

    #[serde(default)]
    pub image_url: Option<String>,

    /// Specs whose value differs across the family
    pub variant_specs: IndexMap<String, String>,

    /// Freshness is computed from this timestamp, never stored as a flag
    pub last_scraped_at: DateTime<Utc>,
}

impl ProductVariant {
    pub fn new(parent_id: Uuid, source_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id,
            source_url: source_url.into(),
            availability: Availability::Unknown,
            image_url: None,
            variant_specs: IndexMap::new(),
            last_scraped_at: Utc::now(),
        }
    }

    pub fn with_specs(mut self, specs: IndexMap<String, String>) -> Self {
        self.variant_specs = specs;
        self
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    pub fn with_last_scraped_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_scraped_at = at;
        self
    }

    /// Whether the variant is older than the TTL, relative to `now`.
    pub fn is_stale_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_scraped_at > ttl
    }
}

/// One observed price point. Append-only; entries are never mutated
/// or deleted. A new entry is recorded only when the observed price
/// differs from the most recent one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub variant_id: Uuid,
    pub price: f64,
    pub currency: String,
    pub recorded_at: DateTime<Utc>,
}

impl PriceHistoryEntry {
    pub fn new(variant_id: Uuid, price: f64, currency: impl Into<String>) -> Self {
        Self {
            variant_id,
            price,
            currency: currency.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// A product together with its variants, as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductFamily {
    pub product: Product,
    pub variants: Vec<ProductVariant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staleness_boundary() {
        let now = Utc::now();
        let variant = ProductVariant::new(Uuid::new_v4(), "https://x/p")
            .with_last_scraped_at(now - Duration::hours(24));

        // Exactly at the TTL is still fresh; one second past is stale.
        assert!(!variant.is_stale_at(now, Duration::hours(24)));
        assert!(variant.is_stale_at(now + Duration::seconds(1), Duration::hours(24)));
    }
}
