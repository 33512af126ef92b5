//! Raw extracted records, pre-reconciliation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Sentinel for a value the extractor looked for but did not find.
///
/// Records carry this explicit marker instead of omitting the key or
/// using JSON null, so reconciliation can tell "known absent" from
/// "not yet observed".
pub const UNKNOWN_VALUE: &str = "unknown";

/// Whether a string is the unknown sentinel.
pub fn is_unknown(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case(UNKNOWN_VALUE)
}

/// Stock status of a listing at scrape time.
///
/// The serde aliases accept the Bulgarian literals the retail sites
/// (and older stored rows) use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Availability {
    #[serde(rename = "in_stock", alias = "В наличност")]
    InStock,

    #[serde(rename = "out_of_stock", alias = "Изчерпан")]
    OutOfStock,

    #[default]
    #[serde(rename = "unknown", alias = "Неясен")]
    Unknown,
}

/// Output of extraction for one product page.
///
/// Always validated against an [`ExtractionSchema`](super::schema::ExtractionSchema)
/// before use. Ephemeral until reconciled into a product family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawProductRecord {
    /// The page this record was extracted from
    pub source_url: String,

    pub name: String,
    pub brand: String,
    pub category: String,

    /// Parsed numeric price
    pub price: f64,

    /// Currency code, e.g. "BGN"
    pub currency: String,

    pub description: String,

    /// Specification key/value pairs, schema field order preserved.
    /// Missing values hold [`UNKNOWN_VALUE`].
    pub specs: IndexMap<String, String>,

    pub availability: Availability,

    #[serde(default)]
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_sentinel() {
        assert!(is_unknown("unknown"));
        assert!(is_unknown(" Unknown "));
        assert!(!is_unknown("128 GB"));
    }

    #[test]
    fn test_availability_accepts_bulgarian_literals() {
        let v: Availability = serde_json::from_str("\"В наличност\"").unwrap();
        assert_eq!(v, Availability::InStock);
        let v: Availability = serde_json::from_str("\"Изчерпан\"").unwrap();
        assert_eq!(v, Availability::OutOfStock);
        let v: Availability = serde_json::from_str("\"Неясен\"").unwrap();
        assert_eq!(v, Availability::Unknown);
    }
}
