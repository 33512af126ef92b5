//! Category extraction schemas and record validation.
//!
//! A schema is a JSON-Schema-like descriptor: which top-level fields a
//! record must carry and which spec keys the category is expected to
//! have. There is at most one schema per category; once created it is
//! reused for every subsequent extraction of that category.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ExtractError, ExtractResult};
use crate::text;
use crate::types::record::{Availability, RawProductRecord, UNKNOWN_VALUE};

/// Top-level fields every record must provide.
pub const BASE_REQUIRED_FIELDS: &[&str] = &["name", "brand", "price", "description"];

/// Structured type descriptor for one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Spec keys the extractor should look for, in schema order
    pub spec_fields: Vec<String>,

    /// Subset of `spec_fields` that must be present and known
    #[serde(default)]
    pub required_spec_fields: Vec<String>,
}

impl SchemaDefinition {
    pub fn new(spec_fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            spec_fields: spec_fields.into_iter().map(Into::into).collect(),
            required_spec_fields: Vec::new(),
        }
    }

    pub fn with_required(
        mut self,
        required: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.required_spec_fields = required.into_iter().map(Into::into).collect();
        self
    }
}

/// A persisted, reusable schema for one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSchema {
    pub category: String,
    pub definition: SchemaDefinition,
}

impl ExtractionSchema {
    pub fn new(category: impl Into<String>, definition: SchemaDefinition) -> Self {
        Self {
            category: category.into(),
            definition,
        }
    }

    /// Validate extractor output and shape it into a record.
    ///
    /// Every base required field must be present, a string, and
    /// non-empty. Required spec fields must be present and known.
    /// Optional spec fields that are missing or null become the
    /// explicit unknown sentinel.
    pub fn parse_record(&self, source_url: &str, json: &Value) -> ExtractResult<RawProductRecord> {
        let violation = |reason: String| ExtractError::SchemaViolation {
            url: source_url.to_string(),
            reason,
        };

        let object = json
            .as_object()
            .ok_or_else(|| violation("top-level value is not an object".to_string()))?;

        let mut fields: IndexMap<&str, String> = IndexMap::new();
        for &field in BASE_REQUIRED_FIELDS {
            let value = field_as_string(object.get(field));
            match value {
                Some(v) if !v.trim().is_empty() => {
                    fields.insert(field, v);
                }
                _ => return Err(violation(format!("required field '{field}' is missing"))),
            }
        }

        let specs_json = object.get("specs").and_then(Value::as_object);
        let mut specs: IndexMap<String, String> = IndexMap::new();
        for key in &self.definition.spec_fields {
            let value = specs_json
                .and_then(|s| field_as_string(s.get(key)))
                .filter(|v| !v.trim().is_empty() && v.trim() != "null")
                .unwrap_or_else(|| UNKNOWN_VALUE.to_string());
            specs.insert(key.clone(), value);
        }
        // Keys the extractor found beyond the declared fields are kept;
        // the partitioning step decides what to do with them.
        if let Some(extra) = specs_json {
            for (key, value) in extra {
                if !specs.contains_key(key) {
                    if let Some(v) = field_as_string(Some(value)) {
                        specs.insert(key.clone(), v);
                    }
                }
            }
        }

        for key in &self.definition.required_spec_fields {
            match specs.get(key) {
                Some(v) if !crate::types::record::is_unknown(v) => {}
                _ => return Err(violation(format!("required spec '{key}' is missing"))),
            }
        }

        let price_text = fields.get("price").cloned().unwrap_or_default();
        let price = text::parse_price(&price_text).unwrap_or(0.0);
        let currency = if price_text.to_lowercase().contains("лв") {
            "BGN".to_string()
        } else if price_text.to_lowercase().contains('€') || price_text.to_lowercase().contains("eur")
        {
            "EUR".to_string()
        } else {
            "BGN".to_string()
        };

        let availability = object
            .get("availability")
            .cloned()
            .and_then(|v| serde_json::from_value::<Availability>(v).ok())
            .unwrap_or_default();

        Ok(RawProductRecord {
            source_url: source_url.to_string(),
            name: fields.shift_remove("name").unwrap_or_default(),
            brand: fields.shift_remove("brand").unwrap_or_default(),
            category: self.category.clone(),
            price,
            currency,
            description: fields.shift_remove("description").unwrap_or_default(),
            specs,
            availability,
            image_url: object
                .get("image_url")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Read a JSON value as a display string; numbers are stringified,
/// null and containers are rejected.
fn field_as_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ExtractionSchema {
        ExtractionSchema::new(
            "Smartphone",
            SchemaDefinition::new(["processor", "ram", "storage", "screen_size"])
                .with_required(["storage"]),
        )
    }

    #[test]
    fn test_parse_valid_record() {
        let record = schema()
            .parse_record(
                "https://x.bg/p",
                &json!({
                    "name": "Samsung Galaxy S25",
                    "brand": "Samsung",
                    "price": "1 899,99 лв.",
                    "description": "Флагмански смартфон",
                    "specs": {
                        "processor": "Snapdragon 8 Elite",
                        "ram": "12 GB",
                        "storage": "256 GB"
                    }
                }),
            )
            .unwrap();

        assert_eq!(record.price, 1899.99);
        assert_eq!(record.currency, "BGN");
        assert_eq!(record.specs["storage"], "256 GB");
        // Declared but absent spec keys carry the sentinel
        assert_eq!(record.specs["screen_size"], UNKNOWN_VALUE);
    }

    #[test]
    fn test_missing_required_field() {
        let err = schema()
            .parse_record("https://x.bg/p", &json!({ "name": "X" }))
            .unwrap_err();
        assert!(matches!(err, ExtractError::SchemaViolation { .. }));
    }

    #[test]
    fn test_missing_required_spec() {
        let err = schema()
            .parse_record(
                "https://x.bg/p",
                &json!({
                    "name": "X", "brand": "Y", "price": "100,00 лв.",
                    "description": "d",
                    "specs": { "processor": "p", "ram": "8 GB" }
                }),
            )
            .unwrap_err();
        assert!(matches!(err, ExtractError::SchemaViolation { .. }));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(schema()
            .parse_record("https://x.bg/p", &json!(["not", "an", "object"]))
            .is_err());
    }

    #[test]
    fn test_undeclared_spec_keys_kept() {
        let record = schema()
            .parse_record(
                "https://x.bg/p",
                &json!({
                    "name": "X", "brand": "Y", "price": "100,00 лв.",
                    "description": "d",
                    "specs": { "storage": "128 GB", "color": "black" }
                }),
            )
            .unwrap();
        assert_eq!(record.specs["color"], "black");
    }
}
