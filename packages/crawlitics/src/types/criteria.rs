//! Run input: the user's search criteria.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// One user-declared attribute filter, e.g. `("Цена", "1500-2500")`
/// or `("Color", "black, silver")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// User's name for the attribute (free text, any language)
    pub name: String,

    /// User's value. Range filters use `"min-max"`; enumerated
    /// filters are comma-separated.
    pub value: String,
}

impl FilterSpec {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Range filters are detected by a price-like token in the name.
    pub fn is_range(&self) -> bool {
        let name = self.name.to_lowercase();
        name.contains("price") || name.contains("цена")
    }
}

/// Immutable input for one pipeline run.
///
/// Filters keep the order the user declared them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Product query, e.g. "Samsung Galaxy S25"
    pub query: String,

    /// Category the schema is resolved for, e.g. "Smartphone"
    pub category: String,

    /// Ordered attribute filters
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

impl SearchCriteria {
    pub fn new(query: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            category: category.into(),
            filters: Vec::new(),
        }
    }

    /// Add a filter, preserving declaration order.
    pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(FilterSpec::new(name, value));
        self
    }

    /// Reject empty input before any work is scheduled.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(PipelineError::InvalidCriteria {
                reason: "query is empty".to_string(),
            });
        }
        if self.category.trim().is_empty() {
            return Err(PipelineError::InvalidCriteria {
                reason: "category is empty".to_string(),
            });
        }
        for filter in &self.filters {
            if filter.name.trim().is_empty() || filter.value.trim().is_empty() {
                return Err(PipelineError::InvalidCriteria {
                    reason: format!("empty filter: '{}'='{}'", filter.name, filter.value),
                });
            }
        }
        Ok(())
    }
}
