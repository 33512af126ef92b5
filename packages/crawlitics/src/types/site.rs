//! Per-site navigation profiles.
//!
//! A profile is pure data: selectors and URL rules for one retail site.
//! Profiles are strongly typed and validated once at load time so the
//! navigator never has to defend against missing selector keys mid-run.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Selectors for a site's on-page filter sidebar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSelectors {
    /// One element per filter section (e.g. "Price", "Brand")
    pub sections: String,

    /// Section title element, scoped within a section
    pub titles: String,

    /// Individual filter option elements, scoped within a section
    pub values: String,

    /// Free-form min/max price inputs, when the site exposes them.
    /// The selector must match exactly two inputs: min then max.
    #[serde(default)]
    pub price_inputs: Option<String>,
}

/// Navigation metadata for one retail site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Display name, e.g. "Ozone.bg"
    pub name: String,

    /// Base URL used to absolutize relative hrefs
    pub base_url: String,

    /// Search URL template containing a `{query}` placeholder
    pub search_url: String,

    /// Product card links on the keyword-search results page
    pub search_card_selector: String,

    /// Product card links on a category listing page
    pub category_card_selector: String,

    /// Breadcrumb container on a product page
    pub breadcrumb_selector: String,

    /// Filter sidebar selectors
    pub filters: FilterSelectors,

    /// Next-page control; absent means single-page sites
    #[serde(default)]
    pub next_page_selector: Option<String>,

    /// Pagination hard stop
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_max_pages() -> u32 {
    3
}

impl SiteProfile {
    /// Validate the profile at load time.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: &str| {
            Err(PipelineError::InvalidProfile {
                site: self.name.clone(),
                reason: reason.to_string(),
            })
        };

        if self.name.trim().is_empty() {
            return fail("name is empty");
        }
        if url::Url::parse(&self.base_url).is_err() {
            return fail("base_url is not a valid URL");
        }
        if !self.search_url.contains("{query}") {
            return fail("search_url is missing the {query} placeholder");
        }
        for (label, selector) in [
            ("search_card_selector", &self.search_card_selector),
            ("category_card_selector", &self.category_card_selector),
            ("breadcrumb_selector", &self.breadcrumb_selector),
            ("filters.sections", &self.filters.sections),
            ("filters.titles", &self.filters.titles),
            ("filters.values", &self.filters.values),
        ] {
            if selector.trim().is_empty() {
                return fail(&format!("{label} is empty"));
            }
        }
        if self.max_pages == 0 {
            return fail("max_pages must be at least 1");
        }
        Ok(())
    }

    /// Build the keyword-search URL for a query.
    pub fn search_url_for(&self, query: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        self.search_url.replace("{query}", &encoded)
    }

    /// Absolutize a possibly-relative href against the site base.
    pub fn absolute_url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if href.starts_with('/') {
            format!("{}{}", self.base_url.trim_end_matches('/'), href)
        } else {
            format!("{}/{}", self.base_url.trim_end_matches('/'), href)
        }
    }
}
