//! Transient candidate listings produced by the navigator.

/// A scored product listing discovered during pagination.
///
/// Never persisted; exists only between the navigator and the
/// freshness gate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateListing {
    /// Absolute product page URL
    pub url: String,

    /// Listing title as shown on the category page
    pub title: String,

    /// Blended relevance score against the user query, in [0, 1]
    pub relevance_score: f32,
}

impl CandidateListing {
    pub fn new(url: impl Into<String>, title: impl Into<String>, relevance_score: f32) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            relevance_score,
        }
    }
}
