//! Browser automation seam.
//!
//! The navigator drives a site through this abstract capability and
//! never assumes a specific engine. Elements are opaque handles valid
//! until the next navigation.

use async_trait::async_trait;

use crate::error::NavResult;

/// Opaque handle to a DOM element on the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub u64);

/// A browser session factory. One page per site run.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn open_page(&self) -> NavResult<Box<dyn BrowserPage>>;
}

/// One browser tab/page.
///
/// All methods take `&self`; implementations handle their own interior
/// synchronization, matching how real automation engines expose pages.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate to a URL, invalidating all element handles.
    async fn goto(&self, url: &str) -> NavResult<()>;

    /// URL of the current page.
    async fn current_url(&self) -> NavResult<String>;

    /// Wait until a selector matches, or fail with
    /// [`NavigationError::SelectorNotFound`](crate::error::NavigationError).
    async fn wait_for_selector(&self, selector: &str) -> NavResult<()>;

    /// First element matching a selector, if any.
    async fn query(&self, selector: &str) -> NavResult<Option<ElementHandle>>;

    /// All elements matching a selector.
    async fn query_all(&self, selector: &str) -> NavResult<Vec<ElementHandle>>;

    /// All elements matching a selector within a parent element.
    async fn query_within(
        &self,
        parent: ElementHandle,
        selector: &str,
    ) -> NavResult<Vec<ElementHandle>>;

    /// Visible text of an element.
    async fn inner_text(&self, element: ElementHandle) -> NavResult<String>;

    /// An attribute value, if present.
    async fn attribute(&self, element: ElementHandle, name: &str) -> NavResult<Option<String>>;

    /// Click an element.
    async fn click(&self, element: ElementHandle) -> NavResult<()>;

    /// Fill an input element.
    async fn fill(&self, element: ElementHandle, value: &str) -> NavResult<()>;

    /// Press a key while an element is focused.
    async fn press(&self, element: ElementHandle, key: &str) -> NavResult<()>;

    /// Readable content of the whole page (markdown or stripped text),
    /// as fed to the extraction service.
    async fn content(&self) -> NavResult<String>;
}
