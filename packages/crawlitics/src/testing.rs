//! Mock collaborators for tests.
//!
//! Everything here is deterministic and in-process: a scripted browser
//! over page fixtures, a canned extraction service, and an embedder
//! that counts its calls. Kept in the library (not `#[cfg(test)]`) so
//! integration tests can drive the full pipeline with them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ExtractError, ExtractResult, NavResult, NavigationError, PipelineError, Result};
use crate::matcher::lexical_score;
use crate::traits::browser::{Browser, BrowserPage, ElementHandle};
use crate::traits::embedder::Embedder;
use crate::traits::extractor::{GeneratedSchema, SchemaExtractor};

// ---------------------------------------------------------------------
// Embedder

/// Counting embedder with optional scripted scores per query.
///
/// Unscripted queries fall back to lexical similarity, which keeps
/// tests deterministic without hand-writing every score.
#[derive(Default)]
pub struct MockEmbedder {
    calls: AtomicUsize,
    scripted: RwLock<HashMap<String, Vec<f32>>>,
    failing: RwLock<bool>,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the scores returned for one query.
    pub fn with_scores(self, query: impl Into<String>, scores: Vec<f32>) -> Self {
        if let Ok(mut scripted) = self.scripted.write() {
            scripted.insert(query.into(), scores);
        }
        self
    }

    /// Make every subsequent call fail.
    pub fn failing(self) -> Self {
        if let Ok(mut failing) = self.failing.write() {
            *failing = true;
        }
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_and_compare(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.read().map(|f| *f).unwrap_or(false) {
            return Err(PipelineError::Embedding(
                "mock embedder set to fail".to_string(),
            ));
        }
        if let Some(scores) = self
            .scripted
            .read()
            .ok()
            .and_then(|s| s.get(query).cloned())
        {
            return Ok(scores);
        }
        Ok(candidates
            .iter()
            .map(|c| lexical_score(query, c))
            .collect())
    }
}

// ---------------------------------------------------------------------
// Extraction service

/// Canned extraction service.
///
/// Schema generation is scripted per category; extraction matches the
/// page text against registered `(needle, json)` pairs. A configurable
/// number of leading transient failures exercises retry paths.
#[derive(Default)]
pub struct MockExtractor {
    generated: RwLock<HashMap<String, GeneratedSchema>>,
    responses: RwLock<Vec<(String, Value)>>,
    transient_failures: AtomicUsize,
    extract_calls: AtomicUsize,
    generate_calls: AtomicUsize,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the schema (and seed extraction) for a category.
    pub fn with_generated(self, category: impl Into<String>, generated: GeneratedSchema) -> Self {
        if let Ok(mut map) = self.generated.write() {
            map.insert(category.into(), generated);
        }
        self
    }

    /// Pages whose text contains `needle` extract to `json`.
    pub fn with_response(self, needle: impl Into<String>, json: Value) -> Self {
        if let Ok(mut responses) = self.responses.write() {
            responses.push((needle.into(), json));
        }
        self
    }

    /// Fail the next `n` extract calls with a transient service error.
    pub fn with_transient_failures(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn extract_call_count(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    pub fn generate_call_count(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaExtractor for MockExtractor {
    async fn generate_schema(
        &self,
        category: &str,
        _sample_text: &str,
    ) -> ExtractResult<GeneratedSchema> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.generated
            .read()
            .ok()
            .and_then(|map| map.get(category).cloned())
            .ok_or_else(|| {
                ExtractError::Service(
                    format!("no generated schema scripted for '{category}'").into(),
                )
            })
    }

    async fn extract(
        &self,
        text: &str,
        _schema: &crate::types::schema::ExtractionSchema,
    ) -> ExtractResult<Value> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ExtractError::Service("scripted transient failure".into()));
        }

        self.responses
            .read()
            .ok()
            .and_then(|responses| {
                responses
                    .iter()
                    .find(|(needle, _)| text.contains(needle.as_str()))
                    .map(|(_, json)| json.clone())
            })
            .ok_or_else(|| ExtractError::Service("no response scripted for this page".into()))
    }
}

// ---------------------------------------------------------------------
// Browser

/// One scripted DOM element.
#[derive(Debug, Clone, Default)]
pub struct FixtureElement {
    /// Selector this element answers to (exact string match)
    pub selector: String,

    pub text: String,
    pub attrs: HashMap<String, String>,

    /// Unique name, referenced by children via `scope`
    pub name: Option<String>,

    /// Name of the parent this element is scoped under, for
    /// `query_within`
    pub scope: Option<String>,
}

impl FixtureElement {
    pub fn new(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn within(mut self, parent_name: impl Into<String>) -> Self {
        self.scope = Some(parent_name.into());
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Shorthand for link-like elements.
    pub fn href(self, url: impl Into<String>) -> Self {
        self.attr("href", url)
    }

    /// Clicking this element navigates the page.
    pub fn click_goes_to(self, url: impl Into<String>) -> Self {
        self.attr("goto", url)
    }
}

/// One scripted page.
#[derive(Debug, Clone, Default)]
pub struct PageFixture {
    pub url: String,
    pub content: String,
    pub elements: Vec<FixtureElement>,
}

impl PageFixture {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_element(mut self, element: FixtureElement) -> Self {
        self.elements.push(element);
        self
    }
}

#[derive(Default)]
struct BrowserState {
    pages: HashMap<String, PageFixture>,
    clicks: Vec<String>,
    fills: Vec<(String, String)>,
}

/// Scripted browser over registered [`PageFixture`]s.
///
/// Navigating to an unregistered URL fails like a dead link would.
/// Click and fill interactions are logged for assertions.
#[derive(Default)]
pub struct MockBrowser {
    state: Arc<Mutex<BrowserState>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, fixture: PageFixture) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.pages.insert(fixture.url.clone(), fixture);
        }
        self
    }

    /// Texts of every clicked element, in click order.
    pub fn clicks(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.clicks.clone())
            .unwrap_or_default()
    }

    /// `(element text, value)` of every fill, in order.
    pub fn fills(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .map(|s| s.fills.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Browser for MockBrowser {
    async fn open_page(&self) -> NavResult<Box<dyn BrowserPage>> {
        Ok(Box::new(MockPage {
            state: self.state.clone(),
            current: RwLock::new(None),
        }))
    }
}

struct MockPage {
    state: Arc<Mutex<BrowserState>>,
    current: RwLock<Option<PageFixture>>,
}

impl MockPage {
    fn with_current<T>(
        &self,
        f: impl FnOnce(&PageFixture) -> NavResult<T>,
    ) -> NavResult<T> {
        let guard = self
            .current
            .read()
            .map_err(|_| NavigationError::Browser("page lock poisoned".into()))?;
        match guard.as_ref() {
            Some(fixture) => f(fixture),
            None => Err(NavigationError::InvalidUrl {
                url: "(no page loaded)".to_string(),
            }),
        }
    }

    fn element(&self, handle: ElementHandle) -> NavResult<FixtureElement> {
        self.with_current(|fixture| {
            fixture
                .elements
                .get(handle.0 as usize)
                .cloned()
                .ok_or_else(|| NavigationError::Browser("stale element handle".into()))
        })
    }

    fn navigate(&self, url: &str) -> NavResult<()> {
        let fixture = self
            .state
            .lock()
            .map_err(|_| NavigationError::Browser("browser lock poisoned".into()))?
            .pages
            .get(url)
            .cloned();
        let Some(fixture) = fixture else {
            return Err(NavigationError::InvalidUrl {
                url: url.to_string(),
            });
        };
        let mut guard = self
            .current
            .write()
            .map_err(|_| NavigationError::Browser("page lock poisoned".into()))?;
        *guard = Some(fixture);
        Ok(())
    }
}

#[async_trait]
impl BrowserPage for MockPage {
    async fn goto(&self, url: &str) -> NavResult<()> {
        self.navigate(url)
    }

    async fn current_url(&self) -> NavResult<String> {
        self.with_current(|fixture| Ok(fixture.url.clone()))
    }

    async fn wait_for_selector(&self, selector: &str) -> NavResult<()> {
        self.with_current(|fixture| {
            if fixture.elements.iter().any(|e| e.selector == selector) {
                Ok(())
            } else {
                Err(NavigationError::SelectorNotFound {
                    selector: selector.to_string(),
                })
            }
        })
    }

    async fn query(&self, selector: &str) -> NavResult<Option<ElementHandle>> {
        self.with_current(|fixture| {
            Ok(fixture
                .elements
                .iter()
                .position(|e| e.selector == selector)
                .map(|i| ElementHandle(i as u64)))
        })
    }

    async fn query_all(&self, selector: &str) -> NavResult<Vec<ElementHandle>> {
        self.with_current(|fixture| {
            Ok(fixture
                .elements
                .iter()
                .enumerate()
                .filter(|(_, e)| e.selector == selector)
                .map(|(i, _)| ElementHandle(i as u64))
                .collect())
        })
    }

    async fn query_within(
        &self,
        parent: ElementHandle,
        selector: &str,
    ) -> NavResult<Vec<ElementHandle>> {
        let parent = self.element(parent)?;
        self.with_current(|fixture| {
            Ok(fixture
                .elements
                .iter()
                .enumerate()
                .filter(|(_, e)| e.selector == selector && e.scope == parent.name)
                .map(|(i, _)| ElementHandle(i as u64))
                .collect())
        })
    }

    async fn inner_text(&self, element: ElementHandle) -> NavResult<String> {
        Ok(self.element(element)?.text)
    }

    async fn attribute(&self, element: ElementHandle, name: &str) -> NavResult<Option<String>> {
        Ok(self.element(element)?.attrs.get(name).cloned())
    }

    async fn click(&self, element: ElementHandle) -> NavResult<()> {
        let element = self.element(element)?;
        if let Ok(mut state) = self.state.lock() {
            state.clicks.push(element.text.clone());
        }
        if let Some(target) = element.attrs.get("goto") {
            self.navigate(target)?;
        }
        Ok(())
    }

    async fn fill(&self, element: ElementHandle, value: &str) -> NavResult<()> {
        let element = self.element(element)?;
        if let Ok(mut state) = self.state.lock() {
            state.fills.push((element.text, value.to_string()));
        }
        Ok(())
    }

    async fn press(&self, _element: ElementHandle, _key: &str) -> NavResult<()> {
        Ok(())
    }

    async fn content(&self) -> NavResult<String> {
        self.with_current(|fixture| Ok(fixture.content.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_browser_scoped_queries() {
        let browser = MockBrowser::new().with_page(
            PageFixture::new("https://x.bg")
                .with_element(FixtureElement::new(".section", "RAM").named("ram"))
                .with_element(FixtureElement::new(".option", "8 GB").within("ram"))
                .with_element(FixtureElement::new(".section", "Color").named("color"))
                .with_element(FixtureElement::new(".option", "Black").within("color")),
        );

        let page = browser.open_page().await.unwrap();
        page.goto("https://x.bg").await.unwrap();

        let sections = page.query_all(".section").await.unwrap();
        assert_eq!(sections.len(), 2);

        let options = page.query_within(sections[0], ".option").await.unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(page.inner_text(options[0]).await.unwrap(), "8 GB");
    }

    #[tokio::test]
    async fn test_mock_browser_click_navigation() {
        let browser = MockBrowser::new()
            .with_page(
                PageFixture::new("https://x.bg/1").with_element(
                    FixtureElement::new(".next", "Next").click_goes_to("https://x.bg/2"),
                ),
            )
            .with_page(PageFixture::new("https://x.bg/2").with_content("page two"));

        let page = browser.open_page().await.unwrap();
        page.goto("https://x.bg/1").await.unwrap();

        let next = page.query(".next").await.unwrap().unwrap();
        page.click(next).await.unwrap();

        assert_eq!(page.current_url().await.unwrap(), "https://x.bg/2");
        assert_eq!(browser.clicks(), vec!["Next".to_string()]);
    }

    #[tokio::test]
    async fn test_unregistered_url_fails() {
        let browser = MockBrowser::new();
        let page = browser.open_page().await.unwrap();
        assert!(page.goto("https://nowhere.bg").await.is_err());
    }
}
