//! Per-site crawl navigator.
//!
//! One browser session per site per run, driven through the phases
//! `SEARCH -> LOCATE_CATEGORY -> APPLY_FILTERS -> PAGINATE -> DONE`.
//! Sites run concurrently with each other but strictly sequentially
//! within a site: filter application and pagination are stateful with
//! respect to a single page's DOM.

pub mod filters;
pub mod pagination;

use std::sync::Arc;

use indexmap::IndexSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{NavResult, NavigationError, PipelineError, Result};
use crate::matcher::RelevanceMatcher;
use crate::text;
use crate::traits::browser::{Browser, BrowserPage};
use crate::types::criteria::{FilterSpec, SearchCriteria};
use crate::types::listing::CandidateListing;
use crate::types::site::SiteProfile;

/// Where a site run ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavPhase {
    Search,
    LocateCategory,
    ApplyFilters,
    Paginate,
    Done,
    Failed,
}

/// Result of one site's navigation run.
#[derive(Debug)]
pub struct SiteOutcome {
    pub site: String,
    pub phase: NavPhase,
    pub listings: Vec<CandidateListing>,

    /// User filters that could not be satisfied on this site: no
    /// matching section, or no option fitting the value
    pub unmatched_filters: Vec<FilterSpec>,

    /// Failure message when `phase` is `Failed`
    pub failure: Option<String>,
}

impl SiteOutcome {
    fn failed(site: &str, error: &NavigationError) -> Self {
        Self {
            site: site.to_string(),
            phase: NavPhase::Failed,
            listings: Vec::new(),
            unmatched_filters: Vec::new(),
            failure: Some(error.to_string()),
        }
    }
}

/// Union of all site runs, after the relaxed URL corroboration pass.
#[derive(Debug)]
pub struct CrawlOutcome {
    /// De-duplicated, relevance-filtered product URLs across all sites
    pub urls: Vec<String>,

    /// Per-site outcomes, including failures
    pub sites: Vec<SiteOutcome>,
}

impl CrawlOutcome {
    pub fn failed_site_count(&self) -> usize {
        self.sites
            .iter()
            .filter(|s| s.phase == NavPhase::Failed)
            .count()
    }
}

/// Drives one site through its navigation state machine.
pub struct Navigator {
    profile: SiteProfile,
    matcher: Arc<RelevanceMatcher>,
}

impl Navigator {
    /// Build a navigator for a validated profile.
    pub fn new(profile: SiteProfile, matcher: Arc<RelevanceMatcher>) -> Result<Self> {
        profile.validate()?;
        Ok(Self { profile, matcher })
    }

    /// Run the full state machine for one site.
    pub async fn run(
        &self,
        browser: &dyn Browser,
        criteria: &SearchCriteria,
        cancel: &CancellationToken,
    ) -> NavResult<SiteOutcome> {
        let site = self.profile.name.as_str();
        info!(site, query = %criteria.query, "starting site navigation");

        let page = browser.open_page().await?;

        // SEARCH
        let search_url = self.profile.search_url_for(&criteria.query);
        page.goto(&search_url).await?;

        if cancel.is_cancelled() {
            return Err(NavigationError::Cancelled);
        }

        // LOCATE_CATEGORY
        self.locate_category(page.as_ref(), &search_url).await?;

        if cancel.is_cancelled() {
            return Err(NavigationError::Cancelled);
        }

        // APPLY_FILTERS
        let unmatched =
            filters::apply_all(page.as_ref(), &self.profile, &self.matcher, &criteria.filters)
                .await?;
        for filter in &unmatched {
            warn!(site, filter = %filter.name, "filter could not be matched on this site");
        }

        if cancel.is_cancelled() {
            return Err(NavigationError::Cancelled);
        }

        // PAGINATE
        let listings =
            pagination::collect_listings(page.as_ref(), &self.profile, &self.matcher, &criteria.query)
                .await?;

        info!(site, found = listings.len(), "site navigation complete");
        Ok(SiteOutcome {
            site: site.to_string(),
            phase: NavPhase::Done,
            listings,
            unmatched_filters: unmatched,
            failure: None,
        })
    }

    /// Find the deepest category page via the first search result's
    /// breadcrumb trail. Falls back to the search results page itself
    /// when the trail is missing; only navigation breakage is fatal.
    async fn locate_category(&self, page: &dyn BrowserPage, search_url: &str) -> NavResult<()> {
        let site = self.profile.name.as_str();

        if page
            .wait_for_selector(&self.profile.search_card_selector)
            .await
            .is_err()
        {
            warn!(site, "no search results; using search page as category page");
            return Ok(());
        }

        let Some(first) = page.query(&self.profile.search_card_selector).await? else {
            warn!(site, "no first result; using search page as category page");
            return Ok(());
        };
        let Some(href) = page.attribute(first, "href").await? else {
            warn!(site, "first result has no href; using search page as category page");
            return Ok(());
        };

        let product_url = self.profile.absolute_url(&href);
        page.goto(&product_url).await?;

        let crumb_selector = format!("{} a", self.profile.breadcrumb_selector);
        let crumbs = page.query_all(&crumb_selector).await?;
        let Some(last) = crumbs.last().copied() else {
            warn!(site, "no breadcrumbs; returning to search results");
            page.goto(search_url).await?;
            return Ok(());
        };

        let Some(category_href) = page.attribute(last, "href").await? else {
            warn!(site, "breadcrumb has no href; returning to search results");
            page.goto(search_url).await?;
            return Ok(());
        };

        let category_url = self.profile.absolute_url(&category_href);
        info!(site, category_url = %category_url, "located category page via breadcrumbs");
        page.goto(&category_url).await
    }
}

/// Crawl every site concurrently and union the results.
///
/// A fault in one site never aborts another; the run fails only when
/// every site failed. The final URL set gets the relaxed corroboration
/// pass: every query token must literally appear in the URL.
pub async fn crawl_sites(
    profiles: &[SiteProfile],
    browser: Arc<dyn Browser>,
    matcher: Arc<RelevanceMatcher>,
    criteria: &SearchCriteria,
    cancel: &CancellationToken,
) -> Result<CrawlOutcome> {
    let mut tasks = tokio::task::JoinSet::new();

    for profile in profiles {
        let navigator = Navigator::new(profile.clone(), matcher.clone())?;
        let browser = browser.clone();
        let criteria = criteria.clone();
        let cancel = cancel.child_token();
        let site = profile.name.clone();

        tasks.spawn(async move {
            match navigator.run(browser.as_ref(), &criteria, &cancel).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(site = %site, "site navigation failed: {e}");
                    SiteOutcome::failed(&site, &e)
                }
            }
        });
    }

    let mut sites = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => sites.push(outcome),
            Err(e) => warn!("site task panicked or was aborted: {e}"),
        }
    }

    // Stable ordering regardless of completion order
    sites.sort_by(|a, b| a.site.cmp(&b.site));

    if !profiles.is_empty() && sites.iter().all(|s| s.phase == NavPhase::Failed) {
        return Err(PipelineError::AllSitesFailed {
            count: profiles.len(),
        });
    }

    let mut urls: IndexSet<String> = IndexSet::new();
    for outcome in &sites {
        for listing in &outcome.listings {
            urls.insert(listing.url.clone());
        }
    }

    let all: Vec<String> = urls.into_iter().collect();
    let urls = text::urls_matching_query(&all, &criteria.query);
    info!(
        total = all.len(),
        kept = urls.len(),
        "crawl complete after relaxed URL filtering"
    );

    Ok(CrawlOutcome { urls, sites })
}
