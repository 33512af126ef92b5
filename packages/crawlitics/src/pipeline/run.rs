//! Pipeline assembly and the top-level run loop.

use std::sync::Arc;

use indexmap::IndexSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dispatch::PageDispatcher;
use crate::error::{PipelineError, Result};
use crate::matcher::RelevanceMatcher;
use crate::navigator::{self, CrawlOutcome};
use crate::pipeline::extract::extract_batch;
use crate::pipeline::freshness::FreshnessGate;
use crate::pipeline::schema::resolve_schema;
use crate::reconcile::plan::ApplyOutcome;
use crate::reconcile::Reconciler;
use crate::traits::browser::Browser;
use crate::traits::embedder::Embedder;
use crate::traits::extractor::SchemaExtractor;
use crate::traits::store::ProductStore;
use crate::types::config::PipelineConfig;
use crate::types::criteria::{FilterSpec, SearchCriteria};
use crate::types::product::ProductFamily;
use crate::types::record::RawProductRecord;
use crate::types::site::SiteProfile;

/// What one run did, for callers and logs.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Every product family the run's URLs resolved to
    pub families: Vec<ProductFamily>,

    /// Candidate product URLs after crawling and relevance filtering
    pub urls: Vec<String>,

    /// URLs served from the freshness cache without a page visit
    pub fresh_hits: usize,

    /// Pages newly extracted this run (seed page included)
    pub extracted: usize,

    /// URLs that failed fetch or extraction, with reasons
    pub extraction_failures: Vec<(String, String)>,

    /// Sites whose navigation failed outright
    pub failed_sites: usize,

    /// Per site, the user filters that could not be satisfied there
    pub unmatched_filters: Vec<(String, Vec<FilterSpec>)>,

    /// What reconciliation persisted
    pub applied: ApplyOutcome,
}

/// The assembled pipeline. Cheap to share; every stage borrows the
/// same collaborators.
pub struct Pipeline {
    browser: Arc<dyn Browser>,
    extractor: Arc<dyn SchemaExtractor>,
    store: Arc<dyn ProductStore>,
    matcher: Arc<RelevanceMatcher>,
    dispatcher: PageDispatcher,
    reconciler: Reconciler,
    freshness: FreshnessGate,
    sites: Vec<SiteProfile>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        browser: Arc<dyn Browser>,
        extractor: Arc<dyn SchemaExtractor>,
        store: Arc<dyn ProductStore>,
        sites: Vec<SiteProfile>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            browser,
            extractor,
            store,
            matcher: Arc::new(RelevanceMatcher::new(config.matcher.clone())),
            dispatcher: PageDispatcher::new(config.dispatch.clone()),
            reconciler: Reconciler::new(config.reconcile.clone()),
            freshness: FreshnessGate::new(config.freshness_ttl),
            sites,
            config,
        }
    }

    /// Attach an embedding service; scoring stays lexical without one.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.matcher = Arc::new(
            RelevanceMatcher::new(self.config.matcher.clone()).with_embedder(embedder),
        );
        self
    }

    /// Crawl only: candidate URLs and per-site outcomes, no
    /// extraction or persistence.
    pub async fn discover(
        &self,
        criteria: &SearchCriteria,
        cancel: &CancellationToken,
    ) -> Result<CrawlOutcome> {
        criteria.validate()?;
        navigator::crawl_sites(
            &self.sites,
            self.browser.clone(),
            self.matcher.clone(),
            criteria,
            cancel,
        )
        .await
    }

    /// The full run: crawl, gate, resolve schema, extract, reconcile.
    pub async fn run(
        &self,
        criteria: &SearchCriteria,
        cancel: &CancellationToken,
    ) -> Result<PipelineReport> {
        criteria.validate()?;
        info!(query = %criteria.query, category = %criteria.category, "pipeline run starting");

        let crawl = navigator::crawl_sites(
            &self.sites,
            self.browser.clone(),
            self.matcher.clone(),
            criteria,
            cancel,
        )
        .await?;

        let split = self
            .freshness
            .partition(self.store.as_ref(), &crawl.urls)
            .await?;

        let mut report = PipelineReport {
            urls: crawl.urls.clone(),
            fresh_hits: split.cached.len(),
            failed_sites: crawl.failed_site_count(),
            unmatched_filters: crawl
                .sites
                .iter()
                .filter(|s| !s.unmatched_filters.is_empty())
                .map(|s| (s.site.clone(), s.unmatched_filters.clone()))
                .collect(),
            ..PipelineReport::default()
        };

        let mut new_records: Vec<RawProductRecord> = Vec::new();
        if !split.to_fetch.is_empty() {
            let resolved = resolve_schema(
                self.store.as_ref(),
                self.extractor.as_ref(),
                &self.dispatcher,
                self.browser.as_ref(),
                &criteria.category,
                &split.to_fetch,
                cancel,
            )
            .await;

            match resolved {
                Ok(resolution) => {
                    let remaining: Vec<String> = split
                        .to_fetch
                        .iter()
                        .filter(|url| Some(url.as_str()) != resolution.seed_url.as_deref())
                        .cloned()
                        .collect();

                    let outcome = extract_batch(
                        self.browser.clone(),
                        &self.dispatcher,
                        self.extractor.clone(),
                        &resolution.schema,
                        &self.config.extractor,
                        &remaining,
                        cancel,
                    )
                    .await;

                    new_records.extend(resolution.seed_record);
                    new_records.extend(outcome.records);
                    report.extracted = new_records.len();
                    report.extraction_failures = outcome.failures;
                }
                // An unresolvable schema fails these URLs, not the run:
                // cached families are still a valid partial result.
                Err(e @ PipelineError::SchemaUnresolved { .. }) => {
                    warn!("skipping extraction this run: {e}");
                    let reason = e.to_string();
                    report.extraction_failures = split
                        .to_fetch
                        .iter()
                        .map(|url| (url.clone(), reason.clone()))
                        .collect();
                }
                Err(e) => return Err(e),
            }
        }

        if !new_records.is_empty() {
            let plan = self
                .reconciler
                .build_plan(self.store.as_ref(), &new_records)
                .await?;
            report.applied = self.store.apply(&plan).await?;
            info!(
                products_created = report.applied.products_created,
                variants_created = report.applied.variants_created,
                prices_appended = report.applied.prices_appended,
                "reconciliation applied"
            );
        }

        report.families = self
            .load_families(new_records.iter().chain(&split.cached))
            .await?;

        info!(
            families = report.families.len(),
            fresh_hits = report.fresh_hits,
            extracted = report.extracted,
            failed_urls = report.extraction_failures.len(),
            "pipeline run complete"
        );
        Ok(report)
    }

    /// Resolve every record URL back to its (now persisted) family.
    async fn load_families<'a>(
        &self,
        records: impl Iterator<Item = &'a RawProductRecord>,
    ) -> Result<Vec<ProductFamily>> {
        let mut parent_ids: IndexSet<Uuid> = IndexSet::new();
        for record in records {
            match self.store.variant_by_url(&record.source_url).await? {
                Some(variant) => {
                    parent_ids.insert(variant.parent_id);
                }
                None => warn!(url = %record.source_url, "record did not persist to a variant"),
            }
        }

        let mut families = Vec::with_capacity(parent_ids.len());
        for id in parent_ids {
            if let Some(family) = self.store.family_by_id(id).await? {
                families.push(family);
            }
        }
        Ok(families)
    }
}
