//! Concurrent page extraction against a resolved schema.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatch::{with_retries, PageDispatcher};
use crate::error::ExtractError;
use crate::text;
use crate::traits::browser::Browser;
use crate::traits::extractor::SchemaExtractor;
use crate::types::config::ExtractorConfig;
use crate::types::record::{Availability, RawProductRecord};
use crate::types::schema::ExtractionSchema;

/// What a batch extraction produced.
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    pub records: Vec<RawProductRecord>,

    /// URLs that failed, with the reason. Failures never abort the
    /// batch; every URL resolves one way or the other.
    pub failures: Vec<(String, String)>,
}

/// Fetch and extract a batch of URLs.
///
/// Page fetching is bounded by the dispatcher; extraction-service
/// calls are bounded separately since they are the scarcer resource.
/// Transient service faults retry per the policy; validation failures
/// fail that URL immediately.
pub async fn extract_batch(
    browser: Arc<dyn Browser>,
    dispatcher: &PageDispatcher,
    extractor: Arc<dyn SchemaExtractor>,
    schema: &ExtractionSchema,
    config: &ExtractorConfig,
    urls: &[String],
    cancel: &CancellationToken,
) -> ExtractionOutcome {
    let mut outcome = ExtractionOutcome::default();
    if urls.is_empty() {
        return outcome;
    }

    let fetched = dispatcher.fetch_many(browser, urls, cancel).await;

    let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut tasks = tokio::task::JoinSet::new();

    for (url, fetch) in fetched {
        let content = match fetch {
            Ok(content) => content,
            Err(e) => {
                outcome.failures.push((url, e.to_string()));
                continue;
            }
        };

        let permits = permits.clone();
        let extractor = extractor.clone();
        let schema = schema.clone();
        let retry = config.retry.clone();
        let cancel = cancel.clone();

        tasks.spawn(async move {
            let result = async {
                let _permit = permits
                    .acquire()
                    .await
                    .map_err(|_| ExtractError::Cancelled)?;
                if cancel.is_cancelled() {
                    return Err(ExtractError::Cancelled);
                }

                let json = with_retries(&retry, ExtractError::is_retryable, || {
                    extractor.extract(&content, &schema)
                })
                .await?;

                let mut record = schema.parse_record(&url, &json)?;
                refine_from_page(&mut record, &content);
                Ok::<_, ExtractError>(record)
            }
            .await;
            (url, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(record))) => outcome.records.push(record),
            Ok((url, Err(e))) => {
                warn!(url = %url, "extraction failed: {e}");
                outcome.failures.push((url, e.to_string()));
            }
            Err(e) => warn!("extraction task panicked or was aborted: {e}"),
        }
    }

    // Deterministic output order regardless of completion order
    outcome.records.sort_by(|a, b| a.source_url.cmp(&b.source_url));
    outcome.failures.sort();

    info!(
        extracted = outcome.records.len(),
        failed = outcome.failures.len(),
        "batch extraction complete"
    );
    outcome
}

/// Patch gaps in an extracted record from the raw page text.
///
/// The extraction service is good at structure but misses the price
/// and stock banners sites render outside the spec tables.
pub(crate) fn refine_from_page(record: &mut RawProductRecord, content: &str) {
    if record.availability == Availability::Unknown {
        record.availability = text::sniff_availability(content);
    }
    if record.price <= 0.0 {
        if let Some(price) = text::sniff_price(content) {
            record.price = price;
        }
    }
}
