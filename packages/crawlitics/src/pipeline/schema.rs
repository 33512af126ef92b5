//! Category schema resolution.
//!
//! One schema per category, ever: a stored schema is reused verbatim,
//! and only a cache miss triggers the expensive "design a schema from
//! a sample page" call. The seed page's own extraction comes back with
//! the schema, so that page is never extracted twice.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatch::PageDispatcher;
use crate::error::{PipelineError, Result};
use crate::traits::browser::Browser;
use crate::traits::extractor::SchemaExtractor;
use crate::traits::store::ProductStore;
use crate::types::record::RawProductRecord;
use crate::types::schema::ExtractionSchema;

/// Outcome of schema resolution for one run.
#[derive(Debug)]
pub struct SchemaResolution {
    /// The schema in force for the category
    pub schema: ExtractionSchema,

    /// The seed page's record, when a schema was freshly derived and
    /// its sample extraction validated
    pub seed_record: Option<RawProductRecord>,

    /// URL consumed as the seed sample, to be excluded from the
    /// extraction batch
    pub seed_url: Option<String>,
}

/// Resolve the schema for a category, deriving one from a candidate
/// page on a cache miss.
///
/// Candidates are tried in order until one yields a schema; a race
/// with another run is settled by the store, and the loser adopts the
/// stored winner.
pub async fn resolve_schema(
    store: &dyn ProductStore,
    extractor: &dyn SchemaExtractor,
    dispatcher: &PageDispatcher,
    browser: &dyn Browser,
    category: &str,
    candidates: &[String],
    cancel: &CancellationToken,
) -> Result<SchemaResolution> {
    if let Some(schema) = store.schema_by_category(category).await? {
        info!(category, "reusing stored schema");
        return Ok(SchemaResolution {
            schema,
            seed_record: None,
            seed_url: None,
        });
    }

    for url in candidates {
        let content = match dispatcher.fetch_content(browser, url, cancel).await {
            Ok(content) => content,
            Err(e) => {
                warn!(url = %url, "seed page fetch failed, trying next candidate: {e}");
                continue;
            }
        };

        let generated = match extractor.generate_schema(category, &content).await {
            Ok(generated) => generated,
            Err(e) => {
                warn!(url = %url, "schema generation failed, trying next candidate: {e}");
                continue;
            }
        };

        let schema = store.put_schema(&generated.schema).await?;
        info!(category, seed_url = %url, "derived schema from seed page");

        // Validate the seed sample against whichever schema won the
        // race; a mismatch just sends the URL through normal extraction.
        let seed_record = match schema.parse_record(url, &generated.record_json) {
            Ok(mut record) => {
                crate::pipeline::extract::refine_from_page(&mut record, &content);
                Some(record)
            }
            Err(e) => {
                warn!(url = %url, "seed extraction did not validate: {e}");
                None
            }
        };
        let seed_url = seed_record.is_some().then(|| url.clone());

        return Ok(SchemaResolution {
            schema,
            seed_record,
            seed_url,
        });
    }

    Err(PipelineError::SchemaUnresolved {
        category: category.to_string(),
    })
}
