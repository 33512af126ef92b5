//! Result-page walking and listing collection.

use indexmap::IndexSet;
use tracing::{debug, info};

use crate::error::NavResult;
use crate::matcher::RelevanceMatcher;
use crate::traits::browser::BrowserPage;
use crate::types::listing::CandidateListing;
use crate::types::site::SiteProfile;

/// Titles are truncated before scoring; card text often trails off
/// into price and promo noise.
const TITLE_SCORING_LEN: usize = 100;

/// Walk result pages collecting listings whose titles match the query.
///
/// Stops on: page cap reached, result cards never appearing (treated
/// as "no more results", not an error), no next button, or a next
/// button disabled by CSS class.
pub async fn collect_listings(
    page: &dyn BrowserPage,
    profile: &SiteProfile,
    matcher: &RelevanceMatcher,
    query: &str,
) -> NavResult<Vec<CandidateListing>> {
    let threshold = matcher.config().title_threshold;
    let mut seen: IndexSet<String> = IndexSet::new();
    let mut listings = Vec::new();

    for page_number in 1..=profile.max_pages {
        if page
            .wait_for_selector(&profile.category_card_selector)
            .await
            .is_err()
        {
            debug!(page_number, "result cards never appeared; assuming no more results");
            break;
        }

        let cards = page.query_all(&profile.category_card_selector).await?;
        if cards.is_empty() {
            break;
        }

        let mut titles = Vec::with_capacity(cards.len());
        for card in &cards {
            let full = page.inner_text(*card).await?;
            titles.push(truncate_title(&full));
        }

        let scores = matcher.score_batch(query, &titles).await;
        let mut kept = 0usize;
        for ((card, title), score) in cards.iter().zip(&titles).zip(scores) {
            if score < threshold {
                continue;
            }
            let Some(href) = page.attribute(*card, "href").await? else {
                continue;
            };
            let url = profile.absolute_url(&href);
            if seen.insert(url.clone()) {
                listings.push(CandidateListing::new(url, title.clone(), score));
                kept += 1;
            }
        }
        debug!(page_number, cards = cards.len(), kept, "scored result page");

        let Some(next_selector) = &profile.next_page_selector else {
            break;
        };
        let Some(next) = page.query(next_selector).await? else {
            debug!(page_number, "no next-page button");
            break;
        };
        let class = page.attribute(next, "class").await?.unwrap_or_default();
        if class.to_lowercase().contains("disable") {
            debug!(page_number, "next-page button disabled");
            break;
        }
        page.click(next).await?;
    }

    info!(
        site = %profile.name,
        listings = listings.len(),
        "pagination complete"
    );
    Ok(listings)
}

/// Whitespace-collapsed prefix of a card's text, capped for scoring.
fn truncate_title(full: &str) -> String {
    let collapsed = full.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(TITLE_SCORING_LEN).collect()
}
