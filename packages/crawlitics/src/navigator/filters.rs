//! Filter application against a category page's sidebar.
//!
//! Matching is best-first and global: each pass re-scans the sidebar,
//! scores every still-unapplied filter against every section title, and
//! applies the single strongest pair. The pass count is capped at one
//! more than the filter count, so a sidebar that mutates under us can
//! still converge.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::NavResult;
use crate::matcher::RelevanceMatcher;
use crate::text;
use crate::traits::browser::{BrowserPage, ElementHandle};
use crate::types::criteria::FilterSpec;
use crate::types::site::SiteProfile;

/// Apply the user's filters to the current page.
///
/// Returns the filters that were not satisfied: either no section
/// matched their name, or the matched section had no option fitting
/// their value. Single-filter breakage is non-fatal; only
/// browser-level faults bubble up.
pub async fn apply_all(
    page: &dyn BrowserPage,
    profile: &SiteProfile,
    matcher: &RelevanceMatcher,
    filters: &[FilterSpec],
) -> NavResult<Vec<FilterSpec>> {
    if filters.is_empty() {
        return Ok(Vec::new());
    }

    let threshold = matcher.config().filter_threshold;
    let mut applied_names: HashSet<String> = HashSet::new();
    let mut satisfied_names: HashSet<String> = HashSet::new();
    let mut applied_options: HashSet<String> = HashSet::new();

    // One extra pass over the filter count: applying a filter mutates
    // the sidebar and can surface sections that were not there before.
    for pass in 0..=filters.len() {
        let remaining: Vec<&FilterSpec> = filters
            .iter()
            .filter(|f| !applied_names.contains(&f.name))
            .collect();
        if remaining.is_empty() {
            break;
        }

        let sections = scan_sections(page, profile).await?;
        if sections.is_empty() {
            debug!(pass, "no filter sections on page");
            break;
        }
        let titles: Vec<String> = sections.iter().map(|(_, t)| t.clone()).collect();

        // Strongest (filter, section) pair across everything unapplied
        let mut best: Option<(usize, usize, f32)> = None;
        for (filter_index, filter) in remaining.iter().enumerate() {
            let scores = matcher.score_batch(&filter.name, &titles).await;
            for (section_index, score) in scores.into_iter().enumerate() {
                if score < threshold {
                    continue;
                }
                match best {
                    Some((_, _, top)) if score <= top => {}
                    _ => best = Some((filter_index, section_index, score)),
                }
            }
        }

        let Some((filter_index, section_index, score)) = best else {
            debug!(pass, "no remaining filter matches any section");
            break;
        };

        let filter = remaining[filter_index];
        let (section, title) = &sections[section_index];
        info!(
            filter = %filter.name,
            section = %title,
            score,
            "applying filter to best-matching section"
        );

        let applied = if filter.is_range() {
            apply_range(page, profile, *section, &filter.value, &mut applied_options).await?
        } else {
            apply_text(page, profile, matcher, *section, &filter.value, &mut applied_options)
                .await?
        };
        if applied {
            satisfied_names.insert(filter.name.clone());
        } else {
            warn!(filter = %filter.name, "no option in matched section fit the value");
        }
        // Applied or not, the filter is done: re-trying the same
        // section would pick the same options.
        applied_names.insert(filter.name.clone());

        // Let the results re-render before the next scan
        if page.wait_for_selector(&profile.filters.sections).await.is_err() {
            debug!("filter sidebar gone after applying; stopping");
            break;
        }
    }

    Ok(filters
        .iter()
        .filter(|f| !satisfied_names.contains(&f.name))
        .cloned()
        .collect())
}

/// Sidebar sections with their visible titles, empty titles dropped.
async fn scan_sections(
    page: &dyn BrowserPage,
    profile: &SiteProfile,
) -> NavResult<Vec<(ElementHandle, String)>> {
    let handles = page.query_all(&profile.filters.sections).await?;
    let mut sections = Vec::with_capacity(handles.len());
    for handle in handles {
        let title_els = page.query_within(handle, &profile.filters.titles).await?;
        let Some(title_el) = title_els.first() else {
            continue;
        };
        let title = text::normalize_value(&page.inner_text(*title_el).await?);
        if !title.is_empty() {
            sections.push((handle, title));
        }
    }
    Ok(sections)
}

/// Range filter: direct min/max inputs when the profile declares them,
/// otherwise select every predefined option whose range overlaps the
/// requested one.
async fn apply_range(
    page: &dyn BrowserPage,
    profile: &SiteProfile,
    section: ElementHandle,
    value: &str,
    applied_options: &mut HashSet<String>,
) -> NavResult<bool> {
    let Some((min, max)) = text::parse_numeric_range(value) else {
        warn!(value, "range filter value is not a numeric range");
        return Ok(false);
    };

    if let Some(inputs_selector) = &profile.filters.price_inputs {
        let inputs = page.query_within(section, inputs_selector).await?;
        if inputs.len() >= 2 {
            page.fill(inputs[0], &format_bound(min)).await?;
            page.fill(inputs[1], &format_bound(max)).await?;
            page.press(inputs[1], "Enter").await?;
            debug!(min, max, "filled free-form range inputs");
            return Ok(true);
        }
    }

    let options = page.query_within(section, &profile.filters.values).await?;
    let mut any = false;
    for option in options {
        let raw = page.inner_text(option).await?;
        let label = text::strip_count_suffix(&text::normalize_value(&raw));
        let Some((low, high)) = text::parse_numeric_range(&label) else {
            continue;
        };
        // Overlap, not containment: "1500 - 2500" selects both the
        // "1500 - 2000" and "2000 - 3000" buckets.
        if low <= max && high >= min {
            if click_tracked(page, option, &label, applied_options).await? {
                debug!(option = %label, "selected overlapping range option");
                any = true;
            }
        }
    }
    Ok(any)
}

/// Text filter: each comma-separated wanted value gets its own
/// best-match against the section's option labels.
async fn apply_text(
    page: &dyn BrowserPage,
    profile: &SiteProfile,
    matcher: &RelevanceMatcher,
    section: ElementHandle,
    value: &str,
    applied_options: &mut HashSet<String>,
) -> NavResult<bool> {
    let options = page.query_within(section, &profile.filters.values).await?;
    let mut labels = Vec::with_capacity(options.len());
    for option in &options {
        let raw = page.inner_text(*option).await?;
        labels.push(text::strip_count_suffix(&text::normalize_value(&raw)));
    }
    if labels.is_empty() {
        return Ok(false);
    }

    let threshold = matcher.config().filter_threshold;
    let mut any = false;
    for wanted in value.split(',') {
        let wanted = wanted.trim();
        if wanted.is_empty() {
            continue;
        }
        let Some((index, score)) = matcher.best_match(wanted, &labels, threshold).await else {
            debug!(wanted, "no option label matched this value");
            continue;
        };
        if click_tracked(page, options[index], &labels[index], applied_options).await? {
            debug!(wanted, option = %labels[index], score, "selected filter option");
            any = true;
        }
    }
    Ok(any)
}

/// Click an option at most once per run; toggling it back off would
/// undo the filter.
async fn click_tracked(
    page: &dyn BrowserPage,
    option: ElementHandle,
    label: &str,
    applied_options: &mut HashSet<String>,
) -> NavResult<bool> {
    if !applied_options.insert(label.to_string()) {
        return Ok(false);
    }
    page.click(option).await?;
    Ok(true)
}

fn format_bound(bound: f64) -> String {
    if bound.fract() == 0.0 {
        format!("{}", bound as i64)
    } else {
        format!("{bound}")
    }
}
