//! Grouping raw records into product-identity clusters.

use indexmap::IndexMap;

use crate::types::record::RawProductRecord;

/// Canonical display name for a product: everything before the first
/// comma, trimmed. Retail titles pack variant noise after the comma
/// ("Galaxy S25, 256GB, Iceblue").
pub fn canonical_name(raw_name: &str) -> String {
    raw_name
        .split(',')
        .next()
        .unwrap_or(raw_name)
        .trim()
        .to_string()
}

/// Identity key a record clusters under.
pub fn grouping_key(record: &RawProductRecord) -> String {
    format!(
        "{}::{}",
        record.brand.trim().to_lowercase(),
        canonical_name(&record.name).to_lowercase()
    )
}

/// Group records by fuzzy identity key.
///
/// A record joins the best-scoring existing cluster whose key clears
/// the cutoff, otherwise it opens a new one under its own key. Keys
/// are compared case-insensitively with Jaro-Winkler, which forgives
/// the small spelling drift between retailers ("S25 5G" vs "S25 5G ").
pub fn cluster_records(
    records: &[RawProductRecord],
    cutoff: f64,
) -> IndexMap<String, Vec<RawProductRecord>> {
    let mut clusters: IndexMap<String, Vec<RawProductRecord>> = IndexMap::new();

    for record in records {
        let key = grouping_key(record);

        let mut best: Option<(String, f64)> = None;
        for existing in clusters.keys() {
            let score = strsim::jaro_winkler(existing, &key);
            if score < cutoff {
                continue;
            }
            match &best {
                Some((_, top)) if score <= *top => {}
                _ => best = Some((existing.clone(), score)),
            }
        }

        match best {
            Some((existing, _)) => {
                if let Some(cluster) = clusters.get_mut(&existing) {
                    cluster.push(record.clone());
                }
            }
            None => {
                clusters.insert(key, vec![record.clone()]);
            }
        }
    }

    clusters
}
