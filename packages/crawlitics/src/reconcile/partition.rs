//! Common/variant spec-key partitioning.
//!
//! A key is common when every member of a family carries it with an
//! equivalent value; everything else is variant. The partition is
//! recomputed from scratch every pass over the whole family, so adding
//! one SKU can legitimately flip a previously common key to variant.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::text;
use crate::types::config::ReconcileConfig;
use crate::types::record::is_unknown;

/// The two sides of a family's spec-key split.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPartition {
    pub common: BTreeSet<String>,
    pub variant: BTreeSet<String>,
}

/// Whether two spec values describe the same fact.
///
/// Three equivalences, tried in order:
/// 1. normalized strings equal, case-insensitive;
/// 2. both carry numeric tokens and the sorted token multisets match
///    ("1440x3120" vs "3120 x 1440");
/// 3. numeric token multisets match (possibly both empty) and the
///    normalized strings clear the fuzzy cutoff ("Octa-core" vs
///    "Octa core processor" stays apart, "Iceblue" vs "Ice Blue"
///    does not).
pub fn values_equivalent(a: &str, b: &str, fuzzy_cutoff: f64) -> bool {
    let na = text::normalize_value(a).to_lowercase();
    let nb = text::normalize_value(b).to_lowercase();
    if na == nb {
        return true;
    }

    let ta = text::numeric_tokens(&na);
    let tb = text::numeric_tokens(&nb);
    if !ta.is_empty() && ta == tb {
        return true;
    }

    ta == tb && strsim::jaro_winkler(&na, &nb) >= fuzzy_cutoff
}

/// Split the union of spec keys across family members into common and
/// variant.
///
/// Deny-listed keys (free-text fields) are always variant. A key whose
/// value is unknown for any member is variant: absence of evidence is
/// not agreement. Key order in the result follows first appearance
/// across members.
pub fn partition_keys(
    members: &[&IndexMap<String, String>],
    config: &ReconcileConfig,
) -> KeyPartition {
    let mut partition = KeyPartition::default();
    if members.is_empty() {
        return partition;
    }

    let mut all_keys: Vec<&str> = Vec::new();
    for member in members {
        for key in member.keys() {
            if !all_keys.contains(&key.as_str()) {
                all_keys.push(key);
            }
        }
    }

    for key in all_keys {
        if config.deny_keys.contains(key) {
            partition.variant.insert(key.to_string());
            continue;
        }

        let values: Vec<&str> = members
            .iter()
            .filter_map(|m| m.get(key).map(String::as_str))
            .collect();

        let everywhere = values.len() == members.len();
        let all_known = values.iter().all(|v| !is_unknown(v));
        let agree = everywhere
            && all_known
            && values
                .iter()
                .skip(1)
                .all(|v| values_equivalent(values[0], v, config.value_fuzzy_cutoff));

        if agree {
            partition.common.insert(key.to_string());
        } else {
            partition.variant.insert(key.to_string());
        }
    }

    partition
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn config() -> ReconcileConfig {
        ReconcileConfig::default()
    }

    #[test]
    fn test_identical_values_are_common() {
        let a = specs(&[("ram", "8 GB"), ("storage", "256 GB")]);
        let b = specs(&[("ram", "8 GB"), ("storage", "512 GB")]);
        let partition = partition_keys(&[&a, &b], &config());

        assert!(partition.common.contains("ram"));
        assert!(partition.variant.contains("storage"));
    }

    #[test]
    fn test_reordered_dimensions_are_common() {
        let a = specs(&[("resolution", "1440x3120")]);
        let b = specs(&[("resolution", "3120 x 1440")]);
        let partition = partition_keys(&[&a, &b], &config());

        assert!(partition.common.contains("resolution"));
    }

    #[test]
    fn test_unknown_value_forces_variant() {
        let a = specs(&[("ram", "8 GB")]);
        let b = specs(&[("ram", "unknown")]);
        let partition = partition_keys(&[&a, &b], &config());

        assert!(partition.variant.contains("ram"));
    }

    #[test]
    fn test_missing_key_forces_variant() {
        let a = specs(&[("ram", "8 GB"), ("nfc", "yes")]);
        let b = specs(&[("ram", "8 GB")]);
        let partition = partition_keys(&[&a, &b], &config());

        assert!(partition.variant.contains("nfc"));
    }

    #[test]
    fn test_deny_listed_key_always_variant() {
        let a = specs(&[("features", "5G, NFC")]);
        let b = specs(&[("features", "5G, NFC")]);
        let partition = partition_keys(&[&a, &b], &config());

        assert!(partition.variant.contains("features"));
    }

    #[test]
    fn test_third_member_flips_common_to_variant() {
        let a = specs(&[("color", "Iceblue")]);
        let b = specs(&[("color", "Iceblue")]);
        let c = specs(&[("color", "Navy")]);

        let two = partition_keys(&[&a, &b], &config());
        assert!(two.common.contains("color"));

        let three = partition_keys(&[&a, &b, &c], &config());
        assert!(three.variant.contains("color"));
    }

    #[test]
    fn test_fuzzy_equivalence_needs_matching_numbers() {
        // Same digits, near-identical text
        assert!(values_equivalent("Super AMOLED 120Hz", "Super AMOLED, 120 Hz", 0.85));
        // Different digits never fuzz together
        assert!(!values_equivalent("120 Hz", "144 Hz", 0.85));
    }
}
