//! Text normalization and locale-aware numeric parsing.
//!
//! Everything that turns messy retail-page text into comparable values
//! lives here, isolated from matching and reconciliation logic.
//!
//! Locale assumptions (Bulgarian retail sites): the decimal separator
//! is a comma when both separators appear or when only a comma appears
//! (`1.299,99`, `1299,99`); thousands may be grouped with spaces, dots
//! or apostrophes (`1 299`, `1.299`, `1'299`). A lone dot is read as a
//! decimal point (`1299.99`).

use std::sync::OnceLock;

use regex::Regex;

use crate::types::record::Availability;

fn numeric_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:[.,]\d+)?").unwrap())
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([\d\s.,']+)\s*-\s*([\d\s.,']+)").unwrap())
}

fn count_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\(\d+\)$").unwrap())
}

fn price_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b([1-9]\d{0,2}(?:[\s'.]\d{3})*[.,]\d{2})\s*(?:лв|eur|€|\$)").unwrap()
    })
}

/// Normalize a spec value for comparison: NBSP to space, collapsed
/// whitespace, doubled apostrophes to a quote mark, trailing comma
/// stripped.
pub fn normalize_value(value: &str) -> String {
    let replaced = value.replace('\u{a0}', " ").replace("''", "\"");
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches(',').trim().to_string()
}

/// Strip the option-count suffix filter labels carry, e.g.
/// `"Samsung (23)"` -> `"Samsung"`.
pub fn strip_count_suffix(label: &str) -> String {
    count_suffix_re()
        .replace(label.replace('\u{a0}', " ").trim(), "")
        .trim()
        .to_string()
}

/// Extract the numeric tokens of a value as a sorted multiset of
/// canonical decimal strings.
///
/// `"1440x3120"` and `"3120 x 1440"` yield the same multiset, which is
/// what lets reordered dimensions compare as equivalent.
pub fn numeric_tokens(value: &str) -> Vec<String> {
    let mut tokens: Vec<String> = numeric_token_re()
        .find_iter(value)
        .filter_map(|m| m.as_str().replace(',', ".").parse::<f64>().ok())
        .map(|n| {
            if n.fract() == 0.0 {
                format!("{}", n as i64)
            } else {
                format!("{n}")
            }
        })
        .collect();
    tokens.sort();
    tokens
}

/// Parse a price string under the locale assumptions above.
///
/// Currency words and any other non-numeric noise are discarded first.
/// Returns `None` when nothing numeric remains.
pub fn parse_price(text: &str) -> Option<f64> {
    let lowered = text.to_lowercase().replace("лв.", "").replace("лв", "");
    let cleaned: String = lowered
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = if cleaned.contains(',') && cleaned.contains('.') {
        cleaned.replace('.', "").replace(',', ".")
    } else if cleaned.contains(',') {
        cleaned.replace(',', ".")
    } else {
        cleaned
    };

    normalized.parse::<f64>().ok()
}

/// Parse a `"min-max"` range, tolerating grouping separators and
/// surrounding text (`"1 000 - 1 500 лв."`).
pub fn parse_numeric_range(text: &str) -> Option<(f64, f64)> {
    let caps = range_re().captures(text)?;
    let low = parse_grouped_number(caps.get(1)?.as_str())?;
    let high = parse_grouped_number(caps.get(2)?.as_str())?;
    if low <= high {
        Some((low, high))
    } else {
        Some((high, low))
    }
}

/// Parse one side of a range: grouping separators (space, dot,
/// apostrophe) removed, comma read as decimal.
fn parse_grouped_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.replace(',', ".").parse::<f64>().ok()
}

/// Find a price in page text without the extraction service.
///
/// Lines carrying the recommended-retail marker (`ПЦД`) are skipped;
/// the first remaining `<amount> <currency>` hit wins.
pub fn sniff_price(content: &str) -> Option<f64> {
    for line in content.lines() {
        if line.contains("ПЦД") {
            continue;
        }
        let line = line.replace('\u{a0}', " ");
        if let Some(caps) = price_line_re().captures(&line) {
            if let Some(price) = parse_price(caps.get(1)?.as_str()) {
                return Some(price);
            }
        }
    }
    None
}

/// Keyword phrases meaning "in stock", in the site languages.
const AVAILABLE_PHRASES: &[&str] = &[
    "на склад",
    "в наличност",
    "ограничена наличност",
    "при доставчик",
    "последни",
    "последен",
    "in stock",
];

/// Keyword phrases meaning "out of stock".
const UNAVAILABLE_PHRASES: &[&str] = &["изчерпан", "не е наличен", "out of stock"];

/// Infer availability from page text by keyword scan.
///
/// "вече изчерпан" ("previously sold out") does not count as out of
/// stock. A positive in-stock phrase wins over a negative one, matching
/// how the source sites phrase restock banners.
pub fn sniff_availability(content: &str) -> Availability {
    let lowered = content.to_lowercase();

    let unavailable = UNAVAILABLE_PHRASES.iter().any(|phrase| {
        lowered.match_indices(phrase).any(|(at, _)| {
            let preceding = &lowered[..at];
            !preceding.trim_end().ends_with("вече")
        })
    });

    let available = AVAILABLE_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase));

    if available {
        Availability::InStock
    } else if unavailable {
        Availability::OutOfStock
    } else {
        Availability::Unknown
    }
}

/// Relaxed corroboration filter: keep only URLs in which every query
/// token literally appears, case-insensitive, with URL punctuation
/// normalized to spaces.
pub fn urls_matching_query(urls: &[String], query: &str) -> Vec<String> {
    let tokens: Vec<String> = query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if tokens.is_empty() {
        return urls.to_vec();
    }

    urls.iter()
        .filter(|url| {
            let normalized = url.to_lowercase().replace(['-', '_'], " ");
            tokens.iter().all(|token| normalized.contains(token.as_str()))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_value() {
        assert_eq!(normalize_value("  6.2''\u{a0}display, "), "6.2\" display");
        assert_eq!(normalize_value("8   GB"), "8 GB");
    }

    #[test]
    fn test_strip_count_suffix() {
        assert_eq!(strip_count_suffix("Samsung (23)"), "Samsung");
        assert_eq!(strip_count_suffix("1500 - 2000 лв."), "1500 - 2000 лв.");
    }

    #[test]
    fn test_numeric_tokens_reordered_dimensions() {
        assert_eq!(numeric_tokens("1440x3120"), numeric_tokens("3120 x 1440"));
        assert_ne!(numeric_tokens("128 GB"), numeric_tokens("256 GB"));
        assert_eq!(numeric_tokens("6.2\""), numeric_tokens("6.2 inch"));
    }

    #[test]
    fn test_parse_price_locales() {
        assert_eq!(parse_price("1 299,99 лв."), Some(1299.99));
        assert_eq!(parse_price("1.299,99"), Some(1299.99));
        assert_eq!(parse_price("2399.00"), Some(2399.0));
        assert_eq!(parse_price("лв."), None);
    }

    #[test]
    fn test_parse_numeric_range() {
        assert_eq!(parse_numeric_range("1500-2500"), Some((1500.0, 2500.0)));
        assert_eq!(
            parse_numeric_range("1 000 - 1 500 лв."),
            Some((1000.0, 1500.0))
        );
        assert_eq!(parse_numeric_range("Brand"), None);
    }

    #[test]
    fn test_sniff_price_skips_rrp_lines() {
        let content = "ПЦД: 2 199,99 лв.\nПромо цена 1 899,99 лв.";
        assert_eq!(sniff_price(content), Some(1899.99));
    }

    #[test]
    fn test_sniff_availability() {
        assert_eq!(sniff_availability("Продуктът е в наличност"), Availability::InStock);
        assert_eq!(sniff_availability("Изчерпан"), Availability::OutOfStock);
        // "вече изчерпан" marks a past state, not the current one
        assert_eq!(sniff_availability("вече изчерпан"), Availability::Unknown);
        assert_eq!(sniff_availability("нищо"), Availability::Unknown);
    }

    #[test]
    fn test_urls_matching_query() {
        let urls = vec![
            "https://x.bg/product/samsung-galaxy-s25-iceblue".to_string(),
            "https://x.bg/product/xiaomi-redmi-note".to_string(),
        ];
        let kept = urls_matching_query(&urls, "Samsung Galaxy S25");
        assert_eq!(kept.len(), 1);
        assert!(kept[0].contains("samsung"));
    }
}
