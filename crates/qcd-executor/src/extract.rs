//! Lightweight natural-language extraction for the sample query handlers.
//! Deliberately simple pattern matching rather than a full NLU pipeline —
//! good enough for the fixed query shapes the handlers target.

use regex::Regex;
use std::sync::OnceLock;

const COMMON_PRODUCTS: &[(&str, &[&str])] = &[
    ("onions", &["onion", "onions", "red onion", "white onion"]),
    ("tomatoes", &["tomato", "tomatoes", "cherry tomato"]),
    ("potatoes", &["potato", "potatoes"]),
    ("apples", &["apple", "apples"]),
    ("bananas", &["banana", "bananas"]),
    ("milk", &["milk", "toned milk", "full cream milk"]),
    ("bread", &["bread", "white bread", "brown bread"]),
    ("rice", &["rice", "basmati rice"]),
];

const PLATFORM_VARIATIONS: &[(&str, &[&str])] = &[
    ("blinkit", &["blinkit", "grofers"]),
    ("zepto", &["zepto"]),
    ("instamart", &["instamart", "swiggy instamart"]),
    ("bigbasket", &["bigbasket", "bb now"]),
];

/// Extracts the first recognisable product token from a query, falling back
/// to the word after a query verb ("cheapest", "find", ...), then the first
/// word longer than 3 characters that isn't a platform/stopword.
#[must_use]
pub fn extract_product_name(query: &str) -> Option<String> {
    let lower = query.to_lowercase();

    for (canonical, variations) in COMMON_PRODUCTS {
        if variations.iter().any(|v| lower.contains(v)) {
            return Some((*canonical).to_string());
        }
    }

    let words: Vec<&str> = lower.split_whitespace().collect();
    let verbs = ["cheapest", "price", "cost", "find", "show", "compare"];
    for (i, word) in words.iter().enumerate() {
        if verbs.contains(word) {
            if let Some(next) = words.get(i + 1) {
                if !["app", "apps", "platform", "platforms", "between", "on"].contains(next) {
                    return Some((*next).to_string());
                }
            }
        }
    }

    let stopwords = [
        "cheapest", "price", "cost", "find", "show", "compare", "between", "discount", "app",
        "apps",
    ];
    words
        .into_iter()
        .find(|w| w.len() > 3 && !stopwords.contains(w))
        .map(str::to_string)
}

/// Returns name variations (plural/singular plus any known synonyms) used to
/// widen an `ILIKE` search for a product.
#[must_use]
pub fn product_variations(product_name: &str) -> Vec<String> {
    let lower = product_name.to_lowercase();
    let mut variations = vec![lower.clone()];

    for (_, known) in COMMON_PRODUCTS {
        if known.iter().any(|v| v.eq_ignore_ascii_case(&lower)) {
            variations.extend(known.iter().map(|s| (*s).to_string()));
        }
    }

    if let Some(stripped) = lower.strip_suffix('s') {
        variations.push(stripped.to_string());
    } else {
        variations.push(format!("{lower}s"));
    }

    variations.sort();
    variations.dedup();
    variations
}

/// Extracts a single platform name from a query, if mentioned.
#[must_use]
pub fn extract_platform_name(query: &str) -> Option<String> {
    let lower = query.to_lowercase();
    PLATFORM_VARIATIONS
        .iter()
        .find(|(_, variations)| variations.iter().any(|v| lower.contains(v)))
        .map(|(canonical, _)| (*canonical).to_string())
}

/// Extracts every platform name mentioned, for side-by-side comparisons.
#[must_use]
pub fn extract_platforms_for_comparison(query: &str) -> Vec<String> {
    let lower = query.to_lowercase();
    let mut found: Vec<String> = PLATFORM_VARIATIONS
        .iter()
        .filter(|(_, variations)| variations.iter().any(|v| lower.contains(v)))
        .map(|(canonical, _)| (*canonical).to_string())
        .collect();
    found.sort();
    found.dedup();
    found
}

/// Widens a platform name into the marketing-name variations stored in the
/// database (e.g. the Instamart/Swiggy Instamart rebrand).
#[must_use]
pub fn platform_variations(platform_name: &str) -> Vec<String> {
    PLATFORM_VARIATIONS
        .iter()
        .find(|(canonical, _)| canonical.eq_ignore_ascii_case(platform_name))
        .map(|(_, variations)| variations.iter().map(|s| (*s).to_string()).collect())
        .unwrap_or_else(|| vec![platform_name.to_string()])
}

fn percent_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*(?:%|percent)").unwrap())
}

/// Extracts a discount percentage threshold such as "30%" or "30 percent".
#[must_use]
pub fn extract_discount_percentage(query: &str) -> f64 {
    percent_regex()
        .captures(query)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn rupee_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:₹\s*|rs\.?\s*|\b)(\d{1,3}(?:,\d{3})*|\d{3,6})\s*(?:rupees?)?").unwrap()
    })
}

/// Extracts a rupee budget amount ("₹1000", "Rs 1000", "1000 rupees", or a
/// bare 3-6 digit number).
#[must_use]
pub fn extract_budget_amount(query: &str) -> f64 {
    for caps in rupee_regex().captures_iter(query) {
        if let Some(m) = caps.get(1) {
            let cleaned = m.as_str().replace(',', "");
            if let Ok(value) = cleaned.parse::<f64>() {
                if value >= 100.0 {
                    return value;
                }
            }
        }
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_known_product_synonym() {
        assert_eq!(
            extract_product_name("which app has cheapest onions right now"),
            Some("onions".to_string())
        );
    }

    #[test]
    fn extracts_product_after_verb_when_unknown() {
        assert_eq!(
            extract_product_name("show quinoa prices"),
            Some("quinoa".to_string())
        );
    }

    #[test]
    fn extracts_single_platform() {
        assert_eq!(
            extract_platform_name("cheapest milk on zepto"),
            Some("zepto".to_string())
        );
    }

    #[test]
    fn extracts_multiple_platforms_for_comparison() {
        let platforms = extract_platforms_for_comparison("compare milk between blinkit and zepto");
        assert_eq!(platforms, vec!["blinkit".to_string(), "zepto".to_string()]);
    }

    #[test]
    fn extracts_discount_percentage() {
        assert_eq!(extract_discount_percentage("30% off on snacks"), 30.0);
        assert_eq!(extract_discount_percentage("20 percent discount"), 20.0);
    }

    #[test]
    fn extracts_budget_amount_with_rupee_symbol() {
        assert_eq!(extract_budget_amount("best deals for ₹1,000 grocery list"), 1000.0);
    }

    #[test]
    fn extracts_budget_amount_bare_number() {
        assert_eq!(extract_budget_amount("groceries under 500"), 500.0);
    }

    #[test]
    fn product_variations_include_plural_and_singular() {
        let variations = product_variations("onion");
        assert!(variations.contains(&"onions".to_string()));
    }
}
