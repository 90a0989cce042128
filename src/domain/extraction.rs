//! Transient extraction types flowing between the extractor and reconciler.
//!
//! Nothing in this module is persisted as-is; extracted candidates exist for
//! one pipeline run only and are merged into canonical rows downstream.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::entities::{Category, ProductType};
use super::sources::ReleaseIntelSource;

/// One sealed product as reported by a single source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedProduct {
    pub name: String,
    pub product_type: ProductType,
    pub msrp: Option<f64>,
    pub estimated_resale: Option<f64>,
    pub release_date: Option<NaiveDate>,
    pub preorder_date: Option<NaiveDate>,
    pub image_url: Option<String>,
    pub buy_url: Option<String>,
    pub contents_summary: Option<String>,
    pub top_chases: Vec<String>,
}

impl ExtractedProduct {
    /// Set-level fallback product for pages that describe an expansion
    /// without listing distinct sealed SKUs.
    pub fn set_default(set_name: &str) -> Self {
        Self {
            name: set_name.to_string(),
            product_type: ProductType::SetDefault,
            msrp: None,
            estimated_resale: None,
            release_date: None,
            preorder_date: None,
            image_url: None,
            buy_url: None,
            contents_summary: Some("Set-level fallback product inferred from expansion page.".to_string()),
            top_chases: Vec::new(),
        }
    }
}

/// One set/expansion as reported by a single source. `category` is `None`
/// when the page did not state the game; the source's category applies then.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedSet {
    pub set_name: String,
    pub category: Option<Category>,
    pub products: Vec<ExtractedProduct>,
}

/// Normalized output of every extraction strategy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedPayload {
    pub releases: Vec<ExtractedSet>,
}

impl ExtractedPayload {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}

/// A set candidate bound to the source that reported it; the reconciler's
/// unit of work. One per source per run for each logical set.
#[derive(Debug, Clone)]
pub struct ExtractedSetCandidate {
    pub set_name: String,
    pub category: Category,
    pub products: Vec<ExtractedProduct>,
    pub source: ReleaseIntelSource,
}

impl ExtractedSetCandidate {
    /// Build a candidate from one extracted set, filling in the source
    /// category and a set-level fallback product when needed.
    pub fn from_set(set: ExtractedSet, source: &ReleaseIntelSource) -> Self {
        let category = set.category.unwrap_or(source.category);
        let products = if set.products.is_empty() {
            vec![ExtractedProduct::set_default(&set.set_name)]
        } else {
            set.products
        };
        Self {
            set_name: set.set_name,
            category,
            products,
            source: source.clone(),
        }
    }
}

/// Parse the date formats seen across sources: ISO dates, RFC 3339
/// timestamps, and the long-form "March 14, 2025" used on official pages.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    for fmt in ["%B %d, %Y", "%b %d, %Y", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(d);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2025-06-01", Some((2025, 6, 1)))]
    #[case("March 14, 2025", Some((2025, 3, 14)))]
    #[case("Mar 14, 2025", Some((2025, 3, 14)))]
    #[case("2025-06-01T00:00:00Z", Some((2025, 6, 1)))]
    #[case("null", None)]
    #[case("soon", None)]
    fn parses_date_formats(#[case] raw: &str, #[case] expected: Option<(i32, u32, u32)>) {
        let expected = expected.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap());
        assert_eq!(parse_flexible_date(raw), expected);
    }

    #[test]
    fn candidate_falls_back_to_set_default_product() {
        let source = crate::domain::sources::scrape_sources()
            .first()
            .cloned()
            .expect("registry has scrape sources");
        let set = ExtractedSet {
            set_name: "Ascended Heroes".to_string(),
            category: None,
            products: Vec::new(),
        };
        let candidate = ExtractedSetCandidate::from_set(set, &source);
        assert_eq!(candidate.category, source.category);
        assert_eq!(candidate.products.len(), 1);
        assert_eq!(candidate.products[0].product_type, ProductType::SetDefault);
        assert_eq!(candidate.products[0].name, "Ascended Heroes");
    }
}
