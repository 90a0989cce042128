//! AI-assisted structured extraction for generic pages.
//!
//! The model is asked for a strict JSON shape; whatever comes back is parsed
//! into a raw payload and re-validated field by field before it may enter the
//! pipeline. Missing credentials, transport failures and unparsable JSON all
//! degrade to an empty payload — extraction failure is routine, not
//! exceptional.

use serde::Deserialize;
use tracing::warn;

use crate::domain::entities::{Category, ProductType};
use crate::domain::extraction::{
    ExtractedPayload, ExtractedProduct, ExtractedSet, parse_flexible_date,
};
use crate::infrastructure::llm::LlmClient;

const EXTRACTION_SYSTEM: &str = r#"You are a data extractor for a trading card release calendar. Given HTML from a webpage about TCG/sports card releases, output a single JSON object with this exact shape (no markdown, no code fence). Be precise about MSRP vs resale/market prices, and prefer information that is clearly labeled on the page:

{
  "releases": [
    {
      "setName": "Exact set or expansion name as shown",
      "category": "pokemon" or "mtg" or "yugioh" or "one_piece" or "lorcana" or "digimon",
      "products": [
        {
          "name": "Full product name (e.g. Ascended Heroes Elite Trainer Box)",
          "productType": "set_default | elite_trainer_box | booster_box | booster_bundle | tin | collection | blister | build_battle | other",
          "msrp": number or null,
          "estimatedResale": number or null,
          "releaseDate": "YYYY-MM-DD or null",
          "preorderDate": "YYYY-MM-DD or null",
          "imageUrl": "url string or null",
          "buyUrl": "url string or null",
          "contentsSummary": "Short description of contents and context or null",
          "topChases": ["Optional list of the most desirable individual cards for this product, or empty array if not clear"]
        }
      ]
    }
  ]
}

Rules:
- Only include releases and products you can clearly identify from the page.
- If the game is unclear, omit that release.
- If a page is expansion-level and does not clearly list distinct sealed SKUs, include one fallback product with name = setName and productType = "set_default".
- Only set msrp when the page shows a clearly labeled retail / MSRP price for that specific product.
- Only set estimatedResale when the page gives a clear, current market price signal. Do NOT guess.
- Only set buyUrl when there is a clear button or link to buy or preorder that exact product.
- For topChases, only include specific card names the page strongly highlights as key pulls.
- Output only valid JSON, no other text."#;

/// Raw payload exactly as the model emits it; everything optional, nothing
/// trusted until validated.
#[derive(Debug, Deserialize)]
struct RawPayload {
    #[serde(default)]
    releases: Vec<RawSet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSet {
    #[serde(default)]
    set_name: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    products: Vec<RawProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProduct {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    product_type: Option<String>,
    #[serde(default)]
    msrp: Option<f64>,
    #[serde(default)]
    estimated_resale: Option<f64>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    preorder_date: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    buy_url: Option<String>,
    #[serde(default)]
    contents_summary: Option<String>,
    #[serde(default)]
    top_chases: Option<Vec<String>>,
}

/// AI extraction strategy for sources without a deterministic parser.
pub struct AiExtractor<'a> {
    llm: &'a LlmClient,
    model: &'a str,
    max_input_chars: usize,
}

impl<'a> AiExtractor<'a> {
    pub fn new(llm: &'a LlmClient, model: &'a str, max_input_chars: usize) -> Self {
        Self {
            llm,
            model,
            max_input_chars,
        }
    }

    /// Extract release data from arbitrary page content. Never fails: every
    /// failure mode collapses to an empty payload with a warning.
    pub async fn extract(
        &self,
        html: &str,
        source_label: &str,
        expected_category: Option<Category>,
    ) -> ExtractedPayload {
        if !self.llm.is_enabled() {
            warn!("LLM credentials not configured; skipping AI extraction for {source_label}");
            return ExtractedPayload::empty();
        }

        let input = truncate_head_tail(html, self.max_input_chars);
        let category_hint = expected_category
            .map(|c| c.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let user = format!(
            "Source: {source_label}\nExpected TCG category: {category_hint}\n\n\
             Extract release and product data from this HTML:\n\n{input}"
        );

        let content = match self
            .llm
            .complete_json(self.model, EXTRACTION_SYSTEM, &user, 0.1)
            .await
        {
            Ok(Some(content)) => content,
            Ok(None) => return ExtractedPayload::empty(),
            Err(e) => {
                warn!("AI extraction failed for {source_label}: {e:#}");
                return ExtractedPayload::empty();
            }
        };

        parse_extraction_response(&content)
    }
}

/// Keep the head and the tail of oversized content. Dynamic pages often
/// place the relevant data far from the top, so a head-only cut loses it.
pub fn truncate_head_tail(content: &str, max_chars: usize) -> String {
    if content.len() <= max_chars {
        return content.to_string();
    }
    let half = max_chars / 2;
    let head_end = floor_char_boundary(content, half);
    let tail_start = floor_char_boundary(content, content.len() - half);
    format!(
        "{}\n...[middle truncated]...\n{}",
        &content[..head_end],
        &content[tail_start..]
    )
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Parse and validate a model response. Non-conforming releases are
/// discarded individually; an unparsable body discards everything.
pub fn parse_extraction_response(content: &str) -> ExtractedPayload {
    let raw: RawPayload = match serde_json::from_str(content) {
        Ok(raw) => raw,
        Err(e) => {
            let preview: String = content.chars().take(200).collect();
            warn!("Extraction JSON did not parse: {e} (content: {preview})");
            return ExtractedPayload::empty();
        }
    };

    let mut releases = Vec::new();
    for set in raw.releases {
        let set_name = set.set_name.trim().to_string();
        if set_name.is_empty() {
            continue;
        }
        let category = match &set.category {
            Some(label) => match Category::parse(label) {
                Some(category) => Some(category),
                None => {
                    warn!("Discarding extracted set '{set_name}': unknown category '{label}'");
                    continue;
                }
            },
            None => None,
        };

        let products = set
            .products
            .into_iter()
            .filter_map(|p| validate_product(p, &set_name))
            .collect();

        releases.push(ExtractedSet {
            set_name,
            category,
            products,
        });
    }

    ExtractedPayload { releases }
}

fn validate_product(raw: RawProduct, set_name: &str) -> Option<ExtractedProduct> {
    let name = raw
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| set_name.to_string());

    let positive = |v: Option<f64>| v.filter(|x| x.is_finite() && *x > 0.0);

    Some(ExtractedProduct {
        name,
        product_type: raw
            .product_type
            .as_deref()
            .map(ProductType::parse)
            .unwrap_or(ProductType::SetDefault),
        msrp: positive(raw.msrp),
        estimated_resale: positive(raw.estimated_resale),
        release_date: raw.release_date.as_deref().and_then(parse_flexible_date),
        preorder_date: raw.preorder_date.as_deref().and_then(parse_flexible_date),
        image_url: raw.image_url.filter(|s| !s.trim().is_empty()),
        buy_url: raw.buy_url.filter(|s| !s.trim().is_empty()),
        contents_summary: raw.contents_summary.filter(|s| !s.trim().is_empty()),
        top_chases: raw.top_chases.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn truncation_keeps_head_and_tail() {
        let content = format!("HEAD{}TAIL", "x".repeat(1000));
        let truncated = truncate_head_tail(&content, 100);
        assert!(truncated.starts_with("HEAD"));
        assert!(truncated.ends_with("TAIL"));
        assert!(truncated.contains("[middle truncated]"));
        assert!(truncated.len() < content.len());
    }

    #[test]
    fn short_content_is_untouched() {
        assert_eq!(truncate_head_tail("short", 100), "short");
    }

    #[test]
    fn valid_response_is_parsed_and_typed() {
        let content = r#"{
            "releases": [{
                "setName": "Ascended Heroes",
                "category": "pokemon",
                "products": [{
                    "name": "Ascended Heroes Elite Trainer Box",
                    "productType": "elite_trainer_box",
                    "msrp": 49.99,
                    "releaseDate": "2025-06-01",
                    "topChases": ["Charizard ex SAR"]
                }]
            }]
        }"#;
        let payload = parse_extraction_response(content);
        assert_eq!(payload.releases.len(), 1);
        let set = &payload.releases[0];
        assert_eq!(set.category, Some(Category::Pokemon));
        let product = &set.products[0];
        assert_eq!(product.product_type, ProductType::EliteTrainerBox);
        assert_eq!(product.msrp, Some(49.99));
        assert_eq!(product.release_date, NaiveDate::from_ymd_opt(2025, 6, 1));
        assert_eq!(product.top_chases, vec!["Charizard ex SAR".to_string()]);
    }

    #[test]
    fn unknown_category_discards_the_release_only() {
        let content = r#"{
            "releases": [
                {"setName": "Good Set", "category": "pokemon", "products": []},
                {"setName": "Bad Set", "category": "sports", "products": []}
            ]
        }"#;
        let payload = parse_extraction_response(content);
        assert_eq!(payload.releases.len(), 1);
        assert_eq!(payload.releases[0].set_name, "Good Set");
    }

    #[test]
    fn garbage_response_is_empty() {
        assert!(parse_extraction_response("I could not find any releases.").is_empty());
        assert!(parse_extraction_response("{\"releases\": \"nope\"}").is_empty());
    }

    #[test]
    fn non_positive_prices_are_dropped() {
        let content = r#"{
            "releases": [{
                "setName": "S",
                "category": "pokemon",
                "products": [{"name": "Box", "productType": "booster_box", "msrp": -5.0}]
            }]
        }"#;
        let payload = parse_extraction_response(content);
        assert_eq!(payload.releases[0].products[0].msrp, None);
    }
}
