//! Deterministic parsers for sources with known, stable page shapes.
//!
//! These avoid the LLM entirely: the official expansions API is plain JSON,
//! and pokemon.com set pages carry their data in predictable meta tags and
//! table rows.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::warn;

use crate::domain::entities::Category;
use crate::domain::extraction::{
    ExtractedPayload, ExtractedProduct, ExtractedSet, parse_flexible_date,
};
use crate::domain::normalize::clean_html_text;

static PKM_TITLE_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^Pok[eé]mon\s+TCG:\s*").expect("valid regex"));
static RELEASE_DATE_ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)Release\s*Date</td>\s*<td[^>]*>\s*([A-Za-z]+\s+\d{1,2},\s+\d{4})\s*</td>")
        .expect("valid regex")
});
static PARAGRAPH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<p>(.{80,1200}?)</p>").expect("valid regex"));
static LOGO_IMG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<img[^>]+src="([^"]*logo[^"]*)""#).expect("valid regex"));

/// One entry of the pokemon.com expansions API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpansionItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    system: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
}

fn to_absolute_pokemon_url(path_or_url: &str) -> Option<String> {
    let trimmed = path_or_url.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Some(trimmed.to_string());
    }
    if trimmed.starts_with('/') {
        return Some(format!("https://www.pokemon.com{trimmed}"));
    }
    Some(format!("https://www.pokemon.com/{trimmed}"))
}

/// Parse the official expansions JSON feed into one set per expansion, each
/// with a single set-level product.
pub fn parse_expansions_api(json_text: &str) -> ExtractedPayload {
    let items: Vec<ExpansionItem> = match serde_json::from_str(json_text) {
        Ok(items) => items,
        Err(e) => {
            warn!("Expansions API payload did not parse: {e}");
            return ExtractedPayload::empty();
        }
    };

    let mut releases = Vec::new();
    for item in items {
        let set_name = PKM_TITLE_PREFIX_RE
            .replace(&clean_html_text(&item.title), "")
            .trim()
            .to_string();
        if set_name.is_empty() {
            continue;
        }

        let release_date = item.release_date.as_deref().and_then(parse_flexible_date);
        let buy_url = item.url.as_deref().and_then(to_absolute_pokemon_url);
        let contents_summary = item
            .system
            .as_deref()
            .map(clean_html_text)
            .filter(|s| !s.is_empty())
            .map(|s| format!("Series: {s}"));

        releases.push(ExtractedSet {
            set_name: set_name.clone(),
            category: Some(Category::Pokemon),
            products: vec![ExtractedProduct {
                name: set_name,
                product_type: crate::domain::entities::ProductType::SetDefault,
                msrp: None,
                estimated_resale: None,
                release_date,
                preorder_date: None,
                image_url: item.thumbnail.as_deref().and_then(to_absolute_pokemon_url),
                buy_url,
                contents_summary,
                top_chases: Vec::new(),
            }],
        });
    }

    ExtractedPayload { releases }
}

/// Parse a pokemon.com expansion (set-level) page. Produces at most one set
/// with one `set_default` fallback product.
pub fn parse_set_page(html: &str, source_url: &str) -> ExtractedPayload {
    let document = Html::parse_document(html);

    let set_name = extract_set_name(&document);
    let Some(set_name) = set_name else {
        return ExtractedPayload::empty();
    };

    let release_date = RELEASE_DATE_ROW_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_flexible_date(m.as_str()));

    let contents_summary = PARAGRAPH_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| {
            let cleaned = clean_html_text(m.as_str());
            cleaned.chars().take(500).collect::<String>()
        })
        .filter(|s| !s.is_empty());

    let image_url = extract_image_url(&document, html);

    ExtractedPayload {
        releases: vec![ExtractedSet {
            set_name: set_name.clone(),
            category: Some(Category::Pokemon),
            products: vec![ExtractedProduct {
                name: set_name,
                product_type: crate::domain::entities::ProductType::SetDefault,
                msrp: None,
                estimated_resale: None,
                release_date,
                preorder_date: None,
                image_url,
                buy_url: Some(source_url.to_string()),
                contents_summary,
                top_chases: Vec::new(),
            }],
        }],
    }
}

fn extract_set_name(document: &Html) -> Option<String> {
    static META_TITLE: Lazy<Selector> =
        Lazy::new(|| Selector::parse(r#"meta[name="pkm-title"]"#).expect("valid selector"));
    static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid selector"));
    static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("valid selector"));

    let raw = document
        .select(&META_TITLE)
        .next()
        .and_then(|el| el.value().attr("content").map(str::to_string))
        .or_else(|| {
            document.select(&TITLE).next().map(|el| {
                let text: String = el.text().collect();
                text.split('|').next().unwrap_or_default().to_string()
            })
        })
        .or_else(|| {
            document
                .select(&H1)
                .next()
                .map(|el| el.text().collect::<String>())
        })?;

    let cleaned = PKM_TITLE_PREFIX_RE
        .replace(&clean_html_text(&raw), "")
        .trim()
        .to_string();
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

fn extract_image_url(document: &Html, html: &str) -> Option<String> {
    static OG_IMAGE: Lazy<Selector> =
        Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).expect("valid selector"));

    document
        .select(&OG_IMAGE)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string)
        .or_else(|| {
            LOGO_IMG_RE
                .captures(html)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })
        .and_then(|url| to_absolute_pokemon_url(&url))
}
