//! Text normalization used for entity matching and dedup keys.
//!
//! All cross-source comparisons run over these forms so that markup noise,
//! punctuation and casing never produce spurious mismatches.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip markup and decode the HTML entities that show up in practice on
/// card-release pages, collapsing whitespace at the end.
pub fn clean_html_text(input: &str) -> String {
    let text = TAG_RE.replace_all(input, " ");
    let text = text
        .replace("&mdash;", "—")
        .replace("&#8212;", "—")
        .replace("&#x2014;", "—")
        .replace("&ndash;", "–")
        .replace("&#8211;", "–")
        .replace("&#x2013;", "–")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ");
    WS_RE.replace_all(&text, " ").trim().to_string()
}

/// Lowercase, drop punctuation, collapse whitespace. The result is the
/// comparison form for set and product names.
pub fn normalize_for_match(input: &str) -> String {
    let lowered = input.to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    WS_RE.replace_all(&stripped, " ").trim().to_string()
}

/// Remove a leading game-name prefix from an already-normalized name, so
/// "pokemon tcg ascended heroes" and "ascended heroes" collapse together.
pub fn strip_game_prefix(normalized: &str) -> String {
    const PREFIXES: [&str; 4] = ["pokemon tcg ", "pokémon tcg ", "magic the gathering ", "mtg "];
    for prefix in PREFIXES {
        if let Some(rest) = normalized.strip_prefix(prefix) {
            return rest.trim().to_string();
        }
    }
    normalized.to_string()
}
