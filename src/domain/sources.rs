//! Static registry of release-intel sources driving the ingestion pipeline.
//!
//! Tier A: structured APIs/feeds, no scraping required.
//! Tier B: light HTML fetch + parse on pages that allow it.
//! Tier C: curated/rumor sources; promoted when a second source agrees.
//!
//! The registry is immutable at run start; sources are processed in the
//! order they appear here.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::entities::{Category, SourceTier, SourceType};

/// One configured external source of release intelligence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseIntelSource {
    pub id: String,
    pub name: String,
    pub url: String,
    pub tier: SourceTier,
    pub source_type: SourceType,
    pub category: Category,
    pub enabled: bool,
    /// Whether the scrape pipeline should process this source. Tier A feeds
    /// consumed by the separate catalog sync keep this off.
    pub include_in_scrape: bool,
    /// Schedule hint for the cron layer (e.g. "daily").
    pub schedule: Option<String>,
}

impl ReleaseIntelSource {
    /// Trust score used to rank corroborating sources; the highest-ranked
    /// source in a bucket becomes primary.
    pub fn trust_score(&self) -> i64 {
        self.tier.rank() * 100 + self.source_type.weight()
    }

    /// Tier A feeds and JSON API endpoints are fetched with a JSON accept
    /// header; everything else is treated as an HTML page.
    pub fn wants_json(&self) -> bool {
        self.tier == SourceTier::A || self.url.contains("/api/")
    }
}

fn source(
    id: &str,
    name: &str,
    url: &str,
    tier: SourceTier,
    source_type: SourceType,
    category: Category,
    include_in_scrape: bool,
) -> ReleaseIntelSource {
    ReleaseIntelSource {
        id: id.to_string(),
        name: name.to_string(),
        url: url.to_string(),
        tier,
        source_type,
        category,
        enabled: true,
        include_in_scrape,
        schedule: Some("daily".to_string()),
    }
}

static RELEASE_INTEL_SOURCES: Lazy<Vec<ReleaseIntelSource>> = Lazy::new(|| {
    vec![
        source(
            "pokemon-tcg-api",
            "Pokémon TCG API",
            "https://api.pokemontcg.io/v2/sets",
            SourceTier::A,
            SourceType::Official,
            Category::Pokemon,
            false,
        ),
        source(
            "scryfall-sets",
            "Scryfall Sets (MTG)",
            "https://api.scryfall.com/sets",
            SourceTier::A,
            SourceType::Official,
            Category::Mtg,
            false,
        ),
        source(
            "pokemon-com-expansions",
            "Pokémon.com TCG Expansions",
            "https://www.pokemon.com/api/1/us/expansions",
            SourceTier::B,
            SourceType::Official,
            Category::Pokemon,
            true,
        ),
        source(
            "pokemon-com-mega-evolution",
            "Pokémon.com Mega Evolution Set Page",
            "https://www.pokemon.com/us/pokemon-tcg/mega-evolution",
            SourceTier::B,
            SourceType::Official,
            Category::Pokemon,
            true,
        ),
        source(
            "ign-pokemon-schedule",
            "IGN Pokémon TCG Release Schedule",
            "https://www.ign.com/articles/pokemon-tcg-full-release-schedule-2026",
            SourceTier::B,
            SourceType::News,
            Category::Pokemon,
            true,
        ),
        source(
            "gts-distribution-pokemon",
            "GTS Distribution Pokémon Calendar",
            "https://www.gtsdistribution.com/release-calendar/pokemon",
            SourceTier::B,
            SourceType::Distributor,
            Category::Pokemon,
            true,
        ),
        source(
            "pokebeach-rumors",
            "PokéBeach News & Rumors",
            "https://www.pokebeach.com/news",
            SourceTier::C,
            SourceType::Community,
            Category::Pokemon,
            true,
        ),
    ]
});

/// Every configured source, including those the scrape pipeline skips.
pub fn all_sources() -> &'static [ReleaseIntelSource] {
    &RELEASE_INTEL_SOURCES
}

/// Sources the scrape pipeline processes, in registry order.
pub fn scrape_sources() -> Vec<ReleaseIntelSource> {
    RELEASE_INTEL_SOURCES
        .iter()
        .filter(|s| s.enabled && s.include_in_scrape)
        .cloned()
        .collect()
}

/// Enabled sources of one tier.
pub fn sources_by_tier(tier: SourceTier) -> Vec<ReleaseIntelSource> {
    RELEASE_INTEL_SOURCES
        .iter()
        .filter(|s| s.enabled && s.tier == tier)
        .cloned()
        .collect()
}
