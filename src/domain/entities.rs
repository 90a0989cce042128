//! Canonical release entities and the enums shared across the pipeline.
//!
//! `Release` is the deduplicated aggregate for one real-world product release;
//! `ReleaseProduct` rows are the sellable SKUs under it, and
//! `ReleaseProductChange` rows are the append-only audit trail of field-level
//! edits detected during ingestion.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Trading-card game category a release belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Category {
    Pokemon,
    Mtg,
    Yugioh,
    OnePiece,
    Lorcana,
    Digimon,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Pokemon => "pokemon",
            Category::Mtg => "mtg",
            Category::Yugioh => "yugioh",
            Category::OnePiece => "one_piece",
            Category::Lorcana => "lorcana",
            Category::Digimon => "digimon",
        }
    }

    /// Parse a category label coming from an extraction payload. Unknown
    /// labels yield `None` so non-conforming releases can be discarded.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pokemon" => Some(Category::Pokemon),
            "mtg" => Some(Category::Mtg),
            "yugioh" => Some(Category::Yugioh),
            "one_piece" => Some(Category::OnePiece),
            "lorcana" => Some(Category::Lorcana),
            "digimon" => Some(Category::Digimon),
            _ => None,
        }
    }

    pub fn manufacturer(&self) -> &'static str {
        match self {
            Category::Pokemon => "The Pokémon Company",
            Category::Mtg => "Wizards of the Coast",
            Category::Yugioh => "Konami",
            Category::OnePiece | Category::Digimon => "Bandai",
            Category::Lorcana => "Ravensburger",
        }
    }

    /// Fallback MSRP used when a brand-new release has no priced products yet.
    pub fn default_msrp(&self) -> f64 {
        match self {
            Category::Pokemon => 4.99,
            Category::Mtg => 5.99,
            _ => 9.99,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source trust class. A = structured API/feed, B = light HTML fetch+parse,
/// C = curated/rumor source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum SourceTier {
    A,
    B,
    C,
}

impl SourceTier {
    /// Coarse rank used as the dominant term of the trust score.
    pub fn rank(&self) -> i64 {
        match self {
            SourceTier::A => 3,
            SourceTier::B => 2,
            SourceTier::C => 1,
        }
    }

    /// Base confidence contribution for a product first seen at this tier.
    pub fn confidence_base(&self) -> i64 {
        match self {
            SourceTier::A => 72,
            SourceTier::B => 56,
            SourceTier::C => 38,
        }
    }
}

impl std::fmt::Display for SourceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceTier::A => "A",
            SourceTier::B => "B",
            SourceTier::C => "C",
        };
        f.write_str(s)
    }
}

/// What kind of publisher is behind a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SourceType {
    Official,
    Distributor,
    Retailer,
    News,
    Community,
}

impl SourceType {
    /// Secondary trust term; community reports rank below everything else.
    pub fn weight(&self) -> i64 {
        match self {
            SourceType::Official => 10,
            SourceType::Distributor => 6,
            SourceType::Retailer => 4,
            SourceType::News => 0,
            SourceType::Community => -8,
        }
    }
}

/// Confidence bucket derived from tier, source type and corroboration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Confidence {
    Confirmed,
    Unconfirmed,
    Rumor,
}

impl Confidence {
    /// Map a clamped confidence score onto the enum bands.
    pub fn from_score(score: i64) -> Self {
        if score >= 75 {
            Confidence::Confirmed
        } else if score >= 50 {
            Confidence::Unconfirmed
        } else {
            Confidence::Rumor
        }
    }
}

/// Sealed-product SKU shape. `SetDefault` is the synthetic set-level product
/// used when a page only describes the expansion itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProductType {
    SetDefault,
    EliteTrainerBox,
    BoosterBox,
    BoosterBundle,
    Tin,
    Collection,
    Blister,
    BuildBattle,
    Other,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::SetDefault => "set_default",
            ProductType::EliteTrainerBox => "elite_trainer_box",
            ProductType::BoosterBox => "booster_box",
            ProductType::BoosterBundle => "booster_bundle",
            ProductType::Tin => "tin",
            ProductType::Collection => "collection",
            ProductType::Blister => "blister",
            ProductType::BuildBattle => "build_battle",
            ProductType::Other => "other",
        }
    }

    /// Map a free-form product type label onto the known SKU shapes,
    /// falling back to keyword heuristics and finally `Other`.
    pub fn parse(raw: &str) -> Self {
        let lower: String = raw
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
        match lower.as_str() {
            "set_default" => return ProductType::SetDefault,
            "elite_trainer_box" => return ProductType::EliteTrainerBox,
            "booster_box" => return ProductType::BoosterBox,
            "booster_bundle" => return ProductType::BoosterBundle,
            "tin" => return ProductType::Tin,
            "collection" => return ProductType::Collection,
            "blister" => return ProductType::Blister,
            "build_battle" => return ProductType::BuildBattle,
            "other" => return ProductType::Other,
            _ => {}
        }
        if lower.contains("etb") || lower.contains("elite") {
            ProductType::EliteTrainerBox
        } else if lower.contains("booster_box") || lower.contains("display") {
            ProductType::BoosterBox
        } else if lower.contains("bundle") {
            ProductType::BoosterBundle
        } else if lower.contains("tin") {
            ProductType::Tin
        } else if lower.contains("collection") {
            ProductType::Collection
        } else if lower.contains("blister") {
            ProductType::Blister
        } else if lower.contains("build") && lower.contains("battle") {
            ProductType::BuildBattle
        } else {
            ProductType::Other
        }
    }
}

/// Canonical, persisted release aggregate. Owns 1..N `ReleaseProduct` rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub release_date: NaiveDate,
    pub manufacturer: String,
    pub msrp: f64,
    pub estimated_resale: Option<f64>,
    pub hype_score: Option<i64>,
    pub image_url: Option<String>,
    pub top_chases: Vec<String>,
    pub print_run: Option<i64>,
    pub description: Option<String>,
    pub is_released: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a new release from a reconciled candidate.
#[derive(Debug, Clone)]
pub struct NewRelease {
    pub name: String,
    pub category: Category,
    pub release_date: NaiveDate,
    pub manufacturer: String,
    pub msrp: f64,
    pub description: Option<String>,
    pub is_released: bool,
}

/// One sellable SKU belonging to a release. Identity within a release is the
/// normalized product name.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReleaseProduct {
    pub id: String,
    pub release_id: String,
    pub name: String,
    pub normalized_name: String,
    pub product_type: ProductType,
    pub category: Category,
    pub msrp: Option<f64>,
    pub estimated_resale: Option<f64>,
    pub release_date: Option<NaiveDate>,
    pub preorder_date: Option<NaiveDate>,
    pub image_url: Option<String>,
    pub buy_url: Option<String>,
    pub contents_summary: Option<String>,
    pub source_tier: SourceTier,
    pub source_url: String,
    pub confidence: Confidence,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit row recording one field-level change on a product.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReleaseProductChange {
    pub id: String,
    pub release_product_id: String,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub source_url: Option<String>,
    pub detected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_type_parses_known_and_heuristic_labels() {
        assert_eq!(ProductType::parse("elite_trainer_box"), ProductType::EliteTrainerBox);
        assert_eq!(ProductType::parse("Elite Trainer Box"), ProductType::EliteTrainerBox);
        assert_eq!(ProductType::parse("Booster Display"), ProductType::BoosterBox);
        assert_eq!(ProductType::parse("build & battle stadium"), ProductType::BuildBattle);
        assert_eq!(ProductType::parse("mystery cube"), ProductType::Other);
    }

    #[test]
    fn confidence_bands_match_score_thresholds() {
        assert_eq!(Confidence::from_score(75), Confidence::Confirmed);
        assert_eq!(Confidence::from_score(74), Confidence::Unconfirmed);
        assert_eq!(Confidence::from_score(50), Confidence::Unconfirmed);
        assert_eq!(Confidence::from_score(49), Confidence::Rumor);
    }

    #[test]
    fn unknown_category_labels_are_rejected() {
        assert_eq!(Category::parse("pokemon"), Some(Category::Pokemon));
        assert_eq!(Category::parse("One_Piece"), Some(Category::OnePiece));
        assert_eq!(Category::parse("sports"), None);
    }
}
