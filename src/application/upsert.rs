//! Product upsert with field-level change detection.
//!
//! Identity is (release, normalized product name). Existing rows are diffed
//! on the four volatile fields before being overwritten, and every observed
//! difference lands in the append-only change table. New and changed Pokémon
//! products fire a detached strategy-generation task.

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::application::reconciler::MergedCandidate;
use crate::application::strategy::StrategyGenerator;
use crate::domain::entities::{Category, Release, ReleaseProduct};
use crate::domain::extraction::ExtractedProduct;
use crate::domain::normalize::normalize_for_match;
use crate::infrastructure::release_repository::{ProductWrite, ReleaseRepository};

#[derive(Debug, Default, Clone, Copy)]
pub struct UpsertOutcome {
    /// Newly created product rows; updates count through `changes_detected`.
    pub products_upserted: usize,
    pub changes_detected: usize,
    pub strategies_spawned: usize,
}

pub struct UpsertEngine {
    repository: ReleaseRepository,
    strategy: Option<Arc<StrategyGenerator>>,
}

/// Comparison form for change detection: absent values become the empty
/// string so a field gaining or losing a value still registers as a change.
fn format_date(value: Option<NaiveDate>) -> String {
    value.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

fn format_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Diff the volatile fields of a stored product against an incoming write.
fn detect_changes(existing: &ReleaseProduct, write: &ProductWrite) -> Vec<(&'static str, String, String)> {
    let candidates = [
        ("release_date", format_date(existing.release_date), format_date(write.release_date)),
        ("preorder_date", format_date(existing.preorder_date), format_date(write.preorder_date)),
        ("msrp", format_number(existing.msrp), format_number(write.msrp)),
        (
            "estimated_resale",
            format_number(existing.estimated_resale),
            format_number(write.estimated_resale),
        ),
    ];
    candidates.into_iter().filter(|(_, old, new)| old != new).collect()
}

/// Stored summary: the extracted text plus chase and corroboration notes.
fn build_contents_summary(product: &ExtractedProduct, supporting: &[String]) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if let Some(base) = &product.contents_summary {
        let trimmed = base.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_string());
        }
    }
    if !product.top_chases.is_empty() {
        parts.push(format!("Top chases: {}.", product.top_chases.join(", ")));
    }
    if supporting.len() > 1 {
        parts.push(format!("Sources: {}.", supporting.join(", ")));
    }
    if parts.is_empty() { None } else { Some(parts.join(" ")) }
}

fn product_write(candidate: &MergedCandidate, product: &ExtractedProduct) -> ProductWrite {
    ProductWrite {
        name: product.name.clone(),
        normalized_name: normalize_for_match(&product.name),
        product_type: product.product_type,
        category: candidate.category,
        msrp: product.msrp,
        estimated_resale: product.estimated_resale,
        release_date: product.release_date,
        preorder_date: product.preorder_date,
        image_url: product.image_url.clone(),
        buy_url: product.buy_url.clone(),
        contents_summary: build_contents_summary(product, &candidate.supporting_sources),
        source_tier: candidate.primary_source.tier,
        source_url: candidate.primary_source.url.clone(),
        confidence: candidate.confidence,
    }
}

impl UpsertEngine {
    pub fn new(repository: ReleaseRepository, strategy: Option<Arc<StrategyGenerator>>) -> Self {
        Self { repository, strategy }
    }

    /// Upsert every product of one resolved candidate under its release.
    pub async fn apply(
        &self,
        release: &Release,
        candidate: &MergedCandidate,
    ) -> Result<UpsertOutcome> {
        let mut outcome = UpsertOutcome::default();

        for product in &candidate.products {
            let write = product_write(candidate, product);
            let existing = self
                .repository
                .find_product(&release.id, &write.normalized_name)
                .await?;

            let (product_id, dirty) = match existing {
                Some(existing) => {
                    let changes = detect_changes(&existing, &write);
                    for (field, old, new) in &changes {
                        debug!(
                            "Change on {}: {field} '{old}' -> '{new}'",
                            existing.name
                        );
                        self.repository
                            .append_change(
                                &existing.id,
                                field,
                                Some(old.as_str()).filter(|s| !s.is_empty()),
                                Some(new.as_str()).filter(|s| !s.is_empty()),
                                Some(&write.source_url),
                            )
                            .await?;
                    }
                    outcome.changes_detected += changes.len();
                    self.repository.update_product(&existing.id, &write).await?;
                    (existing.id, !changes.is_empty())
                }
                None => {
                    let id = self.repository.insert_product(&release.id, &write).await?;
                    outcome.products_upserted += 1;
                    (id, true)
                }
            };

            if dirty && write.category == Category::Pokemon {
                if let Some(generator) = &self.strategy {
                    let generator = Arc::clone(generator);
                    let spawned_id = product_id.clone();
                    tokio::spawn(async move {
                        if let Err(e) = generator.generate_for_product(&spawned_id).await {
                            warn!("Strategy generation failed for product {spawned_id}: {e:#}");
                        }
                    });
                    outcome.strategies_spawned += 1;
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ProductType, SourceTier, SourceType};
    use crate::domain::sources::ReleaseIntelSource;
    use crate::infrastructure::database_connection::DatabaseConnection;

    fn extracted(name: &str, msrp: Option<f64>) -> ExtractedProduct {
        ExtractedProduct {
            name: name.to_string(),
            product_type: ProductType::EliteTrainerBox,
            msrp,
            estimated_resale: None,
            release_date: NaiveDate::from_ymd_opt(2025, 6, 1),
            preorder_date: None,
            image_url: None,
            buy_url: None,
            contents_summary: Some("Nine booster packs and accessories.".to_string()),
            top_chases: vec!["Charizard ex".to_string()],
        }
    }

    fn merged(products: Vec<ExtractedProduct>, supporting: Vec<&str>) -> MergedCandidate {
        MergedCandidate {
            set_name: "Ascended Heroes".to_string(),
            category: Category::Pokemon,
            products,
            confidence_score: 82,
            confidence: crate::domain::entities::Confidence::Confirmed,
            primary_source: ReleaseIntelSource {
                id: "official".to_string(),
                name: "Official".to_string(),
                url: "https://official.example".to_string(),
                tier: SourceTier::A,
                source_type: SourceType::Official,
                category: Category::Pokemon,
                enabled: true,
                include_in_scrape: true,
                schedule: None,
            },
            supporting_sources: supporting.into_iter().map(str::to_string).collect(),
        }
    }

    async fn engine() -> (UpsertEngine, ReleaseRepository) {
        let db = DatabaseConnection::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let repo = ReleaseRepository::new(db.pool().clone());
        (UpsertEngine::new(repo.clone(), None), repo)
    }

    async fn release(repo: &ReleaseRepository) -> Release {
        repo.create_release(&crate::domain::entities::NewRelease {
            name: "Ascended Heroes".to_string(),
            category: Category::Pokemon,
            release_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            manufacturer: "The Pokémon Company".to_string(),
            msrp: 4.99,
            description: None,
            is_released: false,
        })
        .await
        .unwrap()
    }

    #[test]
    fn summary_collects_chases_and_corroborating_sources() {
        let product = extracted("Ascended Heroes ETB", Some(49.99));
        let summary = build_contents_summary(&product, &["A".to_string(), "B".to_string()])
            .expect("summary assembled");
        assert_eq!(
            summary,
            "Nine booster packs and accessories. Top chases: Charizard ex. Sources: A, B."
        );

        let solo = build_contents_summary(&product, &["A".to_string()]).unwrap();
        assert!(!solo.contains("Sources:"));
    }

    #[test]
    fn empty_values_format_as_empty_strings() {
        assert_eq!(format_date(None), "");
        assert_eq!(format_date(NaiveDate::from_ymd_opt(2025, 6, 1)), "2025-06-01");
        assert_eq!(format_number(None), "");
        assert_eq!(format_number(Some(49.99)), "49.99");
    }

    #[tokio::test]
    async fn reapplying_identical_data_records_no_changes() {
        let (engine, repo) = engine().await;
        let release = release(&repo).await;
        let candidate = merged(vec![extracted("Ascended Heroes ETB", Some(49.99))], vec!["A"]);

        let first = engine.apply(&release, &candidate).await.unwrap();
        assert_eq!(first.products_upserted, 1);
        assert_eq!(first.changes_detected, 0);

        // The second pass updates in place; only creations count as upserts.
        let second = engine.apply(&release, &candidate).await.unwrap();
        assert_eq!(second.products_upserted, 0);
        assert_eq!(second.changes_detected, 0);
    }

    #[tokio::test]
    async fn price_move_records_exactly_one_change_row() {
        let (engine, repo) = engine().await;
        let release = release(&repo).await;

        engine
            .apply(&release, &merged(vec![extracted("Ascended Heroes ETB", Some(49.99))], vec!["A"]))
            .await
            .unwrap();
        let outcome = engine
            .apply(&release, &merged(vec![extracted("Ascended Heroes ETB", Some(54.99))], vec!["A"]))
            .await
            .unwrap();
        assert_eq!(outcome.changes_detected, 1);
        assert_eq!(outcome.products_upserted, 0);

        let product = repo
            .find_product(&release.id, "ascended heroes etb")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.msrp, Some(54.99));
        assert_eq!(repo.count_changes_for_product(&product.id).await.unwrap(), 1);
    }
}
