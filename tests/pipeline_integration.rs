//! End-to-end reconciliation and persistence over an in-memory database:
//! candidates from multiple sources flow through reconcile, entity
//! resolution and upsert exactly as in a live pipeline cycle, minus the
//! network.

use chrono::{Duration, NaiveDate, Utc};

use card_intel::application::reconciler::{MergedCandidate, reconcile};
use card_intel::application::{EntityResolver, UpsertEngine};
use card_intel::domain::entities::{Category, Confidence, ProductType, SourceTier, SourceType};
use card_intel::domain::extraction::{ExtractedProduct, ExtractedSetCandidate};
use card_intel::domain::sources::ReleaseIntelSource;
use card_intel::infrastructure::{DatabaseConnection, ReleaseRepository};

fn source(id: &str, tier: SourceTier, source_type: SourceType) -> ReleaseIntelSource {
    ReleaseIntelSource {
        id: id.to_string(),
        name: format!("{id} source"),
        url: format!("https://{id}.example/releases"),
        tier,
        source_type,
        category: Category::Pokemon,
        enabled: true,
        include_in_scrape: true,
        schedule: None,
    }
}

fn product(name: &str, msrp: Option<f64>, release_date: Option<NaiveDate>) -> ExtractedProduct {
    ExtractedProduct {
        name: name.to_string(),
        product_type: ProductType::BoosterBox,
        msrp,
        estimated_resale: None,
        release_date,
        preorder_date: None,
        image_url: None,
        buy_url: None,
        contents_summary: None,
        top_chases: Vec::new(),
    }
}

fn candidate(
    set_name: &str,
    source: ReleaseIntelSource,
    products: Vec<ExtractedProduct>,
) -> ExtractedSetCandidate {
    ExtractedSetCandidate {
        set_name: set_name.to_string(),
        category: Category::Pokemon,
        products,
        source,
    }
}

async fn setup() -> (ReleaseRepository, EntityResolver, UpsertEngine) {
    let db = DatabaseConnection::in_memory().await.unwrap();
    db.migrate().await.unwrap();
    let repository = ReleaseRepository::new(db.pool().clone());
    (
        repository.clone(),
        EntityResolver::new(repository.clone()),
        UpsertEngine::new(repository, None),
    )
}

/// Two sources reporting the same set with complementary data.
fn two_source_candidates(msrp: f64) -> Vec<ExtractedSetCandidate> {
    let upcoming = Utc::now().date_naive() + Duration::days(30);
    vec![
        candidate(
            "Ascended Heroes",
            source("official", SourceTier::A, SourceType::Official),
            vec![product("Foo Box", None, Some(upcoming))],
        ),
        candidate(
            "Pokémon TCG: Ascended Heroes",
            source("retailer", SourceTier::B, SourceType::Retailer),
            vec![product("Foo Box", Some(msrp), None)],
        ),
    ]
}

async fn run_candidates(
    resolver: &EntityResolver,
    upsert: &UpsertEngine,
    merged: &[MergedCandidate],
) -> usize {
    let mut changes = 0;
    for candidate in merged {
        let resolved = resolver.resolve(candidate).await.unwrap();
        let outcome = upsert.apply(&resolved.release, candidate).await.unwrap();
        changes += outcome.changes_detected;
    }
    changes
}

#[tokio::test]
async fn corroborated_candidate_persists_under_the_primary_source() {
    let (repository, resolver, upsert) = setup().await;
    let merged = reconcile(two_source_candidates(49.99));
    assert_eq!(merged.len(), 1, "both sources collapse into one candidate");

    run_candidates(&resolver, &upsert, &merged).await;

    let releases = repository
        .find_releases_by_category(Category::Pokemon)
        .await
        .unwrap();
    assert_eq!(releases.len(), 1);
    let release = &releases[0];
    assert_eq!(release.name, "Ascended Heroes");
    assert_eq!(release.manufacturer, "The Pokémon Company");
    assert!(!release.is_released);

    let stored = repository
        .find_product(&release.id, "foo box")
        .await
        .unwrap()
        .expect("product persisted");
    // Tier A wins source attribution; the retailer backfills the price.
    assert_eq!(stored.msrp, Some(49.99));
    assert_eq!(stored.source_tier, SourceTier::A);
    assert_eq!(stored.source_url, "https://official.example/releases");
    assert_eq!(stored.confidence, Confidence::Confirmed);
}

#[tokio::test]
async fn rerunning_identical_data_is_idempotent() {
    let (repository, resolver, upsert) = setup().await;

    let first = reconcile(two_source_candidates(49.99));
    run_candidates(&resolver, &upsert, &first).await;

    let second = reconcile(two_source_candidates(49.99));
    let changes = run_candidates(&resolver, &upsert, &second).await;
    assert_eq!(changes, 0);

    let releases = repository
        .find_releases_by_category(Category::Pokemon)
        .await
        .unwrap();
    assert_eq!(releases.len(), 1, "no duplicate release on rerun");

    let product = repository
        .find_product(&releases[0].id, "foo box")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        repository.count_changes_for_product(&product.id).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn a_price_move_yields_exactly_one_change_row() {
    let (repository, resolver, upsert) = setup().await;

    run_candidates(&resolver, &upsert, &reconcile(two_source_candidates(49.99))).await;
    let changes =
        run_candidates(&resolver, &upsert, &reconcile(two_source_candidates(54.99))).await;
    assert_eq!(changes, 1);

    let releases = repository
        .find_releases_by_category(Category::Pokemon)
        .await
        .unwrap();
    let product = repository
        .find_product(&releases[0].id, "foo box")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.msrp, Some(54.99));

    let rows: Vec<(String, Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT field, old_value, new_value FROM release_product_changes \
         WHERE release_product_id = ?",
    )
    .bind(&product.id)
    .fetch_all(repository.pool())
    .await
    .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "msrp");
    assert_eq!(rows[0].1.as_deref(), Some("49.99"));
    assert_eq!(rows[0].2.as_deref(), Some("54.99"));
}

#[tokio::test]
async fn fuzzy_name_variants_resolve_to_the_same_release() {
    let (repository, resolver, upsert) = setup().await;

    let first = reconcile(
        vec![candidate(
            "Ascended Heroes",
            source("official", SourceTier::A, SourceType::Official),
            vec![product("Foo Box", Some(49.99), None)],
        )],
    );
    run_candidates(&resolver, &upsert, &first).await;

    // A later run spells the set with its series subtitle.
    let second = reconcile(
        vec![candidate(
            "Ascended Heroes (Mega Evolution)",
            source("news", SourceTier::B, SourceType::News),
            vec![product("Bar Bundle", Some(29.99), None)],
        )],
    );
    run_candidates(&resolver, &upsert, &second).await;

    let releases = repository
        .find_releases_by_category(Category::Pokemon)
        .await
        .unwrap();
    assert_eq!(releases.len(), 1, "subtitle variant matched the existing release");
}
