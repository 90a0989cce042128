//! Repository for releases, products, change history and strategies.
//!
//! All writes funnel through here so the upsert engine and entity resolver
//! stay free of SQL.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use uuid::Uuid;

use crate::domain::entities::{
    Category, Confidence, NewRelease, ProductType, Release, ReleaseProduct, SourceTier,
};

#[derive(Clone)]
pub struct ReleaseRepository {
    pool: SqlitePool,
}

/// Field values written on every product upsert.
#[derive(Debug, Clone)]
pub struct ProductWrite {
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
}

const RELEASE_COLUMNS: &str = "id, name, category, release_date, manufacturer, msrp, \
     estimated_resale, hype_score, image_url, top_chases, print_run, description, \
     is_released, created_at, updated_at";

fn release_from_row(row: &SqliteRow) -> Result<Release> {
    let top_chases_json: String = row.try_get("top_chases")?;
    Ok(Release {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        release_date: row.try_get("release_date")?,
        manufacturer: row.try_get("manufacturer")?,
        msrp: row.try_get("msrp")?,
        estimated_resale: row.try_get("estimated_resale")?,
        hype_score: row.try_get("hype_score")?,
        image_url: row.try_get("image_url")?,
        top_chases: serde_json::from_str(&top_chases_json).unwrap_or_default(),
        print_run: row.try_get("print_run")?,
        description: row.try_get("description")?,
        is_released: row.try_get("is_released")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl ReleaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// All releases in one category, for entity resolution.
    pub async fn find_releases_by_category(&self, category: Category) -> Result<Vec<Release>> {
        let rows = sqlx::query(&format!(
            "SELECT {RELEASE_COLUMNS} FROM releases WHERE category = ? ORDER BY created_at"
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(release_from_row).collect()
    }

    pub async fn find_release_by_id(&self, id: &str) -> Result<Option<Release>> {
        let row = sqlx::query(&format!(
            "SELECT {RELEASE_COLUMNS} FROM releases WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(release_from_row).transpose()
    }

    pub async fn create_release(&self, new: &NewRelease) -> Result<Release> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO releases
            (id, name, category, release_date, manufacturer, msrp, top_chases,
             description, is_released, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, '[]', ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new.name)
        .bind(new.category)
        .bind(new.release_date)
        .bind(&new.manufacturer)
        .bind(new.msrp)
        .bind(&new.description)
        .bind(new.is_released)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Release {
            id,
            name: new.name.clone(),
            category: new.category,
            release_date: new.release_date,
            manufacturer: new.manufacturer.clone(),
            msrp: new.msrp,
            estimated_resale: None,
            hype_score: None,
            image_url: None,
            top_chases: Vec::new(),
            print_run: None,
            description: new.description.clone(),
            is_released: new.is_released,
            created_at: now,
            updated_at: now,
        })
    }

    /// Refresh the derived fields of a matched release from the latest
    /// reconciled candidate.
    pub async fn refresh_release_derived(
        &self,
        release_id: &str,
        release_date: NaiveDate,
        is_released: bool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE releases SET release_date = ?, is_released = ?, updated_at = ? WHERE id = ?",
        )
        .bind(release_date)
        .bind(is_released)
        .bind(Utc::now())
        .bind(release_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Look up a product by its identity key (release, normalized name).
    pub async fn find_product(
        &self,
        release_id: &str,
        normalized_name: &str,
    ) -> Result<Option<ReleaseProduct>> {
        let product = sqlx::query_as::<_, ReleaseProduct>(
            "SELECT * FROM release_products WHERE release_id = ? AND normalized_name = ?",
        )
        .bind(release_id)
        .bind(normalized_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    pub async fn find_product_by_id(&self, id: &str) -> Result<Option<ReleaseProduct>> {
        let product =
            sqlx::query_as::<_, ReleaseProduct>("SELECT * FROM release_products WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(product)
    }

    pub async fn insert_product(&self, release_id: &str, write: &ProductWrite) -> Result<String> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO release_products
            (id, release_id, name, normalized_name, product_type, category, msrp,
             estimated_resale, release_date, preorder_date, image_url, buy_url,
             contents_summary, source_tier, source_url, confidence, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(release_id)
        .bind(&write.name)
        .bind(&write.normalized_name)
        .bind(write.product_type)
        .bind(write.category)
        .bind(write.msrp)
        .bind(write.estimated_resale)
        .bind(write.release_date)
        .bind(write.preorder_date)
        .bind(&write.image_url)
        .bind(&write.buy_url)
        .bind(&write.contents_summary)
        .bind(write.source_tier)
        .bind(&write.source_url)
        .bind(write.confidence)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn update_product(&self, product_id: &str, write: &ProductWrite) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE release_products SET
                name = ?, normalized_name = ?, product_type = ?, category = ?, msrp = ?,
                estimated_resale = ?, release_date = ?, preorder_date = ?, image_url = ?,
                buy_url = ?, contents_summary = ?, source_tier = ?, source_url = ?,
                confidence = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&write.name)
        .bind(&write.normalized_name)
        .bind(write.product_type)
        .bind(write.category)
        .bind(write.msrp)
        .bind(write.estimated_resale)
        .bind(write.release_date)
        .bind(write.preorder_date)
        .bind(&write.image_url)
        .bind(&write.buy_url)
        .bind(&write.contents_summary)
        .bind(write.source_tier)
        .bind(&write.source_url)
        .bind(write.confidence)
        .bind(Utc::now())
        .bind(product_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append one immutable audit row. Rows here are never updated or
    /// deleted.
    pub async fn append_change(
        &self,
        release_product_id: &str,
        field: &str,
        old_value: Option<&str>,
        new_value: Option<&str>,
        source_url: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO release_product_changes
            (id, release_product_id, field, old_value, new_value, source_url, detected_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(release_product_id)
        .bind(field)
        .bind(old_value)
        .bind(new_value)
        .bind(source_url)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_strategy(
        &self,
        release_product_id: &str,
        strategy: &str,
        confidence: i64,
        reason_summary: &str,
        key_factors_json: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO release_product_strategies
            (id, release_product_id, strategy, confidence, reason_summary, key_factors, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(release_product_id)
        .bind(strategy)
        .bind(confidence)
        .bind(reason_summary)
        .bind(key_factors_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_changes_for_product(&self, release_product_id: &str) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM release_product_changes WHERE release_product_id = ?",
        )
        .bind(release_product_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }
}
