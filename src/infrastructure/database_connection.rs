//! SQLite connection and schema management.
//!
//! Tables are created idempotently at startup. `release_products` enforces
//! the one-row-per-(release, normalized name) invariant with a unique index;
//! `release_product_changes` is append-only history and deliberately carries
//! no uniqueness constraint.

use std::path::Path;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let db_path = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");

        if db_path != ":memory:" {
            if let Some(parent) = Path::new(db_path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            if !Path::new(db_path).exists() {
                std::fs::File::create(db_path)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Shared in-memory database for tests. A single connection keeps every
    /// statement on the same database instance.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_releases_sql = r#"
            CREATE TABLE IF NOT EXISTS releases (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                category TEXT NOT NULL,
                release_date TEXT NOT NULL,
                manufacturer TEXT NOT NULL,
                msrp REAL NOT NULL,
                estimated_resale REAL,
                hype_score INTEGER,
                image_url TEXT,
                top_chases TEXT NOT NULL DEFAULT '[]',
                print_run INTEGER,
                description TEXT,
                is_released BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#;

        let create_release_products_sql = r#"
            CREATE TABLE IF NOT EXISTS release_products (
                id TEXT PRIMARY KEY,
                release_id TEXT NOT NULL,
                name TEXT NOT NULL,
                normalized_name TEXT NOT NULL,
                product_type TEXT NOT NULL,
                category TEXT NOT NULL,
                msrp REAL,
                estimated_resale REAL,
                release_date TEXT,
                preorder_date TEXT,
                image_url TEXT,
                buy_url TEXT,
                contents_summary TEXT,
                source_tier TEXT NOT NULL,
                source_url TEXT NOT NULL,
                confidence TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (release_id) REFERENCES releases (id) ON DELETE CASCADE
            )
        "#;

        let create_product_identity_index_sql = r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_release_products_identity
            ON release_products (release_id, normalized_name)
        "#;

        let create_changes_sql = r#"
            CREATE TABLE IF NOT EXISTS release_product_changes (
                id TEXT PRIMARY KEY,
                release_product_id TEXT NOT NULL,
                field TEXT NOT NULL,
                old_value TEXT,
                new_value TEXT,
                source_url TEXT,
                detected_at TEXT NOT NULL,
                FOREIGN KEY (release_product_id) REFERENCES release_products (id) ON DELETE CASCADE
            )
        "#;

        let create_strategies_sql = r#"
            CREATE TABLE IF NOT EXISTS release_product_strategies (
                id TEXT PRIMARY KEY,
                release_product_id TEXT NOT NULL,
                strategy TEXT NOT NULL,
                confidence INTEGER NOT NULL,
                reason_summary TEXT NOT NULL,
                key_factors TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (release_product_id) REFERENCES release_products (id) ON DELETE CASCADE
            )
        "#;

        sqlx::query(create_releases_sql).execute(&self.pool).await?;
        sqlx::query(create_release_products_sql).execute(&self.pool).await?;
        sqlx::query(create_product_identity_index_sql).execute(&self.pool).await?;
        sqlx::query(create_changes_sql).execute(&self.pool).await?;
        sqlx::query(create_strategies_sql).execute(&self.pool).await?;

        Ok(())
    }
}
