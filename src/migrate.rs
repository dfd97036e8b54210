use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all catalog tables on an open pool. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Create products table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            name TEXT PRIMARY KEY,
            metadata_type TEXT NOT NULL,
            definition_json TEXT NOT NULL,
            doc_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create datasets table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS datasets (
            id TEXT PRIMARY KEY,
            product TEXT NOT NULL,
            metadata_json TEXT NOT NULL,
            doc_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (product) REFERENCES products(name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create dataset locations table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dataset_locations (
            dataset_id TEXT NOT NULL,
            uri TEXT NOT NULL,
            added_at INTEGER NOT NULL,
            PRIMARY KEY (dataset_id, uri),
            FOREIGN KEY (dataset_id) REFERENCES datasets(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_datasets_product ON datasets(product)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_datasets_updated_at ON datasets(updated_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
