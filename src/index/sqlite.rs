//! SQLite-backed [`Index`] implementation.
//!
//! Stores product definitions and dataset documents as JSON text alongside
//! a SHA-256 `doc_hash`. Dataset locations live in their own table so a
//! dataset indexed from several paths keeps every URI.
//!
//! The schema is created by [`crate::migrate::run_migrations`] (`dcsync init`).

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::models::{DatasetRecord, ProductDocument, ProductSummary};

use super::{check_unsafe, doc_hash, unsafe_product_changes, validate_product, Index, IndexError};

/// The on-disk catalog.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Open the catalog database named in the config.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        Ok(Self { pool })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    async fn stored_product(&self, name: &str) -> Result<Option<Value>, IndexError> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT definition_json FROM products WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(raw.map(|s| serde_json::from_str::<Value>(&s)).transpose()?)
    }
}

#[async_trait]
impl Index for SqliteIndex {
    async fn list_products(&self) -> Result<Vec<ProductSummary>, IndexError> {
        let rows = sqlx::query("SELECT name, metadata_type FROM products ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| ProductSummary {
                name: row.get("name"),
                metadata_type: row.get("metadata_type"),
            })
            .collect())
    }

    async fn has_product(&self, name: &str) -> Result<bool, IndexError> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM products WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn add_product(&self, doc: &ProductDocument) -> Result<(), IndexError> {
        let metadata_type = validate_product(doc)?;
        if self.has_product(&doc.name).await? {
            return Err(IndexError::DuplicateProduct(doc.name.clone()));
        }

        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO products (name, metadata_type, definition_json, doc_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.name)
        .bind(&metadata_type)
        .bind(serde_json::to_string(&doc.schema)?)
        .bind(doc_hash(&doc.schema)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_product(
        &self,
        doc: &ProductDocument,
        allow_unsafe: bool,
    ) -> Result<(), IndexError> {
        let metadata_type = validate_product(doc)?;
        let existing = self
            .stored_product(&doc.name)
            .await?
            .ok_or_else(|| IndexError::UnknownProduct(doc.name.clone()))?;

        let changes = unsafe_product_changes(&existing, &doc.schema);
        check_unsafe(&doc.name, changes, allow_unsafe)?;

        sqlx::query(
            r#"
            UPDATE products
            SET metadata_type = ?, definition_json = ?, doc_hash = ?, updated_at = ?
            WHERE name = ?
            "#,
        )
        .bind(&metadata_type)
        .bind(serde_json::to_string(&doc.schema)?)
        .bind(doc_hash(&doc.schema)?)
        .bind(chrono::Utc::now().timestamp())
        .bind(&doc.name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn has_dataset(&self, id: Uuid) -> Result<bool, IndexError> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM datasets WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn add_dataset(&self, record: &DatasetRecord) -> Result<(), IndexError> {
        if !self.has_product(&record.product).await? {
            return Err(IndexError::UnknownProduct(record.product.clone()));
        }
        if self.has_dataset(record.id).await? {
            return Err(IndexError::DuplicateDataset(record.id));
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO datasets (id, product, metadata_json, doc_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.product)
        .bind(serde_json::to_string(&record.metadata)?)
        .bind(doc_hash(&record.metadata)?)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO dataset_locations (dataset_id, uri, added_at) VALUES (?, ?, ?)")
            .bind(record.id.to_string())
            .bind(&record.uri)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_dataset(
        &self,
        record: &DatasetRecord,
        allow_unsafe: bool,
    ) -> Result<(), IndexError> {
        if !self.has_product(&record.product).await? {
            return Err(IndexError::UnknownProduct(record.product.clone()));
        }

        let current_product: Option<String> =
            sqlx::query_scalar("SELECT product FROM datasets WHERE id = ?")
                .bind(record.id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        let current_product = current_product.ok_or(IndexError::DatasetNotFound(record.id))?;

        let changes = if current_product != record.product {
            vec!["product".to_string()]
        } else {
            Vec::new()
        };
        check_unsafe(&record.id.to_string(), changes, allow_unsafe)?;

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE datasets
            SET product = ?, metadata_json = ?, doc_hash = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.product)
        .bind(serde_json::to_string(&record.metadata)?)
        .bind(doc_hash(&record.metadata)?)
        .bind(now)
        .bind(record.id.to_string())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO dataset_locations (dataset_id, uri, added_at) VALUES (?, ?, ?)
            ON CONFLICT(dataset_id, uri) DO NOTHING
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.uri)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use serde_json::json;
    use tempfile::TempDir;

    async fn open_index(tmp: &TempDir) -> SqliteIndex {
        let config = Config::minimal(tmp.path().join("catalog.sqlite"));
        migrate::run_migrations(&config).await.unwrap();
        SqliteIndex::open(&config).await.unwrap()
    }

    fn product(name: &str, description: &str) -> ProductDocument {
        ProductDocument::from_value(json!({
            "name": name,
            "metadata_type": "eo3",
            "description": description,
            "measurements": [{"name": "red", "dtype": "uint16"}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_product_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let index = open_index(&tmp).await;

        index.add_product(&product("ls8_sr", "v1")).await.unwrap();
        assert!(index.has_product("ls8_sr").await.unwrap());

        let listed = index.list_products().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].metadata_type, "eo3");

        index
            .update_product(&product("ls8_sr", "v2"), false)
            .await
            .unwrap();
        let stored = index.stored_product("ls8_sr").await.unwrap().unwrap();
        assert_eq!(stored["description"], "v2");

        index.close().await;
    }

    #[tokio::test]
    async fn test_duplicate_and_unsafe() {
        let tmp = TempDir::new().unwrap();
        let index = open_index(&tmp).await;

        index.add_product(&product("p", "v1")).await.unwrap();
        assert!(matches!(
            index.add_product(&product("p", "v1")).await,
            Err(IndexError::DuplicateProduct(_))
        ));

        let changed = ProductDocument::from_value(json!({
            "name": "p",
            "metadata_type": "eo3",
            "description": "v1",
            "measurements": [{"name": "red", "dtype": "float32"}]
        }))
        .unwrap();
        assert!(matches!(
            index.update_product(&changed, false).await,
            Err(IndexError::UnsafeUpdate { .. })
        ));
        index.update_product(&changed, true).await.unwrap();

        index.close().await;
    }

    #[tokio::test]
    async fn test_dataset_locations_accumulate() {
        let tmp = TempDir::new().unwrap();
        let index = open_index(&tmp).await;
        index.add_product(&product("p", "v1")).await.unwrap();

        let id = Uuid::new_v4();
        let metadata = json!({"id": id.to_string(), "product": {"name": "p"}});
        let record = index
            .resolve_dataset(&metadata, "file:///a.yaml")
            .await
            .unwrap();
        index.add_dataset(&record).await.unwrap();

        let again = DatasetRecord {
            uri: "file:///b.yaml".to_string(),
            ..record.clone()
        };
        index.update_dataset(&again, false).await.unwrap();
        index.update_dataset(&again, false).await.unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM dataset_locations WHERE dataset_id = ?")
                .bind(id.to_string())
                .fetch_one(&index.pool)
                .await
                .unwrap();
        assert_eq!(count, 2);

        index.close().await;
    }

    #[tokio::test]
    async fn test_update_missing_dataset() {
        let tmp = TempDir::new().unwrap();
        let index = open_index(&tmp).await;
        index.add_product(&product("p", "v1")).await.unwrap();

        let id = Uuid::new_v4();
        let record = DatasetRecord {
            id,
            product: "p".to_string(),
            metadata: json!({"id": id.to_string(), "product": "p"}),
            uri: "file:///a.yaml".to_string(),
        };
        assert!(matches!(
            index.update_dataset(&record, true).await,
            Err(IndexError::DatasetNotFound(_))
        ));

        index.close().await;
    }
}
