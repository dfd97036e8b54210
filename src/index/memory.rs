//! In-memory [`Index`] implementation for tests and library use.
//!
//! Uses `BTreeMap` and `HashMap` behind `std::sync::RwLock`. Applies the
//! same document rules as [`SqliteIndex`](super::SqliteIndex).

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{DatasetRecord, ProductDocument, ProductSummary};

use super::{check_unsafe, unsafe_product_changes, validate_product, Index, IndexError};

struct StoredProduct {
    metadata_type: String,
    schema: Value,
}

struct StoredDataset {
    product: String,
    metadata: Value,
    locations: Vec<String>,
}

/// In-memory catalog.
pub struct MemoryIndex {
    products: RwLock<BTreeMap<String, StoredProduct>>,
    datasets: RwLock<HashMap<Uuid, StoredDataset>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            products: RwLock::new(BTreeMap::new()),
            datasets: RwLock::new(HashMap::new()),
        }
    }

    /// Stored definition of a product, if present.
    pub fn product(&self, name: &str) -> Option<Value> {
        self.products
            .read()
            .unwrap()
            .get(name)
            .map(|p| p.schema.clone())
    }

    /// Stored metadata of a dataset, if present.
    pub fn dataset(&self, id: Uuid) -> Option<Value> {
        self.datasets
            .read()
            .unwrap()
            .get(&id)
            .map(|d| d.metadata.clone())
    }

    /// Recorded locations of a dataset, in insertion order.
    pub fn dataset_locations(&self, id: Uuid) -> Vec<String> {
        self.datasets
            .read()
            .unwrap()
            .get(&id)
            .map(|d| d.locations.clone())
            .unwrap_or_default()
    }

    pub fn dataset_count(&self) -> usize {
        self.datasets.read().unwrap().len()
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Index for MemoryIndex {
    async fn list_products(&self) -> Result<Vec<ProductSummary>, IndexError> {
        Ok(self
            .products
            .read()
            .unwrap()
            .iter()
            .map(|(name, p)| ProductSummary {
                name: name.clone(),
                metadata_type: p.metadata_type.clone(),
            })
            .collect())
    }

    async fn has_product(&self, name: &str) -> Result<bool, IndexError> {
        Ok(self.products.read().unwrap().contains_key(name))
    }

    async fn add_product(&self, doc: &ProductDocument) -> Result<(), IndexError> {
        let metadata_type = validate_product(doc)?;
        let mut products = self.products.write().unwrap();
        if products.contains_key(&doc.name) {
            return Err(IndexError::DuplicateProduct(doc.name.clone()));
        }
        products.insert(
            doc.name.clone(),
            StoredProduct {
                metadata_type,
                schema: doc.schema.clone(),
            },
        );
        Ok(())
    }

    async fn update_product(
        &self,
        doc: &ProductDocument,
        allow_unsafe: bool,
    ) -> Result<(), IndexError> {
        let metadata_type = validate_product(doc)?;
        let mut products = self.products.write().unwrap();
        let stored = products
            .get_mut(&doc.name)
            .ok_or_else(|| IndexError::UnknownProduct(doc.name.clone()))?;

        let changes = unsafe_product_changes(&stored.schema, &doc.schema);
        check_unsafe(&doc.name, changes, allow_unsafe)?;

        stored.metadata_type = metadata_type;
        stored.schema = doc.schema.clone();
        Ok(())
    }

    async fn has_dataset(&self, id: Uuid) -> Result<bool, IndexError> {
        Ok(self.datasets.read().unwrap().contains_key(&id))
    }

    async fn add_dataset(&self, record: &DatasetRecord) -> Result<(), IndexError> {
        if !self.products.read().unwrap().contains_key(&record.product) {
            return Err(IndexError::UnknownProduct(record.product.clone()));
        }
        let mut datasets = self.datasets.write().unwrap();
        if datasets.contains_key(&record.id) {
            return Err(IndexError::DuplicateDataset(record.id));
        }
        datasets.insert(
            record.id,
            StoredDataset {
                product: record.product.clone(),
                metadata: record.metadata.clone(),
                locations: vec![record.uri.clone()],
            },
        );
        Ok(())
    }

    async fn update_dataset(
        &self,
        record: &DatasetRecord,
        allow_unsafe: bool,
    ) -> Result<(), IndexError> {
        if !self.products.read().unwrap().contains_key(&record.product) {
            return Err(IndexError::UnknownProduct(record.product.clone()));
        }
        let mut datasets = self.datasets.write().unwrap();
        let stored = datasets
            .get_mut(&record.id)
            .ok_or(IndexError::DatasetNotFound(record.id))?;

        let changes = if stored.product != record.product {
            vec!["product".to_string()]
        } else {
            Vec::new()
        };
        check_unsafe(&record.id.to_string(), changes, allow_unsafe)?;

        stored.product = record.product.clone();
        stored.metadata = record.metadata.clone();
        if !stored.locations.contains(&record.uri) {
            stored.locations.push(record.uri.clone());
        }
        Ok(())
    }
}
