//! Catalog index abstraction.
//!
//! The [`Index`] trait is the only surface the sync pipelines talk to. It
//! covers the product list/add/update operations used by product sync and
//! the resolve/add/update dataset operations used by dataset sync.
//!
//! Two backends are provided:
//!
//! | Backend | Module | Use |
//! |---------|--------|-----|
//! | [`SqliteIndex`] | [`sqlite`] | The on-disk catalog created by `dcsync init` |
//! | [`MemoryIndex`] | [`memory`] | Tests and embedding in other tools |
//!
//! Both enforce the same document rules, implemented once in this module:
//! product documents need a `name` and a `metadata_type`; changing a
//! product's `metadata_type` or `measurements`, or moving a dataset to a
//! different product, is an *unsafe* update and is rejected unless the
//! caller passes `allow_unsafe`.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{DatasetRecord, ProductDocument, ProductSummary};

pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;

/// Product keys whose modification changes how datasets are interpreted.
const UNSAFE_PRODUCT_KEYS: &[&str] = &["metadata_type", "measurements"];

/// Errors raised by index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("product '{0}' already exists")]
    DuplicateProduct(String),

    #[error("product '{0}' is not in the index")]
    UnknownProduct(String),

    #[error("dataset {0} already exists")]
    DuplicateDataset(Uuid),

    #[error("dataset {0} is not in the index")]
    DatasetNotFound(Uuid),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("unsafe update of '{name}' rejected, changed: {}", .keys.join(", "))]
    UnsafeUpdate { name: String, keys: Vec<String> },

    #[error("index storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A catalog that stores products and datasets.
///
/// Every method is a single blocking step from the caller's point of view;
/// the pipelines await them one at a time.
#[async_trait]
pub trait Index: Send + Sync {
    /// All products currently in the index, ordered by name.
    async fn list_products(&self) -> Result<Vec<ProductSummary>, IndexError>;

    /// Whether a product with this name exists.
    async fn has_product(&self, name: &str) -> Result<bool, IndexError>;

    /// Add a new product definition.
    async fn add_product(&self, doc: &ProductDocument) -> Result<(), IndexError>;

    /// Replace an existing product definition.
    ///
    /// Changes to `metadata_type` or `measurements` are rejected unless
    /// `allow_unsafe` is set.
    async fn update_product(
        &self,
        doc: &ProductDocument,
        allow_unsafe: bool,
    ) -> Result<(), IndexError>;

    /// Whether a dataset with this id exists.
    async fn has_dataset(&self, id: Uuid) -> Result<bool, IndexError>;

    /// Add a new dataset and record its location.
    async fn add_dataset(&self, record: &DatasetRecord) -> Result<(), IndexError>;

    /// Replace an existing dataset's metadata and record its location.
    async fn update_dataset(
        &self,
        record: &DatasetRecord,
        allow_unsafe: bool,
    ) -> Result<(), IndexError>;

    /// Resolve a native dataset document into a [`DatasetRecord`].
    ///
    /// The document must carry a UUID `id` and reference a product that is
    /// already in the index.
    async fn resolve_dataset(
        &self,
        metadata: &Value,
        uri: &str,
    ) -> Result<DatasetRecord, IndexError> {
        let (id, product) = parse_dataset(metadata)?;
        if !self.has_product(&product).await? {
            return Err(IndexError::UnknownProduct(product));
        }
        Ok(DatasetRecord {
            id,
            product,
            metadata: metadata.clone(),
            uri: uri.to_string(),
        })
    }
}

/// Check a product definition and return its metadata type.
pub(crate) fn validate_product(doc: &ProductDocument) -> Result<String, IndexError> {
    let schema = doc
        .schema
        .as_object()
        .ok_or_else(|| IndexError::InvalidDocument("product definition must be a mapping".into()))?;

    let name = schema
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| IndexError::InvalidDocument("product definition has no name".into()))?;
    if name != doc.name {
        return Err(IndexError::InvalidDocument(format!(
            "product name '{}' does not match document name '{}'",
            doc.name, name
        )));
    }
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(IndexError::InvalidDocument(format!(
            "invalid product name '{}'",
            name
        )));
    }

    let metadata_type = schema
        .get("metadata_type")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            IndexError::InvalidDocument(format!("product '{}' has no metadata_type", name))
        })?;

    if let Some(measurements) = schema.get("measurements") {
        let list = measurements.as_array().ok_or_else(|| {
            IndexError::InvalidDocument(format!("product '{}': measurements must be a list", name))
        })?;
        for m in list {
            if m.get("name").and_then(Value::as_str).is_none() {
                return Err(IndexError::InvalidDocument(format!(
                    "product '{}': every measurement needs a name",
                    name
                )));
            }
        }
    }

    Ok(metadata_type.to_string())
}

/// Keys whose change between `old` and `new` makes a product update unsafe.
pub(crate) fn unsafe_product_changes(old: &Value, new: &Value) -> Vec<String> {
    UNSAFE_PRODUCT_KEYS
        .iter()
        .filter(|key| old.get(**key) != new.get(**key))
        .map(|key| key.to_string())
        .collect()
}

/// Check that an unsafe change list is acceptable.
pub(crate) fn check_unsafe(
    name: &str,
    keys: Vec<String>,
    allow_unsafe: bool,
) -> Result<(), IndexError> {
    if keys.is_empty() || allow_unsafe {
        Ok(())
    } else {
        Err(IndexError::UnsafeUpdate {
            name: name.to_string(),
            keys,
        })
    }
}

/// Extract the dataset id and product name from a native dataset document.
///
/// The product reference is read from `product.name`, falling back to a
/// plain string `product` field.
pub(crate) fn parse_dataset(metadata: &Value) -> Result<(Uuid, String), IndexError> {
    if !metadata.is_object() {
        return Err(IndexError::InvalidDocument(
            "dataset document must be a mapping".into(),
        ));
    }

    let raw_id = metadata
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| IndexError::InvalidDocument("dataset document has no id".into()))?;
    let id = Uuid::parse_str(raw_id)
        .map_err(|e| IndexError::InvalidDocument(format!("dataset id '{}': {}", raw_id, e)))?;

    let product = match metadata.get("product") {
        Some(Value::Object(p)) => p.get("name").and_then(Value::as_str),
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
    .ok_or_else(|| {
        IndexError::InvalidDocument(format!("dataset {} has no product reference", id))
    })?;

    Ok((id, product.to_string()))
}

/// SHA-256 of a document's JSON encoding, stored next to each record.
pub(crate) fn doc_hash(value: &Value) -> Result<String, IndexError> {
    let encoded = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    Ok(format!("{:x}", hasher.finalize()))
}
