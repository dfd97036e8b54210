//! Core data models used throughout dcsync.
//!
//! These types represent the manifest rows, product definitions and dataset
//! documents that flow through the two sync pipelines.

use serde_json::Value;
use uuid::Uuid;

/// One row of a product manifest CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Raw `product` column: a single name or a `;`-joined list.
    pub name: String,
    /// Raw `definition` column: a path or URI.
    pub definition: String,
}

impl ManifestEntry {
    /// The declared product names, split on `;`.
    pub fn names(&self) -> Vec<&str> {
        self.name.split(';').map(str::trim).collect()
    }
}

/// A parsed product definition document.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDocument {
    pub name: String,
    pub schema: Value,
}

impl ProductDocument {
    /// Wrap a parsed document, reading its `name` field.
    ///
    /// Returns `None` when the document has no string `name`.
    pub fn from_value(schema: Value) -> Option<Self> {
        let name = schema.get("name")?.as_str()?.to_string();
        Some(Self { name, schema })
    }
}

/// A resolved unit of product sync work.
///
/// `doc` is `None` when the manifest row failed validation; the product is
/// still carried to the reconciler so that it is counted as failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub name: String,
    pub doc: Option<ProductDocument>,
}

impl Product {
    pub fn valid(doc: ProductDocument) -> Self {
        Self {
            name: doc.name.clone(),
            doc: Some(doc),
        }
    }

    pub fn failed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
        }
    }
}

/// A dataset metadata document read from disk.
#[derive(Debug, Clone)]
pub struct DatasetDocument {
    pub metadata: Value,
    pub source_uri: String,
}

/// A dataset document resolved against the index.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRecord {
    pub id: Uuid,
    pub product: String,
    pub metadata: Value,
    pub uri: String,
}

/// Summary of a product entry in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSummary {
    pub name: String,
    pub metadata_type: String,
}

/// Counters reported at the end of a sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub added: usize,
    pub updated: usize,
    pub failed: usize,
}
