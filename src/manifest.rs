//! Product manifest parsing and validation.
//!
//! A manifest is a CSV file with a `product` and a `definition` column:
//!
//! ```text
//! product,definition
//! ls8_sr,https://example.com/products/ls8_sr.odc-product.yaml
//! s2a_l2a;s2b_l2a,./products/s2_l2a.odc-product.yaml
//! ```
//!
//! When one YAML file holds several product definitions, `product` lists
//! every name separated by `;`. Each row is checked against the fetched
//! documents: the declared names must match the documents' `name` fields
//! exactly, otherwise the whole row is reported as a single failed
//! [`Product`].

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::fetch::Fetch;
use crate::models::{ManifestEntry, Product, ProductDocument};

#[derive(Debug, Deserialize)]
struct ManifestRow {
    product: String,
    definition: String,
}

/// Parse manifest CSV text into entries.
///
/// Fails if the `product` or `definition` column is missing. Rows with an
/// empty `product` or `definition` are skipped with a warning.
pub fn parse_manifest(text: &str) -> Result<Vec<ManifestEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut entries = Vec::new();
    for (i, row) in reader.deserialize::<ManifestRow>().enumerate() {
        let row = row.with_context(|| format!("Invalid manifest row {}", i + 1))?;
        if row.product.is_empty() || row.definition.is_empty() {
            tracing::warn!(row = i + 1, "skipping manifest row with an empty column");
            continue;
        }
        entries.push(ManifestEntry {
            name: row.product,
            definition: row.definition,
        });
    }

    Ok(entries)
}

/// Fetch and parse a manifest.
pub async fn read_manifest(fetcher: &dyn Fetch, location: &str) -> Result<Vec<ManifestEntry>> {
    let text = fetcher
        .fetch_text(location)
        .await
        .with_context(|| format!("Failed to read manifest {}", location))?;
    parse_manifest(&text).with_context(|| format!("Failed to parse manifest {}", location))
}

/// Parse every document of a multi-document YAML stream.
///
/// Empty documents are dropped.
pub fn parse_documents(text: &str) -> Result<Vec<Value>> {
    let mut docs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document)?;
        if !value.is_null() {
            docs.push(value);
        }
    }
    Ok(docs)
}

/// Fetch and parse the documents at `location`.
///
/// Fetch or parse errors are logged and yield an empty list, which the
/// caller's count check then reports as a failed row.
pub async fn load_documents(fetcher: &dyn Fetch, location: &str) -> Vec<Value> {
    let text = match fetcher.fetch_text(location).await {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("Failed to get document from {}: {:#}", location, e);
            return Vec::new();
        }
    };

    match parse_documents(&text) {
        Ok(docs) => docs,
        Err(e) => {
            tracing::error!("Failed to parse document from {}: {:#}", location, e);
            Vec::new()
        }
    }
}

/// Validate one manifest row against its fetched documents.
pub fn check_entry(entry: &ManifestEntry, docs: Vec<Value>) -> Vec<Product> {
    let names = entry.names();

    if names.len() != docs.len() {
        tracing::error!(
            "{} product names and {} documents found for '{}'. This is different!",
            names.len(),
            docs.len(),
            entry.name
        );
        return vec![Product::failed(&entry.name)];
    }

    let mut documents: Vec<ProductDocument> = Vec::with_capacity(docs.len());
    for doc in docs {
        match ProductDocument::from_value(doc) {
            Some(d) => documents.push(d),
            None => {
                tracing::error!("A document for '{}' has no name field", entry.name);
                return vec![Product::failed(&entry.name)];
            }
        }
    }

    let declared: BTreeSet<&str> = names.iter().copied().collect();
    let found: BTreeSet<&str> = documents.iter().map(|d| d.name.as_str()).collect();
    if declared != found {
        tracing::error!("{:?} is not the same as {:?}", declared, found);
        return vec![Product::failed(&entry.name)];
    }

    let mut products = Vec::with_capacity(names.len());
    for name in names {
        // Sets are equal, so a document with this name is still present.
        if let Some(pos) = documents.iter().position(|d| d.name == name) {
            products.push(Product::valid(documents.remove(pos)));
        }
    }
    products
}

/// Resolve every manifest entry into products, in manifest order.
pub async fn resolve_products(fetcher: &dyn Fetch, entries: &[ManifestEntry]) -> Vec<Product> {
    let mut products = Vec::new();
    for entry in entries {
        let docs = load_documents(fetcher, &entry.definition).await;
        products.extend(check_entry(entry, docs));
    }
    products
}
