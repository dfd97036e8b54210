//! Product sync: manifest -> index.
//!
//! Reads a product manifest, resolves every row into [`Product`]s, then
//! adds products the index does not have and, when asked, updates the ones
//! it does. Errors on a single product are logged and counted; they never
//! stop the run.

use anyhow::{Context, Result};
use std::collections::HashSet;

use crate::fetch::Fetch;
use crate::index::Index;
use crate::manifest;
use crate::models::{Product, SyncSummary};

/// Sync the manifest at `manifest_location` into `index`.
pub async fn run_product_sync(
    index: &dyn Index,
    fetcher: &dyn Fetch,
    manifest_location: &str,
    update_if_exists: bool,
) -> Result<SyncSummary> {
    let entries = manifest::read_manifest(fetcher, manifest_location).await?;
    let products = manifest::resolve_products(fetcher, &entries).await;
    tracing::info!(
        "Found {} products in the manifest {}",
        products.len(),
        manifest_location
    );

    add_update_products(index, &products, update_if_exists).await
}

/// Apply resolved products to the index.
///
/// Lists the index once, then reconciles each product in order.
pub async fn add_update_products(
    index: &dyn Index,
    products: &[Product],
    update_if_exists: bool,
) -> Result<SyncSummary> {
    let existing: HashSet<String> = index
        .list_products()
        .await
        .context("Failed to list existing products")?
        .into_iter()
        .map(|p| p.name)
        .collect();
    tracing::info!("Found {} products in the index", existing.len());

    Ok(reconcile_products(index, products, &existing, update_if_exists).await)
}

/// Add or update each product against a known set of existing names.
pub async fn reconcile_products(
    index: &dyn Index,
    products: &[Product],
    existing: &HashSet<String>,
    update_if_exists: bool,
) -> SyncSummary {
    let mut summary = SyncSummary::default();

    for product in products {
        let doc = match &product.doc {
            Some(doc) => doc,
            None => {
                summary.failed += 1;
                continue;
            }
        };

        if !existing.contains(&product.name) {
            match index.add_product(doc).await {
                Ok(()) => {
                    summary.added += 1;
                    tracing::info!("Added product {}", product.name);
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!("Failed to add product {}: {}", product.name, e);
                }
            }
        } else if update_if_exists {
            match index.update_product(doc, true).await {
                Ok(()) => {
                    summary.updated += 1;
                    tracing::info!("Updated product {}", product.name);
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!("Failed to update product {}: {}", product.name, e);
                }
            }
        } else {
            tracing::debug!("Product {} already exists, skipping", product.name);
        }
    }

    summary
}
