//! Dataset sync: filesystem -> index.
//!
//! Each file found by [`finder::find_files`] is parsed (YAML or JSON by
//! extension), optionally converted from STAC, resolved against the index
//! and added, or updated when it is already indexed and the caller asked
//! for updates. A bad file is logged and counted as failed; the run always
//! continues with the next file.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::config::DatasetsConfig;
use crate::fetch::file_uri;
use crate::finder;
use crate::index::Index;
use crate::models::{DatasetDocument, SyncSummary};
use crate::stac::stac_transform;

/// Flags controlling a dataset sync run.
#[derive(Debug, Clone, Default)]
pub struct DatasetSyncOptions {
    /// Glob applied under directory arguments. Defaults per `stac`.
    pub glob: Option<String>,
    /// Update datasets that are already indexed.
    pub update_if_exists: bool,
    /// Permit updates that change a dataset's product.
    pub allow_unsafe: bool,
    /// Treat inputs as STAC Items and convert them first.
    pub stac: bool,
}

/// What happened to a single dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Added,
    Updated,
    /// Already indexed and updates were not requested.
    Skipped,
}

/// Index every dataset file under `paths`.
///
/// Only a bad glob is a hard error; per-file problems are counted in
/// [`SyncSummary::failed`]. Every successfully processed file counts as
/// added.
pub async fn run_dataset_sync(
    index: &dyn Index,
    config: &DatasetsConfig,
    paths: &[PathBuf],
    opts: &DatasetSyncOptions,
) -> Result<SyncSummary> {
    let files = finder::find_files(paths, opts.glob.as_deref(), opts.stac, config)?;
    tracing::info!("Found {} dataset files", files.len());

    let mut summary = SyncSummary::default();
    for file in &files {
        match index_file(index, file, opts).await {
            Ok(outcome) => {
                summary.added += 1;
                tracing::debug!(?outcome, "processed {}", file.display());
            }
            Err(e) => {
                summary.failed += 1;
                tracing::error!("Failed to add dataset {}: {:#}", file.display(), e);
            }
        }
    }

    tracing::info!(
        "Added {} and failed {} datasets.",
        summary.added,
        summary.failed
    );
    Ok(summary)
}

/// Read, convert and index a single dataset file.
pub async fn index_file(
    index: &dyn Index,
    path: &Path,
    opts: &DatasetSyncOptions,
) -> Result<IndexOutcome> {
    let document = read_dataset(path, opts.stac).await?;
    index_update_dataset(
        index,
        &document,
        opts.update_if_exists,
        opts.allow_unsafe,
    )
    .await
}

/// Load a dataset document from disk.
pub async fn read_dataset(path: &Path, stac: bool) -> Result<DatasetDocument> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut metadata = parse_by_extension(path, &text)?;
    if stac {
        metadata = stac_transform(&metadata)
            .with_context(|| format!("STAC transform failed for {}", path.display()))?;
    }

    Ok(DatasetDocument {
        metadata,
        source_uri: file_uri(path)?,
    })
}

/// YAML for `.yaml`/`.yml`, JSON for anything else.
pub fn parse_by_extension(path: &Path, text: &str) -> Result<Value> {
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );

    if is_yaml {
        serde_yaml::from_str(text).with_context(|| format!("Invalid YAML in {}", path.display()))
    } else {
        serde_json::from_str(text).with_context(|| format!("Invalid JSON in {}", path.display()))
    }
}

/// Resolve a document and add it, or update it if it is already indexed.
pub async fn index_update_dataset(
    index: &dyn Index,
    document: &DatasetDocument,
    update_if_exists: bool,
    allow_unsafe: bool,
) -> Result<IndexOutcome> {
    let record = index
        .resolve_dataset(&document.metadata, &document.source_uri)
        .await?;

    if !index.has_dataset(record.id).await? {
        index.add_dataset(&record).await?;
        tracing::info!("Added dataset {} ({})", record.id, record.product);
        return Ok(IndexOutcome::Added);
    }

    if update_if_exists {
        index.update_dataset(&record, allow_unsafe).await?;
        tracing::info!("Updated dataset {} ({})", record.id, record.product);
        Ok(IndexOutcome::Updated)
    } else {
        tracing::warn!(
            "Dataset {} already exists, not indexing {}",
            record.id,
            document.source_uri
        );
        Ok(IndexOutcome::Skipped)
    }
}
