//! Dataset document discovery.
//!
//! Turns the paths given to `dcsync index-datasets` into the list of files
//! to index. Directories are walked and filtered by a glob (relative to the
//! directory); files named explicitly are taken as-is.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::DatasetsConfig;

pub const DEFAULT_YAML_GLOB: &str = "**/*.yaml";
pub const DEFAULT_STAC_GLOB: &str = "**/*.json";

/// The glob used when none is given on the command line.
pub fn default_glob(stac: bool) -> &'static str {
    if stac {
        DEFAULT_STAC_GLOB
    } else {
        DEFAULT_YAML_GLOB
    }
}

/// Collect dataset files under `paths`.
///
/// Output keeps the order of `paths`; files found under one directory are
/// sorted. Paths that do not exist, and entries the walk cannot read
/// (dangling or looping symlinks, unreadable directories), are logged and
/// skipped.
pub fn find_files(
    paths: &[PathBuf],
    glob: Option<&str>,
    stac: bool,
    config: &DatasetsConfig,
) -> Result<Vec<PathBuf>> {
    let pattern = glob.unwrap_or_else(|| default_glob(stac));
    let include = build_globset(&[pattern.to_string()])
        .with_context(|| format!("Invalid glob pattern: '{}'", pattern))?;

    let mut default_excludes = vec!["**/.git/**".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude = build_globset(&default_excludes)?;

    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            files.extend(walk_dir(path, &include, &exclude, config.follow_symlinks));
        } else {
            tracing::warn!("Path does not exist, skipping: {}", path.display());
        }
    }

    Ok(files)
}

fn walk_dir(
    root: &Path,
    include: &GlobSet,
    exclude: &GlobSet,
    follow_symlinks: bool,
) -> Vec<PathBuf> {
    let mut found = Vec::new();

    let walker = WalkDir::new(root).follow_links(follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);

        if exclude.is_match(relative) {
            continue;
        }
        if !include.is_match(relative) {
            continue;
        }

        found.push(path.to_path_buf());
    }

    // Sort for deterministic ordering
    found.sort();

    tracing::debug!(root = %root.display(), count = found.len(), "scanned directory");
    found
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
