//! # dcsync CLI
//!
//! The `dcsync` binary keeps a catalog in step with product definitions and
//! dataset metadata documents.
//!
//! ## Usage
//!
//! ```bash
//! dcsync --config ./config/dcsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dcsync init` | Create the catalog database and run schema migrations |
//! | `dcsync list-products` | Print the products currently indexed |
//! | `dcsync sync-products <CSV>` | Add/update products listed in a manifest |
//! | `dcsync index-datasets <PATH>...` | Add/update dataset documents from disk |
//!
//! ## Exit status
//!
//! `sync-products` exits with the number of failed products (capped at 255).
//! `index-datasets` exits 0 unless `--strict` is given, in which case it
//! behaves the same way.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use dcsync::config;
use dcsync::datasets::{self, DatasetSyncOptions};
use dcsync::fetch::UriFetcher;
use dcsync::index::{Index, SqliteIndex};
use dcsync::logging;
use dcsync::migrate;
use dcsync::products;

/// dcsync: synchronize product and dataset metadata into a catalog.
#[derive(Parser)]
#[command(
    name = "dcsync",
    about = "Synchronize product and dataset metadata into a geospatial data catalog",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dcsync.toml")]
    config: PathBuf,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the catalog schema.
    ///
    /// Creates the SQLite database file and the products, datasets and
    /// dataset_locations tables. Safe to run more than once.
    Init,

    /// List products in the catalog.
    ListProducts,

    /// Add or update products from a CSV manifest.
    ///
    /// The CSV has a `product,definition` header. `product` may hold several
    /// `;`-separated names when one YAML file defines several products.
    /// Exits with the number of failed products.
    SyncProducts {
        /// Path or URL of the manifest CSV.
        csv_path: String,

        /// Update products that already exist (unsafe changes allowed).
        #[arg(long)]
        update_if_exists: bool,
    },

    /// Index dataset documents stored on the filesystem.
    ///
    /// Directories are searched with `--glob` (default `**/*.yaml`, or
    /// `**/*.json` with `--stac`); files are indexed directly.
    IndexDatasets {
        /// Dataset files or directories.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Glob applied under directory arguments.
        #[arg(long)]
        glob: Option<String>,

        /// Update datasets that already exist.
        #[arg(long)]
        update_if_exists: bool,

        /// Allow updates that change a dataset's product.
        #[arg(long)]
        allow_unsafe: bool,

        /// Inputs are STAC Items; convert them before indexing.
        #[arg(long)]
        stac: bool,

        /// Exit with the number of failed datasets.
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(&cli.log_level)?;

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Catalog initialized successfully.");
            Ok(ExitCode::SUCCESS)
        }
        Commands::ListProducts => {
            let index = SqliteIndex::open(&cfg).await?;
            let listed = index.list_products().await?;
            println!("{:<32} METADATA TYPE", "PRODUCT");
            for p in &listed {
                println!("{:<32} {}", p.name, p.metadata_type);
            }
            index.close().await;
            Ok(ExitCode::SUCCESS)
        }
        Commands::SyncProducts {
            csv_path,
            update_if_exists,
        } => {
            let index = SqliteIndex::open(&cfg).await?;
            let fetcher = UriFetcher::new(&cfg.fetch)?;
            tracing::info!("Starting up: update-if-exists is {}", update_if_exists);

            let summary =
                products::run_product_sync(&index, &fetcher, &csv_path, update_if_exists).await?;
            index.close().await;

            println!(
                "Added: {}, Updated: {} and Failed: {}",
                summary.added, summary.updated, summary.failed
            );
            Ok(exit_code(summary.failed))
        }
        Commands::IndexDatasets {
            paths,
            glob,
            update_if_exists,
            allow_unsafe,
            stac,
            strict,
        } => {
            let index = SqliteIndex::open(&cfg).await?;
            let opts = DatasetSyncOptions {
                glob,
                update_if_exists,
                allow_unsafe,
                stac,
            };

            let summary = datasets::run_dataset_sync(&index, &cfg.datasets, &paths, &opts).await?;
            index.close().await;

            if strict {
                Ok(exit_code(summary.failed))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

/// Failure count as a process exit status.
fn exit_code(failed: usize) -> ExitCode {
    ExitCode::from(exit_status(failed))
}

/// Counts past 255 do not fit in an exit status and are clamped.
fn exit_status(failed: usize) -> u8 {
    failed.min(u8::MAX as usize) as u8
}
