//! # dcsync
//!
//! Synchronize product and dataset metadata documents into a geospatial data
//! catalog.
//!
//! Two pipelines share one reconciliation pattern: read the desired state,
//! compare it to what the index already holds, then add or update item by
//! item while counting successes and failures.
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ CSV manifest │──▶│ Manifest     │──▶│  Product    │──┐
//! │ + YAML defs  │   │ parse/check  │   │  reconcile  │  │   ┌─────────┐
//! └──────────────┘   └──────────────┘   └─────────────┘  ├──▶│  Index  │
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐  │   └─────────┘
//! │ Dataset dirs │──▶│ Finder +     │──▶│  Dataset    │──┘
//! │ YAML / STAC  │   │ STAC convert │   │  add/update │
//! └──────────────┘   └──────────────┘   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dcsync init
//! dcsync sync-products products.csv --update-if-exists
//! dcsync index-datasets /data/ls8 --update-if-exists
//! dcsync index-datasets /data/stac --stac
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Manifest entries, products, dataset documents, summaries |
//! | [`fetch`] | Local and HTTP(S) document fetching |
//! | [`manifest`] | Manifest CSV parsing and row validation |
//! | [`products`] | Product reconciliation |
//! | [`finder`] | Dataset file discovery |
//! | [`stac`] | STAC Item conversion |
//! | [`datasets`] | Dataset indexing |
//! | [`index`] | `Index` trait with SQLite and in-memory backends |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`logging`] | Subscriber setup for the binary |

pub mod config;
pub mod datasets;
pub mod db;
pub mod fetch;
pub mod finder;
pub mod index;
pub mod logging;
pub mod manifest;
pub mod migrate;
pub mod models;
pub mod products;
pub mod stac;
