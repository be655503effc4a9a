//! Shapefile access, bulk loading and file merging for `shpload`.
//!
//! Responsibilities:
//! - Locate shapefile components and stream their attributes and shapes.
//! - Resolve EPSG codes from `.prj` text.
//! - Load a shapefile into a PostGIS table in fixed-size batches.
//! - Merge polygon shapefiles into one shapefile or GeoJSON layer.
//!
//! Boundaries:
//! - Domain rules (schema synthesis, encoding heuristics, merging) live in
//!   `shpload-core`.
//! - Database access goes through [`SqlExecutor`]; the PostgreSQL adapter is
//!   behind the `store-postgres` feature.
//!
//! Invariants:
//! - Sources are disposed on every exit path of a load.
//! - No global mutable state.
#![forbid(unsafe_code)]

mod components;
pub mod crs;
pub mod dbf;
mod loader;
mod merge;
#[cfg(feature = "store-postgres")]
mod postgres;
mod source;
mod text;
mod writer;

pub use components::ShapefileComponents;
pub use crs::PrjCrsEngine;
pub use loader::{
    DEFAULT_BATCH_SIZE, LoadOptions, LoadReport, ReprojectionMode, load, load_from_source,
    load_report,
};
pub use merge::{
    MIN_MERGE_INPUTS, MergeError, MergeReport, merge_shapefiles, read_layer, to_feature_collection,
};
#[cfg(feature = "store-postgres")]
pub use postgres::PostgresExecutor;
pub use shpload_core::SqlExecutor;
pub use source::ShapefileSource;
pub use text::TextCorrector;
