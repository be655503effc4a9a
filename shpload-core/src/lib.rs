//! Core domain types for shapefile ingestion and polygon merging.
//!
//! The crate holds everything that does not touch a file or a database
//! connection directly:
//! - attribute field definitions and the relational schema derived from them,
//! - the text encoding heuristic used while loading attribute strings,
//! - the coordinate transform gateway in front of a CRS engine,
//! - the polygon merge engine that folds overlapping features together.
//!
//! Collaborators (feature sources, CRS engines, SQL executors) are modelled
//! as traits so adapters can live in `shpload-data` and tests can substitute
//! in-memory doubles.
#![forbid(unsafe_code)]

pub mod encoding;
pub mod error;
pub mod feature;
pub mod field;
pub mod geometry;
pub mod merge;
pub mod schema;
pub mod source;
pub mod sql;
pub mod transform;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use encoding::{EncodingError, EncodingResolver, LEGACY_ENCODING_LABEL, UTF8_LABEL};
pub use error::IngestError;
pub use feature::{AttributeValue, Attributes, DbfDate, SourceFeature};
pub use field::{FieldDefinition, FieldKind};
pub use geometry::GeometryError;
pub use merge::{MergeSet, SourceLayer, merge_all, merge_into};
pub use schema::{
    ColumnSpec, ColumnType, EnsureOutcome, GEOMETRY_COLUMN, SchemaError, TargetTable,
    ensure_table_exists, synthesize,
};
pub use source::{FeatureSource, FeatureStream, SourceError};
pub use sql::{BindValue, ExecutorError, SqlExecutionError, SqlExecutor};
pub use transform::{CoordinateTransformError, CrsEngine, CrsEngineError, TransformGateway};

/// Spatial reference every loaded geometry ends up in (CGCS2000 geographic).
pub const CANONICAL_SRID: i32 = 4490;
