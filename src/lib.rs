//! Facade crate for `shpload`, a shapefile ingestion and merge toolkit.
//!
//! This crate re-exports the domain types and components from
//! `shpload-core` together with the shapefile loader and merge pipeline from
//! `shpload-data`. The PostgreSQL executor is available behind the
//! `store-postgres` feature.

#![forbid(unsafe_code)]

pub use shpload_core::{
    AttributeValue, Attributes, BindValue, CANONICAL_SRID, ColumnSpec, ColumnType,
    CoordinateTransformError, CrsEngine, CrsEngineError, DbfDate, EncodingError, EncodingResolver,
    EnsureOutcome, ExecutorError, FeatureSource, FieldDefinition, FieldKind, GEOMETRY_COLUMN,
    GeometryError, IngestError, LEGACY_ENCODING_LABEL, MergeSet, SchemaError, SourceError,
    SourceFeature, SourceLayer, SqlExecutionError, SqlExecutor, TargetTable, TransformGateway,
    UTF8_LABEL, ensure_table_exists, merge_all, merge_into, synthesize,
};

pub use shpload_data::{
    DEFAULT_BATCH_SIZE, LoadOptions, LoadReport, MIN_MERGE_INPUTS, MergeError, MergeReport,
    PrjCrsEngine, ReprojectionMode, ShapefileComponents, ShapefileSource, TextCorrector, load,
    load_from_source, load_report, merge_shapefiles, read_layer, to_feature_collection,
};

#[cfg(feature = "store-postgres")]
pub use shpload_data::PostgresExecutor;

#[cfg(feature = "test-support")]
pub use shpload_core::test_support;
