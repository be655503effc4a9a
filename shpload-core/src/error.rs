//! Domain error taxonomy surfaced by the loader and the merge engine.

use thiserror::Error;

use crate::encoding::EncodingError;
use crate::geometry::GeometryError;
use crate::schema::SchemaError;
use crate::source::SourceError;
use crate::sql::SqlExecutionError;
use crate::transform::CoordinateTransformError;

/// Errors aborting an ingestion or merge call.
///
/// Batches flushed before the failure stay committed.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Opening or reading the source failed.
    #[error("source I/O failed")]
    Io(#[from] SourceError),
    /// The attribute encoding could not be applied.
    #[error("attribute encoding failed")]
    Encoding(#[from] EncodingError),
    /// The schema could not be derived or checked.
    #[error("schema synthesis failed")]
    Schema(#[from] SchemaError),
    /// Reprojection failed.
    #[error("coordinate transform failed")]
    CoordinateTransform(#[from] CoordinateTransformError),
    /// Geometry could not be parsed or processed.
    #[error("geometry processing failed")]
    Geometry(#[source] GeometryError),
    /// Merge met a non-polygonal geometry.
    #[error("merge supports polygons only, found {geometry_type}")]
    UnsupportedGeometry {
        /// Type tag of the rejected geometry.
        geometry_type: &'static str,
    },
    /// DDL or a batch insert failed.
    #[error("SQL execution failed")]
    SqlExecution(#[from] SqlExecutionError),
    /// Merge was given fewer sources than it needs.
    #[error("merge requires at least {required} sources, got {actual}")]
    NotEnoughSources {
        /// Minimum number of sources.
        required: usize,
        /// Number supplied.
        actual: usize,
    },
}

impl From<GeometryError> for IngestError {
    fn from(err: GeometryError) -> Self {
        match err {
            GeometryError::Unsupported { geometry_type } => {
                Self::UnsupportedGeometry { geometry_type }
            }
            other => Self::Geometry(other),
        }
    }
}
