//! Batched bulk loading of a feature source into a PostGIS table.
//!
//! One pass over the source: resolve the spatial reference, synthesize and
//! ensure the target schema, then stream rows into fixed-size batches. The
//! source is disposed on every exit path. Batches flushed before a failure
//! stay committed.

use std::borrow::Cow;

use camino::Utf8Path;
use geo::Geometry;
use log::{debug, info, warn};
use shpload_core::geometry::to_wkt;
use shpload_core::transform::{crs_name, spatial_expression};
use shpload_core::{
    AttributeValue, BindValue, CANONICAL_SRID, CoordinateTransformError, CrsEngine,
    FeatureSource, IngestError,
    SourceFeature, SqlExecutionError, SqlExecutor, TargetTable, TransformGateway,
    ensure_table_exists, synthesize,
};

use crate::crs::PrjCrsEngine;
use crate::source::{ShapefileSource, into_ingest_error};
use crate::text::TextCorrector;


/// Rows per executed batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Where geometries are reprojected when the source SRID differs from the
/// target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReprojectionMode {
    /// Wrap the geometry expression in `ST_Transform`.
    #[default]
    Database,
    /// Transform each geometry through the CRS engine before binding.
    InProcess,
}

/// Per-call loader configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    table: String,
    sequence: Option<String>,
    encoding_override: Option<String>,
    batch_size: usize,
    target_srid: i32,
    reprojection: ReprojectionMode,
}

impl LoadOptions {
    /// Options loading into `table` with defaults for everything else.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            sequence: None,
            encoding_override: None,
            batch_size: DEFAULT_BATCH_SIZE,
            target_srid: CANONICAL_SRID,
            reprojection: ReprojectionMode::default(),
        }
    }

    /// Use `sequence` for the primary key instead of `<table>_seq`.
    #[must_use]
    pub fn with_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.sequence = Some(sequence.into());
        self
    }

    /// Force the attribute encoding, ignoring any `.cpg` hint.
    #[must_use]
    pub fn with_encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding_override = Some(label.into());
        self
    }

    /// Rows per batch; zero is treated as one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// SRID of the stored geometries.
    #[must_use]
    pub const fn with_target_srid(mut self, srid: i32) -> Self {
        self.target_srid = srid;
        self
    }

    /// Choose where reprojection happens.
    #[must_use]
    pub const fn with_reprojection(mut self, mode: ReprojectionMode) -> Self {
        self.reprojection = mode;
        self
    }

    /// Target table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Explicit sequence name, if any.
    #[must_use]
    pub fn sequence(&self) -> Option<&str> {
        self.sequence.as_deref()
    }

    /// Forced encoding label, if any.
    #[must_use]
    pub fn encoding_override(&self) -> Option<&str> {
        self.encoding_override.as_deref()
    }

    /// Rows per batch.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// SRID of the stored geometries.
    #[must_use]
    pub const fn target_srid(&self) -> i32 {
        self.target_srid
    }

    /// Reprojection mode.
    #[must_use]
    pub const fn reprojection(&self) -> ReprojectionMode {
        self.reprojection
    }
}

/// Outcome of a completed load.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadReport {
    /// Features read from the source, including those without geometry.
    pub rows: u64,
    /// Batches handed to the executor.
    pub batches: usize,
    /// SRID resolved from the source, if any.
    pub source_srid: Option<i32>,
    /// Declared or detected attribute encoding, if any.
    pub encoding: Option<String>,
}

/// Disposes the wrapped source when dropped.
struct DisposeOnDrop<S: FeatureSource>(S);

impl<S: FeatureSource> Drop for DisposeOnDrop<S> {
    fn drop(&mut self) {
        self.0.dispose();
    }
}

/// Load the shapefile at `path` and return the number of rows read.
///
/// # Examples
/// ```no_run
/// # #[cfg(feature = "store-postgres")]
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use camino::Utf8Path;
/// use shpload_data::{LoadOptions, PostgresExecutor, load};
///
/// let executor = PostgresExecutor::connect("postgres://localhost/gis")?;
/// let rows = load(Utf8Path::new("parcels.shp"), executor, &LoadOptions::new("parcels"))?;
/// println!("imported {rows} features");
/// # Ok(())
/// # }
/// # #[cfg(not(feature = "store-postgres"))]
/// # fn main() {}
/// ```
///
/// # Errors
///
/// Returns [`IngestError`] when the source cannot be opened, the schema
/// cannot be ensured, a geometry cannot be encoded, or a batch fails.
pub fn load<E: SqlExecutor>(
    path: &Utf8Path,
    executor: E,
    options: &LoadOptions,
) -> Result<u64, IngestError> {
    load_report(path, executor, options).map(|report| report.rows)
}

/// Like [`load`] but returns the full [`LoadReport`].
///
/// # Errors
///
/// See [`load`].
pub fn load_report<E: SqlExecutor>(
    path: &Utf8Path,
    executor: E,
    options: &LoadOptions,
) -> Result<LoadReport, IngestError> {
    let source =
        ShapefileSource::open(path, options.encoding_override()).map_err(into_ingest_error)?;
    load_from_source(source, executor, &PrjCrsEngine::new(), options)
}

struct RowEncoder<'a, C: ?Sized> {
    table: &'a TargetTable,
    gateway: TransformGateway<'a, C>,
    in_process_from: Option<i32>,
    target_srid: i32,
}

impl<C: CrsEngine + ?Sized> RowEncoder<'_, C> {
    fn geometry(&self, geometry: Option<&Geometry<f64>>) -> Result<BindValue, IngestError> {
        let Some(geometry) = geometry else {
            return Ok(BindValue::Null);
        };
        let geometry = match self.in_process_from {
            Some(src) => Cow::Owned(self.gateway.transform(geometry, src, self.target_srid)?),
            None => Cow::Borrowed(geometry),
        };
        Ok(BindValue::Text(to_wkt(&geometry)))
    }

    fn encode(&self, feature: &SourceFeature) -> Result<Vec<BindValue>, IngestError> {
        self.table
            .columns()
            .iter()
            .map(|column| {
                if column.is_geometry() {
                    return self.geometry(feature.geometry.as_ref());
                }
                let key = column.source_name().unwrap_or_else(|| column.name());
                Ok(feature
                    .attributes
                    .get(key)
                    .map_or_else(|| BindValue::Text(String::new()), AttributeValue::to_bind))
            })
            .collect()
    }
}

fn flush<E: SqlExecutor + ?Sized>(
    executor: &mut E,
    sql: &str,
    batch: &mut Vec<Vec<BindValue>>,
) -> Result<(), IngestError> {
    executor
        .execute_batch(sql, batch)
        .map_err(|source| SqlExecutionError::Batch {
            rows: batch.len(),
            source,
        })?;
    debug!("flushed batch of {} rows", batch.len());
    batch.clear();
    Ok(())
}

/// Look up the EPSG code of a declared coordinate system.
///
/// A description with no known code cannot be reprojected in process, so
/// that mode fails. The database mode warns and tags geometries with the
/// target SRID as they are.
fn resolve_source_srid<C: CrsEngine + ?Sized>(
    gateway: &TransformGateway<'_, C>,
    description: &str,
    mode: ReprojectionMode,
    target_srid: i32,
) -> Result<Option<i32>, IngestError> {
    let srid = gateway.lookup_srid(description)?;
    if srid.is_some() || description.trim().is_empty() {
        return Ok(srid);
    }
    let name = crs_name(description);
    match mode {
        ReprojectionMode::InProcess => Err(CoordinateTransformError::Unresolved {
            name: name.to_owned(),
        }
        .into()),
        ReprojectionMode::Database => {
            warn!(
                "no EPSG code found for coordinate system {name}; geometries are stored as EPSG:{target_srid} without reprojection"
            );
            Ok(None)
        }
    }
}

/// Load an already opened source using `crs` for SRID lookup and in-process
/// reprojection.
///
/// `source` is disposed before returning, whatever the outcome.
///
/// # Errors
///
/// See [`load`].
pub fn load_from_source<S, E, C>(
    source: S,
    mut executor: E,
    crs: &C,
    options: &LoadOptions,
) -> Result<LoadReport, IngestError>
where
    S: FeatureSource,
    E: SqlExecutor,
    C: CrsEngine + ?Sized,
{
    let mut source = DisposeOnDrop(source);
    let gateway = TransformGateway::new(crs);
    let target_srid = options.target_srid();

    let source_srid = match source.0.crs_description() {
        Some(description) => {
            resolve_source_srid(&gateway, description, options.reprojection(), target_srid)?
        }
        None => None,
    };
    let reproject_from = source_srid.filter(|srid| *srid != target_srid);

    let columns = synthesize(source.0.fields(), &[source.0.geometry_field()])?;
    let table = TargetTable::new(
        options.table(),
        options.sequence().map(str::to_owned),
        columns,
    )?;
    ensure_table_exists(&table, &mut executor)?;

    let mut corrector =
        TextCorrector::new(options.encoding_override().or(source.0.encoding_hint()))?;

    let (expression, in_process_from) = match options.reprojection() {
        ReprojectionMode::Database => (spatial_expression(reproject_from, target_srid), None),
        ReprojectionMode::InProcess => (spatial_expression(None, target_srid), reproject_from),
    };
    let sql = table.insert_sql(&expression);
    debug!("{sql}");

    let encoder = RowEncoder {
        table: &table,
        gateway,
        in_process_from,
        target_srid,
    };
    let batch_size = options.batch_size();
    let mut batch = Vec::with_capacity(batch_size);
    let mut report = LoadReport {
        source_srid,
        ..LoadReport::default()
    };

    for feature in source.0.features().map_err(into_ingest_error)? {
        let mut feature = feature.map_err(into_ingest_error)?;
        report.rows += 1;
        corrector.correct(&mut feature.attributes)?;
        batch.push(encoder.encode(&feature)?);
        if batch.len() >= batch_size {
            flush(&mut executor, &sql, &mut batch)?;
            report.batches += 1;
        }
    }
    if !batch.is_empty() {
        flush(&mut executor, &sql, &mut batch)?;
        report.batches += 1;
    }

    report.encoding = corrector.label().map(str::to_owned);
    info!(
        "imported {} features into {} in {} batches",
        report.rows,
        table.name(),
        report.batches
    );
    Ok(report)
}
