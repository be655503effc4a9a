//! [`FeatureSource`] over a shapefile component set on disk.

use std::fs::File;
use std::io::{self, BufReader};

use camino::{Utf8Path, Utf8PathBuf};
use encoding_rs::{Encoding, GBK};
use geo::Geometry;
use log::debug;
use shapefile::dbase::FieldType;
use shapefile::{Shape, ShapeReader};
use shpload_core::encoding::encoding_for_label;
use shpload_core::{
    Attributes, FeatureSource, FeatureStream, FieldDefinition, IngestError, SourceError,
    SourceFeature,
};
use shpload_fs::{open_std_file, read_first_line, read_optional_text};

use crate::components::ShapefileComponents;
use crate::dbf::DbfReader;

fn io_error(path: &Utf8Path, source: io::Error) -> SourceError {
    SourceError::Io {
        path: path.as_std_path().to_path_buf(),
        source,
    }
}

fn malformed(path: &Utf8Path, message: impl Into<String>) -> SourceError {
    SourceError::Malformed {
        path: path.as_std_path().to_path_buf(),
        message: message.into(),
    }
}

/// Map source failures onto the domain kind they describe.
pub(crate) fn into_ingest_error(err: SourceError) -> IngestError {
    match err {
        SourceError::Encoding(err) => IngestError::Encoding(err),
        SourceError::Schema(err) => IngestError::Schema(err),
        other => IngestError::Io(other),
    }
}

/// An opened shapefile.
///
/// Opening reads the attribute header, the `.prj` text and the encoding
/// hint. Records and shapes are streamed by [`FeatureSource::features`].
pub struct ShapefileSource {
    components: ShapefileComponents,
    fields: Vec<FieldDefinition>,
    field_types: Vec<Option<FieldType>>,
    crs: Option<String>,
    hint: Option<String>,
    encoding: Option<&'static Encoding>,
    shapes: Option<ShapeReader<BufReader<File>>>,
}

impl std::fmt::Debug for ShapefileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapefileSource")
            .field("components", &self.components)
            .field("fields", &self.fields)
            .field("hint", &self.hint)
            .field("streaming", &self.shapes.is_some())
            .finish_non_exhaustive()
    }
}

impl ShapefileSource {
    /// Open the shapefile at `path`.
    ///
    /// `encoding_override` takes precedence over the `.cpg` sidecar.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when a component is missing or unreadable,
    /// the encoding label is unknown, or the attribute header is invalid.
    pub fn open(path: &Utf8Path, encoding_override: Option<&str>) -> Result<Self, SourceError> {
        let components = ShapefileComponents::resolve(path)?;
        let hint = match encoding_override.map(str::trim).filter(|s| !s.is_empty()) {
            Some(label) => Some(label.to_owned()),
            None => match &components.cpg {
                Some(cpg) => read_first_line(cpg).map_err(|source| io_error(cpg, source))?,
                None => None,
            },
        };
        let encoding = hint.as_deref().map(encoding_for_label).transpose()?;

        let header = {
            let file = open_std_file(&components.dbf)
                .map_err(|source| io_error(&components.dbf, source))?;
            DbfReader::new(BufReader::new(file), encoding, GBK, &components.dbf)?.into_header()
        };

        let crs = match &components.prj {
            Some(prj) => read_optional_text(prj)
                .map_err(|source| io_error(prj, source))?
                .map(|text| text.trim().to_owned())
                .filter(|text| !text.is_empty()),
            None => None,
        };

        debug!(
            "opened {} with {} fields and {} records",
            components.shp,
            header.fields.len(),
            header.record_count
        );
        Ok(Self {
            components,
            field_types: header.field_types(),
            fields: header.fields,
            crs,
            hint,
            encoding,
            shapes: None,
        })
    }

    /// Component files backing this source.
    #[must_use]
    pub const fn components(&self) -> &ShapefileComponents {
        &self.components
    }

    /// DBF type of each field, `None` where the tag is not a known type.
    pub(crate) fn field_types(&self) -> &[Option<FieldType>] {
        &self.field_types
    }
}

type RecordItem = Result<Option<Attributes>, SourceError>;
type ShapeItem = Result<Shape, shapefile::Error>;

/// Pairs attribute records with shapes in file order.
///
/// When one file runs out before the other the stream ends with a
/// [`SourceError::Malformed`] naming both counts.
struct Paired<R, S> {
    records: R,
    shapes: S,
    paired: usize,
    finished: bool,
    shp: Utf8PathBuf,
}

impl<R, S> Paired<R, S> {
    const fn new(records: R, shapes: S, shp: Utf8PathBuf) -> Self {
        Self {
            records,
            shapes,
            paired: 0,
            finished: false,
            shp,
        }
    }
}

impl<R, S> Iterator for Paired<R, S>
where
    R: Iterator<Item = RecordItem>,
    S: Iterator<Item = ShapeItem>,
{
    type Item = Result<(RecordItem, ShapeItem), SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match (self.records.next(), self.shapes.next()) {
            (Some(record), Some(shape)) => {
                self.paired += 1;
                Some(Ok((record, shape)))
            }
            (None, None) => {
                self.finished = true;
                None
            }
            (record, shape) => {
                self.finished = true;
                let records =
                    self.paired + usize::from(record.is_some()) + self.records.by_ref().count();
                let shapes =
                    self.paired + usize::from(shape.is_some()) + self.shapes.by_ref().count();
                Some(Err(malformed(
                    &self.shp,
                    format!("{records} attribute records but {shapes} shapes"),
                )))
            }
        }
    }
}

fn to_feature(
    shp: &Utf8Path,
    record: RecordItem,
    shape: ShapeItem,
) -> Result<Option<SourceFeature>, SourceError> {
    let Some(attributes) = record? else {
        return Ok(None);
    };
    let geometry = match shape.map_err(|err| malformed(shp, err.to_string()))? {
        Shape::NullShape => None,
        shape => Some(
            Geometry::<f64>::try_from(shape).map_err(|err| malformed(shp, err.to_string()))?,
        ),
    };
    Ok(Some(SourceFeature::new(attributes, geometry)))
}

impl FeatureSource for ShapefileSource {
    fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    fn crs_description(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    fn encoding_hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    fn features(&mut self) -> Result<FeatureStream<'_>, SourceError> {
        let dbf_path = &self.components.dbf;
        let dbf_file = open_std_file(dbf_path).map_err(|source| io_error(dbf_path, source))?;
        let records = DbfReader::new(BufReader::new(dbf_file), self.encoding, GBK, dbf_path)?;

        let shp: Utf8PathBuf = self.components.shp.clone();
        let shp_file = open_std_file(&shp).map_err(|source| io_error(&shp, source))?;
        let reader = ShapeReader::new(BufReader::new(shp_file))
            .map_err(|err| malformed(&shp, err.to_string()))?;
        let shapes = self.shapes.insert(reader);

        Ok(Box::new(
            Paired::new(records, shapes.iter_shapes(), shp.clone()).filter_map(move |pair| {
                pair.and_then(|(record, shape)| to_feature(&shp, record, shape))
                    .transpose()
            }),
        ))
    }

    fn dispose(&mut self) {
        if self.shapes.take().is_some() {
            debug!("closed {}", self.components.shp);
        }
    }
}
