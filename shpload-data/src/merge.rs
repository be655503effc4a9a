//! Merging polygon shapefiles into one overlap-free layer.
//!
//! The merged layer is written as a shapefile, or as a GeoJSON feature
//! collection when the output path ends in `.geojson` or `.json`.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use log::{debug, info, warn};
use shpload_core::{
    AttributeValue, Attributes, FeatureSource, IngestError, MergeSet, SourceLayer,
    TransformGateway, merge_all,
};
use shpload_fs::write_bytes;
use thiserror::Error;

use crate::crs::PrjCrsEngine;
use crate::source::{ShapefileSource, into_ingest_error};
use crate::text::TextCorrector;
use crate::writer::{OutputTemplate, write_shapefile};

/// Minimum number of inputs a file merge accepts.
pub const MIN_MERGE_INPUTS: usize = 2;

/// Errors raised by [`merge_shapefiles`].
#[derive(Debug, Error)]
pub enum MergeError {
    /// Reading or merging the inputs failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),
    /// The output file could not be written.
    #[error("failed to write {path}")]
    Write {
        /// Output path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The output shapefile could not be written.
    #[error("failed to write shapefile {path}")]
    Shapefile {
        /// Output `.shp` path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: shapefile::Error,
    },
    /// A field name cannot be stored in the output attribute table.
    #[error("field {name} cannot be written: {reason}")]
    FieldName {
        /// Output field name.
        name: String,
        /// Why the name was refused.
        reason: &'static str,
    },
    /// The merged layer could not be serialized.
    #[error("failed to serialize merged features")]
    Serialize(#[from] serde_json::Error),
}

/// Summary of a completed merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Number of input shapefiles.
    pub inputs: usize,
    /// Features read across all inputs.
    pub input_features: usize,
    /// Features written.
    pub output_features: usize,
    /// Shapefile or GeoJSON file written.
    pub output: Utf8PathBuf,
}

/// Read every feature of the shapefile at `path` with its text corrected.
///
/// Features carry the EPSG code resolved from the `.prj`, when there is one.
///
/// # Errors
///
/// Returns [`IngestError`] when the shapefile cannot be read.
pub fn read_layer(path: &Utf8Path) -> Result<SourceLayer, IngestError> {
    read_layer_with_template(path).map(|(layer, _)| layer)
}

fn read_layer_with_template(
    path: &Utf8Path,
) -> Result<(SourceLayer, OutputTemplate), IngestError> {
    let mut source = ShapefileSource::open(path, None).map_err(into_ingest_error)?;
    let mut corrector = TextCorrector::new(source.encoding_hint())?;
    let fields = source.fields().to_vec();
    let template = OutputTemplate {
        field_types: source.field_types().to_vec(),
        prj: source.components().prj.clone(),
    };
    let srid = match source.crs_description() {
        Some(description) => {
            TransformGateway::new(&PrjCrsEngine::new()).lookup_srid(description)?
        }
        None => None,
    };
    let mut features = Vec::new();
    for feature in source.features().map_err(into_ingest_error)? {
        let mut feature = feature.map_err(into_ingest_error)?;
        corrector.correct(&mut feature.attributes)?;
        features.push(feature.with_srid(srid));
    }
    source.dispose();
    debug!("read {} features from {path}", features.len());
    Ok((SourceLayer::new(fields, features), template))
}

fn layer_srid(layer: &SourceLayer) -> Option<i32> {
    layer.features.iter().find_map(|feature| feature.srid)
}

/// Read the inputs in order, keeping the first one's output template.
fn read_layers(
    paths: &[Utf8PathBuf],
) -> Result<(Vec<SourceLayer>, OutputTemplate), IngestError> {
    if paths.len() < MIN_MERGE_INPUTS {
        return Err(IngestError::NotEnoughSources {
            required: MIN_MERGE_INPUTS,
            actual: paths.len(),
        });
    }
    let mut template = None;
    let mut layers: Vec<SourceLayer> = Vec::with_capacity(paths.len());
    for path in paths {
        let (layer, layer_template) = read_layer_with_template(path)?;
        match (layers.first().and_then(layer_srid), layer_srid(&layer)) {
            (Some(first), Some(srid)) if first != srid => warn!(
                "{path} is EPSG:{srid} but the first source is EPSG:{first}; merging without reprojection"
            ),
            _ => {}
        }
        template.get_or_insert(layer_template);
        layers.push(layer);
    }
    Ok((layers, template.unwrap_or_default()))
}

fn property(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Text(text) => JsonValue::String(text.clone()),
        AttributeValue::Number(text) => text
            .parse::<serde_json::Number>()
            .map_or_else(|_| JsonValue::String(text.clone()), JsonValue::Number),
        AttributeValue::Boolean(flag) => JsonValue::Bool(*flag),
        AttributeValue::Date(date) => JsonValue::String(date.to_string()),
    }
}

fn properties(attributes: &Attributes) -> JsonObject {
    attributes
        .iter()
        .map(|(name, value)| (name.to_owned(), property(value)))
        .collect()
}

/// GeoJSON view of a merged set, carrying the first source's attributes.
#[must_use]
pub fn to_feature_collection(merged: &MergeSet) -> FeatureCollection {
    let features = merged
        .features()
        .iter()
        .map(|feature| Feature {
            bbox: None,
            geometry: feature
                .geometry
                .as_ref()
                .map(|geometry| geojson::Geometry::new(geojson::Value::from(geometry))),
            id: None,
            properties: Some(properties(&feature.attributes)),
            foreign_members: None,
        })
        .collect();
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn writes_geojson(output: &Utf8Path) -> bool {
    output
        .extension()
        .is_some_and(|ext| {
            ext.eq_ignore_ascii_case("geojson") || ext.eq_ignore_ascii_case("json")
        })
}

fn write_geojson(output: &Utf8Path, merged: &MergeSet) -> Result<(), MergeError> {
    let bytes = serde_json::to_vec_pretty(&to_feature_collection(merged))?;
    write_bytes(output, &bytes).map_err(|source| MergeError::Write {
        path: output.to_path_buf(),
        source,
    })
}

/// Merge the shapefiles at `paths` and write the result to `output`.
///
/// The output is a shapefile carrying the first input's fields and `.prj`,
/// with its attribute table in UTF-8. A `.geojson` or `.json` output is
/// written as a GeoJSON feature collection instead. Any other extension is
/// replaced with `.shp`.
///
/// # Examples
/// ```no_run
/// use camino::{Utf8Path, Utf8PathBuf};
/// use shpload_data::merge_shapefiles;
///
/// # fn main() -> Result<(), shpload_data::MergeError> {
/// let inputs = [Utf8PathBuf::from("zoning_a.shp"), Utf8PathBuf::from("zoning_b.shp")];
/// let report = merge_shapefiles(&inputs, Utf8Path::new("zoning.shp"))?;
/// println!("{} features written to {}", report.output_features, report.output);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns [`MergeError`] when reading, merging, or writing fails.
pub fn merge_shapefiles(
    paths: &[Utf8PathBuf],
    output: &Utf8Path,
) -> Result<MergeReport, MergeError> {
    let (layers, template) = read_layers(paths)?;
    let input_features = layers.iter().map(|layer| layer.features.len()).sum();
    let merged = merge_all(layers)?;

    let (output, output_features) = if writes_geojson(output) {
        write_geojson(output, &merged)?;
        (output.to_path_buf(), merged.len())
    } else {
        let shp = output.with_extension("shp");
        let written = write_shapefile(&shp, &merged, &template)?;
        (shp, written)
    };
    info!(
        "merged {input_features} features from {} sources into {output_features} features at {output}",
        paths.len()
    );
    Ok(MergeReport {
        inputs: paths.len(),
        input_features,
        output_features,
        output,
    })
}
