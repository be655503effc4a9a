//! Writing a merged layer as an ESRI shapefile.
//!
//! The attribute table mirrors the first source's fields and is encoded as
//! UTF-8, with a `.cpg` sidecar declaring it. The first source's `.prj` is
//! copied next to the output.

use std::collections::HashSet;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use geo::{Geometry, MultiPolygon};
use log::{debug, warn};
use shapefile::dbase::{
    self, FieldIOError, FieldName, FieldType, FieldWriter, TableWriterBuilder, WritableRecord,
};
use shapefile::{Polygon, Writer};
use shpload_core::geometry::to_multi_polygon;
use shpload_core::{AttributeValue, Attributes, DbfDate, FieldDefinition, IngestError, MergeSet};
use shpload_fs::{ensure_parent_dir, read_bytes, write_bytes};

use crate::merge::MergeError;

const FIELD_NAME_BYTES: usize = 10;
const MAX_CHARACTER_LENGTH: usize = 254;
const OUTPUT_ENCODING: &str = "UTF-8";

/// Parts of the first source the output shapefile copies.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct OutputTemplate {
    pub(crate) field_types: Vec<Option<FieldType>>,
    pub(crate) prj: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Character,
    Numeric,
    Integer,
    Double,
    Date,
    Logical,
}

impl ColumnKind {
    const fn of(field_type: Option<FieldType>) -> Self {
        match field_type {
            Some(FieldType::Numeric | FieldType::Float) => Self::Numeric,
            Some(FieldType::Integer) => Self::Integer,
            Some(FieldType::Double) => Self::Double,
            Some(FieldType::Date) => Self::Date,
            Some(FieldType::Logical) => Self::Logical,
            _ => Self::Character,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OutputColumn {
    source: String,
    name: String,
    kind: ColumnKind,
    length: u8,
    decimals: u8,
}

fn clamp_u8(value: usize) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}

/// Longest prefix of `text` that fits in `max` bytes without splitting a
/// character.
fn truncate_bytes(text: &str, max: usize) -> &str {
    let end = text
        .char_indices()
        .map(|(start, c)| start + c.len_utf8())
        .take_while(|end| *end <= max)
        .last()
        .unwrap_or(0);
    text.get(..end).unwrap_or_default()
}

/// dBase names for `fields`, shortened to fit and made unique.
fn output_names(fields: &[FieldDefinition]) -> Vec<String> {
    let mut taken = HashSet::new();
    fields
        .iter()
        .map(|field| {
            let source = field.name();
            let mut name = truncate_bytes(source, FIELD_NAME_BYTES).to_owned();
            let mut suffix = 1_u32;
            while !taken.insert(name.to_uppercase()) {
                let tag = format!("_{suffix}");
                let room = FIELD_NAME_BYTES.saturating_sub(tag.len());
                name = format!("{}{tag}", truncate_bytes(source, room));
                suffix += 1;
            }
            if name != source {
                warn!("field {source} is written as {name}");
            }
            name
        })
        .collect()
}

fn text_value(value: &AttributeValue) -> Option<String> {
    match value {
        AttributeValue::Null => None,
        AttributeValue::Text(text) | AttributeValue::Number(text) => Some(text.clone()),
        AttributeValue::Boolean(flag) => Some(if *flag { "T" } else { "F" }.to_owned()),
        AttributeValue::Date(date) => Some(date.to_string()),
    }
}

fn number_value(value: &AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::Text(text) => text.trim().parse().ok(),
        other => other.as_f64(),
    }
}

fn date_value(value: &AttributeValue) -> Option<dbase::Date> {
    match value {
        AttributeValue::Date(DbfDate { year, month, day })
            if *year <= 9999 && (1..=12).contains(month) && (1..=31).contains(day) =>
        {
            Some(dbase::Date::new(u32::from(*day), u32::from(*month), u32::from(*year)))
        }
        AttributeValue::Text(text) => DbfDate::parse_yyyymmdd(text)
            .map(AttributeValue::Date)
            .as_ref()
            .and_then(date_value),
        _ => None,
    }
}

fn logical_value(value: &AttributeValue) -> Option<bool> {
    match value {
        AttributeValue::Boolean(flag) => Some(*flag),
        _ => None,
    }
}

/// Columns of the output table. Character widths grow to hold the UTF-8
/// form of every value, up to the dBase limit.
fn output_columns(merged: &MergeSet, template: &OutputTemplate) -> Vec<OutputColumn> {
    let fields = merged.fields();
    let names = output_names(fields);
    fields
        .iter()
        .zip(names)
        .enumerate()
        .map(|(index, (field, name))| {
            let kind = ColumnKind::of(template.field_types.get(index).copied().flatten());
            let declared = usize::from(field.length());
            let length = match kind {
                ColumnKind::Character => merged
                    .features()
                    .iter()
                    .filter_map(|feature| feature.attributes.get(field.name()))
                    .filter_map(text_value)
                    .map(|text| text.len())
                    .fold(declared, usize::max)
                    .clamp(1, MAX_CHARACTER_LENGTH),
                _ => declared,
            };
            OutputColumn {
                source: field.name().to_owned(),
                name,
                kind,
                length: clamp_u8(length),
                decimals: clamp_u8(usize::from(field.decimal_places())),
            }
        })
        .collect()
}

fn table_builder(columns: &[OutputColumn]) -> Result<TableWriterBuilder, MergeError> {
    columns
        .iter()
        .try_fold(TableWriterBuilder::new(), |builder, column| {
            let name = FieldName::try_from(column.name.as_str()).map_err(|reason| {
                MergeError::FieldName {
                    name: column.name.clone(),
                    reason,
                }
            })?;
            Ok(match column.kind {
                ColumnKind::Character => builder.add_character_field(name, column.length),
                ColumnKind::Numeric => {
                    builder.add_numeric_field(name, column.length, column.decimals)
                }
                ColumnKind::Integer => builder.add_integer_field(name),
                ColumnKind::Double => builder.add_double_field(name),
                ColumnKind::Date => builder.add_date_field(name),
                ColumnKind::Logical => builder.add_logical_field(name),
            })
        })
}

struct OutputRecord<'a> {
    columns: &'a [OutputColumn],
    attributes: &'a Attributes,
}

impl WritableRecord for OutputRecord<'_> {
    fn write_using<'w, W: Write>(
        &self,
        field_writer: &mut FieldWriter<'w, W>,
    ) -> Result<(), FieldIOError> {
        for column in self.columns {
            let value = self
                .attributes
                .get(&column.source)
                .unwrap_or(&AttributeValue::Null);
            match column.kind {
                ColumnKind::Character => field_writer.write_next_field_value(&text_value(value))?,
                ColumnKind::Numeric => field_writer.write_next_field_value(&number_value(value))?,
                ColumnKind::Integer => {
                    let number = text_value(value).and_then(|text| text.trim().parse().ok());
                    field_writer.write_next_field_value(&number.unwrap_or(0_i32))?;
                }
                ColumnKind::Double => {
                    field_writer.write_next_field_value(&number_value(value).unwrap_or(0.0))?;
                }
                ColumnKind::Date => field_writer.write_next_field_value(&date_value(value))?,
                ColumnKind::Logical => field_writer.write_next_field_value(&logical_value(value))?,
            }
        }
        Ok(())
    }
}

/// Polygon record for `geometry`, or `None` when it has no area to write.
fn output_shape(geometry: &Geometry<f64>) -> Result<Option<Polygon>, IngestError> {
    let polygons: Vec<_> = to_multi_polygon(geometry)?
        .into_iter()
        .filter(|polygon| polygon.exterior().0.len() >= 4)
        .collect();
    if polygons.is_empty() {
        return Ok(None);
    }
    Ok(Some(Polygon::from(MultiPolygon::new(polygons))))
}

fn shapefile_error(path: &Utf8Path) -> impl FnOnce(shapefile::Error) -> MergeError + '_ {
    move |source| MergeError::Shapefile {
        path: path.to_path_buf(),
        source,
    }
}

fn write_error(path: &Utf8Path) -> impl FnOnce(std::io::Error) -> MergeError + '_ {
    move |source| MergeError::Write {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `merged` to the shapefile at `output`, returning the number of
/// features written.
///
/// Features without a polygonal area have no polygon record and are left
/// out with a warning.
pub(crate) fn write_shapefile(
    output: &Utf8Path,
    merged: &MergeSet,
    template: &OutputTemplate,
) -> Result<usize, MergeError> {
    ensure_parent_dir(output).map_err(write_error(output))?;
    let columns = output_columns(merged, template);
    let mut writer =
        Writer::from_path(output, table_builder(&columns)?).map_err(shapefile_error(output))?;

    let mut written = 0;
    for feature in merged.features() {
        let shape = match &feature.geometry {
            Some(geometry) => output_shape(geometry)?,
            None => None,
        };
        let Some(shape) = shape else {
            continue;
        };
        let record = OutputRecord {
            columns: &columns,
            attributes: &feature.attributes,
        };
        writer
            .write_shape_and_record(&shape, &record)
            .map_err(shapefile_error(output))?;
        written += 1;
    }
    drop(writer);

    let skipped = merged.len() - written;
    if skipped > 0 {
        warn!("{skipped} features without polygon area were left out of {output}");
    }

    let cpg = output.with_extension("cpg");
    write_bytes(&cpg, OUTPUT_ENCODING.as_bytes()).map_err(write_error(&cpg))?;
    if let Some(prj) = &template.prj {
        let target = output.with_extension("prj");
        let text = read_bytes(prj).map_err(write_error(&target))?;
        write_bytes(&target, &text).map_err(write_error(&target))?;
    }
    debug!("wrote {written} features and {} fields to {output}", columns.len());
    Ok(written)
}
