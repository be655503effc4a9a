//! Polygon merge engine.
//!
//! Features are folded into a [`MergeSet`] one at a time. An incoming
//! polygon absorbs every accumulated feature it intersects (scanning from
//! the highest index down so removals never disturb unvisited entries) and
//! is appended with the combined geometry. Since the entries already in the
//! set are pairwise disjoint, a single scan leaves no two accumulated
//! geometries intersecting.

use geo::{Geometry, Intersects, MultiPolygon};
use log::{debug, warn};

use crate::error::IngestError;
use crate::feature::SourceFeature;
use crate::field::FieldDefinition;
use crate::geometry::{self, GeometryError, geometry_type};

/// Features read from one source together with its field layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceLayer {
    /// Attribute fields of the source.
    pub fields: Vec<FieldDefinition>,
    /// Features in source order.
    pub features: Vec<SourceFeature>,
}

impl SourceLayer {
    /// Bundle fields and features.
    #[must_use]
    pub const fn new(fields: Vec<FieldDefinition>, features: Vec<SourceFeature>) -> Self {
        Self { fields, features }
    }
}

/// Accumulator of merged features sharing one output schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeSet {
    fields: Vec<FieldDefinition>,
    features: Vec<SourceFeature>,
}

impl MergeSet {
    /// Empty accumulator with the given output schema.
    #[must_use]
    pub const fn new(fields: Vec<FieldDefinition>) -> Self {
        Self {
            fields,
            features: Vec::new(),
        }
    }

    /// Output schema.
    #[must_use]
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Accumulated features in insertion order.
    #[must_use]
    pub fn features(&self) -> &[SourceFeature] {
        &self.features
    }

    /// Number of accumulated features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the accumulator is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Consume the set, returning schema and features.
    #[must_use]
    pub fn into_parts(self) -> (Vec<FieldDefinition>, Vec<SourceFeature>) {
        (self.fields, self.features)
    }

    /// Union every intersecting entry into `candidate`, removing it from the
    /// set. Indices are visited from highest to lowest.
    fn absorb_intersecting(
        &mut self,
        mut candidate: Geometry<f64>,
    ) -> Result<Geometry<f64>, GeometryError> {
        for index in (0..self.features.len()).rev() {
            let merged = match self
                .features
                .get(index)
                .and_then(|existing| existing.geometry.as_ref())
            {
                Some(geom) if geom.intersects(&candidate) => {
                    normalize(&geometry::union(&candidate, geom)?)?
                }
                _ => continue,
            };
            self.features.remove(index);
            candidate = merged;
            debug!("absorbed accumulated feature {index}");
        }
        Ok(candidate)
    }
}

/// Clean up a union result and coerce it to a multi-polygon.
///
/// # Errors
///
/// Returns [`GeometryError::Unsupported`] for non-polygonal input.
pub fn normalize(candidate: &Geometry<f64>) -> Result<Geometry<f64>, GeometryError> {
    match geometry::self_intersect(candidate)? {
        multi @ Geometry::MultiPolygon(_) => Ok(multi),
        Geometry::Polygon(polygon) => Ok(Geometry::MultiPolygon(MultiPolygon::new(vec![polygon]))),
        other => Err(GeometryError::Unsupported {
            geometry_type: geometry_type(&other),
        }),
    }
}

/// Fold `features` into `accumulator` in source order.
///
/// Features without geometry are skipped. A feature that intersects nothing
/// is appended with its geometry untouched.
///
/// # Errors
///
/// Returns [`IngestError::UnsupportedGeometry`] when a union involves a
/// non-polygonal geometry. The accumulator keeps the features merged before
/// the failure.
pub fn merge_into(
    features: impl IntoIterator<Item = SourceFeature>,
    accumulator: &mut MergeSet,
) -> Result<(), IngestError> {
    for mut feature in features {
        let Some(candidate) = feature.geometry.take() else {
            debug!("skipping feature without geometry");
            continue;
        };
        feature.geometry = Some(accumulator.absorb_intersecting(candidate)?);
        accumulator.features.push(feature);
    }
    Ok(())
}

fn field_names(fields: &[FieldDefinition]) -> Vec<&str> {
    fields.iter().map(FieldDefinition::name).collect()
}

/// Merge ordered layers into one overlap-free set.
///
/// The first layer seeds the accumulator unchanged and fixes the output
/// schema. Later layers are projected onto that schema: missing attributes
/// become null and extra attributes are dropped.
///
/// # Errors
///
/// Returns [`IngestError::NotEnoughSources`] for an empty input and
/// propagates [`merge_into`] failures.
///
/// # Examples
///
/// ```
/// use geo::{Geometry, Rect, coord};
/// use shpload_core::{Attributes, SourceFeature, SourceLayer, merge_all};
///
/// # fn main() -> Result<(), shpload_core::IngestError> {
/// let square = |x: f64, y: f64, size: f64| {
///     let rect = Rect::new(coord! { x: x, y: y }, coord! { x: x + size, y: y + size });
///     SourceFeature::new(Attributes::new(), Some(Geometry::Polygon(rect.to_polygon())))
/// };
/// let merged = merge_all(vec![
///     SourceLayer::new(vec![], vec![square(0.0, 0.0, 2.0)]),
///     SourceLayer::new(vec![], vec![square(1.0, 1.0, 2.0)]),
/// ])?;
/// assert_eq!(merged.len(), 1);
/// # Ok(())
/// # }
/// ```
pub fn merge_all(layers: impl IntoIterator<Item = SourceLayer>) -> Result<MergeSet, IngestError> {
    let mut layers = layers.into_iter();
    let Some(first) = layers.next() else {
        return Err(IngestError::NotEnoughSources {
            required: 1,
            actual: 0,
        });
    };
    let mut accumulator = MergeSet {
        fields: first.fields,
        features: first.features,
    };
    let schema: Vec<String> = field_names(&accumulator.fields)
        .into_iter()
        .map(str::to_owned)
        .collect();

    for (offset, layer) in layers.enumerate() {
        let names = field_names(&layer.fields);
        if names != schema {
            warn!(
                "source {} fields {names:?} differ from output fields {schema:?}; \
                 projecting attributes onto the output fields",
                offset + 2
            );
        }
        let projected = layer.features.into_iter().map(|mut feature| {
            feature.attributes = feature
                .attributes
                .project(schema.iter().map(String::as_str));
            feature
        });
        let before = accumulator.len();
        merge_into(projected, &mut accumulator)?;
        debug!(
            "merged source {}: {before} -> {} features",
            offset + 2,
            accumulator.len()
        );
    }
    Ok(accumulator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{AttributeValue, Attributes};
    use crate::field::FieldKind;
    use geo::{Area, Coord, LineString, Point, Rect};
    use rstest::rstest;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> SourceFeature {
        let rect = Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 });
        SourceFeature::new(Attributes::new(), Some(Geometry::Polygon(rect.to_polygon())))
    }

    fn area_of(feature: &SourceFeature) -> f64 {
        feature.geometry.as_ref().map_or(0.0, |g| g.unsigned_area())
    }

    #[rstest]
    fn disjoint_squares_stay_separate() {
        let mut set = MergeSet::default();
        merge_into(
            [square(0.0, 0.0, 1.0, 1.0), square(5.0, 5.0, 6.0, 6.0)],
            &mut set,
        )
        .expect("merge");
        assert_eq!(set.len(), 2);
    }

    #[rstest]
    fn overlapping_squares_merge_into_one_multipolygon() {
        let mut set = MergeSet::default();
        merge_into(
            [square(0.0, 0.0, 2.0, 2.0), square(1.0, 1.0, 3.0, 3.0)],
            &mut set,
        )
        .expect("merge");
        let [merged] = set.features() else {
            panic!("expected a single feature, got {}", set.len());
        };
        assert!(matches!(merged.geometry, Some(Geometry::MultiPolygon(_))));
        assert!((area_of(merged) - 7.0).abs() < 1e-9);
    }

    #[rstest]
    fn non_intersecting_candidate_keeps_original_geometry() {
        let mut set = MergeSet::default();
        merge_into([square(0.0, 0.0, 1.0, 1.0)], &mut set).expect("merge");
        assert!(matches!(
            set.features().first().and_then(|f| f.geometry.as_ref()),
            Some(Geometry::Polygon(_))
        ));
    }

    #[rstest]
    fn null_geometries_are_skipped() {
        let mut set = MergeSet::default();
        let empty = SourceFeature::new(Attributes::new(), None);
        merge_into([empty, square(0.0, 0.0, 1.0, 1.0)], &mut set).expect("merge");
        assert_eq!(set.len(), 1);
    }

    #[rstest]
    fn bridging_feature_replaces_both_neighbours() {
        let mut set = MergeSet::default();
        merge_into(
            [
                square(0.0, 0.0, 1.0, 1.0),
                square(4.0, 0.0, 5.0, 1.0),
                square(20.0, 20.0, 21.0, 21.0),
            ],
            &mut set,
        )
        .expect("seed");
        merge_into([square(0.5, 0.0, 4.5, 0.5)], &mut set).expect("bridge");
        assert_eq!(set.len(), 2);
        let merged = set.features().last().expect("appended");
        assert!((area_of(merged) - 3.5).abs() < 1e-9);
    }

    #[rstest]
    fn non_polygon_union_fails() {
        let mut set = MergeSet::default();
        merge_into([square(0.0, 0.0, 2.0, 2.0)], &mut set).expect("seed");
        let line = SourceFeature::new(
            Attributes::new(),
            Some(Geometry::LineString(LineString::from(vec![
                (0.0, 0.0),
                (3.0, 3.0),
            ]))),
        );
        let err = merge_into([line], &mut set).expect_err("line must fail");
        assert!(matches!(
            err,
            IngestError::UnsupportedGeometry {
                geometry_type: "LineString"
            }
        ));
    }

    #[rstest]
    fn normalize_wraps_and_rejects() {
        let poly = square(0.0, 0.0, 1.0, 1.0).geometry.expect("geometry");
        assert!(matches!(
            normalize(&poly),
            Ok(Geometry::MultiPolygon(ref m)) if m.0.len() == 1
        ));
        let point = Geometry::Point(Point::new(0.0, 0.0));
        assert_eq!(
            normalize(&point),
            Err(GeometryError::Unsupported {
                geometry_type: "Point"
            })
        );
    }

    #[rstest]
    fn merge_all_requires_a_layer() {
        let err = merge_all(Vec::new()).expect_err("no layers");
        assert!(matches!(
            err,
            IngestError::NotEnoughSources {
                required: 1,
                actual: 0
            }
        ));
    }

    #[rstest]
    fn later_layers_are_projected_onto_first_schema() {
        let name = FieldDefinition::new("NAME", FieldKind::Character, 10, 0).expect("field");
        let code = FieldDefinition::new("CODE", FieldKind::Numeric, 4, 0).expect("field");
        let mut first = square(0.0, 0.0, 1.0, 1.0);
        first.attributes.insert("NAME", AttributeValue::from("a"));
        let mut second = square(10.0, 10.0, 11.0, 11.0);
        second.attributes.insert("CODE", AttributeValue::number("7"));

        let merged = merge_all([
            SourceLayer::new(vec![name], vec![first]),
            SourceLayer::new(vec![code], vec![second]),
        ])
        .expect("merge");

        let appended = merged.features().last().expect("appended feature");
        let keys: Vec<_> = appended.attributes.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["NAME"]);
        assert_eq!(appended.attributes.get("NAME"), Some(&AttributeValue::Null));
        assert_eq!(field_names(merged.fields()), ["NAME"]);
    }
}
