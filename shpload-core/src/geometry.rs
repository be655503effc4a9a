//! Geometry helpers over `geo` types: WKT conversion, type tags, polygon
//! boolean operations and ring reversal.

use geo::{Area, BooleanOps, Geometry, LineString, MultiPolygon, Polygon};
use thiserror::Error;
use wkt::{ToWkt, TryFromWkt};

/// Errors raised by geometry helpers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// The WKT text could not be parsed.
    #[error("malformed WKT: {message}")]
    MalformedWkt {
        /// Parser message.
        message: String,
    },
    /// The operation only supports polygonal input.
    #[error("unsupported geometry type {geometry_type}")]
    Unsupported {
        /// Type tag of the rejected geometry.
        geometry_type: &'static str,
    },
}

/// Parse WKT into a geometry.
///
/// # Errors
///
/// Returns [`GeometryError::MalformedWkt`] when parsing fails.
///
/// ```
/// use shpload_core::geometry::{geometry_type, parse_wkt};
///
/// let g = parse_wkt("POLYGON((0 0,1 0,1 1,0 1,0 0))").expect("wkt");
/// assert_eq!(geometry_type(&g), "Polygon");
/// ```
pub fn parse_wkt(text: &str) -> Result<Geometry<f64>, GeometryError> {
    Geometry::<f64>::try_from_wkt_str(text).map_err(|err| GeometryError::MalformedWkt {
        message: err.to_string(),
    })
}

/// Serialize a geometry to WKT.
#[must_use]
pub fn to_wkt(geometry: &Geometry<f64>) -> String {
    geometry.wkt_string()
}

/// OGC type name of `geometry`.
#[must_use]
pub const fn geometry_type(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// View a polygonal geometry as a multi-polygon.
///
/// # Errors
///
/// Returns [`GeometryError::Unsupported`] for non-polygonal geometries.
pub fn to_multi_polygon(geometry: &Geometry<f64>) -> Result<MultiPolygon<f64>, GeometryError> {
    match geometry {
        Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon.clone()])),
        Geometry::MultiPolygon(multi) => Ok(multi.clone()),
        Geometry::Rect(rect) => Ok(MultiPolygon::new(vec![rect.to_polygon()])),
        Geometry::Triangle(triangle) => Ok(MultiPolygon::new(vec![triangle.to_polygon()])),
        other => Err(GeometryError::Unsupported {
            geometry_type: geometry_type(other),
        }),
    }
}

/// Union of two polygonal geometries.
///
/// # Errors
///
/// Returns [`GeometryError::Unsupported`] when either input is not polygonal.
pub fn union(a: &Geometry<f64>, b: &Geometry<f64>) -> Result<Geometry<f64>, GeometryError> {
    let lhs = to_multi_polygon(a)?;
    let rhs = to_multi_polygon(b)?;
    Ok(Geometry::MultiPolygon(lhs.union(&rhs)))
}

/// Intersection of two polygonal geometries.
///
/// # Errors
///
/// Returns [`GeometryError::Unsupported`] when either input is not polygonal.
pub fn intersection(a: &Geometry<f64>, b: &Geometry<f64>) -> Result<Geometry<f64>, GeometryError> {
    let lhs = to_multi_polygon(a)?;
    let rhs = to_multi_polygon(b)?;
    Ok(Geometry::MultiPolygon(lhs.intersection(&rhs)))
}

/// Intersect a polygonal geometry with itself, dropping slivers and
/// duplicate rings left behind by earlier unions.
///
/// # Errors
///
/// Returns [`GeometryError::Unsupported`] for non-polygonal input.
pub fn self_intersect(geometry: &Geometry<f64>) -> Result<Geometry<f64>, GeometryError> {
    intersection(geometry, geometry)
}

/// Planar area in squared coordinate units.
#[must_use]
pub fn area(geometry: &Geometry<f64>) -> f64 {
    geometry.unsigned_area()
}

fn reverse_line(line: &LineString<f64>) -> LineString<f64> {
    line.0.iter().rev().copied().collect()
}

fn reverse_polygon(polygon: &Polygon<f64>) -> Polygon<f64> {
    Polygon::new(
        reverse_line(polygon.exterior()),
        polygon.interiors().iter().map(reverse_line).collect(),
    )
}

/// Reverse the vertex order of every line and ring.
#[must_use]
pub fn reverse(geometry: &Geometry<f64>) -> Geometry<f64> {
    match geometry {
        Geometry::LineString(line) => Geometry::LineString(reverse_line(line)),
        Geometry::MultiLineString(lines) => {
            Geometry::MultiLineString(lines.iter().map(reverse_line).collect())
        }
        Geometry::Polygon(polygon) => Geometry::Polygon(reverse_polygon(polygon)),
        Geometry::MultiPolygon(multi) => {
            Geometry::MultiPolygon(multi.iter().map(reverse_polygon).collect())
        }
        Geometry::GeometryCollection(collection) => {
            Geometry::GeometryCollection(collection.iter().map(reverse).collect())
        }
        other => other.clone(),
    }
}
