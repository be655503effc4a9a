//! Coordinate transform gateway in front of a CRS engine.

use geo::Geometry;
use log::debug;
use thiserror::Error;

/// Failure reported by a [`CrsEngine`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CrsEngineError {
    /// The coordinate system description could not be interpreted.
    #[error("cannot interpret coordinate system: {message}")]
    InvalidDescription {
        /// Engine message.
        message: String,
    },
    /// The engine has no transform between the two codes.
    #[error("no transform from EPSG:{source_srid} to EPSG:{target_srid}")]
    UnsupportedTransform {
        /// Source code.
        source_srid: i32,
        /// Target code.
        target_srid: i32,
    },
    /// A coordinate fell outside the domain of the transform.
    #[error("coordinate ({x}, {y}) is outside the transform domain")]
    OutOfDomain {
        /// Longitude or easting.
        x: f64,
        /// Latitude or northing.
        y: f64,
    },
}

/// External coordinate reference system engine.
pub trait CrsEngine {
    /// Resolve an EPSG code from a coordinate-system description such as ESRI
    /// WKT. `Ok(None)` means no code could be resolved.
    ///
    /// # Errors
    ///
    /// Returns [`CrsEngineError`] when the description is unusable.
    fn lookup_epsg(&self, description: &str) -> Result<Option<i32>, CrsEngineError>;

    /// Transform `geometry` from `source_srid` to `target_srid`.
    ///
    /// # Errors
    ///
    /// Returns [`CrsEngineError`] when no transform exists or a coordinate
    /// cannot be converted.
    fn transform(
        &self,
        geometry: &Geometry<f64>,
        source_srid: i32,
        target_srid: i32,
    ) -> Result<Geometry<f64>, CrsEngineError>;
}

/// Errors surfaced by the [`TransformGateway`].
#[derive(Debug, Error)]
pub enum CoordinateTransformError {
    /// No EPSG code could be looked up from the description.
    #[error("failed to resolve an EPSG code from the source coordinate system")]
    Lookup {
        /// Engine failure.
        #[source]
        source: CrsEngineError,
    },
    /// The description names a coordinate system no EPSG code is known for.
    #[error("no EPSG code is known for the source coordinate system {name}")]
    Unresolved {
        /// Coordinate-system name taken from the description.
        name: String,
    },
    /// Reprojection failed.
    #[error("failed to transform geometry from EPSG:{source_srid} to EPSG:{target_srid}")]
    Transform {
        /// Source code attempted.
        source_srid: i32,
        /// Target code attempted.
        target_srid: i32,
        /// Engine failure.
        #[source]
        source: CrsEngineError,
    },
}

/// Thin pass-through to a [`CrsEngine`].
///
/// # Examples
///
/// ```
/// use geo::{Geometry, Point};
/// use shpload_core::{CrsEngine, CrsEngineError, TransformGateway};
///
/// struct NoTransforms;
///
/// impl CrsEngine for NoTransforms {
///     fn lookup_epsg(&self, _: &str) -> Result<Option<i32>, CrsEngineError> {
///         Ok(None)
///     }
///
///     fn transform(&self, _: &Geometry<f64>, s: i32, t: i32) -> Result<Geometry<f64>, CrsEngineError> {
///         Err(CrsEngineError::UnsupportedTransform { source_srid: s, target_srid: t })
///     }
/// }
///
/// # fn main() -> Result<(), shpload_core::CoordinateTransformError> {
/// let gateway = TransformGateway::new(&NoTransforms);
/// let point = Geometry::Point(Point::new(116.4, 39.9));
/// assert_eq!(gateway.transform(&point, 4490, 4490)?, point);
/// assert!(gateway.transform(&point, 4326, 4490).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TransformGateway<'a, E: ?Sized> {
    engine: &'a E,
}

impl<'a, E: CrsEngine + ?Sized> TransformGateway<'a, E> {
    /// Wrap `engine`.
    pub const fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /// Transform `geometry`; identical codes return a copy without asking the
    /// engine.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateTransformError::Transform`] carrying both codes
    /// when the engine fails.
    pub fn transform(
        &self,
        geometry: &Geometry<f64>,
        source_srid: i32,
        target_srid: i32,
    ) -> Result<Geometry<f64>, CoordinateTransformError> {
        if source_srid == target_srid {
            return Ok(geometry.clone());
        }
        self.engine
            .transform(geometry, source_srid, target_srid)
            .map_err(|source| CoordinateTransformError::Transform {
                source_srid,
                target_srid,
                source,
            })
    }

    /// Resolve the EPSG code for a coordinate-system description.
    ///
    /// Blank descriptions and non-positive codes resolve to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateTransformError::Lookup`] when the engine fails.
    pub fn lookup_srid(&self, description: &str) -> Result<Option<i32>, CoordinateTransformError> {
        if description.trim().is_empty() {
            return Ok(None);
        }
        let srid = self
            .engine
            .lookup_epsg(description)
            .map_err(|source| CoordinateTransformError::Lookup { source })?
            .filter(|code| *code > 0);
        debug!("resolved source SRID {srid:?}");
        Ok(srid)
    }
}

/// Name of the coordinate system a WKT description declares, or the trimmed
/// description when it carries no quoted name.
///
/// ```
/// use shpload_core::transform::crs_name;
///
/// let prj = r#"PROJCS["Beijing_1954_3_Degree_GK_CM_117E",GEOGCS["GCS_Beijing_1954"]]"#;
/// assert_eq!(crs_name(prj), "Beijing_1954_3_Degree_GK_CM_117E");
/// assert_eq!(crs_name(" EPSG:2435 "), "EPSG:2435");
/// ```
#[must_use]
pub fn crs_name(description: &str) -> &str {
    description
        .split('"')
        .nth(1)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| description.trim())
}

/// SQL expression building a geometry from a WKT placeholder in
/// `target_srid`, reprojecting from `source_srid` when the codes differ.
///
/// ```
/// use shpload_core::transform::spatial_expression;
///
/// assert_eq!(spatial_expression(None, 4490), "ST_GeomFromText(?, 4490)");
/// assert_eq!(
///     spatial_expression(Some(4326), 4490),
///     "ST_Transform(ST_GeomFromText(?, 4326), 4490)"
/// );
/// ```
#[must_use]
pub fn spatial_expression(source_srid: Option<i32>, target_srid: i32) -> String {
    match source_srid {
        Some(src) if src != target_srid => {
            format!("ST_Transform(ST_GeomFromText(?, {src}), {target_srid})")
        }
        _ => format!("ST_GeomFromText(?, {target_srid})"),
    }
}
