//! EPSG resolution from `.prj` files and the small set of transforms that
//! can be done without a projection library.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use geo::{Coord, Geometry, MapCoords};
use shpload_core::{CrsEngine, CrsEngineError};

/// Geographic CGCS2000.
pub const EPSG_CGCS2000: i32 = 4490;
/// Geographic WGS 84.
pub const EPSG_WGS84: i32 = 4326;
/// Web Mercator.
pub const EPSG_WEB_MERCATOR: i32 = 3857;

const EARTH_RADIUS: f64 = 6_378_137.0;
const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_6;

/// `CrsEngine` reading ESRI or OGC WKT from `.prj` files.
///
/// Lookup honours an explicit `AUTHORITY["EPSG", n]` on the outermost
/// definition and otherwise recognises CGCS2000 geographic and
/// Gauss-Krüger names, WGS 84 and Web Mercator. Transforms cover the
/// CGCS2000/WGS 84 identity and geographic to Web Mercator in both
/// directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrjCrsEngine;

impl PrjCrsEngine {
    /// Create the engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Value of the last `AUTHORITY["EPSG", n]` clause. OGC WKT nests the
/// outermost definition's authority last.
fn authority_code(description: &str) -> Option<i32> {
    let upper = description.to_ascii_uppercase();
    let start = upper.rfind("AUTHORITY[")?;
    let clause = upper.get(start + "AUTHORITY[".len()..)?;
    let end = clause.find(']')?;
    let mut parts = clause.get(..end)?.split(',');
    let authority = parts.next()?.trim().trim_matches('"');
    if authority != "EPSG" {
        return None;
    }
    parts.next()?.trim().trim_matches('"').parse().ok()
}

/// First quoted name following the top-level keyword.
fn definition_name(description: &str) -> Option<(&str, &str)> {
    let trimmed = description.trim_start();
    let open = trimmed.find('[')?;
    let keyword = trimmed.get(..open)?.trim();
    let rest = trimmed.get(open + 1..)?.trim_start().strip_prefix('"')?;
    let close = rest.find('"')?;
    Some((keyword, rest.get(..close)?))
}

fn parse_number(text: &str) -> Option<i32> {
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn gauss_kruger_code(name: &str) -> Option<i32> {
    let upper = name.to_ascii_uppercase().replace([' ', '-'], "_");
    if !upper.contains("CGCS2000") && !upper.contains("CGCS_2000") {
        return None;
    }
    if let Some(pos) = upper.find("3_DEGREE_GK_CM_") {
        let cm = parse_number(upper.get(pos + "3_DEGREE_GK_CM_".len()..)?)?;
        let steps = cm.checked_sub(75)?;
        return ((75..=135).contains(&cm) && steps % 3 == 0).then_some(4534 + steps / 3);
    }
    if let Some(pos) = upper.find("3_DEGREE_GK_ZONE_") {
        let zone = parse_number(upper.get(pos + "3_DEGREE_GK_ZONE_".len()..)?)?;
        return (25..=45).contains(&zone).then_some(4513 + zone - 25);
    }
    if let Some(pos) = upper.find("GK_CM_") {
        let cm = parse_number(upper.get(pos + "GK_CM_".len()..)?)?;
        let steps = cm.checked_sub(75)?;
        return ((75..=135).contains(&cm) && steps % 6 == 0).then_some(4502 + steps / 6);
    }
    if let Some(pos) = upper.find("GK_ZONE_") {
        let zone = parse_number(upper.get(pos + "GK_ZONE_".len()..)?)?;
        return (13..=23).contains(&zone).then_some(4491 + zone - 13);
    }
    None
}

fn named_code(keyword: &str, name: &str) -> Option<i32> {
    let normalized = name.to_ascii_uppercase().replace([' ', '-'], "_");
    if keyword.eq_ignore_ascii_case("PROJCS") {
        if normalized.contains("WEB_MERCATOR") || normalized.contains("PSEUDO_MERCATOR") {
            return Some(EPSG_WEB_MERCATOR);
        }
        return gauss_kruger_code(&normalized);
    }
    if normalized.contains("CHINA_GEODETIC_COORDINATE_SYSTEM_2000")
        || normalized.contains("CGCS2000")
    {
        return Some(EPSG_CGCS2000);
    }
    if normalized.contains("WGS_1984") || normalized == "WGS_84" {
        return Some(EPSG_WGS84);
    }
    None
}

const fn is_geographic(srid: i32) -> bool {
    matches!(srid, EPSG_CGCS2000 | EPSG_WGS84)
}

fn to_web_mercator(c: Coord<f64>) -> Result<Coord<f64>, CrsEngineError> {
    if !(-180.0..=180.0).contains(&c.x) || c.y.abs() > MAX_MERCATOR_LATITUDE {
        return Err(CrsEngineError::OutOfDomain { x: c.x, y: c.y });
    }
    let lat = c.y.to_radians();
    Ok(Coord {
        x: EARTH_RADIUS * c.x.to_radians(),
        y: EARTH_RADIUS * (FRAC_PI_4 + lat / 2.0).tan().ln(),
    })
}

fn from_web_mercator(c: Coord<f64>) -> Result<Coord<f64>, CrsEngineError> {
    if !c.x.is_finite() || !c.y.is_finite() {
        return Err(CrsEngineError::OutOfDomain { x: c.x, y: c.y });
    }
    Ok(Coord {
        x: (c.x / EARTH_RADIUS).to_degrees(),
        y: (2.0 * (c.y / EARTH_RADIUS).exp().atan() - FRAC_PI_2).to_degrees(),
    })
}

impl CrsEngine for PrjCrsEngine {
    fn lookup_epsg(&self, description: &str) -> Result<Option<i32>, CrsEngineError> {
        if let Some(code) = authority_code(description) {
            return Ok(Some(code));
        }
        let Some((keyword, name)) = definition_name(description) else {
            return Err(CrsEngineError::InvalidDescription {
                message: "expected a WKT coordinate system definition".to_owned(),
            });
        };
        Ok(named_code(keyword, name))
    }

    fn transform(
        &self,
        geometry: &Geometry<f64>,
        source_srid: i32,
        target_srid: i32,
    ) -> Result<Geometry<f64>, CrsEngineError> {
        match (source_srid, target_srid) {
            (src, dst) if src == dst => Ok(geometry.clone()),
            (src, dst) if is_geographic(src) && is_geographic(dst) => Ok(geometry.clone()),
            (src, EPSG_WEB_MERCATOR) if is_geographic(src) => {
                geometry.try_map_coords(to_web_mercator)
            }
            (EPSG_WEB_MERCATOR, dst) if is_geographic(dst) => {
                geometry.try_map_coords(from_web_mercator)
            }
            _ => Err(CrsEngineError::UnsupportedTransform {
                source_srid,
                target_srid,
            }),
        }
    }
}
