//! Geometry normalization and validation.
//!
//! Every polygon that enters the fused layer, whether an administrative
//! boundary or an isochrone returned by a routing provider, goes through
//! [`normalize`] so that both share one representation:
//!
//! - `x = longitude`, `y = latitude` (WGS84, `GeoJSON` axis order)
//! - rings closed, consecutive duplicate vertices removed
//! - exterior rings counter-clockwise, interior rings clockwise

use geo::algorithm::orient::{Direction, Orient};
use geo::algorithm::validation::{InvalidPolygon, RingRole, Validation};
use geo::{Area, LineString, MultiPolygon, Polygon, RemoveRepeatedPoints};
use thiserror::Error;

/// Why a geometry was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// The geometry has no polygon.
    #[error("geometry is empty")]
    Empty,

    /// A ring has fewer than four coordinates once closed.
    #[error("ring has {len} coordinates, expected at least 4")]
    RingTooShort {
        /// Number of coordinates in the ring.
        len: usize,
    },

    /// A coordinate is NaN or infinite.
    #[error("coordinate is not finite")]
    NonFiniteCoordinate,

    /// A ring encloses no area.
    #[error("ring encloses zero area")]
    ZeroArea,

    /// Two edges of a ring cross or overlap.
    #[error("ring is self-intersecting")]
    SelfIntersection,

    /// Rings of one polygon cross, or a hole lies outside its shell.
    #[error("invalid rings: {message}")]
    InvalidRings {
        /// What is wrong with them.
        message: String,
    },

    /// The input is not a polygonal geometry.
    #[error("unsupported geometry type: {kind}")]
    UnsupportedGeometry {
        /// The `GeoJSON` type encountered.
        kind: String,
    },

    /// The input could not be parsed as `GeoJSON`.
    #[error("GeoJSON parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },
}

/// Returns the canonical form of a multi-polygon.
#[must_use]
pub fn normalize(geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    geometry
        .remove_repeated_points()
        .orient(Direction::Default)
}

/// Checks that a multi-polygon is non-empty and every ring is a simple,
/// closed, finite ring with non-zero area.
///
/// # Errors
///
/// Returns the first [`GeometryError`] found.
pub fn validate(geometry: &MultiPolygon<f64>) -> Result<(), GeometryError> {
    if geometry.0.is_empty() {
        return Err(GeometryError::Empty);
    }

    for polygon in &geometry.0 {
        validate_polygon(polygon)?;
    }

    Ok(())
}

/// Normalizes then validates.
///
/// # Errors
///
/// Returns [`GeometryError`] if the normalized geometry is invalid.
pub fn normalize_and_validate(
    geometry: &MultiPolygon<f64>,
) -> Result<MultiPolygon<f64>, GeometryError> {
    let normalized = normalize(geometry);
    validate(&normalized)?;
    Ok(normalized)
}

/// Extracts a multi-polygon from a `GeoJSON` value.
///
/// Accepts a `FeatureCollection` (all polygonal features are merged, as a
/// routing provider returns one feature per requested range), a `Feature`,
/// or a bare `Polygon`/`MultiPolygon` geometry.
///
/// # Errors
///
/// Returns [`GeometryError::Parse`] for malformed `GeoJSON`,
/// [`GeometryError::UnsupportedGeometry`] for non-polygonal geometries and
/// [`GeometryError::Empty`] when nothing polygonal is found.
pub fn multipolygon_from_geojson(
    value: &serde_json::Value,
) -> Result<MultiPolygon<f64>, GeometryError> {
    let geojson = geojson::GeoJson::from_json_value(value.clone()).map_err(|e| {
        GeometryError::Parse {
            message: e.to_string(),
        }
    })?;

    let geometries: Vec<geojson::Geometry> = match geojson {
        geojson::GeoJson::Geometry(geometry) => vec![geometry],
        geojson::GeoJson::Feature(feature) => feature.geometry.into_iter().collect(),
        geojson::GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|feature| feature.geometry)
            .collect(),
    };

    let mut polygons = Vec::new();
    for geometry in geometries {
        polygons.extend(polygons_from_geometry(geometry)?);
    }

    if polygons.is_empty() {
        return Err(GeometryError::Empty);
    }

    Ok(MultiPolygon(polygons))
}

/// Builds a multi-polygon from a bare `Polygon` coordinate array
/// (`[[[lon, lat], ...], ...]`).
///
/// # Errors
///
/// Returns [`GeometryError::Parse`] if the array is not a list of rings
/// of positions.
pub fn multipolygon_from_polygon_coordinates(
    coordinates: &serde_json::Value,
) -> Result<MultiPolygon<f64>, GeometryError> {
    let rings: Vec<Vec<Vec<f64>>> =
        serde_json::from_value(coordinates.clone()).map_err(|e| GeometryError::Parse {
            message: e.to_string(),
        })?;

    if rings.is_empty() {
        return Err(GeometryError::Empty);
    }

    let polygons = polygons_from_geometry(geojson::Geometry::new(geojson::Value::Polygon(rings)))?;
    Ok(MultiPolygon(polygons))
}

/// Converts a multi-polygon into a `GeoJSON` `MultiPolygon` geometry.
#[must_use]
pub fn multipolygon_to_geojson(geometry: &MultiPolygon<f64>) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(geometry))
}

fn polygons_from_geometry(geometry: geojson::Geometry) -> Result<Vec<Polygon<f64>>, GeometryError> {
    let converted: geo::Geometry<f64> =
        geometry.try_into().map_err(|e: geojson::Error| GeometryError::Parse {
            message: e.to_string(),
        })?;

    match converted {
        geo::Geometry::Polygon(polygon) => Ok(vec![polygon]),
        geo::Geometry::MultiPolygon(mp) => Ok(mp.0),
        other => Err(GeometryError::UnsupportedGeometry {
            kind: geometry_kind(&other).to_string(),
        }),
    }
}

const fn geometry_kind(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::Line(_) | geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        _ => "Other",
    }
}

fn validate_polygon(polygon: &Polygon<f64>) -> Result<(), GeometryError> {
    if polygon.exterior().0.is_empty() {
        return Err(GeometryError::RingTooShort { len: 0 });
    }

    let finite = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .flat_map(LineString::coords)
        .all(|c| c.x.is_finite() && c.y.is_finite());
    if !finite {
        return Err(GeometryError::NonFiniteCoordinate);
    }

    polygon.check_validation().map_err(|error| match error {
        InvalidPolygon::TooFewPointsInRing(role) => GeometryError::RingTooShort {
            len: ring(polygon, role).map_or(0, |r| r.remove_repeated_points().0.len()),
        },
        InvalidPolygon::SelfIntersection(_) => GeometryError::SelfIntersection,
        InvalidPolygon::NonFiniteCoord(..) => GeometryError::NonFiniteCoordinate,
        other => GeometryError::InvalidRings {
            message: other.to_string(),
        },
    })?;

    // Collinear rings pass the simplicity checks.
    if Polygon::new(polygon.exterior().clone(), vec![]).unsigned_area() < f64::EPSILON {
        return Err(GeometryError::ZeroArea);
    }

    Ok(())
}

fn ring(polygon: &Polygon<f64>, role: RingRole) -> Option<&LineString<f64>> {
    match role {
        RingRole::Exterior => Some(polygon.exterior()),
        RingRole::Interior(i) => polygon.interiors().get(i),
    }
}
