//! Mainland France (France hexagonale) filters.
//!
//! Facilities, zones and units outside the mainland bounding box are
//! excluded from the fused layer when the mainland filter is enabled.

use geo::{MultiPolygon, Point};

/// Exclusive longitude bounds of the mainland box.
pub const MAINLAND_LON: (f64, f64) = (-6.0, 10.0);

/// Exclusive latitude bounds of the mainland box.
pub const MAINLAND_LAT: (f64, f64) = (41.0, 52.0);

/// Returns `true` if `(lon, lat)` lies strictly inside the mainland box.
#[must_use]
pub fn is_mainland(lon: f64, lat: f64) -> bool {
    MAINLAND_LON.0 < lon && lon < MAINLAND_LON.1 && MAINLAND_LAT.0 < lat && lat < MAINLAND_LAT.1
}

/// Returns `true` if the point lies strictly inside the mainland box.
#[must_use]
pub fn is_mainland_point(point: Point<f64>) -> bool {
    is_mainland(point.x(), point.y())
}

/// Classifies a geometry by the first vertex of its first exterior ring.
///
/// Empty geometries are never mainland.
#[must_use]
pub fn is_mainland_geometry(geometry: &MultiPolygon<f64>) -> bool {
    geometry
        .0
        .first()
        .and_then(|polygon| polygon.exterior().0.first())
        .is_some_and(|coord| is_mainland(coord.x, coord.y))
}

/// Returns `true` for mainland department codes (`"01"`..`"95"`, `"2A"`,
/// `"2B"`). Overseas departments use three-digit codes (`"971"`...).
#[must_use]
pub fn is_mainland_department(code: &str) -> bool {
    !code.is_empty() && (code.len() <= 2 || code.starts_with('2'))
}
