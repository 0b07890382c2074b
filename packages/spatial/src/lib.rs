#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index over administrative units.
//!
//! Builds an R-tree over unit envelopes and answers point-in-polygon
//! lookups with a deterministic tie-break, so a point on a shared edge is
//! attributed to exactly one unit. Also hosts the geometry normalization
//! used for both unit boundaries and isochrone polygons, and the
//! priority-zone aggregator built on top of the index.

pub mod normalize;
pub mod zones;

use std::collections::BTreeSet;

use fusion_map_geography_models::AdministrativeUnit;
use geo::{Intersects, MultiPolygon, Point};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

pub use normalize::GeometryError;

/// Errors raised while building a [`UnitIndex`].
#[derive(Debug, Error)]
pub enum SpatialError {
    /// Two units share the same administrative code.
    #[error("Duplicate administrative code: {code}")]
    DuplicateCode {
        /// The repeated code.
        code: String,
    },

    /// A unit geometry failed validation.
    #[error("Invalid geometry for unit {code}: {source}")]
    Geometry {
        /// Code of the offending unit.
        code: String,
        /// Why the geometry was rejected.
        source: GeometryError,
    },
}

/// A unit polygon stored in the R-tree with its code.
struct UnitEntry {
    code: String,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for UnitEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over administrative unit boundaries.
pub struct UnitIndex {
    units: RTree<UnitEntry>,
    codes: BTreeSet<String>,
}

impl UnitIndex {
    /// Builds the index from a unit collection.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::DuplicateCode`] if two units share a code and
    /// [`SpatialError::Geometry`] if a unit has an empty geometry.
    pub fn build(units: &[AdministrativeUnit]) -> Result<Self, SpatialError> {
        let mut codes = BTreeSet::new();
        let mut entries = Vec::with_capacity(units.len());

        for unit in units {
            if !codes.insert(unit.code.clone()) {
                return Err(SpatialError::DuplicateCode {
                    code: unit.code.clone(),
                });
            }

            let Some(envelope) = compute_envelope(&unit.geometry) else {
                return Err(SpatialError::Geometry {
                    code: unit.code.clone(),
                    source: GeometryError::Empty,
                });
            };

            entries.push(UnitEntry {
                code: unit.code.clone(),
                envelope,
                polygon: unit.geometry.clone(),
            });
        }

        let units = RTree::bulk_load(entries);
        log::info!("Loaded {} administrative units into spatial index", units.size());

        Ok(Self { units, codes })
    }

    /// Number of indexed units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.size()
    }

    /// Returns `true` if no unit is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.size() == 0
    }

    /// All indexed codes in ascending order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    /// Codes of every unit whose closed polygon (interior or boundary)
    /// contains the point, in ascending order.
    #[must_use]
    pub fn candidates(&self, point: Point<f64>) -> Vec<&str> {
        let query_env = AABB::from_point([point.x(), point.y()]);

        let mut found: Vec<&str> = self
            .units
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.0.iter().any(|p| p.intersects(&point)))
            .map(|entry| entry.code.as_str())
            .collect();
        found.sort_unstable();
        found
    }

    /// Looks up the unit owning a point.
    ///
    /// Points on an edge shared by several units go to the unit with the
    /// lexicographically smallest code.
    #[must_use]
    pub fn lookup(&self, point: Point<f64>) -> Option<&str> {
        self.candidates(point).first().copied()
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
///
/// Returns `None` for empty geometries.
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    use geo::BoundingRect;

    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
