//! Isochrone overlays around facilities.
//!
//! Facilities sharing a rounded origin share their isochrones: one overlay
//! is produced per cache key, labelled with the first facility title and
//! the number of other facilities at that origin.

use std::collections::BTreeMap;

use fusion_map_facility_models::Facility;
use fusion_map_geography_models::Color;
use fusion_map_indicator::palette::NO_DATA_COLOR;
use fusion_map_isochrone::{IsochroneCache, IsochroneUnavailable};
use fusion_map_isochrone_models::{IsochroneKey, IsochronePolygon, TravelMode};
use geo::MultiPolygon;
use serde::Serialize;

/// Geometry of an overlay, or why there is none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum OverlayGeometry {
    /// The isochrone polygon.
    Polygon {
        /// Normalized geometry (`x = lon`, `y = lat`).
        geometry: MultiPolygon<f64>,
    },
    /// The provider could not produce the isochrone.
    Unavailable {
        /// Failure description.
        reason: String,
    },
}

/// One isochrone overlay feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IsochroneOverlay {
    /// Cache key (origin, mode and duration).
    pub key: IsochroneKey,
    /// `"first title (+n)"`, or just the title for a lone facility.
    pub label: String,
    /// Titles of every facility at the origin, in input order.
    pub titles: Vec<String>,
    /// Fill color for the mode and duration.
    pub color: Color,
    /// Polygon or unavailability marker.
    pub geometry: OverlayGeometry,
}

/// Keys to resolve and the facility titles attached to each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayPlan {
    /// Key -> titles of the facilities at its origin.
    pub titles: BTreeMap<IsochroneKey, Vec<String>>,
    /// Ids of facilities whose coordinates cannot form a key.
    pub skipped: Vec<String>,
}

impl OverlayPlan {
    /// Every key to resolve, in key order.
    #[must_use]
    pub fn keys(&self) -> Vec<IsochroneKey> {
        self.titles.keys().copied().collect()
    }
}

/// Groups facilities by rounded origin and expands every allowed duration
/// of each mode.
#[must_use]
pub fn plan_overlays(facilities: &[Facility], modes: &[TravelMode]) -> OverlayPlan {
    let mut plan = OverlayPlan::default();

    for facility in facilities {
        let mut keys = Vec::new();
        for mode in modes {
            match IsochroneKey::all_for_origin(facility.lat, facility.lon, *mode) {
                Ok(mode_keys) => keys.extend(mode_keys),
                Err(e) => {
                    log::warn!("Facility {} ({}): no isochrone: {e}", facility.id, facility.name);
                    plan.skipped.push(facility.id.clone());
                    keys.clear();
                    break;
                }
            }
        }

        for key in keys {
            plan.titles.entry(key).or_default().push(facility.name.clone());
        }
    }

    plan
}

/// Builds overlays from resolved cache results. Keys missing from
/// `results` are reported as unavailable.
#[must_use]
pub fn overlays_from_results(
    plan: &OverlayPlan,
    results: &BTreeMap<IsochroneKey, Result<IsochronePolygon, IsochroneUnavailable>>,
) -> Vec<IsochroneOverlay> {
    plan.titles
        .iter()
        .map(|(key, titles)| {
            let geometry = match results.get(key) {
                Some(Ok(polygon)) => OverlayGeometry::Polygon {
                    geometry: polygon.geometry.clone(),
                },
                Some(Err(e)) => OverlayGeometry::Unavailable {
                    reason: e.cause.to_string(),
                },
                None => OverlayGeometry::Unavailable {
                    reason: "not resolved".to_string(),
                },
            };

            IsochroneOverlay {
                key: *key,
                label: label(titles),
                titles: titles.clone(),
                color: key
                    .mode()
                    .overlay_color(key.minutes())
                    .unwrap_or(NO_DATA_COLOR),
                geometry,
            }
        })
        .collect()
}

/// Resolves every overlay of `facilities` through the cache.
///
/// Failed keys yield [`OverlayGeometry::Unavailable`] overlays; nothing
/// is fabricated.
pub async fn build_overlays(
    cache: &IsochroneCache,
    facilities: &[Facility],
    modes: &[TravelMode],
) -> Vec<IsochroneOverlay> {
    let plan = plan_overlays(facilities, modes);
    let results = cache.get_batch(&plan.keys()).await;
    let overlays = overlays_from_results(&plan, &results);

    let unavailable = overlays
        .iter()
        .filter(|overlay| matches!(overlay.geometry, OverlayGeometry::Unavailable { .. }))
        .count();
    log::info!(
        "Built {} isochrone overlays ({unavailable} unavailable) for {} facilities",
        overlays.len(),
        facilities.len()
    );

    overlays
}

fn label(titles: &[String]) -> String {
    match titles {
        [] => String::new(),
        [only] => only.clone(),
        [first, rest @ ..] => format!("{first} (+{})", rest.len()),
    }
}
