//! Priority-zone aggregation (QPV count per administrative unit).
//!
//! Each zone is reduced to a single point (its own point, or the interior
//! point of its outline) and attributed to exactly one unit through
//! [`UnitIndex::lookup`]. Zones outside every unit are kept aside in
//! [`ZoneCounts::unassigned`] so no zone silently disappears.

use std::collections::BTreeMap;

use fusion_map_geography_models::{IndicatorValue, PriorityZone, ZoneLocation};
use geo::Point;
use geo::algorithm::interior_point::InteriorPoint;

use crate::UnitIndex;

/// Indicator name under which zone counts are joined.
pub const ZONE_COUNT_INDICATOR: &str = "qpv_count";

/// Result of counting zones per unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneCounts {
    /// Unit code -> number of zones attributed to it. Every indexed unit
    /// is present, with 0 when it holds no zone.
    pub counts: BTreeMap<String, u64>,
    /// Ids of zones that fall inside no unit.
    pub unassigned: Vec<String>,
}

impl ZoneCounts {
    /// Total number of zones attributed to some unit.
    #[must_use]
    pub fn total_assigned(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Returns the count for a unit (0 for unknown codes).
    #[must_use]
    pub fn count(&self, code: &str) -> u64 {
        self.counts.get(code).copied().unwrap_or(0)
    }

    /// Converts the counts into indicator values for bucketization.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_indicator_values(&self) -> BTreeMap<String, IndicatorValue> {
        self.counts
            .iter()
            .map(|(code, count)| (code.clone(), IndicatorValue::Value(*count as f64)))
            .collect()
    }
}

/// Counts priority zones per administrative unit.
///
/// A point on an edge shared by several units is attributed to the unit
/// with the smallest code, so
/// `total_assigned() + unassigned.len() == zones.len()` always holds.
#[must_use]
pub fn count_zones_per_unit(index: &UnitIndex, zones: &[PriorityZone]) -> ZoneCounts {
    let mut counts: BTreeMap<String, u64> =
        index.codes().map(|code| (code.to_string(), 0)).collect();
    let mut unassigned = Vec::new();

    for zone in zones {
        let owner = representative_point(zone).and_then(|point| index.lookup(point));

        match owner {
            Some(code) => {
                if let Some(count) = counts.get_mut(code) {
                    *count += 1;
                }
            }
            None => {
                log::warn!("Priority zone {} ({}) is outside every unit", zone.id, zone.name);
                unassigned.push(zone.id.clone());
            }
        }
    }

    log::info!(
        "Attributed {} of {} priority zones to {} units",
        zones.len() - unassigned.len(),
        zones.len(),
        counts.len()
    );

    ZoneCounts { counts, unassigned }
}

/// The point used to attribute a zone.
fn representative_point(zone: &PriorityZone) -> Option<Point<f64>> {
    match &zone.location {
        ZoneLocation::Point { point } => Some(*point),
        ZoneLocation::Area { geometry } => geometry.interior_point(),
    }
}
