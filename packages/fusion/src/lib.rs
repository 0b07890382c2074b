#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The fusion pass.
//!
//! Combines administrative units, indicator records, priority zones and
//! facilities into one styled, serializable output:
//!
//! 1. optional mainland filter
//! 2. unit geometry normalization and validation
//! 3. indicator join ([`fusion_map_indicator::join`])
//! 4. priority-zone count per unit, joined as `qpv_count`
//! 5. bucketization and coloring of every configured layer
//! 6. facility classification and marker colors
//!
//! Recoverable problems from every stage are gathered in a
//! [`FusionReport`] instead of aborting the pass. Isochrone overlays are
//! built separately by [`overlay::build_overlays`] since they need the
//! cache and an async runtime.

pub mod overlay;
pub mod registry;

use fusion_map_facility::{FacilityCategoryMapper, FacilityError};
use fusion_map_facility_models::{Facility, RawFacility, UnknownCategoryPolicy};
use fusion_map_geography_models::territory::{
    is_mainland, is_mainland_geometry, is_mainland_point,
};
use fusion_map_geography_models::{
    AdministrativeUnit, Bucket, BucketRange, Color, EnrichedUnit, IndicatorRecord,
    LayerStyle, PriorityZone, ZoneLocation,
};
use fusion_map_indicator::join::indicator_values;
use fusion_map_indicator::{BucketError, IndicatorError, JoinConfig, JoinIssue, bucketize};
use fusion_map_spatial::normalize::normalize_and_validate;
use fusion_map_spatial::zones::{ZONE_COUNT_INDICATOR, count_zones_per_unit};
use fusion_map_spatial::{GeometryError, SpatialError, UnitIndex};
use serde::Serialize;
use thiserror::Error;

pub use overlay::{IsochroneOverlay, OverlayGeometry, build_overlays};
pub use registry::{LayerDefinition, all_layers};

/// Fatal errors of the fusion pass.
#[derive(Debug, Error)]
pub enum FusionError {
    /// The indicator join failed.
    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    /// The unit index could not be built.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// A layer is misconfigured.
    #[error("Layer {layer}: {source}")]
    Bucket {
        /// Id of the offending layer.
        layer: String,
        /// What is wrong with it.
        source: BucketError,
    },
}

/// Fusion pass settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    /// Layers to bucketize and color.
    pub layers: Vec<LayerDefinition>,
    /// What to do with facilities whose category label matches nothing.
    pub facility_policy: UnknownCategoryPolicy,
    /// Drop units, zones and facilities outside mainland France.
    pub mainland_only: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            layers: all_layers(),
            facility_policy: UnknownCategoryPolicy::default(),
            mainland_only: false,
        }
    }
}

impl FusionConfig {
    /// Join configuration derived from the layers. The zone count is
    /// computed by the pass itself and is never joined from records.
    #[must_use]
    pub fn join_config(&self) -> JoinConfig {
        let mut config = JoinConfig::default();
        for layer in &self.layers {
            if layer.indicator == ZONE_COUNT_INDICATOR {
                continue;
            }
            config.indicators.insert(layer.indicator.clone());
            if let Some(year) = layer.target_year {
                config = config.with_target_year(layer.indicator.clone(), year);
            }
        }
        config
    }
}

/// Inputs of the fusion pass, already parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusionInput {
    /// Administrative units.
    pub units: Vec<AdministrativeUnit>,
    /// Indicator records for those units.
    pub records: Vec<IndicatorRecord>,
    /// Priority zones to count per unit.
    pub zones: Vec<PriorityZone>,
    /// Facilities to classify.
    pub facilities: Vec<RawFacility>,
}

/// A classified facility with its marker color.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyledFacility {
    /// The facility.
    pub facility: Facility,
    /// Marker color.
    pub color: Color,
}

/// One legend row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendEntry {
    /// Bucket value range.
    pub range: BucketRange,
    /// Bucket color.
    pub color: Color,
}

/// Legend of one layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerLegend {
    /// Layer id.
    pub id: String,
    /// Legend title.
    pub name: String,
    /// Indicator shown by the layer.
    pub indicator: String,
    /// One entry per bucket, lowest values first.
    pub entries: Vec<LegendEntry>,
    /// Color of units without data.
    pub no_data_color: Color,
    /// Number of units without data.
    pub no_data_count: usize,
}

/// A facility refused by the category mapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedFacility {
    /// Source identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Why it was refused.
    pub reason: String,
}

/// A unit dropped because its boundary is not a valid polygon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidUnit {
    /// Administrative code.
    pub code: String,
    /// Why the geometry was rejected.
    pub reason: GeometryError,
}

/// Recoverable problems found during the pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusionReport {
    /// Units whose geometry failed validation.
    pub invalid_units: Vec<InvalidUnit>,
    /// Issues of the indicator join.
    pub join_issues: Vec<JoinIssue>,
    /// Ids of zones that fall inside no unit.
    pub unassigned_zones: Vec<String>,
    /// Facilities whose category could not be mapped.
    pub rejected_facilities: Vec<RejectedFacility>,
    /// Units dropped by the mainland filter.
    pub excluded_units: usize,
    /// Indicator records of units dropped by the mainland filter or for
    /// an invalid geometry.
    pub excluded_records: usize,
    /// Zones dropped by the mainland filter.
    pub excluded_zones: usize,
    /// Facilities dropped by the mainland filter.
    pub excluded_facilities: usize,
}

impl FusionReport {
    /// Returns `true` if nothing was dropped, rejected or reported.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.invalid_units.is_empty()
            && self.join_issues.is_empty()
            && self.unassigned_zones.is_empty()
            && self.rejected_facilities.is_empty()
            && self.excluded_units == 0
            && self.excluded_records == 0
            && self.excluded_zones == 0
            && self.excluded_facilities == 0
    }
}

/// Result of [`FusionPass::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct FusionOutput {
    /// Enriched units in ascending code order.
    pub units: Vec<EnrichedUnit>,
    /// One legend per layer, in layer order.
    pub legends: Vec<LayerLegend>,
    /// Classified facilities, in input order.
    pub facilities: Vec<StyledFacility>,
    /// Recoverable problems.
    pub report: FusionReport,
}

/// Runs the fusion pass with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct FusionPass {
    config: FusionConfig,
}

impl FusionPass {
    /// Creates a pass.
    #[must_use]
    pub const fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    /// The pass configuration.
    #[must_use]
    pub const fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Runs the pass.
    ///
    /// # Errors
    ///
    /// * [`FusionError::Indicator`] or [`FusionError::Spatial`] if two
    ///   units share a code
    /// * [`FusionError::Bucket`] if a layer has an invalid bucket count or
    ///   thresholds
    pub fn run(&self, input: &FusionInput) -> Result<FusionOutput, FusionError> {
        let mut report = FusionReport::default();

        let (units, records, zones) = self.filter_territory(input, &mut report);
        let (units, records) = normalize_units(units, records, &mut report);

        let joined = fusion_map_indicator::join(&units, &records, &self.config.join_config())?;
        report.join_issues = joined.issues;
        let mut enriched = joined.units;

        let index = UnitIndex::build(&units)?;
        let counts = count_zones_per_unit(&index, &zones);
        let zone_values = counts.to_indicator_values();
        for unit in &mut enriched {
            if let Some(value) = zone_values.get(&unit.code) {
                unit.indicators
                    .insert(ZONE_COUNT_INDICATOR.to_string(), *value);
            }
        }
        report.unassigned_zones = counts.unassigned;

        let mut legends = Vec::with_capacity(self.config.layers.len());
        for layer in &self.config.layers {
            legends.push(style_layer(layer, &mut enriched)?);
        }

        let facilities = self.style_facilities(&input.facilities, &mut report);

        log::info!(
            "Fusion pass: {} units, {} layers, {} facilities ({} invalid units, {} join issues, {} unassigned zones, {} rejected facilities)",
            enriched.len(),
            legends.len(),
            facilities.len(),
            report.invalid_units.len(),
            report.join_issues.len(),
            report.unassigned_zones.len(),
            report.rejected_facilities.len()
        );

        Ok(FusionOutput {
            units: enriched,
            legends,
            facilities,
            report,
        })
    }

    /// Applies the mainland filter to units, their records and zones.
    fn filter_territory(
        &self,
        input: &FusionInput,
        report: &mut FusionReport,
    ) -> (Vec<AdministrativeUnit>, Vec<IndicatorRecord>, Vec<PriorityZone>) {
        if !self.config.mainland_only {
            return (
                input.units.clone(),
                input.records.clone(),
                input.zones.clone(),
            );
        }

        let (units, excluded): (Vec<_>, Vec<_>) = input
            .units
            .iter()
            .cloned()
            .partition(|unit| is_mainland_geometry(&unit.geometry));

        let records: Vec<IndicatorRecord> = input
            .records
            .iter()
            .filter(|record| !excluded.iter().any(|unit| unit.code == record.code))
            .cloned()
            .collect();

        let zones: Vec<PriorityZone> = input
            .zones
            .iter()
            .filter(|zone| match &zone.location {
                ZoneLocation::Point { point } => is_mainland_point(*point),
                ZoneLocation::Area { geometry } => is_mainland_geometry(geometry),
            })
            .cloned()
            .collect();

        report.excluded_units = excluded.len();
        report.excluded_records = input.records.len() - records.len();
        report.excluded_zones = input.zones.len() - zones.len();

        if !excluded.is_empty() || report.excluded_zones > 0 {
            log::info!(
                "Mainland filter dropped {} units ({} records) and {} zones",
                report.excluded_units,
                report.excluded_records,
                report.excluded_zones
            );
        }

        (units, records, zones)
    }

    fn style_facilities(
        &self,
        facilities: &[RawFacility],
        report: &mut FusionReport,
    ) -> Vec<StyledFacility> {
        let mapper = FacilityCategoryMapper::new(self.config.facility_policy);
        let mut styled = Vec::with_capacity(facilities.len());

        for raw in facilities {
            if self.config.mainland_only && !is_mainland(raw.lon, raw.lat) {
                report.excluded_facilities += 1;
                continue;
            }

            match mapper.facility_from_raw(raw) {
                Ok(facility) => {
                    let color = mapper.color_for(&facility);
                    styled.push(StyledFacility { facility, color });
                }
                Err(e @ FacilityError::UnknownCategory { .. }) => {
                    log::warn!("Facility {} ({}) rejected: {e}", raw.id, raw.name);
                    report.rejected_facilities.push(RejectedFacility {
                        id: raw.id.clone(),
                        name: raw.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        styled
    }
}

/// Normalizes every unit boundary. Units with an invalid geometry are
/// reported and dropped along with their records.
fn normalize_units(
    units: Vec<AdministrativeUnit>,
    records: Vec<IndicatorRecord>,
    report: &mut FusionReport,
) -> (Vec<AdministrativeUnit>, Vec<IndicatorRecord>) {
    let mut valid = Vec::with_capacity(units.len());

    for mut unit in units {
        match normalize_and_validate(&unit.geometry) {
            Ok(geometry) => {
                unit.geometry = geometry;
                valid.push(unit);
            }
            Err(reason) => {
                log::warn!("Unit {} ({}) dropped: {reason}", unit.code, unit.name);
                report.invalid_units.push(InvalidUnit {
                    code: unit.code,
                    reason,
                });
            }
        }
    }

    if report.invalid_units.is_empty() {
        return (valid, records);
    }

    let before = records.len();
    let records: Vec<IndicatorRecord> = records
        .into_iter()
        .filter(|record| {
            !report
                .invalid_units
                .iter()
                .any(|invalid| invalid.code == record.code)
        })
        .collect();
    report.excluded_records += before - records.len();

    (valid, records)
}

/// Bucketizes one layer, writes its style on every unit and returns its
/// legend.
fn style_layer(
    layer: &LayerDefinition,
    units: &mut [EnrichedUnit],
) -> Result<LayerLegend, FusionError> {
    let values = indicator_values(units, &layer.indicator);
    let bucketing = bucketize(&values, layer.bucket_count, &layer.policy).map_err(|source| {
        FusionError::Bucket {
            layer: layer.id.clone(),
            source,
        }
    })?;
    let palette = layer.palette.palette();

    for unit in units.iter_mut() {
        let bucket = bucketing.bucket(&unit.code).unwrap_or(Bucket::NoData);
        unit.styles.insert(
            layer.id.clone(),
            LayerStyle {
                bucket,
                color: palette.color_for(bucket),
            },
        );
    }

    log::debug!(
        "Layer {}: bucket sizes {:?}, {} without data",
        layer.id,
        bucketing.sizes(),
        bucketing.no_data_count()
    );

    Ok(LayerLegend {
        id: layer.id.clone(),
        name: layer.name.clone(),
        indicator: layer.indicator.clone(),
        entries: bucketing
            .ranges
            .iter()
            .map(|range| LegendEntry {
                range: *range,
                color: palette.color_for(Bucket::Index(range.index)),
            })
            .collect(),
        no_data_color: palette.no_data.clone(),
        no_data_count: bucketing.no_data_count(),
    })
}

#[cfg(test)]
mod tests {
    use fusion_map_facility_models::FacilityCategory;
    use fusion_map_geography_models::IndicatorValue;
    use fusion_map_indicator::BucketPolicy;
    use fusion_map_indicator::palette::{NO_DATA_COLOR, PaletteName};
    use geo::{MultiPolygon, polygon};

    use super::*;

    fn square(code: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> AdministrativeUnit {
        AdministrativeUnit::new(
            code,
            format!("EPCI {code}"),
            MultiPolygon(vec![polygon![
                (x: x0, y: y0),
                (x: x1, y: y0),
                (x: x1, y: y1),
                (x: x0, y: y1),
                (x: x0, y: y0),
            ]]),
        )
    }

    fn raw_facility(id: &str, lat: f64, lon: f64, label: &str) -> RawFacility {
        RawFacility {
            id: id.to_string(),
            lat,
            lon,
            category_label: label.to_string(),
            name: format!("Facility {id}"),
        }
    }

    fn chomage_layer() -> LayerDefinition {
        registry::layer("chomage").unwrap()
    }

    fn qpv_layer() -> LayerDefinition {
        registry::layer("qpv").unwrap()
    }

    /// Two adjacent unit squares near Paris sharing the edge `x = 3`.
    fn paris_input() -> FusionInput {
        FusionInput {
            units: vec![
                square("200000001", 2.0, 48.0, 3.0, 49.0),
                square("200000002", 3.0, 48.0, 4.0, 49.0),
            ],
            records: vec![
                IndicatorRecord::new("200000001", "chomage_T", 8.5, 2021),
                IndicatorRecord::new("200000002", "chomage_T", 12.0, 2021),
                IndicatorRecord::new("ZZ999", "chomage_T", 99.0, 2021),
            ],
            zones: vec![
                PriorityZone::at_point("QN1", "Zone 1", 2.5, 48.5),
                PriorityZone::at_point("QN2", "Zone 2", 3.0, 48.5),
                PriorityZone::at_point("QN3", "Zone 3", 3.5, 48.5),
                PriorityZone::at_point("QN4", "Zone 4", 10.0, 10.0),
            ],
            facilities: vec![
                raw_facility("F1", 48.5, 2.5, "Formation : Collège"),
                raw_facility("F2", 48.6, 3.5, "Cinéma"),
            ],
        }
    }

    fn pass(layers: Vec<LayerDefinition>) -> FusionPass {
        FusionPass::new(FusionConfig {
            layers,
            ..FusionConfig::default()
        })
    }

    #[test]
    fn default_config_uses_every_layer() {
        let config = FusionConfig::default();
        assert_eq!(config.layers.len(), all_layers().len());
        assert_eq!(config.facility_policy, UnknownCategoryPolicy::Reject);
        assert!(!config.mainland_only);
    }

    #[test]
    fn join_config_skips_zone_count() {
        let config = FusionConfig::default().join_config();
        assert!(config.indicators.contains("chomage_T"));
        assert!(!config.indicators.contains(ZONE_COUNT_INDICATOR));
        assert!(config.target_years.is_empty());
    }

    #[test]
    fn join_config_carries_target_years() {
        let mut layer = chomage_layer();
        layer.target_year = Some(2020);
        let config = pass(vec![layer]).config().join_config();
        assert_eq!(config.target_years.get("chomage_T"), Some(&2020));
    }

    #[test]
    fn counts_zones_and_styles_every_layer() {
        let output = pass(vec![chomage_layer(), qpv_layer()])
            .run(&paris_input())
            .unwrap();

        assert_eq!(output.units.len(), 2);
        let a = &output.units[0];
        let b = &output.units[1];

        // The zone on the shared edge goes to the smallest code.
        assert_eq!(a.indicator(ZONE_COUNT_INDICATOR), IndicatorValue::Value(2.0));
        assert_eq!(b.indicator(ZONE_COUNT_INDICATOR), IndicatorValue::Value(1.0));
        assert_eq!(output.report.unassigned_zones, vec!["QN4".to_string()]);

        assert_eq!(a.styles["qpv"].bucket, Bucket::Index(2));
        assert_eq!(b.styles["qpv"].bucket, Bucket::Index(1));
        assert_eq!(
            a.styles["qpv"].color,
            PaletteName::Reds.palette().color_for(Bucket::Index(2))
        );

        assert_eq!(a.styles["chomage"].bucket, Bucket::Index(0));
        assert_eq!(b.styles["chomage"].bucket, Bucket::Index(1));
    }

    #[test]
    fn unknown_codes_are_reported_not_joined() {
        let output = pass(vec![chomage_layer()]).run(&paris_input()).unwrap();

        assert!(output.units.iter().all(|unit| unit.code != "ZZ999"));
        assert!(output.report.join_issues.iter().any(|issue| matches!(
            issue,
            JoinIssue::UnknownAdministrativeCode { code, .. } if code == "ZZ999"
        )));
    }

    #[test]
    fn missing_indicator_gets_no_data_color() {
        let mut input = paris_input();
        input.records.retain(|record| record.code != "200000002");

        let output = pass(vec![chomage_layer()]).run(&input).unwrap();
        let b = &output.units[1];
        assert_eq!(b.indicator("chomage_T"), IndicatorValue::NoData);
        assert_eq!(b.styles["chomage"].bucket, Bucket::NoData);
        assert_eq!(b.styles["chomage"].color, NO_DATA_COLOR);
        assert_eq!(output.legends[0].no_data_count, 1);
    }

    #[test]
    fn legends_follow_layer_order() {
        let output = pass(vec![qpv_layer(), chomage_layer()])
            .run(&paris_input())
            .unwrap();

        let ids: Vec<&str> = output.legends.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["qpv", "chomage"]);
        assert_eq!(output.legends[0].entries.len(), 7);
        assert_eq!(output.legends[1].entries.len(), 7);
        assert_eq!(output.legends[1].entries[0].range.count, 1);
    }

    #[test]
    fn unknown_facility_category_is_rejected_by_default() {
        let output = pass(vec![]).run(&paris_input()).unwrap();

        assert_eq!(output.facilities.len(), 1);
        assert_eq!(output.facilities[0].facility.category, FacilityCategory::Formation);
        assert_eq!(output.report.rejected_facilities.len(), 1);
        assert_eq!(output.report.rejected_facilities[0].id, "F2");
    }

    #[test]
    fn unknown_facility_category_can_be_kept() {
        let output = FusionPass::new(FusionConfig {
            layers: vec![],
            facility_policy: UnknownCategoryPolicy::Uncategorized,
            mainland_only: false,
        })
        .run(&paris_input())
        .unwrap();

        assert_eq!(output.facilities.len(), 2);
        assert_eq!(
            output.facilities[1].facility.category,
            FacilityCategory::Uncategorized
        );
        assert!(output.report.rejected_facilities.is_empty());
    }

    #[test]
    fn mainland_filter_drops_overseas_data() {
        let mut input = paris_input();
        input.units.push(square("249740101", 55.2, -21.4, 55.8, -20.9));
        input
            .records
            .push(IndicatorRecord::new("249740101", "chomage_T", 20.0, 2021));
        input
            .zones
            .push(PriorityZone::at_point("QN974", "Zone Réunion", 55.5, -21.1));
        input
            .facilities
            .push(raw_facility("F3", -21.1, 55.5, "Formation : Lycée"));

        let output = FusionPass::new(FusionConfig {
            layers: vec![chomage_layer()],
            facility_policy: UnknownCategoryPolicy::Reject,
            mainland_only: true,
        })
        .run(&input)
        .unwrap();

        assert_eq!(output.units.len(), 2);
        assert_eq!(output.report.excluded_units, 1);
        assert_eq!(output.report.excluded_records, 1);
        // QN4 at (10, 10) and QN974 are both outside the mainland box.
        assert_eq!(output.report.excluded_zones, 2);
        assert_eq!(output.report.excluded_facilities, 1);
        assert!(output.report.unassigned_zones.is_empty());
        assert!(
            !output
                .report
                .join_issues
                .iter()
                .any(|issue| matches!(issue, JoinIssue::UnknownAdministrativeCode { code, .. } if code == "249740101"))
        );
    }

    #[test]
    fn invalid_layer_is_fatal() {
        let mut layer = qpv_layer();
        layer.policy = BucketPolicy::FixedThreshold {
            thresholds: vec![5.0, 1.0],
        };

        let err = pass(vec![layer]).run(&paris_input()).unwrap_err();
        assert!(matches!(err, FusionError::Bucket { layer, .. } if layer == "qpv"));
    }

    #[test]
    fn duplicate_unit_codes_are_fatal() {
        let mut input = paris_input();
        input.units.push(square("200000001", 5.0, 45.0, 6.0, 46.0));

        let err = pass(vec![]).run(&input).unwrap_err();
        assert!(matches!(err, FusionError::Indicator(_)));
    }

    #[test]
    fn clean_report_for_clean_input() {
        let mut input = paris_input();
        input.records.retain(|record| record.code != "ZZ999");
        input.zones.retain(|zone| zone.id != "QN4");
        input.facilities.retain(|facility| facility.id != "F2");

        let output = pass(vec![chomage_layer(), qpv_layer()]).run(&input).unwrap();
        assert!(output.report.is_clean(), "{:?}", output.report);
    }

    #[test]
    fn unit_geometry_is_normalized_counter_clockwise() {
        use geo::algorithm::winding_order::Winding;

        let mut input = paris_input();
        input.units[0] = AdministrativeUnit::new(
            "200000001",
            "EPCI 200000001",
            MultiPolygon(vec![polygon![
                (x: 2.0, y: 48.0),
                (x: 2.0, y: 49.0),
                (x: 3.0, y: 49.0),
                (x: 3.0, y: 48.0),
                (x: 2.0, y: 48.0),
            ]]),
        );
        assert!(input.units[0].geometry.0[0].exterior().is_cw());

        let output = pass(vec![chomage_layer()]).run(&input).unwrap();
        assert_eq!(output.units.len(), 2);
        assert!(output.units[0].geometry.0[0].exterior().is_ccw());
        assert!(output.report.invalid_units.is_empty());
    }

    #[test]
    fn self_intersecting_unit_is_reported_and_dropped() {
        let mut input = paris_input();
        input.units.push(AdministrativeUnit::new(
            "200000003",
            "EPCI 200000003",
            MultiPolygon(vec![polygon![
                (x: 5.0, y: 45.0),
                (x: 6.0, y: 46.0),
                (x: 6.0, y: 45.0),
                (x: 5.0, y: 46.0),
                (x: 5.0, y: 45.0),
            ]]),
        ));
        input
            .records
            .push(IndicatorRecord::new("200000003", "chomage_T", 10.0, 2021));

        let output = pass(vec![chomage_layer()]).run(&input).unwrap();

        assert!(output.units.iter().all(|unit| unit.code != "200000003"));
        assert_eq!(
            output.report.invalid_units,
            vec![InvalidUnit {
                code: "200000003".to_string(),
                reason: GeometryError::SelfIntersection,
            }]
        );
        assert_eq!(output.report.excluded_records, 1);
        assert!(!output.report.join_issues.iter().any(|issue| matches!(
            issue,
            JoinIssue::UnknownAdministrativeCode { code, .. } if code == "200000003"
        )));
        assert!(!output.report.is_clean());
    }

    #[test]
    fn styled_facility_serializes_color() {
        let output = pass(vec![]).run(&paris_input()).unwrap();
        let json = serde_json::to_value(&output.facilities[0]).unwrap();
        assert_eq!(json["facility"]["id"], "F1");
        assert!(json["color"].as_str().unwrap().starts_with('#'));
    }
}
