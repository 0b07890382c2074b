#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Administrative boundary, indicator and priority-zone types.
//!
//! These are the plain records exchanged between the loader, the indicator
//! join engine, the priority-zone aggregator and the rendering layer. All
//! geometry uses `geo` types with `x = longitude`, `y = latitude` (WGS84).

pub mod territory;

use std::borrow::Cow;
use std::collections::BTreeMap;

use geo::{MultiPolygon, Point};
use serde::{Deserialize, Serialize};

/// An administrative unit (e.g. an EPCI) with its boundary polygon.
///
/// `code` is unique across a unit collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdministrativeUnit {
    /// Administrative code (e.g. SIREN `"200054781"`).
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// Boundary geometry. Simple polygons are stored as a one-element
    /// multi-polygon.
    pub geometry: MultiPolygon<f64>,
}

impl AdministrativeUnit {
    /// Creates a unit from its parts.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        geometry: MultiPolygon<f64>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            geometry,
        }
    }
}

/// One indicator measurement for one administrative unit and year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorRecord {
    /// Administrative code the measurement belongs to.
    pub code: String,
    /// Indicator name (e.g. `"chomage_T"`).
    pub indicator: String,
    /// Measured value.
    pub value: f64,
    /// Reference year of the measurement.
    pub year: u16,
}

impl IndicatorRecord {
    /// Creates a record from its parts.
    #[must_use]
    pub fn new(code: impl Into<String>, indicator: impl Into<String>, value: f64, year: u16) -> Self {
        Self {
            code: code.into(),
            indicator: indicator.into(),
            value,
            year,
        }
    }
}

/// The value of an indicator on a unit after joining.
///
/// `NoData` is deliberately distinct from `Value(0.0)` so that missing
/// measurements are never colored as the lowest bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum IndicatorValue {
    /// A measured value.
    Value(f64),
    /// No usable measurement for this unit.
    NoData,
}

impl IndicatorValue {
    /// Returns the measured value, if any.
    #[must_use]
    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::NoData => None,
        }
    }

    /// Returns `true` for the no-data marker.
    #[must_use]
    pub const fn is_no_data(self) -> bool {
        matches!(self, Self::NoData)
    }
}

/// Location of a priority zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ZoneLocation {
    /// A single representative point.
    Point {
        /// The point (`x = lon`, `y = lat`).
        point: Point<f64>,
    },
    /// The full zone outline.
    Area {
        /// The zone polygon(s).
        geometry: MultiPolygon<f64>,
    },
}

/// A priority zone (e.g. a QPV). Only used for counting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityZone {
    /// Zone identifier (e.g. `"QN07501M"`).
    pub id: String,
    /// Human-readable zone name.
    pub name: String,
    /// Where the zone is.
    pub location: ZoneLocation,
}

impl PriorityZone {
    /// Creates a point zone at `(lon, lat)`.
    #[must_use]
    pub fn at_point(id: impl Into<String>, name: impl Into<String>, lon: f64, lat: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: ZoneLocation::Point {
                point: Point::new(lon, lat),
            },
        }
    }

    /// Creates an areal zone.
    #[must_use]
    pub fn with_area(
        id: impl Into<String>,
        name: impl Into<String>,
        geometry: MultiPolygon<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: ZoneLocation::Area { geometry },
        }
    }
}

/// A hex color such as `"#0984e3"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(Cow<'static, str>);

impl Color {
    /// Wraps a static hex string.
    #[must_use]
    pub const fn from_static(hex: &'static str) -> Self {
        Self(Cow::Borrowed(hex))
    }

    /// Wraps an owned hex string.
    #[must_use]
    pub fn new(hex: impl Into<String>) -> Self {
        Self(Cow::Owned(hex.into()))
    }

    /// Returns the hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this looks like `#rrggbb`.
    #[must_use]
    pub fn is_hex_rgb(&self) -> bool {
        let s = self.as_str();
        s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discrete, ordered color category.
///
/// `NoData` is a reserved sentinel that never coincides with a real
/// bucket index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "camelCase")]
pub enum Bucket {
    /// Zero-based bucket index, lowest values first.
    Index(usize),
    /// The unit has no data for the indicator.
    NoData,
}

impl Bucket {
    /// Returns the bucket index, or `None` for the no-data sentinel.
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Index(i) => Some(i),
            Self::NoData => None,
        }
    }
}

/// Value range covered by one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketRange {
    /// Bucket index.
    pub index: usize,
    /// Smallest value in the bucket, `None` when the bucket is empty.
    pub min: Option<f64>,
    /// Largest value in the bucket, `None` when the bucket is empty.
    pub max: Option<f64>,
    /// Number of units in the bucket.
    pub count: usize,
}

/// Bucket and color of a unit for one map layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerStyle {
    /// Assigned bucket.
    pub bucket: Bucket,
    /// Fill color for the bucket.
    pub color: Color,
}

/// An administrative unit enriched with joined indicators and styles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedUnit {
    /// Administrative code.
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// Boundary geometry.
    pub geometry: MultiPolygon<f64>,
    /// Indicator name -> joined value (`NoData` when missing).
    pub indicators: BTreeMap<String, IndicatorValue>,
    /// Layer id -> bucket and color.
    pub styles: BTreeMap<String, LayerStyle>,
}

impl EnrichedUnit {
    /// Creates an enriched unit with no indicators and no styles yet.
    #[must_use]
    pub fn from_unit(unit: &AdministrativeUnit) -> Self {
        Self {
            code: unit.code.clone(),
            name: unit.name.clone(),
            geometry: unit.geometry.clone(),
            indicators: BTreeMap::new(),
            styles: BTreeMap::new(),
        }
    }

    /// Returns the joined value of `indicator`, `NoData` if it was never
    /// joined.
    #[must_use]
    pub fn indicator(&self, indicator: &str) -> IndicatorValue {
        self.indicators
            .get(indicator)
            .copied()
            .unwrap_or(IndicatorValue::NoData)
    }
}
