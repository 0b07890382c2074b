#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Isochrone cache key, travel mode and polygon types.

pub mod key;

use chrono::{DateTime, Utc};
use fusion_map_geography_models::Color;
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

pub use key::IsochroneKey;

/// Provider id recorded for entries imported from the legacy cache file.
pub const LEGACY_IMPORT_PROVIDER: &str = "legacy-import";

/// How the traveller moves.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TravelMode {
    /// Driving
    Car,
    /// Walking
    Walk,
}

impl TravelMode {
    /// Returns all modes.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Car, Self::Walk]
    }

    /// Durations (minutes) for which isochrones are computed.
    #[must_use]
    pub const fn allowed_minutes(self) -> &'static [u16] {
        match self {
            Self::Car => &[10, 15, 30, 40, 45, 60],
            Self::Walk => &[10, 15],
        }
    }

    /// Routing profile name (`OpenRouteService` convention).
    #[must_use]
    pub const fn profile(self) -> &'static str {
        match self {
            Self::Car => "driving-car",
            Self::Walk => "foot-walking",
        }
    }

    /// Inverse of [`Self::profile`].
    #[must_use]
    pub fn from_profile(profile: &str) -> Option<Self> {
        Self::all().iter().copied().find(|mode| mode.profile() == profile)
    }

    /// Fill color of the overlay for a duration, `None` for durations the
    /// mode does not support.
    #[must_use]
    pub const fn overlay_color(self, minutes: u16) -> Option<Color> {
        let hex = match (self, minutes) {
            (Self::Car, 10) => "#a6cee3",
            (Self::Car, 15) => "#6baed6",
            (Self::Car, 30) => "#1f78b4",
            (Self::Car, 40) => "#b2df8a",
            (Self::Car, 45) => "#33a02c",
            (Self::Car, 60) => "#fb9a99",
            (Self::Walk, 10) => "#a1d99b",
            (Self::Walk, 15) => "#31a354",
            _ => return None,
        };
        Some(Color::from_static(hex))
    }
}

/// Errors raised when building or parsing an [`IsochroneKey`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidKey {
    /// The key string does not have the expected shape.
    #[error("Invalid isochrone key {input:?}: {message}")]
    Format {
        /// The offending input.
        input: String,
        /// What is wrong with it.
        message: String,
    },

    /// Unknown travel mode or routing profile.
    #[error("Unknown travel mode: {mode}")]
    UnknownMode {
        /// The unrecognized mode.
        mode: String,
    },

    /// The duration is not allowed for the mode.
    #[error("Unsupported duration for {mode}: {minutes} min")]
    UnsupportedDuration {
        /// Travel mode.
        mode: TravelMode,
        /// Requested duration.
        minutes: u16,
    },

    /// NaN or infinite coordinate.
    #[error("Non-finite origin coordinate")]
    NonFiniteCoordinate,

    /// Coordinate outside the WGS84 range.
    #[error("Origin out of range: lat={lat}, lon={lon}")]
    OutOfRange {
        /// Latitude.
        lat: f64,
        /// Longitude.
        lon: f64,
    },
}

/// Where a cached polygon came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Id of the provider that computed the polygon.
    pub provider: String,
    /// When it was fetched (UTC).
    pub fetched_at: DateTime<Utc>,
}

impl Provenance {
    /// Provenance of a polygon fetched now.
    #[must_use]
    pub fn now(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            fetched_at: Utc::now(),
        }
    }

    /// Returns `true` for entries imported from the legacy cache file.
    #[must_use]
    pub fn is_legacy_import(&self) -> bool {
        self.provider == LEGACY_IMPORT_PROVIDER
    }
}

/// A normalized isochrone polygon with the key that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsochronePolygon {
    /// Cache key.
    pub key: IsochroneKey,
    /// Normalized geometry (`x = lon`, `y = lat`).
    pub geometry: MultiPolygon<f64>,
    /// Provider and fetch time.
    pub provenance: Provenance,
}

/// What a routing provider is asked for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsochroneRequest {
    /// Rounded origin latitude.
    pub lat: f64,
    /// Rounded origin longitude.
    pub lon: f64,
    /// Travel mode.
    pub mode: TravelMode,
    /// Duration in seconds.
    pub seconds: u32,
}

impl From<&IsochroneKey> for IsochroneRequest {
    fn from(key: &IsochroneKey) -> Self {
        Self {
            lat: key.lat(),
            lon: key.lon(),
            mode: key.mode(),
            seconds: key.seconds(),
        }
    }
}
