//! Cache key of one isochrone.
//!
//! Origins are rounded half away from zero to 5 decimal places and stored
//! as integer 1e-5 degree units, so two origins that round to the same
//! value share one cache entry and key equality never depends on float
//! comparison.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{InvalidKey, TravelMode};

/// Key scale: 1e-5 degree per unit.
const SCALE: f64 = 100_000.0;

/// An isochrone cache key: rounded origin, travel mode and duration.
///
/// Encoded as `lat,lon,mode,minutes` with 5 fixed decimals, e.g.
/// `48.85661,2.35222,car,15`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsochroneKey {
    lat_e5: i64,
    lon_e5: i64,
    mode: TravelMode,
    minutes: u16,
}

impl IsochroneKey {
    /// Builds a key from a raw origin.
    ///
    /// # Errors
    ///
    /// * [`InvalidKey::NonFiniteCoordinate`] for NaN or infinite input
    /// * [`InvalidKey::OutOfRange`] outside `[-90, 90] x [-180, 180]`
    /// * [`InvalidKey::UnsupportedDuration`] if `minutes` is not allowed
    ///   for `mode`
    pub fn new(lat: f64, lon: f64, mode: TravelMode, minutes: u16) -> Result<Self, InvalidKey> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(InvalidKey::NonFiniteCoordinate);
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(InvalidKey::OutOfRange { lat, lon });
        }
        if !mode.allowed_minutes().contains(&minutes) {
            return Err(InvalidKey::UnsupportedDuration { mode, minutes });
        }

        Ok(Self {
            lat_e5: round_e5(lat),
            lon_e5: round_e5(lon),
            mode,
            minutes,
        })
    }

    /// Every allowed key for an origin and mode, shortest duration first.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidKey`] if the origin is invalid.
    pub fn all_for_origin(lat: f64, lon: f64, mode: TravelMode) -> Result<Vec<Self>, InvalidKey> {
        mode.allowed_minutes()
            .iter()
            .map(|minutes| Self::new(lat, lon, mode, *minutes))
            .collect()
    }

    /// Parses the original cache key format
    /// `{lat:.6}_{lng:.6}_{seconds}_{profile}` where profile is
    /// `driving-car` or `foot-walking`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidKey`] if the key is malformed, the profile is
    /// unknown or the duration is not a whole allowed number of minutes.
    pub fn parse_legacy(input: &str) -> Result<Self, InvalidKey> {
        let format_error = |message: &str| InvalidKey::Format {
            input: input.to_string(),
            message: message.to_string(),
        };

        let parts: Vec<&str> = input.split('_').collect();
        let [lat, lon, seconds, profile] = parts.as_slice() else {
            return Err(format_error("expected lat_lng_seconds_profile"));
        };

        let lat: f64 = lat.parse().map_err(|_| format_error("invalid latitude"))?;
        let lon: f64 = lon.parse().map_err(|_| format_error("invalid longitude"))?;
        let seconds: u32 = seconds
            .parse()
            .map_err(|_| format_error("invalid duration"))?;
        let mode = TravelMode::from_profile(profile).ok_or_else(|| InvalidKey::UnknownMode {
            mode: (*profile).to_string(),
        })?;

        if seconds % 60 != 0 {
            return Err(format_error("duration is not a whole number of minutes"));
        }
        let minutes =
            u16::try_from(seconds / 60).map_err(|_| format_error("duration out of range"))?;

        Self::new(lat, lon, mode, minutes)
    }

    /// Rounded latitude.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn lat(&self) -> f64 {
        self.lat_e5 as f64 / SCALE
    }

    /// Rounded longitude.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn lon(&self) -> f64 {
        self.lon_e5 as f64 / SCALE
    }

    /// Latitude in 1e-5 degree units.
    #[must_use]
    pub const fn lat_e5(&self) -> i64 {
        self.lat_e5
    }

    /// Longitude in 1e-5 degree units.
    #[must_use]
    pub const fn lon_e5(&self) -> i64 {
        self.lon_e5
    }

    /// Travel mode.
    #[must_use]
    pub const fn mode(&self) -> TravelMode {
        self.mode
    }

    /// Duration in minutes.
    #[must_use]
    pub const fn minutes(&self) -> u16 {
        self.minutes
    }

    /// Duration in seconds, as sent to routing providers.
    #[must_use]
    pub fn seconds(&self) -> u32 {
        u32::from(self.minutes) * 60
    }

    /// Returns `true` if both keys share the same rounded origin.
    #[must_use]
    pub const fn same_origin(&self, other: &Self) -> bool {
        self.lat_e5 == other.lat_e5 && self.lon_e5 == other.lon_e5
    }
}

#[allow(clippy::cast_possible_truncation)]
fn round_e5(value: f64) -> i64 {
    (value * SCALE).round() as i64
}

/// Writes a 1e-5 fixed-point value with exactly 5 decimals.
fn write_e5(f: &mut fmt::Formatter<'_>, value: i64) -> fmt::Result {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    write!(f, "{sign}{}.{:05}", abs / 100_000, abs % 100_000)
}

impl fmt::Display for IsochroneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_e5(f, self.lat_e5)?;
        f.write_str(",")?;
        write_e5(f, self.lon_e5)?;
        write!(f, ",{},{}", self.mode, self.minutes)
    }
}

impl FromStr for IsochroneKey {
    type Err = InvalidKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_error = |message: &str| InvalidKey::Format {
            input: s.to_string(),
            message: message.to_string(),
        };

        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [lat, lon, mode, minutes] = parts.as_slice() else {
            return Err(format_error("expected lat,lon,mode,minutes"));
        };

        let lat: f64 = lat.parse().map_err(|_| format_error("invalid latitude"))?;
        let lon: f64 = lon.parse().map_err(|_| format_error("invalid longitude"))?;
        let mode = TravelMode::from_str(mode).map_err(|_| InvalidKey::UnknownMode {
            mode: (*mode).to_string(),
        })?;
        let minutes: u16 = minutes
            .parse()
            .map_err(|_| format_error("invalid duration"))?;

        Self::new(lat, lon, mode, minutes)
    }
}

impl Serialize for IsochroneKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IsochroneKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
