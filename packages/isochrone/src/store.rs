//! JSON file backing store.
//!
//! The file is a single object mapping encoded keys to entries:
//!
//! ```json
//! {
//!   "48.85661,2.35222,car,15": {
//!     "geometry": { "type": "MultiPolygon", "coordinates": [...] },
//!     "provider": "openrouteservice",
//!     "fetched_at": "2026-10-18T09:12:44.120Z"
//!   }
//! }
//! ```
//!
//! Entries written by the original generator
//! (`"{lat:.6}_{lng:.6}_{seconds}_{profile}"` mapped to a bare polygon
//! coordinate array) are imported on load and rewritten in the current
//! format on the next save.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fusion_map_isochrone_models::{
    IsochroneKey, IsochronePolygon, LEGACY_IMPORT_PROVIDER, Provenance,
};
use fusion_map_spatial::normalize::{
    multipolygon_from_geojson, multipolygon_from_polygon_coordinates, multipolygon_to_geojson,
    normalize_and_validate,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The cache file could not be read.
#[derive(Debug, Error)]
pub enum CacheLoadError {
    /// I/O failure other than "not found".
    #[error("Failed to read isochrone cache {path}: {source}")]
    Io {
        /// Cache file path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not a JSON object.
    #[error("Failed to parse isochrone cache {path}: {source}")]
    Parse {
        /// Cache file path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// The cache file could not be written. The previous file is untouched.
#[derive(Debug, Error)]
pub enum CachePersistError {
    /// Serialization failure.
    #[error("Failed to serialize isochrone cache: {0}")]
    Serialize(#[from] serde_json::Error),

    /// I/O failure while writing or renaming the temp file.
    #[error("Failed to write isochrone cache {path}: {source}")]
    Io {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// A cache file entry dropped during load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedEntry {
    /// Key as found in the file.
    pub key: String,
    /// Why it was dropped.
    pub reason: String,
}

/// What [`JsonFileStore::load`] found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Entries kept, legacy imports included.
    pub loaded: usize,
    /// Entries converted from the legacy format.
    pub legacy_imported: usize,
    /// Entries rejected (invalid key or geometry).
    pub dropped: Vec<DroppedEntry>,
    /// `false` when the file did not exist.
    pub file_found: bool,
}

/// Entries read from the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedEntries {
    /// Valid entries by key.
    pub entries: BTreeMap<IsochroneKey, IsochronePolygon>,
    /// Keys converted from the legacy format (to be rewritten).
    pub legacy_keys: Vec<IsochroneKey>,
    /// Load statistics.
    pub report: LoadReport,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    geometry: serde_json::Value,
    provider: String,
    fetched_at: DateTime<Utc>,
}

/// JSON snapshot file holding every cached isochrone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store for `path`. Nothing is read until [`Self::load`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the temp file used while saving (`<path>.tmp`).
    #[must_use]
    pub fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Reads the snapshot.
    ///
    /// A missing file yields an empty result. Entries with an invalid key
    /// or geometry are dropped with a warning and listed in the report.
    ///
    /// # Errors
    ///
    /// Returns [`CacheLoadError`] if the file exists but cannot be read or
    /// is not a JSON object.
    pub fn load(&self) -> Result<LoadedEntries, CacheLoadError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "No isochrone cache at {}, starting empty",
                    self.path.display()
                );
                return Ok(LoadedEntries::default());
            }
            Err(source) => {
                return Err(CacheLoadError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(&contents).map_err(|source| CacheLoadError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let mut loaded = LoadedEntries {
            report: LoadReport {
                file_found: true,
                ..LoadReport::default()
            },
            ..LoadedEntries::default()
        };
        let mut legacy = Vec::new();

        for (raw_key, value) in raw {
            if value.is_array() {
                legacy.push((raw_key, value));
                continue;
            }
            match decode_entry(&raw_key, value) {
                Ok(polygon) => {
                    loaded.entries.insert(polygon.key, polygon);
                }
                Err(reason) => drop_entry(&mut loaded.report, raw_key, reason),
            }
        }

        // Current-format entries win over legacy entries for the same key,
        // then the first legacy entry in raw key order.
        for (raw_key, value) in legacy {
            match decode_legacy_entry(&raw_key, &value) {
                Ok(polygon) if loaded.entries.contains_key(&polygon.key) => drop_entry(
                    &mut loaded.report,
                    raw_key,
                    format!("superseded by {}", polygon.key),
                ),
                Ok(polygon) => {
                    loaded.legacy_keys.push(polygon.key);
                    loaded.entries.insert(polygon.key, polygon);
                }
                Err(reason) => drop_entry(&mut loaded.report, raw_key, reason),
            }
        }

        loaded.report.loaded = loaded.entries.len();
        loaded.report.legacy_imported = loaded.legacy_keys.len();

        log::info!(
            "Loaded {} isochrones from {} ({} legacy, {} dropped)",
            loaded.report.loaded,
            self.path.display(),
            loaded.report.legacy_imported,
            loaded.report.dropped.len()
        );

        Ok(loaded)
    }

    /// Writes a full snapshot atomically: `<path>.tmp` then rename.
    ///
    /// The temp file is removed on every failure path.
    ///
    /// # Errors
    ///
    /// Returns [`CachePersistError`] if serialization, the write or the
    /// rename fails.
    pub fn save(
        &self,
        entries: &BTreeMap<IsochroneKey, IsochronePolygon>,
    ) -> Result<(), CachePersistError> {
        let mut stored = BTreeMap::new();
        for (key, polygon) in entries {
            let entry = StoredEntry {
                geometry: serde_json::to_value(multipolygon_to_geojson(&polygon.geometry))?,
                provider: polygon.provenance.provider.clone(),
                fetched_at: polygon.provenance.fetched_at,
            };
            stored.insert(key.to_string(), entry);
        }
        let contents = serde_json::to_string_pretty(&stored)?;

        let tmp_path = self.temp_path();
        let guard = TempFileGuard::new(&tmp_path);

        std::fs::write(&tmp_path, contents).map_err(|source| CachePersistError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|source| CachePersistError::Io {
            path: self.path.clone(),
            source,
        })?;
        guard.disarm();

        log::info!(
            "Saved {} isochrones to {}",
            entries.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Removes the temp file on drop unless disarmed.
struct TempFileGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> TempFileGuard<'a> {
    const fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.path.exists() {
            if let Err(e) = std::fs::remove_file(self.path) {
                log::warn!("Failed to remove {}: {e}", self.path.display());
            }
        }
    }
}

fn drop_entry(report: &mut LoadReport, key: String, reason: String) {
    log::warn!("Dropping isochrone cache entry {key}: {reason}");
    report.dropped.push(DroppedEntry { key, reason });
}

fn decode_entry(raw_key: &str, value: serde_json::Value) -> Result<IsochronePolygon, String> {
    let key: IsochroneKey = raw_key.parse().map_err(|e| format!("{e}"))?;
    let entry: StoredEntry = serde_json::from_value(value).map_err(|e| e.to_string())?;

    let geometry = multipolygon_from_geojson(&entry.geometry)
        .and_then(|g| normalize_and_validate(&g))
        .map_err(|e| e.to_string())?;

    Ok(IsochronePolygon {
        key,
        geometry,
        provenance: Provenance {
            provider: entry.provider,
            fetched_at: entry.fetched_at,
        },
    })
}

fn decode_legacy_entry(
    raw_key: &str,
    coordinates: &serde_json::Value,
) -> Result<IsochronePolygon, String> {
    let key = IsochroneKey::parse_legacy(raw_key).map_err(|e| format!("{e}"))?;

    let geometry = multipolygon_from_polygon_coordinates(coordinates)
        .and_then(|g| normalize_and_validate(&g))
        .map_err(|e| e.to_string())?;

    Ok(IsochronePolygon {
        key,
        geometry,
        provenance: Provenance::now(LEGACY_IMPORT_PROVIDER),
    })
}

#[cfg(test)]
mod tests {
    use fusion_map_isochrone_models::TravelMode;
    use geo::{MultiPolygon, polygon};

    use super::*;
    use crate::test_support::temp_path;

    fn entry(lat: f64, lon: f64, minutes: u16) -> IsochronePolygon {
        let key = IsochroneKey::new(lat, lon, TravelMode::Car, minutes).unwrap();
        IsochronePolygon {
            key,
            geometry: MultiPolygon(vec![polygon![
                (x: lon - 0.013_7, y: lat - 0.011_3),
                (x: lon + 0.021_9, y: lat - 0.011_3),
                (x: lon + 0.021_9, y: lat + 0.017_1),
                (x: lon - 0.013_7, y: lat + 0.017_1),
            ]]),
            provenance: Provenance::now("openrouteservice"),
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let store = JsonFileStore::new(temp_path("store_missing"));
        let loaded = store.load().unwrap();
        assert!(loaded.entries.is_empty());
        assert!(!loaded.report.file_found);
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let path = temp_path("store_garbage");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFileStore::new(&path).load(),
            Err(CacheLoadError::Parse { .. })
        ));

        std::fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(
            JsonFileStore::new(&path).load(),
            Err(CacheLoadError::Parse { .. })
        ));
    }

    #[test]
    fn save_then_load_is_exact() {
        let store = JsonFileStore::new(temp_path("store_round_trip"));
        let entries: BTreeMap<IsochroneKey, IsochronePolygon> = [
            entry(48.856_614, 2.352_222, 15),
            entry(45.764_043, 4.835_659, 60),
        ]
        .into_iter()
        .map(|e| (e.key, e))
        .collect();

        store.save(&entries).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.entries, entries);
        assert!(loaded.report.dropped.is_empty());
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn invalid_entries_are_dropped() {
        let path = temp_path("store_invalid");
        let good = entry(48.0, 2.0, 10);
        JsonFileStore::new(&path)
            .save(&BTreeMap::from([(good.key, good.clone())]))
            .unwrap();

        let mut raw: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let template = raw.values().next().unwrap().clone();

        let mut empty = template.clone();
        empty["geometry"] = serde_json::json!({"type": "MultiPolygon", "coordinates": []});
        raw.insert("48.10000,2.00000,car,10".to_string(), empty);

        let mut bowtie = template.clone();
        bowtie["geometry"] = serde_json::json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 1.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0]]]
        });
        raw.insert("48.20000,2.00000,car,10".to_string(), bowtie);

        raw.insert("not-a-key".to_string(), template);
        std::fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

        let loaded = JsonFileStore::new(&path).load().unwrap();

        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries[&good.key], good);
        assert_eq!(loaded.report.dropped.len(), 3);
    }

    #[test]
    fn imports_legacy_entries() {
        let path = temp_path("store_legacy");
        std::fs::write(
            &path,
            r#"{
                "48.856614_2.352222_900_driving-car": [[[2.34, 48.85], [2.36, 48.85], [2.36, 48.86], [2.34, 48.86], [2.34, 48.85]]],
                "48.856614_2.352222_600_foot-walking": [],
                "48.856614_2.352222_1200_foot-walking": [[[2.34, 48.85], [2.36, 48.85], [2.36, 48.86], [2.34, 48.85]]]
            }"#,
        )
        .unwrap();

        let loaded = JsonFileStore::new(&path).load().unwrap();

        let key = IsochroneKey::new(48.856_614, 2.352_222, TravelMode::Car, 15).unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert!(loaded.entries[&key].provenance.is_legacy_import());
        assert_eq!(loaded.legacy_keys, vec![key]);
        assert_eq!(loaded.report.legacy_imported, 1);
        assert_eq!(loaded.report.dropped.len(), 2);
    }

    #[test]
    fn colliding_legacy_entries_keep_the_first() {
        let path = temp_path("store_legacy_collision");
        std::fs::write(
            &path,
            r#"{
                "48.856611_2.352221_900_driving-car": [[[2.34, 48.85], [2.36, 48.85], [2.36, 48.86], [2.34, 48.86], [2.34, 48.85]]],
                "48.856614_2.352222_900_driving-car": [[[2.30, 48.80], [2.40, 48.80], [2.40, 48.90], [2.30, 48.90], [2.30, 48.80]]]
            }"#,
        )
        .unwrap();

        let loaded = JsonFileStore::new(&path).load().unwrap();

        let key = IsochroneKey::new(48.856_614, 2.352_222, TravelMode::Car, 15).unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.legacy_keys, vec![key]);
        assert_eq!(loaded.report.legacy_imported, 1);
        assert_eq!(loaded.report.loaded, 1);
        assert_eq!(loaded.report.dropped.len(), 1);
        assert_eq!(
            loaded.report.dropped[0].key,
            "48.856614_2.352222_900_driving-car"
        );
        let rect = geo::BoundingRect::bounding_rect(&loaded.entries[&key].geometry).unwrap();
        assert!((rect.max().x - 2.36).abs() < 1e-9);
    }

    #[test]
    fn failed_save_removes_temp_file_and_keeps_old_file() {
        let path = temp_path("store_fail");
        std::fs::create_dir_all(&path).unwrap();
        let store = JsonFileStore::new(&path);

        let e = entry(48.0, 2.0, 10);
        let result = store.save(&BTreeMap::from([(e.key, e)]));

        assert!(matches!(result, Err(CachePersistError::Io { .. })));
        assert!(!store.temp_path().exists());
        assert!(path.is_dir());
    }
}
