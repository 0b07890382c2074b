//! Origin CSV reader (`lat,lng[,title]`).

use std::io::Read;
use std::path::Path;

use fusion_map_isochrone_models::{IsochroneKey, TravelMode};
use serde::Deserialize;
use thiserror::Error;

/// Errors reading an origin file.
#[derive(Debug, Error)]
pub enum OriginsError {
    /// The file could not be opened or its header is unreadable.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path to the CSV file.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },
}

/// One row of the origin file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Origin {
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
    /// Optional label.
    #[serde(default)]
    pub title: Option<String>,
}

/// Reads origins from a CSV file with a `lat,lng[,title]` header.
///
/// # Errors
///
/// Returns [`OriginsError::Csv`] if the file cannot be opened.
pub fn read_origins_from_path(path: &Path) -> Result<Vec<Origin>, OriginsError> {
    let reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| OriginsError::Csv {
            path: path.display().to_string(),
            source: e,
        })?;

    Ok(collect_origins(reader))
}

/// Reads origins from any CSV source. Malformed rows are skipped.
pub fn read_origins(reader: impl Read) -> Vec<Origin> {
    collect_origins(
        csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader),
    )
}

fn collect_origins<R: Read>(mut reader: csv::Reader<R>) -> Vec<Origin> {
    let mut origins = Vec::new();
    for (row, result) in reader.deserialize::<Origin>().enumerate() {
        match result {
            Ok(origin) => origins.push(origin),
            Err(e) => log::warn!("Skipping malformed origin row {}: {e}", row + 1),
        }
    }
    origins
}

/// Every cache key for `origins` and `modes`. Origins that cannot form a
/// key are logged and skipped.
#[must_use]
pub fn keys_for(origins: &[Origin], modes: &[TravelMode]) -> Vec<IsochroneKey> {
    let mut keys = Vec::new();
    for origin in origins {
        for mode in modes {
            match IsochroneKey::all_for_origin(origin.lat, origin.lng, *mode) {
                Ok(origin_keys) => keys.extend(origin_keys),
                Err(e) => {
                    log::warn!(
                        "Skipping origin {} ({}, {}): {e}",
                        origin.title.as_deref().unwrap_or("untitled"),
                        origin.lat,
                        origin.lng
                    );
                    break;
                }
            }
        }
    }
    keys
}
