//! Cache content summary.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use fusion_map_isochrone_models::{IsochroneKey, TravelMode};

/// Entry counts per travel mode and duration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// (mode, minutes) -> number of entries.
    pub counts: BTreeMap<(TravelMode, u16), usize>,
    /// Number of distinct rounded origins.
    pub origins: usize,
}

impl CacheStats {
    /// Tallies a set of keys.
    #[must_use]
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a IsochroneKey>) -> Self {
        let mut counts = BTreeMap::new();
        let mut origins = std::collections::BTreeSet::new();

        for key in keys {
            *counts.entry((key.mode(), key.minutes())).or_insert(0) += 1;
            origins.insert((key.lat_e5(), key.lon_e5()));
        }

        Self {
            counts,
            origins: origins.len(),
        }
    }

    /// Total number of entries.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Renders the table printed by `fusion_map stats`.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<6} {:>8} {:>8}", "MODE", "MINUTES", "ENTRIES");
        let _ = writeln!(out, "{}", "-".repeat(24));

        for mode in TravelMode::all() {
            for minutes in mode.allowed_minutes() {
                let count = self.counts.get(&(*mode, *minutes)).copied().unwrap_or(0);
                let _ = writeln!(out, "{:<6} {minutes:>8} {count:>8}", mode.to_string());
            }
        }

        let _ = writeln!(
            out,
            "\n{} entries across {} origins",
            self.total(),
            self.origins
        );
        out
    }
}
