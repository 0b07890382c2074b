//! Indicator layer registry, loaded from embedded TOML configs.
//!
//! Each `.toml` file in `packages/fusion/layers/` is baked into the binary
//! at compile time via [`include_str!`]. Adding a choropleth layer is as
//! simple as creating a new TOML file and adding it to the list below.

use fusion_map_indicator::BucketPolicy;
use fusion_map_indicator::palette::PaletteName;
use serde::{Deserialize, Serialize};

/// One choropleth layer: which indicator, how to bucket it and which
/// colors to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDefinition {
    /// Unique layer id, used as the style key on enriched units.
    pub id: String,
    /// Legend title.
    pub name: String,
    /// Indicator colored by this layer.
    pub indicator: String,
    /// Color ramp.
    pub palette: PaletteName,
    /// Number of buckets.
    pub bucket_count: usize,
    /// Year to keep when the indicator has several.
    #[serde(default)]
    pub target_year: Option<u16>,
    /// Bucketization policy.
    pub policy: BucketPolicy,
}

/// TOML configs embedded at compile time.
const LAYER_TOMLS: &[(&str, &str)] = &[
    ("chomage", include_str!("../layers/chomage.toml")),
    ("pauvrete", include_str!("../layers/pauvrete.toml")),
    ("neets", include_str!("../layers/neets.toml")),
    ("sans_diplome", include_str!("../layers/sans_diplome.toml")),
    ("qpv", include_str!("../layers/qpv.toml")),
];

#[cfg(test)]
const EXPECTED_LAYER_COUNT: usize = 5;

/// Returns every configured layer, in display order.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_layers() -> Vec<LayerDefinition> {
    LAYER_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse layer '{name}': {e}"))
        })
        .collect()
}

/// Returns the layer with the given id.
#[must_use]
pub fn layer(id: &str) -> Option<LayerDefinition> {
    all_layers().into_iter().find(|layer| layer.id == id)
}
