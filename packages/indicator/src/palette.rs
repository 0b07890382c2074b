//! Sequential color ramps for choropleth layers.

use fusion_map_geography_models::{Bucket, Color};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Color of units without data, in every palette.
pub const NO_DATA_COLOR: Color = Color::from_static("#cccccc");

static REDS: [Color; 7] = [
    Color::from_static("#fee5d9"),
    Color::from_static("#fcbba1"),
    Color::from_static("#fc9272"),
    Color::from_static("#fb6a4a"),
    Color::from_static("#ef3b2c"),
    Color::from_static("#cb181d"),
    Color::from_static("#99000d"),
];

static BLUES: [Color; 7] = [
    Color::from_static("#deebf7"),
    Color::from_static("#c6dbef"),
    Color::from_static("#9ecae1"),
    Color::from_static("#6baed6"),
    Color::from_static("#4292c6"),
    Color::from_static("#2171b5"),
    Color::from_static("#084594"),
];

static ORANGES: [Color; 7] = [
    Color::from_static("#feedde"),
    Color::from_static("#fdd0a2"),
    Color::from_static("#fdae6b"),
    Color::from_static("#fd8d3c"),
    Color::from_static("#f16913"),
    Color::from_static("#d94801"),
    Color::from_static("#8c2d04"),
];

static PURPLES: [Color; 7] = [
    Color::from_static("#f2f0f7"),
    Color::from_static("#dadaeb"),
    Color::from_static("#bcbddc"),
    Color::from_static("#9e9ac8"),
    Color::from_static("#807dba"),
    Color::from_static("#6a51a3"),
    Color::from_static("#4a1486"),
];

static GREENS: [Color; 7] = [
    Color::from_static("#edf8e9"),
    Color::from_static("#c7e9c0"),
    Color::from_static("#a1d99b"),
    Color::from_static("#74c476"),
    Color::from_static("#41ab5d"),
    Color::from_static("#238b45"),
    Color::from_static("#005a32"),
];

/// Named color ramps.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaletteName {
    /// Light to dark red.
    Reds,
    /// Light to dark blue.
    Blues,
    /// Light to dark orange.
    Oranges,
    /// Light to dark purple.
    Purples,
    /// Light to dark green.
    Greens,
}

impl PaletteName {
    /// Returns all palette names.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Reds,
            Self::Blues,
            Self::Oranges,
            Self::Purples,
            Self::Greens,
        ]
    }

    /// Returns the color ramp.
    #[must_use]
    pub fn palette(self) -> Palette {
        let colors: &'static [Color] = match self {
            Self::Reds => &REDS,
            Self::Blues => &BLUES,
            Self::Oranges => &ORANGES,
            Self::Purples => &PURPLES,
            Self::Greens => &GREENS,
        };
        Palette {
            colors,
            no_data: NO_DATA_COLOR,
        }
    }
}

/// An ordered color ramp, lightest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    /// Bucket colors.
    pub colors: &'static [Color],
    /// Color of [`Bucket::NoData`].
    pub no_data: Color,
}

impl Palette {
    /// Number of distinct bucket colors.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.colors.len()
    }

    /// Returns `true` if the ramp holds no color.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Color of a bucket. Indices past the end of the ramp reuse its
    /// darkest color.
    #[must_use]
    pub fn color_for(&self, bucket: Bucket) -> Color {
        match bucket {
            Bucket::NoData => self.no_data.clone(),
            Bucket::Index(i) => self
                .colors
                .get(i)
                .or_else(|| self.colors.last())
                .cloned()
                .unwrap_or_else(|| self.no_data.clone()),
        }
    }
}
