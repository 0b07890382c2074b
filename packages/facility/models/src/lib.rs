#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Facility category taxonomy types.
//!
//! Facilities (schools, child-protection homes, insertion schemes,
//! parenting services) are classified into a closed two-level taxonomy.
//! Raw source labels are mapped onto it by `fusion_map_facility`.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Top-level facility categories.
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FacilityCategory {
    /// Schools and training
    Formation,
    /// Child protection homes and services
    ProtectionEnfance,
    /// Professional insertion schemes
    Insertion,
    /// Parenting and early-childhood services
    Parentalite,
    /// Facilities whose label matched no category
    Uncategorized,
}

impl FacilityCategory {
    /// Returns all categories.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Formation,
            Self::ProtectionEnfance,
            Self::Insertion,
            Self::Parentalite,
            Self::Uncategorized,
        ]
    }

    /// Display label used in legends.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Formation => "Formation",
            Self::ProtectionEnfance => "Protection de l'enfance",
            Self::Insertion => "Insertion",
            Self::Parentalite => "Parentalité",
            Self::Uncategorized => "Autre",
        }
    }
}

/// Facility sub-categories. Each belongs to exactly one
/// [`FacilityCategory`].
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FacilitySubcategory {
    // Formation
    /// Primary school
    PremierDegre,
    /// Middle school
    College,
    /// Vocational high school
    LyceePro,
    /// Agricultural vocational high school
    LyceeProAgricole,
    /// Higher education
    PostBac,

    // Protection de l'enfance
    /// Children's home for unaccompanied minors
    MecsMna,
    /// Children's home for siblings
    MecsFratrie,
    /// Open-environment educational support
    MecsAemo,
    /// Semi-autonomy housing
    MecsSemiAutonomie,

    // Insertion
    /// Generic insertion scheme
    DispositifInsertion,
    /// Insertion through economic activity
    Iae,

    // Parentalité
    /// Family centre
    MaisonDesFamilles,
    /// Nursery
    Creches,
    /// Other parenting schemes
    AutresDispositifsParentalite,
}

impl FacilitySubcategory {
    /// Returns the parent category.
    #[must_use]
    pub const fn category(self) -> FacilityCategory {
        match self {
            Self::PremierDegre
            | Self::College
            | Self::LyceePro
            | Self::LyceeProAgricole
            | Self::PostBac => FacilityCategory::Formation,

            Self::MecsMna | Self::MecsFratrie | Self::MecsAemo | Self::MecsSemiAutonomie => {
                FacilityCategory::ProtectionEnfance
            }

            Self::DispositifInsertion | Self::Iae => FacilityCategory::Insertion,

            Self::MaisonDesFamilles | Self::Creches | Self::AutresDispositifsParentalite => {
                FacilityCategory::Parentalite
            }
        }
    }

    /// Canonical source label, spelled as in the facility registry.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PremierDegre => "Formation : 1ier deg",
            Self::College => "Formation : College",
            Self::LyceePro => "Formation : Lycee pro",
            Self::LyceeProAgricole => "Formation : Lycee pro agricole",
            Self::PostBac => "Formation : Post-bac",
            Self::MecsMna => "Protection de l'enfance : MECs MNA",
            Self::MecsFratrie => "Protection de l'enfance : MECs Fratrie",
            Self::MecsAemo => "Protection de l'enfance : MECs AEMO",
            Self::MecsSemiAutonomie => "Protection de l'enfance : MECs Semi autnomie",
            Self::DispositifInsertion => "Insertion: Dispo insertion",
            Self::Iae => "Inserttion : IAE",
            Self::MaisonDesFamilles => "Parentialité : Maison des familles",
            Self::Creches => "Parentalité : Creches",
            Self::AutresDispositifsParentalite => "Parentalité : Autres dispositifs parentalité",
        }
    }

    /// Returns all sub-categories belonging to a category.
    #[must_use]
    pub fn for_category(category: FacilityCategory) -> Vec<Self> {
        Self::all()
            .iter()
            .copied()
            .filter(|sub| sub.category() == category)
            .collect()
    }

    /// Returns all sub-categories.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::PremierDegre,
            Self::College,
            Self::LyceePro,
            Self::LyceeProAgricole,
            Self::PostBac,
            Self::MecsMna,
            Self::MecsFratrie,
            Self::MecsAemo,
            Self::MecsSemiAutonomie,
            Self::DispositifInsertion,
            Self::Iae,
            Self::MaisonDesFamilles,
            Self::Creches,
            Self::AutresDispositifsParentalite,
        ]
    }
}

/// Policy applied to labels that match no category.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
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
pub enum UnknownCategoryPolicy {
    /// Refuse the facility.
    #[default]
    Reject,
    /// Keep it under [`FacilityCategory::Uncategorized`].
    Uncategorized,
}

/// A facility with a classified category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    /// Source identifier.
    pub id: String,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lon: f64,
    /// Top-level category.
    pub category: FacilityCategory,
    /// Sub-category, when the label names one.
    pub subcategory: Option<FacilitySubcategory>,
    /// Display name.
    pub name: String,
}

/// A facility as found in the source registry, before classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFacility {
    /// Source identifier.
    pub id: String,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lon: f64,
    /// Free-text category label, e.g. `"Formation : College"`.
    pub category_label: String,
    /// Display name.
    pub name: String,
}
