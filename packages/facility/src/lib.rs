#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Facility category mapper.
//!
//! Classifies raw facility labels into the closed taxonomy of
//! `fusion_map_facility_models` and assigns marker colors. Labels matching
//! no category are handled by an explicit [`UnknownCategoryPolicy`].

pub mod type_mapping;

use fusion_map_facility_models::{
    Facility, FacilityCategory, FacilitySubcategory, RawFacility, UnknownCategoryPolicy,
};
use fusion_map_geography_models::Color;
use thiserror::Error;

/// Errors that can occur while classifying facilities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FacilityError {
    /// The label matches no category and the policy rejects it.
    #[error("Unknown facility category: {label:?}")]
    UnknownCategory {
        /// The raw label.
        label: String,
    },
}

/// Classifies a raw label.
///
/// # Errors
///
/// Returns [`FacilityError::UnknownCategory`] if the label matches no
/// category.
pub fn classify(
    raw_label: &str,
) -> Result<(FacilityCategory, Option<FacilitySubcategory>), FacilityError> {
    let category =
        type_mapping::map_category(raw_label).ok_or_else(|| FacilityError::UnknownCategory {
            label: raw_label.to_string(),
        })?;

    Ok((category, type_mapping::map_subcategory(raw_label, category)))
}

/// Marker color of a category.
#[must_use]
pub const fn category_color(category: FacilityCategory) -> Color {
    match category {
        FacilityCategory::Formation => Color::from_static("#0984e3"),
        FacilityCategory::ProtectionEnfance => Color::from_static("#d63031"),
        FacilityCategory::Insertion => Color::from_static("#6c5ce7"),
        FacilityCategory::Parentalite => Color::from_static("#00b894"),
        FacilityCategory::Uncategorized => Color::from_static("#636e72"),
    }
}

/// Marker color of a sub-category.
#[must_use]
pub const fn subcategory_color(subcategory: FacilitySubcategory) -> Color {
    match subcategory {
        FacilitySubcategory::PremierDegre => Color::from_static("#74b9ff"),
        FacilitySubcategory::College => Color::from_static("#0984e3"),
        FacilitySubcategory::LyceePro => Color::from_static("#0652dd"),
        FacilitySubcategory::LyceeProAgricole => Color::from_static("#1b1464"),
        FacilitySubcategory::PostBac => Color::from_static("#0c2461"),
        FacilitySubcategory::MecsMna => Color::from_static("#ff7675"),
        FacilitySubcategory::MecsFratrie => Color::from_static("#d63031"),
        FacilitySubcategory::MecsAemo => Color::from_static("#b71540"),
        FacilitySubcategory::MecsSemiAutonomie => Color::from_static("#6f1e51"),
        FacilitySubcategory::DispositifInsertion => Color::from_static("#a29bfe"),
        FacilitySubcategory::Iae => Color::from_static("#6c5ce7"),
        FacilitySubcategory::MaisonDesFamilles => Color::from_static("#55efc4"),
        FacilitySubcategory::Creches => Color::from_static("#00b894"),
        FacilitySubcategory::AutresDispositifsParentalite => Color::from_static("#006266"),
    }
}

/// Classifies raw facilities under a fixed [`UnknownCategoryPolicy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FacilityCategoryMapper {
    /// What to do with labels matching no category.
    pub policy: UnknownCategoryPolicy,
}

impl FacilityCategoryMapper {
    /// Creates a mapper.
    #[must_use]
    pub const fn new(policy: UnknownCategoryPolicy) -> Self {
        Self { policy }
    }

    /// Builds a classified [`Facility`] from a raw registry row.
    ///
    /// # Errors
    ///
    /// Returns [`FacilityError::UnknownCategory`] if the label matches no
    /// category and the policy is [`UnknownCategoryPolicy::Reject`].
    pub fn facility_from_raw(&self, raw: &RawFacility) -> Result<Facility, FacilityError> {
        let (category, subcategory) = match classify(&raw.category_label) {
            Ok(classified) => classified,
            Err(e) => match self.policy {
                UnknownCategoryPolicy::Reject => return Err(e),
                UnknownCategoryPolicy::Uncategorized => {
                    log::warn!(
                        "Facility {} ({}): unknown category {:?}, kept as uncategorized",
                        raw.id,
                        raw.name,
                        raw.category_label
                    );
                    (FacilityCategory::Uncategorized, None)
                }
            },
        };

        Ok(Facility {
            id: raw.id.clone(),
            lat: raw.lat,
            lon: raw.lon,
            category,
            subcategory,
            name: raw.name.clone(),
        })
    }

    /// Marker color of a facility. The sub-category color wins over the
    /// category color.
    #[must_use]
    pub const fn color_for(&self, facility: &Facility) -> Color {
        match facility.subcategory {
            Some(sub) => subcategory_color(sub),
            None => category_color(facility.category),
        }
    }

    /// Marker color of a raw label, falling back to the uncategorized
    /// color when it matches nothing.
    #[must_use]
    pub fn color_for_label(&self, label: &str) -> Color {
        match classify(label) {
            Ok((_, Some(sub))) => subcategory_color(sub),
            Ok((category, None)) => category_color(category),
            Err(_) => category_color(FacilityCategory::Uncategorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(label: &str) -> RawFacility {
        RawFacility {
            id: "F1".to_string(),
            lat: 48.8566,
            lon: 2.3522,
            category_label: label.to_string(),
            name: "Collège Jean Moulin".to_string(),
        }
    }

    #[test]
    fn classifies_known_labels() {
        assert_eq!(
            classify("Formation : College"),
            Ok((FacilityCategory::Formation, Some(FacilitySubcategory::College)))
        );
        assert_eq!(
            classify("Inserttion : IAE"),
            Ok((FacilityCategory::Insertion, Some(FacilitySubcategory::Iae)))
        );
    }

    #[test]
    fn reject_policy_refuses_unknown_labels() {
        let mapper = FacilityCategoryMapper::default();
        assert_eq!(
            mapper.facility_from_raw(&raw("Santé : PMI")),
            Err(FacilityError::UnknownCategory {
                label: "Santé : PMI".to_string()
            })
        );
    }

    #[test]
    fn uncategorized_policy_keeps_unknown_labels() {
        let mapper = FacilityCategoryMapper::new(UnknownCategoryPolicy::Uncategorized);
        let facility = mapper.facility_from_raw(&raw("Santé : PMI")).unwrap();

        assert_eq!(facility.category, FacilityCategory::Uncategorized);
        assert_eq!(facility.subcategory, None);
        assert_eq!(mapper.color_for(&facility).as_str(), "#636e72");
    }

    #[test]
    fn subcategory_color_wins() {
        let mapper = FacilityCategoryMapper::default();
        let facility = mapper
            .facility_from_raw(&raw("Formation : 1ier deg"))
            .unwrap();

        assert_eq!(facility.subcategory, Some(FacilitySubcategory::PremierDegre));
        assert_eq!(mapper.color_for(&facility).as_str(), "#74b9ff");
    }

    #[test]
    fn category_color_without_subcategory() {
        let mapper = FacilityCategoryMapper::default();
        assert_eq!(mapper.color_for_label("Protection de l'enfance").as_str(), "#d63031");
        assert_eq!(mapper.color_for_label("Formation : CFA").as_str(), "#0984e3");
        assert_eq!(mapper.color_for_label("???").as_str(), "#636e72");
    }

    #[test]
    fn all_colors_are_hex() {
        for category in FacilityCategory::all() {
            assert!(category_color(*category).is_hex_rgb());
        }
        for sub in FacilitySubcategory::all() {
            assert!(subcategory_color(*sub).is_hex_rgb());
        }
    }
}
