//! Facility label mapping.
//!
//! Maps the free-text category labels of the facility registry onto the
//! canonical taxonomy. Labels are hand-typed and carry spelling variants
//! (`"Inserttion : IAE"`, `"Parentialité"`), so classification uses
//! case-insensitive keyword detection instead of exact matching.

use fusion_map_facility_models::{FacilityCategory, FacilitySubcategory};

/// Detects the top-level category of a raw label.
///
/// Returns `None` when no keyword matches. Never returns
/// [`FacilityCategory::Uncategorized`].
#[must_use]
pub fn map_category(raw: &str) -> Option<FacilityCategory> {
    let lower = raw.to_lowercase();

    if lower.contains("formation") {
        return Some(FacilityCategory::Formation);
    }
    if lower.contains("protection") {
        return Some(FacilityCategory::ProtectionEnfance);
    }
    if contains_any(&lower, &["insertion", "inserttion"]) {
        return Some(FacilityCategory::Insertion);
    }
    if lower.contains("parent") {
        return Some(FacilityCategory::Parentalite);
    }

    None
}

/// Detects the sub-category of a raw label within an already known
/// category.
#[must_use]
pub fn map_subcategory(raw: &str, category: FacilityCategory) -> Option<FacilitySubcategory> {
    let lower = raw.to_lowercase();

    match category {
        FacilityCategory::Formation => {
            if contains_any(&lower, &["1ier deg", "1er deg", "premier deg"]) {
                Some(FacilitySubcategory::PremierDegre)
            } else if contains_any(&lower, &["college", "collège"]) {
                Some(FacilitySubcategory::College)
            } else if lower.contains("agricole") {
                Some(FacilitySubcategory::LyceeProAgricole)
            } else if contains_any(&lower, &["lycee pro", "lycée pro"]) {
                Some(FacilitySubcategory::LyceePro)
            } else if contains_any(&lower, &["post-bac", "post bac", "postbac"]) {
                Some(FacilitySubcategory::PostBac)
            } else {
                None
            }
        }
        FacilityCategory::ProtectionEnfance => {
            if lower.contains("mna") {
                Some(FacilitySubcategory::MecsMna)
            } else if lower.contains("fratrie") {
                Some(FacilitySubcategory::MecsFratrie)
            } else if lower.contains("aemo") {
                Some(FacilitySubcategory::MecsAemo)
            } else if contains_any(&lower, &["semi aut", "semi-aut"]) {
                Some(FacilitySubcategory::MecsSemiAutonomie)
            } else {
                None
            }
        }
        FacilityCategory::Insertion => {
            if lower.contains("iae") {
                Some(FacilitySubcategory::Iae)
            } else if lower.contains("dispo") {
                Some(FacilitySubcategory::DispositifInsertion)
            } else {
                None
            }
        }
        FacilityCategory::Parentalite => {
            if lower.contains("maison des familles") {
                Some(FacilitySubcategory::MaisonDesFamilles)
            } else if contains_any(&lower, &["creche", "crèche"]) {
                Some(FacilitySubcategory::Creches)
            } else if lower.contains("autres dispositifs") {
                Some(FacilitySubcategory::AutresDispositifsParentalite)
            } else {
                None
            }
        }
        FacilityCategory::Uncategorized => None,
    }
}

/// Returns `true` if `haystack` contains any of the given needles.
fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
