//! Joins indicator records to administrative units by code.

use std::collections::{BTreeMap, BTreeSet};

use fusion_map_geography_models::{
    AdministrativeUnit, EnrichedUnit, IndicatorRecord, IndicatorValue,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::IndicatorError;

/// Join configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinConfig {
    /// Indicator name -> the single year to keep when several exist.
    #[serde(default)]
    pub target_years: BTreeMap<String, u16>,
    /// Indicators every unit must carry, even when no record mentions
    /// them (they are filled with `NoData`).
    #[serde(default)]
    pub indicators: BTreeSet<String>,
}

impl JoinConfig {
    /// Sets the target year of `indicator` and declares it.
    #[must_use]
    pub fn with_target_year(mut self, indicator: impl Into<String>, year: u16) -> Self {
        let indicator = indicator.into();
        self.indicators.insert(indicator.clone());
        self.target_years.insert(indicator, year);
        self
    }
}

/// A recoverable, per-record problem found during the join.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JoinIssue {
    /// The configured year is absent, or several years exist and none is
    /// configured. The unit gets `NoData` for this indicator.
    #[error(
        "Indicator {indicator} for unit {code}: year {target:?} unavailable (available: {available:?})"
    )]
    MissingIndicatorYear {
        /// Unit code.
        code: String,
        /// Indicator name.
        indicator: String,
        /// Configured target year, if any.
        target: Option<u16>,
        /// Years present in the records.
        available: Vec<u16>,
    },

    /// A record references a code that matches no unit. The record is
    /// dropped.
    #[error("Unknown administrative code {code} for indicator {indicator} ({year})")]
    UnknownAdministrativeCode {
        /// The unmatched code.
        code: String,
        /// Indicator of the dropped record.
        indicator: String,
        /// Year of the dropped record.
        year: u16,
    },

    /// Several records with different values exist for the same
    /// (code, indicator, year). All of them are rejected.
    #[error("Conflicting records for {code}/{indicator}/{year}: {values:?}")]
    DuplicateIndicatorRecord {
        /// Unit code.
        code: String,
        /// Indicator name.
        indicator: String,
        /// Year.
        year: u16,
        /// The conflicting values.
        values: Vec<f64>,
    },

    /// The selected record holds NaN or an infinite value.
    #[error("Non-finite value for {code}/{indicator}/{year}")]
    NonFiniteValue {
        /// Unit code.
        code: String,
        /// Indicator name.
        indicator: String,
        /// Year.
        year: u16,
    },
}

/// Output of [`join`]: one enriched unit per input unit, in ascending code
/// order, plus every issue found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinOutcome {
    /// Enriched units.
    pub units: Vec<EnrichedUnit>,
    /// Recoverable problems, in discovery order.
    pub issues: Vec<JoinIssue>,
}

impl JoinOutcome {
    /// Codes of dropped records that matched no unit.
    #[must_use]
    pub fn unknown_codes(&self) -> BTreeSet<&str> {
        self.issues
            .iter()
            .filter_map(|issue| match issue {
                JoinIssue::UnknownAdministrativeCode { code, .. } => Some(code.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Finds an enriched unit by code.
    #[must_use]
    pub fn unit(&self, code: &str) -> Option<&EnrichedUnit> {
        self.units
            .binary_search_by(|unit| unit.code.as_str().cmp(code))
            .ok()
            .map(|i| &self.units[i])
    }
}

/// (code, indicator) -> year -> values seen.
type Grouped<'a> = BTreeMap<(&'a str, &'a str), BTreeMap<u16, Vec<f64>>>;

/// Joins indicator records to units.
///
/// # Errors
///
/// Returns [`IndicatorError::DuplicateAdministrativeCode`] if two units
/// share a code. Every other problem is reported in
/// [`JoinOutcome::issues`].
pub fn join(
    units: &[AdministrativeUnit],
    records: &[IndicatorRecord],
    config: &JoinConfig,
) -> Result<JoinOutcome, IndicatorError> {
    let mut by_code: BTreeMap<&str, &AdministrativeUnit> = BTreeMap::new();
    for unit in units {
        if by_code.insert(unit.code.as_str(), unit).is_some() {
            return Err(IndicatorError::DuplicateAdministrativeCode {
                code: unit.code.clone(),
            });
        }
    }

    let mut issues = Vec::new();
    let mut indicators: BTreeSet<&str> = config.indicators.iter().map(String::as_str).collect();
    let mut grouped: Grouped<'_> = BTreeMap::new();

    for record in records {
        if !by_code.contains_key(record.code.as_str()) {
            log::warn!(
                "Dropping {} ({}) record: unknown administrative code {}",
                record.indicator,
                record.year,
                record.code
            );
            issues.push(JoinIssue::UnknownAdministrativeCode {
                code: record.code.clone(),
                indicator: record.indicator.clone(),
                year: record.year,
            });
            continue;
        }

        indicators.insert(record.indicator.as_str());
        grouped
            .entry((record.code.as_str(), record.indicator.as_str()))
            .or_default()
            .entry(record.year)
            .or_default()
            .push(record.value);
    }

    let mut enriched = Vec::with_capacity(by_code.len());
    for (code, unit) in &by_code {
        let mut out = EnrichedUnit::from_unit(unit);

        for indicator in &indicators {
            let value = grouped.get(&(*code, *indicator)).map_or(
                IndicatorValue::NoData,
                |years| resolve(code, indicator, years, config, &mut issues),
            );
            out.indicators.insert((*indicator).to_string(), value);
        }

        enriched.push(out);
    }

    log::info!(
        "Joined {} indicator records onto {} units ({} indicators, {} issues)",
        records.len(),
        enriched.len(),
        indicators.len(),
        issues.len()
    );

    Ok(JoinOutcome {
        units: enriched,
        issues,
    })
}

/// Picks the value of one (code, indicator) pair.
fn resolve(
    code: &str,
    indicator: &str,
    years: &BTreeMap<u16, Vec<f64>>,
    config: &JoinConfig,
    issues: &mut Vec<JoinIssue>,
) -> IndicatorValue {
    let target = config.target_years.get(indicator).copied();

    let selected = match target {
        Some(year) => years.get_key_value(&year),
        None if years.len() == 1 => years.iter().next(),
        None => None,
    };

    let Some((&year, values)) = selected else {
        issues.push(JoinIssue::MissingIndicatorYear {
            code: code.to_string(),
            indicator: indicator.to_string(),
            target,
            available: years.keys().copied().collect(),
        });
        return IndicatorValue::NoData;
    };

    let first = values[0];
    if values.iter().any(|v| v.to_bits() != first.to_bits()) {
        issues.push(JoinIssue::DuplicateIndicatorRecord {
            code: code.to_string(),
            indicator: indicator.to_string(),
            year,
            values: values.clone(),
        });
        return IndicatorValue::NoData;
    }
    if values.len() > 1 {
        log::debug!("Collapsed {} identical {indicator} records for {code} ({year})", values.len());
    }

    if !first.is_finite() {
        issues.push(JoinIssue::NonFiniteValue {
            code: code.to_string(),
            indicator: indicator.to_string(),
            year,
        });
        return IndicatorValue::NoData;
    }

    IndicatorValue::Value(first)
}

/// Collects one indicator across enriched units (code -> value).
#[must_use]
pub fn indicator_values(
    units: &[EnrichedUnit],
    indicator: &str,
) -> BTreeMap<String, IndicatorValue> {
    units
        .iter()
        .map(|unit| (unit.code.clone(), unit.indicator(indicator)))
        .collect()
}
