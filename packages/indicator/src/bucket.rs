//! Maps indicator values to ordered color buckets.
//!
//! Two policies are supported:
//!
//! * [`BucketPolicy::Quantile`] sorts the units with data by value (ties
//!   broken by code) and splits them into `k` buckets whose sizes differ
//!   by at most one, larger buckets first.
//! * [`BucketPolicy::FixedThreshold`] uses `k - 1` ascending thresholds; a
//!   value goes to the first bucket whose threshold it does not exceed.
//!
//! Units without data always get [`Bucket::NoData`].

use std::collections::BTreeMap;

use fusion_map_geography_models::{Bucket, BucketRange, IndicatorValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of buckets of the priority-zone count scale.
pub const ZONE_COUNT_BUCKETS: usize = 7;

/// Upper bounds of the first six priority-zone count buckets: 0, 1, 2,
/// 3, 4-5, 6-10 and more than 10 zones.
pub const ZONE_COUNT_THRESHOLDS: [f64; ZONE_COUNT_BUCKETS - 1] = [0.0, 1.0, 2.0, 3.0, 5.0, 10.0];

/// Bucketization policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BucketPolicy {
    /// Equal-count buckets over the units with data.
    Quantile,
    /// Explicit ascending upper bounds.
    FixedThreshold {
        /// `k - 1` strictly ascending, finite thresholds.
        thresholds: Vec<f64>,
    },
}

/// Errors raised by [`bucketize`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BucketError {
    /// `k` must be at least 1.
    #[error("Invalid bucket count: {count}")]
    InvalidBucketCount {
        /// The requested bucket count.
        count: usize,
    },

    /// The thresholds are not `k - 1` strictly ascending finite values.
    #[error("Invalid thresholds for {count} buckets: {message}")]
    InvalidThresholds {
        /// The requested bucket count.
        count: usize,
        /// What is wrong with them.
        message: String,
    },
}

/// Result of [`bucketize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Bucketing {
    /// Unit code -> bucket. Every input unit is present.
    pub assignments: BTreeMap<String, Bucket>,
    /// One range per bucket, in bucket order.
    pub ranges: Vec<BucketRange>,
    /// Number of buckets.
    pub bucket_count: usize,
}

impl Bucketing {
    /// The bucket of a unit, `None` if the unit was not bucketized.
    #[must_use]
    pub fn bucket(&self, code: &str) -> Option<Bucket> {
        self.assignments.get(code).copied()
    }

    /// Number of units per bucket, in bucket order.
    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        self.ranges.iter().map(|range| range.count).collect()
    }

    /// Number of units assigned to [`Bucket::NoData`].
    #[must_use]
    pub fn no_data_count(&self) -> usize {
        self.assignments
            .values()
            .filter(|bucket| **bucket == Bucket::NoData)
            .count()
    }
}

/// Assigns every unit to a bucket.
///
/// Units whose value is `NoData` (or non-finite) get [`Bucket::NoData`]
/// and are excluded from the value ranges. The result only depends on the
/// input values, never on the iteration order of the map.
///
/// # Errors
///
/// * [`BucketError::InvalidBucketCount`] if `bucket_count` is 0
/// * [`BucketError::InvalidThresholds`] if a fixed-threshold policy does
///   not carry `bucket_count - 1` strictly ascending finite thresholds
pub fn bucketize(
    values: &BTreeMap<String, IndicatorValue>,
    bucket_count: usize,
    policy: &BucketPolicy,
) -> Result<Bucketing, BucketError> {
    if bucket_count == 0 {
        return Err(BucketError::InvalidBucketCount {
            count: bucket_count,
        });
    }

    let mut assignments = BTreeMap::new();
    let mut with_data: Vec<(&str, f64)> = Vec::with_capacity(values.len());

    for (code, value) in values {
        match value.value() {
            Some(v) if v.is_finite() => with_data.push((code.as_str(), v)),
            _ => {
                assignments.insert(code.clone(), Bucket::NoData);
            }
        }
    }

    with_data.sort_by(|(a_code, a), (b_code, b)| a.total_cmp(b).then_with(|| a_code.cmp(b_code)));

    let indices = match policy {
        BucketPolicy::Quantile => quantile_indices(with_data.len(), bucket_count),
        BucketPolicy::FixedThreshold { thresholds } => {
            validate_thresholds(thresholds, bucket_count)?;
            with_data
                .iter()
                .map(|(_, v)| threshold_index(*v, thresholds))
                .collect()
        }
    };

    let mut ranges: Vec<BucketRange> = (0..bucket_count)
        .map(|index| BucketRange {
            index,
            min: None,
            max: None,
            count: 0,
        })
        .collect();

    for ((code, value), index) in with_data.iter().zip(indices) {
        let range = &mut ranges[index];
        range.min = Some(range.min.map_or(*value, |m| m.min(*value)));
        range.max = Some(range.max.map_or(*value, |m| m.max(*value)));
        range.count += 1;
        assignments.insert((*code).to_string(), Bucket::Index(index));
    }

    log::debug!(
        "Bucketized {} units into {bucket_count} buckets ({} without data)",
        values.len(),
        values.len() - with_data.len()
    );

    Ok(Bucketing {
        assignments,
        ranges,
        bucket_count,
    })
}

/// Bucket index of each position in a sorted list of `n` values.
///
/// Bucket `i` holds `n / k + 1` values when `i < n % k`, `n / k`
/// otherwise.
fn quantile_indices(n: usize, k: usize) -> Vec<usize> {
    let base = n / k;
    let extra = n % k;

    let mut indices = Vec::with_capacity(n);
    for bucket in 0..k {
        let size = base + usize::from(bucket < extra);
        indices.extend(std::iter::repeat_n(bucket, size));
    }
    indices
}

fn threshold_index(value: f64, thresholds: &[f64]) -> usize {
    thresholds
        .iter()
        .position(|t| value <= *t)
        .unwrap_or(thresholds.len())
}

fn validate_thresholds(thresholds: &[f64], bucket_count: usize) -> Result<(), BucketError> {
    let invalid = |message: String| BucketError::InvalidThresholds {
        count: bucket_count,
        message,
    };

    if thresholds.len() + 1 != bucket_count {
        return Err(invalid(format!(
            "expected {} thresholds, got {}",
            bucket_count - 1,
            thresholds.len()
        )));
    }
    if thresholds.iter().any(|t| !t.is_finite()) {
        return Err(invalid("thresholds must be finite".to_string()));
    }
    if thresholds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(invalid(format!("not strictly ascending: {thresholds:?}")));
    }

    Ok(())
}

/// Fixed-threshold policy of the priority-zone count scale.
#[must_use]
pub fn zone_count_policy() -> BucketPolicy {
    BucketPolicy::FixedThreshold {
        thresholds: ZONE_COUNT_THRESHOLDS.to_vec(),
    }
}
