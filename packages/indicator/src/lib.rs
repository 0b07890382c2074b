#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Indicator join engine and category bucketizer.
//!
//! [`join`] attaches socio-economic indicator records to administrative
//! units by code, selecting one target year per indicator and marking
//! missing measurements as `NoData`. [`bucket`] then maps the joined
//! values to ordered color buckets with either a quantile or a
//! fixed-threshold policy, and [`palette`] provides the color ramps.

pub mod bucket;
pub mod join;
pub mod palette;

use thiserror::Error;

pub use bucket::{BucketError, BucketPolicy, Bucketing, bucketize};
pub use join::{JoinConfig, JoinIssue, JoinOutcome, join};

/// Fatal errors of the indicator join.
///
/// Per-record problems are not errors; they are collected as
/// [`JoinIssue`]s in the [`JoinOutcome`].
#[derive(Debug, Error)]
pub enum IndicatorError {
    /// Two administrative units share the same code.
    #[error("Duplicate administrative code: {code}")]
    DuplicateAdministrativeCode {
        /// The repeated code.
        code: String,
    },
}
