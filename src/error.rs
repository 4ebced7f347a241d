//! Error kinds raised by the bucketing engine.
//!
//! Public functions return `anyhow::Result`; the kinds below are raised as
//! `BucketError` values so callers can react with
//! `err.downcast_ref::<BucketError>()` instead of parsing messages.

use thiserror::Error;

/// Errors with a meaning callers may want to act on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BucketError {
    /// An option value is invalid. Raised when a bucketer or process is built.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A fitted attribute was requested before `fit` was called.
    #[error("{0} is not fitted yet. Call fit() first.")]
    NotFitted(String),

    /// A declared column does not exist in the input data.
    #[error("Column '{column}' not found. Available columns: {available:?}")]
    UnknownColumn {
        column: String,
        available: Vec<String>,
    },

    /// A numerical feature has too many distinct values for the chosen method.
    #[error(
        "Feature '{feature}' must be pre-bucketed to at most {max} unique values \
         (found {unique}). Apply pre-bucketing first, f.e. with a decision tree bucketer."
    )]
    NotPreBucketed {
        feature: String,
        unique: usize,
        max: usize,
    },

    /// Columns were bucketed by the second stage without being pre-bucketed.
    #[error(
        "The following columns are bucketed but have not been pre-bucketed: {}. \
         Add an as-is bucketer for them to the pre-bucketing pipeline.",
        columns.join(", ")
    )]
    NotPreBucketedColumns { columns: Vec<String> },

    /// Columns were pre-bucketed but the second stage never bucketed them.
    #[error(
        "The following columns are pre-bucketed but have not been bucketed: {}. \
         Update the bucketing pipeline.",
        columns.join(", ")
    )]
    NotBucketed { columns: Vec<String> },

    /// The decision tree leaf budget is too small once specials are carved out.
    #[error(
        "Feature '{feature}': max_n_bins must be at least the number of special bins + 2 \
         (set max_n_bins >= {}, currently max_n_bins={max_n_bins})",
        n_specials + 2
    )]
    InsufficientLeafBudget {
        feature: String,
        max_n_bins: usize,
        n_specials: usize,
    },

    /// A supervised method was fitted without a target.
    #[error("{0} is supervised. Provide a target.")]
    MissingTarget(String),

    /// The target is not a binary 0/1 vector aligned with the rows.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Two chained mappings cannot be expressed as one mapping over raw values.
    #[error("Cannot compose bucket mappings for feature '{feature}': {reason}")]
    NotComposable { feature: String, reason: String },

    /// A bucket mapping violates its invariants.
    #[error("Invalid bucket mapping for feature '{feature}': {reason}")]
    InvalidMapping { feature: String, reason: String },
}

/// Build a configuration error.
pub fn invalid_config(message: impl Into<String>) -> BucketError {
    BucketError::InvalidConfig(message.into())
}
