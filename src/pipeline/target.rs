//! Binary target handling
//!
//! Supervised methods need a 0/1 target aligned with the rows. A target
//! column in a file may hold other labels ("bad"/"good", 1/2, ...), in which
//! case the caller names the event and non-event values.

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::BucketError;

/// Tolerance for floating point comparison when checking binary 0/1 values
const TOLERANCE: f64 = 1e-9;

/// Which labels of a target column mean event (1) and non-event (0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetMapping {
    pub event_value: String,
    pub non_event_value: String,
}

impl TargetMapping {
    pub fn new(event_value: impl Into<String>, non_event_value: impl Into<String>) -> Self {
        Self {
            event_value: event_value.into(),
            non_event_value: non_event_value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TargetAnalysis {
    /// Only 0 and 1 occur
    AlreadyBinary,
    /// Other labels occur; sorted distinct labels
    NeedsMapping { unique_values: Vec<String> },
}

/// Check whether a target column can be used as is
pub fn analyze_target_column(df: &DataFrame, target: &str) -> Result<TargetAnalysis> {
    let column = df
        .column(target)
        .with_context(|| format!("Target column '{}' not found", target))?;

    if column.len() == 0 {
        anyhow::bail!("Target column '{}' is empty", target);
    }
    if column.null_count() == column.len() {
        anyhow::bail!("Target column '{}' contains only null values", target);
    }

    if column.dtype().is_primitive_numeric() {
        let unique = column.cast(&DataType::Float64)?.unique()?;
        let is_binary = unique
            .f64()?
            .into_iter()
            .flatten()
            .all(|v| v.abs() < TOLERANCE || (v - 1.0).abs() < TOLERANCE);
        if is_binary && column.null_count() == 0 {
            return Ok(TargetAnalysis::AlreadyBinary);
        }
    }

    let mut unique_values: Vec<String> = column_to_string_vec(column)?.into_iter().flatten().collect();
    unique_values.sort();
    unique_values.dedup();
    Ok(TargetAnalysis::NeedsMapping { unique_values })
}

/// Column values as strings, nulls kept as `None`
fn column_to_string_vec(column: &Column) -> Result<Vec<Option<String>>> {
    let values = match column.dtype() {
        DataType::String => column.str()?.into_iter().map(|v| v.map(str::to_string)).collect(),
        dtype if dtype.is_float() => column
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.map(crate::mapping::category_key))
            .collect(),
        _ => column
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect(),
    };
    Ok(values)
}

/// Extract the target as 0/1 values
///
/// # Arguments
/// * `df` - Frame holding the target column
/// * `target` - Name of the target column
/// * `mapping` - Event/non-event labels; required unless the column is 0/1
///
/// # Returns
/// One value per row. Nulls and labels outside the mapping are rejected.
pub fn target_vector(df: &DataFrame, target: &str, mapping: Option<&TargetMapping>) -> Result<Vec<i32>> {
    let column = df
        .column(target)
        .with_context(|| format!("Target column '{}' not found", target))?;

    match (analyze_target_column(df, target)?, mapping) {
        (TargetAnalysis::AlreadyBinary, None) => {
            let values = column.cast(&DataType::Float64)?;
            Ok(values
                .f64()?
                .into_iter()
                .map(|v| if v.map(|v| (v - 1.0).abs() < TOLERANCE).unwrap_or(false) { 1 } else { 0 })
                .collect())
        }
        (TargetAnalysis::NeedsMapping { unique_values }, None) => Err(BucketError::InvalidTarget(format!(
            "'{}' is not binary 0/1 (found {:?}); name the event and non-event values",
            target, unique_values
        ))
        .into()),
        (_, Some(mapping)) => column_to_string_vec(column)?
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value.as_deref() {
                Some(v) if v == mapping.event_value => Ok(1),
                Some(v) if v == mapping.non_event_value => Ok(0),
                other => Err(BucketError::InvalidTarget(format!(
                    "row {} of '{}' holds {:?}, expected '{}' or '{}'",
                    row, target, other, mapping.event_value, mapping.non_event_value
                ))
                .into()),
            })
            .collect(),
    }
}

/// Check a target handed to `fit` against the data it goes with
pub fn validate_target(target: &[i32], n_rows: usize) -> Result<()> {
    if target.len() != n_rows {
        return Err(BucketError::InvalidTarget(format!(
            "target has {} values but the data has {} rows",
            target.len(),
            n_rows
        ))
        .into());
    }
    if let Some(bad) = target.iter().find(|t| **t != 0 && **t != 1) {
        return Err(BucketError::InvalidTarget(format!("target values must be 0 or 1, found {}", bad)).into());
    }
    Ok(())
}
