//! Monotonicity constraints for optimal bucketing
//!
//! Defines the event-rate trends the solver can enforce across buckets.

use serde::{Deserialize, Serialize};

/// Monotonicity constraint on the event rate across buckets
///
/// Credit-scoring buckets are expected to rank risk, so the event rate (and
/// with it the WoE) must move in one direction across the partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonotonicityConstraint {
    /// No constraint - event rate can vary freely
    None,
    /// Event rate must increase with the feature value
    Ascending,
    /// Event rate must decrease with the feature value
    Descending,
    /// Solve for both directions and keep the partition with the higher IV
    #[default]
    AutoAscDesc,
}

impl std::fmt::Display for MonotonicityConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonotonicityConstraint::None => write!(f, "none"),
            MonotonicityConstraint::Ascending => write!(f, "ascending"),
            MonotonicityConstraint::Descending => write!(f, "descending"),
            MonotonicityConstraint::AutoAscDesc => write!(f, "auto_asc_desc"),
        }
    }
}

impl std::str::FromStr for MonotonicityConstraint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(MonotonicityConstraint::None),
            "ascending" | "asc" => Ok(MonotonicityConstraint::Ascending),
            "descending" | "desc" => Ok(MonotonicityConstraint::Descending),
            "auto_asc_desc" | "auto" => Ok(MonotonicityConstraint::AutoAscDesc),
            _ => Err(format!(
                "Unknown monotonic trend: '{}'. Use 'none', 'ascending', 'descending' or 'auto_asc_desc'.",
                s
            )),
        }
    }
}
