//! Equal-width bucketing
//!
//! Histogram edges over the observed range, outer edges dropped so values
//! outside the fitted range land in the open-ended first or last bucket.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{check_n_bins, FitInput, FitOutcome};
use crate::mapping::BucketRule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualWidthConfig {
    pub n_bins: usize,
}

impl Default for EqualWidthConfig {
    fn default() -> Self {
        Self { n_bins: 5 }
    }
}

impl EqualWidthConfig {
    pub fn validate(&self) -> Result<()> {
        check_n_bins("EqualWidthBucketer", self.n_bins)
    }
}

/// Inner histogram edges of `n_bins` equal-width bins
///
/// A degenerate range is widened by 0.5 on both sides, like numpy does.
pub fn equal_width_boundaries(values: &[f64], n_bins: usize) -> Vec<f64> {
    if values.is_empty() || n_bins < 2 {
        return Vec::new();
    }
    let mut min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        min -= 0.5;
        max += 0.5;
    }
    let step = (max - min) / n_bins as f64;
    let mut edges: Vec<f64> = (1..n_bins).map(|i| min + step * i as f64).collect();
    edges.dedup();
    edges
}

pub fn fit(config: &EqualWidthConfig, input: &FitInput) -> Result<FitOutcome> {
    let values = input.numerical()?;
    Ok(BucketRule::Numerical {
        boundaries: equal_width_boundaries(values, config.n_bins),
        right: true,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint_split() {
        assert_eq!(equal_width_boundaries(&[10.0, 20.0, 30.0, 40.0], 2), vec![25.0]);
    }

    #[test]
    fn test_edges_are_equally_spaced() {
        let edges = equal_width_boundaries(&[0.0, 10.0], 4);
        assert_eq!(edges, vec![2.5, 5.0, 7.5]);
    }

    #[test]
    fn test_single_bin_has_no_boundaries() {
        assert!(equal_width_boundaries(&[1.0, 5.0, 9.0], 1).is_empty());
    }

    #[test]
    fn test_constant_column_is_widened() {
        assert_eq!(equal_width_boundaries(&[3.0, 3.0, 3.0], 2), vec![3.0]);
    }

    #[test]
    fn test_empty_input() {
        assert!(equal_width_boundaries(&[], 3).is_empty());
    }
}
