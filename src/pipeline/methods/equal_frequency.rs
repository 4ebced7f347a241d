//! Equal-frequency (quantile) bucketing
//!
//! Quantile edges at k/n_bins with linear interpolation. When duplicate
//! values make some edges coincide the duplicates are dropped, leaving fewer
//! buckets than requested, and the fit records an approximation warning.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{check_n_bins, FitInput, FitOutcome};
use crate::mapping::BucketRule;

pub const APPROXIMATION_WARNING: &str = "Approximated quantiles - too many duplicate values";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualFrequencyConfig {
    pub n_bins: usize,
}

impl Default for EqualFrequencyConfig {
    fn default() -> Self {
        Self { n_bins: 5 }
    }
}

impl EqualFrequencyConfig {
    pub fn validate(&self) -> Result<()> {
        check_n_bins("EqualFrequencyBucketer", self.n_bins)
    }
}

/// Linear-interpolated quantile of sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = position - lower as f64;
    sorted[lower] + fraction * (sorted[upper] - sorted[lower])
}

/// Inner quantile edges and whether duplicates had to be dropped
pub fn quantile_boundaries(values: &[f64], n_bins: usize) -> (Vec<f64>, bool) {
    if values.is_empty() {
        return (Vec::new(), false);
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let edges: Vec<f64> = (0..=n_bins)
        .map(|k| quantile(&sorted, k as f64 / n_bins as f64))
        .collect();
    let mut unique = edges.clone();
    unique.dedup();
    let approximated = unique.len() != edges.len();

    if unique.len() <= 2 {
        return (Vec::new(), approximated);
    }
    (unique[1..unique.len() - 1].to_vec(), approximated)
}

pub fn fit(config: &EqualFrequencyConfig, input: &FitInput) -> Result<FitOutcome> {
    let values = input.numerical()?;
    let (boundaries, approximated) = quantile_boundaries(values, config.n_bins);
    let mut warnings = Vec::new();
    if approximated {
        tracing::warn!(feature = input.feature, n_bins = config.n_bins, "{}", APPROXIMATION_WARNING);
        warnings.push(format!("{}: {}", input.feature, APPROXIMATION_WARNING));
    }
    Ok(FitOutcome {
        rule: BucketRule::Numerical {
            boundaries,
            right: true,
        },
        warnings,
    })
}
