//! Optimal bucketing
//!
//! Pre-bins are the distinct values (numerical) or the categories sorted by
//! event rate (categorical). The MIP solver merges adjacent pre-bins into at
//! most `max_n_bins` monotone buckets maximising IV.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{check_min_bin_size, check_n_bins, sorted_unique, FitInput, FitOutcome, MAX_PREBUCKETS};
use crate::error::{invalid_config, BucketError};
use crate::mapping::{BucketRule, FeatureKind};
use crate::pipeline::solver::{solve_optimal_binning, MonotonicityConstraint, PreBin, SolverConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimalConfig {
    pub variables_type: FeatureKind,
    pub max_n_bins: usize,
    /// Minimum fraction of fitted rows per bucket
    pub min_bin_size: f64,
    /// Categories rarer than this fraction are left out of the partition
    pub cat_cutoff: Option<f64>,
    /// Solver time budget in seconds
    pub time_limit: u64,
    pub monotonicity: MonotonicityConstraint,
}

impl Default for OptimalConfig {
    fn default() -> Self {
        Self {
            variables_type: FeatureKind::Numerical,
            max_n_bins: 10,
            min_bin_size: 0.05,
            cat_cutoff: None,
            time_limit: 25,
            monotonicity: MonotonicityConstraint::AutoAscDesc,
        }
    }
}

impl OptimalConfig {
    pub fn new(max_n_bins: usize, min_bin_size: f64) -> Self {
        Self {
            max_n_bins,
            min_bin_size,
            ..Default::default()
        }
    }

    pub fn categorical(mut self) -> Self {
        self.variables_type = FeatureKind::Categorical;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_n_bins("OptimalBucketer", self.max_n_bins)?;
        check_min_bin_size("OptimalBucketer", self.min_bin_size)?;
        if let Some(cutoff) = self.cat_cutoff {
            if !(0.0..=1.0).contains(&cutoff) {
                return Err(invalid_config(format!(
                    "OptimalBucketer: cat_cutoff must be in [0, 1], got {}",
                    cutoff
                ))
                .into());
            }
        }
        if self.time_limit == 0 {
            return Err(invalid_config("OptimalBucketer: time_limit must be at least 1 second".to_string()).into());
        }
        Ok(())
    }

    fn solver_config(&self, n_rows: usize) -> SolverConfig {
        SolverConfig {
            max_bins: self.max_n_bins,
            min_bin_count: (self.min_bin_size * n_rows as f64).max(1.0),
            monotonicity: self.monotonicity,
            time_limit: self.time_limit as f64,
        }
    }
}

pub fn fit(config: &OptimalConfig, input: &FitInput) -> Result<FitOutcome> {
    let target = input.target("OptimalBucketer")?;
    match config.variables_type {
        FeatureKind::Numerical => fit_numerical(config, input.feature, input.numerical()?, target),
        FeatureKind::Categorical => fit_categorical(config, input.categorical()?, target),
    }
}

fn fit_numerical(config: &OptimalConfig, feature: &str, values: &[f64], target: &[i32]) -> Result<FitOutcome> {
    let unique = sorted_unique(values);
    if unique.len() > MAX_PREBUCKETS {
        return Err(BucketError::NotPreBucketed {
            feature: feature.to_string(),
            unique: unique.len(),
            max: MAX_PREBUCKETS,
        }
        .into());
    }

    let mut prebins = vec![PreBin::new(0.0, 0.0); unique.len()];
    for (value, t) in values.iter().zip(target) {
        let idx = unique.partition_point(|u| u < value);
        if *t == 1 {
            prebins[idx].events += 1.0;
        } else {
            prebins[idx].non_events += 1.0;
        }
    }

    let result = solve_optimal_binning(&prebins, &config.solver_config(values.len()))?;
    tracing::debug!(
        feature,
        buckets = result.groups.len(),
        iv = result.total_iv,
        trend = %result.monotonicity_applied,
        solve_time_ms = result.solve_time_ms,
        "optimal bucketing solved"
    );

    let boundaries = result.groups.iter().skip(1).map(|(start, _)| unique[*start]).collect();
    Ok(BucketRule::Numerical {
        boundaries,
        right: false,
    }
    .into())
}

fn fit_categorical(config: &OptimalConfig, values: &[String], target: &[i32]) -> Result<FitOutcome> {
    let mut stats: BTreeMap<&str, PreBin> = BTreeMap::new();
    for (value, t) in values.iter().zip(target) {
        let entry = stats.entry(value.as_str()).or_insert(PreBin::new(0.0, 0.0));
        if *t == 1 {
            entry.events += 1.0;
        } else {
            entry.non_events += 1.0;
        }
    }

    let total = values.len() as f64;
    let cutoff = config.cat_cutoff.unwrap_or(0.0);
    let mut categories: Vec<(&str, PreBin)> = stats
        .into_iter()
        .filter(|(_, bin)| bin.count() / total >= cutoff)
        .collect();
    categories.sort_by(|a, b| a.1.event_rate().total_cmp(&b.1.event_rate()));

    let prebins: Vec<PreBin> = categories.iter().map(|(_, bin)| *bin).collect();
    let result = solve_optimal_binning(&prebins, &config.solver_config(values.len()))?;

    let mut map = BTreeMap::new();
    for (bucket, (start, end)) in result.groups.iter().enumerate() {
        for (category, _) in &categories[*start..=*end] {
            map.insert(category.to_string(), bucket);
        }
    }
    Ok(BucketRule::Categorical { map }.into())
}
