//! Solver-based optimal bucketing using Mixed Integer Programming (MIP)
//!
//! This module implements optimal bucketing using the HiGHS solver via good_lp.
//! It finds globally optimal merges of ordered pre-bins that maximize
//! Information Value (IV) subject to a bucket count limit, a minimum bucket
//! size and a monotone event rate.

mod model;
mod monotonicity;
mod precompute;

use anyhow::Result;

pub use monotonicity::MonotonicityConstraint;

/// Target counts of one ordered pre-bin (a distinct value or a category)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreBin {
    pub events: f64,
    pub non_events: f64,
}

impl PreBin {
    pub fn new(events: f64, non_events: f64) -> Self {
        Self { events, non_events }
    }

    pub fn count(&self) -> f64 {
        self.events + self.non_events
    }

    pub fn event_rate(&self) -> f64 {
        let count = self.count();
        if count > 0.0 {
            self.events / count
        } else {
            0.0
        }
    }
}

/// Configuration for the solver-based optimal bucketing
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Maximum number of buckets
    pub max_bins: usize,
    /// Minimum rows per bucket
    pub min_bin_count: f64,
    /// Trend enforced on the event rate
    pub monotonicity: MonotonicityConstraint,
    /// HiGHS time limit per solve, in seconds
    pub time_limit: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_bins: 10,
            min_bin_count: 1.0,
            monotonicity: MonotonicityConstraint::AutoAscDesc,
            time_limit: 25.0,
        }
    }
}

/// Result from the optimal bucketing solver
#[derive(Debug, Clone)]
pub struct SolverResult {
    /// Inclusive (start, end) pre-bin ranges, one per bucket, in order
    pub groups: Vec<(usize, usize)>,
    /// Total IV achieved by this solution
    pub total_iv: f64,
    /// Time taken to solve (milliseconds)
    pub solve_time_ms: u64,
    /// The monotonicity constraint that was applied
    pub monotonicity_applied: MonotonicityConstraint,
}

/// Merge ordered pre-bins into at most `config.max_bins` buckets
///
/// # Arguments
/// * `prebins` - Pre-bins in partition order (sorted values, or categories
///   sorted by event rate)
/// * `config` - Solver configuration
///
/// # Returns
/// SolverResult whose groups cover every pre-bin exactly once
pub fn solve_optimal_binning(prebins: &[PreBin], config: &SolverConfig) -> Result<SolverResult> {
    model::solve_binning(prebins, config)
}
