//! Decision tree (CART) bucketing
//!
//! Grows a single-feature classification tree best-first on Gini impurity
//! until the leaf budget is used up, then reads the split thresholds as
//! boundaries. The leaf budget is `max_n_bins` minus the special groups, and
//! the minimum leaf size is rescaled to the share of rows left after
//! removing specials and missing values.

use std::collections::BinaryHeap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{check_min_bin_size, check_n_bins, FitInput, FitOutcome};
use crate::error::BucketError;
use crate::mapping::BucketRule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionTreeConfig {
    /// Bucket budget, special buckets included
    pub max_n_bins: usize,
    /// Minimum fraction of rows per leaf
    pub min_bin_size: f64,
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self {
            max_n_bins: 100,
            min_bin_size: 0.05,
        }
    }
}

impl DecisionTreeConfig {
    pub fn new(max_n_bins: usize, min_bin_size: f64) -> Self {
        Self {
            max_n_bins,
            min_bin_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_n_bins("DecisionTreeBucketer", self.max_n_bins)?;
        check_min_bin_size("DecisionTreeBucketer", self.min_bin_size)
    }
}

/// Calculate Gini impurity for a set of samples
///
/// For binary classification: Gini = 2 * p * (1 - p) where p is the
/// proportion of events.
fn gini_impurity(events: f64, non_events: f64) -> f64 {
    let total = events + non_events;
    if total == 0.0 {
        return 0.0;
    }
    let p = events / total;
    2.0 * p * (1.0 - p)
}

/// Find the split that maximizes the Gini reduction
///
/// # Arguments
/// * `sorted_pairs` - Slice of (value, target) tuples, sorted by value
/// * `min_samples` - Minimum samples required on each side of the split
///
/// # Returns
/// Option of (split_index, gain) where the right side starts at split_index
fn find_best_split(sorted_pairs: &[(f64, i32)], min_samples: usize) -> Option<(usize, f64)> {
    let n = sorted_pairs.len();
    if n < 2 * min_samples || n < 2 {
        return None;
    }

    let total_events = sorted_pairs.iter().filter(|(_, t)| *t == 1).count() as f64;
    let total_non_events = n as f64 - total_events;
    let parent_gini = gini_impurity(total_events, total_non_events);

    let mut best_gain = 0.0;
    let mut best_split_idx = None;
    let mut left_events = 0.0;

    for i in 0..n - 1 {
        if sorted_pairs[i].1 == 1 {
            left_events += 1.0;
        }
        let left_count = i + 1;
        let right_count = n - left_count;

        if left_count < min_samples || right_count < min_samples {
            continue;
        }
        // never split between equal values
        if sorted_pairs[i].0 == sorted_pairs[i + 1].0 {
            continue;
        }

        let left_non_events = left_count as f64 - left_events;
        let right_events = total_events - left_events;
        let right_non_events = right_count as f64 - right_events;

        let weighted_child_gini = (left_count as f64 * gini_impurity(left_events, left_non_events)
            + right_count as f64 * gini_impurity(right_events, right_non_events))
            / n as f64;
        let gain = parent_gini - weighted_child_gini;

        if gain > best_gain {
            best_gain = gain;
            best_split_idx = Some(i + 1);
        }
    }

    best_split_idx.map(|idx| (idx, best_gain))
}

/// A leaf that can still be split, ordered by its impurity decrease
#[derive(Debug)]
struct Candidate {
    /// Node-size weighted impurity decrease
    improvement: f64,
    start: usize,
    end: usize,
    split: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // higher improvement first, then the leftmost node
        self.improvement
            .total_cmp(&other.improvement)
            .then_with(|| other.start.cmp(&self.start))
    }
}

fn candidate(sorted_pairs: &[(f64, i32)], start: usize, end: usize, min_samples: usize) -> Option<Candidate> {
    let total = sorted_pairs.len() as f64;
    find_best_split(&sorted_pairs[start..end], min_samples).map(|(local, gain)| Candidate {
        improvement: gain * (end - start) as f64 / total,
        start,
        end,
        split: start + local,
    })
}

/// Thresholds of a best-first tree with at most `max_leaf_nodes` leaves
pub fn tree_boundaries(values: &[f64], target: &[i32], max_leaf_nodes: usize, min_samples_leaf: usize) -> Vec<f64> {
    let mut pairs: Vec<(f64, i32)> = values.iter().copied().zip(target.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let min_samples = min_samples_leaf.max(1);

    let mut heap = BinaryHeap::new();
    if let Some(root) = candidate(&pairs, 0, pairs.len(), min_samples) {
        heap.push(root);
    }

    let mut thresholds = Vec::new();
    let mut leaves = 1;
    while leaves < max_leaf_nodes {
        let Some(best) = heap.pop() else { break };
        thresholds.push((pairs[best.split - 1].0 + pairs[best.split].0) / 2.0);
        leaves += 1;
        if let Some(left) = candidate(&pairs, best.start, best.split, min_samples) {
            heap.push(left);
        }
        if let Some(right) = candidate(&pairs, best.split, best.end, min_samples) {
            heap.push(right);
        }
    }

    thresholds.sort_by(|a, b| a.total_cmp(b));
    thresholds.dedup();
    thresholds
}

pub fn fit(config: &DecisionTreeConfig, input: &FitInput) -> Result<FitOutcome> {
    let values = input.numerical()?;
    let target = input.target("DecisionTreeBucketer")?;

    if config.max_n_bins <= input.n_specials + 1 {
        return Err(BucketError::InsufficientLeafBudget {
            feature: input.feature.to_string(),
            max_n_bins: config.max_n_bins,
            n_specials: input.n_specials,
        }
        .into());
    }
    let max_leaf_nodes = config.max_n_bins.saturating_sub(input.n_specials);

    let frac_left = if input.n_rows > 0 {
        values.len() as f64 / input.n_rows as f64
    } else {
        0.0
    };
    let boundaries = if frac_left > 0.0 {
        let min_fraction = (config.min_bin_size / frac_left).min(0.5);
        let min_samples_leaf = (min_fraction * values.len() as f64).ceil() as usize;
        tree_boundaries(values, target, max_leaf_nodes, min_samples_leaf)
    } else {
        Vec::new()
    };

    tracing::debug!(
        feature = input.feature,
        max_leaf_nodes,
        splits = boundaries.len(),
        "decision tree fitted"
    );

    Ok(BucketRule::Numerical {
        boundaries,
        right: false,
    }
    .into())
}
