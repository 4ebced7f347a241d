//! MIP model construction and solving for optimal bucketing
//!
//! Interval formulation: one binary variable per contiguous run of pre-bins
//! that is large enough to form a bucket, every pre-bin covered exactly once.

use std::time::Instant;

use anyhow::{bail, Context, Result};
use good_lp::{constraint, default_solver, variable, Expression, ProblemVariables, Solution, SolverModel, Variable};

use super::monotonicity::MonotonicityConstraint;
use super::precompute::{get_precomputed_bin, precompute_iv_matrix, PrecomputedBin};
use super::{PreBin, SolverConfig, SolverResult};

/// Solve the optimal bucketing problem over ordered pre-bins
pub fn solve_binning(prebins: &[PreBin], config: &SolverConfig) -> Result<SolverResult> {
    let start_time = Instant::now();
    let n = prebins.len();

    if n <= 1 {
        return Ok(SolverResult {
            groups: (0..n).map(|i| (i, i)).collect(),
            total_iv: 0.0,
            solve_time_ms: start_time.elapsed().as_millis() as u64,
            monotonicity_applied: MonotonicityConstraint::None,
        });
    }

    let iv_matrix = precompute_iv_matrix(prebins);

    if config.monotonicity == MonotonicityConstraint::AutoAscDesc {
        let ascending = solve_with_monotonicity(
            prebins,
            config,
            &iv_matrix,
            MonotonicityConstraint::Ascending,
            start_time,
        )?;
        let descending = solve_with_monotonicity(
            prebins,
            config,
            &iv_matrix,
            MonotonicityConstraint::Descending,
            start_time,
        )?;
        return Ok(if descending.total_iv > ascending.total_iv {
            descending
        } else {
            ascending
        });
    }

    solve_with_monotonicity(prebins, config, &iv_matrix, config.monotonicity, start_time)
}

/// Solve the MIP model with a specific monotonicity constraint
fn solve_with_monotonicity(
    prebins: &[PreBin],
    config: &SolverConfig,
    iv_matrix: &[Vec<PrecomputedBin>],
    monotonicity: MonotonicityConstraint,
    start_time: Instant,
) -> Result<SolverResult> {
    let n = prebins.len();
    let mut vars = ProblemVariables::new();

    // z[i][j - i] = 1 if pre-bins i..=j form one bucket. The run covering
    // everything is always allowed so the model stays feasible.
    let mut z: Vec<Vec<Option<Variable>>> = Vec::with_capacity(n);
    for i in 0..n {
        let mut row = Vec::with_capacity(n - i);
        for j in i..n {
            let bin = get_precomputed_bin(iv_matrix, i, j);
            let full_range = i == 0 && j == n - 1;
            if full_range || bin.count >= config.min_bin_count {
                row.push(Some(vars.add(variable().binary())));
            } else {
                row.push(None);
            }
        }
        z.push(row);
    }

    let mut objective_terms: Vec<Expression> = Vec::new();
    for i in 0..n {
        for j in i..n {
            if let Some(var) = z[i][j - i] {
                let bin = get_precomputed_bin(iv_matrix, i, j);
                objective_terms.push(bin.iv * var);
            }
        }
    }
    let objective: Expression = objective_terms.into_iter().sum();

    let mut problem = vars
        .maximise(objective)
        .using(default_solver)
        .set_time_limit(config.time_limit);

    let bin_count: Expression = z.iter().flat_map(|row| row.iter().filter_map(|v| *v)).sum();
    problem = problem.with(constraint!(bin_count <= config.max_bins as f64));

    for p in 0..n {
        let mut coverage_terms: Vec<Variable> = Vec::new();
        for i in 0..=p {
            for j in p..n {
                if let Some(var) = z[i][j - i] {
                    coverage_terms.push(var);
                }
            }
        }
        let coverage: Expression = coverage_terms.into_iter().sum();
        problem = problem.with(constraint!(coverage == 1.0));
    }

    // Adjacent buckets whose event rates go the wrong way cannot both be chosen
    if monotonicity != MonotonicityConstraint::None {
        for i1 in 0..n {
            for j1 in i1..n {
                let i2 = j1 + 1;
                if i2 >= n {
                    continue;
                }
                for j2 in i2..n {
                    if let (Some(v1), Some(v2)) = (z[i1][j1 - i1], z[i2][j2 - i2]) {
                        let bin1 = get_precomputed_bin(iv_matrix, i1, j1);
                        let bin2 = get_precomputed_bin(iv_matrix, i2, j2);
                        let violates = match monotonicity {
                            MonotonicityConstraint::Ascending => bin1.woe > bin2.woe,
                            MonotonicityConstraint::Descending => bin1.woe < bin2.woe,
                            _ => false,
                        };
                        if violates {
                            let sum: Expression = v1 + v2;
                            problem = problem.with(constraint!(sum <= 1.0));
                        }
                    }
                }
            }
        }
    }

    let solution = problem.solve().context("Failed to solve optimal bucketing MIP model")?;

    let mut groups: Vec<(usize, usize)> = Vec::new();
    for i in 0..n {
        for j in i..n {
            if let Some(var) = z[i][j - i] {
                if solution.value(var) > 0.5 {
                    groups.push((i, j));
                }
            }
        }
    }
    groups.sort_by_key(|(start, _)| *start);

    // A solve cut off by the time limit may stop before reaching a partition
    let covers_all = groups.first().map(|(start, _)| *start) == Some(0)
        && groups.last().map(|(_, end)| *end) == Some(n - 1)
        && groups.windows(2).all(|w| w[1].0 == w[0].1 + 1);
    if !covers_all {
        bail!(
            "Optimal bucketing found no complete partition of {} pre-bins within the {}s time limit",
            n,
            config.time_limit
        );
    }

    let total_iv: f64 = groups
        .iter()
        .map(|(start, end)| get_precomputed_bin(iv_matrix, *start, *end).iv)
        .sum();

    Ok(SolverResult {
        groups,
        total_iv,
        solve_time_ms: start_time.elapsed().as_millis() as u64,
        monotonicity_applied: monotonicity,
    })
}
