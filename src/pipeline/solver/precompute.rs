//! Precomputation of merged-bucket statistics
//!
//! The MIP objective needs the IV of every contiguous run of pre-bins; the
//! matrix below holds them, built from running sums in O(n^2).

use super::PreBin;
use crate::pipeline::stats::calculate_woe_iv;

/// Statistics of pre-bins `start..=end` merged into one bucket
#[derive(Debug, Clone)]
pub struct PrecomputedBin {
    pub events: f64,
    pub non_events: f64,
    pub count: f64,
    pub woe: f64,
    pub iv: f64,
}

/// `matrix[i][j - i]` holds the merge of pre-bins `i..=j`
#[allow(clippy::needless_range_loop)]
pub fn precompute_iv_matrix(prebins: &[PreBin]) -> Vec<Vec<PrecomputedBin>> {
    let total_events: f64 = prebins.iter().map(|b| b.events).sum();
    let total_non_events: f64 = prebins.iter().map(|b| b.non_events).sum();
    let n = prebins.len();
    let mut matrix = Vec::with_capacity(n);

    for i in 0..n {
        let mut row = Vec::with_capacity(n - i);
        let mut events = 0.0;
        let mut non_events = 0.0;

        for j in i..n {
            events += prebins[j].events;
            non_events += prebins[j].non_events;
            let (woe, iv) = calculate_woe_iv(events, non_events, total_events, total_non_events);
            row.push(PrecomputedBin {
                events,
                non_events,
                count: events + non_events,
                woe,
                iv,
            });
        }
        matrix.push(row);
    }

    matrix
}

#[inline]
pub fn get_precomputed_bin(matrix: &[Vec<PrecomputedBin>], start: usize, end: usize) -> &PrecomputedBin {
    &matrix[start][end - start]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prebins() -> Vec<PreBin> {
        vec![
            PreBin::new(5.0, 15.0),
            PreBin::new(10.0, 10.0),
            PreBin::new(15.0, 5.0),
        ]
    }

    #[test]
    fn test_matrix_shape() {
        let matrix = precompute_iv_matrix(&prebins());
        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix[0].len(), 3);
        assert_eq!(matrix[2].len(), 1);
    }

    #[test]
    fn test_merged_counts() {
        let matrix = precompute_iv_matrix(&prebins());
        let merged = get_precomputed_bin(&matrix, 0, 1);
        assert_eq!(merged.events, 15.0);
        assert_eq!(merged.non_events, 25.0);
        assert_eq!(merged.count, 40.0);
        let all = get_precomputed_bin(&matrix, 0, 2);
        assert!(all.iv.abs() < 1e-12);
    }

    #[test]
    fn test_iv_is_non_negative() {
        for row in precompute_iv_matrix(&prebins()) {
            for bin in row {
                assert!(bin.iv >= 0.0);
            }
        }
    }
}
