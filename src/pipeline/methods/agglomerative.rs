//! Agglomerative clustering on one dimension
//!
//! Starts from one cluster per distinct value and repeatedly merges the
//! adjacent pair with the smallest linkage distance. On a line the clusters
//! stay intervals, so boundaries sit halfway between the largest value of a
//! cluster and the smallest value of the next one.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{check_n_bins, FitInput, FitOutcome};
use crate::mapping::BucketRule;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    /// Smallest increase in within-cluster variance
    #[default]
    Ward,
    Average,
    Complete,
    Single,
}

impl std::str::FromStr for Linkage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ward" => Ok(Linkage::Ward),
            "average" => Ok(Linkage::Average),
            "complete" => Ok(Linkage::Complete),
            "single" => Ok(Linkage::Single),
            _ => Err(format!(
                "Unknown linkage: '{}'. Use 'ward', 'average', 'complete' or 'single'.",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgglomerativeConfig {
    pub n_bins: usize,
    pub linkage: Linkage,
}

impl Default for AgglomerativeConfig {
    fn default() -> Self {
        Self {
            n_bins: 5,
            linkage: Linkage::Ward,
        }
    }
}

impl AgglomerativeConfig {
    pub fn validate(&self) -> Result<()> {
        check_n_bins("AgglomerativeClusteringBucketer", self.n_bins)
    }
}

#[derive(Debug, Clone, Copy)]
struct Cluster {
    count: f64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Cluster {
    fn mean(&self) -> f64 {
        self.sum / self.count
    }

    fn merge(&self, other: &Cluster) -> Cluster {
        Cluster {
            count: self.count + other.count,
            sum: self.sum + other.sum,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Distance between a cluster and the cluster right above it
fn distance(linkage: Linkage, lower: &Cluster, upper: &Cluster) -> f64 {
    match linkage {
        Linkage::Ward => {
            let diff = upper.mean() - lower.mean();
            lower.count * upper.count / (lower.count + upper.count) * diff * diff
        }
        Linkage::Average => upper.mean() - lower.mean(),
        Linkage::Complete => upper.max - lower.min,
        Linkage::Single => upper.min - lower.max,
    }
}

/// Cluster boundaries for `n_bins` clusters
pub fn cluster_boundaries(values: &[f64], n_bins: usize, linkage: Linkage) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut clusters: Vec<Cluster> = Vec::new();
    for v in sorted {
        match clusters.last_mut() {
            Some(last) if last.max == v => {
                last.count += 1.0;
                last.sum += v;
            }
            _ => clusters.push(Cluster {
                count: 1.0,
                sum: v,
                min: v,
                max: v,
            }),
        }
    }

    while clusters.len() > n_bins.max(1) {
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for i in 0..clusters.len() - 1 {
            let d = distance(linkage, &clusters[i], &clusters[i + 1]);
            if d < best_distance {
                best_distance = d;
                best = i;
            }
        }
        let merged = clusters[best].merge(&clusters[best + 1]);
        clusters[best] = merged;
        clusters.remove(best + 1);
    }

    clusters
        .windows(2)
        .map(|w| (w[0].max + w[1].min) / 2.0)
        .collect()
}

pub fn fit(config: &AgglomerativeConfig, input: &FitInput) -> Result<FitOutcome> {
    let values = input.numerical()?;
    Ok(BucketRule::Numerical {
        boundaries: cluster_boundaries(values, config.n_bins, config.linkage),
        right: true,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separates_obvious_groups() {
        let values = [1.0, 1.1, 1.2, 10.0, 10.5, 11.0, 50.0, 51.0];
        for linkage in [Linkage::Ward, Linkage::Average, Linkage::Complete, Linkage::Single] {
            let boundaries = cluster_boundaries(&values, 3, linkage);
            assert_eq!(boundaries, vec![(1.2 + 10.0) / 2.0, (11.0 + 50.0) / 2.0]);
        }
    }

    #[test]
    fn test_fewer_distinct_values_than_bins() {
        let boundaries = cluster_boundaries(&[1.0, 1.0, 2.0], 5, Linkage::Ward);
        assert_eq!(boundaries, vec![1.5]);
    }

    #[test]
    fn test_single_cluster() {
        assert!(cluster_boundaries(&[1.0, 2.0, 3.0], 1, Linkage::Single).is_empty());
    }

    #[test]
    fn test_linkage_from_str() {
        assert_eq!("Complete".parse::<Linkage>().unwrap(), Linkage::Complete);
        assert!("centroid".parse::<Linkage>().is_err());
    }
}
