//! Bucketers that keep every distinct value in its own bucket

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{sorted_unique, FitInput, FitOutcome, MAX_PREBUCKETS};
use crate::error::BucketError;
use crate::mapping::BucketRule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsIsNumericalConfig {
    pub right: bool,
}

impl Default for AsIsNumericalConfig {
    fn default() -> Self {
        Self { right: true }
    }
}

/// One bucket per category in first-seen order
pub fn fit_categorical(input: &FitInput) -> Result<FitOutcome> {
    let values = input.categorical()?;
    let mut map: BTreeMap<String, usize> = BTreeMap::new();
    for value in values {
        let next = map.len();
        map.entry(value.clone()).or_insert(next);
    }
    Ok(BucketRule::Categorical { map }.into())
}

/// Sorted distinct values as boundaries
pub fn fit_numerical(config: &AsIsNumericalConfig, input: &FitInput) -> Result<FitOutcome> {
    let boundaries = sorted_unique(input.numerical()?);
    if boundaries.len() > MAX_PREBUCKETS {
        return Err(BucketError::NotPreBucketed {
            feature: input.feature.to_string(),
            unique: boundaries.len(),
            max: MAX_PREBUCKETS,
        }
        .into());
    }
    Ok(BucketRule::Numerical {
        boundaries,
        right: config.right,
    }
    .into())
}
