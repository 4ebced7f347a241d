//! Ordinal encoding of categories
//!
//! Categories are ranked by frequency or by mean target, truncated to
//! `max_n_categories` and filtered by a minimum frequency. Survivors get
//! consecutive ids in rank order; everything else falls through to "Other".

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{FitInput, FitOutcome};
use crate::error::invalid_config;
use crate::mapping::BucketRule;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingMethod {
    /// Most frequent category first
    #[default]
    Frequency,
    /// Lowest mean target first
    Ordered,
}

impl std::str::FromStr for EncodingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "frequency" => Ok(EncodingMethod::Frequency),
            "ordered" => Ok(EncodingMethod::Ordered),
            _ => Err(format!(
                "Unknown encoding method: '{}'. Use 'frequency' or 'ordered'.",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdinalConfig {
    /// Minimum normalised frequency of a kept category
    pub tol: f64,
    pub max_n_categories: Option<usize>,
    pub encoding_method: EncodingMethod,
}

impl Default for OrdinalConfig {
    fn default() -> Self {
        Self {
            tol: 0.05,
            max_n_categories: None,
            encoding_method: EncodingMethod::Frequency,
        }
    }
}

impl OrdinalConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.tol) {
            return Err(invalid_config(format!(
                "OrdinalCategoricalBucketer: tol must be in [0, 1], got {}",
                self.tol
            ))
            .into());
        }
        if self.max_n_categories == Some(0) {
            return Err(invalid_config("OrdinalCategoricalBucketer: max_n_categories must be at least 1").into());
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CategoryCounts {
    count: usize,
    events: usize,
}

pub fn fit(config: &OrdinalConfig, input: &FitInput) -> Result<FitOutcome> {
    let values = input.categorical()?;
    let target = match config.encoding_method {
        EncodingMethod::Ordered => Some(input.target("OrdinalCategoricalBucketer with encoding_method 'ordered'")?),
        EncodingMethod::Frequency => None,
    };

    let mut counts: BTreeMap<&str, CategoryCounts> = BTreeMap::new();
    for (row, value) in values.iter().enumerate() {
        let entry = counts.entry(value.as_str()).or_default();
        entry.count += 1;
        if target.map(|t| t[row] == 1).unwrap_or(false) {
            entry.events += 1;
        }
    }

    // BTreeMap iteration is by key, so the stable sorts break ties by key
    let mut ranked: Vec<(&str, CategoryCounts)> = counts.into_iter().collect();
    match config.encoding_method {
        EncodingMethod::Frequency => ranked.sort_by(|a, b| b.1.count.cmp(&a.1.count)),
        EncodingMethod::Ordered => ranked.sort_by(|a, b| {
            let rate_a = a.1.events as f64 / a.1.count as f64;
            let rate_b = b.1.events as f64 / b.1.count as f64;
            rate_a.total_cmp(&rate_b)
        }),
    }

    if let Some(max) = config.max_n_categories {
        ranked.truncate(max);
    }

    let total = values.len() as f64;
    let map: BTreeMap<String, usize> = ranked
        .into_iter()
        .filter(|(_, c)| c.count as f64 / total >= config.tol)
        .enumerate()
        .map(|(id, (category, _))| (category.to_string(), id))
        .collect();

    Ok(BucketRule::Categorical { map }.into())
}
