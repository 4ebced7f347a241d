//! Bucketing methods
//!
//! Each method turns the normal rows of one feature (specials and missing
//! values already removed) into a [`BucketRule`]. The shared fit loop in
//! [`crate::pipeline::bucketer`] handles everything around it.

pub mod agglomerative;
pub mod as_is;
pub mod decision_tree;
pub mod equal_frequency;
pub mod equal_width;
pub mod optimal;
pub mod ordinal;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::{invalid_config, BucketError};
use crate::mapping::{BucketRule, FeatureKind, FeaturesBucketMapping};

pub use agglomerative::{AgglomerativeConfig, Linkage};
pub use as_is::AsIsNumericalConfig;
pub use decision_tree::DecisionTreeConfig;
pub use equal_frequency::EqualFrequencyConfig;
pub use equal_width::EqualWidthConfig;
pub use optimal::OptimalConfig;
pub use ordinal::{EncodingMethod, OrdinalConfig};

/// Numerical methods that need pre-bucketed input accept at most this many
/// distinct values
pub const MAX_PREBUCKETS: usize = 100;

/// Normal (non-special, non-missing) values of one feature
#[derive(Debug, Clone, PartialEq)]
pub enum NormalValues {
    Numerical(Vec<f64>),
    Categorical(Vec<String>),
}

/// Everything a method needs to fit one feature
#[derive(Debug, Clone)]
pub struct FitInput<'a> {
    pub feature: &'a str,
    /// Rows in the full column, specials and missing values included
    pub n_rows: usize,
    /// Number of special groups declared for the feature
    pub n_specials: usize,
    pub values: NormalValues,
    /// Target aligned with `values`
    pub target: Option<Vec<i32>>,
}

impl FitInput<'_> {
    pub fn len(&self) -> usize {
        match &self.values {
            NormalValues::Numerical(v) => v.len(),
            NormalValues::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn numerical(&self) -> Result<&[f64]> {
        match &self.values {
            NormalValues::Numerical(v) => Ok(v),
            NormalValues::Categorical(_) => {
                Err(invalid_config(format!("Feature '{}' is not numerical", self.feature)).into())
            }
        }
    }

    pub(crate) fn categorical(&self) -> Result<&[String]> {
        match &self.values {
            NormalValues::Categorical(v) => Ok(v),
            NormalValues::Numerical(_) => {
                Err(invalid_config(format!("Feature '{}' is not categorical", self.feature)).into())
            }
        }
    }

    pub(crate) fn target(&self, method: &str) -> Result<&[i32]> {
        self.target
            .as_deref()
            .ok_or_else(|| BucketError::MissingTarget(method.to_string()).into())
    }
}

/// Rule found for one feature plus any non-fatal conditions met on the way
#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    pub rule: BucketRule,
    pub warnings: Vec<String>,
}

impl From<BucketRule> for FitOutcome {
    fn from(rule: BucketRule) -> Self {
        Self {
            rule,
            warnings: Vec::new(),
        }
    }
}

/// Mapping supplied by the caller instead of fitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInputConfig {
    pub mapping: FeaturesBucketMapping,
}

/// The bucketing algorithm and its hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum BucketingMethod {
    Optimal(OptimalConfig),
    EqualWidth(EqualWidthConfig),
    EqualFrequency(EqualFrequencyConfig),
    AgglomerativeClustering(AgglomerativeConfig),
    DecisionTree(DecisionTreeConfig),
    OrdinalCategorical(OrdinalConfig),
    AsIsCategorical,
    AsIsNumerical(AsIsNumericalConfig),
    UserInput(UserInputConfig),
}

impl BucketingMethod {
    pub fn name(&self) -> &'static str {
        match self {
            BucketingMethod::Optimal(_) => "OptimalBucketer",
            BucketingMethod::EqualWidth(_) => "EqualWidthBucketer",
            BucketingMethod::EqualFrequency(_) => "EqualFrequencyBucketer",
            BucketingMethod::AgglomerativeClustering(_) => "AgglomerativeClusteringBucketer",
            BucketingMethod::DecisionTree(_) => "DecisionTreeBucketer",
            BucketingMethod::OrdinalCategorical(_) => "OrdinalCategoricalBucketer",
            BucketingMethod::AsIsCategorical => "AsIsCategoricalBucketer",
            BucketingMethod::AsIsNumerical(_) => "AsIsNumericalBucketer",
            BucketingMethod::UserInput(_) => "UserInputBucketer",
        }
    }

    /// Kind of features the method partitions; `None` when it varies per
    /// feature (user input)
    pub fn kind(&self) -> Option<FeatureKind> {
        match self {
            BucketingMethod::Optimal(config) => Some(config.variables_type),
            BucketingMethod::OrdinalCategorical(_) | BucketingMethod::AsIsCategorical => {
                Some(FeatureKind::Categorical)
            }
            BucketingMethod::UserInput(_) => None,
            _ => Some(FeatureKind::Numerical),
        }
    }

    /// Whether fitting needs a target
    pub fn is_supervised(&self) -> bool {
        match self {
            BucketingMethod::Optimal(_) | BucketingMethod::DecisionTree(_) => true,
            BucketingMethod::OrdinalCategorical(config) => config.encoding_method == EncodingMethod::Ordered,
            _ => false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            BucketingMethod::Optimal(config) => config.validate(),
            BucketingMethod::EqualWidth(config) => config.validate(),
            BucketingMethod::EqualFrequency(config) => config.validate(),
            BucketingMethod::AgglomerativeClustering(config) => config.validate(),
            BucketingMethod::DecisionTree(config) => config.validate(),
            BucketingMethod::OrdinalCategorical(config) => config.validate(),
            BucketingMethod::AsIsCategorical
            | BucketingMethod::AsIsNumerical(_)
            | BucketingMethod::UserInput(_) => Ok(()),
        }
    }

    /// Fit one feature's normal values
    pub fn fit_feature(&self, input: &FitInput) -> Result<FitOutcome> {
        match self {
            BucketingMethod::Optimal(config) => optimal::fit(config, input),
            BucketingMethod::EqualWidth(config) => equal_width::fit(config, input),
            BucketingMethod::EqualFrequency(config) => equal_frequency::fit(config, input),
            BucketingMethod::AgglomerativeClustering(config) => agglomerative::fit(config, input),
            BucketingMethod::DecisionTree(config) => decision_tree::fit(config, input),
            BucketingMethod::OrdinalCategorical(config) => ordinal::fit(config, input),
            BucketingMethod::AsIsCategorical => as_is::fit_categorical(input),
            BucketingMethod::AsIsNumerical(config) => as_is::fit_numerical(config, input),
            BucketingMethod::UserInput(config) => config
                .mapping
                .get(input.feature)
                .map(|m| FitOutcome::from(m.rule().clone()))
                .ok_or_else(|| {
                    invalid_config(format!("No user mapping for feature '{}'", input.feature)).into()
                }),
        }
    }
}

/// Shared check for bin-count knobs
pub(crate) fn check_n_bins(method: &str, n_bins: usize) -> Result<()> {
    if n_bins < 1 {
        return Err(invalid_config(format!("{}: n_bins must be at least 1", method)).into());
    }
    Ok(())
}

/// Shared check for minimum bucket size fractions
pub(crate) fn check_min_bin_size(method: &str, min_bin_size: f64) -> Result<()> {
    if !(min_bin_size > 0.0 && min_bin_size <= 0.5) {
        return Err(invalid_config(format!(
            "{}: min_bin_size must be in (0, 0.5], got {}",
            method, min_bin_size
        ))
        .into());
    }
    Ok(())
}

/// Sorted distinct values
pub(crate) fn sorted_unique(values: &[f64]) -> Vec<f64> {
    let mut unique = values.to_vec();
    unique.sort_by(|a, b| a.total_cmp(b));
    unique.dedup();
    unique
}
