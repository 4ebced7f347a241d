//! YAML configuration of a bucketing process
//!
//! ```yaml
//! specials:
//!   LIMIT_BAL:
//!     - label: "=50000"
//!       values: [50000]
//! prebucketing:
//!   - method: decision_tree
//!     max_n_bins: 50
//!     min_bin_size: 0.02
//!     variables: [LIMIT_BAL, BILL_AMT1]
//! bucketing:
//!   - method: optimal
//!     max_n_bins: 6
//!     variables: [LIMIT_BAL, BILL_AMT1]
//!     missing_treatment: most_frequent
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::invalid_config;
use crate::mapping::Remainder;
use crate::pipeline::{Bucketer, BucketerOptions, BucketingMethod, BucketingProcess, Specials};

/// One bucketer: the `method` tag with its options next to the shared options
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    #[serde(flatten)]
    pub method: BucketingMethod,
    #[serde(flatten)]
    pub options: BucketerOptions,
}

impl StepConfig {
    fn build(self) -> Result<Bucketer> {
        Bucketer::new(self.method, self.options)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    pub specials: Specials,
    pub remainder: Remainder,
    pub prebucketing: Vec<StepConfig>,
    pub bucketing: Vec<StepConfig>,
}

impl ProcessConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse process configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Validate every step and assemble the process; both stage lists empty
    /// selects the default stages
    pub fn build(self) -> Result<BucketingProcess> {
        let process = match (self.prebucketing.is_empty(), self.bucketing.is_empty()) {
            (true, true) => BucketingProcess::with_defaults(Vec::new(), self.specials)?,
            (false, false) => {
                let prebucketing = self
                    .prebucketing
                    .into_iter()
                    .map(StepConfig::build)
                    .collect::<Result<Vec<_>>>()
                    .context("Invalid pre-bucketing step")?;
                let bucketing = self
                    .bucketing
                    .into_iter()
                    .map(StepConfig::build)
                    .collect::<Result<Vec<_>>>()
                    .context("Invalid bucketing step")?;
                BucketingProcess::new(prebucketing, bucketing, self.specials)?
            }
            _ => {
                return Err(invalid_config(
                    "Configure both 'prebucketing' and 'bucketing', or neither to use the defaults",
                )
                .into())
            }
        };
        Ok(process.with_remainder(self.remainder))
    }
}
