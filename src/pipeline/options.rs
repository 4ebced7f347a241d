//! Options shared by every bucketer
//!
//! Validated eagerly when a bucketer is built so that configuration mistakes
//! never surface halfway through a fit.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::invalid_config;
use crate::mapping::{BucketId, Remainder, SpecialGroup};

/// Special groups per feature, groups in declaration order
pub type Specials = BTreeMap<String, Vec<SpecialGroup>>;

/// Where missing values go
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMissingTreatment", into = "RawMissingTreatment")]
pub enum MissingTreatment {
    /// Dedicated bucket -1
    #[default]
    Separate,
    /// The most populated bucket, resolved while fitting
    MostFrequent,
    /// Bucket code per feature; unlisted features keep missing values separate
    Explicit(BTreeMap<String, i64>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawMissingTreatment {
    Named(String),
    Explicit(BTreeMap<String, i64>),
}

impl TryFrom<RawMissingTreatment> for MissingTreatment {
    type Error = String;

    fn try_from(raw: RawMissingTreatment) -> Result<Self, Self::Error> {
        match raw {
            RawMissingTreatment::Named(name) => name.parse(),
            RawMissingTreatment::Explicit(map) => Ok(MissingTreatment::Explicit(map)),
        }
    }
}

impl From<MissingTreatment> for RawMissingTreatment {
    fn from(treatment: MissingTreatment) -> Self {
        match treatment {
            MissingTreatment::Explicit(map) => RawMissingTreatment::Explicit(map),
            other => RawMissingTreatment::Named(other.to_string()),
        }
    }
}

impl std::fmt::Display for MissingTreatment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingTreatment::Separate => write!(f, "separate"),
            MissingTreatment::MostFrequent => write!(f, "most_frequent"),
            MissingTreatment::Explicit(map) => write!(f, "explicit ({} features)", map.len()),
        }
    }
}

impl std::str::FromStr for MissingTreatment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "separate" => Ok(MissingTreatment::Separate),
            "most_frequent" => Ok(MissingTreatment::MostFrequent),
            _ => Err(format!(
                "Unsupported missing treatment: '{}'. Use 'separate', 'most_frequent' or a per-feature bucket map.",
                s
            )),
        }
    }
}

impl MissingTreatment {
    /// Missing bucket a fresh mapping gets before any statistics are known
    pub fn initial_bucket(&self, feature: &str) -> Option<BucketId> {
        match self {
            MissingTreatment::Explicit(map) => map.get(feature).map(|code| BucketId::from_code(*code)),
            _ => None,
        }
    }
}

/// Options every bucketing method accepts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketerOptions {
    /// Features to bucket; empty means every column
    pub variables: Vec<String>,
    pub specials: Specials,
    pub missing_treatment: MissingTreatment,
    pub remainder: Remainder,
}

impl BucketerOptions {
    pub fn new(variables: Vec<String>) -> Self {
        Self {
            variables,
            ..Default::default()
        }
    }

    pub fn with_specials(mut self, specials: Specials) -> Self {
        self.specials = specials;
        self
    }

    pub fn with_missing_treatment(mut self, missing_treatment: MissingTreatment) -> Self {
        self.missing_treatment = missing_treatment;
        self
    }

    pub fn with_remainder(mut self, remainder: Remainder) -> Self {
        self.remainder = remainder;
        self
    }

    /// Check the options that do not depend on data
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for variable in &self.variables {
            if !seen.insert(variable.as_str()) {
                return Err(invalid_config(format!("Variable '{}' is listed twice", variable)).into());
            }
        }

        for (feature, groups) in &self.specials {
            if !self.variables.is_empty() && !seen.contains(feature.as_str()) {
                return Err(invalid_config(format!(
                    "Specials are declared for '{}', which is not in variables",
                    feature
                ))
                .into());
            }
            let mut labels = BTreeSet::new();
            let mut keys = BTreeSet::new();
            for group in groups {
                if !labels.insert(group.label.as_str()) {
                    return Err(invalid_config(format!(
                        "Special label '{}' is declared twice for '{}'",
                        group.label, feature
                    ))
                    .into());
                }
                if group.values.is_empty() {
                    return Err(invalid_config(format!(
                        "Special group '{}' for '{}' has no values",
                        group.label, feature
                    ))
                    .into());
                }
                for value in &group.values {
                    if !keys.insert(value.category_key()) {
                        return Err(invalid_config(format!(
                            "Special value '{}' for '{}' appears in more than one group",
                            value.category_key(),
                            feature
                        ))
                        .into());
                    }
                }
            }
        }

        if let MissingTreatment::Explicit(map) = &self.missing_treatment {
            for feature in map.keys() {
                if !self.variables.is_empty() && !seen.contains(feature.as_str()) {
                    return Err(invalid_config(format!(
                        "A missing bucket is declared for '{}', which is not in variables",
                        feature
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Special groups of one feature
    pub fn specials_for(&self, feature: &str) -> &[SpecialGroup] {
        self.specials.get(feature).map(|g| g.as_slice()).unwrap_or(&[])
    }
}
