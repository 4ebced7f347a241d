//! One feature's discretization rule
//!
//! A [`BucketMapping`] holds either ordered boundaries (numerical) or a
//! category map (categorical), the special groups carved out of the normal
//! partition and the bucket that missing values go to. Transforming is a pure
//! function of these fields, so a deserialized mapping buckets data exactly
//! like the one that was fitted.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::bucket_id::BucketId;
use super::values::{FeatureKind, FeatureValues, SpecialGroup, SpecialMatcher};
use crate::error::BucketError;

fn default_right() -> bool {
    true
}

/// The partition of the normal (non-special, non-missing) values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BucketRule {
    /// Boundaries `b_0 < ... < b_{n-1}` cut the real line into `n + 1` buckets.
    /// With `right` a boundary belongs to the bucket below it, otherwise to
    /// the bucket above it.
    Numerical {
        boundaries: Vec<f64>,
        #[serde(default = "default_right")]
        right: bool,
    },
    /// Category key to bucket index; several keys may share a bucket.
    Categorical { map: BTreeMap<String, usize> },
}

/// Discretization rule for one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketMapping {
    feature_name: String,
    #[serde(flatten)]
    rule: BucketRule,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    specials: Vec<SpecialGroup>,
    /// `None` keeps missing values in their own bucket (-1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    missing_bucket: Option<BucketId>,
    /// Normal bucket for unseen categories instead of -2
    #[serde(default, skip_serializing_if = "Option::is_none")]
    other_bucket: Option<usize>,
}

impl BucketMapping {
    /// Numerical mapping from boundaries and inclusion side
    pub fn numerical(feature_name: impl Into<String>, boundaries: Vec<f64>, right: bool) -> Result<Self> {
        let mapping = Self {
            feature_name: feature_name.into(),
            rule: BucketRule::Numerical { boundaries, right },
            specials: Vec::new(),
            missing_bucket: None,
            other_bucket: None,
        };
        mapping.validate()?;
        Ok(mapping)
    }

    /// Categorical mapping from category keys to bucket indices
    pub fn categorical(feature_name: impl Into<String>, map: BTreeMap<String, usize>) -> Result<Self> {
        let mapping = Self {
            feature_name: feature_name.into(),
            rule: BucketRule::Categorical { map },
            specials: Vec::new(),
            missing_bucket: None,
            other_bucket: None,
        };
        mapping.validate()?;
        Ok(mapping)
    }

    pub fn from_rule(feature_name: impl Into<String>, rule: BucketRule) -> Result<Self> {
        match rule {
            BucketRule::Numerical { boundaries, right } => Self::numerical(feature_name, boundaries, right),
            BucketRule::Categorical { map } => Self::categorical(feature_name, map),
        }
    }

    pub fn with_specials(mut self, specials: Vec<SpecialGroup>) -> Result<Self> {
        self.specials = specials;
        self.validate()?;
        Ok(self)
    }

    pub fn with_missing_bucket(mut self, missing_bucket: Option<BucketId>) -> Result<Self> {
        self.missing_bucket = missing_bucket.filter(|id| *id != BucketId::Missing);
        self.validate()?;
        Ok(self)
    }

    pub fn with_other_bucket(mut self, other_bucket: Option<usize>) -> Result<Self> {
        self.other_bucket = other_bucket;
        self.validate()?;
        Ok(self)
    }

    pub fn feature_name(&self) -> &str {
        &self.feature_name
    }

    pub fn kind(&self) -> FeatureKind {
        match self.rule {
            BucketRule::Numerical { .. } => FeatureKind::Numerical,
            BucketRule::Categorical { .. } => FeatureKind::Categorical,
        }
    }

    pub fn rule(&self) -> &BucketRule {
        &self.rule
    }

    pub fn boundaries(&self) -> Option<&[f64]> {
        match &self.rule {
            BucketRule::Numerical { boundaries, .. } => Some(boundaries),
            BucketRule::Categorical { .. } => None,
        }
    }

    pub fn right(&self) -> Option<bool> {
        match &self.rule {
            BucketRule::Numerical { right, .. } => Some(*right),
            BucketRule::Categorical { .. } => None,
        }
    }

    pub fn category_map(&self) -> Option<&BTreeMap<String, usize>> {
        match &self.rule {
            BucketRule::Categorical { map } => Some(map),
            BucketRule::Numerical { .. } => None,
        }
    }

    pub fn specials(&self) -> &[SpecialGroup] {
        &self.specials
    }

    /// Bucket missing values are assigned to
    pub fn missing_bucket(&self) -> BucketId {
        self.missing_bucket.unwrap_or(BucketId::Missing)
    }

    pub fn other_bucket(&self) -> Option<usize> {
        self.other_bucket
    }

    /// Size of the normal partition
    pub fn num_buckets(&self) -> usize {
        match &self.rule {
            BucketRule::Numerical { boundaries, .. } => boundaries.len() + 1,
            BucketRule::Categorical { map } => map.values().max().map(|m| m + 1).unwrap_or(0),
        }
    }

    /// Check the invariants: finite strictly increasing boundaries, disjoint
    /// special values with unique labels, and reserved buckets in range.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| BucketError::InvalidMapping {
            feature: self.feature_name.clone(),
            reason,
        };

        if let BucketRule::Numerical { boundaries, .. } = &self.rule {
            if let Some(b) = boundaries.iter().find(|b| !b.is_finite()) {
                return Err(invalid(format!("boundary {} is not finite", b)).into());
            }
            if boundaries.windows(2).any(|w| w[0] >= w[1]) {
                return Err(invalid("boundaries must be strictly increasing".to_string()).into());
            }
        }

        let mut labels = BTreeSet::new();
        for group in &self.specials {
            if !labels.insert(group.label.as_str()) {
                return Err(invalid(format!("special label '{}' is declared twice", group.label)).into());
            }
        }

        match self.kind() {
            FeatureKind::Numerical => {
                let mut seen: Vec<f64> = Vec::new();
                for group in &self.specials {
                    for value in &group.values {
                        let v = value.as_number().ok_or_else(|| {
                            invalid(format!(
                                "special value {:?} in '{}' is not numeric",
                                value, group.label
                            ))
                        })?;
                        if seen.contains(&v) {
                            return Err(invalid(format!("special value {} appears in more than one group", v)).into());
                        }
                        seen.push(v);
                    }
                }
            }
            FeatureKind::Categorical => {
                let mut seen = BTreeSet::new();
                for group in &self.specials {
                    for value in &group.values {
                        let key = value.category_key();
                        if !seen.insert(key.clone()) {
                            return Err(invalid(format!("special value '{}' appears in more than one group", key)).into());
                        }
                    }
                }
            }
        }

        let n = self.num_buckets();
        match self.missing_bucket {
            Some(BucketId::Bin(b)) if b >= n => {
                return Err(invalid(format!("missing bucket {} is outside the {} normal buckets", b, n)).into());
            }
            Some(BucketId::Special(s)) if s >= self.specials.len() => {
                return Err(invalid(format!("missing bucket refers to undeclared special group {}", s)).into());
            }
            Some(BucketId::Other) if self.kind() == FeatureKind::Numerical => {
                return Err(invalid("a numerical mapping has no other bucket for missing values".to_string()).into());
            }
            _ => {}
        }
        if let Some(b) = self.other_bucket {
            if self.kind() != FeatureKind::Categorical {
                return Err(invalid("an other bucket only applies to categorical mappings".to_string()).into());
            }
            if b >= n {
                return Err(invalid(format!("other bucket {} is outside the {} normal buckets", b, n)).into());
            }
        }
        Ok(())
    }

    /// Bucket of a single numerical value
    pub fn bucket_number(&self, value: Option<f64>) -> BucketId {
        let matcher = SpecialMatcher::new(&self.specials, FeatureKind::Numerical);
        self.bucket_number_with(value, &matcher)
    }

    /// Bucket of a single category key
    pub fn bucket_category(&self, key: Option<&str>) -> BucketId {
        let matcher = SpecialMatcher::new(&self.specials, FeatureKind::Categorical);
        self.bucket_category_with(key, &matcher)
    }

    fn bucket_number_with(&self, value: Option<f64>, matcher: &SpecialMatcher) -> BucketId {
        let v = match value {
            Some(v) if !v.is_nan() => v,
            _ => return self.missing_bucket(),
        };
        if let Some(index) = matcher.match_number(v) {
            return BucketId::Special(index);
        }
        match &self.rule {
            BucketRule::Numerical { boundaries, right } => {
                let segment = if *right {
                    boundaries.partition_point(|b| *b < v)
                } else {
                    boundaries.partition_point(|b| *b <= v)
                };
                BucketId::Bin(segment)
            }
            BucketRule::Categorical { .. } => self.bucket_category_with(Some(&super::values::category_key(v)), matcher),
        }
    }

    fn bucket_category_with(&self, key: Option<&str>, matcher: &SpecialMatcher) -> BucketId {
        let key = match key {
            Some(k) => k,
            None => return self.missing_bucket(),
        };
        if let Some(index) = matcher.match_key(key) {
            return BucketId::Special(index);
        }
        match &self.rule {
            BucketRule::Categorical { map } => match map.get(key) {
                Some(b) => BucketId::Bin(*b),
                None => self.other_bucket.map(BucketId::Bin).unwrap_or(BucketId::Other),
            },
            BucketRule::Numerical { .. } => match key.trim().parse::<f64>() {
                Ok(v) => self.bucket_number(Some(v)),
                Err(_) => BucketId::Other,
            },
        }
    }

    /// Bucket every value of a column
    pub fn transform(&self, values: &FeatureValues) -> Vec<BucketId> {
        let matcher = SpecialMatcher::new(&self.specials, self.kind());
        match values {
            FeatureValues::Numerical(v) => v
                .iter()
                .map(|x| self.bucket_number_with(*x, &matcher))
                .collect(),
            FeatureValues::Categorical(v) => v
                .iter()
                .map(|x| self.bucket_category_with(x.as_deref(), &matcher))
                .collect(),
        }
    }

    /// Bucket a polars column into an Int64 column of bucket codes
    pub fn transform_column(&self, column: &Column) -> Result<Column> {
        let values = FeatureValues::from_column(column, self.kind())?;
        let codes: Vec<i64> = self.transform(&values).iter().map(|id| id.code()).collect();
        Ok(Column::new(column.name().clone(), codes))
    }

    /// Human-readable label for every bucket the mapping can produce.
    ///
    /// Normal buckets come first in partition order, followed by the missing
    /// and other buckets and the special groups. An explicit missing (or
    /// other) bucket is tagged on the label of the bucket it points to.
    pub fn labels(&self) -> Vec<(BucketId, String)> {
        let mut labels: Vec<(BucketId, String)> = match &self.rule {
            BucketRule::Numerical { boundaries, right } => {
                let n = boundaries.len();
                (0..=n)
                    .map(|i| {
                        let lo = if i == 0 { "-inf".to_string() } else { format_bound(boundaries[i - 1]) };
                        let hi = if i == n { "inf".to_string() } else { format_bound(boundaries[i]) };
                        let label = if *right {
                            format!("({}, {}]", lo, hi)
                        } else {
                            format!("[{}, {})", lo, hi)
                        };
                        (BucketId::Bin(i), label)
                    })
                    .collect()
            }
            BucketRule::Categorical { map } => {
                let mut grouped: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
                for (key, bucket) in map {
                    grouped.entry(*bucket).or_default().push(key.as_str());
                }
                (0..self.num_buckets())
                    .map(|b| {
                        let keys = grouped.get(&b).map(|k| k.join(", ")).unwrap_or_default();
                        (BucketId::Bin(b), keys)
                    })
                    .collect()
            }
        };

        if let Some(BucketId::Bin(b)) = self.missing_bucket {
            if let Some((_, label)) = labels.get_mut(b) {
                label.push_str(" | Missing");
            }
        } else if self.missing_bucket.is_none() {
            labels.push((BucketId::Missing, "Missing".to_string()));
        }

        if self.kind() == FeatureKind::Categorical {
            match self.other_bucket {
                Some(b) => {
                    if let Some((_, label)) = labels.get_mut(b) {
                        label.push_str(" | Other");
                    }
                }
                None => labels.push((BucketId::Other, "Other".to_string())),
            }
        }

        for (index, group) in self.specials.iter().enumerate() {
            let mut label = group.bucket_label();
            if self.missing_bucket == Some(BucketId::Special(index)) {
                label.push_str(" | Missing");
            }
            labels.push((BucketId::Special(index), label));
        }
        labels
    }

    /// Label of one bucket
    pub fn label(&self, id: BucketId) -> String {
        self.labels()
            .into_iter()
            .find(|(bucket, _)| *bucket == id)
            .map(|(_, label)| label)
            .unwrap_or_else(|| format!("Bucket {}", id))
    }
}

fn format_bound(v: f64) -> String {
    format!("{}", v)
}
