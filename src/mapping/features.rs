//! Mappings for a set of features
//!
//! [`FeaturesBucketMapping`] keeps one [`BucketMapping`] per feature in
//! insertion order, applies them to a DataFrame, persists them as JSON or
//! YAML and composes a pre-bucketing stage with a bucketing stage.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::bucket_id::BucketId;
use super::bucket_mapping::{BucketMapping, BucketRule};
use crate::error::BucketError;

/// What happens to input columns that no mapping covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remainder {
    /// Keep them unchanged
    #[default]
    Passthrough,
    /// Remove them from the output
    Drop,
}

impl std::fmt::Display for Remainder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Remainder::Passthrough => write!(f, "passthrough"),
            Remainder::Drop => write!(f, "drop"),
        }
    }
}

impl std::str::FromStr for Remainder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "passthrough" => Ok(Remainder::Passthrough),
            "drop" => Ok(Remainder::Drop),
            _ => Err(format!(
                "Unknown remainder: '{}'. Use 'passthrough' or 'drop'.",
                s
            )),
        }
    }
}

/// Ordered collection of per-feature mappings with unique feature names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<BucketMapping>", into = "Vec<BucketMapping>")]
pub struct FeaturesBucketMapping {
    mappings: Vec<BucketMapping>,
}

impl TryFrom<Vec<BucketMapping>> for FeaturesBucketMapping {
    type Error = BucketError;

    fn try_from(mappings: Vec<BucketMapping>) -> Result<Self, Self::Error> {
        let mut seen = std::collections::BTreeSet::new();
        for mapping in &mappings {
            if !seen.insert(mapping.feature_name().to_string()) {
                return Err(BucketError::InvalidConfig(format!(
                    "Feature '{}' has more than one bucket mapping",
                    mapping.feature_name()
                )));
            }
            if let Err(e) = mapping.validate() {
                return Err(match e.downcast::<BucketError>() {
                    Ok(err) => err,
                    Err(other) => BucketError::InvalidMapping {
                        feature: mapping.feature_name().to_string(),
                        reason: other.to_string(),
                    },
                });
            }
        }
        Ok(Self { mappings })
    }
}

impl From<FeaturesBucketMapping> for Vec<BucketMapping> {
    fn from(features: FeaturesBucketMapping) -> Self {
        features.mappings
    }
}

impl FeaturesBucketMapping {
    pub fn new(mappings: Vec<BucketMapping>) -> Result<Self> {
        Ok(Self::try_from(mappings)?)
    }

    pub fn get(&self, feature: &str) -> Option<&BucketMapping> {
        self.mappings.iter().find(|m| m.feature_name() == feature)
    }

    /// Feature names in insertion order
    pub fn columns(&self) -> Vec<String> {
        self.mappings
            .iter()
            .map(|m| m.feature_name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BucketMapping> {
        self.mappings.iter()
    }

    /// Add mappings for further features, rejecting names already present
    pub fn extend(&mut self, other: FeaturesBucketMapping) -> Result<()> {
        for mapping in other.mappings {
            if self.get(mapping.feature_name()).is_some() {
                bail!(BucketError::InvalidConfig(format!(
                    "Feature '{}' has more than one bucket mapping",
                    mapping.feature_name()
                )));
            }
            self.mappings.push(mapping);
        }
        Ok(())
    }

    /// Replace every mapped column by its Int64 bucket codes.
    ///
    /// Column order is preserved. With [`Remainder::Drop`] only the mapped
    /// columns are kept.
    pub fn transform(&self, df: &DataFrame, remainder: Remainder) -> Result<DataFrame> {
        let available: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut out = df.clone();
        for mapping in &self.mappings {
            let column = df.column(mapping.feature_name()).map_err(|_| BucketError::UnknownColumn {
                column: mapping.feature_name().to_string(),
                available: available.clone(),
            })?;
            let bucketed = mapping
                .transform_column(column)
                .with_context(|| format!("Failed to bucket column '{}'", mapping.feature_name()))?;
            out.with_column(bucketed)?;
        }

        match remainder {
            Remainder::Passthrough => Ok(out),
            Remainder::Drop => {
                let keep: Vec<String> = available
                    .into_iter()
                    .filter(|name| self.get(name).is_some())
                    .collect();
                Ok(out.select(keep)?)
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse bucket mapping JSON")
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse bucket mapping YAML")
    }

    /// Write to `path`, choosing JSON or YAML from the extension
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = match Format::from_path(path)? {
            Format::Json => self.to_json()?,
            Format::Yaml => self.to_yaml()?,
        };
        fs::write(path, text)
            .with_context(|| format!("Failed to write bucket mapping to {}", path.display()))?;
        tracing::info!(path = %path.display(), features = self.len(), "saved bucket mapping");
        Ok(())
    }

    /// Read a mapping written by [`FeaturesBucketMapping::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read bucket mapping from {}", path.display()))?;
        match Format::from_path(path)? {
            Format::Json => Self::from_json(&text),
            Format::Yaml => Self::from_yaml(&text),
        }
    }

    /// Compose a pre-bucketing stage with a bucketing stage.
    ///
    /// `second` was fitted on the codes `first` produces (with the missing
    /// code read as null). The result maps raw values directly to the final
    /// buckets. Features only `first` knows about are kept as they are.
    pub fn merge(first: &FeaturesBucketMapping, second: &FeaturesBucketMapping) -> Result<Self> {
        let mut merged = Vec::with_capacity(first.len());
        for p in &first.mappings {
            match second.get(p.feature_name()) {
                Some(q) => merged.push(compose(p, q)?),
                None => merged.push(p.clone()),
            }
        }
        Self::new(merged)
    }
}

enum Format {
    Json,
    Yaml,
}

impl Format {
    fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()) {
            Some(ext) if ext == "json" => Ok(Format::Json),
            Some(ext) if ext == "yaml" || ext == "yml" => Ok(Format::Yaml),
            _ => bail!(
                "Unsupported mapping file '{}'. Use a .json, .yaml or .yml extension.",
                path.display()
            ),
        }
    }
}

/// Bucket `q` assigns to the code of a first-stage bucket
pub fn chained_bucket(q: &BucketMapping, id: BucketId) -> BucketId {
    if id == BucketId::Missing {
        return q.missing_bucket();
    }
    let code = id.code();
    match q.rule() {
        BucketRule::Numerical { .. } => q.bucket_number(Some(code as f64)),
        BucketRule::Categorical { .. } => q.bucket_category(Some(&code.to_string())),
    }
}

fn compose(p: &BucketMapping, q: &BucketMapping) -> Result<BucketMapping> {
    let feature = p.feature_name().to_string();
    let not_composable = |reason: String| BucketError::NotComposable {
        feature: feature.clone(),
        reason,
    };

    for index in 0..p.specials().len() {
        let got = chained_bucket(q, BucketId::Special(index));
        if got != BucketId::Special(index) {
            return Err(not_composable(format!(
                "special group '{}' ends up in bucket {} instead of {}",
                p.specials()[index].label,
                got,
                BucketId::Special(index)
            ))
            .into());
        }
    }

    let missing = match chained_bucket(q, p.missing_bucket()) {
        BucketId::Other => {
            return Err(not_composable("missing values end up in the other bucket".to_string()).into())
        }
        BucketId::Missing => None,
        id => Some(id),
    };

    let composed = match p.rule() {
        BucketRule::Numerical { boundaries, right } => {
            let mut kept = Vec::new();
            let mut current: Option<usize> = None;
            for segment in 0..=boundaries.len() {
                let bin = match chained_bucket(q, BucketId::Bin(segment)) {
                    BucketId::Bin(b) => b,
                    other => {
                        return Err(not_composable(format!(
                            "segment {} ends up in bucket {}",
                            segment, other
                        ))
                        .into())
                    }
                };
                match current {
                    None if bin != 0 => {
                        return Err(not_composable(format!(
                            "the first segment ends up in bucket {} instead of 0",
                            bin
                        ))
                        .into())
                    }
                    None => {}
                    Some(prev) if bin == prev => {}
                    Some(prev) if bin == prev + 1 => kept.push(boundaries[segment - 1]),
                    Some(prev) => {
                        return Err(not_composable(format!(
                            "segments are not merged into contiguous buckets ({} follows {})",
                            bin, prev
                        ))
                        .into())
                    }
                }
                current = Some(bin);
            }
            BucketMapping::numerical(feature.clone(), kept, *right)?
        }
        BucketRule::Categorical { map } => {
            let mut composed: BTreeMap<String, usize> = BTreeMap::new();
            for (category, bucket) in map {
                match chained_bucket(q, BucketId::Bin(*bucket)) {
                    BucketId::Bin(b) => {
                        composed.insert(category.clone(), b);
                    }
                    other => {
                        return Err(not_composable(format!(
                            "category '{}' ends up in bucket {}",
                            category, other
                        ))
                        .into())
                    }
                }
            }
            let unseen = match p.other_bucket() {
                Some(b) => BucketId::Bin(b),
                None => BucketId::Other,
            };
            let other = match chained_bucket(q, unseen) {
                BucketId::Bin(b) => Some(b),
                BucketId::Other => None,
                id => {
                    return Err(not_composable(format!("unseen categories end up in bucket {}", id)).into())
                }
            };
            BucketMapping::categorical(feature.clone(), composed)?.with_other_bucket(other)?
        }
    };

    composed
        .with_specials(p.specials().to_vec())?
        .with_missing_bucket(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::values::{SpecialGroup, SpecialValue};

    fn categories(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_duplicate_feature_rejected() {
        let a = BucketMapping::numerical("x", vec![1.0], true).unwrap();
        assert!(FeaturesBucketMapping::new(vec![a.clone(), a]).is_err());
    }

    #[test]
    fn test_transform_replaces_columns_and_keeps_order() {
        let mapping = FeaturesBucketMapping::new(vec![
            BucketMapping::numerical("x", vec![25.0], true).unwrap(),
        ])
        .unwrap();
        let df = df! {
            "id" => [1i64, 2, 3],
            "x" => [Some(10.0), Some(30.0), None],
        }
        .unwrap();

        let out = mapping.transform(&df, Remainder::Passthrough).unwrap();
        let names: Vec<String> = out.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["id", "x"]);
        let codes: Vec<Option<i64>> = out.column("x").unwrap().i64().unwrap().iter().collect();
        assert_eq!(codes, vec![Some(0), Some(1), Some(-1)]);

        let dropped = mapping.transform(&df, Remainder::Drop).unwrap();
        let names: Vec<String> = dropped.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["x"]);
    }

    #[test]
    fn test_unknown_column() {
        let mapping = FeaturesBucketMapping::new(vec![
            BucketMapping::numerical("missing_col", vec![], true).unwrap(),
        ])
        .unwrap();
        let df = df! { "x" => [1.0, 2.0] }.unwrap();
        let err = mapping.transform(&df, Remainder::Passthrough).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BucketError>(),
            Some(BucketError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_merge_numerical_collapses_segments() {
        let first = FeaturesBucketMapping::new(vec![BucketMapping::numerical(
            "x",
            vec![1.0, 2.0, 3.0],
            false,
        )
        .unwrap()])
        .unwrap();
        // codes 0,1 -> 0 and codes 2,3 -> 1
        let second = FeaturesBucketMapping::new(vec![BucketMapping::numerical(
            "x",
            vec![2.0],
            false,
        )
        .unwrap()])
        .unwrap();

        let merged = FeaturesBucketMapping::merge(&first, &second).unwrap();
        let x = merged.get("x").unwrap();
        assert_eq!(x.boundaries(), Some(&[2.0][..]));
        assert_eq!(x.right(), Some(false));
    }

    #[test]
    fn test_merge_keeps_specials_and_missing() {
        let specials = vec![SpecialGroup::new("=0", vec![SpecialValue::Number(0.0)])];
        let first = FeaturesBucketMapping::new(vec![BucketMapping::numerical("x", vec![5.0], true)
            .unwrap()
            .with_specials(specials.clone())
            .unwrap()])
        .unwrap();
        let second = FeaturesBucketMapping::new(vec![BucketMapping::numerical("x", vec![], false)
            .unwrap()
            .with_specials(vec![SpecialGroup::new("=0", vec![SpecialValue::Number(-3.0)])])
            .unwrap()
            .with_missing_bucket(Some(BucketId::Bin(0)))
            .unwrap()])
        .unwrap();

        let merged = FeaturesBucketMapping::merge(&first, &second).unwrap();
        let x = merged.get("x").unwrap();
        assert_eq!(x.bucket_number(Some(0.0)), BucketId::Special(0));
        assert_eq!(x.bucket_number(None), BucketId::Bin(0));
        assert_eq!(x.bucket_number(Some(100.0)), BucketId::Bin(0));
    }

    #[test]
    fn test_merge_categorical() {
        let first = FeaturesBucketMapping::new(vec![BucketMapping::categorical(
            "c",
            categories(&[("a", 0), ("b", 1), ("c", 2)]),
        )
        .unwrap()])
        .unwrap();
        let second = FeaturesBucketMapping::new(vec![BucketMapping::categorical(
            "c",
            categories(&[("0", 0), ("1", 1), ("2", 1)]),
        )
        .unwrap()])
        .unwrap();

        let merged = FeaturesBucketMapping::merge(&first, &second).unwrap();
        let c = merged.get("c").unwrap();
        assert_eq!(c.bucket_category(Some("a")), BucketId::Bin(0));
        assert_eq!(c.bucket_category(Some("c")), BucketId::Bin(1));
        assert_eq!(c.bucket_category(Some("zzz")), BucketId::Other);
    }

    #[test]
    fn test_merge_rejects_non_contiguous_numerical() {
        let first = FeaturesBucketMapping::new(vec![BucketMapping::numerical(
            "x",
            vec![1.0, 2.0],
            true,
        )
        .unwrap()])
        .unwrap();
        let second = FeaturesBucketMapping::new(vec![BucketMapping::categorical(
            "x",
            categories(&[("0", 0), ("1", 1), ("2", 0)]),
        )
        .unwrap()])
        .unwrap();
        let err = FeaturesBucketMapping::merge(&first, &second).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BucketError>(),
            Some(BucketError::NotComposable { .. })
        ));
    }

    #[test]
    fn test_json_roundtrip_is_stable() {
        let mapping = FeaturesBucketMapping::new(vec![
            BucketMapping::numerical("x", vec![0.1, 1.0 / 3.0], true).unwrap(),
            BucketMapping::categorical("c", categories(&[("a", 0), ("b", 1)]))
                .unwrap()
                .with_other_bucket(Some(1))
                .unwrap(),
        ])
        .unwrap();
        let json = mapping.to_json().unwrap();
        let back = FeaturesBucketMapping::from_json(&json).unwrap();
        assert_eq!(back, mapping);
        assert_eq!(back.to_json().unwrap(), json);
    }

    #[test]
    fn test_remainder_from_str() {
        assert_eq!("drop".parse::<Remainder>().unwrap(), Remainder::Drop);
        assert!("keep".parse::<Remainder>().is_err());
    }
}
