//! Raw feature values and special-value declarations

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::invalid_config;

/// Whether a feature is partitioned by boundaries or by a category map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Numerical,
    Categorical,
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureKind::Numerical => write!(f, "numerical"),
            FeatureKind::Categorical => write!(f, "categorical"),
        }
    }
}

impl std::str::FromStr for FeatureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "numerical" | "numeric" => Ok(FeatureKind::Numerical),
            "categorical" => Ok(FeatureKind::Categorical),
            _ => Err(format!(
                "Unknown variables type: '{}'. Use 'numerical' or 'categorical'.",
                s
            )),
        }
    }
}

/// A raw value listed under a special group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecialValue {
    Number(f64),
    Text(String),
}

impl SpecialValue {
    /// Numeric reading of the value, parsing text when possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SpecialValue::Number(v) => Some(*v),
            SpecialValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Category key the value matches in a categorical feature
    pub fn category_key(&self) -> String {
        match self {
            SpecialValue::Number(v) => category_key(*v),
            SpecialValue::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for SpecialValue {
    fn from(v: f64) -> Self {
        SpecialValue::Number(v)
    }
}

impl From<&str> for SpecialValue {
    fn from(v: &str) -> Self {
        SpecialValue::Text(v.to_string())
    }
}

/// A named group of raw values that bypass normal partitioning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialGroup {
    pub label: String,
    pub values: Vec<SpecialValue>,
}

impl SpecialGroup {
    pub fn new(label: impl Into<String>, values: Vec<SpecialValue>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }

    /// Label of the bucket this group is assigned to
    pub fn bucket_label(&self) -> String {
        format!("Special: {}", self.label)
    }
}

/// Render a number as a category key.
///
/// Whole numbers drop their fractional part so that integer columns, float
/// columns and integer bucket codes all produce the same key.
pub fn category_key(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// One column of raw values, `None` marking a missing value
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValues {
    Numerical(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl FeatureValues {
    /// Extract a column in the representation `kind` requires.
    ///
    /// NaN is read as missing for numerical features.
    pub fn from_column(column: &Column, kind: FeatureKind) -> Result<Self> {
        let name = column.name().to_string();
        match kind {
            FeatureKind::Numerical => {
                if !(column.dtype().is_primitive_numeric() || column.dtype() == &DataType::Boolean)
                {
                    return Err(invalid_config(format!(
                        "Numerical feature '{}' has non-numeric dtype {}",
                        name,
                        column.dtype()
                    ))
                    .into());
                }
                let cast = column
                    .cast(&DataType::Float64)
                    .with_context(|| format!("Failed to read '{}' as Float64", name))?;
                let values = cast
                    .f64()?
                    .iter()
                    .map(|v| v.filter(|x| !x.is_nan()))
                    .collect();
                Ok(FeatureValues::Numerical(values))
            }
            FeatureKind::Categorical => {
                let values: Vec<Option<String>> = match column.dtype() {
                    DataType::String => column
                        .str()?
                        .iter()
                        .map(|v| v.map(|s| s.to_string()))
                        .collect(),
                    DataType::Boolean => column
                        .bool()?
                        .iter()
                        .map(|v| v.map(|b| b.to_string()))
                        .collect(),
                    dt if dt.is_primitive_numeric() => {
                        let cast = column.cast(&DataType::Float64)?;
                        cast.f64()?
                            .iter()
                            .map(|v| v.filter(|x| !x.is_nan()).map(category_key))
                            .collect()
                    }
                    _ => {
                        let cast = column
                            .cast(&DataType::String)
                            .with_context(|| format!("Failed to read '{}' as String", name))?;
                        cast.str()?
                            .iter()
                            .map(|v| v.map(|s| s.to_string()))
                            .collect()
                    }
                };
                Ok(FeatureValues::Categorical(values))
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FeatureValues::Numerical(v) => v.len(),
            FeatureValues::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureValues::Numerical(_) => FeatureKind::Numerical,
            FeatureValues::Categorical(_) => FeatureKind::Categorical,
        }
    }

    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            FeatureValues::Numerical(v) => v[row].is_none(),
            FeatureValues::Categorical(v) => v[row].is_none(),
        }
    }
}

/// Special values resolved against one feature kind for fast matching
#[derive(Debug, Clone, Default)]
pub(crate) struct SpecialMatcher {
    numbers: Vec<(f64, usize)>,
    keys: Vec<(String, usize)>,
}

impl SpecialMatcher {
    pub(crate) fn new(groups: &[SpecialGroup], kind: FeatureKind) -> Self {
        let mut matcher = SpecialMatcher::default();
        for (index, group) in groups.iter().enumerate() {
            for value in &group.values {
                match kind {
                    FeatureKind::Numerical => {
                        if let Some(v) = value.as_number() {
                            matcher.numbers.push((v, index));
                        }
                    }
                    FeatureKind::Categorical => {
                        matcher.keys.push((value.category_key(), index));
                    }
                }
            }
        }
        matcher
    }

    pub(crate) fn match_number(&self, v: f64) -> Option<usize> {
        self.numbers
            .iter()
            .find(|(special, _)| *special == v)
            .map(|(_, index)| *index)
    }

    pub(crate) fn match_key(&self, key: &str) -> Option<usize> {
        self.keys
            .iter()
            .find(|(special, _)| special == key)
            .map(|(_, index)| *index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_key_drops_integer_fraction() {
        assert_eq!(category_key(1.0), "1");
        assert_eq!(category_key(-3.0), "-3");
        assert_eq!(category_key(2.5), "2.5");
    }

    #[test]
    fn test_special_value_untagged_serde() {
        let values: Vec<SpecialValue> = serde_json::from_str(r#"[400000, "unknown"]"#).unwrap();
        assert_eq!(values[0], SpecialValue::Number(400000.0));
        assert_eq!(values[1], SpecialValue::Text("unknown".to_string()));
    }

    #[test]
    fn test_numeric_column_nan_is_missing() {
        let column = Column::new("x".into(), [Some(1.0f64), None, Some(f64::NAN)]);
        let values = FeatureValues::from_column(&column, FeatureKind::Numerical).unwrap();
        assert_eq!(values, FeatureValues::Numerical(vec![Some(1.0), None, None]));
    }

    #[test]
    fn test_integer_column_as_categories() {
        let column = Column::new("x".into(), [1i64, 2, 1]);
        let values = FeatureValues::from_column(&column, FeatureKind::Categorical).unwrap();
        assert_eq!(
            values,
            FeatureValues::Categorical(vec![
                Some("1".to_string()),
                Some("2".to_string()),
                Some("1".to_string())
            ])
        );
    }

    #[test]
    fn test_string_column_rejected_as_numerical() {
        let column = Column::new("x".into(), ["a", "b"]);
        assert!(FeatureValues::from_column(&column, FeatureKind::Numerical).is_err());
    }

    #[test]
    fn test_special_matcher() {
        let groups = vec![
            SpecialGroup::new("=0", vec![SpecialValue::Number(0.0)]),
            SpecialGroup::new("high", vec![SpecialValue::Number(999.0), "1000".into()]),
        ];
        let matcher = SpecialMatcher::new(&groups, FeatureKind::Numerical);
        assert_eq!(matcher.match_number(0.0), Some(0));
        assert_eq!(matcher.match_number(1000.0), Some(1));
        assert_eq!(matcher.match_number(5.0), None);
    }
}
