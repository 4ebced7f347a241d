//! Two-stage bucketing: pre-bucketing followed by bucketing
//!
//! The pre-bucketing stage turns raw values into a modest number of
//! fine-grained pre-buckets; the bucketing stage is fitted on those pre-bucket
//! codes. Specials are declared once on the process. The bucketing stage only
//! ever sees codes, so every special group is re-expressed as the code of the
//! pre-bucket that carries its label before stage two is fitted. The composed
//! mapping goes straight from raw values to final buckets.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;

use super::bucketer::{Bucketer, Transformer};
use super::methods::{BucketingMethod, DecisionTreeConfig, OptimalConfig};
use super::options::{BucketerOptions, Specials};
use super::sequence::BucketingPipeline;
use super::stats::BucketTable;
use crate::error::{invalid_config, BucketError};
use crate::mapping::{
    chained_bucket, BucketId, FeaturesBucketMapping, Remainder, SpecialGroup, SpecialValue, MISSING_CODE,
};
use crate::report::{column_dtypes, Summary};

/// Where a process is in its fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    #[default]
    Unfit,
    Prebucketed,
    Bucketed,
    Fitted,
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessState::Unfit => write!(f, "unfit"),
            ProcessState::Prebucketed => write!(f, "prebucketed"),
            ProcessState::Bucketed => write!(f, "bucketed"),
            ProcessState::Fitted => write!(f, "fitted"),
        }
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    /// Stage two with the remapped specials injected
    bucketing: BucketingPipeline,
    columns: Vec<(String, String)>,
    mapping: FeaturesBucketMapping,
    summary: Summary,
}

#[derive(Debug, Clone)]
pub struct BucketingProcess {
    prebucketing: BucketingPipeline,
    bucketing: BucketingPipeline,
    specials: Specials,
    remainder: Remainder,
    state: ProcessState,
    fitted: Option<Fitted>,
}

/// Specials restricted to the columns a step buckets
fn specials_for_step(step: &Bucketer, specials: &Specials) -> Specials {
    let variables = &step.options().variables;
    specials
        .iter()
        .filter(|(feature, _)| variables.is_empty() || variables.contains(feature))
        .map(|(feature, groups)| (feature.clone(), groups.clone()))
        .collect()
}

fn inject_specials(pipeline: &mut BucketingPipeline, specials: &Specials) -> Result<()> {
    for step in pipeline.steps_mut() {
        if matches!(step.method(), BucketingMethod::UserInput(_)) {
            continue;
        }
        let options = step.options().clone().with_specials(specials_for_step(step, specials));
        step.set_options(options)?;
    }
    Ok(())
}

impl BucketingProcess {
    /// Build a process from its two stages
    ///
    /// # Arguments
    /// * `prebucketing` - Steps producing pre-buckets from raw values
    /// * `bucketing` - Steps merging pre-buckets into final buckets
    /// * `specials` - Special groups per raw feature, for both stages
    pub fn new(prebucketing: Vec<Bucketer>, bucketing: Vec<Bucketer>, specials: Specials) -> Result<Self> {
        for step in prebucketing.iter().chain(&bucketing) {
            if !step.options().specials.is_empty() {
                return Err(invalid_config(format!(
                    "Specials should be defined on the bucketing process level; remove them from {}",
                    step.method().name()
                ))
                .into());
            }
        }
        BucketerOptions::default().with_specials(specials.clone()).validate()?;

        if prebucketing.iter().all(|s| !s.options().variables.is_empty()) {
            for feature in specials.keys() {
                if !prebucketing.iter().any(|s| s.options().variables.contains(feature)) {
                    return Err(invalid_config(format!(
                        "Specials are declared for '{}', which no pre-bucketing step buckets",
                        feature
                    ))
                    .into());
                }
            }
        }

        let mut prebucketing = BucketingPipeline::new(prebucketing)?;
        inject_specials(&mut prebucketing, &specials)?;
        Ok(Self {
            prebucketing,
            bucketing: BucketingPipeline::new(bucketing)?,
            specials,
            remainder: Remainder::Passthrough,
            state: ProcessState::Unfit,
            fitted: None,
        })
    }

    /// Decision tree pre-bucketing into at most 50 pre-buckets, then optimal
    /// bucketing into at most 6 buckets
    pub fn with_defaults(variables: Vec<String>, specials: Specials) -> Result<Self> {
        let prebucketing = Bucketer::new(
            BucketingMethod::DecisionTree(DecisionTreeConfig::new(50, 0.02)),
            BucketerOptions::new(variables.clone()),
        )?;
        let bucketing = Bucketer::new(
            BucketingMethod::Optimal(OptimalConfig::new(6, 0.05)),
            BucketerOptions::new(variables),
        )?;
        Self::new(vec![prebucketing], vec![bucketing], specials)
    }

    pub fn with_remainder(mut self, remainder: Remainder) -> Self {
        self.remainder = remainder;
        self
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn specials(&self) -> &Specials {
        &self.specials
    }

    pub fn prebucketing(&self) -> &BucketingPipeline {
        &self.prebucketing
    }

    fn fitted(&self) -> Result<&Fitted> {
        self.fitted
            .as_ref()
            .ok_or_else(|| BucketError::NotFitted("BucketingProcess".to_string()).into())
    }

    /// Stage-one mapping: raw values to pre-bucket codes
    pub fn prebucket_mapping(&self) -> Result<&FeaturesBucketMapping> {
        self.fitted()?;
        self.prebucketing.features_bucket_mapping()
    }

    /// Stage-two mapping: pre-bucket codes to buckets
    pub fn bucketing_mapping(&self) -> Result<&FeaturesBucketMapping> {
        self.fitted()?.bucketing.features_bucket_mapping()
    }

    /// Run stage one only and read the missing code back as null, which is
    /// what stage two is fitted on
    pub fn prebucket(&self, df: &DataFrame) -> Result<DataFrame> {
        let prebucketed = self.prebucketing.transform(df)?;
        let columns = self.prebucketing.features_bucket_mapping()?.columns();
        missing_codes_to_null(&prebucketed, &columns)
    }

    pub fn prebucket_tables(&self) -> Result<&[BucketTable]> {
        self.fitted()?;
        self.prebucketing.bucket_tables()
    }

    pub fn bucket_tables(&self) -> Result<&[BucketTable]> {
        self.fitted()?.bucketing.bucket_tables()
    }

    /// Pre-bucket statistics of one column with the final bucket of every
    /// pre-bucket in an extra `bucket` column
    pub fn prebucket_table(&self, column: &str) -> Result<DataFrame> {
        let fitted = self.fitted()?;
        let table = self.prebucketing.bucket_table(column)?;
        let second = fitted
            .bucketing
            .features_bucket_mapping()?
            .get(column)
            .ok_or_else(|| BucketError::NotBucketed {
                columns: vec![column.to_string()],
            })?;
        let buckets: Vec<i64> = table
            .rows
            .iter()
            .map(|row| chained_bucket(second, row.bucket_id).code())
            .collect();

        let mut df = table.to_dataframe()?;
        df.with_column(Column::new("bucket".into(), buckets))?;
        Ok(df)
    }

    /// Replace the stage-two mapping, e.g. after manual edits, and recompute
    /// the statistics and the composed mapping. Stage one is left as fitted.
    ///
    /// # Arguments
    /// * `mapping` - New stage-two mapping over pre-bucket codes
    /// * `prebucketed` - Output of [`BucketingProcess::prebucket`] on the fit data
    /// * `target` - Target of the fit data
    pub fn set_bucket_mapping(
        &mut self,
        mapping: FeaturesBucketMapping,
        prebucketed: &DataFrame,
        target: Option<&[i32]>,
    ) -> Result<()> {
        let columns = self.fitted()?.columns.clone();

        let step = Bucketer::from_mapping(mapping, BucketerOptions::default())?;
        let mut bucketing = BucketingPipeline::new(vec![step])?;
        bucketing.fit(prebucketed, target)?;

        let fitted = self.compose(bucketing, columns)?;
        tracing::info!(features = fitted.mapping.len(), "bucketing mapping replaced");
        self.fitted = Some(fitted);
        self.state = ProcessState::Fitted;
        Ok(())
    }

    /// Persist the composed mapping (JSON or YAML by extension)
    pub fn save(&self, path: &Path) -> Result<()> {
        self.fitted()?.mapping.save(path)
    }

    /// Coverage check, merge and summary once both stages are fitted
    fn compose(&self, bucketing: BucketingPipeline, columns: Vec<(String, String)>) -> Result<Fitted> {
        let first = self.prebucketing.features_bucket_mapping()?;
        let second = bucketing.features_bucket_mapping()?;
        check_coverage(first, second)?;

        let mapping = FeaturesBucketMapping::merge(first, second)?;
        let summary = Summary::build(
            &columns,
            Some(self.prebucketing.bucket_tables()?),
            bucketing.bucket_tables()?,
        );
        Ok(Fitted {
            bucketing,
            columns,
            mapping,
            summary,
        })
    }
}

impl Transformer for BucketingProcess {
    fn fit(&mut self, df: &DataFrame, target: Option<&[i32]>) -> Result<()> {
        self.state = ProcessState::Unfit;
        self.fitted = None;

        self.prebucketing.fit(df, target).context("Pre-bucketing failed")?;
        let prebucketed = self.prebucket(df)?;
        self.state = ProcessState::Prebucketed;
        tracing::info!(
            features = self.prebucketing.features_bucket_mapping()?.len(),
            "pre-bucketing fitted"
        );

        let labels: BTreeMap<String, Vec<(BucketId, String)>> = self
            .prebucketing
            .features_bucket_mapping()?
            .iter()
            .map(|m| (m.feature_name().to_string(), m.labels()))
            .collect();
        let remapped = remap_specials(&labels, &self.specials);

        let mut bucketing = self.bucketing.clone();
        inject_specials(&mut bucketing, &remapped)?;
        bucketing.fit(&prebucketed, target).context("Bucketing failed")?;
        self.state = ProcessState::Bucketed;
        tracing::info!(
            features = bucketing.features_bucket_mapping()?.len(),
            "bucketing fitted"
        );

        let fitted = self.compose(bucketing, column_dtypes(df))?;
        self.fitted = Some(fitted);
        self.state = ProcessState::Fitted;
        tracing::info!("bucketing process fitted");
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let fitted = self.fitted()?;
        let prebucketed = self.prebucket(df)?;
        let bucketed = fitted.bucketing.transform(&prebucketed)?;
        match self.remainder {
            Remainder::Passthrough => Ok(bucketed),
            Remainder::Drop => {
                let keep: Vec<String> = bucketed
                    .get_column_names()
                    .iter()
                    .filter(|name| fitted.mapping.get(name.as_str()).is_some())
                    .map(|name| name.to_string())
                    .collect();
                Ok(bucketed.select(keep)?)
            }
        }
    }

    fn features_bucket_mapping(&self) -> Result<&FeaturesBucketMapping> {
        Ok(&self.fitted()?.mapping)
    }

    fn bucket_table(&self, column: &str) -> Result<&BucketTable> {
        self.fitted()?.bucketing.bucket_table(column)
    }

    fn summary(&self) -> Result<&Summary> {
        Ok(&self.fitted()?.summary)
    }
}

/// Re-express special groups in pre-bucket code space.
///
/// `labels` holds the stage-one bucket labels per feature. A group becomes
/// the codes of the pre-buckets labelled exactly after it (a trailing
/// ` | Missing` is ignored), keeping its label and its position; features
/// stage one does not know are left out.
pub fn remap_specials(labels: &BTreeMap<String, Vec<(BucketId, String)>>, specials: &Specials) -> Specials {
    let mut remapped = Specials::new();
    for (feature, groups) in specials {
        let Some(feature_labels) = labels.get(feature) else {
            continue;
        };
        let groups: Vec<SpecialGroup> = groups
            .iter()
            .filter_map(|group| {
                let wanted = group.bucket_label();
                let codes: Vec<SpecialValue> = feature_labels
                    .iter()
                    .filter(|(_, label)| {
                        *label == wanted || label.strip_suffix(" | Missing") == Some(wanted.as_str())
                    })
                    .map(|(id, _)| SpecialValue::Number(id.code() as f64))
                    .collect();
                (!codes.is_empty()).then(|| SpecialGroup::new(group.label.clone(), codes))
            })
            .collect();
        if !groups.is_empty() {
            remapped.insert(feature.clone(), groups);
        }
    }
    remapped
}

/// Both stages must cover the same columns
fn check_coverage(first: &FeaturesBucketMapping, second: &FeaturesBucketMapping) -> Result<()> {
    let not_prebucketed: Vec<String> = second
        .columns()
        .into_iter()
        .filter(|c| first.get(c).is_none())
        .collect();
    if !not_prebucketed.is_empty() {
        return Err(BucketError::NotPreBucketedColumns {
            columns: not_prebucketed,
        }
        .into());
    }

    let not_bucketed: Vec<String> = first
        .columns()
        .into_iter()
        .filter(|c| second.get(c).is_none())
        .collect();
    if !not_bucketed.is_empty() {
        return Err(BucketError::NotBucketed { columns: not_bucketed }.into());
    }
    Ok(())
}

fn missing_codes_to_null(df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
    let mut out = df.clone();
    for column in columns {
        let codes: Vec<Option<i64>> = df
            .column(column)?
            .i64()?
            .iter()
            .map(|code| code.filter(|c| *c != MISSING_CODE))
            .collect();
        out.with_column(Column::new(column.as_str().into(), codes))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::BucketMapping;
    use crate::pipeline::methods::{AsIsNumericalConfig, EqualWidthConfig};

    #[test]
    fn test_remap_specials_follows_labels() {
        let mut labels = BTreeMap::new();
        labels.insert(
            "x".to_string(),
            vec![
                (BucketId::Bin(0), "(-inf, 5.0]".to_string()),
                (BucketId::Missing, "Missing".to_string()),
                (BucketId::Special(0), "Special: =0".to_string()),
                (BucketId::Special(1), "Special: =999".to_string()),
            ],
        );
        let mut specials = Specials::new();
        specials.insert(
            "x".to_string(),
            vec![
                SpecialGroup::new("=0", vec![SpecialValue::Number(0.0)]),
                SpecialGroup::new("=999", vec![SpecialValue::Number(999.0), SpecialValue::Number(998.0)]),
            ],
        );
        specials.insert("y".to_string(), vec![SpecialGroup::new("a", vec![SpecialValue::Number(1.0)])]);

        let remapped = remap_specials(&labels, &specials);
        assert_eq!(remapped.len(), 1);
        assert_eq!(
            remapped["x"],
            vec![
                SpecialGroup::new("=0", vec![SpecialValue::Number(-3.0)]),
                SpecialGroup::new("=999", vec![SpecialValue::Number(-4.0)]),
            ]
        );
    }

    #[test]
    fn test_remap_specials_needs_exact_label() {
        let mut labels = BTreeMap::new();
        labels.insert(
            "x".to_string(),
            vec![
                (BucketId::Bin(0), "(-inf, 5.0]".to_string()),
                (BucketId::Special(0), "Special: a | b".to_string()),
                (BucketId::Special(1), "Special: a | Missing".to_string()),
            ],
        );
        let mut specials = Specials::new();
        specials.insert(
            "x".to_string(),
            vec![
                SpecialGroup::new("a | b", vec![SpecialValue::Number(1.0)]),
                SpecialGroup::new("a", vec![SpecialValue::Number(2.0)]),
            ],
        );

        let remapped = remap_specials(&labels, &specials);
        assert_eq!(
            remapped["x"],
            vec![
                SpecialGroup::new("a | b", vec![SpecialValue::Number(-3.0)]),
                SpecialGroup::new("a", vec![SpecialValue::Number(-4.0)]),
            ]
        );
    }

    #[test]
    fn test_coverage_both_directions() {
        let a = BucketMapping::numerical("a", vec![1.0], true).unwrap();
        let b = BucketMapping::numerical("b", vec![1.0], true).unwrap();
        let only_a = FeaturesBucketMapping::new(vec![a.clone()]).unwrap();
        let both = FeaturesBucketMapping::new(vec![a, b]).unwrap();

        let err = check_coverage(&only_a, &both).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BucketError>(),
            Some(&BucketError::NotPreBucketedColumns {
                columns: vec!["b".to_string()]
            })
        );
        let err = check_coverage(&both, &only_a).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BucketError>(),
            Some(&BucketError::NotBucketed {
                columns: vec!["b".to_string()]
            })
        );
    }

    #[test]
    fn test_step_level_specials_rejected() {
        let mut specials = Specials::new();
        specials.insert("x".to_string(), vec![SpecialGroup::new("s", vec![SpecialValue::Number(0.0)])]);
        let step = Bucketer::new(
            BucketingMethod::AsIsNumerical(AsIsNumericalConfig::default()),
            BucketerOptions::new(vec!["x".into()]).with_specials(specials),
        )
        .unwrap();
        let bucketing = Bucketer::new(
            BucketingMethod::EqualWidth(EqualWidthConfig::default()),
            BucketerOptions::new(vec!["x".into()]),
        )
        .unwrap();
        let err = BucketingProcess::new(vec![step], vec![bucketing], Specials::new()).unwrap_err();
        assert!(matches!(err.downcast_ref::<BucketError>(), Some(BucketError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_codes_to_null() {
        let df = df!("x" => &[0i64, -1, 2]).unwrap();
        let out = missing_codes_to_null(&df, &["x".to_string()]).unwrap();
        let x: Vec<Option<i64>> = out.column("x").unwrap().i64().unwrap().iter().collect();
        assert_eq!(x, vec![Some(0), None, Some(2)]);
    }

    #[test]
    fn test_unfitted_process() {
        let process = BucketingProcess::with_defaults(vec![], Specials::new()).unwrap();
        assert_eq!(process.state(), ProcessState::Unfit);
        assert!(process.features_bucket_mapping().is_err());
        assert!(process.prebucket_table("x").is_err());
    }
}
