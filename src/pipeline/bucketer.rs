//! Single-stage bucketer
//!
//! Every method shares one fit loop: specials and missing values are set
//! aside, the method partitions the remaining rows, and the resulting rule is
//! wrapped into a [`BucketMapping`] together with the special groups and the
//! missing-value policy. Features are independent, so they fit in parallel.

use anyhow::{Context, Result};
use polars::prelude::*;
use rayon::prelude::*;

use super::methods::{BucketingMethod, FitInput, NormalValues, UserInputConfig};
use super::options::{BucketerOptions, MissingTreatment};
use super::stats::BucketTable;
use super::target::validate_target;
use crate::error::BucketError;
use crate::mapping::values::SpecialMatcher;
use crate::mapping::{BucketMapping, FeatureKind, FeatureValues, FeaturesBucketMapping};
use crate::report::{column_dtypes, Summary};

/// Fit/transform contract shared by bucketers, pipelines and processes
pub trait Transformer {
    /// Learn bucket mappings from `df`. `target` must be 0/1 and aligned with
    /// the rows when given.
    fn fit(&mut self, df: &DataFrame, target: Option<&[i32]>) -> Result<()>;

    /// Replace every mapped column by its bucket codes
    fn transform(&self, df: &DataFrame) -> Result<DataFrame>;

    fn fit_transform(&mut self, df: &DataFrame, target: Option<&[i32]>) -> Result<DataFrame> {
        self.fit(df, target)?;
        self.transform(df)
    }

    fn features_bucket_mapping(&self) -> Result<&FeaturesBucketMapping>;

    /// Statistics of the final buckets of one column
    fn bucket_table(&self, column: &str) -> Result<&BucketTable>;

    fn summary(&self) -> Result<&Summary>;
}

/// What one feature's fit produced
#[derive(Debug, Clone)]
pub(crate) struct FeatureFit {
    pub mapping: BucketMapping,
    pub table: BucketTable,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
struct Fitted {
    mapping: FeaturesBucketMapping,
    tables: Vec<BucketTable>,
    summary: Summary,
    warnings: Vec<String>,
}

/// A bucketing method plus the options every method accepts
#[derive(Debug, Clone)]
pub struct Bucketer {
    method: BucketingMethod,
    options: BucketerOptions,
    fitted: Option<Fitted>,
}

impl Bucketer {
    pub fn new(method: BucketingMethod, options: BucketerOptions) -> Result<Self> {
        method.validate()?;
        options.validate()?;
        if let BucketingMethod::UserInput(config) = &method {
            check_user_input(config, &options)?;
        }
        Ok(Self {
            method,
            options,
            fitted: None,
        })
    }

    /// Bucketer that applies a ready-made mapping
    pub fn from_mapping(mapping: FeaturesBucketMapping, options: BucketerOptions) -> Result<Self> {
        Self::new(BucketingMethod::UserInput(UserInputConfig { mapping }), options)
    }

    pub fn method(&self) -> &BucketingMethod {
        &self.method
    }

    pub fn options(&self) -> &BucketerOptions {
        &self.options
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Non-fatal conditions met during the last fit, e.g. approximated quantiles
    pub fn warnings(&self) -> Result<&[String]> {
        Ok(&self.fitted()?.warnings)
    }

    /// Statistics of every bucketed column, variable order
    pub fn bucket_tables(&self) -> Result<&[BucketTable]> {
        Ok(&self.fitted()?.tables)
    }

    /// Replace the options; drops any fitted state
    pub(crate) fn set_options(&mut self, options: BucketerOptions) -> Result<()> {
        options.validate()?;
        if let BucketingMethod::UserInput(config) = &self.method {
            check_user_input(config, &options)?;
        }
        self.options = options;
        self.fitted = None;
        Ok(())
    }

    fn fitted(&self) -> Result<&Fitted> {
        self.fitted
            .as_ref()
            .ok_or_else(|| BucketError::NotFitted(self.method.name().to_string()).into())
    }

    /// Features this bucketer will fit on `df`
    pub(crate) fn resolve_variables(&self, df: &DataFrame) -> Result<Vec<String>> {
        let available: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        let variables = if !self.options.variables.is_empty() {
            self.options.variables.clone()
        } else if let BucketingMethod::UserInput(config) = &self.method {
            config.mapping.columns()
        } else {
            available.clone()
        };

        let declared = variables.iter().chain(self.options.specials.keys());
        for column in declared {
            if !available.contains(column) {
                return Err(BucketError::UnknownColumn {
                    column: column.clone(),
                    available: available.clone(),
                }
                .into());
            }
        }
        Ok(variables)
    }

    fn fit_feature(&self, df: &DataFrame, feature: &str, target: Option<&[i32]>) -> Result<FeatureFit> {
        let column = df.column(feature)?;

        if let BucketingMethod::UserInput(config) = &self.method {
            let mapping = config
                .mapping
                .get(feature)
                .cloned()
                .ok_or_else(|| BucketError::InvalidMapping {
                    feature: feature.to_string(),
                    reason: "no user-supplied mapping for this column".to_string(),
                })?;
            let values = FeatureValues::from_column(column, mapping.kind())?;
            let table = BucketTable::compute(&mapping, &mapping.transform(&values), target)?;
            return Ok(FeatureFit {
                mapping,
                table,
                warnings: Vec::new(),
            });
        }

        let kind = self.method.kind().unwrap_or(FeatureKind::Numerical);
        let values = FeatureValues::from_column(column, kind)
            .with_context(|| format!("{} cannot read column '{}'", self.method.name(), feature))?;
        let specials = self.options.specials_for(feature);
        let input = normal_rows(feature, &values, specials, target);

        let outcome = self.method.fit_feature(&input)?;
        let mut mapping = BucketMapping::from_rule(feature, outcome.rule)?
            .with_specials(specials.to_vec())?
            .with_missing_bucket(self.options.missing_treatment.initial_bucket(feature))?;
        let mut table = BucketTable::compute(&mapping, &mapping.transform(&values), target)?;

        if self.options.missing_treatment == MissingTreatment::MostFrequent {
            if let Some(bucket) = table.most_frequent() {
                mapping = mapping.with_missing_bucket(Some(bucket))?;
                table = BucketTable::compute(&mapping, &mapping.transform(&values), target)?;
            }
        }

        tracing::debug!(
            method = self.method.name(),
            feature,
            normal_rows = input.len(),
            buckets = table.rows.len(),
            "feature bucketed"
        );

        Ok(FeatureFit {
            mapping,
            table,
            warnings: outcome.warnings,
        })
    }

    /// Fit every variable; the results keep the variable order
    pub(crate) fn fit_features(&self, df: &DataFrame, target: Option<&[i32]>) -> Result<Vec<FeatureFit>> {
        match target {
            Some(target) => validate_target(target, df.height())?,
            None if self.method.is_supervised() => {
                return Err(BucketError::MissingTarget(self.method.name().to_string()).into())
            }
            None => {}
        }

        let variables = self.resolve_variables(df)?;
        variables
            .par_iter()
            .map(|feature| self.fit_feature(df, feature, target))
            .collect()
    }
}

/// Split off special and missing rows, keeping the target aligned
fn normal_rows<'a>(
    feature: &'a str,
    values: &FeatureValues,
    specials: &[crate::mapping::SpecialGroup],
    target: Option<&[i32]>,
) -> FitInput<'a> {
    let matcher = SpecialMatcher::new(specials, values.kind());
    let mut rows = Vec::with_capacity(values.len());
    let normal = match values {
        FeatureValues::Numerical(v) => NormalValues::Numerical(
            v.iter()
                .enumerate()
                .filter_map(|(row, x)| {
                    let x = (*x)?;
                    matcher.match_number(x).is_none().then(|| {
                        rows.push(row);
                        x
                    })
                })
                .collect(),
        ),
        FeatureValues::Categorical(v) => NormalValues::Categorical(
            v.iter()
                .enumerate()
                .filter_map(|(row, x)| {
                    let x = x.as_ref()?;
                    matcher.match_key(x).is_none().then(|| {
                        rows.push(row);
                        x.clone()
                    })
                })
                .collect(),
        ),
    };

    FitInput {
        feature,
        n_rows: values.len(),
        n_specials: specials.len(),
        values: normal,
        target: target.map(|t| rows.iter().map(|row| t[*row]).collect()),
    }
}

/// Specials and missing policies are baked into a user mapping
fn check_user_input(config: &UserInputConfig, options: &BucketerOptions) -> Result<()> {
    if !options.specials.is_empty() {
        return Err(crate::error::invalid_config(
            "UserInputBucketer takes specials from the supplied mapping; remove them from the options",
        )
        .into());
    }
    for variable in &options.variables {
        if config.mapping.get(variable).is_none() {
            return Err(BucketError::InvalidMapping {
                feature: variable.clone(),
                reason: "listed in variables but absent from the supplied mapping".to_string(),
            }
            .into());
        }
    }
    Ok(())
}

impl Transformer for Bucketer {
    fn fit(&mut self, df: &DataFrame, target: Option<&[i32]>) -> Result<()> {
        self.fitted = None;
        let fits = self.fit_features(df, target)?;

        let mut mappings = Vec::with_capacity(fits.len());
        let mut tables = Vec::with_capacity(fits.len());
        let mut warnings = Vec::new();
        for fit in fits {
            mappings.push(fit.mapping);
            tables.push(fit.table);
            warnings.extend(fit.warnings);
        }

        let summary = Summary::build(&column_dtypes(df), None, &tables);
        tracing::info!(
            method = self.method.name(),
            features = mappings.len(),
            warnings = warnings.len(),
            "bucketer fitted"
        );
        self.fitted = Some(Fitted {
            mapping: FeaturesBucketMapping::new(mappings)?,
            tables,
            summary,
            warnings,
        });
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.fitted()?.mapping.transform(df, self.options.remainder)
    }

    fn features_bucket_mapping(&self) -> Result<&FeaturesBucketMapping> {
        Ok(&self.fitted()?.mapping)
    }

    fn bucket_table(&self, column: &str) -> Result<&BucketTable> {
        let fitted = self.fitted()?;
        fitted
            .tables
            .iter()
            .find(|t| t.feature == column)
            .ok_or_else(|| {
                BucketError::UnknownColumn {
                    column: column.to_string(),
                    available: fitted.mapping.columns(),
                }
                .into()
            })
    }

    fn summary(&self) -> Result<&Summary> {
        Ok(&self.fitted()?.summary)
    }
}
