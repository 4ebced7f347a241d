//! Bucketers applied one after the other
//!
//! Each step sees the output of the previous one, so steps must pass the
//! columns they do not bucket through untouched. The steps of a pipeline are
//! expected to cover disjoint columns; the combined mapping rejects overlaps.

use anyhow::Result;
use polars::prelude::*;

use super::bucketer::{Bucketer, Transformer};
use super::stats::BucketTable;
use crate::error::{invalid_config, BucketError};
use crate::mapping::{FeaturesBucketMapping, Remainder};
use crate::report::{column_dtypes, Summary};

#[derive(Debug, Clone)]
struct Fitted {
    mapping: FeaturesBucketMapping,
    tables: Vec<BucketTable>,
    summary: Summary,
}

#[derive(Debug, Clone)]
pub struct BucketingPipeline {
    steps: Vec<Bucketer>,
    fitted: Option<Fitted>,
}

impl BucketingPipeline {
    pub fn new(steps: Vec<Bucketer>) -> Result<Self> {
        if steps.is_empty() {
            return Err(invalid_config("A bucketing pipeline needs at least one step").into());
        }
        for step in &steps {
            if step.options().remainder != Remainder::Passthrough {
                return Err(invalid_config(format!(
                    "{} inside a pipeline must use remainder 'passthrough'",
                    step.method().name()
                ))
                .into());
            }
        }
        Ok(Self { steps, fitted: None })
    }

    pub fn steps(&self) -> &[Bucketer] {
        &self.steps
    }

    pub(crate) fn steps_mut(&mut self) -> &mut [Bucketer] {
        self.fitted = None;
        &mut self.steps
    }

    fn fitted(&self) -> Result<&Fitted> {
        self.fitted
            .as_ref()
            .ok_or_else(|| BucketError::NotFitted("BucketingPipeline".to_string()).into())
    }

    /// Statistics of every bucketed column, step order
    pub fn bucket_tables(&self) -> Result<&[BucketTable]> {
        Ok(&self.fitted()?.tables)
    }
}

impl Transformer for BucketingPipeline {
    fn fit(&mut self, df: &DataFrame, target: Option<&[i32]>) -> Result<()> {
        self.fitted = None;
        let mut current = df.clone();
        let mut mapping = FeaturesBucketMapping::default();
        let mut tables = Vec::new();

        for step in &mut self.steps {
            step.fit(&current, target)?;
            let step_mapping = step.features_bucket_mapping()?.clone();
            for column in step_mapping.columns() {
                tables.push(step.bucket_table(&column)?.clone());
            }
            mapping.extend(step_mapping)?;
            current = step.transform(&current)?;
        }

        let summary = Summary::build(&column_dtypes(df), None, &tables);
        self.fitted = Some(Fitted {
            mapping,
            tables,
            summary,
        });
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.fitted()?;
        let mut current = df.clone();
        for step in &self.steps {
            current = step.transform(&current)?;
        }
        Ok(current)
    }

    fn features_bucket_mapping(&self) -> Result<&FeaturesBucketMapping> {
        Ok(&self.fitted()?.mapping)
    }

    fn bucket_table(&self, column: &str) -> Result<&BucketTable> {
        let fitted = self.fitted()?;
        fitted.tables.iter().find(|t| t.feature == column).ok_or_else(|| {
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
