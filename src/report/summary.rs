//! Per-column summary of a fitted bucketer or bucketing process

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, Table};
use console::style;
use polars::prelude::*;
use serde::Serialize;

use crate::pipeline::stats::BucketTable;

/// One input column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub column: String,
    /// Realized pre-buckets; only set for a two-stage process
    pub num_prebuckets: Option<usize>,
    /// Realized buckets, special and missing buckets included
    pub num_buckets: Option<usize>,
    pub iv_score: Option<f64>,
    pub dtype: String,
}

/// Summary covering every input column, bucketed or not
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub rows: Vec<SummaryRow>,
}

/// Name and dtype of every column, in frame order
pub fn column_dtypes(df: &DataFrame) -> Vec<(String, String)> {
    df.get_columns()
        .iter()
        .map(|c| (c.name().to_string(), c.dtype().to_string()))
        .collect()
}

fn find<'a>(tables: &'a [BucketTable], column: &str) -> Option<&'a BucketTable> {
    tables.iter().find(|t| t.feature == column)
}

impl Summary {
    /// Build the summary from the tables of the fitted stages
    ///
    /// # Arguments
    /// * `columns` - Input columns and their dtypes, see [`column_dtypes`]
    /// * `prebucket_tables` - First-stage tables, `None` for a single bucketer
    /// * `bucket_tables` - Final tables; the IV score is read from these
    pub fn build(
        columns: &[(String, String)],
        prebucket_tables: Option<&[BucketTable]>,
        bucket_tables: &[BucketTable],
    ) -> Self {
        let rows = columns
            .iter()
            .map(|(column, dtype)| {
                let table = find(bucket_tables, column);
                SummaryRow {
                    column: column.clone(),
                    num_prebuckets: prebucket_tables
                        .and_then(|tables| find(tables, column))
                        .map(|t| t.rows.len()),
                    num_buckets: table.map(|t| t.rows.len()),
                    iv_score: table.and_then(|t| t.total_iv()),
                    dtype: dtype.clone(),
                }
            })
            .collect();
        Self { rows }
    }

    pub fn row(&self, column: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.column == column)
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let columns: Vec<&str> = self.rows.iter().map(|r| r.column.as_str()).collect();
        let prebuckets: Vec<Option<u64>> = self
            .rows
            .iter()
            .map(|r| r.num_prebuckets.map(|n| n as u64))
            .collect();
        let buckets: Vec<Option<u64>> = self.rows.iter().map(|r| r.num_buckets.map(|n| n as u64)).collect();
        let ivs: Vec<Option<f64>> = self.rows.iter().map(|r| r.iv_score).collect();
        let dtypes: Vec<&str> = self.rows.iter().map(|r| r.dtype.as_str()).collect();

        let df = DataFrame::new(vec![
            Column::new("column".into(), columns),
            Column::new("num_prebuckets".into(), prebuckets),
            Column::new("num_buckets".into(), buckets),
            Column::new("IV_score".into(), ivs),
            Column::new("dtype".into(), dtypes),
        ])?;
        Ok(df)
    }

    pub fn render(&self) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(
            ["column", "num_prebuckets", "num_buckets", "IV_score", "dtype"]
                .into_iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );

        for row in &self.rows {
            let count = |n: Option<usize>| match n {
                Some(n) => Cell::new(n).set_alignment(CellAlignment::Right),
                None => Cell::new("not_bucketed").fg(Color::DarkGrey),
            };
            let iv = match row.iv_score {
                Some(iv) => Cell::new(format!("{:.4}", iv))
                    .fg(iv_color(iv))
                    .set_alignment(CellAlignment::Right),
                None => Cell::new("-").fg(Color::DarkGrey),
            };
            table.add_row(vec![
                Cell::new(&row.column),
                count(row.num_prebuckets),
                count(row.num_buckets),
                iv,
                Cell::new(&row.dtype),
            ]);
        }
        table.to_string()
    }

    /// Print the summary with a section header
    pub fn display(&self) {
        println!();
        println!("    {} {}", style("📋").cyan(), style("BUCKETING SUMMARY").white().bold());
        println!("    {}", style("─".repeat(50)).dim());
        println!();
        for line in self.render().lines() {
            println!("    {}", line);
        }
    }
}

/// Conventional IV strength bands
fn iv_color(iv: f64) -> Color {
    if iv >= 0.3 {
        Color::Green
    } else if iv >= 0.1 {
        Color::Yellow
    } else if iv >= 0.02 {
        Color::White
    } else {
        Color::Red
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{BucketMapping, FeatureValues};

    fn table(feature: &str, target: Option<&[i32]>) -> BucketTable {
        let mapping = BucketMapping::numerical(feature, vec![2.5], true).unwrap();
        let values = FeatureValues::Numerical(vec![Some(1.0), Some(2.0), Some(3.0), None]);
        BucketTable::compute(&mapping, &mapping.transform(&values), target).unwrap()
    }

    #[test]
    fn test_unbucketed_columns_are_listed() {
        let columns = vec![
            ("x".to_string(), "f64".to_string()),
            ("id".to_string(), "i64".to_string()),
        ];
        let summary = Summary::build(&columns, None, &[table("x", Some(&[0, 1, 1, 0]))]);
        assert_eq!(summary.rows.len(), 2);
        assert_eq!(summary.row("x").unwrap().num_buckets, Some(3));
        assert!(summary.row("x").unwrap().iv_score.is_some());
        assert_eq!(summary.row("id").unwrap().num_buckets, None);
        assert_eq!(summary.row("id").unwrap().num_prebuckets, None);
    }

    #[test]
    fn test_unsupervised_has_no_iv() {
        let columns = vec![("x".to_string(), "f64".to_string())];
        let summary = Summary::build(&columns, Some(&[table("x", None)]), &[table("x", None)]);
        let row = summary.row("x").unwrap();
        assert_eq!(row.num_prebuckets, Some(3));
        assert_eq!(row.iv_score, None);

        let df = summary.to_dataframe().unwrap();
        assert_eq!(df.shape(), (1, 5));
        assert!(summary.render().contains("IV_score"));
    }
}
