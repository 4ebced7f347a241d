//! Bucket tables: per-bucket counts, event rates, WoE and IV
//!
//! A table is computed over the full column (specials and missing values
//! included) once a mapping exists. Besides reporting, the table drives the
//! `most_frequent` missing-value policy.

use std::collections::BTreeMap;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Table};
use polars::prelude::*;
use serde::Serialize;

use crate::error::BucketError;
use crate::mapping::{BucketId, BucketMapping};

/// Smoothing constant to avoid log(0) in WoE calculation
pub const SMOOTHING: f64 = 0.5;

/// Calculate WoE and IV contribution for a bucket
///
/// Uses the ln(%events/%non-events) convention: WoE > 0 marks a bucket with
/// a higher event (default) rate than the population.
pub fn calculate_woe_iv(
    events: f64,
    non_events: f64,
    total_events: f64,
    total_non_events: f64,
) -> (f64, f64) {
    let dist_events = (events + SMOOTHING) / (total_events + SMOOTHING);
    let dist_non_events = (non_events + SMOOTHING) / (total_non_events + SMOOTHING);
    let woe = (dist_events / dist_non_events).ln();
    let iv = (dist_events - dist_non_events) * woe;
    (woe, iv)
}

/// One realized bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketRow {
    pub bucket_id: BucketId,
    pub label: String,
    pub count: usize,
    /// Share of all rows, in percent
    pub count_pct: f64,
    pub non_events: Option<usize>,
    pub events: Option<usize>,
    pub event_rate: Option<f64>,
    pub woe: Option<f64>,
    pub iv: Option<f64>,
}

/// Statistics of one feature's buckets, rows sorted by bucket code
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketTable {
    pub feature: String,
    pub rows: Vec<BucketRow>,
}

impl BucketTable {
    /// Build the table from the bucket ids a mapping assigned to every row
    ///
    /// # Arguments
    /// * `mapping` - Mapping used to produce `ids`, supplies the labels
    /// * `ids` - Bucket of each row
    /// * `target` - Optional 0/1 target aligned with `ids`
    pub fn compute(mapping: &BucketMapping, ids: &[BucketId], target: Option<&[i32]>) -> Result<Self> {
        if let Some(target) = target {
            if target.len() != ids.len() {
                return Err(BucketError::InvalidTarget(format!(
                    "target has {} values but '{}' has {} rows",
                    target.len(),
                    mapping.feature_name(),
                    ids.len()
                ))
                .into());
            }
        }

        let mut counts: BTreeMap<BucketId, (usize, usize)> = BTreeMap::new();
        for (row, id) in ids.iter().enumerate() {
            let entry = counts.entry(*id).or_insert((0, 0));
            entry.0 += 1;
            if target.map(|t| t[row] == 1).unwrap_or(false) {
                entry.1 += 1;
            }
        }

        let total = ids.len();
        let total_events = target.map(|t| t.iter().filter(|v| **v == 1).count());
        let labels: BTreeMap<BucketId, String> = mapping.labels().into_iter().collect();

        let rows = counts
            .into_iter()
            .map(|(bucket_id, (count, events))| {
                let label = labels
                    .get(&bucket_id)
                    .cloned()
                    .unwrap_or_else(|| mapping.label(bucket_id));
                let count_pct = if total > 0 {
                    count as f64 / total as f64 * 100.0
                } else {
                    0.0
                };
                let (non_events, events, event_rate, woe, iv) = match total_events {
                    Some(total_events) => {
                        let non_events = count - events;
                        let (woe, iv) = calculate_woe_iv(
                            events as f64,
                            non_events as f64,
                            total_events as f64,
                            (total - total_events) as f64,
                        );
                        (
                            Some(non_events),
                            Some(events),
                            Some(events as f64 / count as f64),
                            Some(woe),
                            Some(iv),
                        )
                    }
                    None => (None, None, None, None, None),
                };
                BucketRow {
                    bucket_id,
                    label,
                    count,
                    count_pct,
                    non_events,
                    events,
                    event_rate,
                    woe,
                    iv,
                }
            })
            .collect();

        Ok(Self {
            feature: mapping.feature_name().to_string(),
            rows,
        })
    }

    /// Sum of the IV contributions, `None` without a target
    pub fn total_iv(&self) -> Option<f64> {
        if self.rows.iter().any(|r| r.iv.is_none()) {
            return None;
        }
        Some(self.rows.iter().filter_map(|r| r.iv).sum())
    }

    /// Bucket with the most rows other than the dedicated missing bucket.
    ///
    /// Ties go to the lowest bucket code.
    pub fn most_frequent(&self) -> Option<BucketId> {
        self.rows
            .iter()
            .filter(|r| r.bucket_id != BucketId::Missing)
            .max_by(|a, b| {
                a.count
                    .cmp(&b.count)
                    .then_with(|| b.bucket_id.cmp(&a.bucket_id))
            })
            .map(|r| r.bucket_id)
    }

    pub fn row(&self, id: BucketId) -> Option<&BucketRow> {
        self.rows.iter().find(|r| r.bucket_id == id)
    }

    /// Number of realized normal buckets
    pub fn num_bins(&self) -> usize {
        self.rows.iter().filter(|r| r.bucket_id.is_bin()).count()
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let ids: Vec<i64> = self.rows.iter().map(|r| r.bucket_id.code()).collect();
        let labels: Vec<&str> = self.rows.iter().map(|r| r.label.as_str()).collect();
        let counts: Vec<u64> = self.rows.iter().map(|r| r.count as u64).collect();
        let pcts: Vec<f64> = self.rows.iter().map(|r| r.count_pct).collect();
        let non_events: Vec<Option<u64>> =
            self.rows.iter().map(|r| r.non_events.map(|v| v as u64)).collect();
        let events: Vec<Option<u64>> = self.rows.iter().map(|r| r.events.map(|v| v as u64)).collect();
        let rates: Vec<Option<f64>> = self.rows.iter().map(|r| r.event_rate).collect();
        let woes: Vec<Option<f64>> = self.rows.iter().map(|r| r.woe).collect();
        let ivs: Vec<Option<f64>> = self.rows.iter().map(|r| r.iv).collect();

        let df = DataFrame::new(vec![
            Column::new("bucket_id".into(), ids),
            Column::new("label".into(), labels),
            Column::new("Count".into(), counts),
            Column::new("Count (%)".into(), pcts),
            Column::new("Non-event".into(), non_events),
            Column::new("Event".into(), events),
            Column::new("Event Rate".into(), rates),
            Column::new("WoE".into(), woes),
            Column::new("IV".into(), ivs),
        ])?;
        Ok(df)
    }

    /// Render as a terminal table
    pub fn render(&self) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(
            ["bucket", "label", "Count", "Count (%)", "Non-event", "Event", "Event Rate", "WoE", "IV"]
                .into_iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );

        let opt = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
        for row in &self.rows {
            table.add_row(vec![
                Cell::new(row.bucket_id.code()).set_alignment(CellAlignment::Right),
                Cell::new(&row.label),
                Cell::new(row.count).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.2}", row.count_pct)).set_alignment(CellAlignment::Right),
                Cell::new(opt(row.non_events.map(|v| v.to_string()))).set_alignment(CellAlignment::Right),
                Cell::new(opt(row.events.map(|v| v.to_string()))).set_alignment(CellAlignment::Right),
                Cell::new(opt(row.event_rate.map(|v| format!("{:.4}", v)))).set_alignment(CellAlignment::Right),
                Cell::new(opt(row.woe.map(|v| format!("{:.4}", v)))).set_alignment(CellAlignment::Right),
                Cell::new(opt(row.iv.map(|v| format!("{:.4}", v)))).set_alignment(CellAlignment::Right),
            ]);
        }
        table.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::FeatureValues;

    fn sample_table(target: Option<&[i32]>) -> BucketTable {
        let mapping = BucketMapping::numerical("x", vec![25.0], true).unwrap();
        let values = FeatureValues::Numerical(vec![
            Some(10.0),
            Some(20.0),
            Some(30.0),
            Some(40.0),
            Some(50.0),
            None,
        ]);
        let ids = mapping.transform(&values);
        BucketTable::compute(&mapping, &ids, target).unwrap()
    }

    #[test]
    fn test_woe_iv_symmetry() {
        let (woe_hi, iv_hi) = calculate_woe_iv(15.0, 5.0, 30.0, 30.0);
        let (woe_lo, iv_lo) = calculate_woe_iv(5.0, 15.0, 30.0, 30.0);
        assert!(woe_hi > 0.0);
        assert!((woe_hi + woe_lo).abs() < 1e-12);
        assert!((iv_hi - iv_lo).abs() < 1e-12);
        assert!(iv_hi > 0.0);
    }

    #[test]
    fn test_rows_sorted_by_code() {
        let table = sample_table(None);
        let codes: Vec<i64> = table.rows.iter().map(|r| r.bucket_id.code()).collect();
        assert_eq!(codes, vec![-1, 0, 1]);
        assert_eq!(table.row(BucketId::Bin(1)).unwrap().count, 3);
        assert!(table.total_iv().is_none());
    }

    #[test]
    fn test_target_statistics() {
        let target = [0, 0, 1, 1, 0, 1];
        let table = sample_table(Some(&target));
        let high = table.row(BucketId::Bin(1)).unwrap();
        assert_eq!(high.events, Some(2));
        assert_eq!(high.non_events, Some(1));
        assert!((high.event_rate.unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!(table.total_iv().unwrap() > 0.0);
    }

    #[test]
    fn test_most_frequent_skips_missing_and_breaks_ties_low() {
        let mapping = BucketMapping::numerical("x", vec![1.0], true).unwrap();
        let ids = vec![
            BucketId::Missing,
            BucketId::Missing,
            BucketId::Missing,
            BucketId::Bin(1),
            BucketId::Bin(0),
        ];
        let table = BucketTable::compute(&mapping, &ids, None).unwrap();
        assert_eq!(table.most_frequent(), Some(BucketId::Bin(0)));
    }

    #[test]
    fn test_target_length_must_match_rows() {
        let mapping = BucketMapping::numerical("x", vec![1.0], true).unwrap();
        let ids = vec![BucketId::Bin(0), BucketId::Bin(1), BucketId::Missing];
        let err = BucketTable::compute(&mapping, &ids, Some(&[0, 1])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BucketError>(),
            Some(BucketError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_to_dataframe_columns() {
        let target = [0, 0, 1, 1, 0, 1];
        let df = sample_table(Some(&target)).to_dataframe().unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            vec!["bucket_id", "label", "Count", "Count (%)", "Non-event", "Event", "Event Rate", "WoE", "IV"]
        );
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn test_render_contains_labels() {
        let rendered = sample_table(None).render();
        assert!(rendered.contains("(-inf, 25]"));
        assert!(rendered.contains("Missing"));
    }
}
