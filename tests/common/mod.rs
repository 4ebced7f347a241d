//! Shared test utilities and fixture generators
#![allow(dead_code)]

use std::path::PathBuf;

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scorebin::mapping::{SpecialGroup, SpecialValue};
use scorebin::pipeline::Specials;
use tempfile::TempDir;

pub const EDUCATION: [&str; 4] = ["graduate", "university", "high_school", "other"];

/// Synthetic credit dataset with a binary `default` column
///
/// - `LIMIT_BAL`: multiples of 10 000 up to 500 000, about 5% missing;
///   50 000 is common enough to be declared special
/// - `BILL_AMT1`: continuous, thousands of distinct values
/// - `EDUCATION`: four categories, `other` rare
/// - `default`: event probability falls with `LIMIT_BAL`
pub fn credit_dataframe(rows: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut limit = Vec::with_capacity(rows);
    let mut bill = Vec::with_capacity(rows);
    let mut education = Vec::with_capacity(rows);
    let mut default = Vec::with_capacity(rows);

    for _ in 0..rows {
        let value = (rng.gen_range(1..=50) * 10_000) as f64;
        let edu = match rng.gen_range(0..100) {
            0..=39 => EDUCATION[0],
            40..=74 => EDUCATION[1],
            75..=96 => EDUCATION[2],
            _ => EDUCATION[3],
        };
        let mut p = 0.45 - 0.35 * value / 500_000.0;
        if edu == "high_school" {
            p += 0.1;
        }
        default.push(if rng.gen_bool(p) { 1i32 } else { 0 });
        limit.push(if rng.gen_bool(0.05) { None } else { Some(value) });
        bill.push(rng.gen_range(-1_000.0..100_000.0f64));
        education.push(edu);
    }

    df! {
        "LIMIT_BAL" => limit,
        "BILL_AMT1" => bill,
        "EDUCATION" => education,
        "default" => default,
    }
    .unwrap()
}

/// Feature columns and target vector of a credit frame
pub fn split_target(df: &DataFrame) -> (DataFrame, Vec<i32>) {
    let target: Vec<i32> = df
        .column("default")
        .unwrap()
        .i32()
        .unwrap()
        .iter()
        .map(|v| v.unwrap())
        .collect();
    (df.drop("default").unwrap(), target)
}

/// `LIMIT_BAL = 50 000` as a special group
pub fn limit_specials() -> Specials {
    let mut specials = Specials::new();
    specials.insert(
        "LIMIT_BAL".to_string(),
        vec![SpecialGroup::new("=50000", vec![SpecialValue::Number(50_000.0)])],
    );
    specials
}

/// Int64 bucket codes of a transformed column
pub fn codes(df: &DataFrame, column: &str) -> Vec<Option<i64>> {
    df.column(column).unwrap().i64().unwrap().iter().collect()
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}
