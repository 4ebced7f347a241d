//! Tests for the two-stage bucketing process

mod common;

use polars::prelude::*;
use scorebin::mapping::{BucketId, BucketMapping, FeaturesBucketMapping, Remainder};
use scorebin::pipeline::methods::{DecisionTreeConfig, OptimalConfig, OrdinalConfig};
use scorebin::pipeline::{
    Bucketer, BucketerOptions, BucketingMethod, BucketingProcess, MissingTreatment, ProcessState, Specials,
    Transformer,
};
use scorebin::BucketError;

use common::{codes, credit_dataframe, limit_specials, split_target};

fn step(method: BucketingMethod, variables: &[&str]) -> Bucketer {
    Bucketer::new(
        method,
        BucketerOptions::new(variables.iter().map(|v| v.to_string()).collect()),
    )
    .unwrap()
}

fn numeric_process(specials: Specials) -> BucketingProcess {
    let columns = ["LIMIT_BAL", "BILL_AMT1"];
    BucketingProcess::new(
        vec![step(
            BucketingMethod::DecisionTree(DecisionTreeConfig::new(20, 0.02)),
            &columns,
        )],
        vec![step(BucketingMethod::Optimal(OptimalConfig::new(4, 0.05)), &columns)],
        specials,
    )
    .unwrap()
}

#[test]
fn test_fitted_process_matches_composed_mapping() {
    let (features, target) = split_target(&credit_dataframe(2000, 21));
    let mut process = numeric_process(limit_specials());
    assert_eq!(process.state(), ProcessState::Unfit);

    let out = process.fit_transform(&features, Some(&target)).unwrap();
    assert_eq!(process.state(), ProcessState::Fitted);

    let composed = process
        .features_bucket_mapping()
        .unwrap()
        .transform(&features, Remainder::Passthrough)
        .unwrap();
    for column in ["LIMIT_BAL", "BILL_AMT1"] {
        assert_eq!(codes(&out, column), codes(&composed, column), "{} differs", column);
    }
    assert!(codes(&out, "BILL_AMT1").iter().all(|c| matches!(c, Some(0..=3))));

    let raw: Vec<Option<f64>> = features.column("LIMIT_BAL").unwrap().f64().unwrap().iter().collect();
    for (value, code) in raw.iter().zip(codes(&out, "LIMIT_BAL")) {
        match value {
            Some(v) if *v == 50_000.0 => assert_eq!(code, Some(-3)),
            None => assert_eq!(code, Some(-1)),
            Some(_) => assert!(matches!(code, Some(0..=3))),
        }
    }

    // the text column is passed through untouched
    assert_eq!(out.column("EDUCATION").unwrap().dtype(), &DataType::String);
}

#[test]
fn test_prebucket_table_links_to_final_buckets() {
    let (features, target) = split_target(&credit_dataframe(1500, 22));
    let mut process = numeric_process(limit_specials());
    process.fit(&features, Some(&target)).unwrap();

    let table = process.prebucket_table("LIMIT_BAL").unwrap();
    let summary = process.summary().unwrap();
    let row = summary.row("LIMIT_BAL").unwrap();
    assert_eq!(Some(table.height()), row.num_prebuckets);
    assert!(row.num_buckets.unwrap() <= row.num_prebuckets.unwrap());

    let buckets: Vec<Option<i64>> = table.column("bucket").unwrap().i64().unwrap().iter().collect();
    let labels: Vec<Option<&str>> = table.column("label").unwrap().str().unwrap().iter().collect();
    for (label, bucket) in labels.iter().zip(&buckets) {
        if *label == Some("Special: =50000") {
            assert_eq!(*bucket, Some(-3));
        }
        if *label == Some("Missing") {
            assert_eq!(*bucket, Some(-1));
        }
    }
}

#[test]
fn test_summary_lists_unbucketed_columns() {
    let (features, target) = split_target(&credit_dataframe(800, 23));
    let mut process = numeric_process(Specials::new());
    process.fit(&features, Some(&target)).unwrap();

    let summary = process.summary().unwrap();
    assert_eq!(summary.rows.len(), 3);
    let education = summary.row("EDUCATION").unwrap();
    assert_eq!(education.num_buckets, None);
    assert_eq!(education.iv_score, None);
    assert!(summary.row("BILL_AMT1").unwrap().iv_score.is_some());

    let frame = summary.to_dataframe().unwrap();
    assert_eq!(frame.height(), 3);
}

#[test]
fn test_stage_two_must_cover_stage_one() {
    let (features, target) = split_target(&credit_dataframe(600, 24));
    let mut process = BucketingProcess::new(
        vec![step(
            BucketingMethod::DecisionTree(DecisionTreeConfig::new(10, 0.05)),
            &["LIMIT_BAL", "BILL_AMT1"],
        )],
        vec![step(BucketingMethod::Optimal(OptimalConfig::new(4, 0.05)), &["LIMIT_BAL"])],
        Specials::new(),
    )
    .unwrap();

    let err = process.fit(&features, Some(&target)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BucketError>(),
        Some(BucketError::NotBucketed { columns }) if columns == &vec!["BILL_AMT1".to_string()]
    ));
    assert_ne!(process.state(), ProcessState::Fitted);
    assert!(process.transform(&features).is_err());
}

#[test]
fn test_specials_without_prebucketing_step_rejected() {
    let mut specials = limit_specials();
    specials.insert("EDUCATION".to_string(), Vec::new());
    let err = BucketingProcess::new(
        vec![step(
            BucketingMethod::DecisionTree(DecisionTreeConfig::default()),
            &["LIMIT_BAL"],
        )],
        vec![step(BucketingMethod::Optimal(OptimalConfig::default()), &["LIMIT_BAL"])],
        specials,
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BucketError>(),
        Some(BucketError::InvalidConfig(_))
    ));
}

#[test]
fn test_set_bucket_mapping_collapses_feature() {
    let (features, target) = split_target(&credit_dataframe(1000, 25));
    let mut process = numeric_process(limit_specials());
    process.fit(&features, Some(&target)).unwrap();

    let current = process.bucketing_mapping().unwrap().clone();
    let edited: Vec<BucketMapping> = current
        .iter()
        .map(|m| {
            if m.feature_name() == "LIMIT_BAL" {
                BucketMapping::numerical("LIMIT_BAL", vec![], false)
                    .unwrap()
                    .with_specials(m.specials().to_vec())
                    .unwrap()
            } else {
                m.clone()
            }
        })
        .collect();

    let prebucketed = process.prebucket(&features).unwrap();
    process
        .set_bucket_mapping(FeaturesBucketMapping::new(edited).unwrap(), &prebucketed, Some(&target))
        .unwrap();
    assert_eq!(process.state(), ProcessState::Fitted);

    let limit = process.features_bucket_mapping().unwrap().get("LIMIT_BAL").unwrap();
    assert_eq!(limit.boundaries(), Some(&[][..]));
    let out = process.transform(&features).unwrap();
    assert!(codes(&out, "LIMIT_BAL")
        .iter()
        .all(|c| matches!(c, Some(0) | Some(-1) | Some(-3))));

    let table = process.bucket_table("LIMIT_BAL").unwrap();
    assert_eq!(table.num_bins(), 1);
    assert!(table.row(BucketId::Special(0)).is_some());
}

#[test]
fn test_most_frequent_missing_in_stage_two() {
    let (features, target) = split_target(&credit_dataframe(1200, 26));
    let columns = ["LIMIT_BAL"];
    let bucketing = Bucketer::new(
        BucketingMethod::Optimal(OptimalConfig::new(3, 0.05)),
        BucketerOptions::new(vec!["LIMIT_BAL".to_string()])
            .with_missing_treatment(MissingTreatment::MostFrequent),
    )
    .unwrap();
    let mut process = BucketingProcess::new(
        vec![step(
            BucketingMethod::DecisionTree(DecisionTreeConfig::new(12, 0.02)),
            &columns,
        )],
        vec![bucketing],
        Specials::new(),
    )
    .unwrap();
    let out = process.fit_transform(&features, Some(&target)).unwrap();

    let limit = codes(&out, "LIMIT_BAL");
    assert!(!limit.contains(&Some(-1)));
    let missing_bucket = process
        .features_bucket_mapping()
        .unwrap()
        .get("LIMIT_BAL")
        .unwrap()
        .missing_bucket();
    assert!(missing_bucket.is_bin());
}

#[test]
fn test_categorical_process() {
    let (features, target) = split_target(&credit_dataframe(1500, 27));
    let mut process = BucketingProcess::new(
        vec![step(
            BucketingMethod::OrdinalCategorical(OrdinalConfig {
                tol: 0.01,
                ..Default::default()
            }),
            &["EDUCATION"],
        )],
        vec![step(
            BucketingMethod::Optimal(OptimalConfig::new(2, 0.05).categorical()),
            &["EDUCATION"],
        )],
        Specials::new(),
    )
    .unwrap()
    .with_remainder(Remainder::Drop);

    let out = process.fit_transform(&features, Some(&target)).unwrap();
    assert_eq!(out.width(), 1);
    assert!(codes(&out, "EDUCATION").iter().all(|c| matches!(c, Some(0..=1))));

    let composed = process.features_bucket_mapping().unwrap();
    let map = composed.get("EDUCATION").unwrap().category_map().unwrap();
    assert_eq!(map.len(), 4);
    let direct = composed.transform(&features, Remainder::Drop).unwrap();
    assert_eq!(codes(&direct, "EDUCATION"), codes(&out, "EDUCATION"));
}

#[test]
fn test_default_process() {
    let (features, target) = split_target(&credit_dataframe(1500, 28));
    let mut process =
        BucketingProcess::with_defaults(vec!["LIMIT_BAL".to_string(), "BILL_AMT1".to_string()], limit_specials())
            .unwrap();
    process.fit(&features, Some(&target)).unwrap();

    for table in process.bucket_tables().unwrap() {
        assert!(table.num_bins() <= 6);
    }
    for table in process.prebucket_tables().unwrap() {
        assert!(table.num_bins() <= 50);
    }
}
