//! Tests for CLI argument parsing and the fit/transform commands

mod common;

use std::fs;

use assert_cmd::Command;
use clap::Parser;
use predicates::prelude::*;
use scorebin::cli::{Cli, Commands, ProcessConfig};
use scorebin::mapping::FeaturesBucketMapping;

use common::{credit_dataframe, create_temp_csv};

const CONFIG: &str = r#"
specials:
  LIMIT_BAL:
    - label: "=50000"
      values: [50000]
prebucketing:
  - method: decision_tree
    max_n_bins: 20
    min_bin_size: 0.02
    variables: [LIMIT_BAL, BILL_AMT1]
bucketing:
  - method: optimal
    max_n_bins: 4
    variables: [LIMIT_BAL, BILL_AMT1]
"#;

fn scorebin() -> Command {
    Command::cargo_bin("scorebin").unwrap()
}

#[test]
fn test_fit_defaults() {
    let cli = Cli::parse_from(["scorebin", "fit", "-i", "data.csv", "-t", "default", "-o", "m.json"]);
    assert_eq!(cli.log_filter(), "warn");
    let Commands::Fit(args) = cli.command else {
        panic!("expected fit");
    };
    assert_eq!(args.infer_schema_length, 10000);
    assert!(args.drop_columns.is_empty());
    assert!(!args.no_summary);
    assert!(args.transformed.is_none());
}

#[test]
fn test_drop_columns_are_comma_separated() {
    let cli = Cli::parse_from([
        "scorebin", "fit", "-i", "d.csv", "-t", "y", "-o", "m.json", "--drop-columns", "id,EDUCATION",
    ]);
    let Commands::Fit(args) = cli.command else {
        panic!("expected fit");
    };
    assert_eq!(args.drop_columns, vec!["id".to_string(), "EDUCATION".to_string()]);
}

#[test]
fn test_quiet_conflicts_with_verbose() {
    assert!(Cli::try_parse_from(["scorebin", "-q", "-v", "transform", "-i", "a", "-m", "b", "-o", "c"]).is_err());
}

#[test]
fn test_config_parses() {
    let process = ProcessConfig::from_yaml(CONFIG).unwrap().build().unwrap();
    assert_eq!(process.prebucketing().steps().len(), 1);
    assert_eq!(process.specials()["LIMIT_BAL"][0].label, "=50000");
}

#[test]
fn test_fit_then_transform() {
    let mut df = credit_dataframe(1000, 41);
    let (temp_dir, csv_path) = create_temp_csv(&mut df);
    let config_path = temp_dir.path().join("process.yaml");
    fs::write(&config_path, CONFIG).unwrap();
    let mapping_path = temp_dir.path().join("mapping.json");
    let fitted_path = temp_dir.path().join("fitted.csv");

    scorebin()
        .args(["-q", "fit", "-t", "default"])
        .arg("-i")
        .arg(&csv_path)
        .arg("-c")
        .arg(&config_path)
        .arg("-o")
        .arg(&mapping_path)
        .arg("--transformed")
        .arg(&fitted_path)
        .assert()
        .success();

    let mapping = FeaturesBucketMapping::load(&mapping_path).unwrap();
    assert_eq!(mapping.columns(), vec!["LIMIT_BAL".to_string(), "BILL_AMT1".to_string()]);
    assert!(fitted_path.exists());

    let out_path = temp_dir.path().join("bucketed.csv");
    scorebin()
        .args(["-q", "transform", "--remainder", "drop"])
        .arg("-i")
        .arg(&csv_path)
        .arg("-m")
        .arg(&mapping_path)
        .arg("-o")
        .arg(&out_path)
        .assert()
        .success();

    let header = fs::read_to_string(&out_path).unwrap();
    assert!(header.starts_with("LIMIT_BAL,BILL_AMT1"));
    assert_eq!(header.lines().count(), 1001);
}

#[test]
fn test_fit_with_default_stages() {
    let mut df = credit_dataframe(800, 42);
    let (temp_dir, csv_path) = create_temp_csv(&mut df);
    let mapping_path = temp_dir.path().join("mapping.yaml");

    scorebin()
        .args(["-q", "fit", "-t", "default", "--drop-columns", "EDUCATION"])
        .arg("-i")
        .arg(&csv_path)
        .arg("-o")
        .arg(&mapping_path)
        .assert()
        .success();

    let mapping = FeaturesBucketMapping::load(&mapping_path).unwrap();
    assert_eq!(mapping.len(), 2);
    assert!(mapping.get("EDUCATION").is_none());
}

#[test]
fn test_invalid_config_fails() {
    let mut df = credit_dataframe(100, 43);
    let (temp_dir, csv_path) = create_temp_csv(&mut df);
    let config_path = temp_dir.path().join("process.yaml");
    fs::write(
        &config_path,
        "prebucketing:\n  - method: equal_width\n    n_bins: 0\nbucketing:\n  - method: optimal\n",
    )
    .unwrap();

    scorebin()
        .args(["-q", "fit", "-t", "default"])
        .arg("-i")
        .arg(&csv_path)
        .arg("-c")
        .arg(&config_path)
        .arg("-o")
        .arg(temp_dir.path().join("mapping.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("n_bins"));
}

#[test]
fn test_missing_target_column_fails() {
    let mut df = credit_dataframe(100, 44);
    let (temp_dir, csv_path) = create_temp_csv(&mut df);

    scorebin()
        .args(["-q", "fit", "-t", "not_there", "--drop-columns", "EDUCATION"])
        .arg("-i")
        .arg(&csv_path)
        .arg("-o")
        .arg(temp_dir.path().join("mapping.json"))
        .assert()
        .failure();
}

#[test]
fn test_help_lists_subcommands() {
    scorebin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fit").and(predicate::str::contains("transform")));
}
