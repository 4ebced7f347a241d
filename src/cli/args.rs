//! Command-line argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::mapping::Remainder;

/// Scorebin - bucket credit-scoring features into fitted, composable mappings
#[derive(Parser, Debug)]
#[command(name = "scorebin")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// More log output (-v info, -vv debug, -vvv trace).
    /// The SCOREBIN_LOG environment variable takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fit a two-stage bucketing process and save the composed mapping
    Fit(FitArgs),

    /// Apply a saved mapping to a dataset
    Transform(TransformArgs),
}

#[derive(Args, Debug)]
pub struct FitArgs {
    /// Input file path (CSV or Parquet)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Target column name; excluded from bucketing
    #[arg(short, long)]
    pub target: String,

    /// Value in target column that represents EVENT (maps to 1).
    /// Required with --non-event-value when target is not binary 0/1.
    #[arg(long, requires = "non_event_value")]
    pub event_value: Option<String>,

    /// Value in target column that represents NON-EVENT (maps to 0).
    #[arg(long, requires = "event_value")]
    pub non_event_value: Option<String>,

    /// Process configuration (YAML) with specials and the two stage pipelines.
    /// Without it, decision tree pre-bucketing and optimal bucketing run on
    /// every column.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Where to save the composed mapping (.json, .yaml or .yml)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Also write the bucketed dataset here (CSV or Parquet)
    #[arg(long)]
    pub transformed: Option<PathBuf>,

    /// Columns to leave out of bucketing (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub drop_columns: Vec<String>,

    /// Skip the summary table
    #[arg(long, default_value = "false")]
    pub no_summary: bool,

    /// Number of rows to use for schema inference (CSV only); 0 scans the whole file
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,
}

#[derive(Args, Debug)]
pub struct TransformArgs {
    /// Input file path (CSV or Parquet)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Saved mapping (.json, .yaml or .yml)
    #[arg(short, long)]
    pub mapping: PathBuf,

    /// Output file path (CSV or Parquet)
    #[arg(short, long)]
    pub output: PathBuf,

    /// What to do with columns the mapping does not cover: passthrough or drop
    #[arg(long, default_value = "passthrough")]
    pub remainder: Remainder,

    /// Number of rows to use for schema inference (CSV only); 0 scans the whole file
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,
}

impl Cli {
    /// Log filter implied by --verbose / --quiet
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// `None` asks polars to scan every row
pub fn schema_length(infer_schema_length: usize) -> Option<usize> {
    (infer_schema_length > 0).then_some(infer_schema_length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fit() {
        let cli = Cli::parse_from([
            "scorebin", "-vv", "fit", "-i", "data.csv", "-t", "default", "-o", "mapping.json",
        ]);
        assert_eq!(cli.log_filter(), "debug");
        let Commands::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.target, "default");
        assert!(args.config.is_none());
    }

    #[test]
    fn test_event_values_come_in_pairs() {
        let result = Cli::try_parse_from([
            "scorebin", "fit", "-i", "d.csv", "-t", "y", "-o", "m.json", "--event-value", "bad",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_transform_remainder() {
        let cli = Cli::parse_from([
            "scorebin", "transform", "-i", "d.csv", "-m", "m.yaml", "-o", "out.csv", "--remainder", "drop",
        ]);
        let Commands::Transform(args) = cli.command else {
            panic!("expected transform");
        };
        assert_eq!(args.remainder, Remainder::Drop);
        assert_eq!(schema_length(0), None);
    }
}
