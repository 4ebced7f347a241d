//! CLI module - argument parsing, process configuration and subcommands

mod args;
pub mod config;
mod run;

pub use args::{schema_length, Cli, Commands, FitArgs, TransformArgs};
pub use config::{ProcessConfig, StepConfig};
pub use run::{run_fit, run_transform};
