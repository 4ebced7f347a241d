//! Scorebin command-line front end

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use scorebin::cli::{run_fit, run_transform, Cli, Commands};

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_env("SCOREBIN_LOG").unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match &cli.command {
        Commands::Fit(args) => run_fit(args, cli.quiet),
        Commands::Transform(args) => run_transform(args, cli.quiet),
    }
}
