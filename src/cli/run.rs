//! The `fit` and `transform` subcommands

use std::time::Instant;

use anyhow::Result;
use console::style;

use super::args::{schema_length, FitArgs, TransformArgs};
use super::config::ProcessConfig;
use crate::mapping::FeaturesBucketMapping;
use crate::pipeline::{load_dataset, save_dataset, target_vector, TargetMapping, Transformer};
use crate::utils::{
    create_spinner, display_path, finish_with_success, finish_with_warning, hidden_spinner,
    print_banner, print_completion, print_config, print_info, print_step_header, print_step_time,
    print_warning, ConfigLine, FOLDER, GEAR, SAVE, TARGET,
};

fn spinner(quiet: bool, message: &str) -> indicatif::ProgressBar {
    if quiet {
        hidden_spinner()
    } else {
        create_spinner(message)
    }
}

pub fn run_fit(args: &FitArgs, quiet: bool) -> Result<()> {
    if !quiet {
        print_banner(env!("CARGO_PKG_VERSION"));
        print_config(&[
            ConfigLine {
                icon: &FOLDER,
                label: "Input",
                value: display_path(&args.input),
            },
            ConfigLine {
                icon: &TARGET,
                label: "Target",
                value: args.target.clone(),
            },
            ConfigLine {
                icon: &GEAR,
                label: "Config",
                value: args
                    .config
                    .as_deref()
                    .map(display_path)
                    .unwrap_or_else(|| "defaults".to_string()),
            },
            ConfigLine {
                icon: &SAVE,
                label: "Output",
                value: display_path(&args.output),
            },
        ]);
    }

    // Validate the configuration before touching the data
    let config = match &args.config {
        Some(path) => ProcessConfig::load(path)?,
        None => ProcessConfig::default(),
    };
    let mut process = config.build()?;

    if !quiet {
        print_step_header(1, "Load Data");
    }
    let step_start = Instant::now();
    let pb = spinner(quiet, "Loading dataset...");
    let df = load_dataset(&args.input, schema_length(args.infer_schema_length))?;
    finish_with_success(&pb, &format!("Loaded {} rows, {} columns", df.height(), df.width()));

    let mapping = match (&args.event_value, &args.non_event_value) {
        (Some(event), Some(non_event)) => Some(TargetMapping::new(event.clone(), non_event.clone())),
        _ => None,
    };
    let target = target_vector(&df, &args.target, mapping.as_ref())?;
    let mut excluded = vec![args.target.clone()];
    excluded.extend(args.drop_columns.iter().cloned());
    let features = df.drop_many(&excluded);
    if !quiet {
        print_info(&format!(
            "{} event(s) out of {} rows",
            target.iter().filter(|t| **t == 1).count(),
            target.len()
        ));
        print_step_time(step_start.elapsed());
        print_step_header(2, "Fit Bucketing Process");
    }

    let step_start = Instant::now();
    let pb = spinner(quiet, "Pre-bucketing and bucketing features...");
    match process.fit(&features, Some(&target)) {
        Ok(()) => finish_with_success(&pb, "Bucketing process fitted"),
        Err(err) => {
            finish_with_warning(&pb, "Fitting failed");
            return Err(err);
        }
    }
    if !quiet {
        print_step_time(step_start.elapsed());
        print_step_header(3, "Save Results");
    }

    process.save(&args.output)?;
    if !quiet {
        print_info(&format!("Mapping saved to {}", args.output.display()));
    }
    if let Some(path) = &args.transformed {
        let mut transformed = process.transform(&df)?;
        save_dataset(&mut transformed, path)?;
        if !quiet {
            print_info(&format!("Bucketed data saved to {}", path.display()));
        }
    }

    if !quiet {
        let summary = process.summary()?;
        if !args.no_summary {
            summary.display();
        }
        let unbucketed = summary.rows.iter().filter(|r| r.num_buckets.is_none()).count();
        if unbucketed > 0 {
            print_warning(&format!("{} column(s) were not bucketed", unbucketed));
        }
        print_completion("Bucketing complete!");
    }
    Ok(())
}

pub fn run_transform(args: &TransformArgs, quiet: bool) -> Result<()> {
    let mapping = FeaturesBucketMapping::load(&args.mapping)?;
    let df = load_dataset(&args.input, schema_length(args.infer_schema_length))?;

    let pb = spinner(quiet, "Applying bucket mapping...");
    let mut out = mapping.transform(&df, args.remainder)?;
    save_dataset(&mut out, &args.output)?;
    finish_with_success(
        &pb,
        &format!(
            "Bucketed {} column(s) of {} rows into {}",
            mapping.len(),
            out.height(),
            style(args.output.display()).cyan()
        ),
    );
    Ok(())
}
