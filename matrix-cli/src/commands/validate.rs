use crate::commands::{load_config, resolve_config_path};
use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use matrix_service::{Session, Status};

/// Validate a matrix config file
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the matrix config (default: matrix.yml in the current directory)
    pub config: Option<PathBuf>,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    let config_path = resolve_config_path(args.config)?;
    output::step("Validating", &format!("{}", config_path.display()));

    // Step 1: Parse and validate the config
    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            output::error(&format!("{}", e));
            std::process::exit(1);
        }
    };
    output::outcome(Status::Pass, "Config valid");

    // Step 2: Build the combination tree
    let session = match Session::from_config(&config) {
        Ok(session) => session,
        Err(e) => {
            output::error(&format!("Failed to build tree: {}", e));
            std::process::exit(1);
        }
    };

    let schema = session.schema();
    for dimension in &schema.dimensions {
        output::outcome(Status::Pass, &format!(
            "{} ({}): {}",
            dimension.name,
            dimension.key,
            dimension.values.join(", ")
        ));
    }

    let keys: Vec<&str> = session
        .tree()
        .result_keys()
        .iter()
        .map(|key| key.as_str())
        .collect();
    output::outcome(Status::Pass, &format!(
        "Structure: {} dimensions, {} nodes, {} leaves, results [{}]",
        schema.depth(),
        session.tree().node_count(),
        session.tree().leaf_count(),
        keys.join(", ")
    ));

    let runner = &config.runner;
    let concurrency = if runner.concurrency == 0 {
        "unbounded".to_string()
    } else {
        runner.concurrency.to_string()
    };
    output::muted(&format!(
        "  runner: concurrency {}, delay {}-{}ms, pass rate {:.0}%",
        concurrency,
        runner.min_delay_ms,
        runner.max_delay_ms,
        runner.pass_rate * 100.0
    ));

    println!();
    output::outcome(Status::Pass, &format!("Matrix '{}' is valid", session.name()));

    Ok(())
}
