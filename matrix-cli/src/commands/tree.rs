use crate::commands::{apply_filters, load_config, resolve_config_path};

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use matrix_service::{ReportFormat, Reporter, Session};

/// Print the combination tree of a matrix config
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Path to the matrix config (default: matrix.yml in the current directory)
    pub config: Option<PathBuf>,

    /// Show only these values of a dimension (repeatable, format: key=v1,v2)
    #[arg(long, value_name = "KEY=VALUES")]
    pub filter: Vec<String>,

    /// Output format: terminal, json, yaml or junit
    #[arg(long, default_value = "terminal")]
    pub format: ReportFormat,
}

pub fn execute(args: TreeArgs) -> Result<()> {
    let config_path = resolve_config_path(args.config)?;
    let config = load_config(&config_path)?;

    let mut session = Session::from_config(&config)?;
    apply_filters(&mut session, &args.filter)?;

    print!("{}", Reporter::report(&session, args.format)?);
    Ok(())
}
