use crate::commands::{apply_filters, load_config, resolve_config_path};
use crate::output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use color_eyre::eyre::bail;
use color_eyre::Result;

use matrix_service::{
    progress_channel, ExecutionEvent, LeafTask, ProgressReceiver, ReportFormat, Reporter,
    Scheduler, Session, SimulatedRunner, Status, ROOT_ID,
};

/// Run matrix leaves with the simulated runner
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the matrix config (default: matrix.yml in the current directory)
    pub config: Option<PathBuf>,

    /// Run every leaf under this node id (default: the whole matrix)
    #[arg(long, value_name = "ID", conflicts_with = "leaf")]
    pub node: Option<String>,

    /// Run only these leaves (can be repeated)
    #[arg(long, value_name = "ID")]
    pub leaf: Vec<String>,

    /// Run a single result dimension instead of every result
    #[arg(long, value_name = "KEY", conflicts_with = "leaf")]
    pub result: Option<String>,

    /// Maximum leaves in flight (0 = unbounded; default from config)
    #[arg(long, short = 'j', value_name = "N")]
    pub concurrency: Option<usize>,

    /// Show only these values of a dimension in the final tree (format: key=v1,v2)
    #[arg(long, value_name = "KEY=VALUES")]
    pub filter: Vec<String>,

    /// Write a report to this file after the run
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Report file format: json, yaml, junit or terminal
    #[arg(long, default_value = "json")]
    pub format: ReportFormat,

    /// Request a stop once this many leaves have finished
    #[arg(long, value_name = "N")]
    pub stop_after: Option<usize>,

    /// Seed for reproducible simulated outcomes
    #[arg(long)]
    pub seed: Option<u64>,

    /// Hide leaf log lines
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let config_path = resolve_config_path(args.config)?;
    output::step("Loading", &format!("{}", config_path.display()));
    let mut config = load_config(&config_path)?;
    tracing::debug!(path = %config_path.display(), "config loaded");
    if args.seed.is_some() {
        config.runner.seed = args.seed;
    }

    let (tx, rx) = progress_channel();
    let mut session = Session::from_config(&config)?.with_progress(tx);
    apply_filters(&mut session, &args.filter)?;

    let limit = args.concurrency.unwrap_or(config.runner.concurrency);
    let task: Arc<dyn LeafTask> = Arc::new(SimulatedRunner::from_config(&config.runner));

    output::note(&format!(
        "Matrix '{}': {} leaves, concurrency {}",
        session.name(),
        session.tree().leaf_count(),
        if limit == 0 { "unbounded".to_string() } else { limit.to_string() }
    ));

    // Print progress in the background; it also enforces --stop-after
    let printer = tokio::spawn(print_events(
        rx,
        session.scheduler().clone(),
        args.stop_after,
        args.quiet,
    ));

    // Ctrl-C stops dispatching; running leaves finish
    let stopper = session.scheduler().clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            output::warning("Interrupted, waiting for running leaves to finish");
            stopper.request_stop();
        }
    });

    let outcome = if !args.leaf.is_empty() {
        session.run_selected(&args.leaf, limit, task).await
    } else {
        let node = args.node.as_deref().unwrap_or(ROOT_ID);
        match &args.result {
            Some(key) => session.run_result(node, key, limit, task).await,
            None => session.run_subtree(node, limit, task).await,
        }
    };
    interrupt.abort();

    let report = match outcome {
        Ok(Some(report)) => report,
        Ok(None) => bail!("Another run is already in progress"),
        Err(e) => {
            printer.abort();
            return Err(e.into());
        }
    };
    printer.await?;

    print!("{}", Reporter::to_terminal(&session));

    if report.stopped {
        output::warning(&format!(
            "Stopped early: {} leaves not dispatched",
            report.not_dispatched
        ));
    }

    if let Some(path) = &args.report {
        std::fs::write(path, Reporter::report(&session, args.format)?)?;
        output::note(&format!("{} report written to {}", args.format, path.display()));
    }

    if report.success() {
        output::outcome(Status::Pass, &format!(
            "{} leaves passed in {:.2}s",
            report.passed,
            report.duration.as_secs_f64()
        ));
        Ok(())
    } else {
        output::outcome(Status::Fail, &format!(
            "{} of {} leaves failed in {:.2}s",
            report.failed,
            report.executed(),
            report.duration.as_secs_f64()
        ));
        std::process::exit(1);
    }
}

async fn print_events(
    mut rx: ProgressReceiver,
    scheduler: Scheduler,
    stop_after: Option<usize>,
    quiet: bool,
) {
    let mut finished = 0usize;

    while let Some(event) = rx.recv().await {
        match &event {
            ExecutionEvent::RunStarted {
                total_leaves,
                workers,
            } => {
                println!();
                output::banner(&format!(
                    "Running {} leaves on {} workers",
                    total_leaves, workers
                ));
            }

            ExecutionEvent::LeafStarted {
                leaf_id, worker, ..
            } => {
                output::step("Running", &format!("{} (worker {})", leaf_id, worker + 1));
            }

            ExecutionEvent::LeafOutput { line, .. } => {
                if !quiet {
                    output::leaf_log(line);
                }
            }

            ExecutionEvent::LeafCompleted {
                leaf_id,
                status,
                duration,
                ..
            } => {
                output::outcome(
                    *status,
                    &format!("{} ({:.2}s)", leaf_id, duration.as_secs_f64()),
                );

                finished += 1;
                if stop_after == Some(finished) {
                    output::warning(&format!("Stopping after {} leaves", finished));
                    scheduler.request_stop();
                }
            }

            ExecutionEvent::LeafSkipped { leaf_id, reason } => {
                output::muted(&format!("  {} skipped: {}", leaf_id, reason));
            }

            ExecutionEvent::RunCompleted { report } => {
                println!();
                output::step(
                    "Finished",
                    &format!(
                        "{} passed, {} failed, {} not dispatched",
                        report.passed, report.failed, report.not_dispatched
                    ),
                );
                break;
            }
        }
    }
}
