//! Cutlist Progress - ingestion tracker simulator

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use cutlist_common::logging::{init_logging, LogConfig, LogLevel};
use cutlist_progress::{
    config::TrackerConfig, format::format_eta, simulate::SimulationConfig, SessionStore,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cutlist-progress")]
#[command(author, version, about = "Batch ingestion progress tracker")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a simulated ingestion batch against an in-memory store
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Number of files in the batch
    #[arg(short, long, default_value_t = 4)]
    files: usize,

    /// Milliseconds each extraction stage takes
    #[arg(long, default_value_t = 200)]
    stage_ms: u64,

    /// Milliseconds between progress polls
    #[arg(long, default_value_t = 250)]
    poll_ms: u64,

    /// Request cancellation after this many milliseconds
    #[arg(long)]
    cancel_after_ms: Option<u64>,

    /// Fail every n-th file
    #[arg(long)]
    fail_every: Option<usize>,

    /// Print the final snapshot as JSON
    #[arg(long)]
    json: bool,

    /// Also write the final snapshot as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("cutlist-progress")
        .build()
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    let tracker_config = TrackerConfig::load()?;
    info!(
        ttl_secs = tracker_config.session_ttl.as_secs(),
        sweep_secs = tracker_config.sweep_interval.as_secs(),
        "Tracker configuration loaded"
    );

    let store = SessionStore::new(tracker_config);
    let sweeper = store.spawn_sweeper();

    match cli.command {
        Command::Simulate(args) => {
            let config = SimulationConfig {
                files: args.files,
                stage_delay: Duration::from_millis(args.stage_ms),
                poll_interval: Duration::from_millis(args.poll_ms),
                cancel_after: args.cancel_after_ms.map(Duration::from_millis),
                fail_every: args.fail_every,
            };

            let snapshot = cutlist_progress::simulate::run_simulation(&store, config)
                .await
                .context("Simulation failed")?;

            if let Some(path) = &args.output {
                cutlist_progress::simulate::write_snapshot(path, &snapshot)
                    .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
            }

            if args.json {
                let json = serde_json::to_string_pretty(snapshot.as_ref())
                    .context("Failed to serialize snapshot")?;
                println!("{}", json);
            } else {
                println!(
                    "{} [{}] {}% - {} processed, {} failed, {} cancelled, {} items ({})",
                    snapshot.session_id,
                    snapshot.status,
                    snapshot.overall.overall_progress,
                    snapshot.overall.processed_files,
                    snapshot.overall.failed_files,
                    snapshot.overall.cancelled_files,
                    snapshot.overall.total_items_found,
                    format_eta(snapshot.overall.eta_seconds),
                );
            }
        },
    }

    sweeper.shutdown();
    Ok(())
}
