//! # posfleet CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use posfleet_cli::device::{run_device, DeviceArgs};
use posfleet_cli::ledger::LedgerFile;
use posfleet_cli::snapshot::{run_snapshot, SnapshotArgs};
use posfleet_cli::task::{run_task, TaskArgs};

/// Terminal fleet ledger tool.
///
/// Registers and moves payment terminals, inspects provisioning tasks and
/// checks ledger integrity against a local JSON snapshot.
#[derive(Parser, Debug)]
#[command(name = "posfleet", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Ledger snapshot file.
    #[arg(long, global = true, default_value = ".posfleet/ledger.json")]
    state: PathBuf,

    /// Fleet configuration (YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Device registry commands (register, list, show, move, remove).
    Device(DeviceArgs),

    /// Provisioning task queries (list, show).
    Task(TaskArgs),

    /// Ledger integrity checks.
    Snapshot(SnapshotArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = LedgerFile::new(cli.state, cli.config.as_deref()).and_then(|ledger| {
        tracing::debug!(path = %ledger.path.display(), "using ledger");
        match &cli.command {
            Commands::Device(args) => run_device(args, &ledger),
            Commands::Task(args) => run_task(args, &ledger),
            Commands::Snapshot(args) => run_snapshot(args, &ledger),
        }
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
