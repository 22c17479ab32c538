//! # Snapshot Subcommand
//!
//! `snapshot check` re-validates a ledger file without loading it into a
//! fleet, so every violation is reported rather than just the first.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::ledger::LedgerFile;

/// Arguments for the `posfleet snapshot` subcommand.
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommand,
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// Re-validate referential integrity and single ownership.
    Check,
}

/// Execute the snapshot subcommand.
pub fn run_snapshot(args: &SnapshotArgs, ledger: &LedgerFile) -> Result<u8> {
    match args.command {
        SnapshotCommand::Check => cmd_check(ledger),
    }
}

fn cmd_check(ledger: &LedgerFile) -> Result<u8> {
    let snapshot = ledger.read()?;
    let violations = snapshot.violations();
    if violations.is_empty() {
        println!(
            "OK: {} device(s), {} task(s), no violations",
            snapshot.devices.len(),
            snapshot.tasks.len()
        );
        return Ok(0);
    }
    for v in &violations {
        println!("FAIL: {v}");
    }
    tracing::warn!(count = violations.len(), path = %ledger.path.display(), "ledger has violations");
    Ok(1)
}
