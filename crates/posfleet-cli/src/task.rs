//! # Task Subcommand
//!
//! Read-only view of the provisioning pipeline stored in the ledger.
//! Tasks are opened and advanced through the HTTP service.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use posfleet_core::{TaskId, Timestamp};
use posfleet_provisioning::TaskFilter;
use posfleet_state::{Task, TaskKind, TaskState};

use crate::ledger::LedgerFile;

/// Arguments for the `posfleet task` subcommand.
#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommand,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// List tasks, newest first.
    List {
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        state: Option<String>,
        /// Substring of the client name.
        #[arg(long)]
        client: Option<String>,
        /// Created on or after (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        from: Option<String>,
        /// Created on or before (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        to: Option<String>,
    },

    /// Show one task and its transition log.
    Show { id: String },
}

/// Execute the task subcommand.
pub fn run_task(args: &TaskArgs, ledger: &LedgerFile) -> Result<u8> {
    match &args.command {
        TaskCommand::List {
            kind,
            state,
            client,
            from,
            to,
        } => {
            let filter = TaskFilter {
                kind: kind
                    .as_deref()
                    .map(str::parse::<TaskKind>)
                    .transpose()
                    .context("invalid --kind")?,
                state: state
                    .as_deref()
                    .map(str::parse::<TaskState>)
                    .transpose()
                    .context("invalid --state")?,
                client: client.clone(),
                created_from: from
                    .as_deref()
                    .map(Timestamp::parse_lenient)
                    .transpose()
                    .context("invalid --from")?,
                created_to: to
                    .as_deref()
                    .map(Timestamp::parse_lenient_end)
                    .transpose()
                    .context("invalid --to")?,
            };
            cmd_list(ledger, &filter)
        }
        TaskCommand::Show { id } => cmd_show(ledger, id),
    }
}

fn cmd_list(ledger: &LedgerFile, filter: &TaskFilter) -> Result<u8> {
    let tasks = ledger.open()?.list_tasks(filter);
    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(0);
    }
    for t in &tasks {
        println!(
            "{}  {:<17} {:<23} {:<24} {}",
            t.id(),
            t.kind().as_str(),
            t.state().as_str(),
            t.client_name(),
            t.created_at()
        );
    }
    println!("{} task(s)", tasks.len());
    Ok(0)
}

fn print_task(task: &Task) {
    println!("Task: {}", task.id());
    println!("  Kind: {}", task.kind());
    println!("  State: {}", task.state());
    println!("  Client: {}", task.client_name());
    println!(
        "  Requester: {} ({})",
        task.requester().name,
        task.requester().role
    );
    if let Some(b) = task.device_binding() {
        println!("  Device: {} ({})", b.serial_number, b.asset_tag);
    }
    if let Some(serial) = task.release_binding() {
        println!("  Releases: {serial}");
    }
    if let Some(reason) = task.reason_code() {
        println!("  Reason: {reason}");
    }
    if let Some(code) = task.provisioning_code() {
        println!("  Provisioning code: {code}");
    }
    if !task.details().is_empty() {
        println!("  Details: {}", task.details());
    }
    println!("  Created: {}", task.created_at());
    println!("  Transitions: {}", task.transitions().len());
    for (i, t) in task.transitions().iter().enumerate() {
        println!(
            "    [{i}] {} → {} at {} {}",
            t.from_state, t.to_state, t.timestamp, t.note
        );
    }
}

fn cmd_show(ledger: &LedgerFile, raw_id: &str) -> Result<u8> {
    let id = Uuid::parse_str(raw_id).with_context(|| format!("invalid task id {raw_id:?}"))?;
    let task = ledger.open()?.get_task(TaskId(id))?;
    print_task(&task);
    Ok(0)
}
