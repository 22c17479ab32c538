//! # Device Subcommand
//!
//! Warehouse-side registry commands.
//!
//! - `register`: take a unit into the registry.
//! - `list`: list units, optionally filtered.
//! - `show`: one unit with its full history, newest first.
//! - `move`: manual custody change.
//! - `remove`: decommission a unit no open task references.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use posfleet_core::{AssetTag, SerialNumber};
use posfleet_provisioning::{DeviceFilter, RegisterDevice};
use posfleet_state::{Device, DeviceStatus};

use crate::ledger::LedgerFile;

/// Arguments for the `posfleet device` subcommand.
#[derive(Args, Debug)]
pub struct DeviceArgs {
    #[command(subcommand)]
    pub command: DeviceCommand,
}

#[derive(Subcommand, Debug)]
pub enum DeviceCommand {
    /// Register a new unit (warehouse intake).
    Register {
        #[arg(long)]
        serial: String,
        #[arg(long)]
        asset_tag: String,
        #[arg(long, default_value = "")]
        model: String,
        /// Initial status (default IN_STOCK).
        #[arg(long, default_value = "IN_STOCK")]
        status: String,
        /// Initial holder (default: the configured warehouse).
        #[arg(long)]
        holder: Option<String>,
    },

    /// List units.
    List {
        #[arg(long)]
        status: Option<String>,
        /// Substring of the current holder.
        #[arg(long)]
        holder: Option<String>,
        /// Substring of serial number or asset tag.
        #[arg(long, short)]
        query: Option<String>,
    },

    /// Show one unit and its history.
    Show { serial: String },

    /// Move a unit to a new status and holder.
    Move {
        serial: String,
        #[arg(long)]
        status: String,
        #[arg(long)]
        holder: String,
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Decommission a unit.
    Remove { serial: String },
}

/// Execute the device subcommand.
pub fn run_device(args: &DeviceArgs, ledger: &LedgerFile) -> Result<u8> {
    match &args.command {
        DeviceCommand::Register {
            serial,
            asset_tag,
            model,
            status,
            holder,
        } => cmd_register(ledger, serial, asset_tag, model, status, holder.as_deref()),
        DeviceCommand::List {
            status,
            holder,
            query,
        } => cmd_list(ledger, status.as_deref(), holder.clone(), query.clone()),
        DeviceCommand::Show { serial } => cmd_show(ledger, serial),
        DeviceCommand::Move {
            serial,
            status,
            holder,
            description,
        } => cmd_move(ledger, serial, status, holder, description),
        DeviceCommand::Remove { serial } => cmd_remove(ledger, serial),
    }
}

fn parse_status(raw: &str) -> Result<DeviceStatus> {
    raw.parse::<DeviceStatus>()
        .with_context(|| format!("invalid status {raw:?}"))
}

fn cmd_register(
    ledger: &LedgerFile,
    serial: &str,
    asset_tag: &str,
    model: &str,
    status: &str,
    holder: Option<&str>,
) -> Result<u8> {
    let fleet = ledger.open()?;
    let holder = holder.map_or_else(|| fleet.config().warehouse_holder.clone(), str::to_string);
    let device = fleet.register_device(RegisterDevice {
        serial_number: SerialNumber::new(serial)?,
        asset_tag: AssetTag::new(asset_tag)?,
        model: model.to_string(),
        status: parse_status(status)?,
        holder,
    })?;
    ledger.save(&fleet)?;
    println!(
        "OK: registered {} ({}) {} at {}",
        device.serial_number(),
        device.asset_tag(),
        device.status(),
        device.current_holder()
    );
    Ok(0)
}

fn cmd_list(
    ledger: &LedgerFile,
    status: Option<&str>,
    holder: Option<String>,
    query: Option<String>,
) -> Result<u8> {
    let fleet = ledger.open()?;
    let filter = DeviceFilter {
        status: status.map(parse_status).transpose()?,
        holder,
        query,
    };
    let devices = fleet.list_devices(&filter)?;
    if devices.is_empty() {
        println!("No devices found.");
        return Ok(0);
    }
    println!("{:<16} {:<12} {:<10} {:<18} HOLDER", "SERIAL", "ASSET TAG", "MODEL", "STATUS");
    for d in &devices {
        println!(
            "{:<16} {:<12} {:<10} {:<18} {}",
            d.serial_number().as_str(),
            d.asset_tag().as_str(),
            d.model(),
            d.status().as_str(),
            d.current_holder()
        );
    }
    println!("{} device(s)", devices.len());
    Ok(0)
}

fn print_device(device: &Device) {
    println!("Device: {}", device.serial_number());
    println!("  Asset tag: {}", device.asset_tag());
    println!("  Model: {}", device.model());
    println!("  Status: {}", device.status());
    println!("  Holder: {}", device.current_holder());
    println!("  Updated: {}", device.last_updated());
    println!("  History ({} entries):", device.history().len());
    for entry in device.history_newest_first() {
        println!(
            "    {} {} @ {}: {}",
            entry.timestamp, entry.status, entry.holder, entry.description
        );
    }
}

fn cmd_show(ledger: &LedgerFile, serial: &str) -> Result<u8> {
    let fleet = ledger.open()?;
    let device = fleet.get_device(&SerialNumber::new(serial)?)?;
    print_device(&device);
    Ok(0)
}

fn cmd_move(
    ledger: &LedgerFile,
    serial: &str,
    status: &str,
    holder: &str,
    description: &str,
) -> Result<u8> {
    let fleet = ledger.open()?;
    let device = fleet.transition_device(
        &SerialNumber::new(serial)?,
        parse_status(status)?,
        holder,
        description,
    )?;
    ledger.save(&fleet)?;
    println!(
        "OK: {} is now {} at {}",
        device.serial_number(),
        device.status(),
        device.current_holder()
    );
    Ok(0)
}

fn cmd_remove(ledger: &LedgerFile, serial: &str) -> Result<u8> {
    let fleet = ledger.open()?;
    let removed = fleet.remove_device(&SerialNumber::new(serial)?)?;
    ledger.save(&fleet)?;
    println!("OK: removed {}", removed.serial_number());
    Ok(0)
}
