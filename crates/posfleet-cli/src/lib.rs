//! # posfleet-cli — Terminal Fleet Command-Line Interface
//!
//! Operates on a local JSON ledger snapshot (default
//! `.posfleet/ledger.json`). Every mutating command loads the snapshot,
//! runs the command through [`posfleet_provisioning::Fleet`] so the same
//! invariants apply as in the service, and writes the snapshot back.
//!
//! ## Subcommands
//!
//! - `device`: register, list, show, move and remove terminals
//! - `task`: list and show provisioning tasks
//! - `snapshot`: re-validate ledger invariants
//!
//! Handlers return `anyhow::Result<u8>`; the `u8` is the process exit code.

pub mod device;
pub mod ledger;
pub mod snapshot;
pub mod task;
