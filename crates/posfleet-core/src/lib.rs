//! # posfleet-core — Foundational Types for the Terminal Fleet
//!
//! This crate is the leaf of the posfleet workspace. It defines the
//! identifiers, timestamps, and error taxonomy shared by the device registry,
//! the task pipeline, and the outer API/CLI surfaces. It depends on nothing
//! internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `SerialNumber`, `AssetTag` and
//!    `TaskId` are distinct types with validated constructors. A serial can
//!    never be passed where an asset tag is expected.
//!
//! 2. **One error taxonomy.** Every operator-facing failure is a variant of
//!    [`FleetError`]. All of them are recoverable and carry the offending
//!    serial, task, or state so callers can render a precise message.
//!
//! 3. **UTC-only timestamps.** [`Timestamp`] is always UTC, truncated to
//!    seconds, and renders as `YYYY-MM-DDTHH:MM:SSZ`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `posfleet-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod temporal;

pub use error::FleetError;
pub use identity::{AssetTag, SerialNumber, TaskId};
pub use temporal::Timestamp;
