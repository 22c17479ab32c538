//! # posfleet-provisioning — Registry, Pipeline and Reconciliation
//!
//! The engine behind the terminal fleet:
//!
//! - **Registry** (`registry.rs`): keyed device collection behind the
//!   [`DeviceStore`] seam.
//! - **Pipeline** (`pipeline.rs`): keyed task collection, filters, and the
//!   inbound payloads that open tasks.
//! - **Reconciliation** (`reconcile.rs`): [`Fleet`], the command/query
//!   surface that keeps registry and pipeline consistent.
//! - **Notifications** (`notify.rs`): [`CompletionHook`]s fired when a task
//!   completes.
//! - **Configuration** (`config.rs`): warehouse holder, reason codes, and
//!   field-agent roles.
//! - **Snapshots** (`snapshot.rs`): JSON export/import of the ledger with
//!   invariant re-validation.
//!
//! ## Example
//!
//! ```
//! use posfleet_core::{AssetTag, SerialNumber};
//! use posfleet_provisioning::{Fleet, FleetConfig, RegisterDevice};
//! use posfleet_state::DeviceStatus;
//!
//! let fleet = Fleet::new(FleetConfig::default());
//! fleet.register_device(RegisterDevice {
//!     serial_number: SerialNumber::new("SN001")?,
//!     asset_tag: AssetTag::new("PAT-0001")?,
//!     model: "S920".into(),
//!     status: DeviceStatus::InStock,
//!     holder: "Central Warehouse".into(),
//! })?;
//! assert_eq!(fleet.get_device(&SerialNumber::new("SN001")?)?.history().len(), 1);
//! # Ok::<(), posfleet_core::FleetError>(())
//! ```

pub mod config;
pub mod notify;
pub mod pipeline;
pub mod reconcile;
pub mod registry;
pub mod snapshot;

pub use config::{ConfigError, FleetConfig, ReasonCode};
pub use notify::{BroadcastHook, CompletionHook, TaskCompleted, TracingHook};
pub use pipeline::{LogisticsRequest, RegistrationApproval, SalesRequest, TaskFilter, TaskPipeline};
pub use reconcile::{Fleet, Ledger, RegisterDevice};
pub use registry::{DeviceFilter, DeviceRegistry, DeviceStore};
pub use snapshot::FleetSnapshot;
