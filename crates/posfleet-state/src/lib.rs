//! # posfleet-state — Device and Task State Machines
//!
//! The two entities of the fleet, each with a single mutation path:
//!
//! - **Device** (`device.rs`): custody status and holder of a physical
//!   terminal, plus its append-only history.
//! - **Task** (`task.rs`): a provisioning request walking a per-kind
//!   subgraph of `REQUESTED → … → COMPLETED`.
//!
//! ## Design
//!
//! States are closed enums and legal edges are a pattern-matched table per
//! task kind. There are no string-typed states; strings only appear at the
//! error boundary, where [`TransitionError`] converts into
//! [`posfleet_core::FleetError`].
//!
//! Neither machine knows about the other. Cross-entity rules (single
//! ownership, release resolution, atomic exchange) belong to the
//! reconciliation layer in `posfleet-provisioning`.

pub mod device;
pub mod task;

// ─── Device re-exports ──────────────────────────────────────────────

pub use device::{Device, DeviceStatus, HistoryEntry};

// ─── Task re-exports ────────────────────────────────────────────────

pub use task::{
    DeviceBinding, NewTask, ProvisioningInput, ProvisioningPlan, RegistrationDetails, Requester,
    RequesterRole, Task, TaskKind, TaskState, TaskTransitionRecord, TransitionError,
};
