//! # Error Types — Fleet Error Taxonomy
//!
//! Every failure the registry, pipeline, or reconciliation layer can report.
//! All errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - All variants are recoverable, operator-facing validation errors. They
//!   are returned before any mutation happens, so neither the registry nor
//!   the pipeline is left inconsistent.
//! - State names travel as strings so this leaf crate stays independent of
//!   the state-machine enums defined in `posfleet-state`.
//! - `Storage` is the single generic transport error for the persistence
//!   collaborator.

use thiserror::Error;

use crate::identity::{SerialNumber, TaskId};

/// Top-level error type for the terminal fleet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FleetError {
    /// A device with this serial is already registered.
    #[error("device {serial} is already registered")]
    DuplicateSerial {
        /// The conflicting serial.
        serial: SerialNumber,
    },

    /// No device with this serial exists in the registry.
    #[error("device {serial} is not registered")]
    UnknownSerial {
        /// The serial that failed to resolve.
        serial: SerialNumber,
    },

    /// The device cannot be removed while an open task references it.
    #[error("device {serial} is referenced by open task {task_id}")]
    DeviceInUse {
        /// The device that was to be removed.
        serial: SerialNumber,
        /// The open task holding the reference.
        task_id: TaskId,
    },

    /// Another open task already references this serial.
    #[error("device {serial} is already bound to open task {task_id}")]
    DeviceAlreadyBound {
        /// The contested serial.
        serial: SerialNumber,
        /// The open task that already holds it.
        task_id: TaskId,
    },

    /// The device exists but cannot be installed in its current status.
    #[error("device {serial} is not available for binding (status {status})")]
    DeviceUnavailable {
        /// The device that was requested.
        serial: SerialNumber,
        /// Its current status.
        status: String,
    },

    /// Required provisioning fields were missing or empty.
    #[error("incomplete provisioning data: missing {}", missing.join(", "))]
    IncompleteProvisioningData {
        /// Names of the missing fields.
        missing: Vec<String>,
    },

    /// The requested transition is not legal for the task's kind and state.
    #[error("invalid {kind} transition: {from} -> {to}")]
    InvalidTransition {
        /// Task kind.
        kind: String,
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// The release reference of an exchange or retrieval does not resolve.
    #[error("unresolved release of {serial}: {reason}")]
    UnresolvedRelease {
        /// The serial that was to be released.
        serial: SerialNumber,
        /// Why it could not be resolved.
        reason: String,
    },

    /// An exchange failed half-way and its first step was rolled back.
    #[error("exchange of {released} for {bound} failed and was rolled back: {reason}")]
    PartialExchangeFailure {
        /// The unit that was being released.
        released: SerialNumber,
        /// The unit that was being activated.
        bound: SerialNumber,
        /// The underlying failure of the second step.
        reason: String,
    },

    /// No task with this id exists.
    #[error("task {id} not found")]
    UnknownTask {
        /// The missing task id.
        id: TaskId,
    },

    /// The reason code is not in the configured reason list for this kind.
    #[error("unknown reason code {code:?} for {kind}")]
    UnknownReason {
        /// The rejected reason code.
        code: String,
        /// The task kind it was submitted for.
        kind: String,
    },

    /// Input failed basic validation (empty names, malformed identifiers).
    #[error("validation error: {0}")]
    Validation(String),

    /// The persistence collaborator failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl FleetError {
    /// Build an `IncompleteProvisioningData` error from field names.
    pub fn incomplete<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::IncompleteProvisioningData {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }

    /// Machine-readable code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateSerial { .. } => "DUPLICATE_SERIAL",
            Self::UnknownSerial { .. } => "UNKNOWN_SERIAL",
            Self::DeviceInUse { .. } => "DEVICE_IN_USE",
            Self::DeviceAlreadyBound { .. } => "DEVICE_ALREADY_BOUND",
            Self::DeviceUnavailable { .. } => "DEVICE_UNAVAILABLE",
            Self::IncompleteProvisioningData { .. } => "INCOMPLETE_PROVISIONING_DATA",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::UnresolvedRelease { .. } => "UNRESOLVED_RELEASE",
            Self::PartialExchangeFailure { .. } => "PARTIAL_EXCHANGE_FAILURE",
            Self::UnknownTask { .. } => "UNKNOWN_TASK",
            Self::UnknownReason { .. } => "UNKNOWN_REASON",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serial(s: &str) -> SerialNumber {
        SerialNumber::new(s).unwrap()
    }

    #[test]
    fn test_incomplete_lists_missing_fields() {
        let err = FleetError::incomplete(["asset_tag", "provisioning_code"]);
        assert_eq!(
            err.to_string(),
            "incomplete provisioning data: missing asset_tag, provisioning_code"
        );
        assert_eq!(err.code(), "INCOMPLETE_PROVISIONING_DATA");
    }

    #[test]
    fn test_display_carries_serial_and_task() {
        let task_id = TaskId::new();
        let err = FleetError::DeviceAlreadyBound {
            serial: serial("SN002"),
            task_id,
        };
        let msg = err.to_string();
        assert!(msg.contains("SN002"));
        assert!(msg.contains(&task_id.to_string()));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = FleetError::InvalidTransition {
            kind: "RETRIEVAL".into(),
            from: "READY_FOR_PROVISIONING".into(),
            to: "OTP_ISSUED".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid RETRIEVAL transition: READY_FOR_PROVISIONING -> OTP_ISSUED"
        );
    }

    #[test]
    fn test_codes_are_distinct() {
        let id = TaskId::new();
        let all = [
            FleetError::DuplicateSerial { serial: serial("A") },
            FleetError::UnknownSerial { serial: serial("A") },
            FleetError::DeviceInUse { serial: serial("A"), task_id: id },
            FleetError::DeviceAlreadyBound { serial: serial("A"), task_id: id },
            FleetError::DeviceUnavailable { serial: serial("A"), status: "ACTIVE".into() },
            FleetError::incomplete(["x"]),
            FleetError::InvalidTransition { kind: "k".into(), from: "a".into(), to: "b".into() },
            FleetError::UnresolvedRelease { serial: serial("A"), reason: "r".into() },
            FleetError::PartialExchangeFailure {
                released: serial("A"),
                bound: serial("B"),
                reason: "r".into(),
            },
            FleetError::UnknownTask { id },
            FleetError::UnknownReason { code: "c".into(), kind: "k".into() },
            FleetError::Validation("v".into()),
            FleetError::Storage("s".into()),
        ];
        let mut codes: Vec<&str> = all.iter().map(FleetError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
