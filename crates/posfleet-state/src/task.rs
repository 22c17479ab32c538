//! # Provisioning Task State Machine
//!
//! A task is one unit of provisioning work: activating a terminal at a new
//! merchant, exchanging or retrieving an installed one, or shipping
//! material. Every kind walks a subgraph of the same five states:
//!
//! ```text
//! NEW_ACTIVATION, EXCHANGE:
//!   REQUESTED ──▶ READY_FOR_PROVISIONING ──▶ OTP_ISSUED ──▶ COMPLETED
//!
//! RETRIEVAL:
//!   REQUESTED ──▶ READY_FOR_PROVISIONING ──▶ COMPLETED
//!
//! SHIPMENT_REQUEST, MATERIAL_REQUEST:
//!   REQUESTED ──▶ PENDING_SHIPMENT ──▶ COMPLETED
//! ```
//!
//! `COMPLETED` is terminal. Every other edge is rejected with
//! [`TransitionError::InvalidTransition`] and the task is left unchanged.
//!
//! This module knows nothing about the device registry. Checks that need
//! the registry (is the release serial installed? is the bound unit free?)
//! live in the reconciliation layer, which calls the `check_*`/`plan_*`
//! methods here before it touches any device and the mutating methods only
//! after every check passed.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use posfleet_core::{AssetTag, FleetError, SerialNumber, TaskId, Timestamp};

// ─── Task Kind ───────────────────────────────────────────────────────

/// The kind of provisioning work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    /// Install a terminal at a newly approved merchant.
    NewActivation,
    /// Swap an installed terminal for another one.
    Exchange,
    /// Pull an installed terminal back from a merchant.
    Retrieval,
    /// Send consumables (paper rolls, chargers) to a merchant.
    MaterialRequest,
    /// Ship a terminal to a merchant without a field visit.
    ShipmentRequest,
}

impl TaskKind {
    /// All kinds, in declaration order.
    pub const ALL: [TaskKind; 5] = [
        Self::NewActivation,
        Self::Exchange,
        Self::Retrieval,
        Self::MaterialRequest,
        Self::ShipmentRequest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewActivation => "NEW_ACTIVATION",
            Self::Exchange => "EXCHANGE",
            Self::Retrieval => "RETRIEVAL",
            Self::MaterialRequest => "MATERIAL_REQUEST",
            Self::ShipmentRequest => "SHIPMENT_REQUEST",
        }
    }

    /// The legal edges of this kind's subgraph.
    pub fn legal_edges(self) -> &'static [(TaskState, TaskState)] {
        use TaskState::*;
        match self {
            Self::NewActivation | Self::Exchange => &[
                (Requested, ReadyForProvisioning),
                (ReadyForProvisioning, OtpIssued),
                (OtpIssued, Completed),
            ],
            Self::Retrieval => &[
                (Requested, ReadyForProvisioning),
                (ReadyForProvisioning, Completed),
            ],
            Self::ShipmentRequest | Self::MaterialRequest => {
                &[(Requested, PendingShipment), (PendingShipment, Completed)]
            }
        }
    }

    /// Whether `from -> to` is a legal edge for this kind.
    pub fn allows(self, from: TaskState, to: TaskState) -> bool {
        self.legal_edges().contains(&(from, to))
    }

    /// Whether `state` lies on this kind's path from `REQUESTED`.
    pub fn reaches(self, state: TaskState) -> bool {
        state == TaskState::Requested || self.legal_edges().iter().any(|&(_, to)| to == state)
    }

    /// Kinds that must carry a provisioning code before `OTP_ISSUED`.
    pub fn requires_provisioning_code(self) -> bool {
        matches!(self, Self::NewActivation | Self::Exchange)
    }

    /// Kinds that free an installed unit (and so carry a release binding).
    pub fn releases_device(self) -> bool {
        matches!(self, Self::Exchange | Self::Retrieval)
    }

    /// Kinds handled by logistics rather than a field visit.
    pub fn is_logistics(self) -> bool {
        matches!(self, Self::MaterialRequest | Self::ShipmentRequest)
    }

    /// The state `issue_provisioning` moves this kind to.
    pub fn provisioning_target(self) -> TaskState {
        match self {
            Self::Retrieval => TaskState::Completed,
            _ => TaskState::OtpIssued,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == upper)
            .ok_or_else(|| FleetError::Validation(format!("unknown task kind {s:?}")))
    }
}

// ─── Task State ──────────────────────────────────────────────────────

/// Position of a task in its workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Requested,
    ReadyForProvisioning,
    OtpIssued,
    PendingShipment,
    /// Terminal.
    Completed,
}

impl TaskState {
    pub const ALL: [TaskState; 5] = [
        Self::Requested,
        Self::ReadyForProvisioning,
        Self::OtpIssued,
        Self::PendingShipment,
        Self::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::ReadyForProvisioning => "READY_FOR_PROVISIONING",
            Self::OtpIssued => "OTP_ISSUED",
            Self::PendingShipment => "PENDING_SHIPMENT",
            Self::Completed => "COMPLETED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == upper)
            .ok_or_else(|| FleetError::Validation(format!("unknown task state {s:?}")))
    }
}

// ─── Requester ───────────────────────────────────────────────────────

/// Role of the person who opened a task, taken from the session context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequesterRole {
    FieldAgent,
    InsideSales,
    Logistics,
    Admin,
}

impl RequesterRole {
    pub const ALL: [RequesterRole; 4] =
        [Self::FieldAgent, Self::InsideSales, Self::Logistics, Self::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FieldAgent => "FIELD_AGENT",
            Self::InsideSales => "INSIDE_SALES",
            Self::Logistics => "LOGISTICS",
            Self::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for RequesterRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequesterRole {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == upper)
            .ok_or_else(|| FleetError::Validation(format!("unknown requester role {s:?}")))
    }
}

/// Who opened a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub name: String,
    pub role: RequesterRole,
}

// ─── Bindings and Payloads ───────────────────────────────────────────

/// The unit a task installs (or, for a retrieval, collects).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBinding {
    pub serial_number: SerialNumber,
    pub asset_tag: AssetTag,
}

/// Merchant registration data carried by a new activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationDetails {
    pub document_number: String,
    pub address: String,
    pub plan: String,
}

/// Operator-supplied provisioning form. Fields arrive raw; blank values
/// count as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningInput {
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub asset_tag: Option<String>,
    #[serde(default)]
    pub provisioning_code: Option<String>,
}

/// A validated provisioning step, ready to apply once the registry side
/// effects have succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningPlan {
    pub binding: DeviceBinding,
    pub provisioning_code: Option<String>,
    pub target: TaskState,
}

/// Everything needed to open a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub kind: TaskKind,
    pub client_name: String,
    pub requester: Requester,
    pub details: String,
    pub device_binding: Option<DeviceBinding>,
    pub release_binding: Option<SerialNumber>,
    pub reason_code: Option<String>,
    pub registration: Option<RegistrationDetails>,
}

impl NewTask {
    /// A bare request of `kind` with no bindings.
    pub fn new(kind: TaskKind, client_name: impl Into<String>, requester: Requester) -> Self {
        Self {
            kind,
            client_name: client_name.into(),
            requester,
            details: String::new(),
            device_binding: None,
            release_binding: None,
            reason_code: None,
            registration: None,
        }
    }
}

/// Record of one task state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTransitionRecord {
    pub from_state: TaskState,
    pub to_state: TaskState,
    pub timestamp: Timestamp,
    pub note: String,
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by the task state machine itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The edge is not in the kind's table.
    #[error("invalid {kind} transition: {from} -> {to}")]
    InvalidTransition {
        kind: TaskKind,
        from: TaskState,
        to: TaskState,
    },

    /// The task is completed and accepts no further mutation.
    #[error("{kind} task is in terminal state {state}, cannot move to {to}")]
    TerminalState {
        kind: TaskKind,
        state: TaskState,
        to: TaskState,
    },

    /// Required fields were blank or absent.
    #[error("incomplete provisioning data: missing {}", missing.join(", "))]
    Incomplete { missing: Vec<&'static str> },

    /// A supplied identifier failed validation.
    #[error("malformed provisioning data: {0}")]
    Malformed(String),
}

impl From<TransitionError> for FleetError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { kind, from, to } => FleetError::InvalidTransition {
                kind: kind.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            },
            TransitionError::TerminalState { kind, state, to } => FleetError::InvalidTransition {
                kind: kind.to_string(),
                from: state.to_string(),
                to: to.to_string(),
            },
            TransitionError::Incomplete { missing } => FleetError::incomplete(missing),
            TransitionError::Malformed(msg) => FleetError::Validation(msg),
        }
    }
}

// ─── Task ────────────────────────────────────────────────────────────

/// A provisioning task.
///
/// State, bindings and the transition log only change through the named
/// operations below; each validates first and mutates only on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    kind: TaskKind,
    state: TaskState,
    client_name: String,
    requester: Requester,
    created_at: Timestamp,
    updated_at: Timestamp,
    #[serde(default)]
    device_binding: Option<DeviceBinding>,
    #[serde(default)]
    release_binding: Option<SerialNumber>,
    #[serde(default)]
    provisioning_code: Option<String>,
    #[serde(default)]
    reason_code: Option<String>,
    #[serde(default)]
    registration: Option<RegistrationDetails>,
    #[serde(default)]
    details: String,
    #[serde(default)]
    transitions: Vec<TaskTransitionRecord>,
}

impl Task {
    /// Open a task in `REQUESTED`.
    pub fn open(new: NewTask) -> Self {
        let now = Timestamp::now();
        Self {
            id: TaskId::new(),
            kind: new.kind,
            state: TaskState::Requested,
            client_name: new.client_name.trim().to_string(),
            requester: new.requester,
            created_at: now,
            updated_at: now,
            device_binding: new.device_binding,
            release_binding: new.release_binding,
            provisioning_code: None,
            reason_code: new.reason_code,
            registration: new.registration,
            details: new.details,
            transitions: Vec::new(),
        }
    }

    // ── Guards ──────────────────────────────────────────────────────

    /// Validate `REQUESTED → READY_FOR_PROVISIONING` without mutating.
    pub fn check_ready(&self) -> Result<(), TransitionError> {
        self.require_edge(TaskState::ReadyForProvisioning)?;
        if self.client_name.is_empty() {
            return Err(TransitionError::Incomplete {
                missing: vec!["client_name"],
            });
        }
        Ok(())
    }

    /// Validate a provisioning form against this task without mutating.
    ///
    /// Blank form fields fall back to a binding chosen at creation. The
    /// provisioning code is required only for kinds that issue one.
    pub fn plan_provisioning(
        &self,
        input: &ProvisioningInput,
    ) -> Result<ProvisioningPlan, TransitionError> {
        let target = self.kind.provisioning_target();
        self.require_edge(target)?;

        let pre_bound = self.device_binding.as_ref();
        let serial = non_blank(input.serial_number.as_deref())
            .or_else(|| pre_bound.map(|b| b.serial_number.as_str().to_string()));
        let tag = non_blank(input.asset_tag.as_deref())
            .or_else(|| pre_bound.map(|b| b.asset_tag.as_str().to_string()));
        let code = non_blank(input.provisioning_code.as_deref());

        let mut missing = Vec::new();
        if serial.is_none() {
            missing.push("serial_number");
        }
        if tag.is_none() {
            missing.push("asset_tag");
        }
        if code.is_none() && self.kind.requires_provisioning_code() {
            missing.push("provisioning_code");
        }
        let (Some(serial), Some(tag)) = (serial, tag) else {
            return Err(TransitionError::Incomplete { missing });
        };
        if !missing.is_empty() {
            return Err(TransitionError::Incomplete { missing });
        }

        let binding = DeviceBinding {
            serial_number: SerialNumber::new(serial)
                .map_err(|e| TransitionError::Malformed(e.to_string()))?,
            asset_tag: AssetTag::new(tag).map_err(|e| TransitionError::Malformed(e.to_string()))?,
        };
        Ok(ProvisioningPlan {
            binding,
            provisioning_code: code,
            target,
        })
    }

    /// Validate `* → PENDING_SHIPMENT` without mutating.
    pub fn check_shipment(&self) -> Result<(), TransitionError> {
        self.require_edge(TaskState::PendingShipment)
    }

    /// Validate `* → COMPLETED` without mutating.
    ///
    /// A retrieval collects its unit through provisioning; completing one
    /// directly requires that a binding already exists.
    pub fn check_completion(&self) -> Result<(), TransitionError> {
        self.require_edge(TaskState::Completed)?;
        if self.kind == TaskKind::Retrieval && self.device_binding.is_none() {
            return Err(TransitionError::Incomplete {
                missing: vec!["serial_number", "asset_tag"],
            });
        }
        Ok(())
    }

    // ── Transitions ─────────────────────────────────────────────────

    /// REQUESTED → READY_FOR_PROVISIONING.
    pub fn mark_ready(&mut self, note: &str) -> Result<(), TransitionError> {
        self.check_ready()?;
        self.do_transition(TaskState::ReadyForProvisioning, note);
        Ok(())
    }

    /// Record the binding and code of a plan from [`Task::plan_provisioning()`]
    /// and move to its target state.
    pub fn apply_provisioning(
        &mut self,
        plan: ProvisioningPlan,
        note: &str,
    ) -> Result<(), TransitionError> {
        self.require_edge(plan.target)?;
        self.device_binding = Some(plan.binding);
        if plan.provisioning_code.is_some() {
            self.provisioning_code = plan.provisioning_code;
        }
        self.do_transition(plan.target, note);
        Ok(())
    }

    /// REQUESTED → PENDING_SHIPMENT.
    pub fn queue_shipment(&mut self, note: &str) -> Result<(), TransitionError> {
        self.check_shipment()?;
        self.do_transition(TaskState::PendingShipment, note);
        Ok(())
    }

    /// * → COMPLETED.
    pub fn complete(&mut self, note: &str) -> Result<(), TransitionError> {
        self.check_completion()?;
        self.do_transition(TaskState::Completed, note);
        Ok(())
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn device_binding(&self) -> Option<&DeviceBinding> {
        self.device_binding.as_ref()
    }

    pub fn release_binding(&self) -> Option<&SerialNumber> {
        self.release_binding.as_ref()
    }

    pub fn provisioning_code(&self) -> Option<&str> {
        self.provisioning_code.as_deref()
    }

    pub fn reason_code(&self) -> Option<&str> {
        self.reason_code.as_deref()
    }

    pub fn registration(&self) -> Option<&RegistrationDetails> {
        self.registration.as_ref()
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn transitions(&self) -> &[TaskTransitionRecord] {
        &self.transitions
    }

    /// Not yet completed.
    pub fn is_open(&self) -> bool {
        !self.state.is_terminal()
    }

    /// Whether this task names `serial` as its bound or released unit.
    pub fn references(&self, serial: &SerialNumber) -> bool {
        self.device_binding
            .as_ref()
            .is_some_and(|b| &b.serial_number == serial)
            || self.release_binding.as_ref() == Some(serial)
    }

    /// Every serial this task references.
    pub fn referenced_serials(&self) -> impl Iterator<Item = &SerialNumber> {
        self.device_binding
            .as_ref()
            .map(|b| &b.serial_number)
            .into_iter()
            .chain(self.release_binding.as_ref())
    }

    // ── Internal ────────────────────────────────────────────────────

    fn require_edge(&self, to: TaskState) -> Result<(), TransitionError> {
        if self.state.is_terminal() {
            return Err(TransitionError::TerminalState {
                kind: self.kind,
                state: self.state,
                to,
            });
        }
        if !self.kind.allows(self.state, to) {
            return Err(TransitionError::InvalidTransition {
                kind: self.kind,
                from: self.state,
                to,
            });
        }
        Ok(())
    }

    fn do_transition(&mut self, to: TaskState, note: &str) {
        let now = Timestamp::now();
        self.transitions.push(TaskTransitionRecord {
            from_state: self.state,
            to_state: to,
            timestamp: now,
            note: note.to_string(),
        });
        self.state = to;
        self.updated_at = now;
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ─── Tests ───────────────────────────────────────────────────────────
