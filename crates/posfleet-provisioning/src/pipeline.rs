//! # Task Pipeline
//!
//! Keyed collection of [`Task`] records plus the inbound payloads that open
//! them. The pipeline stores and queries; the state machine lives on
//! [`Task`] itself and cross-entity checks live in [`crate::Fleet`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use posfleet_core::{SerialNumber, TaskId, Timestamp};
use posfleet_state::{DeviceBinding, RegistrationDetails, Task, TaskKind, TaskState};

use crate::registry::contains_ignore_case;

// ─── Inbound triggers ────────────────────────────────────────────────

/// An approved merchant registration. Opens a `NEW_ACTIVATION`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationApproval {
    pub client_name: String,
    pub registration: RegistrationDetails,
    /// A unit chosen during registration, if any.
    pub device_binding: Option<DeviceBinding>,
    pub details: String,
}

/// A field or inside-sales request against an installed unit. Opens an
/// `EXCHANGE` or `RETRIEVAL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesRequest {
    pub kind: TaskKind,
    pub client_name: String,
    pub release_serial: SerialNumber,
    pub reason_code: String,
    pub details: String,
}

/// A shipment or material request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogisticsRequest {
    pub client_name: String,
    pub details: String,
}

// ─── Filter ──────────────────────────────────────────────────────────

/// Optional predicates for listing tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    pub kind: Option<TaskKind>,
    pub state: Option<TaskState>,
    /// Case-insensitive substring of the client name.
    pub client: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<Timestamp>,
    /// Inclusive upper bound on `created_at`.
    pub created_to: Option<Timestamp>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.kind.map_or(true, |k| k == task.kind())
            && self.state.map_or(true, |s| s == task.state())
            && self
                .client
                .as_deref()
                .map_or(true, |c| contains_ignore_case(task.client_name(), c))
            && self.created_from.map_or(true, |from| task.created_at() >= from)
            && self.created_to.map_or(true, |to| task.created_at() <= to)
    }
}

// ─── Pipeline ────────────────────────────────────────────────────────

/// In-memory task collection keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskPipeline {
    tasks: BTreeMap<TaskId, Task>,
}

impl TaskPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    pub(crate) fn insert(&mut self, task: Task) {
        self.tasks.insert(task.id(), task);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Tasks matching `filter`, newest first.
    pub fn list(&self, filter: &TaskFilter) -> Vec<Task> {
        let mut out: Vec<Task> = self
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        out
    }

    /// The open task referencing `serial`, ignoring `except`.
    pub fn open_holder_of(&self, serial: &SerialNumber, except: Option<TaskId>) -> Option<TaskId> {
        self.tasks
            .values()
            .filter(|t| t.is_open() && Some(t.id()) != except)
            .find(|t| t.references(serial))
            .map(Task::id)
    }
}
