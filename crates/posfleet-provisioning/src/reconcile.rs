//! # Reconciliation Layer
//!
//! [`Fleet`] is the command/query surface over the device registry and the
//! task pipeline. It owns the rules that span both:
//!
//! - **Single ownership.** A serial is referenced (bound or released) by at
//!   most one open task. Checked at creation and at binding.
//! - **Availability.** Only `IN_STOCK` or `WITH_FIELD_AGENT` units can be
//!   bound for installation.
//! - **Release resolution.** Exchanges and retrievals must point at a
//!   registered unit that is not already back in stock.
//! - **Atomic exchange.** Completing an exchange releases the old unit and
//!   activates the new one. If the second step fails the first is undone
//!   and the task stays where it was.
//!
//! ## Locking
//!
//! Registry and pipeline live together in one [`Ledger`] behind a
//! `parking_lot::RwLock`. Every command holds the write lock for its whole
//! check-then-act sequence; queries take the read lock and return clones.
//! The lock is never held across `.await`. Completion hooks run after the
//! lock is released.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info, warn};

use posfleet_core::{AssetTag, FleetError, SerialNumber, TaskId};
use posfleet_state::{
    Device, DeviceBinding, DeviceStatus, NewTask, ProvisioningInput, Requester, Task, TaskKind,
    TaskState, TransitionError,
};

use crate::config::FleetConfig;
use crate::notify::{CompletionHook, TaskCompleted};
use crate::pipeline::{LogisticsRequest, RegistrationApproval, SalesRequest, TaskFilter, TaskPipeline};
use crate::registry::{DeviceFilter, DeviceRegistry, DeviceStore};

/// Registry and pipeline, guarded together.
#[derive(Debug)]
pub struct Ledger<S> {
    pub(crate) devices: S,
    pub(crate) tasks: TaskPipeline,
}

/// Warehouse intake form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterDevice {
    pub serial_number: SerialNumber,
    pub asset_tag: AssetTag,
    pub model: String,
    pub status: DeviceStatus,
    pub holder: String,
}

/// Thread-safe, cloneable handle on the fleet.
pub struct Fleet<S: DeviceStore = DeviceRegistry> {
    ledger: Arc<RwLock<Ledger<S>>>,
    config: Arc<FleetConfig>,
    hooks: Arc<RwLock<Vec<Arc<dyn CompletionHook>>>>,
}

impl<S: DeviceStore> Clone for Fleet<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            config: Arc::clone(&self.config),
            hooks: Arc::clone(&self.hooks),
        }
    }
}

impl<S: DeviceStore> std::fmt::Debug for Fleet<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fleet")
            .field("config", &self.config)
            .field("hooks", &self.hooks.read().len())
            .finish_non_exhaustive()
    }
}

impl Fleet<DeviceRegistry> {
    /// An empty in-memory fleet.
    pub fn new(config: FleetConfig) -> Self {
        Self::with_store(DeviceRegistry::new(), config)
    }
}

impl<S: DeviceStore> Fleet<S> {
    /// A fleet over an existing device store with no tasks.
    pub fn with_store(devices: S, config: FleetConfig) -> Self {
        Self::from_parts(devices, TaskPipeline::new(), config)
    }

    pub(crate) fn from_parts(devices: S, tasks: TaskPipeline, config: FleetConfig) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(Ledger { devices, tasks })),
            config: Arc::new(config),
            hooks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a hook fired on every task completion.
    pub fn add_hook(&self, hook: Arc<dyn CompletionHook>) {
        self.hooks.write().push(hook);
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    // ── Device registry ─────────────────────────────────────────────

    /// Take a new unit into the registry.
    pub fn register_device(&self, req: RegisterDevice) -> Result<Device, FleetError> {
        self.command("register_device", |ledger, _| {
            let holder = required("holder", &req.holder)?;
            let device = Device::intake(
                req.serial_number,
                req.asset_tag,
                req.model.trim(),
                req.status,
                holder,
            );
            ledger.devices.insert(device.clone())?;
            info!(
                serial = %device.serial_number(),
                asset_tag = %device.asset_tag(),
                status = %device.status(),
                holder = %device.current_holder(),
                "device registered"
            );
            Ok(device)
        })
    }

    pub fn get_device(&self, serial: &SerialNumber) -> Result<Device, FleetError> {
        self.ledger
            .read()
            .devices
            .get(serial)?
            .ok_or_else(|| FleetError::UnknownSerial {
                serial: serial.clone(),
            })
    }

    pub fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, FleetError> {
        self.ledger.read().devices.list(filter)
    }

    /// Manual custody change by warehouse staff.
    pub fn transition_device(
        &self,
        serial: &SerialNumber,
        status: DeviceStatus,
        holder: &str,
        description: &str,
    ) -> Result<Device, FleetError> {
        self.command("transition_device", |ledger, _| {
            let holder = required("holder", holder)?;
            move_device(&mut ledger.devices, serial, status, holder, description.trim())
        })
    }

    /// Decommission a unit. Refused while an open task references it.
    pub fn remove_device(&self, serial: &SerialNumber) -> Result<Device, FleetError> {
        self.command("remove_device", |ledger, _| {
            if ledger.devices.get(serial)?.is_none() {
                return Err(FleetError::UnknownSerial {
                    serial: serial.clone(),
                });
            }
            if let Some(task_id) = ledger.tasks.open_holder_of(serial, None) {
                return Err(FleetError::DeviceInUse {
                    serial: serial.clone(),
                    task_id,
                });
            }
            let removed = ledger.devices.remove(serial)?;
            info!(serial = %serial, "device removed");
            Ok(removed)
        })
    }

    // ── Task creation ───────────────────────────────────────────────

    /// Open a `NEW_ACTIVATION` for an approved merchant registration.
    pub fn open_activation(
        &self,
        approval: RegistrationApproval,
        requester: Requester,
    ) -> Result<Task, FleetError> {
        self.command("open_activation", |ledger, _| {
            let requester = validated_requester(requester)?;
            if let Some(binding) = &approval.device_binding {
                check_bindable(ledger, binding, None)?;
            }
            let task = Task::open(NewTask {
                kind: TaskKind::NewActivation,
                client_name: approval.client_name,
                requester,
                details: approval.details,
                device_binding: approval.device_binding,
                release_binding: None,
                reason_code: None,
                registration: Some(approval.registration),
            });
            Ok(insert_task(ledger, task))
        })
    }

    /// Open an `EXCHANGE` or `RETRIEVAL` against an installed unit.
    pub fn open_sales_request(
        &self,
        req: SalesRequest,
        requester: Requester,
    ) -> Result<Task, FleetError> {
        self.command("open_sales_request", |ledger, config| {
            let requester = validated_requester(requester)?;
            if !req.kind.releases_device() {
                return Err(FleetError::Validation(format!(
                    "{} cannot be opened as a sales request",
                    req.kind
                )));
            }
            let reason = config
                .reason(&req.reason_code, req.kind)
                .ok_or_else(|| FleetError::UnknownReason {
                    code: req.reason_code.clone(),
                    kind: req.kind.to_string(),
                })?;
            if ledger.devices.get(&req.release_serial)?.is_none() {
                return Err(FleetError::UnresolvedRelease {
                    serial: req.release_serial,
                    reason: "device is not registered".into(),
                });
            }
            if let Some(task_id) = ledger.tasks.open_holder_of(&req.release_serial, None) {
                return Err(FleetError::DeviceAlreadyBound {
                    serial: req.release_serial,
                    task_id,
                });
            }
            let task = Task::open(NewTask {
                kind: req.kind,
                client_name: req.client_name,
                requester,
                details: req.details,
                device_binding: None,
                release_binding: Some(req.release_serial),
                reason_code: Some(reason.code.clone()),
                registration: None,
            });
            Ok(insert_task(ledger, task))
        })
    }

    /// Open a `SHIPMENT_REQUEST` or `MATERIAL_REQUEST`.
    pub fn open_logistics_request(
        &self,
        kind: TaskKind,
        req: LogisticsRequest,
        requester: Requester,
    ) -> Result<Task, FleetError> {
        self.command("open_logistics_request", |ledger, _| {
            let requester = validated_requester(requester)?;
            if !kind.is_logistics() {
                return Err(FleetError::Validation(format!(
                    "{kind} cannot be opened as a logistics request"
                )));
            }
            let mut new = NewTask::new(kind, req.client_name, requester);
            new.details = req.details;
            Ok(insert_task(ledger, Task::open(new)))
        })
    }

    // ── Task transitions ────────────────────────────────────────────

    /// `REQUESTED → READY_FOR_PROVISIONING`.
    pub fn mark_ready(&self, id: TaskId) -> Result<Task, FleetError> {
        self.command("mark_ready", |ledger, _| {
            let task = find_task(&ledger.tasks, id)?;
            task.check_ready()?;
            if task.kind().releases_device() {
                resolve_release(&ledger.devices, task)?;
            }
            let task = task_mut(&mut ledger.tasks, id)?;
            task.mark_ready("ready for provisioning")?;
            info!(task_id = %id, kind = %task.kind(), "task ready for provisioning");
            Ok(task.clone())
        })
    }

    /// Bind a unit and record the provisioning code.
    ///
    /// New activations install the bound unit immediately. Exchanges only
    /// record the binding; their devices move at completion. Retrievals
    /// collect the released unit and complete.
    pub fn issue_provisioning(
        &self,
        id: TaskId,
        input: &ProvisioningInput,
    ) -> Result<Task, FleetError> {
        let task = self.command("issue_provisioning", |ledger, config| {
            let task = find_task(&ledger.tasks, id)?.clone();
            let plan = task.plan_provisioning(input)?;
            let serial = plan.binding.serial_number.clone();

            let note = match task.kind() {
                TaskKind::NewActivation => {
                    check_bindable(ledger, &plan.binding, Some(id))?;
                    move_device(
                        &mut ledger.devices,
                        &serial,
                        DeviceStatus::Active,
                        task.client_name(),
                        &format!("activated at {} ({id})", task.client_name()),
                    )?;
                    "provisioning code issued"
                }
                TaskKind::Exchange => {
                    check_not_release(&task, &serial)?;
                    check_bindable(ledger, &plan.binding, Some(id))?;
                    "provisioning code issued"
                }
                TaskKind::Retrieval => {
                    let released = resolve_release(&ledger.devices, &task)?;
                    if released.serial_number() != &serial {
                        return Err(FleetError::UnresolvedRelease {
                            serial,
                            reason: format!(
                                "retrieval collects {}, not this unit",
                                released.serial_number()
                            ),
                        });
                    }
                    check_tag(&released, &plan.binding.asset_tag)?;
                    let requester = task.requester();
                    let (status, holder) = if config.keeps_retrieved_unit(requester.role) {
                        (DeviceStatus::WithFieldAgent, requester.name.as_str())
                    } else {
                        (DeviceStatus::InStock, config.warehouse_holder.as_str())
                    };
                    move_device(
                        &mut ledger.devices,
                        &serial,
                        status,
                        holder,
                        &format!("retrieved from {} ({id})", task.client_name()),
                    )?;
                    "unit collected"
                }
                kind @ (TaskKind::MaterialRequest | TaskKind::ShipmentRequest) => {
                    return Err(TransitionError::InvalidTransition {
                        kind,
                        from: task.state(),
                        to: plan.target,
                    }
                    .into());
                }
            };

            let task = task_mut(&mut ledger.tasks, id)?;
            task.apply_provisioning(plan, note)?;
            info!(
                task_id = %id,
                kind = %task.kind(),
                serial = %serial,
                state = %task.state(),
                "provisioning issued"
            );
            Ok(task.clone())
        })?;
        self.after_mutation(&task);
        Ok(task)
    }

    /// `REQUESTED → PENDING_SHIPMENT`.
    pub fn queue_shipment(&self, id: TaskId) -> Result<Task, FleetError> {
        self.command("queue_shipment", |ledger, _| {
            let task = task_mut(&mut ledger.tasks, id)?;
            task.queue_shipment("queued for shipment")?;
            info!(task_id = %id, kind = %task.kind(), "task queued for shipment");
            Ok(task.clone())
        })
    }

    /// Move a task to `COMPLETED`, applying exchange device effects.
    pub fn complete(&self, id: TaskId) -> Result<Task, FleetError> {
        let task = self.command("complete", |ledger, config| {
            let task = find_task(&ledger.tasks, id)?.clone();
            task.check_completion()?;
            if task.kind() == TaskKind::Exchange {
                swap_devices(ledger, config, &task)?;
            }
            let task = task_mut(&mut ledger.tasks, id)?;
            task.complete("completed")?;
            Ok(task.clone())
        })?;
        self.after_mutation(&task);
        Ok(task)
    }

    // ── Task queries ────────────────────────────────────────────────

    pub fn get_task(&self, id: TaskId) -> Result<Task, FleetError> {
        find_task(&self.ledger.read().tasks, id).cloned()
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        self.ledger.read().tasks.list(filter)
    }

    /// Read access to the whole ledger, for exports.
    pub(crate) fn read_ledger<R>(&self, f: impl FnOnce(&Ledger<S>) -> R) -> R {
        f(&self.ledger.read())
    }

    // ── Internal ────────────────────────────────────────────────────

    /// Run one command under the write lock, logging rejections.
    fn command<R>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Ledger<S>, &FleetConfig) -> Result<R, FleetError>,
    ) -> Result<R, FleetError> {
        let mut ledger = self.ledger.write();
        f(&mut ledger, &self.config).map_err(|err| {
            match &err {
                FleetError::Storage(_) | FleetError::PartialExchangeFailure { .. } => {
                    error!(op, code = err.code(), error = %err, "command failed");
                }
                _ => warn!(op, code = err.code(), error = %err, "command rejected"),
            }
            err
        })
    }

    /// Fire completion hooks. Called with the ledger lock released.
    fn after_mutation(&self, task: &Task) {
        if task.state() != TaskState::Completed {
            return;
        }
        metrics::counter!("posfleet_tasks_completed_total", "kind" => task.kind().as_str())
            .increment(1);
        let event = TaskCompleted {
            task_id: task.id(),
            kind: task.kind(),
            client_name: task.client_name().to_string(),
        };
        let hooks: Vec<Arc<dyn CompletionHook>> = self.hooks.read().clone();
        for hook in hooks {
            hook.on_completed(&event);
        }
    }
}

// ─── Rules ───────────────────────────────────────────────────────────

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, FleetError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FleetError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}

fn validated_requester(requester: Requester) -> Result<Requester, FleetError> {
    let name = required("requester_name", &requester.name)?.to_string();
    Ok(Requester {
        name,
        role: requester.role,
    })
}

fn insert_task<S>(ledger: &mut Ledger<S>, task: Task) -> Task {
    info!(
        task_id = %task.id(),
        kind = %task.kind(),
        client = %task.client_name(),
        requester = %task.requester().name,
        "task opened"
    );
    ledger.tasks.insert(task.clone());
    task
}

fn find_task(tasks: &TaskPipeline, id: TaskId) -> Result<&Task, FleetError> {
    tasks.get(&id).ok_or(FleetError::UnknownTask { id })
}

fn task_mut(tasks: &mut TaskPipeline, id: TaskId) -> Result<&mut Task, FleetError> {
    tasks.get_mut(&id).ok_or(FleetError::UnknownTask { id })
}

fn move_device<S: DeviceStore>(
    devices: &mut S,
    serial: &SerialNumber,
    status: DeviceStatus,
    holder: &str,
    description: &str,
) -> Result<Device, FleetError> {
    let device = devices.transition(serial, status, holder, description)?;
    record_transition(status);
    info!(serial = %serial, status = %status, holder, "device moved");
    Ok(device)
}

fn record_transition(status: DeviceStatus) {
    metrics::counter!("posfleet_device_transitions_total", "status" => status.as_str())
        .increment(1);
}

fn check_tag(device: &Device, tag: &AssetTag) -> Result<(), FleetError> {
    if device.asset_tag() != tag {
        return Err(FleetError::Validation(format!(
            "asset tag {tag} does not match {} registered for {}",
            device.asset_tag(),
            device.serial_number()
        )));
    }
    Ok(())
}

/// An exchange installs a different unit from the one it releases.
fn check_not_release(task: &Task, serial: &SerialNumber) -> Result<(), FleetError> {
    if task.release_binding() == Some(serial) {
        return Err(FleetError::Validation(format!(
            "{} releases {serial} and cannot also install it",
            task.id()
        )));
    }
    Ok(())
}

/// A unit may be bound when it exists, its tag matches, no other open task
/// references it, and it is available.
fn check_bindable<S: DeviceStore>(
    ledger: &Ledger<S>,
    binding: &DeviceBinding,
    task_id: Option<TaskId>,
) -> Result<Device, FleetError> {
    let serial = &binding.serial_number;
    let device = ledger
        .devices
        .get(serial)?
        .ok_or_else(|| FleetError::UnknownSerial {
            serial: serial.clone(),
        })?;
    check_tag(&device, &binding.asset_tag)?;
    if let Some(holder) = ledger.tasks.open_holder_of(serial, task_id) {
        return Err(FleetError::DeviceAlreadyBound {
            serial: serial.clone(),
            task_id: holder,
        });
    }
    if !device.is_available() {
        return Err(FleetError::DeviceUnavailable {
            serial: serial.clone(),
            status: device.status().to_string(),
        });
    }
    Ok(device)
}

/// The release serial of an exchange or retrieval, resolved against the
/// registry. A unit already in stock has nothing left to release.
fn resolve_release<S: DeviceStore>(devices: &S, task: &Task) -> Result<Device, FleetError> {
    let serial = task.release_binding().ok_or_else(|| {
        FleetError::Validation(format!("{} has no release binding", task.id()))
    })?;
    let device = devices
        .get(serial)?
        .ok_or_else(|| FleetError::UnresolvedRelease {
            serial: serial.clone(),
            reason: "device is not registered".into(),
        })?;
    if device.status() == DeviceStatus::InStock {
        return Err(FleetError::UnresolvedRelease {
            serial: serial.clone(),
            reason: format!("device is already IN_STOCK at {}", device.current_holder()),
        });
    }
    Ok(device)
}

/// Release the old unit and activate the new one, all-or-nothing.
fn swap_devices<S: DeviceStore>(
    ledger: &mut Ledger<S>,
    config: &FleetConfig,
    task: &Task,
) -> Result<(), FleetError> {
    let old = resolve_release(&ledger.devices, task)?;
    let binding = task
        .device_binding()
        .ok_or_else(|| FleetError::incomplete(["serial_number", "asset_tag"]))?;
    check_not_release(task, &binding.serial_number)?;
    let new = ledger
        .devices
        .get(&binding.serial_number)?
        .ok_or_else(|| FleetError::UnknownSerial {
            serial: binding.serial_number.clone(),
        })?;
    if !new.is_available() {
        return Err(FleetError::DeviceUnavailable {
            serial: binding.serial_number.clone(),
            status: new.status().to_string(),
        });
    }

    let released = old.serial_number().clone();
    let bound = binding.serial_number.clone();
    let id = task.id();

    // Counted only once both moves have committed.
    ledger.devices.transition(
        &released,
        DeviceStatus::InStock,
        &config.warehouse_holder,
        &format!("released by exchange ({id})"),
    )?;

    if let Err(err) = ledger.devices.transition(
        &bound,
        DeviceStatus::Active,
        task.client_name(),
        &format!("installed by exchange at {} ({id})", task.client_name()),
    ) {
        let mut reason = err.to_string();
        match ledger.devices.restore(old) {
            Ok(()) => warn!(task_id = %id, serial = %released, "exchange release rolled back"),
            Err(rollback) => {
                error!(task_id = %id, serial = %released, error = %rollback, "exchange rollback failed");
                reason = format!("{reason}; rollback failed: {rollback}");
            }
        }
        return Err(FleetError::PartialExchangeFailure {
            released,
            bound,
            reason,
        });
    }

    record_transition(DeviceStatus::InStock);
    record_transition(DeviceStatus::Active);
    info!(
        task_id = %id,
        released = %released,
        bound = %bound,
        holder = %task.client_name(),
        "exchange swapped devices"
    );
    Ok(())
}
