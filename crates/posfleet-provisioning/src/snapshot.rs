//! # Ledger Snapshots
//!
//! The persisted layout is two keyed collections:
//!
//! ```json
//! { "devices": { "<serial>": { ... } }, "tasks": { "<uuid>": { ... } } }
//! ```
//!
//! Importing a snapshot re-checks the invariants the live fleet maintains,
//! because the file may have been edited by hand: keys match records, each
//! task state lies on its kind's path, open-task references resolve and
//! single ownership holds.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use posfleet_core::{FleetError, SerialNumber, TaskId};
use posfleet_state::{Device, Task};

use crate::config::FleetConfig;
use crate::pipeline::TaskPipeline;
use crate::reconcile::Fleet;
use crate::registry::{DeviceRegistry, DeviceStore};

/// Serializable copy of the whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    #[serde(default)]
    pub devices: BTreeMap<SerialNumber, Device>,
    #[serde(default)]
    pub tasks: BTreeMap<TaskId, Task>,
}

impl FleetSnapshot {
    /// Every invariant violation found, as operator-readable lines.
    pub fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();

        for (key, device) in &self.devices {
            if key != device.serial_number() {
                out.push(format!(
                    "device key {key} does not match serial {}",
                    device.serial_number()
                ));
            }
            if device.history().is_empty() {
                out.push(format!("device {key} has no history"));
            }
        }

        let mut owners: HashMap<&SerialNumber, TaskId> = HashMap::new();
        for (key, task) in &self.tasks {
            if *key != task.id() {
                out.push(format!("task key {key} does not match id {}", task.id()));
            }
            if task.release_binding().is_some() != task.kind().releases_device() {
                out.push(format!(
                    "{} ({}) has an inconsistent release binding",
                    task.id(),
                    task.kind()
                ));
            }
            if !task.kind().reaches(task.state()) {
                out.push(format!(
                    "{} ({}) is in state {}, which its kind never reaches",
                    task.id(),
                    task.kind(),
                    task.state()
                ));
            }
            if !task.is_open() {
                continue;
            }
            if let Some(binding) = task.device_binding() {
                match self.devices.get(&binding.serial_number) {
                    None => out.push(format!(
                        "{} binds unregistered device {}",
                        task.id(),
                        binding.serial_number
                    )),
                    Some(device) if device.asset_tag() != &binding.asset_tag => {
                        out.push(format!(
                            "{} binds {} with asset tag {}, registry has {}",
                            task.id(),
                            binding.serial_number,
                            binding.asset_tag,
                            device.asset_tag()
                        ))
                    }
                    Some(_) => {}
                }
            }
            if let Some(release) = task.release_binding() {
                if !self.devices.contains_key(release) {
                    out.push(format!(
                        "{} releases unregistered device {release}",
                        task.id()
                    ));
                }
            }
            for serial in task.referenced_serials() {
                if let Some(other) = owners.insert(serial, task.id()) {
                    if other != task.id() {
                        out.push(format!(
                            "device {serial} is referenced by open tasks {other} and {}",
                            task.id()
                        ));
                    }
                }
            }
        }
        out
    }

    /// Fail with the collected violations, if any.
    pub fn validate(&self) -> Result<(), FleetError> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(FleetError::Validation(violations.join("; ")))
        }
    }

    /// Read a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self, FleetError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FleetError::Storage(format!("failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| FleetError::Storage(format!("failed to parse {}: {e}", path.display())))
    }

    /// Write the snapshot as pretty JSON, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<(), FleetError> {
        let storage = |e: std::io::Error| {
            FleetError::Storage(format!("failed to write {}: {e}", path.display()))
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(storage)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| FleetError::Storage(format!("failed to encode snapshot: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(storage)?;
        std::fs::rename(&tmp, path).map_err(storage)?;
        Ok(())
    }

    /// Validate and load into an in-memory fleet.
    pub fn into_fleet(self, config: FleetConfig) -> Result<Fleet, FleetError> {
        self.validate()?;
        let mut devices = DeviceRegistry::new();
        for device in self.devices.into_values() {
            devices.insert(device)?;
        }
        let mut tasks = TaskPipeline::new();
        for task in self.tasks.into_values() {
            tasks.insert(task);
        }
        Ok(Fleet::from_parts(devices, tasks, config))
    }
}

impl<S: DeviceStore> Fleet<S> {
    /// Copy the current ledger into a snapshot.
    pub fn snapshot(&self) -> Result<FleetSnapshot, FleetError> {
        self.read_ledger(|ledger| {
            let devices = ledger
                .devices
                .list(&Default::default())?
                .into_iter()
                .map(|d| (d.serial_number().clone(), d))
                .collect();
            let tasks = ledger.tasks.iter().map(|t| (t.id(), t.clone())).collect();
            Ok(FleetSnapshot { devices, tasks })
        })
    }
}
