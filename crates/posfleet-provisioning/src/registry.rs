//! # Device Registry
//!
//! Source of truth for every physical unit. The registry is a keyed
//! collection of [`Device`] records and knows nothing about tasks; rules
//! that involve tasks are enforced by [`crate::Fleet`].
//!
//! [`DeviceStore`] is the persistence seam. [`DeviceRegistry`] is the
//! in-memory implementation used by the service and the CLI.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use posfleet_core::{FleetError, SerialNumber};
use posfleet_state::{Device, DeviceStatus};

/// Optional predicates for listing devices. All comparisons are
/// case-insensitive; absent predicates match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFilter {
    pub status: Option<DeviceStatus>,
    /// Substring of the current holder.
    pub holder: Option<String>,
    /// Substring of the serial number or asset tag.
    pub query: Option<String>,
}

impl DeviceFilter {
    pub fn matches(&self, device: &Device) -> bool {
        if self.status.is_some_and(|s| s != device.status()) {
            return false;
        }
        if let Some(holder) = &self.holder {
            if !contains_ignore_case(device.current_holder(), holder) {
                return false;
            }
        }
        if let Some(q) = &self.query {
            if !contains_ignore_case(device.serial_number().as_str(), q)
                && !contains_ignore_case(device.asset_tag().as_str(), q)
            {
                return false;
            }
        }
        true
    }
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_lowercase()
        .contains(needle.trim().to_lowercase().as_str())
}

/// Storage operations the reconciliation layer needs from the registry.
///
/// Every method may fail with [`FleetError::Storage`] when the backing
/// store is unreachable.
pub trait DeviceStore: Send + Sync {
    /// Fetch one device.
    fn get(&self, serial: &SerialNumber) -> Result<Option<Device>, FleetError>;

    /// Add a new device. Fails with `DuplicateSerial` if the serial exists.
    fn insert(&mut self, device: Device) -> Result<(), FleetError>;

    /// Devices matching `filter`, ordered by serial.
    fn list(&self, filter: &DeviceFilter) -> Result<Vec<Device>, FleetError>;

    /// Apply a custody change through [`Device::transition()`].
    fn transition(
        &mut self,
        serial: &SerialNumber,
        status: DeviceStatus,
        holder: &str,
        description: &str,
    ) -> Result<Device, FleetError>;

    /// Delete a device, returning the removed record.
    fn remove(&mut self, serial: &SerialNumber) -> Result<Device, FleetError>;

    /// Put back a record captured before a failed multi-step operation.
    fn restore(&mut self, device: Device) -> Result<(), FleetError>;
}

/// In-memory device registry keyed by serial.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceRegistry {
    devices: BTreeMap<SerialNumber, Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterate all devices in serial order.
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }
}

impl DeviceStore for DeviceRegistry {
    fn get(&self, serial: &SerialNumber) -> Result<Option<Device>, FleetError> {
        Ok(self.devices.get(serial).cloned())
    }

    fn insert(&mut self, device: Device) -> Result<(), FleetError> {
        let serial = device.serial_number().clone();
        if self.devices.contains_key(&serial) {
            return Err(FleetError::DuplicateSerial { serial });
        }
        self.devices.insert(serial, device);
        Ok(())
    }

    fn list(&self, filter: &DeviceFilter) -> Result<Vec<Device>, FleetError> {
        Ok(self
            .devices
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }

    fn transition(
        &mut self,
        serial: &SerialNumber,
        status: DeviceStatus,
        holder: &str,
        description: &str,
    ) -> Result<Device, FleetError> {
        let device = self
            .devices
            .get_mut(serial)
            .ok_or_else(|| FleetError::UnknownSerial {
                serial: serial.clone(),
            })?;
        device.transition(status, holder, description);
        Ok(device.clone())
    }

    fn remove(&mut self, serial: &SerialNumber) -> Result<Device, FleetError> {
        self.devices
            .remove(serial)
            .ok_or_else(|| FleetError::UnknownSerial {
                serial: serial.clone(),
            })
    }

    fn restore(&mut self, device: Device) -> Result<(), FleetError> {
        self.devices.insert(device.serial_number().clone(), device);
        Ok(())
    }
}
