//! # Device Custody State
//!
//! Models where a physical terminal is and who holds it. A device has
//! exactly one `(status, holder)` pair at any instant, and the only way to
//! change it is [`Device::transition()`], which also appends to the
//! device's history.
//!
//! ## States
//!
//! ```text
//! IN_STOCK ◀──▶ WITH_FIELD_AGENT ◀──▶ ACTIVE (installed at a merchant)
//!     ▲               │                  │
//!     │               ▼                  ▼
//!     └────────── IN_TRANSIT          DEFECTIVE
//! ```
//!
//! Custody moves are not restricted to the arrows above: warehouse staff
//! correct mistakes by moving a unit anywhere. What the pipeline restricts
//! is *binding*: only `IN_STOCK` and `WITH_FIELD_AGENT` units can be
//! installed at a merchant.
//!
//! History is stored chronologically and never rewritten. Displays read it
//! newest-first via [`Device::history_newest_first()`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use posfleet_core::{AssetTag, FleetError, SerialNumber, Timestamp};

// ─── Device Status ───────────────────────────────────────────────────

/// Custody status of a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    /// On a warehouse shelf.
    InStock,
    /// Carried by a field agent, not yet installed.
    WithFieldAgent,
    /// Installed and operating at a merchant.
    Active,
    /// Broken; awaiting repair or write-off.
    Defective,
    /// Shipped between locations.
    InTransit,
}

impl DeviceStatus {
    /// All statuses, in declaration order.
    pub const ALL: [DeviceStatus; 5] = [
        Self::InStock,
        Self::WithFieldAgent,
        Self::Active,
        Self::Defective,
        Self::InTransit,
    ];

    /// Return the string representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InStock => "IN_STOCK",
            Self::WithFieldAgent => "WITH_FIELD_AGENT",
            Self::Active => "ACTIVE",
            Self::Defective => "DEFECTIVE",
            Self::InTransit => "IN_TRANSIT",
        }
    }

    /// Whether a unit in this status may be bound to a task and installed.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::InStock | Self::WithFieldAgent)
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = FleetError;

    /// Accepts the canonical `SCREAMING_SNAKE_CASE` names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == upper)
            .ok_or_else(|| FleetError::Validation(format!("unknown device status {s:?}")))
    }
}

// ─── History ─────────────────────────────────────────────────────────

/// One custody change of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Status after the change.
    pub status: DeviceStatus,
    /// Holder after the change.
    pub holder: String,
    /// Why the change happened.
    pub description: String,
    /// When it happened.
    pub timestamp: Timestamp,
}

// ─── Device ──────────────────────────────────────────────────────────

/// A physical terminal and its custody history.
///
/// Fields are private: status, holder and history only change together,
/// through [`Device::transition()`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    serial_number: SerialNumber,
    asset_tag: AssetTag,
    model: String,
    status: DeviceStatus,
    current_holder: String,
    last_updated: Timestamp,
    history: Vec<HistoryEntry>,
}

impl Device {
    /// Take a unit into the registry. The intake itself is the first
    /// history entry.
    pub fn intake(
        serial_number: SerialNumber,
        asset_tag: AssetTag,
        model: impl Into<String>,
        status: DeviceStatus,
        holder: impl Into<String>,
    ) -> Self {
        let now = Timestamp::now();
        let holder = holder.into();
        Self {
            serial_number,
            asset_tag,
            model: model.into(),
            status,
            current_holder: holder.clone(),
            last_updated: now,
            history: vec![HistoryEntry {
                status,
                holder,
                description: "warehouse intake".to_string(),
                timestamp: now,
            }],
        }
    }

    /// Move the device to a new status and holder, appending a history entry.
    pub fn transition(
        &mut self,
        status: DeviceStatus,
        holder: impl Into<String>,
        description: impl Into<String>,
    ) -> &HistoryEntry {
        let now = Timestamp::now();
        let holder = holder.into();
        self.status = status;
        self.current_holder.clone_from(&holder);
        self.last_updated = now;
        self.history.push(HistoryEntry {
            status,
            holder,
            description: description.into(),
            timestamp: now,
        });
        &self.history[self.history.len() - 1]
    }

    pub fn serial_number(&self) -> &SerialNumber {
        &self.serial_number
    }

    pub fn asset_tag(&self) -> &AssetTag {
        &self.asset_tag
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    pub fn current_holder(&self) -> &str {
        &self.current_holder
    }

    pub fn last_updated(&self) -> Timestamp {
        self.last_updated
    }

    /// Whether the unit may be bound to a task and installed.
    pub fn is_available(&self) -> bool {
        self.status.is_available()
    }

    /// History in storage order (oldest first).
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// History in display order (newest first).
    pub fn history_newest_first(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter().rev()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
