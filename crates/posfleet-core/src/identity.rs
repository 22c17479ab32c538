//! # Identifier Newtypes
//!
//! Newtype wrappers for the identifiers of the fleet. These prevent
//! accidental confusion: a `SerialNumber` cannot be passed where an
//! `AssetTag` is expected, and neither can be an empty string.
//!
//! Serial numbers and asset tags are printed on the unit and typed in by
//! operators, so construction trims surrounding whitespace and rejects
//! empty or over-long values. Deserialization goes through the same
//! validation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FleetError;

/// Upper bound on serial/asset-tag length.
const MAX_IDENTIFIER_LEN: usize = 64;

fn validated(field: &str, raw: impl Into<String>) -> Result<String, FleetError> {
    let raw = raw.into();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FleetError::Validation(format!("{field} must not be empty")));
    }
    if trimmed.len() > MAX_IDENTIFIER_LEN {
        return Err(FleetError::Validation(format!(
            "{field} must not exceed {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(FleetError::Validation(format!(
            "{field} must not contain control characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Serial number of a physical terminal. Immutable identity of a device.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerialNumber(String);

impl SerialNumber {
    /// Create a validated serial number.
    pub fn new(s: impl Into<String>) -> Result<Self, FleetError> {
        validated("serial_number", s).map(Self)
    }

    /// Return the serial as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Secondary identifier of a device (patrimony code).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetTag(String);

impl AssetTag {
    /// Create a validated asset tag.
    pub fn new(s: impl Into<String>) -> Result<Self, FleetError> {
        validated("asset_tag", s).map(Self)
    }

    /// Return the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique identifier of a provisioning task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a new random task identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl TryFrom<String> for SerialNumber {
    type Error = FleetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<SerialNumber> for String {
    fn from(s: SerialNumber) -> Self {
        s.0
    }
}

impl TryFrom<String> for AssetTag {
    type Error = FleetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<AssetTag> for String {
    fn from(t: AssetTag) -> Self {
        t.0
    }
}

impl std::fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for AssetTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task:{}", self.0)
    }
}
