//! # Fleet Configuration
//!
//! Operator-tunable policy loaded from YAML:
//!
//! ```yaml
//! warehouse_holder: Central Warehouse
//! field_agent_roles: [FIELD_AGENT]
//! reasons:
//!   - code: DEFECT
//!     label: Defective terminal
//!     kinds: [EXCHANGE]
//! ```
//!
//! Every field has a default, so an empty file (or no file) yields a usable
//! configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use posfleet_state::{RequesterRole, TaskKind};

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not valid YAML for [`FleetConfig`].
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// The file parsed but violates a constraint.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One entry of the configurable reason list for sales requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonCode {
    pub code: String,
    pub label: String,
    /// Kinds this reason may be submitted for.
    pub kinds: Vec<TaskKind>,
}

impl ReasonCode {
    fn new(code: &str, label: &str, kinds: &[TaskKind]) -> Self {
        Self {
            code: code.to_string(),
            label: label.to_string(),
            kinds: kinds.to_vec(),
        }
    }
}

/// Fleet-wide policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Holder recorded when a unit returns to the warehouse.
    pub warehouse_holder: String,
    /// Reasons accepted on exchange and retrieval requests.
    pub reasons: Vec<ReasonCode>,
    /// Requester roles that keep a retrieved unit instead of returning it.
    pub field_agent_roles: Vec<RequesterRole>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        use TaskKind::{Exchange, Retrieval};
        Self {
            warehouse_holder: "Central Warehouse".to_string(),
            reasons: vec![
                ReasonCode::new("DEFECT", "Defective terminal", &[Exchange]),
                ReasonCode::new("CONNECTIVITY", "Connectivity problems", &[Exchange]),
                ReasonCode::new("UPGRADE", "Model upgrade", &[Exchange]),
                ReasonCode::new("MERCHANT_CLOSED", "Merchant closed", &[Retrieval]),
                ReasonCode::new("CANCELLATION", "Contract cancelled", &[Retrieval]),
                ReasonCode::new("OTHER", "Other", &[Exchange, Retrieval]),
            ],
            field_agent_roles: vec![RequesterRole::FieldAgent],
        }
    }
}

impl FleetConfig {
    /// Load and validate a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.warehouse_holder.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "warehouse_holder must not be empty".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for reason in &self.reasons {
            if reason.code.trim().is_empty() {
                return Err(ConfigError::Invalid("reason code must not be empty".into()));
            }
            if !seen.insert(reason.code.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate reason code {:?}",
                    reason.code
                )));
            }
            if let Some(kind) = reason.kinds.iter().find(|k| !k.releases_device()) {
                return Err(ConfigError::Invalid(format!(
                    "reason {:?} lists {kind}, only EXCHANGE and RETRIEVAL take reasons",
                    reason.code
                )));
            }
        }
        Ok(())
    }

    /// Look up a reason code accepted for `kind`.
    pub fn reason(&self, code: &str, kind: TaskKind) -> Option<&ReasonCode> {
        self.reasons
            .iter()
            .find(|r| r.code.eq_ignore_ascii_case(code.trim()) && r.kinds.contains(&kind))
    }

    /// Whether a retrieval by this role leaves the unit with the requester.
    pub fn keeps_retrieved_unit(&self, role: RequesterRole) -> bool {
        self.field_agent_roles.contains(&role)
    }
}
