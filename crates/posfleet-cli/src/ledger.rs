//! Loading and saving the snapshot file a CLI invocation works on.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use posfleet_provisioning::{Fleet, FleetConfig, FleetSnapshot};

/// Where the ledger lives and which policy applies to it.
#[derive(Debug, Clone)]
pub struct LedgerFile {
    pub path: PathBuf,
    pub config: FleetConfig,
}

impl LedgerFile {
    /// Resolve the fleet configuration (defaults when no file is given).
    pub fn new(path: PathBuf, config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(p) => FleetConfig::load(p)
                .with_context(|| format!("failed to load fleet config {}", p.display()))?,
            None => FleetConfig::default(),
        };
        Ok(Self { path, config })
    }

    /// Read the raw snapshot, or an empty one if the file does not exist yet.
    pub fn read(&self) -> Result<FleetSnapshot> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no ledger yet, starting empty");
            return Ok(FleetSnapshot::default());
        }
        Ok(FleetSnapshot::load(&self.path)?)
    }

    /// Load the ledger into a fleet, re-validating its invariants.
    pub fn open(&self) -> Result<Fleet> {
        let fleet = self
            .read()?
            .into_fleet(self.config.clone())
            .with_context(|| format!("ledger {} failed validation", self.path.display()))?;
        Ok(fleet)
    }

    pub fn save(&self, fleet: &Fleet) -> Result<()> {
        fleet
            .snapshot()?
            .save(&self.path)
            .with_context(|| format!("failed to save ledger {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "ledger saved");
        Ok(())
    }
}
