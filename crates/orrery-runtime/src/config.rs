//! Backend configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sizing knobs for a backend instance.
///
/// These affect memory layout only and never change observable snapshot
/// semantics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Initial live-store capacity in cells, rounded up to the bitset
    /// word width.
    pub initial_cells: usize,
    /// Ring capacity in snapshots.
    pub max_snapshots: usize,
}

impl BackendConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.initial_cells == 0 {
            return Err(Error::InvalidConfig(
                "initial_cells must be > 0".to_string(),
            ));
        }
        if self.max_snapshots == 0 {
            return Err(Error::InvalidConfig(
                "max_snapshots must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            initial_cells: 64,
            max_snapshots: 100,
        }
    }
}
