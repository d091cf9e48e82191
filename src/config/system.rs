//! Machine configuration - root configuration structure.

use heapless::Vec;
use serde::Deserialize;

use super::drive::DriveConfig;
use super::planner::PlannerConfig;

/// Largest number of drives (axes plus extruders) a machine may configure.
pub const MAX_DRIVES: usize = 8;

/// Root configuration structure from TOML.
///
/// Drive order is significant: the n-th `[[drives]]` table is drive n in every
/// endpoint passed to the planner.
#[derive(Debug, Clone, Deserialize)]
pub struct MachineConfig {
    /// Drives in endpoint order.
    pub drives: Vec<DriveConfig, MAX_DRIVES>,

    /// Look-ahead and interrupt tuning.
    #[serde(default)]
    pub planner: PlannerConfig,
}

impl MachineConfig {
    /// Get a drive configuration by name.
    pub fn drive(&self, name: &str) -> Option<&DriveConfig> {
        self.drives.iter().find(|d| d.name.as_str() == name)
    }

    /// Get the index of a drive by name.
    pub fn drive_index(&self, name: &str) -> Option<usize> {
        self.drives.iter().position(|d| d.name.as_str() == name)
    }

    /// Number of configured drives.
    pub fn drive_count(&self) -> usize {
        self.drives.len()
    }

    /// Number of cartesian axis drives.
    pub fn axis_count(&self) -> usize {
        self.drives.iter().filter(|d| d.kind.is_axis()).count()
    }

    /// List all drive names in endpoint order.
    pub fn drive_names(&self) -> impl Iterator<Item = &str> {
        self.drives.iter().map(|d| d.name.as_str())
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            drives: Vec::new(),
            planner: PlannerConfig::default(),
        }
    }
}
