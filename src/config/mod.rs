//! Configuration module for step-planner.
//!
//! Provides types for loading and validating drive and planner configuration
//! from TOML files (with `std` feature) or pre-parsed data.

mod drive;
mod kinematics;
mod planner;
mod system;
pub mod units;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use drive::{DriveConfig, DriveKind};
pub use kinematics::{DriveLimits, Kinematics};
pub use planner::{PlannerConfig, DEFAULT_LOOK_AHEAD_DEPTH};
pub use system::{MachineConfig, MAX_DRIVES};
pub use validation::{
    max_look_ahead_depth, validate_config, validate_kinematics, MAX_LOOK_AHEAD_DEPTH,
};

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

// Re-export unit types at config level
pub use units::{Millimeters, MmPerSec, MmPerSecSquared, Steps};
