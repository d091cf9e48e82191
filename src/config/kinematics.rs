//! Kinematic limits derived from machine configuration.

use heapless::Vec;

use super::drive::{DriveConfig, DriveKind};
use super::system::{MachineConfig, MAX_DRIVES};
use super::units::{Millimeters, Steps};

/// Derived per-drive parameters computed from drive configuration.
///
/// These are computed once at initialization and used for all motion planning.
#[derive(Debug, Clone, Copy)]
pub struct DriveLimits {
    /// Axis or extruder.
    pub kind: DriveKind,

    /// Steps per millimetre.
    pub steps_per_mm: f32,

    /// Maximum feedrate in mm/s.
    pub max_feedrate: f32,

    /// Maximum acceleration in mm/s².
    pub max_acceleration: f32,

    /// Instantaneous velocity change in mm/s.
    pub instant_dv: f32,

    /// Axis length in mm (0 for extruders).
    pub axis_length: f32,

    /// Whether direction pin logic is inverted.
    pub invert_direction: bool,
}

impl DriveLimits {
    /// Compute drive limits from drive configuration.
    pub fn from_config(config: &DriveConfig) -> Self {
        Self {
            kind: config.kind,
            steps_per_mm: config.steps_per_mm,
            max_feedrate: config.max_feedrate.0,
            max_acceleration: config.max_acceleration.0,
            instant_dv: config.instant_dv.0,
            axis_length: config.axis_length.map(|l| l.0).unwrap_or(0.0),
            invert_direction: config.invert_direction,
        }
    }

    /// Check if this drive is a cartesian axis.
    #[inline]
    pub fn is_axis(&self) -> bool {
        self.kind.is_axis()
    }

    /// Convert millimetres to the nearest step.
    #[inline]
    pub fn mm_to_steps(&self, mm: f32) -> i64 {
        Steps::from_mm(Millimeters(mm), self.steps_per_mm).0
    }

    /// Convert steps to millimetres.
    #[inline]
    pub fn steps_to_mm(&self, steps: i64) -> f32 {
        Steps(steps).to_mm(self.steps_per_mm).0
    }
}

/// Planner-wide kinematics: every drive's limits plus look-ahead tuning.
#[derive(Debug, Clone)]
pub struct Kinematics {
    drives: Vec<DriveLimits, MAX_DRIVES>,

    /// Junction deviation in mm.
    pub junction_deviation: f32,

    /// Moves held back for look-ahead while streaming.
    pub look_ahead_depth: usize,

    /// Interrupt period while idle, in nanoseconds.
    pub idle_interval_ns: u32,

    /// STEP pulse high time in microseconds.
    pub step_pulse_us: u32,
}

impl Kinematics {
    /// Compute kinematics from a machine configuration.
    pub fn from_config(config: &MachineConfig) -> Self {
        let mut drives = Vec::new();
        for drive in config.drives.iter() {
            // Both vectors share MAX_DRIVES capacity.
            let _ = drives.push(DriveLimits::from_config(drive));
        }

        Self {
            drives,
            junction_deviation: config.planner.junction_deviation.0,
            look_ahead_depth: config.planner.look_ahead_depth,
            idle_interval_ns: config.planner.idle_interrupt_us.saturating_mul(1000),
            step_pulse_us: config.planner.step_pulse_us,
        }
    }

    /// Number of drives.
    #[inline]
    pub fn drive_count(&self) -> usize {
        self.drives.len()
    }

    /// Limits of one drive.
    #[inline]
    pub fn drive(&self, drive: usize) -> &DriveLimits {
        &self.drives[drive]
    }

    /// Limits of every drive in endpoint order.
    #[inline]
    pub fn drives(&self) -> &[DriveLimits] {
        &self.drives
    }
}
