//! Planner tuning from TOML.

use serde::Deserialize;

use super::units::Millimeters;

/// Default number of queued moves held back for look-ahead while streaming.
pub const DEFAULT_LOOK_AHEAD_DEPTH: usize = 7;

/// Look-ahead and interrupt tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// Maximum distance the path may deviate from a sharp corner.
    #[serde(default = "default_junction_deviation", rename = "junction_deviation_mm")]
    pub junction_deviation: Millimeters,

    /// Moves kept pending before the oldest is committed while streaming.
    #[serde(default = "default_look_ahead_depth")]
    pub look_ahead_depth: usize,

    /// Interrupt period while no move is executing.
    #[serde(default = "default_idle_interrupt_us")]
    pub idle_interrupt_us: u32,

    /// STEP pin high time.
    #[serde(default = "default_step_pulse_us")]
    pub step_pulse_us: u32,
}

fn default_junction_deviation() -> Millimeters {
    Millimeters(0.05)
}

fn default_look_ahead_depth() -> usize {
    DEFAULT_LOOK_AHEAD_DEPTH
}

fn default_idle_interrupt_us() -> u32 {
    200
}

fn default_step_pulse_us() -> u32 {
    2
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            junction_deviation: default_junction_deviation(),
            look_ahead_depth: default_look_ahead_depth(),
            idle_interrupt_us: default_idle_interrupt_us(),
            step_pulse_us: default_step_pulse_us(),
        }
    }
}
