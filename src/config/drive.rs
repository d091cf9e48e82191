//! Drive configuration from TOML.

use heapless::String;
use serde::Deserialize;

use super::units::{Millimeters, MmPerSec, MmPerSecSquared};

/// What a drive moves.
///
/// Cartesian axes take part in cornering geometry and end-stop checks; extruders do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum DriveKind {
    /// X axis.
    X,
    /// Y axis.
    Y,
    /// Z axis.
    Z,
    /// Extruder channel.
    Extruder,
}

impl DriveKind {
    /// Check if this drive is a cartesian axis.
    #[inline]
    pub fn is_axis(self) -> bool {
        !matches!(self, DriveKind::Extruder)
    }
}

/// Complete drive configuration from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveConfig {
    /// Human-readable name (max 32 chars).
    pub name: String<32>,

    /// Axis or extruder.
    pub kind: DriveKind,

    /// Microsteps per millimetre of travel.
    pub steps_per_mm: f32,

    /// Maximum feedrate of this drive alone.
    #[serde(rename = "max_feedrate_mm_per_sec")]
    pub max_feedrate: MmPerSec,

    /// Maximum acceleration of this drive alone.
    #[serde(rename = "max_acceleration_mm_per_sec2")]
    pub max_acceleration: MmPerSecSquared,

    /// Velocity change the drive can take without ramping.
    #[serde(default, rename = "instant_dv_mm_per_sec")]
    pub instant_dv: MmPerSec,

    /// Travel from the low end stop to the high end stop (axes only).
    #[serde(default, rename = "axis_length_mm")]
    pub axis_length: Option<Millimeters>,

    /// Invert direction pin logic.
    #[serde(default)]
    pub invert_direction: bool,
}

impl DriveConfig {
    /// Create an axis drive configuration.
    pub fn axis(
        name: &str,
        kind: DriveKind,
        steps_per_mm: f32,
        max_feedrate: MmPerSec,
        max_acceleration: MmPerSecSquared,
        axis_length: Millimeters,
    ) -> Self {
        Self {
            name: String::try_from(name).unwrap_or_default(),
            kind,
            steps_per_mm,
            max_feedrate,
            max_acceleration,
            instant_dv: MmPerSec(0.0),
            axis_length: Some(axis_length),
            invert_direction: false,
        }
    }

    /// Create an extruder drive configuration.
    pub fn extruder(
        name: &str,
        steps_per_mm: f32,
        max_feedrate: MmPerSec,
        max_acceleration: MmPerSecSquared,
    ) -> Self {
        Self {
            name: String::try_from(name).unwrap_or_default(),
            kind: DriveKind::Extruder,
            steps_per_mm,
            max_feedrate,
            max_acceleration,
            instant_dv: MmPerSec(0.0),
            axis_length: None,
            invert_direction: false,
        }
    }

    /// Set the instantaneous velocity change.
    pub fn with_instant_dv(mut self, instant_dv: MmPerSec) -> Self {
        self.instant_dv = instant_dv;
        self
    }

    /// Calculate the travel of one microstep.
    pub fn mm_per_step(&self) -> f32 {
        1.0 / self.steps_per_mm
    }
}
