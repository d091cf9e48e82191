//! Live position tracking.
//!
//! Provides absolute drive positions in steps with unit conversions.

use heapless::Vec;

use crate::config::units::{Millimeters, Steps};
use crate::config::{Kinematics, MAX_DRIVES};

use super::geometry::Endpoint;

/// Absolute position of every drive, counted from the steps actually emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrivePositions {
    steps: [i64; MAX_DRIVES],
}

impl DrivePositions {
    /// Positions of a machine resting on `endpoint`.
    pub fn at(endpoint: &Endpoint, kinematics: &Kinematics) -> Self {
        let mut positions = Self::default();
        positions.set_endpoint(endpoint, kinematics);
        positions
    }

    /// Overwrite every position with the nearest step to `endpoint`.
    pub fn set_endpoint(&mut self, endpoint: &Endpoint, kinematics: &Kinematics) {
        self.steps = [0; MAX_DRIVES];
        for (d, limits) in kinematics.drives().iter().enumerate() {
            self.steps[d] = limits.mm_to_steps(endpoint[d]);
        }
    }

    /// Position of one drive in steps.
    #[inline]
    pub fn steps(&self, drive: usize) -> Steps {
        Steps(self.steps[drive])
    }

    /// Position of one drive in millimetres.
    #[inline]
    pub fn mm(&self, drive: usize, kinematics: &Kinematics) -> Millimeters {
        Steps(self.steps[drive]).to_mm(kinematics.drive(drive).steps_per_mm)
    }

    /// Every configured drive's position in millimetres.
    pub fn to_mm(&self, kinematics: &Kinematics) -> Vec<f32, MAX_DRIVES> {
        (0..kinematics.drive_count())
            .map(|d| self.mm(d, kinematics).0)
            .collect()
    }

    /// Step counters for the interrupt to update in place.
    #[inline]
    pub(crate) fn raw_mut(&mut self) -> &mut [i64; MAX_DRIVES] {
        &mut self.steps
    }
}
