//! Segment classification shared by the look-ahead queue and the DDA.

use bitflags::bitflags;

/// Direction of drive motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Towards the high end of the axis (positive step count).
    #[default]
    Forwards,
    /// Towards the low end of the axis (negative step count).
    Backwards,
}

impl Direction {
    /// Get direction from signed step count.
    #[inline]
    pub fn from_steps(steps: i64) -> Self {
        if steps >= 0 {
            Direction::Forwards
        } else {
            Direction::Backwards
        }
    }

    /// Get the sign multiplier.
    #[inline]
    pub fn sign(self) -> i64 {
        match self {
            Direction::Forwards => 1,
            Direction::Backwards => -1,
        }
    }
}

/// Feasible velocity shape of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MovementProfile {
    /// Trapezoid: accelerate, cruise, decelerate.
    Moving,
    /// Triangle: too short to reach cruise speed.
    NoFlat,
    /// The requested boundary velocities were infeasible and have been rewritten.
    Change,
}

impl MovementProfile {
    /// Check if the boundary velocities were accepted as given.
    #[inline]
    pub fn is_stable(self) -> bool {
        !matches!(self, MovementProfile::Change)
    }
}

/// Phase of a segment at a given step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionPhase {
    /// Speeding up from the entry velocity.
    Accelerating,
    /// Holding cruise velocity.
    Cruising,
    /// Slowing to the exit velocity.
    Decelerating,
    /// Every step has been emitted.
    Complete,
}

bitflags! {
    /// Drive classes that change position over one segment.
    ///
    /// An empty set is a move that steps nothing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MovementType: u8 {
        /// X or Y moves.
        const XY_MOVE = 0b001;
        /// Z moves.
        const Z_MOVE = 0b010;
        /// An extruder moves.
        const E_MOVE = 0b100;
    }
}

impl MovementType {
    /// Check if any cartesian axis moves.
    #[inline]
    pub fn moves_axis(self) -> bool {
        self.intersects(MovementType::XY_MOVE | MovementType::Z_MOVE)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MovementType {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "MovementType({=u8:#05b})", self.bits())
    }
}
