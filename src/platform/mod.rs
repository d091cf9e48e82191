//! Hardware boundary of the planner.
//!
//! The planner never touches registers. It asks a [`Platform`] for axis lengths,
//! drives direction and step outputs through it, samples end stops, and hands it the
//! next interrupt interval.

mod pins;

pub use pins::{DrivePins, PinPlatform};

use crate::error::Result;
use crate::motion::Direction;

/// End-stop reading for one drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndStopHit {
    /// Neither stop is triggered.
    #[default]
    None,
    /// The low (zero) stop is triggered.
    Low,
    /// The high (axis length) stop is triggered.
    High,
}

/// Step, direction and end-stop I/O for every drive, plus the step timer.
pub trait Platform {
    /// Travel between the low and high end stops of an axis drive, in mm.
    fn axis_length(&self, drive: usize) -> f32;

    /// Set the direction output of a drive.
    fn set_direction(&mut self, drive: usize, direction: Direction) -> Result<()>;

    /// Emit one step pulse on a drive.
    fn step(&mut self, drive: usize) -> Result<()>;

    /// Sample the end stops of a drive.
    fn end_stop(&mut self, drive: usize) -> Result<EndStopHit>;

    /// Arm the step timer to fire after `interval_ns`.
    fn set_interrupt(&mut self, interval_ns: u32);
}
