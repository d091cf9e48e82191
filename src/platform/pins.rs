//! Platform over embedded-hal 1.0 pins.
//!
//! Generic over the STEP/DIR output pins, the end-stop input pins and a delay
//! provider that times the STEP pulse.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use heapless::Vec;

use crate::config::{Kinematics, MAX_DRIVES};
use crate::error::{DriveError, MoveError, Result};
use crate::motion::Direction;

use super::{EndStopHit, Platform};

/// Pins of one drive.
pub struct DrivePins<STEP, DIR, STOP>
where
    STEP: OutputPin,
    DIR: OutputPin,
    STOP: InputPin,
{
    /// STEP pin (pulse to move one step).
    step: STEP,

    /// DIR pin (high = forwards, unless inverted).
    dir: DIR,

    /// Switch at the zero end of the axis.
    low_stop: Option<STOP>,

    /// Switch at the far end of the axis.
    high_stop: Option<STOP>,

    /// Whether direction pin logic is inverted.
    invert_direction: bool,

    /// Whether a stop reads low when triggered.
    stops_active_low: bool,

    /// Current direction (cached to avoid unnecessary pin writes).
    current_direction: Option<Direction>,
}

impl<STEP, DIR, STOP> DrivePins<STEP, DIR, STOP>
where
    STEP: OutputPin,
    DIR: OutputPin,
    STOP: InputPin,
{
    /// Pins of a drive without end stops.
    pub fn new(step: STEP, dir: DIR) -> Self {
        Self {
            step,
            dir,
            low_stop: None,
            high_stop: None,
            invert_direction: false,
            stops_active_low: false,
            current_direction: None,
        }
    }

    /// Attach end-stop switches.
    pub fn with_end_stops(mut self, low: Option<STOP>, high: Option<STOP>) -> Self {
        self.low_stop = low;
        self.high_stop = high;
        self
    }

    /// Set direction inversion.
    pub fn invert_direction(mut self, invert: bool) -> Self {
        self.invert_direction = invert;
        self
    }

    /// Treat a low level on the stop inputs as triggered.
    pub fn stops_active_low(mut self, active_low: bool) -> Self {
        self.stops_active_low = active_low;
        self
    }

    /// Direction last written to the DIR pin.
    #[inline]
    pub fn current_direction(&self) -> Option<Direction> {
        self.current_direction
    }

    fn set_direction(&mut self, direction: Direction) -> Result<()> {
        if self.current_direction == Some(direction) {
            return Ok(());
        }

        let pin_high = match direction {
            Direction::Forwards => !self.invert_direction,
            Direction::Backwards => self.invert_direction,
        };

        if pin_high {
            self.dir.set_high().map_err(|_| DriveError::PinError)?;
        } else {
            self.dir.set_low().map_err(|_| DriveError::PinError)?;
        }

        self.current_direction = Some(direction);
        Ok(())
    }

    fn triggered(pin: &mut Option<STOP>, active_low: bool) -> Result<bool> {
        match pin {
            Some(pin) => {
                let high = pin.is_high().map_err(|_| DriveError::PinError)?;
                Ok(high != active_low)
            }
            None => Ok(false),
        }
    }

    fn end_stop(&mut self) -> Result<EndStopHit> {
        if Self::triggered(&mut self.low_stop, self.stops_active_low)? {
            return Ok(EndStopHit::Low);
        }
        if Self::triggered(&mut self.high_stop, self.stops_active_low)? {
            return Ok(EndStopHit::High);
        }
        Ok(EndStopHit::None)
    }
}

/// [`Platform`] driving one [`DrivePins`] per drive.
///
/// The step timer itself stays outside: read [`next_interval_ns`](Self::next_interval_ns)
/// after each interrupt and program the hardware timer with it.
pub struct PinPlatform<STEP, DIR, STOP, DELAY>
where
    STEP: OutputPin,
    DIR: OutputPin,
    STOP: InputPin,
    DELAY: DelayNs,
{
    drives: Vec<DrivePins<STEP, DIR, STOP>, MAX_DRIVES>,
    axis_lengths: Vec<f32, MAX_DRIVES>,
    inverted: Vec<bool, MAX_DRIVES>,
    delay: DELAY,
    step_pulse_us: u32,
    next_interval_ns: Option<u32>,
}

impl<STEP, DIR, STOP, DELAY> PinPlatform<STEP, DIR, STOP, DELAY>
where
    STEP: OutputPin,
    DIR: OutputPin,
    STOP: InputPin,
    DELAY: DelayNs,
{
    /// Create a platform with no drives, taking axis lengths, direction inversion and
    /// pulse width from `kinematics`.
    pub fn new(kinematics: &Kinematics, delay: DELAY) -> Self {
        Self {
            drives: Vec::new(),
            axis_lengths: kinematics.drives().iter().map(|d| d.axis_length).collect(),
            inverted: kinematics.drives().iter().map(|d| d.invert_direction).collect(),
            delay,
            step_pulse_us: kinematics.step_pulse_us,
            next_interval_ns: None,
        }
    }

    /// Add the pins of the next drive, in endpoint order.
    ///
    /// A drive configured with `invert_direction` is inverted even if its pins are not.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDrive` if every drive already has pins.
    pub fn with_drive(mut self, mut pins: DrivePins<STEP, DIR, STOP>) -> Result<Self> {
        let index = self.drives.len();
        let Some(&inverted) = self.inverted.get(index) else {
            return Err(MoveError::InvalidDrive(index).into());
        };
        pins.invert_direction |= inverted;
        if self.drives.push(pins).is_err() {
            return Err(MoveError::InvalidDrive(index).into());
        }
        Ok(self)
    }

    /// Number of drives with pins.
    #[inline]
    pub fn drive_count(&self) -> usize {
        self.drives.len()
    }

    /// Pins of one drive.
    pub fn drive_pins(&self, drive: usize) -> Option<&DrivePins<STEP, DIR, STOP>> {
        self.drives.get(drive)
    }

    /// Interval requested by the last interrupt, in nanoseconds.
    #[inline]
    pub fn next_interval_ns(&self) -> Option<u32> {
        self.next_interval_ns
    }

    fn pins(&mut self, drive: usize) -> Result<&mut DrivePins<STEP, DIR, STOP>> {
        self.drives
            .get_mut(drive)
            .ok_or_else(|| MoveError::InvalidDrive(drive).into())
    }
}

impl<STEP, DIR, STOP, DELAY> Platform for PinPlatform<STEP, DIR, STOP, DELAY>
where
    STEP: OutputPin,
    DIR: OutputPin,
    STOP: InputPin,
    DELAY: DelayNs,
{
    fn axis_length(&self, drive: usize) -> f32 {
        self.axis_lengths.get(drive).copied().unwrap_or(0.0)
    }

    fn set_direction(&mut self, drive: usize, direction: Direction) -> Result<()> {
        self.pins(drive)?.set_direction(direction)
    }

    fn step(&mut self, drive: usize) -> Result<()> {
        let pulse_us = self.step_pulse_us;
        let pins = self
            .drives
            .get_mut(drive)
            .ok_or(MoveError::InvalidDrive(drive))?;

        pins.step.set_high().map_err(|_| DriveError::PinError)?;
        self.delay.delay_us(pulse_us);
        pins.step.set_low().map_err(|_| DriveError::PinError)?;
        Ok(())
    }

    fn end_stop(&mut self, drive: usize) -> Result<EndStopHit> {
        self.pins(drive)?.end_stop()
    }

    fn set_interrupt(&mut self, interval_ns: u32) {
        self.next_interval_ns = Some(interval_ns);
    }
}
