//! Step execution record (digital differential analyser).
//!
//! A [`Dda`] turns one smoothed look-ahead entry into a per-drive Bresenham
//! schedule. The dominant drive steps on every tick; every other drive steps when
//! its error counter crosses zero, so all drives arrive together.

use heapless::spsc::{Consumer, Producer, Queue};
use libm::{roundf, sqrtf};

use crate::config::{Kinematics, MAX_DRIVES};
use crate::error::Result;
use crate::platform::{EndStopHit, Platform};

use super::geometry::{Endpoint, Segment};
use super::lookahead::LookAheadEntry;
use super::profile::{Direction, MotionPhase, MovementProfile, MovementType};

/// End-stop hits the interrupt can report before the background pass drains them.
pub const END_STOP_EVENT_CAPACITY: usize = 16;

const END_STOP_QUEUE_LENGTH: usize = END_STOP_EVENT_CAPACITY + 1;

/// End-stop hits travelling from the step interrupt to the background pass.
pub type EndStopQueue = Queue<EndStopEvent, END_STOP_QUEUE_LENGTH>;

/// Interrupt side of an [`EndStopQueue`].
pub type EndStopSender<'a> = Producer<'a, EndStopEvent, END_STOP_QUEUE_LENGTH>;

/// Background side of an [`EndStopQueue`].
pub type EndStopReceiver<'a> = Consumer<'a, EndStopEvent, END_STOP_QUEUE_LENGTH>;

/// An end stop triggered while a record was executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndStopEvent {
    /// Drive that hit the stop.
    pub drive: usize,
    /// Look-ahead slot the record was derived from.
    pub slot: usize,
    /// Which stop.
    pub hit: EndStopHit,
}

/// Relative slack on squared velocities before a profile counts as infeasible.
const FEASIBILITY_SLACK: f32 = 1e-4;

/// One physically realisable segment.
#[derive(Debug, Clone)]
pub struct Dda {
    directions: [Direction; MAX_DRIVES],
    delta: [u32; MAX_DRIVES],
    counter: [i64; MAX_DRIVES],
    drive_count: usize,
    total_steps: u32,
    step_index: u32,
    stop_a_step: u32,
    start_d_step: u32,
    interval_ns: u32,
    velocity: f32,
    entry_velocity: f32,
    exit_velocity: f32,
    cruise_velocity: f32,
    acceleration: f32,
    distance: f32,
    d_cross: f32,
    instant_dv: f32,
    check_end_stops: bool,
    movement: MovementType,
    source_slot: usize,
    halted: u16,
    active: bool,
}

impl Default for Dda {
    fn default() -> Self {
        Self {
            directions: [Direction::Forwards; MAX_DRIVES],
            delta: [0; MAX_DRIVES],
            counter: [0; MAX_DRIVES],
            drive_count: 0,
            total_steps: 0,
            step_index: 0,
            stop_a_step: 0,
            start_d_step: 0,
            interval_ns: u32::MAX,
            velocity: 0.0,
            entry_velocity: 0.0,
            exit_velocity: 0.0,
            cruise_velocity: 0.0,
            acceleration: 0.0,
            distance: 0.0,
            d_cross: 0.0,
            instant_dv: 0.0,
            check_end_stops: false,
            movement: MovementType::empty(),
            source_slot: 0,
            halted: 0,
            active: false,
        }
    }
}

impl Dda {
    /// Derive the step schedule for `entry`, starting at `start`.
    ///
    /// `u` and `v` are the proposed entry and exit velocities. When the segment
    /// cannot realise them they are rewritten to a consistent pair and
    /// [`MovementProfile::Change`] is returned; the phase boundaries are only valid
    /// for `Moving` and `NoFlat`.
    pub fn init(
        &mut self,
        start: &Endpoint,
        entry: &LookAheadEntry,
        kinematics: &Kinematics,
        u: &mut f32,
        v: &mut f32,
    ) -> MovementProfile {
        let segment = Segment::between(start, entry.endpoint(), kinematics);

        for d in 0..MAX_DRIVES {
            self.directions[d] = Direction::from_steps(segment.delta[d]);
            self.delta[d] = segment.delta[d].unsigned_abs().min(u32::MAX as u64) as u32;
            self.counter[d] = 0;
        }
        self.drive_count = kinematics.drive_count();
        self.total_steps = segment.total_steps;
        self.distance = segment.distance;
        self.d_cross = segment.d_cross();
        self.acceleration = segment.acceleration;
        self.instant_dv = if segment.instant_dv.is_finite() {
            segment.instant_dv
        } else {
            0.0
        };
        self.movement = segment.movement;
        self.check_end_stops = entry.check_end_stops();
        self.step_index = 0;
        self.halted = 0;
        self.active = false;

        let cruise = entry.feedrate().min(segment.max_speed);
        let mut changed = false;
        if *u > cruise {
            *u = cruise;
            changed = true;
        }
        if *v > cruise {
            *v = cruise;
            changed = true;
        }

        let reach = 2.0 * segment.acceleration * segment.distance;
        let (u2, v2) = (*u * *u, *v * *v);
        let slack = FEASIBILITY_SLACK * (u2 + v2 + reach).max(1.0);
        if v2 > u2 + reach + slack {
            *v = sqrtf(u2 + reach);
            changed = true;
        } else if u2 > v2 + reach + slack {
            *u = sqrtf(v2 + reach);
            changed = true;
        }
        if changed {
            return MovementProfile::Change;
        }

        self.entry_velocity = *u;
        self.exit_velocity = *v;

        if segment.is_empty() {
            self.cruise_velocity = *u;
            self.stop_a_step = 0;
            self.start_d_step = 0;
            self.velocity = *u;
            self.interval_ns = u32::MAX;
            return MovementProfile::Moving;
        }

        let a2 = 2.0 * segment.acceleration;
        let accelerate = (cruise * cruise - u2) / a2;
        let decelerate = (cruise * cruise - v2) / a2;
        let (profile, peak, accelerate, decelerate) = if accelerate + decelerate <= segment.distance
        {
            (MovementProfile::Moving, cruise, accelerate, decelerate)
        } else {
            let peak2 = (reach + u2 + v2) * 0.5;
            (
                MovementProfile::NoFlat,
                sqrtf(peak2),
                ((peak2 - u2) / a2).max(0.0),
                ((peak2 - v2) / a2).max(0.0),
            )
        };

        self.cruise_velocity = peak;
        self.stop_a_step = (roundf(accelerate / self.d_cross) as u32).min(self.total_steps);
        let decel_steps =
            (roundf(decelerate / self.d_cross) as u32).min(self.total_steps - self.stop_a_step);
        self.start_d_step = self.total_steps - decel_steps;

        self.velocity = self.velocity_at(0);
        self.interval_ns = self.interval_for(self.velocity);
        profile
    }

    /// Record which look-ahead slot this record was derived from.
    pub(crate) fn set_source_slot(&mut self, slot: usize) {
        self.source_slot = slot;
    }

    /// Set direction outputs and arm the Bresenham counters.
    pub fn start<P: Platform>(&mut self, platform: &mut P) -> Result<()> {
        for d in 0..self.drive_count {
            if self.delta[d] > 0 {
                platform.set_direction(d, self.directions[d])?;
            }
        }

        let seed = -((self.total_steps / 2) as i64);
        self.counter = [seed; MAX_DRIVES];
        self.step_index = 0;
        self.halted = 0;
        self.active = self.total_steps > 0;
        if self.active {
            self.velocity = self.velocity_at(0);
            self.interval_ns = self.interval_for(self.velocity);
        }
        Ok(())
    }

    /// Advance one tick: emit due steps, check end stops, update the interval.
    ///
    /// `positions` holds the live step count of every drive. A drive that meets an
    /// end stop in its direction of travel is halted for the rest of the record,
    /// its position is set to the stop and an [`EndStopEvent`] is queued.
    pub fn step<P: Platform>(
        &mut self,
        platform: &mut P,
        kinematics: &Kinematics,
        positions: &mut [i64; MAX_DRIVES],
        events: &mut EndStopSender<'_>,
    ) -> Result<()> {
        if !self.active {
            return Ok(());
        }

        let total = self.total_steps as i64;
        for d in 0..self.drive_count {
            if self.delta[d] == 0 || self.is_halted(d) {
                continue;
            }

            self.counter[d] += self.delta[d] as i64;
            if self.counter[d] <= 0 {
                continue;
            }
            self.counter[d] -= total;

            let limits = kinematics.drive(d);
            if self.check_end_stops && limits.is_axis() {
                let hit = platform.end_stop(d)?;
                let bound = match (hit, self.directions[d]) {
                    (EndStopHit::Low, Direction::Backwards) => Some(0.0),
                    (EndStopHit::High, Direction::Forwards) => Some(platform.axis_length(d)),
                    _ => None,
                };
                if let Some(bound) = bound {
                    self.halted |= 1 << d;
                    positions[d] = limits.mm_to_steps(bound);
                    debug!("end stop on drive {} at step {}", d, self.step_index);
                    let event = EndStopEvent {
                        drive: d,
                        slot: self.source_slot,
                        hit,
                    };
                    if events.enqueue(event).is_err() {
                        warn!("end-stop event queue full, dropping drive {}", d);
                    }
                    continue;
                }
            }

            platform.step(d)?;
            positions[d] += self.directions[d].sign();
        }

        self.step_index += 1;
        if self.step_index >= self.total_steps || self.all_moving_halted() {
            self.active = false;
            self.velocity = self.exit_velocity;
            self.interval_ns = u32::MAX;
            return Ok(());
        }

        self.velocity = self.velocity_at(self.step_index);
        self.interval_ns = self.interval_for(self.velocity);
        Ok(())
    }

    fn all_moving_halted(&self) -> bool {
        self.halted != 0
            && (0..self.drive_count).all(|d| self.delta[d] == 0 || self.is_halted(d))
    }

    /// Path velocity over the tick that takes step `index`.
    fn velocity_at(&self, index: u32) -> f32 {
        let a2 = 2.0 * self.acceleration;
        let velocity = if index < self.stop_a_step {
            let covered = (index + 1) as f32 * self.d_cross;
            sqrtf(self.entry_velocity * self.entry_velocity + a2 * covered)
        } else if index < self.start_d_step {
            self.cruise_velocity
        } else {
            let remaining = (self.total_steps - index) as f32 * self.d_cross;
            sqrtf(self.exit_velocity * self.exit_velocity + a2 * remaining)
        };
        velocity.min(self.cruise_velocity).max(self.instant_dv)
    }

    fn interval_for(&self, velocity: f32) -> u32 {
        if velocity <= 0.0 {
            return u32::MAX;
        }
        // Float to int casts saturate
        roundf(self.d_cross / velocity * 1.0e9) as u32
    }

    /// Check if the record is executing.
    #[inline]
    pub fn active(&self) -> bool {
        self.active
    }

    /// Steps of the dominant drive.
    #[inline]
    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    /// Ticks taken so far.
    #[inline]
    pub fn step_index(&self) -> u32 {
        self.step_index
    }

    /// First tick of the flat phase.
    #[inline]
    pub fn stop_a_step(&self) -> u32 {
        self.stop_a_step
    }

    /// First tick of the deceleration phase.
    #[inline]
    pub fn start_d_step(&self) -> u32 {
        self.start_d_step
    }

    /// Ticks spent accelerating, cruising and decelerating.
    pub fn phase_steps(&self) -> (u32, u32, u32) {
        (
            self.stop_a_step,
            self.start_d_step - self.stop_a_step,
            self.total_steps - self.start_d_step,
        )
    }

    /// Phase of the next tick.
    pub fn phase(&self) -> MotionPhase {
        if self.step_index >= self.total_steps {
            MotionPhase::Complete
        } else if self.step_index < self.stop_a_step {
            MotionPhase::Accelerating
        } else if self.step_index < self.start_d_step {
            MotionPhase::Cruising
        } else {
            MotionPhase::Decelerating
        }
    }

    /// Time until the next tick, in nanoseconds.
    #[inline]
    pub fn interval_ns(&self) -> u32 {
        self.interval_ns
    }

    /// Current path velocity in mm/s.
    #[inline]
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Path velocity at the first step.
    #[inline]
    pub fn entry_velocity(&self) -> f32 {
        self.entry_velocity
    }

    /// Path velocity at the last step.
    #[inline]
    pub fn exit_velocity(&self) -> f32 {
        self.exit_velocity
    }

    /// Flat-phase velocity, or the peak of a triangle.
    #[inline]
    pub fn cruise_velocity(&self) -> f32 {
        self.cruise_velocity
    }

    /// Path acceleration in mm/s².
    #[inline]
    pub fn acceleration(&self) -> f32 {
        self.acceleration
    }

    /// Path length in mm.
    #[inline]
    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Path length per tick.
    #[inline]
    pub fn d_cross(&self) -> f32 {
        self.d_cross
    }

    /// Velocity floor carried from the source entry.
    #[inline]
    pub fn instant_dv(&self) -> f32 {
        self.instant_dv
    }

    /// Drive classes this record moves.
    #[inline]
    pub fn movement(&self) -> MovementType {
        self.movement
    }

    /// Look-ahead slot this record was derived from.
    #[inline]
    pub fn source_slot(&self) -> usize {
        self.source_slot
    }

    /// Signed step count of one drive.
    pub fn delta(&self, drive: usize) -> i64 {
        self.delta[drive] as i64 * self.directions[drive].sign()
    }

    /// Direction of one drive.
    #[inline]
    pub fn direction(&self, drive: usize) -> Direction {
        self.directions[drive]
    }

    /// Check if an end stop halted a drive.
    #[inline]
    pub fn is_halted(&self, drive: usize) -> bool {
        self.halted & (1 << drive) != 0
    }
}
