//! Interrupt side of the planner: runs execution records one tick at a time.

use core::sync::atomic::Ordering;

use heapless::spsc::Consumer;

use crate::config::Kinematics;
use crate::error::Result;
use crate::motion::{Dda, DrivePositions, EndStopSender};
use crate::platform::Platform;

use super::{CurrentState, Shared};

/// State only the step interrupt touches.
pub(super) struct Stepping<P> {
    pub(super) platform: P,
    pub(super) active: Option<Dda>,
    pub(super) positions: DrivePositions,
    pub(super) interrupt_time_ns: u64,
}

impl<P> Stepping<P> {
    pub(super) fn new(platform: P, positions: DrivePositions) -> Self {
        Self {
            platform,
            active: None,
            positions,
            interrupt_time_ns: 0,
        }
    }

    pub(super) fn current_state(&self, kinematics: &Kinematics) -> CurrentState {
        CurrentState {
            positions: self.positions.to_mm(kinematics),
            feedrate: self.active.as_ref().map_or(0.0, Dda::velocity),
        }
    }
}

/// Handle for the step timer interrupt.
///
/// Obtained from [`MovePlanner::split`](super::MovePlanner::split). Call
/// [`interrupt`](Self::interrupt) from the timer and re-arm it with the interval it
/// returns; the platform's `set_interrupt` receives the same value.
pub struct StepTimer<'a, P: Platform, const DDA: usize> {
    kinematics: &'a Kinematics,
    state: &'a mut Stepping<P>,
    records: Consumer<'a, Dda, DDA>,
    events: EndStopSender<'a>,
    shared: &'a Shared,
}

impl<'a, P: Platform, const DDA: usize> StepTimer<'a, P, DDA> {
    pub(super) fn new(
        kinematics: &'a Kinematics,
        state: &'a mut Stepping<P>,
        records: Consumer<'a, Dda, DDA>,
        events: EndStopSender<'a>,
        shared: &'a Shared,
    ) -> Self {
        Self {
            kinematics,
            state,
            records,
            events,
            shared,
        }
    }

    /// Advance the step clock by one tick.
    ///
    /// Steps the executing record, or takes the next one from the execution ring
    /// when it has finished. Returns the interval to the next tick in nanoseconds:
    /// the record's current interval while one executes, the configured idle
    /// interval otherwise. If the background pass holds the ring, the tick idles and
    /// tries again next time.
    ///
    /// # Errors
    ///
    /// Propagates platform errors from stepping, direction setting or end-stop reads.
    pub fn interrupt(&mut self) -> Result<u32> {
        let interval = match self.state.active.as_mut() {
            Some(record) => {
                record.step(
                    &mut self.state.platform,
                    self.kinematics,
                    self.state.positions.raw_mut(),
                    &mut self.events,
                )?;
                if record.active() {
                    record.interval_ns()
                } else {
                    self.state.active = None;
                    self.finish_record();
                    self.promote()?
                }
            }
            None => self.promote()?,
        };

        self.state.interrupt_time_ns += u64::from(interval);
        self.state.platform.set_interrupt(interval);
        Ok(interval)
    }

    /// Take the next record off the execution ring and start it.
    fn promote(&mut self) -> Result<u32> {
        let shared = self.shared;
        let Some(_guard) = shared.lock.try_acquire() else {
            trace!("ring held by background, idling");
            return Ok(self.kinematics.idle_interval_ns);
        };
        if !self.records.ready() {
            return Ok(self.kinematics.idle_interval_ns);
        }

        // Flagged first so the background never sees an empty ring and no record
        shared.executing.store(true, Ordering::Release);
        let Some(mut record) = self.records.dequeue() else {
            shared.executing.store(false, Ordering::Release);
            return Ok(self.kinematics.idle_interval_ns);
        };

        if let Err(err) = record.start(&mut self.state.platform) {
            self.finish_record();
            return Err(err);
        }
        if !record.active() {
            self.finish_record();
            return Ok(self.kinematics.idle_interval_ns);
        }

        let interval = record.interval_ns();
        trace!("record from slot {} started", record.source_slot());
        self.state.active = Some(record);
        Ok(interval)
    }

    fn finish_record(&mut self) {
        let finished = self.shared.finished.load(Ordering::Relaxed).wrapping_add(1);
        self.shared.finished.store(finished, Ordering::Release);
        self.shared.executing.store(false, Ordering::Release);
        trace!("record {} finished", finished);
    }

    /// Accumulated time of the next tick, in nanoseconds since start.
    #[inline]
    pub fn interrupt_time(&self) -> u64 {
        self.state.interrupt_time_ns
    }

    /// Live drive positions and path velocity.
    pub fn current_state(&self) -> CurrentState {
        self.state.current_state(self.kinematics)
    }

    /// The executing record, if any.
    pub fn current_segment(&self) -> Option<&Dda> {
        self.state.active.as_ref()
    }

    /// The platform.
    #[inline]
    pub fn platform(&self) -> &P {
        &self.state.platform
    }

    /// The platform, mutably.
    #[inline]
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.state.platform
    }
}
