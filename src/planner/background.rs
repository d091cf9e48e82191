//! Background side of the planner: look-ahead, smoothing and record hand-off.

use core::sync::atomic::{fence, Ordering};

use heapless::spsc::Producer;

use crate::config::Kinematics;
use crate::error::{MoveError, Result};
use crate::motion::{Dda, EndStopReceiver, Endpoint, LookAheadQueue, RingLock};
use crate::platform::EndStopHit;

use super::{endpoint_from, Diagnostics, MotionRequest, MoveSource, Shared};

/// State only the background pass touches.
#[derive(Debug)]
pub(super) struct Planning<const LA: usize> {
    pub(super) look_ahead: LookAheadQueue<LA>,
    depth: usize,
    axis_lengths: Endpoint,
    /// Finished records already released from the look-ahead queue.
    released: u32,
    no_more_moves: bool,
    streaming: bool,
    running: bool,
    ring_full_deferrals: u32,
    end_stop_hits: u32,
}

impl<const LA: usize> Planning<LA> {
    pub(super) fn new(origin: &Endpoint, depth: usize, axis_lengths: Endpoint) -> Self {
        Self {
            look_ahead: LookAheadQueue::new(origin),
            depth,
            axis_lengths,
            released: 0,
            no_more_moves: false,
            streaming: false,
            running: true,
            ring_full_deferrals: 0,
            end_stop_hits: 0,
        }
    }

    pub(super) fn reset(&mut self, origin: &Endpoint, axis_lengths: Endpoint, finished: u32) {
        self.look_ahead.reset(origin);
        self.axis_lengths = axis_lengths;
        self.released = finished;
        self.no_more_moves = false;
        self.running = true;
    }

    fn flushing(&self) -> bool {
        self.no_more_moves || !self.streaming
    }

    pub(super) fn last_queued_position(&self, kinematics: &Kinematics) -> &[f32] {
        &self.look_ahead.last_endpoint()[..kinematics.drive_count()]
    }

    pub(super) fn diagnostics(&self, dda_queued: usize, shared: &Shared) -> Diagnostics {
        Diagnostics {
            look_ahead_pending: self.look_ahead.pending(),
            look_ahead_unreleased: self.look_ahead.unreleased(),
            dda_queued,
            executing: shared.executing(),
            no_more_moves: self.no_more_moves,
            streaming: self.streaming,
            records_completed: shared.finished(),
            ring_full_deferrals: self.ring_full_deferrals,
            end_stop_hits: self.end_stop_hits,
        }
    }
}

/// Handle for the background loop.
///
/// Appends moves, smooths them and feeds the execution ring. Obtained from
/// [`MovePlanner::split`](super::MovePlanner::split).
pub struct Background<'a, const LA: usize, const DDA: usize> {
    kinematics: &'a Kinematics,
    state: &'a mut Planning<LA>,
    records: Producer<'a, Dda, DDA>,
    events: EndStopReceiver<'a>,
    shared: &'a Shared,
}

impl<'a, const LA: usize, const DDA: usize> Background<'a, LA, DDA> {
    pub(super) fn new(
        kinematics: &'a Kinematics,
        state: &'a mut Planning<LA>,
        records: Producer<'a, Dda, DDA>,
        events: EndStopReceiver<'a>,
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

    /// Queue a move to `endpoint` at `feedrate` mm/s.
    ///
    /// # Errors
    ///
    /// - `Suspended` after [`all_moves_are_finished`](Self::all_moves_are_finished)
    ///   until [`resume_moving`](Self::resume_moving), or after [`exit`](Self::exit)
    /// - `DriveCountMismatch` unless there is one coordinate per drive
    /// - `InvalidFeedrate` unless the feedrate is finite and positive
    /// - `QueueFull` when no slot can be reused yet; retry after the next spin
    pub fn append(&mut self, endpoint: &[f32], feedrate: f32, check_end_stops: bool) -> Result<()> {
        if self.state.no_more_moves || !self.state.running {
            return Err(MoveError::Suspended.into());
        }
        let endpoint = endpoint_from(self.kinematics, endpoint)?;
        if !(feedrate.is_finite() && feedrate > 0.0) {
            return Err(MoveError::InvalidFeedrate(feedrate).into());
        }

        if self.state.look_ahead.is_full() {
            trace!("look-ahead queue full");
            return Err(MoveError::QueueFull.into());
        }
        self.state
            .look_ahead
            .append(&endpoint, feedrate, check_end_stops, self.kinematics)
            .map(|_| ())
    }

    /// Pull at most one move from `source`.
    ///
    /// Returns `Ok(true)` when a move was queued. Also records whether the source is
    /// streaming, which decides how many moves are held back for look-ahead.
    pub fn feed<S: MoveSource>(&mut self, source: &mut S) -> Result<bool> {
        self.state.streaming = source.is_streaming();
        if self.state.no_more_moves || !self.state.running || self.state.look_ahead.is_full() {
            return Ok(false);
        }
        let Some(MotionRequest {
            endpoint,
            feedrate,
            check_end_stops,
        }) = source.read_move()
        else {
            return Ok(false);
        };
        self.append(&endpoint, feedrate, check_end_stops)?;
        Ok(true)
    }

    /// One pass of background work.
    ///
    /// Applies end-stop hits reported by the interrupt, releases moves whose records
    /// have finished, smooths the pending moves and hands the next ready one to the
    /// execution ring.
    ///
    /// Returns `Ok(true)` when a record was queued and `Ok(false)` when nothing was
    /// ready. `RingFull` and `LockUnavailable` mean "not now": call again later.
    pub fn spin(&mut self) -> Result<bool> {
        if !self.state.running {
            return Ok(false);
        }

        // Read before draining hits, so every hit of a counted record is applied
        // while its slot is still unreleased
        let finished = self.shared.finished();
        self.apply_end_stop_events()?;
        self.release_finished(finished);
        self.state.look_ahead.do_look_ahead(self.kinematics);
        self.queue_next()
    }

    fn apply_end_stop_events(&mut self) -> Result<()> {
        while let Some(event) = self.events.dequeue() {
            match event.hit {
                EndStopHit::Low => self.hit_low_stop(event.drive, event.slot)?,
                EndStopHit::High => self.hit_high_stop(event.drive, event.slot)?,
                EndStopHit::None => {}
            }
        }
        Ok(())
    }

    fn release_finished(&mut self, finished: u32) {
        let count = finished.wrapping_sub(self.state.released);
        for _ in 0..count {
            if self.state.look_ahead.release_oldest().is_none() {
                warn!("finished record without a committed move");
                break;
            }
        }
        self.state.released = finished;
    }

    fn queue_next(&mut self) -> Result<bool> {
        let Some(slot) = self
            .state
            .look_ahead
            .next_ready(self.state.depth, self.state.flushing())
        else {
            return Ok(false);
        };

        let shared = self.shared;
        let Some(_guard) = shared.lock.try_acquire() else {
            return Err(MoveError::LockUnavailable.into());
        };
        if self.records.len() >= DDA - 2 {
            self.state.ring_full_deferrals = self.state.ring_full_deferrals.wrapping_add(1);
            trace!("execution ring full, slot {} deferred", slot);
            return Err(MoveError::RingFull.into());
        }

        let look_ahead = &self.state.look_ahead;
        let entry = look_ahead.entry(slot).ok_or(MoveError::InvalidSlot(slot))?;
        let start = *look_ahead.start_of(slot);
        let mut u = look_ahead.entry_velocity(slot);
        let mut v = entry.v();

        let mut record = Dda::default();
        let mut profile = record.init(&start, entry, self.kinematics, &mut u, &mut v);
        if !profile.is_stable() {
            warn!("slot {} committed unsettled, entry {} exit {}", slot, u, v);
            profile = record.init(&start, entry, self.kinematics, &mut u, &mut v);
        }
        record.set_source_slot(slot);

        if self.records.enqueue(record).is_err() {
            return Err(MoveError::RingFull.into());
        }
        self.state.look_ahead.mark_committed(slot, v);
        debug!("slot {} queued, {}", slot, profile);
        Ok(true)
    }

    /// Refuse new moves and report whether everything queued has been executed.
    ///
    /// Poll until it returns `true`, do the work that needed the machine at rest,
    /// then call [`resume_moving`](Self::resume_moving). Until then every append is
    /// refused with `Suspended`, so forgetting the resume stalls motion for good.
    pub fn all_moves_are_finished(&mut self) -> bool {
        if !self.state.no_more_moves {
            debug!("draining: no more moves");
        }
        self.state.no_more_moves = true;
        if self.state.look_ahead.pending() != 0 || self.records.len() != 0 {
            return false;
        }
        // The interrupt flags a record as executing before taking it off the ring
        fence(Ordering::Acquire);
        !self.shared.executing.load(Ordering::Acquire)
    }

    /// Accept moves again after [`all_moves_are_finished`](Self::all_moves_are_finished).
    pub fn resume_moving(&mut self) {
        if self.state.no_more_moves {
            debug!("resuming moves");
        }
        self.state.no_more_moves = false;
    }

    /// The move in `slot` hit the low end stop on `drive`.
    ///
    /// Its endpoint for that drive becomes 0 and its exit velocity is pinned to zero.
    pub fn hit_low_stop(&mut self, drive: usize, slot: usize) -> Result<()> {
        self.check_override(drive, slot)?;
        self.force_stop(drive, slot, 0.0);
        Ok(())
    }

    /// The move in `slot` hit the high end stop on `drive`.
    ///
    /// Its endpoint for that drive becomes the platform's axis length and its exit
    /// velocity is pinned to zero.
    pub fn hit_high_stop(&mut self, drive: usize, slot: usize) -> Result<()> {
        self.check_override(drive, slot)?;
        let length = self.state.axis_lengths[drive];
        self.force_stop(drive, slot, length);
        Ok(())
    }

    fn check_override(&self, drive: usize, slot: usize) -> Result<()> {
        // Extruders have no end stops
        if drive >= self.kinematics.drive_count() || !self.kinematics.drive(drive).is_axis() {
            return Err(MoveError::InvalidDrive(drive).into());
        }
        if slot >= LA {
            return Err(MoveError::InvalidSlot(slot).into());
        }
        Ok(())
    }

    fn force_stop(&mut self, drive: usize, slot: usize, position: f32) {
        debug!("end stop override: drive {} slot {} at {}", drive, slot, position);
        self.state
            .look_ahead
            .force_zero_end_speed(slot, drive, position, self.kinematics);
        self.state.end_stop_hits = self.state.end_stop_hits.wrapping_add(1);
    }

    /// Endpoint of the most recently queued move.
    pub fn last_queued_position(&self) -> &[f32] {
        self.state.last_queued_position(self.kinematics)
    }

    /// Stop planning. Spins do nothing and appends are refused until
    /// [`MovePlanner::reset`](super::MovePlanner::reset).
    ///
    /// Records already in the execution ring still run.
    pub fn exit(&mut self) {
        self.state.running = false;
        debug!("planner stopped");
    }

    /// Queue occupancy and counters.
    pub fn diagnostics(&self) -> Diagnostics {
        self.state.diagnostics(self.records.len(), self.shared)
    }

    /// Read-only view of the look-ahead queue.
    #[inline]
    pub fn look_ahead(&self) -> &LookAheadQueue<LA> {
        &self.state.look_ahead
    }

    /// Lock guarding the execution ring cursors.
    #[inline]
    pub fn ring_lock(&self) -> &'a RingLock {
        &self.shared.lock
    }
}
