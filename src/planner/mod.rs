//! Move orchestrator.
//!
//! [`MovePlanner`] owns the look-ahead queue, the execution ring and the platform.
//! Two contexts drive it:
//!
//! - the background loop calls [`Background::spin`] (and [`Background::feed`] or
//!   [`Background::append`]) as often as it can;
//! - the step timer calls [`StepTimer::interrupt`] and re-arms itself with the
//!   interval it returns.
//!
//! [`MovePlanner::split`] hands each context its own handle, so the step interrupt
//! can preempt the background pass at any point. The handles share only the
//! execution ring, the queue of end-stop hits and a few counters. The ring cursors
//! are moved under a [`RingLock`]; a context that finds it held backs off.
//!
//! For single-context use, and for tests, every handle operation is also available
//! directly on [`MovePlanner`].

mod background;
mod builder;
mod source;
mod step_timer;

pub use background::Background;
pub use builder::MovePlannerBuilder;
pub use source::{MotionRequest, MoveSource};
pub use step_timer::StepTimer;

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use heapless::spsc::Queue;
use heapless::Vec;

use crate::config::{max_look_ahead_depth, validate_kinematics, Kinematics, MAX_DRIVES};
use crate::error::{MoveError, Result};
use crate::motion::{
    Dda, DrivePositions, EndStopQueue, Endpoint, LookAheadQueue, RingLock, DDA_RING_LENGTH,
    LOOK_AHEAD_RING_LENGTH,
};
use crate::platform::Platform;

use background::Planning;
use step_timer::Stepping;

/// Snapshot of where the machine is.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentState {
    /// Live position of every drive in mm, from the steps emitted so far.
    pub positions: Vec<f32, MAX_DRIVES>,
    /// Path velocity of the executing record in mm/s, zero when idle.
    pub feedrate: f32,
}

/// Queue occupancy and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Diagnostics {
    /// Moves smoothing may still change.
    pub look_ahead_pending: usize,
    /// Moves not yet released, committed ones included.
    pub look_ahead_unreleased: usize,
    /// Records waiting in the execution ring.
    pub dda_queued: usize,
    /// Whether a record is executing.
    pub executing: bool,
    /// Whether new moves are refused.
    pub no_more_moves: bool,
    /// Whether the last source seen was streaming.
    pub streaming: bool,
    /// Records run to completion.
    pub records_completed: u32,
    /// Hand-offs deferred because the execution ring was full.
    pub ring_full_deferrals: u32,
    /// End-stop overrides applied.
    pub end_stop_hits: u32,
}

/// State both contexts read. Each counter has a single writer.
#[derive(Debug, Default)]
struct Shared {
    /// Held by whichever context moves the execution ring cursors.
    lock: RingLock,
    /// Records run to completion. Written by the interrupt.
    finished: AtomicU32,
    /// Whether the interrupt holds a record. Written by the interrupt.
    executing: AtomicBool,
}

impl Shared {
    fn finished(&self) -> u32 {
        self.finished.load(Ordering::Acquire)
    }

    fn executing(&self) -> bool {
        self.executing.load(Ordering::Acquire)
    }
}

/// Look-ahead planner and step generator for a fixed set of drives.
///
/// `LA` and `DDA` are the look-ahead and execution ring lengths; each keeps two
/// slots free, so they hold `LA - 2` and `DDA - 2` moves.
pub struct MovePlanner<
    P: Platform,
    const LA: usize = LOOK_AHEAD_RING_LENGTH,
    const DDA: usize = DDA_RING_LENGTH,
> {
    kinematics: Kinematics,
    planning: Planning<LA>,
    stepping: Stepping<P>,
    records: Queue<Dda, DDA>,
    events: EndStopQueue,
    shared: Shared,
}

impl<P: Platform> MovePlanner<P> {
    /// Create a builder for a planner with the default ring lengths.
    pub fn builder() -> MovePlannerBuilder<P> {
        MovePlannerBuilder::new()
    }
}

impl<P: Platform, const LA: usize, const DDA: usize> MovePlanner<P, LA, DDA> {
    const RINGS_FIT: () = assert!(LA >= 3 && DDA >= 3, "rings need at least three slots");

    /// Create a planner resting at the origin.
    ///
    /// The look-ahead depth is clamped so the execution ring can stay full while
    /// that many moves are held back. Axis lengths for end-stop overrides are read
    /// from the platform here and on [`reset`](Self::reset).
    ///
    /// # Errors
    ///
    /// Returns the first problem [`validate_kinematics`] finds.
    pub fn new(kinematics: Kinematics, platform: P) -> Result<Self> {
        #[allow(clippy::let_unit_value)]
        let () = Self::RINGS_FIT;
        validate_kinematics(&kinematics)?;

        let origin = [0.0; MAX_DRIVES];
        let depth = kinematics
            .look_ahead_depth
            .clamp(1, max_look_ahead_depth(LA, DDA));
        let axis_lengths = axis_lengths_of(&platform, &kinematics);
        Ok(Self {
            planning: Planning::new(&origin, depth, axis_lengths),
            stepping: Stepping::new(platform, DrivePositions::at(&origin, &kinematics)),
            records: Queue::new(),
            events: EndStopQueue::new(),
            shared: Shared::default(),
            kinematics,
        })
    }

    /// Hand out the background and interrupt handles.
    ///
    /// The handles borrow the planner; it is whole again once both are dropped.
    pub fn split(&mut self) -> (Background<'_, LA, DDA>, StepTimer<'_, P, DDA>) {
        let (record_tx, record_rx) = self.records.split();
        let (event_tx, event_rx) = self.events.split();
        (
            Background::new(
                &self.kinematics,
                &mut self.planning,
                record_tx,
                event_rx,
                &self.shared,
            ),
            StepTimer::new(
                &self.kinematics,
                &mut self.stepping,
                record_rx,
                event_tx,
                &self.shared,
            ),
        )
    }

    /// Queue a move to `endpoint` at `feedrate` mm/s. See [`Background::append`].
    pub fn append(&mut self, endpoint: &[f32], feedrate: f32, check_end_stops: bool) -> Result<()> {
        let (mut background, _) = self.split();
        background.append(endpoint, feedrate, check_end_stops)
    }

    /// Pull at most one move from `source`. See [`Background::feed`].
    pub fn feed<S: MoveSource>(&mut self, source: &mut S) -> Result<bool> {
        let (mut background, _) = self.split();
        background.feed(source)
    }

    /// One pass of background work. See [`Background::spin`].
    pub fn spin(&mut self) -> Result<bool> {
        let (mut background, _) = self.split();
        background.spin()
    }

    /// Advance the step clock by one tick. See [`StepTimer::interrupt`].
    pub fn interrupt(&mut self) -> Result<u32> {
        let (_, mut step_timer) = self.split();
        step_timer.interrupt()
    }

    /// Accumulated time of the next tick, in nanoseconds since start.
    #[inline]
    pub fn interrupt_time(&self) -> u64 {
        self.stepping.interrupt_time_ns
    }

    /// Refuse new moves and report whether everything queued has been executed.
    /// See [`Background::all_moves_are_finished`].
    pub fn all_moves_are_finished(&mut self) -> bool {
        let (mut background, _) = self.split();
        background.all_moves_are_finished()
    }

    /// Accept moves again after [`all_moves_are_finished`](Self::all_moves_are_finished).
    pub fn resume_moving(&mut self) {
        let (mut background, _) = self.split();
        background.resume_moving();
    }

    /// Live drive positions and path velocity.
    pub fn current_state(&self) -> CurrentState {
        self.stepping.current_state(&self.kinematics)
    }

    /// The move in `slot` hit the low end stop on `drive`. See [`Background::hit_low_stop`].
    pub fn hit_low_stop(&mut self, drive: usize, slot: usize) -> Result<()> {
        let (mut background, _) = self.split();
        background.hit_low_stop(drive, slot)
    }

    /// The move in `slot` hit the high end stop on `drive`. See [`Background::hit_high_stop`].
    pub fn hit_high_stop(&mut self, drive: usize, slot: usize) -> Result<()> {
        let (mut background, _) = self.split();
        background.hit_high_stop(drive, slot)
    }

    /// Endpoint of the most recently queued move, for turning relative moves into
    /// absolute ones.
    pub fn last_queued_position(&self) -> &[f32] {
        self.planning.last_queued_position(&self.kinematics)
    }

    /// Discard all motion and declare the machine at rest on `position`.
    ///
    /// Also undoes [`exit`](Self::exit), clears no-more-moves mode and re-reads the
    /// axis lengths from the platform.
    pub fn reset(&mut self, position: &[f32]) -> Result<()> {
        let origin = endpoint_from(&self.kinematics, position)?;

        while self.records.dequeue().is_some() {}
        while self.events.dequeue().is_some() {}
        self.shared.executing.store(false, Ordering::Release);

        self.stepping.active = None;
        self.stepping
            .positions
            .set_endpoint(&origin, &self.kinematics);

        let axis_lengths = axis_lengths_of(&self.stepping.platform, &self.kinematics);
        self.planning
            .reset(&origin, axis_lengths, self.shared.finished());
        debug!("planner reset");
        Ok(())
    }

    /// Stop planning. See [`Background::exit`].
    pub fn exit(&mut self) {
        let (mut background, _) = self.split();
        background.exit();
    }

    /// Queue occupancy and counters.
    pub fn diagnostics(&self) -> Diagnostics {
        self.planning.diagnostics(self.records.len(), &self.shared)
    }

    /// The executing record, if any.
    pub fn current_segment(&self) -> Option<&Dda> {
        self.stepping.active.as_ref()
    }

    /// Read-only view of the look-ahead queue.
    #[inline]
    pub fn look_ahead(&self) -> &LookAheadQueue<LA> {
        &self.planning.look_ahead
    }

    /// Kinematics the planner was built with.
    #[inline]
    pub fn kinematics(&self) -> &Kinematics {
        &self.kinematics
    }

    /// The platform.
    #[inline]
    pub fn platform(&self) -> &P {
        &self.stepping.platform
    }

    /// The platform, mutably.
    #[inline]
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.stepping.platform
    }
}

fn axis_lengths_of<P: Platform>(platform: &P, kinematics: &Kinematics) -> Endpoint {
    let mut lengths = [0.0; MAX_DRIVES];
    for (d, length) in lengths.iter_mut().enumerate().take(kinematics.drive_count()) {
        *length = platform.axis_length(d);
    }
    lengths
}

fn endpoint_from(kinematics: &Kinematics, coordinates: &[f32]) -> Result<Endpoint> {
    let expected = kinematics.drive_count();
    if coordinates.len() != expected {
        return Err(MoveError::DriveCountMismatch {
            expected,
            actual: coordinates.len(),
        }
        .into());
    }
    let mut endpoint = [0.0; MAX_DRIVES];
    endpoint[..expected].copy_from_slice(coordinates);
    Ok(endpoint)
}
