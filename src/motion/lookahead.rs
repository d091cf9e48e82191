//! Look-ahead queue and two-pass velocity smoothing.
//!
//! Entries are appended at the add cursor and wait in the queue until the planner
//! commits them to the execution ring. Between the commit cursor and the add cursor
//! lie the *pending* entries, the ones smoothing may still change. Between the get
//! cursor and the commit cursor lie committed entries whose records have not yet
//! finished executing.
//!
//! Each entry stores `v`, the planned velocity at its **end**. Its entry velocity is
//! the `v` of the slot before it, so consecutive segments always meet at the same
//! speed.

use libm::sqrtf;

use crate::config::Kinematics;
use crate::error::{MoveError, Result};

use super::dda::Dda;
use super::geometry::{
    axis_direction, cornering_speed, junction_cosine, Endpoint, Segment, NEUTRAL_COSINE,
};
use super::ring::Ring;

/// Progress of an entry through smoothing and execution.
///
/// States only move forward, except for the explicit reset to `Unprocessed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EntryState {
    /// Freshly appended, or invalidated by a new successor or an end-stop override.
    Unprocessed,
    /// Path limits and cornering ceiling computed.
    GeometrySet,
    /// Forward pass assigned an exit velocity.
    Smoothed,
    /// Handed to the execution ring.
    Complete,
    /// Its record finished; the slot may be reused.
    Released,
}

impl EntryState {
    /// Check if smoothing may still change the entry.
    #[inline]
    pub fn is_pending(self) -> bool {
        self < EntryState::Complete
    }
}

/// Override pinning an entry's exit velocity to zero after an end-stop hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ForcedStop {
    /// Drive whose endpoint was moved to the stop.
    pub drive: usize,
}

/// One requested move waiting in the look-ahead queue.
#[derive(Debug, Clone)]
pub struct LookAheadEntry {
    endpoint: Endpoint,
    direction: Endpoint,
    feedrate: f32,
    v: f32,
    check_end_stops: bool,
    cosine: f32,
    forced_stop: Option<ForcedStop>,
    instant_dv: f32,
    distance: f32,
    acceleration: f32,
    speed_cap: f32,
    ceiling: f32,
    state: EntryState,
}

impl LookAheadEntry {
    /// Create an unprocessed entry.
    pub fn new(endpoint: Endpoint, feedrate: f32, check_end_stops: bool) -> Self {
        Self {
            endpoint,
            direction: [0.0; crate::config::MAX_DRIVES],
            feedrate,
            v: 0.0,
            check_end_stops,
            cosine: NEUTRAL_COSINE,
            forced_stop: None,
            instant_dv: 0.0,
            distance: 0.0,
            acceleration: 0.0,
            speed_cap: 0.0,
            ceiling: 0.0,
            state: EntryState::Unprocessed,
        }
    }

    /// A released slot holding a position the machine is at rest on.
    fn seed(endpoint: Endpoint) -> Self {
        Self {
            state: EntryState::Released,
            ..Self::new(endpoint, 0.0, false)
        }
    }

    /// Target position, one coordinate per drive.
    #[inline]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Requested feedrate in mm/s.
    #[inline]
    pub fn feedrate(&self) -> f32 {
        self.feedrate
    }

    /// Planned velocity at the end of the move.
    #[inline]
    pub fn v(&self) -> f32 {
        self.v
    }

    /// Whether end stops are checked while executing.
    #[inline]
    pub fn check_end_stops(&self) -> bool {
        self.check_end_stops
    }

    /// Cosine of the turn from the previous move into this one.
    #[inline]
    pub fn cosine(&self) -> f32 {
        self.cosine
    }

    /// End-stop override, if one was applied.
    #[inline]
    pub fn forced_stop(&self) -> Option<ForcedStop> {
        self.forced_stop
    }

    /// Path speed change the moving drives take without ramping.
    #[inline]
    pub fn instant_dv(&self) -> f32 {
        self.instant_dv
    }

    /// Upper bound on `v` from feedrates and the junction with the next move.
    #[inline]
    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Lifecycle state.
    #[inline]
    pub fn state(&self) -> EntryState {
        self.state
    }

    /// Check if the slot may be reused.
    #[inline]
    pub fn is_released(&self) -> bool {
        self.state == EntryState::Released
    }
}

/// Fixed-capacity queue of moves awaiting smoothing and execution.
#[derive(Debug)]
pub struct LookAheadQueue<const N: usize> {
    ring: Ring<LookAheadEntry, N>,
    commit: usize,
    dirty: bool,
}

impl<const N: usize> LookAheadQueue<N> {
    /// Create an empty queue with the machine at rest on `origin`.
    pub fn new(origin: &Endpoint) -> Self {
        Self {
            ring: Ring::from_fn(|_| LookAheadEntry::seed(*origin)),
            commit: 0,
            dirty: false,
        }
    }

    /// Discard every entry and rest the machine on `origin`.
    pub fn reset(&mut self, origin: &Endpoint) {
        for slot in 0..N {
            self.ring[slot] = LookAheadEntry::seed(*origin);
        }
        self.ring.clear_at(0);
        self.commit = 0;
        self.dirty = false;
    }

    /// Entries smoothing may still change.
    #[inline]
    pub fn pending(&self) -> usize {
        (self.ring.add_index() + N - self.commit) % N
    }

    /// Entries not yet released, committed ones included.
    #[inline]
    pub fn unreleased(&self) -> usize {
        self.ring.len()
    }

    /// Check if an append would be refused.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full() || !self.ring[self.ring.add_index()].is_released()
    }

    /// Check if a move was appended or overridden since the last smoothing pass.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Oldest pending slot.
    #[inline]
    pub fn commit_index(&self) -> usize {
        self.commit
    }

    /// Pending slots, oldest first.
    pub fn pending_slots(&self) -> impl Iterator<Item = usize> {
        Ring::<LookAheadEntry, N>::span(self.commit, self.ring.add_index())
    }

    /// Endpoint of the most recent move, or the rest position.
    #[inline]
    pub fn last_endpoint(&self) -> &Endpoint {
        &self.ring[Ring::<LookAheadEntry, N>::prev(self.ring.add_index())].endpoint
    }

    /// Entry in a slot.
    pub fn entry(&self, slot: usize) -> Option<&LookAheadEntry> {
        (slot < N).then(|| &self.ring[slot])
    }

    /// Entry velocity of the move in `slot`.
    #[inline]
    pub fn entry_velocity(&self, slot: usize) -> f32 {
        self.ring[Ring::<LookAheadEntry, N>::prev(slot)].v
    }

    /// Start position of the move in `slot`.
    #[inline]
    pub fn start_of(&self, slot: usize) -> &Endpoint {
        &self.ring[Ring::<LookAheadEntry, N>::prev(slot)].endpoint
    }

    /// Append a move.
    ///
    /// Returns the slot written, or `None` when the move steps no drive and is dropped.
    /// The previous tail, if still pending, goes back to `Unprocessed` because its
    /// cornering ceiling depends on this move.
    pub fn append(
        &mut self,
        endpoint: &Endpoint,
        feedrate: f32,
        check_end_stops: bool,
        kinematics: &Kinematics,
    ) -> Result<Option<usize>> {
        if self.is_full() {
            return Err(MoveError::QueueFull.into());
        }

        let add = self.ring.add_index();
        let prev = Ring::<LookAheadEntry, N>::prev(add);
        let start = self.ring[prev].endpoint;
        if Segment::between(&start, endpoint, kinematics).is_empty() {
            trace!("dropping move with no steps");
            return Ok(None);
        }

        let direction = axis_direction(&start, endpoint, kinematics);
        let previous = &mut self.ring[prev];
        let cosine = junction_cosine(&previous.direction, &direction);
        if previous.state.is_pending() {
            previous.state = EntryState::Unprocessed;
        }

        let mut entry = LookAheadEntry::new(*endpoint, feedrate, check_end_stops);
        entry.direction = direction;
        entry.cosine = cosine;
        self.ring[add] = entry;
        let slot = self.ring.commit_add().ok_or(MoveError::QueueFull)?;
        self.dirty = true;

        trace!("queued move in slot {}, cosine {}", slot, cosine);
        Ok(Some(slot))
    }

    /// Run both smoothing passes over the pending entries, if anything changed.
    pub fn do_look_ahead(&mut self, kinematics: &Kinematics) {
        if !self.dirty {
            return;
        }
        self.dirty = false;

        let add = self.ring.add_index();

        for slot in Ring::<LookAheadEntry, N>::span(self.commit, add) {
            if self.ring[slot].state == EntryState::Unprocessed {
                self.set_limits(slot, kinematics);
            }
        }

        for slot in Ring::<LookAheadEntry, N>::span(self.commit, add) {
            if self.ring[slot].state == EntryState::Unprocessed {
                self.ring[slot].ceiling = self.ceiling_of(slot, kinematics);
                self.ring[slot].state = EntryState::GeometrySet;
            }
        }

        // Forward pass: as fast as the ceiling allows and the entry speed can reach
        for slot in Ring::<LookAheadEntry, N>::span(self.commit, add) {
            let u = self.entry_velocity(slot);
            let entry = &mut self.ring[slot];
            let reachable = sqrtf(u * u + 2.0 * entry.acceleration * entry.distance);
            entry.v = entry.ceiling.min(reachable);
            entry.state = EntryState::Smoothed;
        }

        self.derive_profiles(kinematics);
    }

    fn set_limits(&mut self, slot: usize, kinematics: &Kinematics) {
        let segment = Segment::between(self.start_of(slot), &self.ring[slot].endpoint, kinematics);
        let entry = &mut self.ring[slot];
        entry.distance = segment.distance;
        entry.acceleration = segment.acceleration;
        entry.speed_cap = entry.feedrate.min(segment.max_speed);
        entry.instant_dv = if segment.instant_dv.is_finite() {
            segment.instant_dv
        } else {
            0.0
        };
    }

    fn ceiling_of(&self, slot: usize, kinematics: &Kinematics) -> f32 {
        let entry = &self.ring[slot];
        let next = Ring::<LookAheadEntry, N>::next(slot);
        if entry.forced_stop.is_some() || next == self.ring.add_index() {
            return 0.0;
        }

        let successor = &self.ring[next];
        let corner = cornering_speed(
            successor.cosine,
            entry.acceleration.min(successor.acceleration),
            kinematics.junction_deviation,
        )
        .max(entry.instant_dv.min(successor.instant_dv));

        entry.speed_cap.min(successor.speed_cap).min(corner)
    }

    /// Walk the pending entries until every one yields a stable profile.
    ///
    /// A lowered exit velocity is kept and the walk moves on; a lowered entry velocity
    /// is pushed into the predecessor and the walk steps back to it. A committed
    /// predecessor cannot change, so the entry instead leaves at the slowest speed it
    /// can reach from there.
    fn derive_profiles(&mut self, kinematics: &Kinematics) {
        let add = self.ring.add_index();
        let mut scratch = Dda::default();
        let mut slot = self.commit;
        let mut budget = 8 * N;

        while slot != add {
            if budget == 0 {
                warn!("look-ahead did not settle, slot {}", slot);
                break;
            }
            budget -= 1;

            let prev = Ring::<LookAheadEntry, N>::prev(slot);
            let mut u = self.ring[prev].v;
            let mut v = self.ring[slot].v;
            let start = self.ring[prev].endpoint;
            let profile = scratch.init(&start, &self.ring[slot], kinematics, &mut u, &mut v);
            if profile.is_stable() {
                slot = Ring::<LookAheadEntry, N>::next(slot);
                continue;
            }

            self.ring[slot].v = v;
            if u < self.ring[prev].v {
                if slot != self.commit {
                    self.ring[prev].v = u;
                    slot = prev;
                    continue;
                }

                let fixed = self.ring[prev].v;
                let reach = 2.0 * scratch.acceleration() * scratch.distance();
                let slowest = sqrtf((fixed * fixed - reach).max(0.0));
                debug!("slot {} cannot slow its committed predecessor, exit {}", slot, slowest);
                self.ring[slot].v = self.ring[slot].v.max(slowest);
                slot = Ring::<LookAheadEntry, N>::next(slot);
            }
        }
    }

    /// Oldest pending entry, if it may be committed now.
    ///
    /// While streaming, `depth` entries are held back so later moves can still shape
    /// their velocities. When `flushing`, every smoothed entry is released at once.
    pub fn next_ready(&self, depth: usize, flushing: bool) -> Option<usize> {
        let pending = self.pending();
        if pending == 0 || self.ring[self.commit].state != EntryState::Smoothed {
            return None;
        }
        (pending > depth || flushing).then_some(self.commit)
    }

    /// Mark the oldest pending entry as queued for execution with exit velocity `exit`.
    pub fn mark_committed(&mut self, slot: usize, exit: f32) {
        debug_assert_eq!(slot, self.commit);
        let entry = &mut self.ring[slot];
        if entry.v != exit {
            entry.v = exit;
            self.dirty = true;
        }
        entry.state = EntryState::Complete;
        self.commit = Ring::<LookAheadEntry, N>::next(slot);
    }

    /// Release the oldest committed entry once its record has finished.
    pub fn release_oldest(&mut self) -> Option<usize> {
        if self.ring.get_index() == self.commit {
            return None;
        }
        let slot = self.ring.advance_get()?;
        self.ring[slot].state = EntryState::Released;
        Some(slot)
    }

    /// Pin the move in `slot` to stop dead with `drive` at `position`.
    ///
    /// Neighbouring pending entries are re-planned: the move before it sees a new
    /// successor and the move after it starts from a new position. Directions and
    /// junction cosines touching the moved endpoint are recomputed, so the corners on
    /// either side of the following move are capped for their new angles.
    pub fn force_zero_end_speed(
        &mut self,
        slot: usize,
        drive: usize,
        position: f32,
        kinematics: &Kinematics,
    ) {
        let entry = &mut self.ring[slot];
        entry.endpoint[drive] = position;
        entry.v = 0.0;
        entry.forced_stop = Some(ForcedStop { drive });

        let add = self.ring.add_index();
        let prev = Ring::<LookAheadEntry, N>::prev(slot);
        let next = Ring::<LookAheadEntry, N>::next(slot);
        self.refresh_geometry(slot, kinematics);
        if next != add {
            self.refresh_geometry(next, kinematics);
            let after = Ring::<LookAheadEntry, N>::next(next);
            if after != add {
                self.ring[after].cosine =
                    junction_cosine(&self.ring[next].direction, &self.ring[after].direction);
            }
        }

        for s in [prev, slot, next] {
            if s != add && self.ring[s].state.is_pending() {
                self.ring[s].state = EntryState::Unprocessed;
            }
        }
        self.dirty = true;
    }

    fn refresh_geometry(&mut self, slot: usize, kinematics: &Kinematics) {
        let prev = Ring::<LookAheadEntry, N>::prev(slot);
        let direction = axis_direction(self.start_of(slot), &self.ring[slot].endpoint, kinematics);
        let cosine = junction_cosine(&self.ring[prev].direction, &direction);
        let entry = &mut self.ring[slot];
        entry.direction = direction;
        entry.cosine = cosine;
    }
}
