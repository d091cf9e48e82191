//! Motion module for step-planner.
//!
//! Provides the look-ahead queue, the execution record and the ring that carries
//! records from the background pass to the step interrupt.

mod dda;
mod geometry;
mod lock;
mod lookahead;
mod position;
mod profile;
mod ring;

pub use dda::{
    Dda, EndStopEvent, EndStopQueue, EndStopReceiver, EndStopSender, END_STOP_EVENT_CAPACITY,
};
pub use geometry::{
    axis_direction, cornering_speed, junction_cosine, Endpoint, Segment, NEUTRAL_COSINE,
};
pub use lock::{RingGuard, RingLock};
pub use lookahead::{EntryState, ForcedStop, LookAheadEntry, LookAheadQueue};
pub use position::DrivePositions;
pub use profile::{Direction, MotionPhase, MovementProfile, MovementType};
pub use ring::Ring;

/// Slots in the look-ahead ring.
pub const LOOK_AHEAD_RING_LENGTH: usize = 20;

/// Slots in the execution ring.
pub const DDA_RING_LENGTH: usize = 5;
