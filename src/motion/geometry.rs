//! Segment geometry: step deltas, path limits and junction cornering.

use libm::sqrtf;

use crate::config::{DriveKind, Kinematics, MAX_DRIVES};

use super::profile::MovementType;

/// One coordinate per drive, in millimetres. Only the first `drive_count` are used.
pub type Endpoint = [f32; MAX_DRIVES];

/// Cosine used when either side of a junction has no axis motion.
pub const NEUTRAL_COSINE: f32 = 0.0;

/// Junctions closer to straight than this are not speed limited.
const STRAIGHT_JUNCTION: f32 = 0.9999;

/// Step-quantised geometry of the move between two endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Signed steps per drive.
    pub delta: [i64; MAX_DRIVES],
    /// Steps of the dominant drive.
    pub total_steps: u32,
    /// Path length in mm, over axis drives when any axis moves, else over extruders.
    pub distance: f32,
    /// Path acceleration every moving drive can follow.
    pub acceleration: f32,
    /// Path speed every moving drive can follow.
    pub max_speed: f32,
    /// Path speed change every moving drive can take without ramping.
    pub instant_dv: f32,
    /// Drive classes that move.
    pub movement: MovementType,
}

impl Segment {
    /// Quantise the move from `start` to `end` and derive its path limits.
    pub fn between(start: &Endpoint, end: &Endpoint, kinematics: &Kinematics) -> Self {
        let mut delta = [0i64; MAX_DRIVES];
        let mut delta_mm = [0.0f32; MAX_DRIVES];
        let mut total_steps = 0u64;
        let mut movement = MovementType::empty();

        for (d, limits) in kinematics.drives().iter().enumerate() {
            let steps = limits.mm_to_steps(end[d]) - limits.mm_to_steps(start[d]);
            if steps == 0 {
                continue;
            }
            delta[d] = steps;
            delta_mm[d] = limits.steps_to_mm(steps);
            total_steps = total_steps.max(steps.unsigned_abs());
            movement |= match limits.kind {
                DriveKind::X | DriveKind::Y => MovementType::XY_MOVE,
                DriveKind::Z => MovementType::Z_MOVE,
                DriveKind::Extruder => MovementType::E_MOVE,
            };
        }

        if movement.is_empty() {
            return Self {
                delta,
                total_steps: 0,
                distance: 0.0,
                acceleration: 0.0,
                max_speed: f32::INFINITY,
                instant_dv: 0.0,
                movement,
            };
        }

        let over_axes = movement.moves_axis();
        let squared: f32 = kinematics
            .drives()
            .iter()
            .zip(delta_mm.iter())
            .filter(|(limits, _)| limits.is_axis() == over_axes)
            .map(|(_, mm)| mm * mm)
            .sum();
        let distance = sqrtf(squared);

        let mut acceleration = f32::INFINITY;
        let mut max_speed = f32::INFINITY;
        let mut instant_dv = f32::INFINITY;
        for (limits, mm) in kinematics.drives().iter().zip(delta_mm.iter()) {
            if *mm == 0.0 {
                continue;
            }
            let scale = distance / mm.abs();
            acceleration = acceleration.min(limits.max_acceleration * scale);
            max_speed = max_speed.min(limits.max_feedrate * scale);
            instant_dv = instant_dv.min(limits.instant_dv * scale);
        }

        Self {
            delta,
            total_steps: total_steps.min(u32::MAX as u64) as u32,
            distance,
            acceleration,
            max_speed,
            instant_dv,
            movement,
        }
    }

    /// Check if no drive steps.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total_steps == 0
    }

    /// Path length covered by one tick of the dominant drive.
    #[inline]
    pub fn d_cross(&self) -> f32 {
        if self.total_steps == 0 {
            0.0
        } else {
            self.distance / self.total_steps as f32
        }
    }
}

/// Unit vector of the axis part of the move, or zero when no axis moves.
pub fn axis_direction(start: &Endpoint, end: &Endpoint, kinematics: &Kinematics) -> Endpoint {
    let mut direction = [0.0f32; MAX_DRIVES];
    let mut squared = 0.0f32;
    for (d, limits) in kinematics.drives().iter().enumerate() {
        if limits.is_axis() {
            direction[d] = end[d] - start[d];
            squared += direction[d] * direction[d];
        }
    }

    let length = sqrtf(squared);
    if length <= f32::EPSILON {
        return [0.0; MAX_DRIVES];
    }
    for component in direction.iter_mut() {
        *component /= length;
    }
    direction
}

/// Cosine of the turn between two unit directions, neutral when either is zero.
pub fn junction_cosine(previous: &Endpoint, next: &Endpoint) -> f32 {
    let is_zero = |v: &Endpoint| v.iter().all(|c| *c == 0.0);
    if is_zero(previous) || is_zero(next) {
        return NEUTRAL_COSINE;
    }

    let dot: f32 = previous.iter().zip(next.iter()).map(|(a, b)| a * b).sum();
    dot.clamp(-1.0, 1.0)
}

/// Fastest speed through a junction under the junction-deviation model.
///
/// The path is treated as an arc tangent to both segments whose closest approach
/// to the corner is `deviation`; the speed is the one at which the centripetal
/// acceleration on that arc equals `acceleration`. A straight junction is unlimited
/// and a full reversal yields zero.
pub fn cornering_speed(cosine: f32, acceleration: f32, deviation: f32) -> f32 {
    let cosine = cosine.clamp(-1.0, 1.0);
    // Half-angle factor: 1 for straight on, 0 for a reversal.
    let k = sqrtf((1.0 + cosine) * 0.5);
    if k >= STRAIGHT_JUNCTION {
        return f32::INFINITY;
    }
    sqrtf(acceleration * deviation * k / (1.0 - k))
}
