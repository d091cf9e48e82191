//! Producer side of the planner.

use heapless::Vec;

use crate::config::MAX_DRIVES;

/// One requested move: where every drive should end up and how fast to get there.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionRequest {
    /// Absolute target, one coordinate per configured drive, in mm.
    pub endpoint: Vec<f32, MAX_DRIVES>,
    /// Path feedrate in mm/s.
    pub feedrate: f32,
    /// Stop a drive that meets an end stop in its direction of travel.
    pub check_end_stops: bool,
}

impl MotionRequest {
    /// Create a request. Coordinates beyond [`MAX_DRIVES`] are ignored.
    pub fn new(endpoint: &[f32], feedrate: f32, check_end_stops: bool) -> Self {
        Self {
            endpoint: endpoint.iter().copied().take(MAX_DRIVES).collect(),
            feedrate,
            check_end_stops,
        }
    }
}

/// Something that parses commands into moves.
pub trait MoveSource {
    /// Next move, if one is ready.
    fn read_move(&mut self) -> Option<MotionRequest>;

    /// Whether the source is working through a file.
    ///
    /// While streaming, the planner holds moves back for look-ahead. Otherwise each
    /// move is executed as soon as it is smoothed.
    fn is_streaming(&self) -> bool;
}
