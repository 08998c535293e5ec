// src/motion/constraint.rs - Hold-to-segment clamp for the sliding axis
use super::pose::Pose;

/// Endpoints closer than this (mm) leave no usable sliding range.
pub const MIN_SEGMENT_LENGTH_MM: f64 = 0.1;

/// Permitted 1D interval on world Y. Every other coordinate is pinned to the
/// nominal start pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlidingSegment {
    start: Pose,
    low: f64,
    high: f64,
}

impl SlidingSegment {
    /// `start` is the slide start pose, `y_end` the other endpoint. The
    /// endpoints may come in either order.
    pub fn new(start: Pose, y_end: f64) -> Self {
        Self {
            start,
            low: start.y.min(y_end),
            high: start.y.max(y_end),
        }
    }

    pub fn start_pose(&self) -> Pose {
        self.start
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.low, self.high)
    }

    pub fn length(&self) -> f64 {
        self.high - self.low
    }

    pub fn is_degenerate(&self) -> bool {
        self.length() < MIN_SEGMENT_LENGTH_MM
    }

    pub fn contains(&self, y: f64) -> bool {
        (self.low..=self.high).contains(&y)
    }

    /// Nearest pose on the segment. Only Y is taken from `current`.
    pub fn clamp(&self, current: &Pose) -> Pose {
        let y = if current.y.is_nan() {
            self.low
        } else {
            current.y.clamp(self.low, self.high)
        };
        Pose { y, ..self.start }
    }
}
