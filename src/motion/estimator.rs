// src/motion/estimator.rs - Finite-difference velocity estimation from pose samples
use super::pose::{TimestampedSample, Velocity2D};

const MM_PER_M: f64 = 1000.0;

/// Estimates planar end-effector velocity from consecutive pose samples.
///
/// Holds exactly one sample slot. Every call to [`VelocityEstimator::update`]
/// overwrites it, whether or not the time step was usable.
#[derive(Debug, Clone, Default)]
pub struct VelocityEstimator {
    last: Option<TimestampedSample>,
}

impl VelocityEstimator {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Seed the slot without producing an estimate.
    pub fn prime(&mut self, sample: TimestampedSample) {
        self.last = Some(sample);
    }

    pub fn last_sample(&self) -> Option<&TimestampedSample> {
        self.last.as_ref()
    }

    /// Estimate velocity against the stored sample, then store `sample`.
    ///
    /// Returns zero when no sample was stored yet or when the elapsed time
    /// is zero or negative.
    pub fn update(&mut self, sample: TimestampedSample) -> Velocity2D {
        let velocity = match self.last {
            Some(prev) => estimate(&prev, &sample),
            None => Velocity2D::ZERO,
        };
        self.last = Some(sample);
        velocity
    }
}

/// Velocity between two samples in m/s. Poses are in millimetres.
pub fn estimate(prev: &TimestampedSample, next: &TimestampedSample) -> Velocity2D {
    // checked_duration_since is None when the clock went backwards
    let dt = match next.timestamp.checked_duration_since(prev.timestamp) {
        Some(elapsed) => elapsed.as_secs_f64(),
        None => return Velocity2D::ZERO,
    };
    if dt <= 0.0 {
        return Velocity2D::ZERO;
    }
    let dx = (next.pose.x - prev.pose.x) / MM_PER_M;
    let dy = (next.pose.y - prev.pose.y) / MM_PER_M;
    let velocity = Velocity2D::new(dx / dt, dy / dt);
    if velocity.vx.is_finite() && velocity.vy.is_finite() {
        velocity
    } else {
        Velocity2D::ZERO
    }
}
