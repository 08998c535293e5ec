// src/motion/pose.rs - Cartesian pose and sample types shared by the loop
use std::time::Instant;

/// Number of joints on the arm (LBR-class, 7 DOF).
pub const JOINT_COUNT: usize = 7;

/// Joint positions (rad) or joint torques (Nm), J1..J7.
pub type JointVector = [f64; JOINT_COUNT];

/// 6-DOF Cartesian frame relative to the robot's world/base frame.
///
/// Translation is in millimetres, orientation is A/B/C Euler angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, z: f64, a: f64, b: f64, c: f64) -> Self {
        Self { x, y, z, a, b, c }
    }

    /// Copy of this pose with X/Y shifted by the given millimetre offset.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// A pose together with the monotonic instant it was sampled at.
#[derive(Debug, Clone, Copy)]
pub struct TimestampedSample {
    pub pose: Pose,
    pub timestamp: Instant,
}

impl TimestampedSample {
    pub fn new(pose: Pose, timestamp: Instant) -> Self {
        Self { pose, timestamp }
    }
}

/// Planar end-effector velocity in m/s.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity2D {
    pub vx: f64,
    pub vy: f64,
}

impl Velocity2D {
    pub const ZERO: Velocity2D = Velocity2D { vx: 0.0, vy: 0.0 };

    pub fn new(vx: f64, vy: f64) -> Self {
        Self { vx, vy }
    }

    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }
}
