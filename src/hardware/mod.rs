// src/hardware/mod.rs - Trait-based interfaces to the robot controller
//
// The loop only talks to the arm through these traits. The vendor motion
// executor and the torque sensors sit behind them; `simulator::SimulatedArm`
// and the test doubles implement them without hardware.
use crate::motion::compliance::ComplianceMode;
use crate::motion::pose::{JointVector, Pose};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MotionError {
    #[error("Motion command failed: {0}")]
    CommandFailed(String),
    #[error("Sensor read failed: {0}")]
    Sensor(String),
}

/// Target of a joint-space (point-to-point) move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointTarget {
    /// The controller's canonical home configuration.
    Home,
    /// Explicit joint angles in radians.
    Joints(JointVector),
    /// Cartesian goal reached with a joint-interpolated path.
    Pose(Pose),
}

/// Current flange pose in the world frame.
pub trait PoseSource {
    fn current_pose(&mut self) -> Result<Pose, MotionError>;
}

/// Joint encoder and torque sensor readings.
pub trait JointSensor {
    fn joint_positions(&mut self) -> Result<JointVector, MotionError>;
    fn joint_torques(&mut self) -> Result<JointVector, MotionError>;
}

/// Blocking motion commands. Each call returns once the segment has finished
/// or has failed.
pub trait MotionExecutor {
    /// Linear Cartesian move. `max_cartesian_speed` is in mm/s.
    fn move_linear(
        &mut self,
        target: &Pose,
        mode: &ComplianceMode,
        max_cartesian_speed: f64,
    ) -> Result<(), MotionError>;

    /// Joint-space move. `joint_velocity_rel` is a fraction of the joint speed limit.
    fn move_joint(
        &mut self,
        target: &JointTarget,
        mode: &ComplianceMode,
        joint_velocity_rel: f64,
    ) -> Result<(), MotionError>;
}

/// Everything the slider task needs from one arm.
pub trait RobotArm: PoseSource + JointSensor + MotionExecutor + Send {}

impl<T> RobotArm for T where T: PoseSource + JointSensor + MotionExecutor + Send {}
