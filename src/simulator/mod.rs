//! Software arm for running the slider task without a controller attached.
//!
//! The model is deliberately small: each linear move relaxes the flange
//! toward its impedance equilibrium with a first-order response, an
//! operator push acts along world Y, and pose reads carry uniform noise.
//! Joint angles and torques are synthesised from the pose and are only
//! meant to give the telemetry file plausible columns.

pub mod clock;

pub use clock::SimClock;

use crate::config::SimulationConfig;
use crate::hardware::{JointSensor, JointTarget, MotionError, MotionExecutor, PoseSource};
use crate::motion::compliance::ComplianceMode;
use crate::motion::pose::{JOINT_COUNT, JointVector, Pose};
use crate::scheduler::TimeInterface;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;
use std::time::Instant;

const MM_PER_M: f64 = 1000.0;

/// Flange pose of the home configuration.
pub const HOME_POSE: Pose = Pose {
    x: 400.0,
    y: 0.0,
    z: 600.0,
    a: -180.0,
    b: 0.0,
    c: -180.0,
};

pub struct SimulatedArm<T: TimeInterface> {
    config: SimulationConfig,
    clock: T,
    pose: Pose,
    joints: JointVector,
    push_n: f64,
    started: Instant,
    last_update: Instant,
    rng: StdRng,
    linear_moves: u64,
    joint_moves: u64,
    fail_linear_at: Option<u64>,
    fail_joint_at: Option<u64>,
    torque_reads: u64,
    fail_torque_read_at: Option<u64>,
    last_target: Option<Pose>,
}

impl<T: TimeInterface> SimulatedArm<T> {
    pub fn new(config: &SimulationConfig, clock: T) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let now = clock.now_monotonic();
        tracing::info!(
            "Simulated arm: tau={}s push={}N@{}Hz noise={}mm",
            config.response_time_s,
            config.push_amplitude_n,
            config.push_frequency_hz,
            config.noise_mm
        );
        Self {
            config: config.clone(),
            clock,
            pose: HOME_POSE,
            joints: [0.0; JOINT_COUNT],
            push_n: 0.0,
            started: now,
            last_update: now,
            rng,
            linear_moves: 0,
            joint_moves: 0,
            fail_linear_at: None,
            fail_joint_at: None,
            torque_reads: 0,
            fail_torque_read_at: None,
            last_target: None,
        }
    }

    /// Fail the `n`-th linear move (1-based).
    pub fn fail_linear_move_at(mut self, n: u64) -> Self {
        self.fail_linear_at = Some(n);
        self
    }

    /// Fail the `n`-th joint move (1-based).
    pub fn fail_joint_move_at(mut self, n: u64) -> Self {
        self.fail_joint_at = Some(n);
        self
    }

    /// Fail the `n`-th joint torque read (1-based) with a sensor error.
    pub fn fail_torque_read_at(mut self, n: u64) -> Self {
        self.fail_torque_read_at = Some(n);
        self
    }

    /// Pose without sensor noise.
    pub fn true_pose(&self) -> Pose {
        self.pose
    }

    pub fn linear_moves(&self) -> u64 {
        self.linear_moves
    }

    pub fn joint_moves(&self) -> u64 {
        self.joint_moves
    }

    pub fn last_target(&self) -> Option<Pose> {
        self.last_target
    }

    fn push_force(&self, now: Instant) -> f64 {
        let t = now.saturating_duration_since(self.started).as_secs_f64();
        self.config.push_amplitude_n * (TAU * self.config.push_frequency_hz * t).sin()
    }

    fn noise(&mut self) -> f64 {
        let n = self.config.noise_mm;
        if n > 0.0 { self.rng.random_range(-n..=n) } else { 0.0 }
    }
}

/// Plausible joint angles for a pose. Not a kinematic model.
fn synthesize_joints(pose: &Pose) -> JointVector {
    let [x, y, z] = pose.position();
    let reach = x.hypot(y) / MM_PER_M;
    [
        y.atan2(x),
        0.9 - reach,
        0.0,
        -1.2 - 0.5 * (z / MM_PER_M),
        0.0,
        1.2 + 0.3 * reach,
        pose.a.to_radians(),
    ]
}

impl<T: TimeInterface> PoseSource for SimulatedArm<T> {
    fn current_pose(&mut self) -> Result<Pose, MotionError> {
        let (dx, dy) = (self.noise(), self.noise());
        Ok(self.pose.translated(dx, dy))
    }
}

impl<T: TimeInterface> JointSensor for SimulatedArm<T> {
    fn joint_positions(&mut self) -> Result<JointVector, MotionError> {
        Ok(self.joints)
    }

    fn joint_torques(&mut self) -> Result<JointVector, MotionError> {
        self.torque_reads += 1;
        if self.fail_torque_read_at == Some(self.torque_reads) {
            return Err(MotionError::Sensor(format!(
                "injected torque read failure on read {}",
                self.torque_reads
            )));
        }
        let reach = self.pose.x.hypot(self.pose.y) / MM_PER_M;
        let mut torques = [0.0; JOINT_COUNT];
        torques[0] = self.push_n * reach;
        torques[1] = 9.81 * 2.0 * reach;
        torques[3] = -4.0 * reach;
        torques[5] = 0.3;
        Ok(torques)
    }
}

impl<T: TimeInterface> MotionExecutor for SimulatedArm<T> {
    fn move_linear(
        &mut self,
        target: &Pose,
        mode: &ComplianceMode,
        max_cartesian_speed: f64,
    ) -> Result<(), MotionError> {
        self.linear_moves += 1;
        if self.fail_linear_at == Some(self.linear_moves) {
            return Err(MotionError::CommandFailed(format!(
                "injected failure on linear move {}",
                self.linear_moves
            )));
        }

        let now = self.clock.now_monotonic();
        let dt = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        self.last_target = Some(*target);
        self.push_n = self.push_force(now);

        // Tool X runs along world Y, so the Y deflection uses stiffness_x.
        let goal_y = match mode.impedance() {
            Some(params) => target.y + self.push_n / params.stiffness_x * MM_PER_M,
            None => target.y,
        };
        let alpha = if dt > 0.0 {
            1.0 - (-dt / self.config.response_time_s).exp()
        } else {
            0.0
        };
        let mut step_x = (target.x - self.pose.x) * alpha;
        let mut step_y = (goal_y - self.pose.y) * alpha;
        let length = step_x.hypot(step_y);
        let max_step = max_cartesian_speed * dt;
        if length > max_step && length > 0.0 {
            step_x *= max_step / length;
            step_y *= max_step / length;
        }

        self.pose = Pose {
            x: self.pose.x + step_x,
            y: self.pose.y + step_y,
            ..*target
        };
        self.joints = synthesize_joints(&self.pose);
        tracing::trace!(
            "sim move {}: push={:.3}N pose=({:.2}, {:.2})",
            self.linear_moves,
            self.push_n,
            self.pose.x,
            self.pose.y
        );
        Ok(())
    }

    fn move_joint(
        &mut self,
        target: &JointTarget,
        _mode: &ComplianceMode,
        joint_velocity_rel: f64,
    ) -> Result<(), MotionError> {
        self.joint_moves += 1;
        if self.fail_joint_at == Some(self.joint_moves) {
            return Err(MotionError::CommandFailed(format!(
                "injected failure on joint move {}",
                self.joint_moves
            )));
        }
        tracing::debug!("sim joint move {:?} at {:.2} of max speed", target, joint_velocity_rel);
        match target {
            JointTarget::Home => {
                self.pose = HOME_POSE;
                self.joints = [0.0; JOINT_COUNT];
            }
            JointTarget::Joints(joints) => {
                self.joints = *joints;
            }
            JointTarget::Pose(pose) => {
                self.pose = *pose;
                self.joints = synthesize_joints(pose);
            }
        }
        self.last_update = self.clock.now_monotonic();
        Ok(())
    }
}
