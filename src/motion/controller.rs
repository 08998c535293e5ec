// src/motion/controller.rs - Slider task: homing, transit and the sliding loop
use crate::config::Config;
use crate::hardware::{JointTarget, MotionError, RobotArm};
use crate::motion::compliance::ComplianceModes;
use crate::motion::constraint::SlidingSegment;
use crate::motion::estimator::VelocityEstimator;
use crate::motion::force_field::{ForceField, Offset2D};
use crate::motion::pose::{JointVector, Pose, TimestampedSample, Velocity2D};
use crate::scheduler::TimeInterface;
use crate::telemetry::{TelemetryRecord, TelemetrySink};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Fixed at startup, never switched while the task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlVariant {
    /// Velocity-dependent lateral force field on top of the clamp.
    ActiveForceField,
    /// Clamp only; the offset is always zero.
    PassiveHold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Homing,
    Transit,
    Sliding,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The cancellation token fired.
    Interrupted,
    /// The configured number of sliding iterations completed.
    IterationLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskReport {
    pub iterations: u64,
    pub final_state: TaskState,
    pub exit: ExitReason,
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Setup failed while {state:?}: {source}")]
    Setup {
        state: TaskState,
        #[source]
        source: MotionError,
    },
    #[error("Sliding loop failed after {iterations} iterations: {source}")]
    Runtime {
        iterations: u64,
        #[source]
        source: MotionError,
    },
    #[error("Task has already terminated")]
    AlreadyTerminated,
}

/// Everything the task reads from configuration, resolved once.
#[derive(Debug, Clone)]
pub struct SliderSettings {
    pub segment: SlidingSegment,
    pub modes: ComplianceModes,
    pub variant: ControlVariant,
    /// N per (m/s).
    pub strength_k: f64,
    /// mm/s.
    pub max_cartesian_speed: f64,
    pub loop_period: Duration,
    /// Radians.
    pub safe_joints: JointVector,
    pub safe_joint_speed_rel: f64,
    pub approach_joint_speed_rel: f64,
    /// Stop after this many sliding iterations. `None` runs until cancelled.
    pub iteration_limit: Option<u64>,
}

impl SliderSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            segment: config.sliding_segment(),
            modes: config.compliance_modes(),
            variant: config.control_variant(),
            strength_k: config.force_field.strength_k,
            max_cartesian_speed: config.motion.max_cartesian_speed_mm_s,
            loop_period: Duration::from_millis(config.motion.loop_period_ms),
            safe_joints: config.motion.safe_joints_rad(),
            safe_joint_speed_rel: config.motion.safe_joint_speed_rel,
            approach_joint_speed_rel: config.motion.approach_joint_speed_rel,
            iteration_limit: None,
        }
    }

    pub fn with_variant(mut self, variant: ControlVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_iteration_limit(mut self, limit: Option<u64>) -> Self {
        self.iteration_limit = limit;
        self
    }
}

impl Default for SliderSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What one sliding iteration saw and commanded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationOutcome {
    pub pose: Pose,
    pub velocity: Velocity2D,
    pub offset: Offset2D,
    pub target: Pose,
}

/// Drives one arm through homing, transit and the sliding loop.
///
/// All collaborator calls block. The task owns the estimator slot and the
/// telemetry sink, and closes the sink exactly once when `run` returns.
pub struct SliderTask<A: RobotArm, T: TimeInterface> {
    arm: A,
    clock: T,
    settings: SliderSettings,
    estimator: VelocityEstimator,
    force_field: ForceField,
    telemetry: Option<Box<dyn TelemetrySink>>,
    state: TaskState,
    iterations: u64,
    last_outcome: Option<IterationOutcome>,
    run_id: Uuid,
}

impl<A: RobotArm, T: TimeInterface> SliderTask<A, T> {
    pub fn new(arm: A, clock: T, settings: SliderSettings) -> Self {
        let force_field = ForceField::new(settings.strength_k, settings.modes.slider_params());
        match settings.variant {
            ControlVariant::ActiveForceField => {
                tracing::info!("Force field enabled, K = {} N/(m/s)", force_field.strength());
            }
            ControlVariant::PassiveHold => {
                tracing::info!("Passive hold: force field disabled");
            }
        }
        Self {
            arm,
            clock,
            settings,
            estimator: VelocityEstimator::new(),
            force_field,
            telemetry: None,
            state: TaskState::Idle,
            iterations: 0,
            last_outcome: None,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn with_telemetry(mut self, sink: Box<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn settings(&self) -> &SliderSettings {
        &self.settings
    }

    pub fn arm(&self) -> &A {
        &self.arm
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn last_outcome(&self) -> Option<&IterationOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn has_telemetry(&self) -> bool {
        self.telemetry.is_some()
    }

    /// Run the whole task. Returns when `cancel` fires, the iteration limit
    /// is reached, or a collaborator fails.
    pub fn run(&mut self, cancel: &CancellationToken) -> Result<TaskReport, TaskError> {
        if self.state == TaskState::Terminated {
            return Err(TaskError::AlreadyTerminated);
        }
        let span = tracing::info_span!("slider_task", run_id = %self.run_id);
        let _enter = span.enter();

        let result = self.run_phases(cancel);
        self.enter(TaskState::Terminated);
        self.close_telemetry();

        match &result {
            Ok(report) => tracing::info!(
                "Slider task finished ({:?}) after {} iterations",
                report.exit,
                report.iterations
            ),
            Err(e) => tracing::error!("Slider task aborted: {}", e),
        }
        result
    }

    fn run_phases(&mut self, cancel: &CancellationToken) -> Result<TaskReport, TaskError> {
        self.home()?;
        let exit = if cancel.is_cancelled() {
            ExitReason::Interrupted
        } else {
            self.transit()?;
            if cancel.is_cancelled() {
                ExitReason::Interrupted
            } else {
                self.slide(cancel)?
            }
        };
        Ok(TaskReport {
            iterations: self.iterations,
            final_state: TaskState::Terminated,
            exit,
        })
    }

    fn enter(&mut self, state: TaskState) {
        tracing::info!("Slider task: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn home(&mut self) -> Result<(), TaskError> {
        self.enter(TaskState::Homing);
        let firm = self.settings.modes.firm();
        self.arm
            .move_joint(&JointTarget::Home, &firm, self.settings.safe_joint_speed_rel)
            .map_err(|source| TaskError::Setup {
                state: TaskState::Homing,
                source,
            })
    }

    fn transit(&mut self) -> Result<(), TaskError> {
        self.enter(TaskState::Transit);
        let firm = self.settings.modes.firm();
        let setup = |source: MotionError| TaskError::Setup {
            state: TaskState::Transit,
            source,
        };
        self.arm
            .move_joint(
                &JointTarget::Joints(self.settings.safe_joints),
                &firm,
                self.settings.safe_joint_speed_rel,
            )
            .map_err(setup)?;
        tracing::debug!("Reached safe joint configuration");
        let start = self.settings.segment.start_pose();
        self.arm
            .move_joint(
                &JointTarget::Pose(start),
                &firm,
                self.settings.approach_joint_speed_rel,
            )
            .map_err(setup)?;
        tracing::info!("At slide start X={:.1} Y={:.1} Z={:.1}", start.x, start.y, start.z);
        Ok(())
    }

    fn slide(&mut self, cancel: &CancellationToken) -> Result<ExitReason, TaskError> {
        self.enter(TaskState::Sliding);
        let pose = self.arm.current_pose().map_err(|source| TaskError::Runtime {
            iterations: 0,
            source,
        })?;
        self.estimator
            .prime(TimestampedSample::new(pose, self.clock.now_monotonic()));

        loop {
            if cancel.is_cancelled() {
                return Ok(ExitReason::Interrupted);
            }
            if let Some(limit) = self.settings.iteration_limit {
                if self.iterations >= limit {
                    return Ok(ExitReason::IterationLimit);
                }
            }
            self.step()?;
            self.iterations += 1;
            self.clock.sleep(self.settings.loop_period);
        }
    }

    /// One sliding iteration without the trailing sleep.
    pub fn step(&mut self) -> Result<IterationOutcome, TaskError> {
        let iterations = self.iterations;
        let fail = move |source: MotionError| TaskError::Runtime { iterations, source };

        let pose = self.arm.current_pose().map_err(fail)?;
        let sample = TimestampedSample::new(pose, self.clock.now_monotonic());
        let joint_positions = self.arm.joint_positions().map_err(fail)?;
        let joint_torques = self.arm.joint_torques().map_err(fail)?;

        let velocity = self.estimator.update(sample);

        self.emit_telemetry(&TelemetryRecord {
            timestamp_ms: epoch_millis(self.clock.now_wallclock()),
            pose,
            joint_positions,
            joint_torques,
        });

        let offset = match self.settings.variant {
            ControlVariant::ActiveForceField => self.force_field.offset(velocity),
            ControlVariant::PassiveHold => {
                tracing::trace!("vx={:.4} vy={:.4} m/s (unused)", velocity.vx, velocity.vy);
                Offset2D::ZERO
            }
        };

        let segment = &self.settings.segment;
        if !segment.contains(pose.y) {
            tracing::debug!("Y={:.2} outside segment, holding at bound", pose.y);
        }
        let target = segment.clamp(&pose).translated(offset.dx, offset.dy);

        let slider = self.settings.modes.slider();
        self.arm
            .move_linear(&target, &slider, self.settings.max_cartesian_speed)
            .map_err(fail)?;

        tracing::trace!(
            "y={:.2} |v|={:.4} dx={:.3} dy={:.3}",
            pose.y,
            velocity.speed(),
            offset.dx,
            offset.dy
        );
        let outcome = IterationOutcome {
            pose,
            velocity,
            offset,
            target,
        };
        self.last_outcome = Some(outcome);
        Ok(outcome)
    }

    fn emit_telemetry(&mut self, record: &TelemetryRecord) {
        let failure = match self.telemetry.as_mut() {
            Some(sink) => sink.record(record).err(),
            None => None,
        };
        if let Some(e) = failure {
            tracing::warn!("Telemetry write failed, continuing without telemetry: {}", e);
            self.close_telemetry();
        }
    }

    fn close_telemetry(&mut self) {
        if let Some(mut sink) = self.telemetry.take() {
            if let Err(e) = sink.close() {
                tracing::warn!("Failed to close telemetry sink: {}", e);
            }
        }
    }
}

fn epoch_millis(now: SystemTime) -> i64 {
    now.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
