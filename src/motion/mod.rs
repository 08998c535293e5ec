// src/motion/mod.rs - Sliding-axis control: estimation, field, clamp and the task loop

pub mod compliance;
pub mod constraint;
pub mod controller;
pub mod estimator;
pub mod force_field;
pub mod pose;

pub use compliance::{ComplianceMode, ComplianceModes, ImpedanceError, ImpedanceParams};
pub use constraint::SlidingSegment;
pub use controller::{
    ControlVariant, ExitReason, SliderSettings, SliderTask, TaskError, TaskReport, TaskState,
};
pub use estimator::VelocityEstimator;
pub use force_field::{ForceField, Offset2D};
pub use pose::{JointVector, Pose, TimestampedSample, Velocity2D};
