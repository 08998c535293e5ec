//! Compliant sliding-axis control for a 7-DOF arm.
//!
//! The arm is held on a one-dimensional segment along world Y under
//! Cartesian impedance control while a velocity-dependent lateral force
//! field pushes it sideways. See [`motion::SliderTask`] for the loop.

pub mod config;
pub mod hardware;
pub mod motion;
pub mod scheduler;
pub mod simulator;
pub mod telemetry;

pub use config::{Config, ConfigError, ConfigWarning, load_config};
pub use hardware::{MotionError, RobotArm};
pub use motion::{SliderSettings, SliderTask, TaskError, TaskReport};
pub use telemetry::{CsvTelemetryLogger, TelemetryRecord, TelemetrySink};
