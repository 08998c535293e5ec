//! # Slider Task Configuration
//!
//! Everything the task needs is supplied once at startup and never changes
//! while the task runs.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [segment]
//! x_mm = 475.0
//! y_start_mm = -245.0
//! y_end_mm = 230.0
//! z_mm = 260.0
//!
//! [compliance.slider]
//! stiffness_x = 5.0
//! stiffness_y = 300.0
//! stiffness_z = 5000.0
//! stiffness_rot = 300.0
//! damping = 0.7
//!
//! [force_field]
//! enabled = true
//! strength_k = 50.0
//!
//! [motion]
//! max_cartesian_speed_mm_s = 250.0
//! loop_period_ms = 20
//! ```
//!
//! - Missing sections and fields fall back to the bench defaults.
//! - Impedance tables are read as a whole: give all five fields or none.
//!
//! ## Example: Rust Usage
//!
//! ```rust
//! use slider_rs::config::Config;
//! let toml_str = r#"
//! [segment]
//! y_start_mm = -100.0
//! y_end_mm = 100.0
//!
//! [force_field]
//! enabled = false
//! "#;
//! let config: Config = toml::from_str(toml_str).unwrap();
//! assert_eq!(config.segment.y_end_mm, 100.0);
//! assert_eq!(config.segment.x_mm, 475.0);
//! assert!(!config.force_field.enabled);
//! assert!(config.validate().unwrap().is_empty());
//! ```

use crate::motion::compliance::{ComplianceModes, ImpedanceError, ImpedanceParams};
use crate::motion::constraint::{MIN_SEGMENT_LENGTH_MM, SlidingSegment};
use crate::motion::controller::ControlVariant;
use crate::motion::pose::{JOINT_COUNT, JointVector, Pose};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Invalid compliance mode: {0}")]
    Impedance(#[from] ImpedanceError),
}

/// Problems that do not stop the task but reduce what it can do.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// Endpoints (nearly) coincide, so there is no Y sliding range.
    DegenerateSegment { y_start: f64, y_end: f64 },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::DegenerateSegment { y_start, y_end } => write!(
                f,
                "slide endpoints Y={} and Y={} are (nearly) identical, no Y-axis sliding range",
                y_start, y_end
            ),
        }
    }
}

/// Main configuration struct for the slider task.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub segment: SegmentConfig,
    #[serde(default)]
    pub compliance: ComplianceConfig,
    #[serde(default)]
    pub force_field: ForceFieldConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Slide start pose (P1) plus the Y coordinate of the far endpoint (P2).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SegmentConfig {
    #[serde(default = "default_x_mm")]
    pub x_mm: f64,
    #[serde(default = "default_y_start_mm")]
    pub y_start_mm: f64,
    #[serde(default = "default_y_end_mm")]
    pub y_end_mm: f64,
    #[serde(default = "default_z_mm")]
    pub z_mm: f64,
    #[serde(default = "default_a_deg")]
    pub a_deg: f64,
    #[serde(default = "default_b_deg")]
    pub b_deg: f64,
    #[serde(default = "default_c_deg")]
    pub c_deg: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            x_mm: default_x_mm(),
            y_start_mm: default_y_start_mm(),
            y_end_mm: default_y_end_mm(),
            z_mm: default_z_mm(),
            a_deg: default_a_deg(),
            b_deg: default_b_deg(),
            c_deg: default_c_deg(),
        }
    }
}

impl SegmentConfig {
    pub fn start_pose(&self) -> Pose {
        Pose::new(self.x_mm, self.y_start_mm, self.z_mm, self.a_deg, self.b_deg, self.c_deg)
    }
}

/// Impedance tables. Stiffness values are in the flange frame of the controller.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ComplianceConfig {
    #[serde(default = "ImpedanceParams::slider")]
    pub slider: ImpedanceParams,
    #[serde(default = "ImpedanceParams::hold")]
    pub hold: ImpedanceParams,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            slider: ImpedanceParams::slider(),
            hold: ImpedanceParams::hold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForceFieldConfig {
    /// false selects the passive hold-only variant.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Field strength K in N per (m/s).
    #[serde(default = "default_strength_k")]
    pub strength_k: f64,
}

impl Default for ForceFieldConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strength_k: default_strength_k(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MotionConfig {
    #[serde(default = "default_max_cartesian_speed")]
    pub max_cartesian_speed_mm_s: f64,
    #[serde(default = "default_loop_period_ms")]
    pub loop_period_ms: u64,
    #[serde(default = "default_safe_joint_speed_rel")]
    pub safe_joint_speed_rel: f64,
    #[serde(default = "default_approach_joint_speed_rel")]
    pub approach_joint_speed_rel: f64,
    /// Intermediate joint configuration visited before the slide start, in degrees.
    #[serde(default = "default_safe_joints_deg")]
    pub safe_joints_deg: JointVector,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            max_cartesian_speed_mm_s: default_max_cartesian_speed(),
            loop_period_ms: default_loop_period_ms(),
            safe_joint_speed_rel: default_safe_joint_speed_rel(),
            approach_joint_speed_rel: default_approach_joint_speed_rel(),
            safe_joints_deg: default_safe_joints_deg(),
        }
    }
}

impl MotionConfig {
    pub fn safe_joints_rad(&self) -> JointVector {
        let mut joints = [0.0; JOINT_COUNT];
        for (rad, deg) in joints.iter_mut().zip(self.safe_joints_deg.iter()) {
            *rad = deg.to_radians();
        }
        joints
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_telemetry_dir")]
    pub directory: PathBuf,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_telemetry_dir(),
        }
    }
}

/// Parameters of the software arm used when no controller is attached.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// First-order settling time constant of the compliant response.
    #[serde(default = "default_response_time_s")]
    pub response_time_s: f64,
    /// Peak operator push along world Y in newtons.
    #[serde(default = "default_push_amplitude_n")]
    pub push_amplitude_n: f64,
    #[serde(default = "default_push_frequency_hz")]
    pub push_frequency_hz: f64,
    /// Half-width of the uniform position noise in mm.
    #[serde(default = "default_noise_mm")]
    pub noise_mm: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            response_time_s: default_response_time_s(),
            push_amplitude_n: default_push_amplitude_n(),
            push_frequency_hz: default_push_frequency_hz(),
            noise_mm: default_noise_mm(),
            seed: None,
        }
    }
}

impl Config {
    /// Hard errors come back as `Err`; everything the task can run with
    /// despite is returned as warnings.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        let seg = &self.segment;
        for (name, value) in [
            ("segment.x_mm", seg.x_mm),
            ("segment.y_start_mm", seg.y_start_mm),
            ("segment.y_end_mm", seg.y_end_mm),
            ("segment.z_mm", seg.z_mm),
            ("segment.a_deg", seg.a_deg),
            ("segment.b_deg", seg.b_deg),
            ("segment.c_deg", seg.c_deg),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!("{} must be finite", name)));
            }
        }
        self.compliance
            .slider
            .validate("compliance.slider")?;
        self.compliance
            .hold
            .validate("compliance.hold")?;
        if !self.force_field.strength_k.is_finite() {
            return Err(ConfigError::Invalid("force_field.strength_k must be finite".to_string()));
        }
        let motion = &self.motion;
        if !(motion.max_cartesian_speed_mm_s.is_finite() && motion.max_cartesian_speed_mm_s > 0.0) {
            return Err(ConfigError::Invalid(
                "motion.max_cartesian_speed_mm_s must be > 0".to_string(),
            ));
        }
        if motion.loop_period_ms == 0 {
            return Err(ConfigError::Invalid("motion.loop_period_ms must be > 0".to_string()));
        }
        for (name, value) in [
            ("motion.safe_joint_speed_rel", motion.safe_joint_speed_rel),
            ("motion.approach_joint_speed_rel", motion.approach_joint_speed_rel),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::Invalid(format!("{} must be in (0, 1]", name)));
            }
        }
        if motion.safe_joints_deg.iter().any(|j| !j.is_finite()) {
            return Err(ConfigError::Invalid("motion.safe_joints_deg must be finite".to_string()));
        }
        if !(self.simulation.response_time_s.is_finite() && self.simulation.response_time_s > 0.0) {
            return Err(ConfigError::Invalid(
                "simulation.response_time_s must be > 0".to_string(),
            ));
        }

        let mut warnings = Vec::new();
        if (seg.y_start_mm - seg.y_end_mm).abs() < MIN_SEGMENT_LENGTH_MM {
            warnings.push(ConfigWarning::DegenerateSegment {
                y_start: seg.y_start_mm,
                y_end: seg.y_end_mm,
            });
        }
        Ok(warnings)
    }

    pub fn sliding_segment(&self) -> SlidingSegment {
        SlidingSegment::new(self.segment.start_pose(), self.segment.y_end_mm)
    }

    pub fn compliance_modes(&self) -> ComplianceModes {
        ComplianceModes::new(self.compliance.slider, self.compliance.hold)
    }

    pub fn control_variant(&self) -> ControlVariant {
        if self.force_field.enabled {
            ControlVariant::ActiveForceField
        } else {
            ControlVariant::PassiveHold
        }
    }
}

fn default_x_mm() -> f64 { 475.0 }
fn default_y_start_mm() -> f64 { -245.0 }
fn default_y_end_mm() -> f64 { 230.0 }
fn default_z_mm() -> f64 { 260.0 }
fn default_a_deg() -> f64 { -90.0 }
fn default_b_deg() -> f64 { 0.0 }
fn default_c_deg() -> f64 { -180.0 }
fn default_true() -> bool { true }
fn default_strength_k() -> f64 { 50.0 }
fn default_max_cartesian_speed() -> f64 { 250.0 }
fn default_loop_period_ms() -> u64 { 20 }
fn default_safe_joint_speed_rel() -> f64 { 0.25 }
fn default_approach_joint_speed_rel() -> f64 { 0.5 }
fn default_safe_joints_deg() -> JointVector { [0.0, 30.0, 0.0, -60.0, 0.0, 90.0, 0.0] }
fn default_telemetry_dir() -> PathBuf { PathBuf::from("log") }
fn default_response_time_s() -> f64 { 0.05 }
fn default_push_amplitude_n() -> f64 { 0.5 }
fn default_push_frequency_hz() -> f64 { 0.2 }
fn default_noise_mm() -> f64 { 0.05 }

pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            Err(ConfigError::Io(e))
        }
    }
}
