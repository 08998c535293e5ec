// src/motion/compliance.rs - Impedance and position control modes
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cartesian degrees of freedom that carry their own stiffness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartDof {
    X,
    Y,
    Z,
    Rot,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImpedanceError {
    #[error("{name} stiffness for {dof:?} must be > 0, got {value}")]
    Stiffness { name: String, dof: CartDof, value: f64 },
    #[error("{name} damping must be between 0 and 1, got {value}")]
    Damping { name: String, value: f64 },
}

/// Per-DOF stiffness and a shared damping ratio for Cartesian impedance control.
///
/// Translational stiffness is in N/m, rotational stiffness in Nm/rad and the
/// damping ratio is dimensionless in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpedanceParams {
    pub stiffness_x: f64,
    pub stiffness_y: f64,
    pub stiffness_z: f64,
    pub stiffness_rot: f64,
    pub damping: f64,
}

impl ImpedanceParams {
    /// Compliant along the slide, forgiving across it, rigid in Z.
    pub fn slider() -> Self {
        Self {
            stiffness_x: 5.0,
            stiffness_y: 300.0,
            stiffness_z: 5000.0,
            stiffness_rot: 300.0,
            damping: 0.7,
        }
    }

    /// Stiff hold on all translational axes, critically damped.
    pub fn hold() -> Self {
        Self {
            stiffness_x: 5000.0,
            stiffness_y: 5000.0,
            stiffness_z: 5000.0,
            stiffness_rot: 300.0,
            damping: 1.0,
        }
    }

    pub fn stiffness(&self, dof: CartDof) -> f64 {
        match dof {
            CartDof::X => self.stiffness_x,
            CartDof::Y => self.stiffness_y,
            CartDof::Z => self.stiffness_z,
            CartDof::Rot => self.stiffness_rot,
        }
    }

    pub fn validate(&self, name: &str) -> Result<(), ImpedanceError> {
        for (dof, value) in [
            (CartDof::X, self.stiffness_x),
            (CartDof::Y, self.stiffness_y),
            (CartDof::Z, self.stiffness_z),
            (CartDof::Rot, self.stiffness_rot),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ImpedanceError::Stiffness {
                    name: name.to_string(),
                    dof,
                    value,
                });
            }
        }
        if !(0.0..=1.0).contains(&self.damping) {
            return Err(ImpedanceError::Damping {
                name: name.to_string(),
                value: self.damping,
            });
        }
        Ok(())
    }
}

/// Control mode attached to every motion command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComplianceMode {
    CartesianImpedance(ImpedanceParams),
    /// Pure position control, no compliance.
    Position,
}

impl ComplianceMode {
    pub fn is_compliant(&self) -> bool {
        matches!(self, ComplianceMode::CartesianImpedance(_))
    }

    pub fn impedance(&self) -> Option<&ImpedanceParams> {
        match self {
            ComplianceMode::CartesianImpedance(params) => Some(params),
            ComplianceMode::Position => None,
        }
    }
}

/// The three modes the slider task uses. Built once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplianceModes {
    slider: ImpedanceParams,
    hold: ImpedanceParams,
}

impl ComplianceModes {
    pub fn new(slider: ImpedanceParams, hold: ImpedanceParams) -> Self {
        Self { slider, hold }
    }

    /// Used while sliding.
    pub fn slider(&self) -> ComplianceMode {
        ComplianceMode::CartesianImpedance(self.slider)
    }

    /// Stiff impedance hold.
    pub fn hold(&self) -> ComplianceMode {
        ComplianceMode::CartesianImpedance(self.hold)
    }

    /// Homing and transit.
    pub fn firm(&self) -> ComplianceMode {
        ComplianceMode::Position
    }

    pub fn slider_params(&self) -> &ImpedanceParams {
        &self.slider
    }
}

impl Default for ComplianceModes {
    fn default() -> Self {
        Self::new(ImpedanceParams::slider(), ImpedanceParams::hold())
    }
}
