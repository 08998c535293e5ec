// src/motion/force_field.rs - Velocity-dependent lateral force realised as a position offset
use super::compliance::{CartDof, ImpedanceParams};
use super::pose::Velocity2D;

/// Virtual force in newtons.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Force2D {
    pub fx: f64,
    pub fy: f64,
}

/// Position offset in millimetres added to the commanded target.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offset2D {
    pub dx: f64,
    pub dy: f64,
}

impl Offset2D {
    pub const ZERO: Offset2D = Offset2D { dx: 0.0, dy: 0.0 };
}

/// Curl field: the force is the velocity rotated by +90 degrees and scaled by `K`.
///
/// The impedance controller cannot be given a force directly, so the force is
/// turned into a displacement of the virtual spring: `offset = force / stiffness`
/// per axis, using the sliding mode's X and Y stiffness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceField {
    strength_k: f64,
    stiffness_x: f64,
    stiffness_y: f64,
}

impl ForceField {
    /// `params` must have non-zero X/Y stiffness; config validation guarantees it.
    pub fn new(strength_k: f64, params: &ImpedanceParams) -> Self {
        Self {
            strength_k,
            stiffness_x: params.stiffness(CartDof::X),
            stiffness_y: params.stiffness(CartDof::Y),
        }
    }

    pub fn strength(&self) -> f64 {
        self.strength_k
    }

    pub fn force(&self, velocity: Velocity2D) -> Force2D {
        Force2D {
            fx: -self.strength_k * velocity.vy,
            fy: self.strength_k * velocity.vx,
        }
    }

    pub fn offset_for_force(&self, force: Force2D) -> Offset2D {
        Offset2D {
            dx: force.fx / self.stiffness_x,
            dy: force.fy / self.stiffness_y,
        }
    }

    pub fn offset(&self, velocity: Velocity2D) -> Offset2D {
        self.offset_for_force(self.force(velocity))
    }
}
