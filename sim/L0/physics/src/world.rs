//! The physics engine boundary.
//!
//! The locomotion layer never integrates anything itself. It creates bodies
//! and constraints, reads their state, and writes torques, velocities,
//! frictions and constraint parameters through [`PhysicsWorld`]. Any engine
//! that implements the trait can host a worm.

use nalgebra::{Point2, Vector2};
use worm_types::{
    BodyId, BodyOptions, BodyShape, BodyState, ConstraintId, MassProperties, Result, WormError,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Point-to-point distance constraint between two bodies.
///
/// Anchors are in each body's local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintDesc {
    /// First body.
    pub body_a: BodyId,
    /// Second body.
    pub body_b: BodyId,
    /// Anchor on the first body (local).
    pub anchor_a: Point2<f64>,
    /// Anchor on the second body (local).
    pub anchor_b: Point2<f64>,
    /// Target distance between the anchors.
    pub length: f64,
    /// Fraction of the length error corrected per solver pass, in [0, 1].
    pub stiffness: f64,
    /// Fraction of the relative anchor velocity removed per step, in [0, 1].
    pub damping: f64,
}

impl ConstraintDesc {
    /// Connect two bodies at their origins with a rigid zero-length link.
    #[must_use]
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            anchor_a: Point2::origin(),
            anchor_b: Point2::origin(),
            length: 0.0,
            stiffness: 1.0,
            damping: 0.0,
        }
    }

    /// Set the local anchors.
    #[must_use]
    pub const fn with_anchors(mut self, anchor_a: Point2<f64>, anchor_b: Point2<f64>) -> Self {
        self.anchor_a = anchor_a;
        self.anchor_b = anchor_b;
        self
    }

    /// Set the rest length.
    #[must_use]
    pub const fn with_length(mut self, length: f64) -> Self {
        self.length = length;
        self
    }

    /// Set stiffness and damping.
    #[must_use]
    pub const fn with_response(mut self, stiffness: f64, damping: f64) -> Self {
        self.stiffness = stiffness;
        self.damping = damping;
        self
    }

    /// Check that all parameters are finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        if self.body_a == self.body_b {
            return Err(WormError::engine(format!(
                "constraint connects {} to itself",
                self.body_a
            )));
        }
        let anchors_finite = self
            .anchor_a
            .coords
            .iter()
            .chain(self.anchor_b.coords.iter())
            .all(|x| x.is_finite());
        if !anchors_finite {
            return Err(WormError::engine("constraint anchors must be finite"));
        }
        for (name, value) in [
            ("length", self.length),
            ("stiffness", self.stiffness),
            ("damping", self.damping),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(WormError::engine(format!(
                    "constraint {name} must be non-negative and finite, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Capabilities the locomotion layer needs from a rigid-body engine.
///
/// Every method reports an unknown handle as [`WormError::BodyNotFound`] or
/// [`WormError::ConstraintNotFound`]. Writes take effect at the next step.
pub trait PhysicsWorld {
    /// Create a dynamic body centered at `position`.
    fn create_body(
        &mut self,
        shape: BodyShape,
        position: Point2<f64>,
        options: &BodyOptions,
    ) -> Result<BodyId>;

    /// Destroy a body. Constraints attached to it are destroyed too.
    fn destroy_body(&mut self, body: BodyId) -> Result<()>;

    /// Create a point-to-point constraint.
    fn create_constraint(&mut self, desc: &ConstraintDesc) -> Result<ConstraintId>;

    /// Destroy a constraint.
    fn destroy_constraint(&mut self, constraint: ConstraintId) -> Result<()>;

    /// Current kinematic state of a body.
    fn body_state(&self, body: BodyId) -> Result<BodyState>;

    /// Mass and rotational inertia of a body.
    fn mass_properties(&self, body: BodyId) -> Result<MassProperties>;

    /// Replace the torque applied during the next step.
    fn set_torque(&mut self, body: BodyId, torque: f64) -> Result<()>;

    /// Overwrite the angular velocity.
    fn set_angular_velocity(&mut self, body: BodyId, angular_velocity: f64) -> Result<()>;

    /// Overwrite the linear velocity.
    fn set_velocity(&mut self, body: BodyId, velocity: Vector2<f64>) -> Result<()>;

    /// Accumulate a force applied at a world point for the next step.
    fn apply_force(&mut self, body: BodyId, point: Point2<f64>, force: Vector2<f64>)
    -> Result<()>;

    /// Change the kinetic friction of a body.
    fn set_friction(&mut self, body: BodyId, friction: f64) -> Result<()>;

    /// Change the target length of a constraint.
    fn set_constraint_length(&mut self, constraint: ConstraintId, length: f64) -> Result<()>;

    /// Change the stiffness of a constraint.
    fn set_constraint_stiffness(&mut self, constraint: ConstraintId, stiffness: f64)
    -> Result<()>;
}

impl<W: PhysicsWorld + ?Sized> PhysicsWorld for &mut W {
    fn create_body(
        &mut self,
        shape: BodyShape,
        position: Point2<f64>,
        options: &BodyOptions,
    ) -> Result<BodyId> {
        (**self).create_body(shape, position, options)
    }

    fn destroy_body(&mut self, body: BodyId) -> Result<()> {
        (**self).destroy_body(body)
    }

    fn create_constraint(&mut self, desc: &ConstraintDesc) -> Result<ConstraintId> {
        (**self).create_constraint(desc)
    }

    fn destroy_constraint(&mut self, constraint: ConstraintId) -> Result<()> {
        (**self).destroy_constraint(constraint)
    }

    fn body_state(&self, body: BodyId) -> Result<BodyState> {
        (**self).body_state(body)
    }

    fn mass_properties(&self, body: BodyId) -> Result<MassProperties> {
        (**self).mass_properties(body)
    }

    fn set_torque(&mut self, body: BodyId, torque: f64) -> Result<()> {
        (**self).set_torque(body, torque)
    }

    fn set_angular_velocity(&mut self, body: BodyId, angular_velocity: f64) -> Result<()> {
        (**self).set_angular_velocity(body, angular_velocity)
    }

    fn set_velocity(&mut self, body: BodyId, velocity: Vector2<f64>) -> Result<()> {
        (**self).set_velocity(body, velocity)
    }

    fn apply_force(
        &mut self,
        body: BodyId,
        point: Point2<f64>,
        force: Vector2<f64>,
    ) -> Result<()> {
        (**self).apply_force(body, point, force)
    }

    fn set_friction(&mut self, body: BodyId, friction: f64) -> Result<()> {
        (**self).set_friction(body, friction)
    }

    fn set_constraint_length(&mut self, constraint: ConstraintId, length: f64) -> Result<()> {
        (**self).set_constraint_length(constraint, length)
    }

    fn set_constraint_stiffness(
        &mut self,
        constraint: ConstraintId,
        stiffness: f64,
    ) -> Result<()> {
        (**self).set_constraint_stiffness(constraint, stiffness)
    }
}
