//! Body and constraint types exchanged with the physics engine.
//!
//! Everything here is planar: positions are [`Point2`], angles are radians
//! about the out-of-plane axis, and the chain axis of a body at angle zero is
//! local +X (the head end).

use nalgebra::{Point2, Vector2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::WormError;
use crate::filter::CollisionFilter;

/// Unique identifier for a body owned by the physics engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId(pub u64);

impl BodyId {
    /// Create a new body ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for BodyId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

/// Unique identifier for a point-to-point constraint owned by the physics engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintId(pub u64);

impl ConstraintId {
    /// Create a new constraint ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for ConstraintId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Constraint({})", self.0)
    }
}

/// Collision shape of a body.
///
/// Capsules lie along local +X, so their rounded ends sit at
/// `±(half_length + radius)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BodyShape {
    /// A disc.
    Circle {
        /// Radius of the disc.
        radius: f64,
    },
    /// A stadium: a segment of length `2 * half_length` swept by a disc.
    Capsule {
        /// Half the length of the inner segment.
        half_length: f64,
        /// Radius of the swept disc.
        radius: f64,
    },
}

impl BodyShape {
    /// Create a circle shape.
    #[must_use]
    pub const fn circle(radius: f64) -> Self {
        Self::Circle { radius }
    }

    /// Create a capsule shape.
    #[must_use]
    pub const fn capsule(half_length: f64, radius: f64) -> Self {
        Self::Capsule {
            half_length,
            radius,
        }
    }

    /// Radius of the rounded part of the shape.
    #[must_use]
    pub fn radius(&self) -> f64 {
        match *self {
            Self::Circle { radius } | Self::Capsule { radius, .. } => radius,
        }
    }

    /// Distance from the body origin to the rounded end along local X.
    #[must_use]
    pub fn extent(&self) -> f64 {
        match *self {
            Self::Circle { radius } => radius,
            Self::Capsule {
                half_length,
                radius,
            } => half_length + radius,
        }
    }

    /// How far the shape reaches below its origin when rotated by `angle`.
    #[must_use]
    pub fn lowest_extent(&self, angle: f64) -> f64 {
        match *self {
            Self::Circle { radius } => radius,
            Self::Capsule {
                half_length,
                radius,
            } => half_length * angle.sin().abs() + radius,
        }
    }

    /// Planar area of the shape.
    #[must_use]
    pub fn area(&self) -> f64 {
        match *self {
            Self::Circle { radius } => std::f64::consts::PI * radius * radius,
            Self::Capsule {
                half_length,
                radius,
            } => 4.0 * half_length * radius + std::f64::consts::PI * radius * radius,
        }
    }

    /// Check that all dimensions are finite and the radius is positive.
    pub fn validate(&self) -> crate::Result<()> {
        let radius = self.radius();
        if !radius.is_finite() || radius <= 0.0 {
            return Err(WormError::invalid_config(format!(
                "shape radius must be positive and finite, got {radius}"
            )));
        }
        if let Self::Capsule { half_length, .. } = *self {
            if !half_length.is_finite() || half_length < 0.0 {
                return Err(WormError::invalid_config(format!(
                    "capsule half_length must be non-negative and finite, got {half_length}"
                )));
            }
        }
        Ok(())
    }
}

/// Material and filtering options used when a body is created.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyOptions {
    /// Kinetic friction coefficient.
    pub friction: f64,
    /// Static friction coefficient.
    pub friction_static: f64,
    /// Mass per unit area.
    pub density: f64,
    /// Bounciness in [0, 1].
    pub restitution: f64,
    /// Collision category and mask.
    pub filter: CollisionFilter,
}

impl Default for BodyOptions {
    fn default() -> Self {
        Self {
            friction: 0.1,
            friction_static: 0.5,
            density: 1.0,
            restitution: 0.0,
            filter: CollisionFilter::default(),
        }
    }
}

impl BodyOptions {
    /// Set the friction coefficients.
    #[must_use]
    pub const fn with_friction(mut self, friction: f64, friction_static: f64) -> Self {
        self.friction = friction;
        self.friction_static = friction_static;
        self
    }

    /// Set the density.
    #[must_use]
    pub const fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    /// Set the collision filter.
    #[must_use]
    pub const fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Mass and rotational inertia of a planar body.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// Total mass.
    pub mass: f64,
    /// Moment of inertia about the body origin.
    pub inertia: f64,
}

impl MassProperties {
    /// Create mass properties with given values.
    #[must_use]
    pub const fn new(mass: f64, inertia: f64) -> Self {
        Self { mass, inertia }
    }

    /// Compute mass properties of a uniform shape.
    ///
    /// Disc: `I = m r² / 2`. Capsule: the rectangle core plus both half
    /// discs, each shifted by the parallel axis theorem.
    #[must_use]
    pub fn of_shape(shape: &BodyShape, density: f64) -> Self {
        match *shape {
            BodyShape::Circle { radius } => {
                let mass = density * shape.area();
                Self::new(mass, 0.5 * mass * radius * radius)
            }
            BodyShape::Capsule {
                half_length,
                radius,
            } => {
                let length = 2.0 * half_length;
                let rect_mass = density * length * 2.0 * radius;
                let disc_mass = density * std::f64::consts::PI * radius * radius;
                let rect_inertia =
                    rect_mass * (length * length + 4.0 * radius * radius) / 12.0;
                let disc_inertia = disc_mass * (0.5 * radius * radius + half_length * half_length);
                Self::new(rect_mass + disc_mass, rect_inertia + disc_inertia)
            }
        }
    }

    /// Check that mass and inertia are positive and finite.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(WormError::invalid_config(format!(
                "mass must be positive and finite, got {}",
                self.mass
            )));
        }
        if !self.inertia.is_finite() || self.inertia <= 0.0 {
            return Err(WormError::invalid_config(format!(
                "inertia must be positive and finite, got {}",
                self.inertia
            )));
        }
        Ok(())
    }
}

/// Kinematic state of a body as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyState {
    /// Position of the body origin in world coordinates.
    pub position: Point2<f64>,
    /// Rotation in radians.
    pub angle: f64,
    /// Linear velocity.
    pub velocity: Vector2<f64>,
    /// Angular velocity in rad/s.
    pub angular_velocity: f64,
}

impl BodyState {
    /// A body at rest.
    #[must_use]
    pub fn at_rest(position: Point2<f64>, angle: f64) -> Self {
        Self {
            position,
            angle,
            velocity: Vector2::zeros(),
            angular_velocity: 0.0,
        }
    }

    /// Unit vector along local +X in world coordinates.
    #[must_use]
    pub fn heading(&self) -> Vector2<f64> {
        Vector2::new(self.angle.cos(), self.angle.sin())
    }

    /// Transform a point from local to world coordinates.
    #[must_use]
    pub fn transform_point(&self, local: &Point2<f64>) -> Point2<f64> {
        let (sin, cos) = self.angle.sin_cos();
        Point2::new(
            self.position.x + cos * local.x - sin * local.y,
            self.position.y + sin * local.x + cos * local.y,
        )
    }

    /// Check if the state contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|x| x.is_finite())
            && self.angle.is_finite()
            && self.velocity.iter().all(|x| x.is_finite())
            && self.angular_velocity.is_finite()
    }
}

/// Per-segment output consumed by renderers.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentTransform {
    /// Segment index, 0 is the head.
    pub index: usize,
    /// World position of the segment center.
    pub position: Point2<f64>,
    /// Rotation in radians.
    pub angle: f64,
}

/// Normalize an angle into `[-π, π]`.
#[must_use]
pub fn normalize_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};

    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid can land exactly on TAU after rounding
    wrapped.clamp(-PI, PI)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_body_id() {
        let id = BodyId::new(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(BodyId::from(42), id);
        assert_eq!(format!("{id}"), "Body(42)");
        assert_eq!(format!("{}", ConstraintId::new(3)), "Constraint(3)");
    }

    #[test]
    fn test_shape_extents() {
        let circle = BodyShape::circle(0.5);
        assert_relative_eq!(circle.extent(), 0.5);
        assert_relative_eq!(circle.lowest_extent(1.0), 0.5);

        let capsule = BodyShape::capsule(1.0, 0.25);
        assert_relative_eq!(capsule.extent(), 1.25);
        assert_relative_eq!(capsule.lowest_extent(0.0), 0.25);
        assert_relative_eq!(capsule.lowest_extent(PI / 2.0), 1.25, epsilon = 1e-12);
    }

    #[test]
    fn test_shape_validation() {
        assert!(BodyShape::circle(1.0).validate().is_ok());
        assert!(BodyShape::circle(0.0).validate().is_err());
        assert!(BodyShape::circle(f64::NAN).validate().is_err());
        assert!(BodyShape::capsule(-1.0, 1.0).validate().is_err());
    }

    #[test]
    fn test_mass_properties_circle() {
        let props = MassProperties::of_shape(&BodyShape::circle(1.0), 2.0);
        assert_relative_eq!(props.mass, 2.0 * PI, epsilon = 1e-12);
        assert_relative_eq!(props.inertia, PI, epsilon = 1e-12);
        assert!(props.validate().is_ok());
    }

    #[test]
    fn test_mass_properties_capsule_exceeds_circle() {
        let disc = MassProperties::of_shape(&BodyShape::circle(0.5), 1.0);
        let capsule = MassProperties::of_shape(&BodyShape::capsule(0.5, 0.5), 1.0);
        assert!(capsule.mass > disc.mass);
        assert!(capsule.inertia > disc.inertia);
    }

    #[test]
    fn test_transform_point() {
        let state = BodyState::at_rest(Point2::new(1.0, 0.0), PI / 2.0);
        let world = state.transform_point(&Point2::new(1.0, 0.0));
        assert_relative_eq!(world.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(world.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(state.heading().y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_normalize_angle() {
        assert_relative_eq!(normalize_angle(0.5), 0.5, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(2.0 * PI + 0.5), 0.5, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(-2.0 * PI - 0.5), -0.5, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_eq!(normalize_angle(f64::NAN), 0.0);
        for k in -10..10 {
            let a = normalize_angle(f64::from(k) * 1.7);
            assert!((-PI..=PI).contains(&a));
        }
    }
}
