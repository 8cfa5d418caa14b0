//! Deterministic 2D reference engine.
//!
//! [`SandboxWorld`] is a small position-based engine. Each step integrates
//! velocities, predicts positions, projects distance constraints, pairwise
//! capsule contacts (honoring collision filters) and a flat ground, then
//! derives linear velocities from the corrected positions.
//!
//! Constraint and ground projections act on rigid bodies: an off-center
//! correction both translates and rotates the body, weighted by its
//! generalized inverse mass. Rotation from projections is not fed back into
//! angular velocity, and a body pushed out of the ground never gains upward
//! velocity from it. Contacts are inelastic.
//!
//! Bodies and constraints live in ordered maps, so two worlds fed the same
//! calls produce bit-identical trajectories.

use std::collections::BTreeMap;

use nalgebra::{Point2, Vector2};
use tracing::debug;
use worm_types::{
    BodyId, BodyOptions, BodyShape, BodyState, CollisionFilter, ConstraintId, MassProperties,
    Result, WormError,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::world::{ConstraintDesc, PhysicsWorld};

const EPSILON: f64 = 1e-9;

/// Height tolerance for counting a body as touching the ground.
const CONTACT_SLOP: f64 = 1e-3;

/// Configuration of the reference engine.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SandboxConfig {
    /// Gravitational acceleration.
    pub gravity: Vector2<f64>,
    /// Height of the flat ground, `None` for no ground.
    pub ground_height: Option<f64>,
    /// Scales how quickly ground friction removes horizontal velocity (1/s).
    pub ground_friction_rate: f64,
    /// Constraint solver passes per step.
    pub constraint_iterations: usize,
    /// Whether bodies push each other apart.
    pub enable_contacts: bool,
    /// Linear speed limit.
    pub max_linear_speed: f64,
    /// Angular speed limit.
    pub max_angular_speed: f64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            gravity: Vector2::new(0.0, -9.81),
            ground_height: Some(0.0),
            ground_friction_rate: 10.0,
            constraint_iterations: 4,
            enable_contacts: true,
            max_linear_speed: 100.0,
            max_angular_speed: 100.0,
        }
    }
}

impl SandboxConfig {
    /// Free space: no gravity, no ground.
    #[must_use]
    pub fn free_space() -> Self {
        Self {
            gravity: Vector2::zeros(),
            ground_height: None,
            ..Default::default()
        }
    }

    /// Set the gravity vector.
    #[must_use]
    pub fn gravity(mut self, gravity: Vector2<f64>) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the ground height.
    #[must_use]
    pub fn ground(mut self, height: Option<f64>) -> Self {
        self.ground_height = height;
        self
    }

    /// Set the number of constraint passes.
    #[must_use]
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.constraint_iterations = iterations;
        self
    }

    /// Disable body-body contacts.
    #[must_use]
    pub fn without_contacts(mut self) -> Self {
        self.enable_contacts = false;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(WormError::invalid_config("gravity must be finite"));
        }
        if self.ground_height.is_some_and(|h| !h.is_finite()) {
            return Err(WormError::invalid_config("ground_height must be finite"));
        }
        if !self.ground_friction_rate.is_finite() || self.ground_friction_rate < 0.0 {
            return Err(WormError::invalid_config(
                "ground_friction_rate must be non-negative and finite",
            ));
        }
        if self.constraint_iterations == 0 {
            return Err(WormError::invalid_config(
                "constraint_iterations must be at least 1",
            ));
        }
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.max_linear_speed) || !positive(self.max_angular_speed) {
            return Err(WormError::invalid_config("speed limits must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct SandboxBody {
    shape: BodyShape,
    state: BodyState,
    mass: MassProperties,
    inv_mass: f64,
    inv_inertia: f64,
    friction: f64,
    filter: CollisionFilter,
    force: Vector2<f64>,
    torque: f64,
}

impl SandboxBody {
    /// End points of the capsule core in world space (equal for circles).
    fn core(&self) -> (Point2<f64>, Point2<f64>) {
        let half = match self.shape {
            BodyShape::Circle { .. } => 0.0,
            BodyShape::Capsule { half_length, .. } => half_length,
        };
        let offset = self.state.heading() * half;
        (self.state.position + offset, self.state.position - offset)
    }
}

#[derive(Debug, Clone)]
struct SandboxConstraint {
    desc: ConstraintDesc,
}

/// Deterministic reference implementation of [`PhysicsWorld`].
#[derive(Debug, Clone)]
pub struct SandboxWorld {
    config: SandboxConfig,
    bodies: BTreeMap<BodyId, SandboxBody>,
    constraints: BTreeMap<ConstraintId, SandboxConstraint>,
    next_id: u64,
    time: f64,
    step_count: u64,
}

impl Default for SandboxWorld {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

impl SandboxWorld {
    /// Create an empty world.
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            bodies: BTreeMap::new(),
            constraints: BTreeMap::new(),
            next_id: 1,
            time: 0.0,
            step_count: 0,
        }
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Simulated time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of completed steps.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Number of live bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of live constraints.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Current kinetic friction of a body.
    pub fn friction(&self, body: BodyId) -> Result<f64> {
        Ok(self.body(body)?.friction)
    }

    /// Current target length of a constraint.
    pub fn constraint_length(&self, constraint: ConstraintId) -> Result<f64> {
        Ok(self.constraint(constraint)?.desc.length)
    }

    /// Current stiffness of a constraint.
    pub fn constraint_stiffness(&self, constraint: ConstraintId) -> Result<f64> {
        Ok(self.constraint(constraint)?.desc.stiffness)
    }

    /// Teleport a body.
    pub fn set_position(&mut self, body: BodyId, position: Point2<f64>) -> Result<()> {
        require_finite_point("position", position)?;
        self.body_mut(body)?.state.position = position;
        Ok(())
    }

    /// Overwrite a body's rotation.
    pub fn set_angle(&mut self, body: BodyId, angle: f64) -> Result<()> {
        require_finite("angle", angle)?;
        self.body_mut(body)?.state.angle = angle;
        Ok(())
    }

    /// Destroy every body and constraint.
    pub fn clear(&mut self) {
        debug!(
            bodies = self.bodies.len(),
            constraints = self.constraints.len(),
            "clearing sandbox world"
        );
        self.bodies.clear();
        self.constraints.clear();
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f64) -> Result<()> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(WormError::InvalidTimestep(dt));
        }

        self.integrate_velocities(dt);
        self.damp_constraints();

        let previous: Vec<Point2<f64>> =
            self.bodies.values().map(|b| b.state.position).collect();
        self.predict_positions(dt);

        let mut grounded = vec![false; self.bodies.len()];
        for _ in 0..self.config.constraint_iterations {
            self.solve_constraints();
            if self.config.enable_contacts {
                self.solve_contacts();
            }
            self.solve_ground(&mut grounded);
        }

        let max_linear = self.config.max_linear_speed;
        for ((body, before), grounded) in self.bodies.values_mut().zip(previous).zip(grounded) {
            let mut velocity = (body.state.position - before) / dt;
            if grounded {
                velocity.y = velocity.y.min(0.0);
            }
            let speed = velocity.norm();
            body.state.velocity = if speed > max_linear {
                velocity * (max_linear / speed)
            } else {
                velocity
            };
        }
        self.apply_ground_friction(dt);

        self.time += dt;
        self.step_count += 1;
        Ok(())
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn body(&self, body: BodyId) -> Result<&SandboxBody> {
        self.bodies.get(&body).ok_or(WormError::BodyNotFound(body))
    }

    fn body_mut(&mut self, body: BodyId) -> Result<&mut SandboxBody> {
        self.bodies
            .get_mut(&body)
            .ok_or(WormError::BodyNotFound(body))
    }

    fn constraint(&self, constraint: ConstraintId) -> Result<&SandboxConstraint> {
        self.constraints
            .get(&constraint)
            .ok_or(WormError::ConstraintNotFound(constraint))
    }

    fn constraint_mut(&mut self, constraint: ConstraintId) -> Result<&mut SandboxConstraint> {
        self.constraints
            .get_mut(&constraint)
            .ok_or(WormError::ConstraintNotFound(constraint))
    }

    fn integrate_velocities(&mut self, dt: f64) {
        let gravity = self.config.gravity;
        let max_linear = self.config.max_linear_speed;
        let max_angular = self.config.max_angular_speed;

        for body in self.bodies.values_mut() {
            let state = &mut body.state;
            state.velocity += (gravity + body.force * body.inv_mass) * dt;
            state.angular_velocity += body.torque * body.inv_inertia * dt;

            let speed = state.velocity.norm();
            if speed > max_linear {
                state.velocity *= max_linear / speed;
            }
            state.angular_velocity = state.angular_velocity.clamp(-max_angular, max_angular);

            body.force = Vector2::zeros();
            body.torque = 0.0;
        }
    }

    fn predict_positions(&mut self, dt: f64) {
        for body in self.bodies.values_mut() {
            let state = &mut body.state;
            state.position += state.velocity * dt;
            state.angle += state.angular_velocity * dt;
        }
    }

    fn damp_constraints(&mut self) {
        let constraints: Vec<ConstraintDesc> =
            self.constraints.values().map(|c| c.desc).collect();

        for desc in constraints {
            let (Some(a), Some(b)) = (self.bodies.get(&desc.body_a), self.bodies.get(&desc.body_b))
            else {
                continue;
            };
            let damping = desc.damping.clamp(0.0, 1.0);
            if damping <= 0.0 {
                continue;
            }
            let pa = a.state.transform_point(&desc.anchor_a);
            let pb = b.state.transform_point(&desc.anchor_b);
            let delta = pb - pa;
            let dist = delta.norm();
            if dist < EPSILON {
                continue;
            }
            let normal = delta / dist;
            let (wa, wb) = mass_split(a.inv_mass, b.inv_mass);
            let relative = (b.state.velocity - a.state.velocity).dot(&normal);
            let impulse = normal * (relative * damping);

            if let Some(a) = self.bodies.get_mut(&desc.body_a) {
                a.state.velocity += impulse * wa;
            }
            if let Some(b) = self.bodies.get_mut(&desc.body_b) {
                b.state.velocity -= impulse * wb;
            }
        }
    }

    fn solve_constraints(&mut self) {
        let constraints: Vec<ConstraintDesc> =
            self.constraints.values().map(|c| c.desc).collect();

        for desc in constraints {
            let (Some(a), Some(b)) = (self.bodies.get(&desc.body_a), self.bodies.get(&desc.body_b))
            else {
                continue;
            };
            let pa = a.state.transform_point(&desc.anchor_a);
            let pb = b.state.transform_point(&desc.anchor_b);
            let delta = pb - pa;
            let dist = delta.norm();
            if dist < EPSILON {
                continue;
            }
            let normal = delta / dist;
            let error = dist - desc.length;
            let arm_a = cross(&(pa - a.state.position), &normal);
            let arm_b = cross(&(pb - b.state.position), &normal);
            let weight = a.inv_mass
                + a.inv_inertia * arm_a * arm_a
                + b.inv_mass
                + b.inv_inertia * arm_b * arm_b;
            if weight < EPSILON {
                continue;
            }
            let lambda = error * desc.stiffness.clamp(0.0, 1.0) / weight;

            if let Some(a) = self.bodies.get_mut(&desc.body_a) {
                a.state.position += normal * (lambda * a.inv_mass);
                a.state.angle += a.inv_inertia * arm_a * lambda;
            }
            if let Some(b) = self.bodies.get_mut(&desc.body_b) {
                b.state.position -= normal * (lambda * b.inv_mass);
                b.state.angle -= b.inv_inertia * arm_b * lambda;
            }
        }
    }

    fn solve_contacts(&mut self) {
        let ids: Vec<BodyId> = self.bodies.keys().copied().collect();

        for (i, &id_a) in ids.iter().enumerate() {
            for &id_b in &ids[i + 1..] {
                let (Some(a), Some(b)) = (self.bodies.get(&id_a), self.bodies.get(&id_b)) else {
                    continue;
                };
                if !a.filter.can_collide_with(&b.filter) {
                    continue;
                }

                let (a0, a1) = a.core();
                let (b0, b1) = b.core();
                let (ca, cb) = closest_points(a0, a1, b0, b1);
                let delta = cb - ca;
                let dist = delta.norm();
                let penetration = a.shape.radius() + b.shape.radius() - dist;
                if penetration <= 0.0 {
                    continue;
                }
                let normal = if dist > EPSILON {
                    delta / dist
                } else {
                    Vector2::x()
                };
                let (wa, wb) = mass_split(a.inv_mass, b.inv_mass);
                let push = normal * penetration;

                if let Some(a) = self.bodies.get_mut(&id_a) {
                    a.state.position -= push * wa;
                }
                if let Some(b) = self.bodies.get_mut(&id_b) {
                    b.state.position += push * wb;
                }
            }
        }
    }

    /// Push bodies out of the ground through their lowest core point.
    fn solve_ground(&mut self, grounded: &mut [bool]) {
        let Some(height) = self.config.ground_height else {
            return;
        };
        let ground = CollisionFilter::ground();

        for (body, grounded) in self.bodies.values_mut().zip(grounded.iter_mut()) {
            if !body.filter.can_collide_with(&ground) {
                continue;
            }
            let (p0, p1) = body.core();
            let contact = if p0.y < p1.y { p0 } else { p1 };
            let penetration = height + body.shape.radius() - contact.y;
            if penetration <= 0.0 {
                continue;
            }
            let arm = contact.x - body.state.position.x;
            let lambda = penetration / (body.inv_mass + body.inv_inertia * arm * arm);
            body.state.position.y += lambda * body.inv_mass;
            body.state.angle += body.inv_inertia * arm * lambda;
            *grounded = true;
        }
    }

    fn apply_ground_friction(&mut self, dt: f64) {
        let Some(height) = self.config.ground_height else {
            return;
        };
        let ground = CollisionFilter::ground();
        let rate = self.config.ground_friction_rate;

        for body in self.bodies.values_mut() {
            if !body.filter.can_collide_with(&ground) {
                continue;
            }
            let floor = height + body.shape.lowest_extent(body.state.angle);
            if body.state.position.y <= floor + CONTACT_SLOP {
                body.state.velocity.x /= 1.0 + body.friction * rate * dt;
            }
        }
    }
}

impl PhysicsWorld for SandboxWorld {
    fn create_body(
        &mut self,
        shape: BodyShape,
        position: Point2<f64>,
        options: &BodyOptions,
    ) -> Result<BodyId> {
        shape.validate().map_err(|e| WormError::engine(e.to_string()))?;
        require_finite_point("position", position)?;
        if !options.density.is_finite() || options.density <= 0.0 {
            return Err(WormError::engine(format!(
                "density must be positive and finite, got {}",
                options.density
            )));
        }
        require_non_negative("friction", options.friction)?;

        let mass = MassProperties::of_shape(&shape, options.density);
        mass.validate().map_err(|e| WormError::engine(e.to_string()))?;

        let id = BodyId::new(self.allocate_id());
        self.bodies.insert(
            id,
            SandboxBody {
                shape,
                state: BodyState::at_rest(position, 0.0),
                mass,
                inv_mass: 1.0 / mass.mass,
                inv_inertia: 1.0 / mass.inertia,
                friction: options.friction,
                filter: options.filter,
                force: Vector2::zeros(),
                torque: 0.0,
            },
        );
        Ok(id)
    }

    fn destroy_body(&mut self, body: BodyId) -> Result<()> {
        self.bodies
            .remove(&body)
            .ok_or(WormError::BodyNotFound(body))?;
        self.constraints
            .retain(|_, c| c.desc.body_a != body && c.desc.body_b != body);
        Ok(())
    }

    fn create_constraint(&mut self, desc: &ConstraintDesc) -> Result<ConstraintId> {
        self.body(desc.body_a)?;
        self.body(desc.body_b)?;
        desc.validate()?;

        let id = ConstraintId::new(self.allocate_id());
        self.constraints
            .insert(id, SandboxConstraint { desc: *desc });
        Ok(id)
    }

    fn destroy_constraint(&mut self, constraint: ConstraintId) -> Result<()> {
        self.constraints
            .remove(&constraint)
            .map(|_| ())
            .ok_or(WormError::ConstraintNotFound(constraint))
    }

    fn body_state(&self, body: BodyId) -> Result<BodyState> {
        Ok(self.body(body)?.state)
    }

    fn mass_properties(&self, body: BodyId) -> Result<MassProperties> {
        Ok(self.body(body)?.mass)
    }

    fn set_torque(&mut self, body: BodyId, torque: f64) -> Result<()> {
        require_finite("torque", torque)?;
        self.body_mut(body)?.torque = torque;
        Ok(())
    }

    fn set_angular_velocity(&mut self, body: BodyId, angular_velocity: f64) -> Result<()> {
        require_finite("angular velocity", angular_velocity)?;
        self.body_mut(body)?.state.angular_velocity = angular_velocity;
        Ok(())
    }

    fn set_velocity(&mut self, body: BodyId, velocity: Vector2<f64>) -> Result<()> {
        if !velocity.iter().all(|v| v.is_finite()) {
            return Err(WormError::engine("velocity must be finite"));
        }
        self.body_mut(body)?.state.velocity = velocity;
        Ok(())
    }

    fn apply_force(
        &mut self,
        body: BodyId,
        point: Point2<f64>,
        force: Vector2<f64>,
    ) -> Result<()> {
        require_finite_point("force point", point)?;
        if !force.iter().all(|f| f.is_finite()) {
            return Err(WormError::engine("force must be finite"));
        }
        let body = self.body_mut(body)?;
        let r = point - body.state.position;
        body.force += force;
        body.torque += r.x * force.y - r.y * force.x;
        Ok(())
    }

    fn set_friction(&mut self, body: BodyId, friction: f64) -> Result<()> {
        require_non_negative("friction", friction)?;
        self.body_mut(body)?.friction = friction;
        Ok(())
    }

    fn set_constraint_length(&mut self, constraint: ConstraintId, length: f64) -> Result<()> {
        require_non_negative("constraint length", length)?;
        self.constraint_mut(constraint)?.desc.length = length;
        Ok(())
    }

    fn set_constraint_stiffness(
        &mut self,
        constraint: ConstraintId,
        stiffness: f64,
    ) -> Result<()> {
        require_non_negative("constraint stiffness", stiffness)?;
        self.constraint_mut(constraint)?.desc.stiffness = stiffness;
        Ok(())
    }
}

/// Share of a correction taken by each body, by inverse mass.
/// Scalar 2D cross product.
fn cross(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

fn mass_split(inv_a: f64, inv_b: f64) -> (f64, f64) {
    let total = inv_a + inv_b;
    if total <= 0.0 {
        return (0.0, 0.0);
    }
    (inv_a / total, inv_b / total)
}

/// Closest points between segments `p1..q1` and `p2..q2`.
fn closest_points(
    p1: Point2<f64>,
    q1: Point2<f64>,
    p2: Point2<f64>,
    q2: Point2<f64>,
) -> (Point2<f64>, Point2<f64>) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.dot(&d1);
    let e = d2.dot(&d2);
    let f = d2.dot(&r);

    if a <= EPSILON && e <= EPSILON {
        return (p1, p2);
    }

    let (s, t) = if a <= EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(&r);
        if e <= EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(&d2);
            let denom = a * e - b * b;
            let s = if denom > EPSILON {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let t = (b * s + f) / e;
            if t < 0.0 {
                ((-c / a).clamp(0.0, 1.0), 0.0)
            } else if t > 1.0 {
                (((b - c) / a).clamp(0.0, 1.0), 1.0)
            } else {
                (s, t)
            }
        }
    };

    (p1 + d1 * s, p2 + d2 * t)
}

fn require_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(WormError::engine(format!("{name} must be finite, got {value}")))
    }
}

fn require_non_negative(name: &str, value: f64) -> Result<()> {
    require_finite(name, value)?;
    if value < 0.0 {
        return Err(WormError::engine(format!(
            "{name} must be non-negative, got {value}"
        )));
    }
    Ok(())
}

fn require_finite_point(name: &str, point: Point2<f64>) -> Result<()> {
    if point.coords.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(WormError::engine(format!("{name} must be finite")))
    }
}
