//! Per-tick command plan.
//!
//! Planners (the controller, the governor and the keyframe gait) only ever
//! produce or rewrite a [`TickPlan`]. Nothing touches the engine until
//! [`TickPlan::apply`], so every value can be inspected and sanitized first.

use bitflags::bitflags;
use nalgebra::{Point2, Vector2};
use worm_physics::PhysicsWorld;
use worm_types::{BodyId, Result};

use crate::governor::LocomotionMode;
use crate::network::ConstraintNetwork;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

bitflags! {
    /// What happened to a segment during planning.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct SegmentFlags: u32 {
        /// Segment is planted with high friction.
        const GRIPPING = 1 << 0;
        /// Segment received a forward velocity nudge.
        const NUDGED = 1 << 1;
        /// Segment received a random idle flop.
        const FLOPPED = 1 << 2;
        /// A non-finite value was replaced by the numeric guard.
        const GUARDED = 1 << 3;
    }
}

/// Commands for one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentCommand {
    /// Segment index, head = 0.
    pub index: usize,
    /// Engine handle.
    pub body: BodyId,
    /// Torque to set (replaces last tick's).
    pub torque: f64,
    /// Angular velocity to set.
    pub angular_velocity: f64,
    /// Linear velocity to set, if any.
    pub velocity: Option<Vector2<f64>>,
    /// Friction coefficient to set.
    pub friction: f64,
    /// Planning annotations.
    pub flags: SegmentFlags,
}

/// Commands for one constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintCommand {
    /// Constraint index.
    pub index: usize,
    /// Rest length to set.
    pub length: f64,
    /// Stiffness to set.
    pub stiffness: f64,
}

/// A force applied at a world point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceCommand {
    /// Segment index the force acts on.
    pub index: usize,
    /// Engine handle.
    pub body: BodyId,
    /// World-space application point.
    pub point: Point2<f64>,
    /// Force vector.
    pub force: Vector2<f64>,
}

/// Everything to write to the engine for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickPlan {
    /// Mode the plan was produced in.
    pub mode: LocomotionMode,
    /// One command per segment, in segment order.
    pub segments: Vec<SegmentCommand>,
    /// One command per constraint, in constraint order.
    pub constraints: Vec<ConstraintCommand>,
    /// Extra forces.
    pub forces: Vec<ForceCommand>,
}

impl TickPlan {
    /// Empty plan.
    #[must_use]
    pub fn new(mode: LocomotionMode) -> Self {
        Self {
            mode,
            segments: Vec::new(),
            constraints: Vec::new(),
            forces: Vec::new(),
        }
    }

    /// Write the plan to the engine.
    ///
    /// Segment commands go first, then constraint commands through the
    /// network (which remembers what it wrote), then forces.
    pub fn apply<W: PhysicsWorld + ?Sized>(
        &self,
        world: &mut W,
        network: &mut ConstraintNetwork,
    ) -> Result<()> {
        for command in &self.segments {
            world.set_torque(command.body, command.torque)?;
            world.set_angular_velocity(command.body, command.angular_velocity)?;
            if let Some(velocity) = command.velocity {
                world.set_velocity(command.body, velocity)?;
            }
            world.set_friction(command.body, command.friction)?;
        }
        for command in &self.constraints {
            network.set_length(world, command.index, command.length)?;
            network.set_stiffness(world, command.index, command.stiffness)?;
        }
        for force in &self.forces {
            world.apply_force(force.body, force.point, force.force)?;
        }
        Ok(())
    }

    /// Planned torques, in segment order.
    #[must_use]
    pub fn torques(&self) -> Vec<f64> {
        self.segments.iter().map(|s| s.torque).collect()
    }

    /// Planned frictions, in segment order.
    #[must_use]
    pub fn frictions(&self) -> Vec<f64> {
        self.segments.iter().map(|s| s.friction).collect()
    }

    /// Union of all segment flags.
    #[must_use]
    pub fn flags(&self) -> SegmentFlags {
        self.segments
            .iter()
            .fold(SegmentFlags::empty(), |acc, s| acc | s.flags)
    }

    /// Whether every planned number is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        let segments = self.segments.iter().all(|s| {
            s.torque.is_finite()
                && s.angular_velocity.is_finite()
                && s.friction.is_finite()
                && s.velocity.is_none_or(|v| v.iter().all(|x| x.is_finite()))
        });
        let constraints = self
            .constraints
            .iter()
            .all(|c| c.length.is_finite() && c.stiffness.is_finite());
        let forces = self.forces.iter().all(|f| {
            f.force.iter().all(|x| x.is_finite()) && f.point.iter().all(|x| x.is_finite())
        });
        segments && constraints && forces
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::chain::SegmentChain;
    use worm_physics::SandboxWorld;
    use worm_types::ChainConfig;

    fn setup() -> (SandboxWorld, SegmentChain, ConstraintNetwork) {
        let mut world = SandboxWorld::default();
        let config = ChainConfig::tapered(3);
        let chain = SegmentChain::build(&mut world, Point2::new(0.0, 1.0), &config).unwrap();
        let network = ConstraintNetwork::connect(&mut world, &chain, &config).unwrap();
        (world, chain, network)
    }

    fn plan_for(chain: &SegmentChain) -> TickPlan {
        let mut plan = TickPlan::new(LocomotionMode::Moving);
        for segment in chain.segments() {
            plan.segments.push(SegmentCommand {
                index: segment.index,
                body: segment.body,
                torque: 0.5,
                angular_velocity: 0.0,
                velocity: None,
                friction: 0.7,
                flags: SegmentFlags::GRIPPING,
            });
        }
        plan.constraints.push(ConstraintCommand {
            index: 1,
            length: 0.3,
            stiffness: 0.9,
        });
        plan
    }

    #[test]
    fn test_apply_writes_everything() {
        let (mut world, chain, mut network) = setup();
        let mut plan = plan_for(&chain);
        plan.segments[2].velocity = Some(Vector2::new(1.0, 0.0));
        plan.apply(&mut world, &mut network).unwrap();

        for segment in chain.segments() {
            assert_eq!(world.friction(segment.body).unwrap(), 0.7);
        }
        assert_eq!(
            world.body_state(chain.segments()[2].body).unwrap().velocity,
            Vector2::new(1.0, 0.0)
        );
        assert_eq!(network.current_length(1).unwrap(), 0.3);
        assert_eq!(network.current_stiffness(1).unwrap(), 0.9);
        assert_eq!(network.current_length(0).unwrap(), network.get(0).unwrap().base_length);
    }

    #[test]
    fn test_apply_fails_on_dead_body() {
        let (mut world, chain, mut network) = setup();
        let plan = plan_for(&chain);
        world.clear();
        let err = plan.apply(&mut world, &mut network).unwrap_err();
        assert!(err.is_missing_handle());
    }

    #[test]
    fn test_accessors() {
        let (_, chain, _) = setup();
        let mut plan = plan_for(&chain);
        assert_eq!(plan.torques(), vec![0.5; 3]);
        assert_eq!(plan.frictions(), vec![0.7; 3]);
        assert_eq!(plan.flags(), SegmentFlags::GRIPPING);
        assert!(plan.is_finite());

        plan.segments[1].torque = f64::NAN;
        plan.segments[0].flags |= SegmentFlags::NUDGED;
        assert!(!plan.is_finite());
        assert!(plan.flags().contains(SegmentFlags::GRIPPING | SegmentFlags::NUDGED));
    }
}
