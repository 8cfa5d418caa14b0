//! Last-line defense against non-finite commands.

use tracing::warn;

use crate::chain::SegmentChain;
use crate::network::ConstraintNetwork;
use crate::plan::{SegmentFlags, TickPlan};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct SegmentMemory {
    torque: f64,
    friction: f64,
    angular_velocity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct ConstraintMemory {
    length: f64,
    stiffness: f64,
}

/// Remembers the last finite value of every command and substitutes it for
/// NaN or infinity.
///
/// Velocity writes and forces with a non-finite component have no sensible
/// fallback and are dropped; the engine keeps the body's own velocity.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NumericGuard {
    segments: Vec<SegmentMemory>,
    constraints: Vec<ConstraintMemory>,
}

impl NumericGuard {
    /// Seed the guard with the chain's build-time values.
    #[must_use]
    pub fn new(chain: &SegmentChain, network: &ConstraintNetwork) -> Self {
        Self {
            segments: chain
                .segments()
                .iter()
                .map(|s| SegmentMemory {
                    friction: s.base_friction,
                    ..SegmentMemory::default()
                })
                .collect(),
            constraints: network
                .constraints()
                .iter()
                .map(|c| ConstraintMemory {
                    length: c.base_length,
                    stiffness: c.base_stiffness,
                })
                .collect(),
        }
    }

    /// Whether the guard tracks exactly this many segments and constraints.
    #[must_use]
    pub fn fits(&self, segments: usize, constraints: usize) -> bool {
        self.segments.len() == segments && self.constraints.len() == constraints
    }

    /// Replace every non-finite value in `plan`.
    ///
    /// Returns the number of replaced values plus dropped velocity writes
    /// and forces.
    pub fn sanitize(&mut self, plan: &mut TickPlan) -> usize {
        let mut events = 0;

        for command in &mut plan.segments {
            let index = command.index;
            let last = self.segments.get(index).copied().unwrap_or_default();
            let mut replaced = 0;

            replaced += guard(&mut command.torque, last.torque, index, "torque");
            replaced += guard(&mut command.friction, last.friction, index, "friction");
            replaced += guard(
                &mut command.angular_velocity,
                last.angular_velocity,
                index,
                "angular_velocity",
            );
            if command
                .velocity
                .is_some_and(|v| !v.iter().all(|x| x.is_finite()))
            {
                warn!(index, "dropping non-finite velocity write");
                command.velocity = None;
                replaced += 1;
            }

            if replaced > 0 {
                command.flags |= SegmentFlags::GUARDED;
                events += replaced;
            }
            if let Some(memory) = self.segments.get_mut(index) {
                memory.torque = command.torque;
                memory.friction = command.friction;
                memory.angular_velocity = command.angular_velocity;
            }
        }

        for command in &mut plan.constraints {
            let index = command.index;
            let last = self.constraints.get(index).copied().unwrap_or_default();
            events += guard(&mut command.length, last.length, index, "length");
            events += guard(&mut command.stiffness, last.stiffness, index, "stiffness");
            if let Some(memory) = self.constraints.get_mut(index) {
                memory.length = command.length;
                memory.stiffness = command.stiffness;
            }
        }

        let before = plan.forces.len();
        plan.forces.retain(|f| {
            let finite =
                f.force.iter().all(|x| x.is_finite()) && f.point.iter().all(|x| x.is_finite());
            if !finite {
                warn!(index = f.index, "dropping non-finite force");
            }
            finite
        });
        events + (before - plan.forces.len())
    }
}

fn guard(value: &mut f64, fallback: f64, index: usize, what: &'static str) -> usize {
    if value.is_finite() {
        0
    } else {
        warn!(index, value = *value, fallback, "non-finite {what} replaced");
        *value = fallback;
        1
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::governor::LocomotionMode;
    use crate::plan::{ConstraintCommand, ForceCommand, SegmentCommand};
    use nalgebra::{Point2, Vector2};
    use worm_physics::{PhysicsWorld, SandboxWorld};
    use worm_types::ChainConfig;

    fn setup() -> (SegmentChain, ConstraintNetwork) {
        let mut world = SandboxWorld::default();
        let config = ChainConfig::tapered(3);
        let chain = SegmentChain::build(&mut world, Point2::new(0.0, 1.0), &config).unwrap();
        let network = ConstraintNetwork::connect(&mut world, &chain, &config).unwrap();
        (chain, network)
    }

    fn plan(chain: &SegmentChain, torque: f64, length: f64) -> TickPlan {
        let mut plan = TickPlan::new(LocomotionMode::Moving);
        for s in chain.segments() {
            plan.segments.push(SegmentCommand {
                index: s.index,
                body: s.body,
                torque,
                angular_velocity: 0.0,
                velocity: Some(Vector2::new(torque, 0.0)),
                friction: 0.4,
                flags: SegmentFlags::empty(),
            });
        }
        plan.constraints.push(ConstraintCommand {
            index: 0,
            length,
            stiffness: 0.5,
        });
        plan
    }

    #[test]
    fn test_finite_plan_untouched() {
        let (chain, network) = setup();
        let mut guard = NumericGuard::new(&chain, &network);
        let mut p = plan(&chain, 1.0, 0.2);
        let before = p.clone();
        assert_eq!(guard.sanitize(&mut p), 0);
        assert_eq!(p, before);
    }

    #[test]
    fn test_replaces_with_last_good() {
        let (chain, network) = setup();
        let mut guard = NumericGuard::new(&chain, &network);

        let mut good = plan(&chain, 2.0, 0.3);
        guard.sanitize(&mut good);

        let mut bad = plan(&chain, f64::NAN, f64::INFINITY);
        let events = guard.sanitize(&mut bad);
        // torque and velocity per segment, plus one length
        assert_eq!(events, 3 * 2 + 1);
        assert!(bad.is_finite());
        for command in &bad.segments {
            assert_eq!(command.torque, 2.0);
            assert!(command.velocity.is_none());
            assert!(command.flags.contains(SegmentFlags::GUARDED));
        }
        assert_eq!(bad.constraints[0].length, 0.3);
    }

    #[test]
    fn test_bad_velocity_leaves_body_moving() {
        let mut world = SandboxWorld::default();
        let config = ChainConfig::tapered(3);
        let chain = SegmentChain::build(&mut world, Point2::new(0.0, 1.0), &config).unwrap();
        let mut network = ConstraintNetwork::connect(&mut world, &chain, &config).unwrap();
        let mut guard = NumericGuard::new(&chain, &network);

        let body = chain.segments()[1].body;
        world.set_velocity(body, Vector2::new(1.5, 0.0)).unwrap();

        // Never nudged before, so there is no earlier planned velocity
        let mut p = plan(&chain, 0.0, 0.1);
        p.segments[1].velocity = Some(Vector2::new(f64::NAN, 0.0));
        assert_eq!(guard.sanitize(&mut p), 1);
        assert!(p.segments[1].velocity.is_none());
        assert!(p.segments[1].flags.contains(SegmentFlags::GUARDED));

        p.apply(&mut world, &mut network).unwrap();
        assert_eq!(world.body_state(body).unwrap().velocity, Vector2::new(1.5, 0.0));
    }

    #[test]
    fn test_first_tick_falls_back_to_build_values() {
        let (chain, network) = setup();
        let mut guard = NumericGuard::new(&chain, &network);
        let mut p = plan(&chain, 0.0, f64::NAN);
        p.segments[1].friction = f64::NEG_INFINITY;
        guard.sanitize(&mut p);
        assert_eq!(p.segments[1].friction, chain.segments()[1].base_friction);
        assert_eq!(p.constraints[0].length, network.get(0).unwrap().base_length);
    }

    #[test]
    fn test_drops_non_finite_forces() {
        let (chain, network) = setup();
        let mut guard = NumericGuard::new(&chain, &network);
        let mut p = plan(&chain, 0.0, 0.1);
        let body = chain.segments()[0].body;
        p.forces.push(ForceCommand {
            index: 0,
            body,
            point: Point2::origin(),
            force: Vector2::new(1.0, 0.0),
        });
        p.forces.push(ForceCommand {
            index: 0,
            body,
            point: Point2::origin(),
            force: Vector2::new(f64::NAN, 0.0),
        });
        assert_eq!(guard.sanitize(&mut p), 1);
        assert_eq!(p.forces.len(), 1);
    }
}
