//! Per-tick torque, friction and constraint planner.
//!
//! The controller turns a [`MovementInput`] into a [`TickPlan`]:
//!
//! 1. Fold the input into the [`MovementState`] (direction smoothing, wave
//!    time, contraction phase, motion envelope).
//! 2. Per segment, compute a target angle from the lean and the traveling
//!    wave, then a torque toward it, damped by the segment's spin and scaled
//!    by its inertia.
//! 3. Per segment, pick a friction: segments leaning into the direction of
//!    travel grip and receive a forward nudge, the rest slide.
//! 4. Per constraint, modulate length and stiffness while moving, relax them
//!    toward rest while idle.
//!
//! The controller never touches the engine; [`Worm`](crate::Worm) applies
//! the plan after the governor and the numeric guard have seen it.

use worm_types::{
    BodyState, LocomotionConfig, MovementInput, Result, SegmentRole, WormError, normalize_angle,
};

use crate::chain::{Segment, SegmentChain};
use crate::governor::LocomotionMode;
use crate::network::ConstraintNetwork;
use crate::plan::{ConstraintCommand, SegmentCommand, SegmentFlags, TickPlan};
use crate::state::MovementState;
use crate::wave::WaveParameters;

/// Traveling-wave locomotion controller for one worm.
#[derive(Debug, Clone, PartialEq)]
pub struct LocomotionController {
    config: LocomotionConfig,
    base_radius: f64,
    wave: WaveParameters,
    state: MovementState,
}

impl LocomotionController {
    /// Controller for a freshly built chain.
    pub fn new(config: LocomotionConfig, chain: &SegmentChain, base_radius: f64) -> Result<Self> {
        let frictions = chain.segments().iter().map(|s| s.base_friction).collect();
        Self::from_state(config, base_radius, MovementState::new(frictions))
    }

    /// Controller resuming from a saved state.
    pub fn from_state(
        config: LocomotionConfig,
        base_radius: f64,
        state: MovementState,
    ) -> Result<Self> {
        config.validate()?;
        if !base_radius.is_finite() || base_radius <= 0.0 {
            return Err(WormError::invalid_config(format!(
                "base_radius must be positive and finite, got {base_radius}"
            )));
        }
        Ok(Self {
            wave: WaveParameters::from_config(&config, base_radius),
            config,
            base_radius,
            state,
        })
    }

    /// Produce this tick's plan.
    ///
    /// `states` must hold one body state per segment, in segment order.
    pub fn plan(
        &mut self,
        chain: &SegmentChain,
        network: &ConstraintNetwork,
        states: &[BodyState],
        input: &MovementInput,
        dt: f64,
    ) -> Result<TickPlan> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(WormError::InvalidTimestep(dt));
        }
        if states.len() != chain.len() {
            return Err(WormError::state_mismatch(format!(
                "{} body states for {} segments",
                states.len(),
                chain.len()
            )));
        }

        let moving = self.state.advance(input, dt, &self.config);
        let mode = LocomotionMode::from_input(input, self.config.idle_threshold);
        let mut plan = TickPlan::new(mode);

        let count = chain.len();
        let input_active = input.direction().abs() > self.config.idle_threshold;
        plan.segments = chain
            .segments()
            .iter()
            .zip(states)
            .map(|(segment, state)| self.segment_command(segment, state, count, input_active))
            .collect();

        plan.constraints = network
            .constraints()
            .iter()
            .map(|c| {
                let offset = self
                    .wave
                    .phase_offset(WaveParameters::ratio(c.index, count));
                let (length, stiffness) = if moving {
                    let contraction = (self.state.contraction_phase + offset).sin();
                    let modulation = (2.0 * self.state.wave_time + offset).sin();
                    (
                        c.base_length * (1.0 + self.config.contraction_strength * contraction),
                        c.base_stiffness * (1.0 + self.config.stiffness_modulation * modulation),
                    )
                } else {
                    let relax = 1.0 - (-self.config.length_relax_rate * dt).exp();
                    let current = c.current_length();
                    (
                        current + (c.base_length - current) * relax,
                        c.base_stiffness * self.config.idle_stiffness_scale,
                    )
                };
                ConstraintCommand {
                    index: c.index,
                    length: length.max(0.0),
                    stiffness: stiffness.max(0.0),
                }
            })
            .collect();

        Ok(plan)
    }

    fn segment_command(
        &self,
        segment: &Segment,
        state: &BodyState,
        count: usize,
        input_active: bool,
    ) -> SegmentCommand {
        let config = &self.config;
        let ratio = WaveParameters::ratio(segment.index, count);
        let gain = config.role_gains.get(segment.role);
        let angle = normalize_angle(state.angle);
        let direction = self.state.direction;

        let mut command = SegmentCommand {
            index: segment.index,
            body: segment.body,
            torque: 0.0,
            angular_velocity: state.angular_velocity * (1.0 - config.damping),
            velocity: None,
            friction: config.friction_low,
            flags: SegmentFlags::empty(),
        };

        let target = if segment.role == SegmentRole::Head {
            command.friction = if input_active {
                config.clamp_friction(config.friction_high * config.head_friction_multiplier)
            } else {
                config.clamp_friction(segment.base_friction)
            };
            0.0
        } else {
            let lean = direction
                * config.weight_lean_strength
                * gain.lean
                * (1.0 - config.lean_decay * ratio);
            let delayed = self.wave.delayed_time(self.state.wave_time, ratio);
            let wave = self.wave.angular_amplitude(segment.radius)
                * self.state.motion_envelope
                * delayed.sin()
                * gain.wave
                * (1.0 - config.wave_decay * ratio);

            if angle.abs() > config.lean_epsilon && angle.signum() * direction > 0.0 {
                command.friction = config
                    .clamp_friction(config.friction_high * (1.0 + config.grip_gain * angle.abs()));
                command.flags |= SegmentFlags::GRIPPING;

                let mut nudge = state.heading() * direction * config.velocity_boost;
                if !self.state.vertical_intent {
                    nudge.y = nudge.y.min(0.0);
                }
                command.velocity = Some(state.velocity + nudge);
                command.flags |= SegmentFlags::NUDGED;
            }
            lean + wave
        };

        // Proportional pull toward the target, damped by the body's own spin
        let scale = gain.torque * (1.0 - config.torque_fade * ratio).max(0.0) * segment.inertia;
        command.torque = normalize_angle(target - angle) * config.torque_multiplier * scale
            - state.angular_velocity * config.torque_damping * scale;
        command
    }

    /// Record the frictions that were actually written this tick.
    pub fn commit(&mut self, plan: &TickPlan) {
        self.state.frictions = plan.frictions();
    }

    /// Replace the tuning. The movement state is kept.
    pub fn update_config(&mut self, config: LocomotionConfig) -> Result<()> {
        config.validate()?;
        self.wave = WaveParameters::from_config(&config, self.base_radius);
        self.config = config;
        Ok(())
    }

    /// Current tuning.
    #[must_use]
    pub fn config(&self) -> &LocomotionConfig {
        &self.config
    }

    /// Current movement state.
    #[must_use]
    pub fn state(&self) -> &MovementState {
        &self.state
    }

    /// Wave derived from the tuning.
    #[must_use]
    pub fn wave(&self) -> &WaveParameters {
        &self.wave
    }

    /// Radius the wave amplitude is scaled by.
    #[must_use]
    pub fn base_radius(&self) -> f64 {
        self.base_radius
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point2;
    use worm_physics::{PhysicsWorld, SandboxWorld};
    use worm_types::ChainConfig;

    const DT: f64 = 1.0 / 60.0;

    struct Rig {
        world: SandboxWorld,
        chain: SegmentChain,
        network: ConstraintNetwork,
        controller: LocomotionController,
    }

    fn rig(count: usize) -> Rig {
        let mut world = SandboxWorld::default();
        let config = ChainConfig::tapered(count);
        let chain = SegmentChain::build(&mut world, Point2::new(0.0, 1.0), &config).unwrap();
        let network = ConstraintNetwork::connect(&mut world, &chain, &config).unwrap();
        let controller =
            LocomotionController::new(LocomotionConfig::default(), &chain, config.base_radius)
                .unwrap();
        Rig {
            world,
            chain,
            network,
            controller,
        }
    }

    impl Rig {
        fn plan(&mut self, direction: f64) -> TickPlan {
            let states = self.chain.read_states(&self.world).unwrap();
            self.controller
                .plan(
                    &self.chain,
                    &self.network,
                    &states,
                    &MovementInput::new(direction),
                    DT,
                )
                .unwrap()
        }
    }

    #[test]
    fn test_plan_covers_chain() {
        let mut rig = rig(6);
        let plan = rig.plan(1.0);
        assert_eq!(plan.segments.len(), 6);
        assert_eq!(plan.constraints.len(), 5);
        assert_eq!(plan.mode, LocomotionMode::Moving);
        assert!(plan.is_finite());
    }

    #[test]
    fn test_head_friction_follows_input() {
        let mut rig = rig(4);
        let config = LocomotionConfig::default();

        let active = rig.plan(1.0);
        assert_relative_eq!(
            active.segments[0].friction,
            config.friction_high * config.head_friction_multiplier
        );

        let idle = rig.plan(0.0);
        assert_relative_eq!(
            idle.segments[0].friction,
            config.clamp_friction(rig.chain.segments()[0].base_friction)
        );
    }

    #[test]
    fn test_head_torque_restores_level() {
        let mut rig = rig(3);
        let head = rig.chain.segments()[0].body;
        rig.world.set_angle(head, 0.3).unwrap();
        let plan = rig.plan(0.0);
        assert!(plan.segments[0].torque < 0.0);
    }

    #[test]
    fn test_lean_grips_and_nudges() {
        let mut rig = rig(5);
        let body = rig.chain.segments()[2].body;
        rig.world.set_angle(body, 0.3).unwrap();

        let plan = rig.plan(1.0);
        let command = &plan.segments[2];
        assert!(command.flags.contains(SegmentFlags::GRIPPING | SegmentFlags::NUDGED));
        assert!(command.friction > LocomotionConfig::default().friction_high);
        let velocity = command.velocity.unwrap();
        assert!(velocity.x > 0.0);
        assert!(velocity.y <= 0.0);

        // Level segments slide
        let level = &plan.segments[3];
        assert_eq!(level.friction, LocomotionConfig::default().friction_low);
        assert!(level.velocity.is_none());
    }

    #[test]
    fn test_lean_against_direction_slides() {
        let mut rig = rig(5);
        let body = rig.chain.segments()[2].body;
        rig.world.set_angle(body, -0.3).unwrap();
        let plan = rig.plan(1.0);
        assert!(!plan.segments[2].flags.contains(SegmentFlags::GRIPPING));
    }

    #[test]
    fn test_vertical_intent_keeps_upward_nudge() {
        let mut rig = rig(4);
        let body = rig.chain.segments()[1].body;
        rig.world.set_angle(body, 0.5).unwrap();
        let states = rig.chain.read_states(&rig.world).unwrap();
        let input = MovementInput::new(1.0).with_vertical(true);
        let plan = rig
            .controller
            .plan(&rig.chain, &rig.network, &states, &input, DT)
            .unwrap();
        assert!(plan.segments[1].velocity.unwrap().y > 0.0);
    }

    #[test]
    fn test_frictions_stay_in_band() {
        let mut rig = rig(8);
        let config = LocomotionConfig::default();
        for (i, segment) in rig.chain.segments().iter().enumerate() {
            let angle = if i % 2 == 0 { 3.0 } else { -3.0 };
            rig.world.set_angle(segment.body, angle).unwrap();
        }
        for direction in [1.0, -1.0, 0.0] {
            for command in rig.plan(direction).segments {
                assert!(command.friction >= config.friction_low);
                assert!(command.friction <= config.friction_ceiling());
            }
        }
    }

    #[test]
    fn test_constraints_modulate_then_relax() {
        let mut rig = rig(5);
        for _ in 0..10 {
            let plan = rig.plan(1.0);
            plan.apply(&mut rig.world, &mut rig.network).unwrap();
        }
        let base = rig.network.get(0).unwrap().base_length;
        assert!((rig.network.current_length(0).unwrap() - base).abs() > 1e-6);

        for _ in 0..120 {
            let plan = rig.plan(0.0);
            assert_eq!(plan.mode, LocomotionMode::Idle);
            plan.apply(&mut rig.world, &mut rig.network).unwrap();
        }
        assert!((rig.network.current_length(0).unwrap() - base).abs() < 1e-3);

        let stiffness = rig.network.current_stiffness(0).unwrap();
        let expected = rig.network.get(0).unwrap().base_stiffness
            * LocomotionConfig::default().idle_stiffness_scale;
        assert_relative_eq!(stiffness, expected);
    }

    #[test]
    fn test_damping_scales_angular_velocity() {
        let mut rig = rig(3);
        let body = rig.chain.segments()[1].body;
        rig.world.set_angular_velocity(body, 2.0).unwrap();
        let plan = rig.plan(0.0);
        assert_relative_eq!(plan.segments[1].angular_velocity, 2.0 * 0.95);
    }

    #[test]
    fn test_spin_is_damped_by_torque() {
        let mut rig = rig(3);
        let body = rig.chain.segments()[1].body;
        rig.world.set_angular_velocity(body, 2.0).unwrap();
        let damped = rig.plan(0.0);
        assert!(damped.segments[1].torque < 0.0);

        let undamped = LocomotionConfig {
            torque_damping: 0.0,
            ..Default::default()
        };
        rig.controller.update_config(undamped).unwrap();
        assert_eq!(rig.plan(0.0).segments[1].torque, 0.0);
    }

    #[test]
    fn test_single_segment_finite() {
        let mut world = SandboxWorld::default();
        let config = ChainConfig::single();
        let chain = SegmentChain::build(&mut world, Point2::new(0.0, 1.0), &config).unwrap();
        let network = ConstraintNetwork::connect(&mut world, &chain, &config).unwrap();
        let mut controller =
            LocomotionController::new(LocomotionConfig::default(), &chain, 1.0).unwrap();
        let states = chain.read_states(&world).unwrap();
        let plan = controller
            .plan(&chain, &network, &states, &MovementInput::new(1.0), DT)
            .unwrap();
        assert_eq!(plan.segments.len(), 1);
        assert!(plan.constraints.is_empty());
        assert!(plan.segments[0].torque.is_finite());
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let mut rig = rig(3);
        let states = rig.chain.read_states(&rig.world).unwrap();
        let input = MovementInput::idle();
        assert_eq!(
            rig.controller
                .plan(&rig.chain, &rig.network, &states, &input, 0.0)
                .unwrap_err(),
            WormError::InvalidTimestep(0.0)
        );
        let err = rig
            .controller
            .plan(&rig.chain, &rig.network, &states[..2], &input, DT)
            .unwrap_err();
        assert!(matches!(err, WormError::StateMismatch { .. }));
    }

    #[test]
    fn test_commit_and_update_config() {
        let mut rig = rig(3);
        let plan = rig.plan(1.0);
        rig.controller.commit(&plan);
        assert_eq!(rig.controller.state().frictions, plan.frictions());

        let faster = LocomotionConfig::default().wave(6.0, 0.5);
        rig.controller.update_config(faster).unwrap();
        assert_eq!(rig.controller.wave().speed, 6.0);
        assert_relative_eq!(rig.controller.wave().amplitude, 0.5);

        let broken = LocomotionConfig::default().friction(0.9, 0.1);
        assert!(rig.controller.update_config(broken).is_err());
        assert_eq!(rig.controller.config().wave_speed, 6.0);
    }
}
