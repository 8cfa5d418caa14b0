//! Mode selection and stabilization on top of the controller's plan.
//!
//! | Mode | Entered when | Effect |
//! |------|--------------|--------|
//! | [`Stiffening`](LocomotionMode::Stiffening) | stiffen intent held | align every segment with the head, heavy damping, separate neighbors |
//! | [`Moving`](LocomotionMode::Moving) | `|direction| > idle_threshold` | controller plan passes through |
//! | [`Idle`](LocomotionMode::Idle) | otherwise | restoring torque, occasional random flops |
//!
//! The mode is recomputed from the input every tick; leaving a mode reverts
//! its effects on the next plan.

use std::fmt;

use nalgebra::Vector2;
use rand::Rng;
use tracing::debug;
use worm_types::{BodyState, MovementInput, Result, StabilizationConfig, normalize_angle};

use crate::chain::SegmentChain;
use crate::network::ConstraintNetwork;
use crate::plan::{ForceCommand, SegmentFlags, TickPlan};
use crate::wave::WaveParameters;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// High-level behavior for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LocomotionMode {
    /// No directional input.
    #[default]
    Idle,
    /// Directional input above the idle threshold.
    Moving,
    /// Stiffen intent held; overrides direction.
    Stiffening,
}

impl LocomotionMode {
    /// Mode for this tick's input.
    #[must_use]
    pub fn from_input(input: &MovementInput, idle_threshold: f64) -> Self {
        if input.stiffen_intent {
            Self::Stiffening
        } else if input.direction().abs() > idle_threshold {
            Self::Moving
        } else {
            Self::Idle
        }
    }
}

impl fmt::Display for LocomotionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Moving => write!(f, "moving"),
            Self::Stiffening => write!(f, "stiffening"),
        }
    }
}

/// Rewrites the controller's plan according to the current mode.
///
/// Randomness comes from the injected `R`, so a seeded generator makes runs
/// reproducible.
#[derive(Debug, Clone)]
pub struct StabilizationGovernor<R> {
    config: StabilizationConfig,
    rng: R,
    mode: LocomotionMode,
}

impl<R: Rng> StabilizationGovernor<R> {
    /// Create a governor.
    pub fn new(config: StabilizationConfig, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rng,
            mode: LocomotionMode::Idle,
        })
    }

    /// Apply the mode's stabilization to `plan`.
    ///
    /// `states` must be the body states the plan was computed from.
    pub fn govern(
        &mut self,
        plan: &mut TickPlan,
        chain: &SegmentChain,
        network: &ConstraintNetwork,
        states: &[BodyState],
    ) {
        if plan.mode != self.mode {
            debug!(from = %self.mode, to = %plan.mode, "locomotion mode changed");
            self.mode = plan.mode;
        }

        match plan.mode {
            LocomotionMode::Idle => self.relax(plan, chain, states),
            LocomotionMode::Moving => {}
            LocomotionMode::Stiffening => self.stiffen(plan, chain, network, states),
        }
        self.clamp_speeds(plan, states);
    }

    fn relax(&mut self, plan: &mut TickPlan, chain: &SegmentChain, states: &[BodyState]) {
        let config = &self.config;
        for ((command, segment), state) in plan.segments.iter_mut().zip(chain.segments()).zip(states)
        {
            let angle = normalize_angle(state.angle);
            command.torque -= angle * config.idle_restore * segment.inertia;
            command.angular_velocity = state.angular_velocity * (1.0 - config.idle_damping);

            if self.rng.gen_bool(config.flop_probability) {
                let kick = self.rng.gen_range(-1.0..1.0);
                command.torque += kick * config.flop_torque * segment.inertia;
                command.flags |= SegmentFlags::FLOPPED;
            }
        }
    }

    fn stiffen(
        &self,
        plan: &mut TickPlan,
        chain: &SegmentChain,
        network: &ConstraintNetwork,
        states: &[BodyState],
    ) {
        let config = &self.config;
        let count = chain.len();
        let Some(head) = states.first() else {
            return;
        };
        let reference = head.angle;

        for ((command, segment), state) in plan.segments.iter_mut().zip(chain.segments()).zip(states)
        {
            if !segment.is_head() {
                let ratio = WaveParameters::ratio(segment.index, count);
                let strength =
                    config.stiffen_torque * (1.0 - config.stiffen_fade * ratio) * segment.inertia;
                command.torque = normalize_angle(reference - state.angle) * strength;
            }
            command.angular_velocity = state.angular_velocity * (1.0 - config.stiffen_damping);
            command.velocity = None;
            command.flags.remove(SegmentFlags::NUDGED);
        }

        for (command, constraint) in plan.constraints.iter_mut().zip(network.constraints()) {
            command.length = constraint.base_length;
            command.stiffness = constraint.base_stiffness;
        }

        for (pair, segments) in states.windows(2).zip(chain.segments().windows(2)) {
            let axis = pair[1].position - pair[0].position;
            let distance = axis.norm();
            if distance <= f64::EPSILON {
                continue;
            }
            let axis = axis / distance;
            let (lead, trail) = (&segments[0], &segments[1]);
            let falloff = 1.0 - config.stiffen_fade * WaveParameters::ratio(lead.index, count);
            let push = config.separation_force * falloff;

            plan.forces.push(ForceCommand {
                index: lead.index,
                body: lead.body,
                point: pair[0].position,
                force: -axis * push * lead.mass,
            });
            plan.forces.push(ForceCommand {
                index: trail.index,
                body: trail.body,
                point: pair[1].position,
                force: axis * push * trail.mass,
            });
        }
    }

    fn clamp_speeds(&self, plan: &mut TickPlan, states: &[BodyState]) {
        let max_angular = self.config.max_angular_speed;
        for (command, state) in plan.segments.iter_mut().zip(states) {
            command.angular_velocity = command.angular_velocity.clamp(-max_angular, max_angular);
            command.velocity = match command.velocity {
                Some(velocity) => Some(self.limit_velocity(velocity).unwrap_or(velocity)),
                None => self.limit_velocity(state.velocity),
            };
        }
    }

    /// Scale `velocity` down to the speed limit, or `None` if it is within it.
    #[must_use]
    pub fn limit_velocity(&self, velocity: Vector2<f64>) -> Option<Vector2<f64>> {
        let speed = velocity.norm();
        (speed > self.config.max_linear_speed)
            .then(|| velocity * (self.config.max_linear_speed / speed))
    }

    /// Mode of the last governed plan.
    #[must_use]
    pub fn mode(&self) -> LocomotionMode {
        self.mode
    }

    /// The generator behind idle flops.
    #[must_use]
    pub fn rng(&self) -> &R {
        &self.rng
    }

    /// Continue from a saved generator and mode.
    pub(crate) fn resume(&mut self, rng: R, mode: LocomotionMode) {
        self.rng = rng;
        self.mode = mode;
    }

    /// Current tuning.
    #[must_use]
    pub fn config(&self) -> &StabilizationConfig {
        &self.config
    }

    /// Replace the tuning.
    pub fn update_config(&mut self, config: StabilizationConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }
}
