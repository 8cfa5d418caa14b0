//! Keyframe gait (legacy).
//!
//! An older inchworm-style driver kept for comparison with the traveling-wave
//! controller. The gait cycles through fixed phases:
//!
//! ```text
//!   Idle -> Prepare -> Plant -> Pull -> Follow -+-> Prepare  (still moving)
//!    ^                                          |
//!    +------------------------------------------+   (input released)
//! ```
//!
//! Each phase assigns [`SegmentPhysics`] to contiguous segment ranges. The
//! ranges are resolved into a per-segment table whenever the phase changes,
//! so a tick costs O(1) per segment. Between phase changes, every segment
//! eases from the current phase's table toward the next phase's table. A
//! range can cascade: segment `k` positions into the range holds its old
//! values for `k * cascade_delay` seconds after the change.

use std::fmt;

use tracing::debug;
use worm_types::{BodyState, LocomotionConfig, MovementInput, Result, WormError, normalize_angle};

use crate::chain::SegmentChain;
use crate::governor::LocomotionMode;
use crate::network::ConstraintNetwork;
use crate::plan::{ConstraintCommand, SegmentCommand, SegmentFlags, TickPlan};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Phase of the keyframe cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GaitPhase {
    /// At rest.
    #[default]
    Idle,
    /// Front lifts and slides.
    Prepare,
    /// Front grips.
    Plant,
    /// Rear contracts toward the front.
    Pull,
    /// Whole body extends again.
    Follow,
}

impl GaitPhase {
    /// All phases in cycle order.
    pub const ALL: [Self; 5] = [
        Self::Idle,
        Self::Prepare,
        Self::Plant,
        Self::Pull,
        Self::Follow,
    ];

    /// Phase that follows this one.
    #[must_use]
    pub const fn next(self, moving: bool) -> Self {
        match self {
            Self::Idle | Self::Follow if moving => Self::Prepare,
            Self::Idle | Self::Follow => Self::Idle,
            Self::Prepare => Self::Plant,
            Self::Plant => Self::Pull,
            Self::Pull => Self::Follow,
        }
    }
}

impl fmt::Display for GaitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Prepare => write!(f, "prepare"),
            Self::Plant => write!(f, "plant"),
            Self::Pull => write!(f, "pull"),
            Self::Follow => write!(f, "follow"),
        }
    }
}

/// Interpolation curve within a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Easing {
    /// Constant rate.
    #[default]
    Linear,
    /// Slow start.
    EaseIn,
    /// Slow end.
    EaseOut,
    /// Slow start and end.
    EaseInOut,
}

impl Easing {
    /// Map `t` in `[0, 1]` through the curve.
    #[must_use]
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Self::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - 2.0 * (1.0 - t) * (1.0 - t)
                }
            }
        }
    }
}

/// Physical parameters of one segment during a phase.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentPhysics {
    /// Multiplier on the leveling torque.
    pub torque_multiplier: f64,
    /// Multiplier on the rest length of the constraint behind the segment.
    pub length_ratio: f64,
    /// Multiplier on that constraint's stiffness.
    pub stiffness: f64,
    /// Multiplier on the segment's base friction.
    pub friction_multiplier: f64,
}

impl Default for SegmentPhysics {
    fn default() -> Self {
        Self::neutral()
    }
}

impl SegmentPhysics {
    /// Create segment physics.
    #[must_use]
    pub const fn new(
        torque_multiplier: f64,
        length_ratio: f64,
        stiffness: f64,
        friction_multiplier: f64,
    ) -> Self {
        Self {
            torque_multiplier,
            length_ratio,
            stiffness,
            friction_multiplier,
        }
    }

    /// Every multiplier at 1.
    #[must_use]
    pub const fn neutral() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0)
    }

    /// Linear blend toward `other`.
    #[must_use]
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        let mix = |a: f64, b: f64| a + (b - a) * t;
        Self {
            torque_multiplier: mix(self.torque_multiplier, other.torque_multiplier),
            length_ratio: mix(self.length_ratio, other.length_ratio),
            stiffness: mix(self.stiffness, other.stiffness),
            friction_multiplier: mix(self.friction_multiplier, other.friction_multiplier),
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("torque_multiplier", self.torque_multiplier),
            ("length_ratio", self.length_ratio),
            ("stiffness", self.stiffness),
            ("friction_multiplier", self.friction_multiplier),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(WormError::invalid_config(format!(
                    "{name} must be non-negative and finite, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Parameters for the segment range `start..end`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RangeEntry {
    /// First segment of the range.
    pub start: usize,
    /// One past the last segment.
    pub end: usize,
    /// Parameters for every segment in the range.
    pub physics: SegmentPhysics,
    /// Hold time added per position into the range after a phase change (s).
    pub cascade_delay: f64,
}

impl RangeEntry {
    /// Range without cascade.
    #[must_use]
    pub const fn new(start: usize, end: usize, physics: SegmentPhysics) -> Self {
        Self {
            start,
            end,
            physics,
            cascade_delay: 0.0,
        }
    }

    /// Set the cascade delay.
    #[must_use]
    pub const fn cascade(mut self, delay: f64) -> Self {
        self.cascade_delay = delay;
        self
    }
}

/// One phase of the cycle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhaseSpec {
    /// Which phase this describes.
    pub phase: GaitPhase,
    /// Phase length in seconds.
    pub duration: f64,
    /// Interpolation toward the next phase.
    pub easing: Easing,
    /// Sorted, non-overlapping ranges. Uncovered segments are neutral.
    pub ranges: Vec<RangeEntry>,
}

impl PhaseSpec {
    /// Phase with no ranges.
    #[must_use]
    pub fn new(phase: GaitPhase, duration: f64, easing: Easing) -> Self {
        Self {
            phase,
            duration,
            easing,
            ranges: Vec::new(),
        }
    }

    /// Add a range.
    #[must_use]
    pub fn range(mut self, entry: RangeEntry) -> Self {
        self.ranges.push(entry);
        self
    }

    fn validate(&self, segment_count: usize) -> Result<()> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(WormError::invalid_config(format!(
                "{} phase duration must be positive, got {}",
                self.phase, self.duration
            )));
        }
        let mut covered = 0;
        for entry in &self.ranges {
            if entry.start >= entry.end || entry.end > segment_count {
                return Err(WormError::invalid_config(format!(
                    "{} range {}..{} invalid for {segment_count} segments",
                    self.phase, entry.start, entry.end
                )));
            }
            if entry.start < covered {
                return Err(WormError::invalid_config(format!(
                    "{} ranges must be sorted and non-overlapping at segment {}",
                    self.phase, entry.start
                )));
            }
            if !entry.cascade_delay.is_finite() || entry.cascade_delay < 0.0 {
                return Err(WormError::invalid_config(format!(
                    "{} cascade delay must be non-negative, got {}",
                    self.phase, entry.cascade_delay
                )));
            }
            entry.physics.validate()?;
            covered = entry.end;
        }
        Ok(())
    }

    /// Per-segment parameters and cascade delays.
    fn resolve(&self, segment_count: usize) -> (Vec<SegmentPhysics>, Vec<f64>) {
        let mut table = vec![SegmentPhysics::neutral(); segment_count];
        let mut delays = vec![0.0; segment_count];
        for entry in &self.ranges {
            let slots = table
                .iter_mut()
                .zip(delays.iter_mut())
                .skip(entry.start)
                .take(entry.end.saturating_sub(entry.start));
            for (position, (slot, delay)) in slots.enumerate() {
                *slot = entry.physics;
                *delay = position as f64 * entry.cascade_delay;
            }
        }
        (table, delays)
    }
}

/// Full keyframe cycle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KeyframeConfig {
    /// One spec per [`GaitPhase`].
    pub phases: Vec<PhaseSpec>,
}

impl KeyframeConfig {
    /// Inchworm cycle: the front third plants, the rear pulls up behind it.
    #[must_use]
    pub fn inchworm(segment_count: usize) -> Self {
        let front = segment_count.div_ceil(3).max(1).min(segment_count);
        let rear = front..segment_count;

        let mut plant = PhaseSpec::new(GaitPhase::Plant, 0.25, Easing::EaseOut);
        let mut pull = PhaseSpec::new(GaitPhase::Pull, 0.4, Easing::EaseInOut);
        let mut prepare = PhaseSpec::new(GaitPhase::Prepare, 0.3, Easing::EaseInOut);
        if front > 0 {
            prepare = prepare.range(RangeEntry::new(
                0,
                front,
                SegmentPhysics::new(1.2, 1.1, 1.0, 0.5),
            ));
            plant = plant.range(
                RangeEntry::new(0, front, SegmentPhysics::new(1.0, 0.85, 1.2, 2.0)).cascade(0.03),
            );
            pull = pull.range(RangeEntry::new(
                0,
                front,
                SegmentPhysics::new(1.0, 1.0, 1.2, 2.0),
            ));
        }
        if !rear.is_empty() {
            pull = pull.range(
                RangeEntry::new(
                    rear.start,
                    rear.end,
                    SegmentPhysics::new(1.5, 0.7, 1.3, 0.4),
                )
                .cascade(0.02),
            );
        }
        let mut follow = PhaseSpec::new(GaitPhase::Follow, 0.3, Easing::EaseIn);
        if segment_count > 0 {
            follow = follow.range(RangeEntry::new(
                0,
                segment_count,
                SegmentPhysics::new(1.0, 1.1, 1.0, 1.0),
            ));
        }

        Self {
            phases: vec![
                PhaseSpec::new(GaitPhase::Idle, 0.5, Easing::Linear),
                prepare,
                plant,
                pull,
                follow,
            ],
        }
    }

    /// Spec for `phase`.
    #[must_use]
    pub fn spec(&self, phase: GaitPhase) -> Option<&PhaseSpec> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    /// Check the cycle against a chain of `segment_count`.
    pub fn validate(&self, segment_count: usize) -> Result<()> {
        for phase in GaitPhase::ALL {
            let count = self.phases.iter().filter(|p| p.phase == phase).count();
            if count != 1 {
                return Err(WormError::invalid_config(format!(
                    "{phase} phase must appear exactly once, found {count}"
                )));
            }
        }
        for spec in &self.phases {
            spec.validate(segment_count)?;
        }
        Ok(())
    }
}

/// Runtime state of the keyframe gait for one worm.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeGait {
    config: KeyframeConfig,
    segment_count: usize,
    phase: GaitPhase,
    elapsed: f64,
    current: Vec<SegmentPhysics>,
    next: Vec<SegmentPhysics>,
    held: Vec<SegmentPhysics>,
    delays: Vec<f64>,
    output: Vec<SegmentPhysics>,
}

impl KeyframeGait {
    /// Validate `config` and start in [`GaitPhase::Idle`].
    pub fn new(config: KeyframeConfig, segment_count: usize) -> Result<Self> {
        config.validate(segment_count)?;
        let neutral = vec![SegmentPhysics::neutral(); segment_count];
        let mut gait = Self {
            config,
            segment_count,
            phase: GaitPhase::Idle,
            elapsed: 0.0,
            current: neutral.clone(),
            next: neutral.clone(),
            held: neutral.clone(),
            delays: vec![0.0; segment_count],
            output: neutral,
        };
        gait.enter(GaitPhase::Idle, false);
        Ok(gait)
    }

    fn resolved(&self, phase: GaitPhase) -> (Vec<SegmentPhysics>, Vec<f64>) {
        self.config.spec(phase).map_or_else(
            || {
                (
                    vec![SegmentPhysics::neutral(); self.segment_count],
                    vec![0.0; self.segment_count],
                )
            },
            |spec| spec.resolve(self.segment_count),
        )
    }

    fn duration(&self) -> f64 {
        self.config.spec(self.phase).map_or(1.0, |spec| spec.duration)
    }

    fn easing(&self) -> Easing {
        self.config.spec(self.phase).map_or(Easing::Linear, |spec| spec.easing)
    }

    fn enter(&mut self, phase: GaitPhase, moving: bool) {
        self.phase = phase;
        let (current, delays) = self.resolved(phase);
        let (next, _) = self.resolved(phase.next(moving));
        self.current = current;
        self.next = next;
        self.delays = delays;
        self.held.clone_from(&self.output);
    }

    /// Advance by `dt` and return the per-segment parameters for this tick.
    pub fn advance(&mut self, dt: f64, moving: bool) -> &[SegmentPhysics] {
        self.elapsed += dt;
        let duration = self.duration();
        if self.elapsed >= duration {
            let next = self.phase.next(moving);
            debug!(from = %self.phase, to = %next, "keyframe phase changed");
            self.enter(next, moving);
            self.elapsed = (self.elapsed - duration).min(self.duration());
        } else if self.phase == GaitPhase::Idle && moving {
            // Start the cycle without waiting out the idle phase
            self.enter(GaitPhase::Prepare, moving);
            self.elapsed = 0.0;
        }

        let t = self.easing().apply(self.elapsed / self.duration());
        let segments = self
            .output
            .iter_mut()
            .zip(self.delays.iter_mut())
            .zip(self.held.iter().zip(self.current.iter().zip(&self.next)));
        for ((output, delay), (held, (current, next))) in segments {
            if *delay > 0.0 {
                *delay -= dt;
                *output = *held;
            } else {
                *output = current.lerp(next, t);
            }
        }
        &self.output
    }

    /// Produce a plan for this tick.
    pub fn plan(
        &mut self,
        chain: &SegmentChain,
        network: &ConstraintNetwork,
        states: &[BodyState],
        input: &MovementInput,
        dt: f64,
        config: &LocomotionConfig,
    ) -> Result<TickPlan> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(WormError::InvalidTimestep(dt));
        }
        if chain.len() != self.segment_count || states.len() != self.segment_count {
            return Err(WormError::state_mismatch(format!(
                "keyframe gait built for {} segments, got {} segments and {} states",
                self.segment_count,
                chain.len(),
                states.len()
            )));
        }

        let mode = LocomotionMode::from_input(input, config.idle_threshold);
        let direction = input.direction();
        let physics = self.advance(dt, mode == LocomotionMode::Moving).to_vec();
        let mut plan = TickPlan::new(mode);

        for ((segment, state), physics) in chain.segments().iter().zip(states).zip(&physics) {
            let angle = normalize_angle(state.angle);
            let scale = physics.torque_multiplier * segment.inertia;
            let mut command = SegmentCommand {
                index: segment.index,
                body: segment.body,
                torque: -(angle * config.torque_multiplier
                    + state.angular_velocity * config.torque_damping)
                    * scale,
                angular_velocity: state.angular_velocity * (1.0 - config.damping),
                velocity: None,
                friction: config.clamp_friction(segment.base_friction * physics.friction_multiplier),
                flags: SegmentFlags::empty(),
            };
            if physics.friction_multiplier > 1.0 {
                command.flags |= SegmentFlags::GRIPPING;
            }

            let slide = (1.0 - physics.friction_multiplier).max(0.0);
            if slide > 0.0 && direction != 0.0 {
                let mut nudge = state.heading() * direction * config.velocity_boost * slide;
                if !input.vertical_intent {
                    nudge.y = nudge.y.min(0.0);
                }
                command.velocity = Some(state.velocity + nudge);
                command.flags |= SegmentFlags::NUDGED;
            }
            plan.segments.push(command);
        }

        plan.constraints = network
            .constraints()
            .iter()
            .zip(&physics)
            .map(|(c, physics)| ConstraintCommand {
                index: c.index,
                length: (c.base_length * physics.length_ratio).max(0.0),
                stiffness: (c.base_stiffness * physics.stiffness).max(0.0),
            })
            .collect();

        Ok(plan)
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> GaitPhase {
        self.phase
    }

    /// Seconds spent in the current phase.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Parameters produced by the last [`advance`](Self::advance).
    #[must_use]
    pub fn output(&self) -> &[SegmentPhysics] {
        &self.output
    }

    /// Cycle configuration.
    #[must_use]
    pub fn config(&self) -> &KeyframeConfig {
        &self.config
    }
}
