//! Configuration types for worm construction and locomotion.
//!
//! A [`WormConfig`] bundles three parts:
//!
//! - [`ChainConfig`] - segment count, radii, roles, materials, constraint defaults
//! - [`LocomotionConfig`] - wave, torque, friction and lean tuning
//! - [`StabilizationConfig`] - idle relaxation, stiffen mode, guards
//!
//! Every part has a `validate()` that runs before anything touches the engine.

use crate::body::BodyShape;
use crate::filter::MAX_SEGMENTS;
use crate::{Result, WormError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Role of a segment, derived from its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SegmentRole {
    /// Leading segment(s); keeps its heading and grounds the chain.
    Head,
    /// Segments right behind the head; lean the most.
    Neck,
    /// Middle of the chain.
    Body,
    /// Trailing segments; weakest torque.
    Tail,
}

impl std::fmt::Display for SegmentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Head => "head",
            Self::Neck => "neck",
            Self::Body => "body",
            Self::Tail => "tail",
        };
        f.write_str(name)
    }
}

/// Shape used for every segment of a chain.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SegmentShape {
    /// Discs.
    Circle,
    /// Capsules along the chain axis.
    Capsule {
        /// Half length of the capsule core relative to the segment radius.
        half_length_ratio: f64,
    },
}

impl SegmentShape {
    /// Concrete body shape for a segment of the given radius.
    #[must_use]
    pub fn body_shape(&self, radius: f64) -> BodyShape {
        match *self {
            Self::Circle => BodyShape::circle(radius),
            Self::Capsule { half_length_ratio } => {
                BodyShape::capsule(half_length_ratio * radius, radius)
            }
        }
    }
}

/// Layout and material of the segment chain.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChainConfig {
    /// Number of segments (1 to 31).
    pub segment_count: usize,
    /// Radius of a segment with size ratio 1.
    pub base_radius: f64,
    /// Per-segment radius multipliers, head first.
    pub size_ratios: Vec<f64>,
    /// Segment shape.
    pub shape: SegmentShape,
    /// Rest distance between the rounded ends of adjacent segments.
    pub gap: f64,
    /// Number of head segments.
    pub head_count: usize,
    /// Number of neck segments after the head.
    pub neck_count: usize,
    /// Number of tail segments at the end.
    pub tail_count: usize,
    /// Base kinetic friction.
    pub friction: f64,
    /// Base static friction.
    pub friction_static: f64,
    /// Mass per unit area.
    pub density: f64,
    /// Bounciness in [0, 1].
    pub restitution: f64,
    /// Friction multiplier for head segments.
    pub head_friction_scale: f64,
    /// Density multiplier for head segments.
    pub head_density_scale: f64,
    /// Base constraint stiffness.
    pub constraint_stiffness: f64,
    /// Constraint damping.
    pub constraint_damping: f64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::tapered(13)
    }
}

impl ChainConfig {
    /// A chain whose radius shrinks quadratically toward the tail.
    #[must_use]
    pub fn tapered(segment_count: usize) -> Self {
        Self {
            segment_count,
            base_radius: 1.0,
            size_ratios: tapered_ratios(segment_count),
            shape: SegmentShape::Capsule {
                half_length_ratio: 0.5,
            },
            gap: 0.1,
            head_count: 1,
            neck_count: 2,
            tail_count: 2,
            friction: 0.3,
            friction_static: 0.5,
            density: 1.0,
            restitution: 0.0,
            head_friction_scale: 1.5,
            head_density_scale: 1.2,
            constraint_stiffness: 0.7,
            constraint_damping: 0.1,
        }
    }

    /// A chain of equal discs.
    #[must_use]
    pub fn uniform(segment_count: usize, radius: f64) -> Self {
        Self {
            base_radius: radius,
            size_ratios: vec![1.0; segment_count],
            shape: SegmentShape::Circle,
            ..Self::tapered(segment_count)
        }
    }

    /// A head-only chain. It builds but cannot locomote.
    #[must_use]
    pub fn single() -> Self {
        Self {
            segment_count: 1,
            size_ratios: vec![1.0],
            ..Self::tapered(1)
        }
    }

    /// Set the segment count and regenerate tapered size ratios.
    #[must_use]
    pub fn segments(mut self, segment_count: usize) -> Self {
        self.segment_count = segment_count;
        self.size_ratios = tapered_ratios(segment_count);
        self
    }

    /// Set explicit size ratios (and the matching segment count).
    #[must_use]
    pub fn size_ratios(mut self, ratios: Vec<f64>) -> Self {
        self.segment_count = ratios.len();
        self.size_ratios = ratios;
        self
    }

    /// Set the base radius.
    #[must_use]
    pub fn base_radius(mut self, radius: f64) -> Self {
        self.base_radius = radius;
        self
    }

    /// Set the segment shape.
    #[must_use]
    pub fn shape(mut self, shape: SegmentShape) -> Self {
        self.shape = shape;
        self
    }

    /// Set the role counts.
    #[must_use]
    pub fn roles(mut self, head: usize, neck: usize, tail: usize) -> Self {
        self.head_count = head;
        self.neck_count = neck;
        self.tail_count = tail;
        self
    }

    /// Set the rest gap between segments.
    #[must_use]
    pub fn gap(mut self, gap: f64) -> Self {
        self.gap = gap;
        self
    }

    /// Set constraint stiffness and damping.
    #[must_use]
    pub fn constraint(mut self, stiffness: f64, damping: f64) -> Self {
        self.constraint_stiffness = stiffness;
        self.constraint_damping = damping;
        self
    }

    /// Radius of segment `index`.
    #[must_use]
    pub fn radius(&self, index: usize) -> f64 {
        self.base_radius * self.size_ratios.get(index).copied().unwrap_or(1.0)
    }

    /// Role of segment `index`.
    ///
    /// Head ranges take priority over neck, neck over tail; whatever is left
    /// in the middle is body.
    #[must_use]
    pub fn role_of(&self, index: usize) -> SegmentRole {
        let n = self.segment_count;
        if index < self.head_count {
            SegmentRole::Head
        } else if index < self.head_count + self.neck_count {
            SegmentRole::Neck
        } else if index + self.tail_count >= n {
            SegmentRole::Tail
        } else {
            SegmentRole::Body
        }
    }

    /// Validate the chain layout.
    pub fn validate(&self) -> Result<()> {
        if self.segment_count == 0 {
            return Err(WormError::invalid_config(
                "segment_count must be at least 1",
            ));
        }
        if self.segment_count > MAX_SEGMENTS {
            return Err(WormError::invalid_config(format!(
                "segment_count {} exceeds the maximum of {MAX_SEGMENTS}",
                self.segment_count
            )));
        }
        if self.size_ratios.len() != self.segment_count {
            return Err(WormError::invalid_config(format!(
                "size_ratios has {} entries for {} segments",
                self.size_ratios.len(),
                self.segment_count
            )));
        }
        require_positive("base_radius", self.base_radius)?;
        for (i, &ratio) in self.size_ratios.iter().enumerate() {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(WormError::invalid_config(format!(
                    "size_ratios[{i}] must be positive and finite, got {ratio}"
                )));
            }
            require_positive("segment radius", self.radius(i))?;
        }
        if let SegmentShape::Capsule { half_length_ratio } = self.shape {
            require_non_negative("half_length_ratio", half_length_ratio)?;
        }
        if self.head_count == 0 {
            return Err(WormError::invalid_config("head_count must be at least 1"));
        }
        require_non_negative("gap", self.gap)?;
        require_non_negative("friction", self.friction)?;
        require_non_negative("friction_static", self.friction_static)?;
        require_positive("density", self.density)?;
        require_unit("restitution", self.restitution)?;
        require_positive("head_friction_scale", self.head_friction_scale)?;
        require_positive("head_density_scale", self.head_density_scale)?;
        require_non_negative("constraint_stiffness", self.constraint_stiffness)?;
        require_non_negative("constraint_damping", self.constraint_damping)?;
        Ok(())
    }
}

/// Size ratios shrinking from 1 at the head to 0.5 at the tail.
#[must_use]
pub fn tapered_ratios(segment_count: usize) -> Vec<f64> {
    if segment_count <= 1 {
        return vec![1.0; segment_count];
    }
    let last = (segment_count - 1) as f64;
    (0..segment_count)
        .map(|i| {
            let t = i as f64 / last;
            1.0 - 0.5 * t * t
        })
        .collect()
}

/// Per-role torque, lean and wave coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoleGain {
    /// Torque strength multiplier.
    pub torque: f64,
    /// Lean multiplier.
    pub lean: f64,
    /// Wave multiplier.
    pub wave: f64,
}

impl RoleGain {
    /// Create a role gain.
    #[must_use]
    pub const fn new(torque: f64, lean: f64, wave: f64) -> Self {
        Self { torque, lean, wave }
    }
}

/// Gains for every role.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoleGains {
    /// Head gains. Only `torque` is used; the head always targets angle 0.
    pub head: RoleGain,
    /// Neck gains.
    pub neck: RoleGain,
    /// Body gains.
    pub body: RoleGain,
    /// Tail gains.
    pub tail: RoleGain,
}

impl Default for RoleGains {
    fn default() -> Self {
        Self {
            head: RoleGain::new(1.0, 0.0, 0.0),
            neck: RoleGain::new(0.8, 1.0, 1.0),
            body: RoleGain::new(0.6, 0.7, 0.8),
            tail: RoleGain::new(0.4, 0.4, 0.5),
        }
    }
}

impl RoleGains {
    /// Gains for a role.
    #[must_use]
    pub const fn get(&self, role: SegmentRole) -> RoleGain {
        match role {
            SegmentRole::Head => self.head,
            SegmentRole::Neck => self.neck,
            SegmentRole::Body => self.body,
            SegmentRole::Tail => self.tail,
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, gain) in [
            ("head", self.head),
            ("neck", self.neck),
            ("body", self.body),
            ("tail", self.tail),
        ] {
            require_non_negative(&format!("{name} torque gain"), gain.torque)?;
            require_non_negative(&format!("{name} lean gain"), gain.lean)?;
            require_non_negative(&format!("{name} wave gain"), gain.wave)?;
        }
        Ok(())
    }
}

/// Tuning of the per-tick locomotion controller.
///
/// Torque strengths are per unit inertia (1/s²); the controller multiplies
/// them by each segment's rotational inertia.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocomotionConfig {
    /// Input magnitude below which the worm counts as idle.
    pub idle_threshold: f64,
    /// Exponential decay rate of the direction without input (1/s).
    pub direction_decay: f64,
    /// Wave time advance per second while moving.
    pub wave_speed: f64,
    /// Wave amplitude relative to the base radius.
    pub wave_amplitude: f64,
    /// Number of wave cycles along the chain.
    pub wave_frequency: f64,
    /// Wave time lag between head and tail.
    pub propagation_delay: f64,
    /// Rate of the motion envelope rising and falling (1/s).
    pub envelope_rate: f64,
    /// Contraction phase advance per second while moving.
    pub contraction_speed: f64,
    /// Relative constraint length modulation, in [0, 1).
    pub contraction_strength: f64,
    /// Relative constraint stiffness modulation, in [0, 1].
    pub stiffness_modulation: f64,
    /// Stiffness multiplier while idle, in (0, 1].
    pub idle_stiffness_scale: f64,
    /// Rate at which idle constraint lengths relax back to rest (1/s).
    pub length_relax_rate: f64,
    /// Base corrective torque strength (1/s²).
    pub torque_multiplier: f64,
    /// Torque opposing each segment's angular velocity (1/s).
    pub torque_damping: f64,
    /// Fraction of torque strength lost from head to tail.
    pub torque_fade: f64,
    /// Per-role coefficients.
    pub role_gains: RoleGains,
    /// Lean angle per unit direction (radians).
    pub weight_lean_strength: f64,
    /// Fraction of lean lost from head to tail.
    pub lean_decay: f64,
    /// Fraction of wave lost from head to tail.
    pub wave_decay: f64,
    /// Sliding friction.
    pub friction_low: f64,
    /// Gripping friction.
    pub friction_high: f64,
    /// Upper bound on friction as a multiple of `friction_high`.
    pub friction_max_scale: f64,
    /// Extra grip per radian of lean.
    pub grip_gain: f64,
    /// Lean magnitude below which a segment never grips.
    pub lean_epsilon: f64,
    /// Head friction multiplier while input is active.
    pub head_friction_multiplier: f64,
    /// Velocity added per tick to gripping segments.
    pub velocity_boost: f64,
    /// Angular velocity damping per tick, in [0, 1).
    pub damping: f64,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            idle_threshold: 0.05,
            direction_decay: 6.0,
            wave_speed: 3.0,
            wave_amplitude: 0.25,
            wave_frequency: 1.5,
            propagation_delay: 2.0,
            envelope_rate: 3.0,
            contraction_speed: 4.0,
            contraction_strength: 0.3,
            stiffness_modulation: 0.3,
            idle_stiffness_scale: 0.85,
            length_relax_rate: 4.0,
            torque_multiplier: 150.0,
            torque_damping: 24.5,
            torque_fade: 0.5,
            role_gains: RoleGains::default(),
            weight_lean_strength: 0.25,
            lean_decay: 0.5,
            wave_decay: 0.3,
            friction_low: 0.05,
            friction_high: 0.8,
            friction_max_scale: 1.5,
            grip_gain: 0.5,
            lean_epsilon: 0.02,
            head_friction_multiplier: 1.2,
            velocity_boost: 0.5,
            damping: 0.05,
        }
    }
}

impl LocomotionConfig {
    /// Slow, heavy crawling.
    #[must_use]
    pub fn sluggish() -> Self {
        Self {
            wave_speed: 1.5,
            velocity_boost: 0.3,
            torque_multiplier: 100.0,
            torque_damping: 20.0,
            damping: 0.1,
            ..Default::default()
        }
    }

    /// Fast, loose slithering.
    #[must_use]
    pub fn agile() -> Self {
        Self {
            wave_speed: 5.0,
            wave_amplitude: 0.35,
            velocity_boost: 0.7,
            torque_multiplier: 200.0,
            torque_damping: 28.3,
            ..Default::default()
        }
    }

    /// Set wave speed and amplitude.
    #[must_use]
    pub const fn wave(mut self, speed: f64, amplitude: f64) -> Self {
        self.wave_speed = speed;
        self.wave_amplitude = amplitude;
        self
    }

    /// Set the friction bounds.
    #[must_use]
    pub const fn friction(mut self, low: f64, high: f64) -> Self {
        self.friction_low = low;
        self.friction_high = high;
        self
    }

    /// Set the torque multiplier.
    #[must_use]
    pub const fn torque_multiplier(mut self, multiplier: f64) -> Self {
        self.torque_multiplier = multiplier;
        self
    }

    /// Set the grip velocity boost.
    #[must_use]
    pub const fn velocity_boost(mut self, boost: f64) -> Self {
        self.velocity_boost = boost;
        self
    }

    /// Largest friction any segment may receive.
    #[must_use]
    pub fn friction_ceiling(&self) -> f64 {
        self.friction_high * self.friction_max_scale
    }

    /// Clamp a friction value into the allowed band.
    #[must_use]
    pub fn clamp_friction(&self, friction: f64) -> f64 {
        friction.clamp(self.friction_low, self.friction_ceiling())
    }

    /// Validate the tuning.
    pub fn validate(&self) -> Result<()> {
        require_fraction("idle_threshold", self.idle_threshold)?;
        require_non_negative("direction_decay", self.direction_decay)?;
        require_non_negative("wave_speed", self.wave_speed)?;
        require_non_negative("wave_amplitude", self.wave_amplitude)?;
        require_non_negative("wave_frequency", self.wave_frequency)?;
        require_non_negative("propagation_delay", self.propagation_delay)?;
        require_non_negative("envelope_rate", self.envelope_rate)?;
        require_non_negative("contraction_speed", self.contraction_speed)?;
        require_fraction("contraction_strength", self.contraction_strength)?;
        require_unit("stiffness_modulation", self.stiffness_modulation)?;
        require_positive("idle_stiffness_scale", self.idle_stiffness_scale)?;
        if self.idle_stiffness_scale > 1.0 {
            return Err(WormError::invalid_config(format!(
                "idle_stiffness_scale must be at most 1, got {}",
                self.idle_stiffness_scale
            )));
        }
        require_non_negative("length_relax_rate", self.length_relax_rate)?;
        require_non_negative("torque_multiplier", self.torque_multiplier)?;
        require_non_negative("torque_damping", self.torque_damping)?;
        require_unit("torque_fade", self.torque_fade)?;
        self.role_gains.validate()?;
        require_non_negative("weight_lean_strength", self.weight_lean_strength)?;
        require_unit("lean_decay", self.lean_decay)?;
        require_unit("wave_decay", self.wave_decay)?;
        require_non_negative("friction_low", self.friction_low)?;
        require_non_negative("friction_high", self.friction_high)?;
        if self.friction_low > self.friction_high {
            return Err(WormError::invalid_config(format!(
                "friction_low ({}) must not exceed friction_high ({})",
                self.friction_low, self.friction_high
            )));
        }
        require_finite("friction_max_scale", self.friction_max_scale)?;
        if self.friction_max_scale < 1.0 {
            return Err(WormError::invalid_config(format!(
                "friction_max_scale must be at least 1, got {}",
                self.friction_max_scale
            )));
        }
        require_non_negative("grip_gain", self.grip_gain)?;
        require_non_negative("lean_epsilon", self.lean_epsilon)?;
        require_positive("head_friction_multiplier", self.head_friction_multiplier)?;
        require_non_negative("velocity_boost", self.velocity_boost)?;
        require_fraction("damping", self.damping)?;
        Ok(())
    }
}

/// Tuning of idle relaxation, stiffen mode and runtime guards.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StabilizationConfig {
    /// Restoring torque toward angle 0 while idle (1/s²).
    pub idle_restore: f64,
    /// Angular velocity damping per tick while idle, in [0, 1).
    pub idle_damping: f64,
    /// Chance per segment per idle tick of a random flop, in [0, 1].
    pub flop_probability: f64,
    /// Magnitude of a random flop (1/s²).
    pub flop_torque: f64,
    /// Alignment torque toward the head angle while stiffening (1/s²).
    pub stiffen_torque: f64,
    /// Fraction of alignment torque lost from head to tail.
    pub stiffen_fade: f64,
    /// Angular velocity damping per tick while stiffening, in [0, 1).
    pub stiffen_damping: f64,
    /// Separating force between adjacent segments while stiffening.
    pub separation_force: f64,
    /// Largest linear speed written to the engine.
    pub max_linear_speed: f64,
    /// Largest angular speed written to the engine.
    pub max_angular_speed: f64,
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            idle_restore: 1.0,
            idle_damping: 0.05,
            flop_probability: 0.002,
            flop_torque: 0.5,
            stiffen_torque: 60.0,
            stiffen_fade: 0.6,
            stiffen_damping: 0.7,
            separation_force: 2.0,
            max_linear_speed: 20.0,
            max_angular_speed: 15.0,
        }
    }
}

impl StabilizationConfig {
    /// No random flops while idle.
    #[must_use]
    pub fn calm() -> Self {
        Self {
            flop_probability: 0.0,
            ..Default::default()
        }
    }

    /// Set the flop probability and magnitude.
    #[must_use]
    pub const fn flops(mut self, probability: f64, torque: f64) -> Self {
        self.flop_probability = probability;
        self.flop_torque = torque;
        self
    }

    /// Set the stiffen torque and damping.
    #[must_use]
    pub const fn stiffen(mut self, torque: f64, damping: f64) -> Self {
        self.stiffen_torque = torque;
        self.stiffen_damping = damping;
        self
    }

    /// Validate the tuning.
    pub fn validate(&self) -> Result<()> {
        require_non_negative("idle_restore", self.idle_restore)?;
        require_fraction("idle_damping", self.idle_damping)?;
        require_unit("flop_probability", self.flop_probability)?;
        require_non_negative("flop_torque", self.flop_torque)?;
        require_non_negative("stiffen_torque", self.stiffen_torque)?;
        require_unit("stiffen_fade", self.stiffen_fade)?;
        require_fraction("stiffen_damping", self.stiffen_damping)?;
        require_non_negative("separation_force", self.separation_force)?;
        require_positive("max_linear_speed", self.max_linear_speed)?;
        require_positive("max_angular_speed", self.max_angular_speed)?;
        Ok(())
    }
}

/// Complete worm configuration.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WormConfig {
    /// Chain layout.
    pub chain: ChainConfig,
    /// Controller tuning.
    pub locomotion: LocomotionConfig,
    /// Governor tuning.
    pub stabilization: StabilizationConfig,
}

impl WormConfig {
    /// Create a config from its parts.
    #[must_use]
    pub fn new(
        chain: ChainConfig,
        locomotion: LocomotionConfig,
        stabilization: StabilizationConfig,
    ) -> Self {
        Self {
            chain,
            locomotion,
            stabilization,
        }
    }

    /// Default worm with `segment_count` tapered segments.
    #[must_use]
    pub fn with_segments(segment_count: usize) -> Self {
        Self {
            chain: ChainConfig::tapered(segment_count),
            ..Default::default()
        }
    }

    /// Replace the chain config.
    #[must_use]
    pub fn chain(mut self, chain: ChainConfig) -> Self {
        self.chain = chain;
        self
    }

    /// Replace the locomotion config.
    #[must_use]
    pub fn locomotion(mut self, locomotion: LocomotionConfig) -> Self {
        self.locomotion = locomotion;
        self
    }

    /// Replace the stabilization config.
    #[must_use]
    pub fn stabilization(mut self, stabilization: StabilizationConfig) -> Self {
        self.stabilization = stabilization;
        self
    }

    /// Validate every part.
    pub fn validate(&self) -> Result<()> {
        self.chain.validate()?;
        self.locomotion.validate()?;
        self.stabilization.validate()?;
        Ok(())
    }
}

fn require_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(WormError::invalid_config(format!(
            "{name} must be finite, got {value}"
        )))
    }
}

fn require_non_negative(name: &str, value: f64) -> Result<()> {
    require_finite(name, value)?;
    if value < 0.0 {
        return Err(WormError::invalid_config(format!(
            "{name} must be non-negative, got {value}"
        )));
    }
    Ok(())
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    require_finite(name, value)?;
    if value <= 0.0 {
        return Err(WormError::invalid_config(format!(
            "{name} must be positive, got {value}"
        )));
    }
    Ok(())
}

/// `[0, 1]`
fn require_unit(name: &str, value: f64) -> Result<()> {
    require_finite(name, value)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(WormError::invalid_config(format!(
            "{name} must be in [0, 1], got {value}"
        )));
    }
    Ok(())
}

/// `[0, 1)`
fn require_fraction(name: &str, value: f64) -> Result<()> {
    require_finite(name, value)?;
    if !(0.0..1.0).contains(&value) {
        return Err(WormError::invalid_config(format!(
            "{name} must be in [0, 1), got {value}"
        )));
    }
    Ok(())
}
