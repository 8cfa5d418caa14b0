//! Per-worm movement state carried between ticks.

use worm_types::{LocomotionConfig, MovementInput, Result, WormError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Everything the controller remembers from one tick to the next.
///
/// Serializable so a run can be snapshotted and resumed; restoring a state
/// reproduces the controller's subsequent output exactly.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MovementState {
    /// Smoothed direction in `[-1, 1]`.
    pub direction: f64,
    /// Vertical intent from the last input.
    pub vertical_intent: bool,
    /// Wave time accumulator.
    pub wave_time: f64,
    /// Constraint contraction phase accumulator.
    pub contraction_phase: f64,
    /// Activity level in `[0, 1]` scaling the wave.
    pub motion_envelope: f64,
    /// Friction written to each segment last tick.
    pub frictions: Vec<f64>,
}

impl MovementState {
    /// Fresh state for a chain whose segments start with `frictions`.
    #[must_use]
    pub fn new(frictions: Vec<f64>) -> Self {
        Self {
            direction: 0.0,
            vertical_intent: false,
            wave_time: 0.0,
            contraction_phase: 0.0,
            motion_envelope: 0.0,
            frictions,
        }
    }

    /// Fold one tick of input into the state.
    ///
    /// Returns whether the worm counts as moving after the update. A held
    /// stiffen intent freezes the wave and lets the envelope fall.
    pub(crate) fn advance(
        &mut self,
        input: &MovementInput,
        dt: f64,
        config: &LocomotionConfig,
    ) -> bool {
        if input.direction().abs() > config.idle_threshold {
            self.direction = input.direction();
        } else {
            self.direction *= (-config.direction_decay * dt).exp();
        }
        self.vertical_intent = input.vertical_intent;

        let moving = self.direction.abs() > config.idle_threshold && !input.stiffen_intent;
        let blend = 1.0 - (-config.envelope_rate * dt).exp();
        if moving {
            self.wave_time += dt * config.wave_speed;
            self.contraction_phase += dt * config.contraction_speed;
            self.motion_envelope += (1.0 - self.motion_envelope) * blend;
        } else {
            self.motion_envelope -= self.motion_envelope * blend;
        }
        self.motion_envelope = self.motion_envelope.clamp(0.0, 1.0);
        moving
    }

    /// Check that the state is finite and fits a chain of `segment_count`.
    pub fn validate(&self, segment_count: usize) -> Result<()> {
        if self.frictions.len() != segment_count {
            return Err(WormError::state_mismatch(format!(
                "state has {} frictions for {segment_count} segments",
                self.frictions.len()
            )));
        }
        let scalars = [
            self.direction,
            self.wave_time,
            self.contraction_phase,
            self.motion_envelope,
        ];
        if !scalars.iter().chain(&self.frictions).all(|x| x.is_finite()) {
            return Err(WormError::state_mismatch("state contains non-finite values"));
        }
        if !(-1.0..=1.0).contains(&self.direction) {
            return Err(WormError::state_mismatch(format!(
                "direction {} outside [-1, 1]",
                self.direction
            )));
        }
        if !(0.0..=1.0).contains(&self.motion_envelope) {
            return Err(WormError::state_mismatch(format!(
                "motion_envelope {} outside [0, 1]",
                self.motion_envelope
            )));
        }
        Ok(())
    }
}
