//! Traveling wave along the chain.

use std::f64::consts::TAU;

use worm_types::LocomotionConfig;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Shape of the traveling wave.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WaveParameters {
    /// Wave amplitude in world units (already scaled by the base radius).
    pub amplitude: f64,
    /// Number of wave cycles along the chain.
    pub frequency: f64,
    /// Wave time advance per second.
    pub speed: f64,
    /// Wave time lag between head and tail.
    pub propagation_delay: f64,
}

impl WaveParameters {
    /// Derive the wave from controller tuning and the chain's base radius.
    #[must_use]
    pub fn from_config(config: &LocomotionConfig, base_radius: f64) -> Self {
        Self {
            amplitude: config.wave_amplitude * base_radius,
            frequency: config.wave_frequency,
            speed: config.wave_speed,
            propagation_delay: config.propagation_delay,
        }
    }

    /// Position of segment `index` along a chain of `count`, in `[0, 1)`.
    #[must_use]
    pub fn ratio(index: usize, count: usize) -> f64 {
        if count == 0 {
            0.0
        } else {
            index as f64 / count as f64
        }
    }

    /// Phase offset of a segment at `ratio`.
    #[must_use]
    pub fn phase_offset(&self, ratio: f64) -> f64 {
        ratio * self.frequency * TAU
    }

    /// Wave time as seen by a segment at `ratio`.
    #[must_use]
    pub fn delayed_time(&self, wave_time: f64, ratio: f64) -> f64 {
        wave_time - ratio * self.propagation_delay
    }

    /// Angular amplitude for a segment of the given radius.
    ///
    /// Thicker segments bend less for the same wave.
    #[must_use]
    pub fn angular_amplitude(&self, radius: f64) -> f64 {
        if radius > 0.0 {
            self.amplitude / radius
        } else {
            0.0
        }
    }
}
