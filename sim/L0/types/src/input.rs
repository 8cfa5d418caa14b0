//! Per-tick movement intent.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Movement intent sampled once per tick.
///
/// Construct through [`MovementInput::new`] so the direction is clamped into
/// `[-1, 1]`; non-finite directions become `0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MovementInput {
    direction: f64,
    /// Allow the grip nudge to push upward.
    pub vertical_intent: bool,
    /// Request the stiffen/straighten mode.
    pub stiffen_intent: bool,
}

impl MovementInput {
    /// Create an input with the given horizontal direction.
    #[must_use]
    pub fn new(direction: f64) -> Self {
        Self {
            direction: clamp_direction(direction),
            vertical_intent: false,
            stiffen_intent: false,
        }
    }

    /// No movement at all.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    /// Stiffen request with no direction.
    #[must_use]
    pub fn stiffen() -> Self {
        Self::default().with_stiffen(true)
    }

    /// Set the vertical intent.
    #[must_use]
    pub const fn with_vertical(mut self, vertical_intent: bool) -> Self {
        self.vertical_intent = vertical_intent;
        self
    }

    /// Set the stiffen intent.
    #[must_use]
    pub const fn with_stiffen(mut self, stiffen_intent: bool) -> Self {
        self.stiffen_intent = stiffen_intent;
        self
    }

    /// Horizontal direction in `[-1, 1]`.
    #[must_use]
    pub const fn direction(&self) -> f64 {
        self.direction
    }
}

fn clamp_direction(direction: f64) -> f64 {
    if direction.is_finite() {
        direction.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
