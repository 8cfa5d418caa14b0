//! Point-to-point constraints between consecutive segments.
//!
//! ```text
//!   segment i+1          segment i
//!  (     ●  )•--------•(  ●     )
//!          anchor_b  anchor_a
//!        (+extent)  (-extent)
//! ```
//!
//! Constraint `i` joins the trailing end of segment `i` to the leading end of
//! segment `i + 1`. The network remembers the last length and stiffness it
//! wrote so runtime modulation can fall back on them.

use nalgebra::Point2;
use tracing::{debug, warn};
use worm_physics::{ConstraintDesc, PhysicsWorld};
use worm_types::{ChainConfig, ConstraintId, Result, WormError};

use crate::chain::SegmentChain;

/// One link of the network.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Index of the leading segment; the link joins `index` and `index + 1`.
    pub index: usize,
    /// Engine handle.
    pub handle: ConstraintId,
    /// Anchor on the leading segment (local).
    pub anchor_a: Point2<f64>,
    /// Anchor on the trailing segment (local).
    pub anchor_b: Point2<f64>,
    /// Rest length.
    pub base_length: f64,
    /// Rest stiffness.
    pub base_stiffness: f64,
    /// Damping.
    pub damping: f64,
    current_length: f64,
    current_stiffness: f64,
}

impl Constraint {
    /// Last length written to the engine.
    #[must_use]
    pub fn current_length(&self) -> f64 {
        self.current_length
    }

    /// Last stiffness written to the engine.
    #[must_use]
    pub fn current_stiffness(&self) -> f64 {
        self.current_stiffness
    }
}

/// Constraints of one worm, in segment order.
///
/// Always holds exactly `chain.len() - 1` constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintNetwork {
    constraints: Vec<Constraint>,
}

impl ConstraintNetwork {
    /// Link every adjacent pair of segments.
    ///
    /// Constraints created before an engine failure are destroyed again.
    pub fn connect<W: PhysicsWorld + ?Sized>(
        world: &mut W,
        chain: &SegmentChain,
        config: &ChainConfig,
    ) -> Result<Self> {
        for (name, value) in [
            ("gap", config.gap),
            ("constraint_stiffness", config.constraint_stiffness),
            ("constraint_damping", config.constraint_damping),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(WormError::invalid_config(format!(
                    "{name} must be non-negative and finite, got {value}"
                )));
            }
        }

        let segments = chain.segments();
        let mut constraints = Vec::with_capacity(segments.len().saturating_sub(1));

        for (index, pair) in segments.windows(2).enumerate() {
            let (lead, trail) = (&pair[0], &pair[1]);
            let anchor_a = Point2::new(-lead.extent(), 0.0);
            let anchor_b = Point2::new(trail.extent(), 0.0);
            let desc = ConstraintDesc::new(lead.body, trail.body)
                .with_anchors(anchor_a, anchor_b)
                .with_length(config.gap)
                .with_response(config.constraint_stiffness, config.constraint_damping);

            match world.create_constraint(&desc) {
                Ok(handle) => constraints.push(Constraint {
                    index,
                    handle,
                    anchor_a,
                    anchor_b,
                    base_length: config.gap,
                    base_stiffness: config.constraint_stiffness,
                    damping: config.constraint_damping,
                    current_length: config.gap,
                    current_stiffness: config.constraint_stiffness,
                }),
                Err(err) => {
                    warn!(index, error = %err, "constraint creation failed, rolling back");
                    for created in constraints.iter().rev() {
                        if let Err(cleanup) = world.destroy_constraint(created.handle) {
                            warn!(handle = %created.handle, error = %cleanup, "rollback failed");
                        }
                    }
                    return Err(err);
                }
            }
        }

        debug!(constraints = constraints.len(), "connected constraint network");
        Ok(Self { constraints })
    }

    /// Destroy every constraint.
    ///
    /// Constraints the engine no longer knows are skipped.
    pub fn teardown<W: PhysicsWorld + ?Sized>(self, world: &mut W) -> Result<()> {
        let mut first_error = None;
        for constraint in &self.constraints {
            match world.destroy_constraint(constraint.handle) {
                Ok(()) => {}
                Err(err) if err.is_missing_handle() => {}
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Write a new length for constraint `index`.
    ///
    /// Negative values are clamped to zero. A non-finite value is replaced by
    /// the last written length. Returns the value actually written.
    pub fn set_length<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        index: usize,
        value: f64,
    ) -> Result<f64> {
        let constraint = self.get_mut(index)?;
        let length = sanitize(value, constraint.current_length, index, "length");
        world.set_constraint_length(constraint.handle, length)?;
        constraint.current_length = length;
        Ok(length)
    }

    /// Write a new stiffness for constraint `index`.
    ///
    /// Same clamping rules as [`set_length`](Self::set_length).
    pub fn set_stiffness<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        index: usize,
        value: f64,
    ) -> Result<f64> {
        let constraint = self.get_mut(index)?;
        let stiffness = sanitize(value, constraint.current_stiffness, index, "stiffness");
        world.set_constraint_stiffness(constraint.handle, stiffness)?;
        constraint.current_stiffness = stiffness;
        Ok(stiffness)
    }

    /// Last length written to constraint `index`.
    pub fn current_length(&self, index: usize) -> Result<f64> {
        Ok(self.get(index)?.current_length)
    }

    /// Last stiffness written to constraint `index`.
    pub fn current_stiffness(&self, index: usize) -> Result<f64> {
        Ok(self.get(index)?.current_stiffness)
    }

    /// Number of constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Whether there are no constraints (single-segment chain).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// All constraints, in segment order.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Constraint at `index`.
    pub fn get(&self, index: usize) -> Result<&Constraint> {
        let len = self.constraints.len();
        self.constraints
            .get(index)
            .ok_or(WormError::ConstraintOutOfRange { index, len })
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut Constraint> {
        let len = self.constraints.len();
        self.constraints
            .get_mut(index)
            .ok_or(WormError::ConstraintOutOfRange { index, len })
    }
}

fn sanitize(value: f64, fallback: f64, index: usize, what: &str) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        warn!(index, value, fallback, "non-finite constraint {what}, keeping last value");
        fallback
    }
}
