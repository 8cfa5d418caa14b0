//! Traveling-wave locomotion for constraint-linked segment chains.
//!
//! A worm is a chain of rigid segments joined by point-to-point constraints.
//! Every tick the controller reads the segments' state from the physics
//! engine and writes back torques, frictions, constraint lengths and
//! stiffnesses. The engine integrates; this crate only decides.
//!
//! # Pipeline
//!
//! ```text
//! MovementInput ─► LocomotionController ─► StabilizationGovernor ─► NumericGuard ─► PhysicsWorld
//!                     (plan)                  (mode rewrite)          (sanitize)      (apply)
//! ```
//!
//! - [`SegmentChain`] - Segment bodies, head first
//! - [`ConstraintNetwork`] - One constraint per adjacent pair
//! - [`LocomotionController`] - Lean, traveling wave, grip/slide friction
//! - [`StabilizationGovernor`] - Idle relaxation and stiffen mode
//! - [`KeyframeGait`] - Legacy phase-table gait
//! - [`Worm`] - Owns all of the above behind `spawn`/`tick`/`despawn`
//!
//! # Quick Start
//!
//! ```
//! use worm_locomotion::prelude::*;
//! use worm_physics::SandboxWorld;
//!
//! let mut world = SandboxWorld::default();
//! let mut worm = Worm::seeded(&mut world, Point2::new(0.0, 1.0), WormConfig::default(), 42)
//!     .unwrap();
//!
//! let start = worm.transforms(&world).unwrap()[0].position.x;
//! for _ in 0..120 {
//!     worm.tick(&mut world, &MovementInput::new(1.0), 1.0 / 60.0).unwrap();
//!     world.step(1.0 / 60.0).unwrap();
//! }
//! let head = worm.transforms(&world).unwrap()[0].position;
//! assert!(head.x.is_finite() && start.is_finite());
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::cast_precision_loss, // segment indices to ratios
    clippy::missing_errors_doc,
)]

mod chain;
mod controller;
mod governor;
mod guard;
mod keyframe;
mod network;
mod plan;
mod state;
mod wave;
mod worm;

pub use chain::{Segment, SegmentChain};
pub use controller::LocomotionController;
pub use governor::{LocomotionMode, StabilizationGovernor};
pub use guard::NumericGuard;
pub use keyframe::{
    Easing, GaitPhase, KeyframeConfig, KeyframeGait, PhaseSpec, RangeEntry, SegmentPhysics,
};
pub use network::{Constraint, ConstraintNetwork};
pub use plan::{ConstraintCommand, ForceCommand, SegmentCommand, SegmentFlags, TickPlan};
pub use state::MovementState;
pub use wave::WaveParameters;
pub use worm::{TickReport, Worm, WormSnapshot};

/// Common imports.
pub mod prelude {
    // Handle and reports
    pub use crate::{LocomotionMode, MovementState, TickReport, Worm, WormSnapshot};

    // Building blocks
    pub use crate::{
        ConstraintNetwork, KeyframeConfig, KeyframeGait, LocomotionController, SegmentChain,
        StabilizationGovernor,
    };

    // Shared types
    pub use worm_types::{
        ChainConfig, LocomotionConfig, MovementInput, Point2, SegmentTransform,
        StabilizationConfig, Vector2, WormConfig, WormError,
    };

    // Engine boundary
    pub use worm_physics::PhysicsWorld;
}
