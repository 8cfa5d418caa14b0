//! Physics engine boundary for worm locomotion.
//!
//! This crate provides:
//!
//! - [`PhysicsWorld`] - The narrow set of engine capabilities a worm needs
//! - [`ConstraintDesc`] - Description of a point-to-point constraint
//! - [`SandboxWorld`] - A deterministic 2D reference engine
//!
//! # Layer 0
//!
//! Production hosts plug their own rigid-body engine in by implementing
//! [`PhysicsWorld`]. The sandbox exists for headless runs, tests and benches.
//!
//! # Quick Start
//!
//! ```
//! use worm_physics::{PhysicsWorld, SandboxWorld};
//! use worm_types::{BodyOptions, BodyShape, Point2};
//!
//! let mut world = SandboxWorld::default();
//! let id = world
//!     .create_body(BodyShape::circle(0.5), Point2::new(0.0, 3.0), &BodyOptions::default())
//!     .unwrap();
//!
//! for _ in 0..120 {
//!     world.step(1.0 / 60.0).unwrap();
//! }
//!
//! // Resting on the ground plane at y = 0
//! let state = world.body_state(id).unwrap();
//! assert!((state.position.y - 0.5).abs() < 1e-9);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::missing_errors_doc,
    clippy::many_single_char_names, // segment math uses textbook names
)]

mod sandbox;
mod world;

pub use sandbox::{SandboxConfig, SandboxWorld};
pub use world::{ConstraintDesc, PhysicsWorld};
