//! Core types for articulated worm locomotion.
//!
//! This crate provides the data shared between the physics engine boundary
//! and the locomotion controller:
//!
//! - [`BodyId`], [`ConstraintId`] - Handles to engine-owned objects
//! - [`BodyShape`], [`BodyOptions`], [`CollisionFilter`] - What a body is made of
//! - [`BodyState`], [`MassProperties`] - What the engine reports back
//! - [`MovementInput`] - Per-tick intent
//! - [`WormConfig`] - Chain layout, controller and governor tuning
//! - [`WormError`] - Everything that can go wrong
//!
//! # Design Philosophy
//!
//! These types are **pure data**. They carry no integration and no control
//! logic, so any engine and any controller can agree on them.
//!
//! # Coordinate System
//!
//! - X: along the chain, head toward +X
//! - Y: up, gravity toward -Y
//! - Angles: radians, counter-clockwise
//!
//! # Example
//!
//! ```
//! use worm_types::{ChainConfig, SegmentRole, WormConfig};
//!
//! let config = WormConfig::default().chain(ChainConfig::tapered(8));
//! assert!(config.validate().is_ok());
//! assert_eq!(config.chain.role_of(0), SegmentRole::Head);
//! assert_eq!(config.chain.role_of(7), SegmentRole::Tail);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,       // usize to f64 is fine for counts
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod config;
mod error;
mod filter;
mod input;

pub use body::{
    BodyId, BodyOptions, BodyShape, BodyState, ConstraintId, MassProperties, SegmentTransform,
    normalize_angle,
};
pub use config::{
    ChainConfig, LocomotionConfig, RoleGain, RoleGains, SegmentRole, SegmentShape,
    StabilizationConfig, WormConfig, tapered_ratios,
};
pub use error::WormError;
pub use filter::{CollisionFilter, CollisionGroups, MAX_SEGMENTS};
pub use input::MovementInput;

// Re-export math types for convenience
pub use nalgebra::{Point2, Vector2};

/// Result type for worm operations.
pub type Result<T> = std::result::Result<T, WormError>;
