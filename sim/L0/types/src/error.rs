//! Error types for worm construction and simulation.

use thiserror::Error;

use crate::body::{BodyId, ConstraintId};

/// Errors that can occur while building or driving a worm.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WormError {
    /// Invalid configuration, detected before any engine object is created.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid timestep passed to a tick.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Body handle unknown to the engine.
    #[error("body not found: {0}")]
    BodyNotFound(BodyId),

    /// Constraint handle unknown to the engine.
    #[error("constraint not found: {0}")]
    ConstraintNotFound(ConstraintId),

    /// Segment index outside the chain.
    #[error("segment index {index} out of range (chain has {len} segments)")]
    SegmentOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of segments in the chain.
        len: usize,
    },

    /// Constraint index outside the network.
    #[error("constraint index {index} out of range (network has {len} constraints)")]
    ConstraintOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of constraints in the network.
        len: usize,
    },

    /// The engine rejected an operation.
    #[error("engine error: {reason}")]
    Engine {
        /// Description of what the engine reported.
        reason: String,
    },

    /// The chain lost its engine handles and must be rebuilt.
    #[error("chain lost: {reason}")]
    ChainLost {
        /// Description of the failure that killed the chain.
        reason: String,
    },

    /// A restored movement state does not fit the chain.
    #[error("state mismatch: {reason}")]
    StateMismatch {
        /// Description of the mismatch.
        reason: String,
    },
}

impl WormError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an engine error.
    #[must_use]
    pub fn engine(reason: impl Into<String>) -> Self {
        Self::Engine {
            reason: reason.into(),
        }
    }

    /// Create a chain-lost error.
    #[must_use]
    pub fn chain_lost(reason: impl Into<String>) -> Self {
        Self::ChainLost {
            reason: reason.into(),
        }
    }

    /// Create a state mismatch error.
    #[must_use]
    pub fn state_mismatch(reason: impl Into<String>) -> Self {
        Self::StateMismatch {
            reason: reason.into(),
        }
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }

    /// Check if this error is fatal for the chain.
    #[must_use]
    pub fn is_chain_lost(&self) -> bool {
        matches!(self, Self::ChainLost { .. })
    }

    /// Check if this error reports a stale engine handle.
    #[must_use]
    pub fn is_missing_handle(&self) -> bool {
        matches!(self, Self::BodyNotFound(_) | Self::ConstraintNotFound(_))
    }
}
