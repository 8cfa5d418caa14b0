//! Collision category and mask bits.
//!
//! Bit 0 is the ground/platform category. Segment `i` of a chain owns bit
//! `i + 1`, which caps a chain at [`MAX_SEGMENTS`] segments.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::WormError;

/// Largest chain that fits in the category bits.
pub const MAX_SEGMENTS: usize = 31;

bitflags::bitflags! {
    /// Set of collision categories.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct CollisionGroups: u32 {
        /// Ground and static platforms.
        const GROUND = 0b0000_0001;
    }
}

impl CollisionGroups {
    /// Category bit owned by segment `index`.
    pub fn segment(index: usize) -> crate::Result<Self> {
        if index >= MAX_SEGMENTS {
            return Err(WormError::invalid_config(format!(
                "segment index {index} exceeds the {MAX_SEGMENTS} available category bits"
            )));
        }
        Ok(Self::from_bits_retain(1 << (index + 1)))
    }
}

/// Category/mask pair deciding which bodies may touch.
///
/// Two bodies collide only if `(a.mask & b.category) != 0` and
/// `(b.mask & a.category) != 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CollisionFilter {
    /// Categories this body belongs to.
    pub category: CollisionGroups,
    /// Categories this body accepts contacts from.
    pub mask: CollisionGroups,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self::ground()
    }
}

impl CollisionFilter {
    /// Create a filter from raw groups.
    #[must_use]
    pub const fn new(category: CollisionGroups, mask: CollisionGroups) -> Self {
        Self { category, mask }
    }

    /// Filter for static ground: ground category, accepts everything.
    #[must_use]
    pub const fn ground() -> Self {
        Self {
            category: CollisionGroups::GROUND,
            mask: CollisionGroups::from_bits_retain(u32::MAX),
        }
    }

    /// Filter for segment `index` of a chain with `count` segments.
    ///
    /// The mask holds ground and every other segment except the immediate
    /// neighbors `index - 1` and `index + 1`.
    pub fn for_segment(index: usize, count: usize) -> crate::Result<Self> {
        if count > MAX_SEGMENTS {
            return Err(WormError::invalid_config(format!(
                "chain of {count} segments exceeds the maximum of {MAX_SEGMENTS}"
            )));
        }
        if index >= count {
            return Err(WormError::SegmentOutOfRange { index, len: count });
        }

        let mut mask = CollisionGroups::GROUND;
        for other in 0..count {
            if other == index || other + 1 == index || other == index + 1 {
                continue;
            }
            mask |= CollisionGroups::segment(other)?;
        }

        Ok(Self {
            category: CollisionGroups::segment(index)?,
            mask,
        })
    }

    /// Check whether two filters allow a contact.
    #[must_use]
    pub fn can_collide_with(&self, other: &Self) -> bool {
        self.mask.intersects(other.category) && other.mask.intersects(self.category)
    }
}
