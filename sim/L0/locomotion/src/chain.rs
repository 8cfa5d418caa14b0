//! The ordered set of segment bodies.
//!
//! ```text
//!   tail            body              neck  head
//!  (  )-(  )-(   )-(   )-(   )-(    )-(    )-(    )   → +X
//!   n-1                                  1     0
//! ```
//!
//! Segments are laid out end to end from the head at the spawn origin toward
//! -X. Each segment owns one collision bit and ignores only its immediate
//! neighbors, which are already held together by constraints.

use nalgebra::Point2;
use tracing::{debug, warn};
use worm_physics::PhysicsWorld;
use worm_types::{
    BodyId, BodyOptions, BodyShape, BodyState, ChainConfig, CollisionFilter, Result, SegmentRole,
    SegmentTransform, WormError,
};

/// One body of the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Position in the chain, 0 is the head.
    pub index: usize,
    /// Engine handle.
    pub body: BodyId,
    /// Role derived from the index.
    pub role: SegmentRole,
    /// Segment radius.
    pub radius: f64,
    /// Collision shape.
    pub shape: BodyShape,
    /// Friction the segment was created with.
    pub base_friction: f64,
    /// Static friction the segment was created with.
    pub friction_static: f64,
    /// Density the segment was created with.
    pub density: f64,
    /// Collision category and mask.
    pub filter: CollisionFilter,
    /// Mass reported by the engine.
    pub mass: f64,
    /// Rotational inertia reported by the engine.
    pub inertia: f64,
}

impl Segment {
    /// Distance from the center to the rounded end along the chain axis.
    #[must_use]
    pub fn extent(&self) -> f64 {
        self.shape.extent()
    }

    /// Whether this is a head segment.
    #[must_use]
    pub fn is_head(&self) -> bool {
        self.role == SegmentRole::Head
    }
}

/// Segment bodies of one worm, head first.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentChain {
    segments: Vec<Segment>,
}

impl SegmentChain {
    /// Create every segment body.
    ///
    /// The configuration is validated before the engine is touched. If the
    /// engine fails partway, the bodies created so far are destroyed again.
    pub fn build<W: PhysicsWorld + ?Sized>(
        world: &mut W,
        origin: Point2<f64>,
        config: &ChainConfig,
    ) -> Result<Self> {
        config.validate()?;
        if !origin.coords.iter().all(|x| x.is_finite()) {
            return Err(WormError::invalid_config("spawn origin must be finite"));
        }

        let count = config.segment_count;
        let mut segments: Vec<Segment> = Vec::with_capacity(count);
        let mut x = origin.x;

        for index in 0..count {
            let radius = config.radius(index);
            let shape = config.shape.body_shape(radius);
            if let Some(prev) = segments.last() {
                x -= prev.extent() + config.gap + shape.extent();
            }

            match Self::create_segment(world, index, Point2::new(x, origin.y), shape, config) {
                Ok(segment) => segments.push(segment),
                Err(err) => {
                    warn!(index, error = %err, "segment creation failed, rolling back");
                    rollback(world, &segments);
                    return Err(err);
                }
            }
        }

        if count == 1 {
            warn!("single-segment chain has no constraints and cannot locomote");
        }
        debug!(segments = count, x = origin.x, y = origin.y, "built segment chain");
        Ok(Self { segments })
    }

    fn create_segment<W: PhysicsWorld + ?Sized>(
        world: &mut W,
        index: usize,
        position: Point2<f64>,
        shape: BodyShape,
        config: &ChainConfig,
    ) -> Result<Segment> {
        let role = config.role_of(index);
        let (friction_scale, density_scale) = match role {
            SegmentRole::Head => (config.head_friction_scale, config.head_density_scale),
            _ => (1.0, 1.0),
        };
        let filter = CollisionFilter::for_segment(index, config.segment_count)?;
        let options = BodyOptions {
            friction: config.friction * friction_scale,
            friction_static: config.friction_static * friction_scale,
            density: config.density * density_scale,
            restitution: config.restitution,
            filter,
        };

        let body = world.create_body(shape, position, &options)?;
        let mass = match world.mass_properties(body) {
            Ok(mass) => mass,
            Err(err) => {
                // Not yet tracked by the caller
                if let Err(cleanup) = world.destroy_body(body) {
                    warn!(%body, error = %cleanup, "failed to destroy orphaned body");
                }
                return Err(err);
            }
        };

        Ok(Segment {
            index,
            body,
            role,
            radius: shape.radius(),
            shape,
            base_friction: options.friction,
            friction_static: options.friction_static,
            density: options.density,
            filter,
            mass: mass.mass,
            inertia: mass.inertia,
        })
    }

    /// Destroy every segment body.
    ///
    /// Bodies the engine no longer knows are skipped. The first other error
    /// is returned after every body has been attempted.
    pub fn teardown<W: PhysicsWorld + ?Sized>(self, world: &mut W) -> Result<()> {
        let mut first_error = None;
        for segment in &self.segments {
            match world.destroy_body(segment.body) {
                Ok(()) => {}
                Err(err) if err.is_missing_handle() => {
                    debug!(body = %segment.body, "segment body already gone");
                }
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        debug!(segments = self.segments.len(), "tore down segment chain");
        first_error.map_or(Ok(()), Err)
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the chain has no segments. Never true for a built chain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// All segments, head first.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment at `index`.
    pub fn segment(&self, index: usize) -> Result<&Segment> {
        self.segments.get(index).ok_or(WormError::SegmentOutOfRange {
            index,
            len: self.segments.len(),
        })
    }

    /// The leading segment.
    #[must_use]
    pub fn head(&self) -> Option<&Segment> {
        self.segments.first()
    }

    /// Body handles, head first.
    pub fn bodies(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.segments.iter().map(|s| s.body)
    }

    /// Read the state of every segment from the engine.
    pub fn read_states<W: PhysicsWorld + ?Sized>(&self, world: &W) -> Result<Vec<BodyState>> {
        self.segments
            .iter()
            .map(|s| world.body_state(s.body))
            .collect()
    }

    /// Per-segment transforms for rendering, head first.
    pub fn transforms<W: PhysicsWorld + ?Sized>(
        &self,
        world: &W,
    ) -> Result<Vec<SegmentTransform>> {
        self.segments
            .iter()
            .map(|s| {
                let state = world.body_state(s.body)?;
                Ok(SegmentTransform {
                    index: s.index,
                    position: state.position,
                    angle: state.angle,
                })
            })
            .collect()
    }
}

fn rollback<W: PhysicsWorld + ?Sized>(world: &mut W, segments: &[Segment]) {
    for segment in segments.iter().rev() {
        if let Err(err) = world.destroy_body(segment.body) {
            warn!(body = %segment.body, error = %err, "rollback failed to destroy body");
        }
    }
}
