//! End-to-end locomotion scenarios against the sandbox engine.
//!
//! Each scenario spawns a worm, drives it for a fixed number of 60 Hz ticks
//! and checks one observable outcome:
//!
//! - forward and reverse input move the head, with the chain on the ground
//! - releasing input relaxes a perturbed chain
//! - stiffening calms a flailing chain
//! - degenerate chain lengths
//! - snapshot and restore into a freshly spawned worm

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::cell::Cell;

use worm_locomotion::SegmentFlags;
use worm_locomotion::prelude::*;
use worm_physics::{ConstraintDesc, SandboxWorld};
use worm_types::{BodyId, BodyOptions, BodyShape, BodyState, ConstraintId, MassProperties, Result};

const DT: f64 = 1.0 / 60.0;

fn spawn(world: &mut SandboxWorld, config: WormConfig) -> Worm {
    let height = config.chain.base_radius;
    Worm::seeded(world, Point2::new(0.0, height), config, 2024).unwrap()
}

fn drive(worm: &mut Worm, world: &mut SandboxWorld, input: &MovementInput) -> TickReport {
    let report = worm.tick(world, input, DT).unwrap();
    world.step(DT).unwrap();
    report
}

fn angular_velocities(worm: &Worm, world: &SandboxWorld) -> Vec<f64> {
    worm.chain()
        .read_states(world)
        .unwrap()
        .iter()
        .map(|s| s.angular_velocity)
        .collect()
}

fn variance(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

fn head_x(worm: &mut Worm, world: &SandboxWorld) -> f64 {
    worm.transforms(world).unwrap()[0].position.x
}

/// Largest gap between any segment's underside and the ground.
fn clearance(worm: &Worm, world: &SandboxWorld) -> f64 {
    let states = worm.chain().read_states(world).unwrap();
    worm.chain()
        .segments()
        .iter()
        .zip(&states)
        .map(|(segment, state)| state.position.y - segment.shape.lowest_extent(state.angle))
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Settle for half a second, then hold `direction` for `ticks` ticks.
///
/// Asserts the chain never lifts more than `lift` radii off the ground and
/// returns head x sampled every half second.
fn crawl(config: WormConfig, direction: f64, ticks: usize, lift: f64) -> Vec<f64> {
    let mut world = SandboxWorld::default();
    let limit = lift * config.chain.base_radius;
    let mut worm = spawn(&mut world, config);
    for _ in 0..30 {
        drive(&mut worm, &mut world, &MovementInput::idle());
    }

    let input = MovementInput::new(direction);
    let mut samples = vec![head_x(&mut worm, &world)];
    for tick in 1..=ticks {
        let report = drive(&mut worm, &mut world, &input);
        assert_eq!(report.mode, LocomotionMode::Moving);
        let gap = clearance(&worm, &world);
        assert!(gap < limit, "chain lifted {gap} off the ground at tick {tick}");
        if tick % 30 == 0 {
            samples.push(head_x(&mut worm, &world));
        }
    }
    samples
}

// =============================================================================
// Directional locomotion
// =============================================================================

#[test]
fn forward_input_advances_head() {
    let samples = crawl(WormConfig::default(), 1.0, 120, 0.5);
    assert_eq!(samples.len(), 5);
    for window in samples.windows(2) {
        assert!(
            window[1] > window[0],
            "head x did not increase: {samples:?}"
        );
    }
}

#[test]
fn reverse_input_moves_head_backward() {
    let samples = crawl(WormConfig::default(), -1.0, 120, 0.5);
    assert_eq!(samples.len(), 5);
    for window in samples.windows(2) {
        assert!(
            window[1] < window[0],
            "head x did not decrease: {samples:?}"
        );
    }
}

#[test]
fn grip_and_slide_alone_make_progress() {
    let still = LocomotionConfig {
        wave_amplitude: 0.0,
        contraction_strength: 0.0,
        ..Default::default()
    };
    let samples = crawl(WormConfig::default().locomotion(still), 1.0, 120, 0.5);
    for window in samples.windows(2) {
        assert!(
            window[1] > window[0],
            "head x did not increase: {samples:?}"
        );
    }
}

#[test]
fn long_crawl_stays_grounded() {
    let samples = crawl(WormConfig::default(), 1.0, 600, 1.0);
    assert!(samples[20] > samples[0]);
}

#[test]
fn forward_input_grips_leaning_segments() {
    let mut world = SandboxWorld::default();
    let mut worm = spawn(&mut world, WormConfig::default());
    let config = LocomotionConfig::default();

    let mut gripped = false;
    for _ in 0..60 {
        let report = drive(&mut worm, &mut world, &MovementInput::new(1.0));
        for friction in &report.frictions {
            assert!(*friction >= config.friction_low);
            assert!(*friction <= config.friction_ceiling());
        }
        gripped |= report
            .flags
            .iter()
            .any(|f| f.contains(SegmentFlags::GRIPPING));
    }
    assert!(gripped);
}

// =============================================================================
// Idle relaxation
// =============================================================================

#[test]
fn idle_relaxes_perturbed_chain() {
    let mut world = SandboxWorld::default();
    let mut worm = spawn(&mut world, WormConfig::default());
    for (i, segment) in worm.chain().segments().iter().enumerate() {
        let angle = if i % 2 == 0 { 0.4 } else { -0.4 };
        world.set_angle(segment.body, angle).unwrap();
    }

    let idle = MovementInput::idle();
    for _ in 0..180 {
        let report = drive(&mut worm, &mut world, &idle);
        assert_eq!(report.mode, LocomotionMode::Idle);
    }

    for transform in worm.transforms(&world).unwrap() {
        assert!(
            transform.angle.abs() < 0.05,
            "segment {} still at {}",
            transform.index,
            transform.angle
        );
    }
}

// =============================================================================
// Stiffening
// =============================================================================

#[test]
fn stiffen_calms_flailing_chain() {
    let mut world = SandboxWorld::default();
    let mut worm = spawn(&mut world, WormConfig::default());
    for (i, segment) in worm.chain().segments().iter().enumerate() {
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        if i > 0 {
            world.set_angle(segment.body, 0.4 * sign).unwrap();
        }
        world.set_angular_velocity(segment.body, 3.0 * sign).unwrap();
    }

    let stiffen = MovementInput::stiffen();
    let mut samples = vec![variance(&angular_velocities(&worm, &world))];
    for tick in 1..=60 {
        let report = drive(&mut worm, &mut world, &stiffen);
        assert_eq!(report.mode, LocomotionMode::Stiffening);
        if tick % 6 == 0 {
            samples.push(variance(&angular_velocities(&worm, &world)));
        }
    }

    assert_eq!(samples.len(), 11);
    for window in samples.windows(2) {
        assert!(
            window[1] < window[0],
            "angular velocity variance rose: {samples:?}"
        );
    }
}

#[test]
fn stiffen_releases_immediately() {
    let mut world = SandboxWorld::default();
    let mut worm = spawn(&mut world, WormConfig::with_segments(6));
    drive(&mut worm, &mut world, &MovementInput::stiffen());
    assert_eq!(worm.mode(), LocomotionMode::Stiffening);

    let report = drive(&mut worm, &mut world, &MovementInput::new(0.8));
    assert_eq!(report.mode, LocomotionMode::Moving);
    assert_eq!(worm.mode(), LocomotionMode::Moving);
}

// =============================================================================
// Degenerate chains
// =============================================================================

#[test]
fn single_segment_chain_ticks() {
    let mut world = SandboxWorld::default();
    let chain = ChainConfig::single().size_ratios(vec![1.0]);
    let mut worm = spawn(&mut world, WormConfig::default().chain(chain));

    assert_eq!(worm.chain().len(), 1);
    assert!(worm.network().is_empty());
    assert_eq!(world.constraint_count(), 0);

    let report = drive(&mut worm, &mut world, &MovementInput::new(1.0));
    assert_eq!(report.torques.len(), 1);
    assert!(report.torques[0].is_finite());
    assert!(report.lengths.is_empty());
}

/// Forwards to a sandbox and counts every call.
#[derive(Default)]
struct CountingWorld {
    inner: SandboxWorld,
    calls: Cell<usize>,
}

impl CountingWorld {
    fn count(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

impl PhysicsWorld for CountingWorld {
    fn create_body(
        &mut self,
        shape: BodyShape,
        position: Point2<f64>,
        options: &BodyOptions,
    ) -> Result<BodyId> {
        self.count();
        self.inner.create_body(shape, position, options)
    }

    fn destroy_body(&mut self, body: BodyId) -> Result<()> {
        self.count();
        self.inner.destroy_body(body)
    }

    fn create_constraint(&mut self, desc: &ConstraintDesc) -> Result<ConstraintId> {
        self.count();
        self.inner.create_constraint(desc)
    }

    fn destroy_constraint(&mut self, constraint: ConstraintId) -> Result<()> {
        self.count();
        self.inner.destroy_constraint(constraint)
    }

    fn body_state(&self, body: BodyId) -> Result<BodyState> {
        self.count();
        self.inner.body_state(body)
    }

    fn mass_properties(&self, body: BodyId) -> Result<MassProperties> {
        self.count();
        self.inner.mass_properties(body)
    }

    fn set_torque(&mut self, body: BodyId, torque: f64) -> Result<()> {
        self.count();
        self.inner.set_torque(body, torque)
    }

    fn set_angular_velocity(&mut self, body: BodyId, angular_velocity: f64) -> Result<()> {
        self.count();
        self.inner.set_angular_velocity(body, angular_velocity)
    }

    fn set_velocity(&mut self, body: BodyId, velocity: Vector2<f64>) -> Result<()> {
        self.count();
        self.inner.set_velocity(body, velocity)
    }

    fn apply_force(
        &mut self,
        body: BodyId,
        point: Point2<f64>,
        force: Vector2<f64>,
    ) -> Result<()> {
        self.count();
        self.inner.apply_force(body, point, force)
    }

    fn set_friction(&mut self, body: BodyId, friction: f64) -> Result<()> {
        self.count();
        self.inner.set_friction(body, friction)
    }

    fn set_constraint_length(&mut self, constraint: ConstraintId, length: f64) -> Result<()> {
        self.count();
        self.inner.set_constraint_length(constraint, length)
    }

    fn set_constraint_stiffness(&mut self, constraint: ConstraintId, stiffness: f64) -> Result<()> {
        self.count();
        self.inner.set_constraint_stiffness(constraint, stiffness)
    }
}

#[test]
fn empty_chain_rejected_before_engine() {
    let mut world = CountingWorld::default();
    let err = Worm::seeded(
        &mut world,
        Point2::new(0.0, 1.0),
        WormConfig::with_segments(0),
        1,
    )
    .unwrap_err();

    assert!(err.is_config_error());
    assert_eq!(world.calls.get(), 0);
    assert_eq!(world.inner.body_count(), 0);
}

#[test]
fn invalid_tuning_rejected_before_engine() {
    let mut world = CountingWorld::default();
    let config = WormConfig::default().locomotion(LocomotionConfig::default().friction(0.9, 0.2));
    let err = Worm::seeded(&mut world, Point2::new(0.0, 1.0), config, 1).unwrap_err();
    assert!(err.is_config_error());
    assert_eq!(world.calls.get(), 0);
}

/// Sandbox whose creation calls start failing after a budget runs out.
struct FailingWorld {
    inner: SandboxWorld,
    bodies_left: usize,
    constraints_left: usize,
}

impl FailingWorld {
    fn new(bodies_left: usize, constraints_left: usize) -> Self {
        Self {
            inner: SandboxWorld::default(),
            bodies_left,
            constraints_left,
        }
    }
}

impl PhysicsWorld for FailingWorld {
    fn create_body(
        &mut self,
        shape: BodyShape,
        position: Point2<f64>,
        options: &BodyOptions,
    ) -> Result<BodyId> {
        if self.bodies_left == 0 {
            return Err(WormError::engine("out of bodies"));
        }
        self.bodies_left -= 1;
        self.inner.create_body(shape, position, options)
    }

    fn destroy_body(&mut self, body: BodyId) -> Result<()> {
        self.inner.destroy_body(body)
    }

    fn create_constraint(&mut self, desc: &ConstraintDesc) -> Result<ConstraintId> {
        if self.constraints_left == 0 {
            return Err(WormError::engine("out of constraints"));
        }
        self.constraints_left -= 1;
        self.inner.create_constraint(desc)
    }

    fn destroy_constraint(&mut self, constraint: ConstraintId) -> Result<()> {
        self.inner.destroy_constraint(constraint)
    }

    fn body_state(&self, body: BodyId) -> Result<BodyState> {
        self.inner.body_state(body)
    }

    fn mass_properties(&self, body: BodyId) -> Result<MassProperties> {
        self.inner.mass_properties(body)
    }

    fn set_torque(&mut self, body: BodyId, torque: f64) -> Result<()> {
        self.inner.set_torque(body, torque)
    }

    fn set_angular_velocity(&mut self, body: BodyId, angular_velocity: f64) -> Result<()> {
        self.inner.set_angular_velocity(body, angular_velocity)
    }

    fn set_velocity(&mut self, body: BodyId, velocity: Vector2<f64>) -> Result<()> {
        self.inner.set_velocity(body, velocity)
    }

    fn apply_force(
        &mut self,
        body: BodyId,
        point: Point2<f64>,
        force: Vector2<f64>,
    ) -> Result<()> {
        self.inner.apply_force(body, point, force)
    }

    fn set_friction(&mut self, body: BodyId, friction: f64) -> Result<()> {
        self.inner.set_friction(body, friction)
    }

    fn set_constraint_length(&mut self, constraint: ConstraintId, length: f64) -> Result<()> {
        self.inner.set_constraint_length(constraint, length)
    }

    fn set_constraint_stiffness(&mut self, constraint: ConstraintId, stiffness: f64) -> Result<()> {
        self.inner.set_constraint_stiffness(constraint, stiffness)
    }
}

#[test]
fn failed_body_creation_rolls_back() {
    let mut world = FailingWorld::new(3, usize::MAX);
    let err = Worm::seeded(
        &mut world,
        Point2::new(0.0, 1.0),
        WormConfig::with_segments(5),
        1,
    )
    .unwrap_err();
    assert_eq!(err, WormError::engine("out of bodies"));
    assert_eq!(world.inner.body_count(), 0);
}

#[test]
fn failed_constraint_creation_rolls_back() {
    let mut world = FailingWorld::new(usize::MAX, 2);
    let err = Worm::seeded(
        &mut world,
        Point2::new(0.0, 1.0),
        WormConfig::with_segments(5),
        1,
    )
    .unwrap_err();
    assert_eq!(err, WormError::engine("out of constraints"));
    assert_eq!(world.inner.body_count(), 0);
    assert_eq!(world.inner.constraint_count(), 0);
}

// =============================================================================
// Engine failure
// =============================================================================

#[test]
fn destroyed_segment_loses_worm() {
    let mut world = SandboxWorld::default();
    let mut worm = spawn(&mut world, WormConfig::with_segments(5));
    drive(&mut worm, &mut world, &MovementInput::new(1.0));

    let tail = worm.chain().segments()[4].body;
    world.destroy_body(tail).unwrap();

    let err = worm
        .tick(&mut world, &MovementInput::new(1.0), DT)
        .unwrap_err();
    assert!(err.is_chain_lost());
    assert!(!worm.is_alive());
    assert!(worm
        .tick(&mut world, &MovementInput::idle(), DT)
        .unwrap_err()
        .is_chain_lost());

    // Despawn still cleans up whatever is left
    worm.despawn(&mut world).unwrap();
    assert_eq!(world.body_count(), 0);
    assert_eq!(world.constraint_count(), 0);
}

// =============================================================================
// Snapshot and restore
// =============================================================================

fn input_at(tick: usize) -> MovementInput {
    match tick % 50 {
        0..20 => MovementInput::new(1.0),
        20..30 => MovementInput::idle(),
        30..40 => MovementInput::new(-0.6).with_vertical(true),
        _ => MovementInput::idle(),
    }
}

#[cfg(feature = "serde")]
#[test]
fn snapshot_resumes_in_fresh_worm() {
    let config = WormConfig::with_segments(9)
        .stabilization(StabilizationConfig::default().flops(0.2, 1.0));
    let mut world = SandboxWorld::default();
    let mut worm = spawn(&mut world, config.clone());
    for tick in 0..45 {
        drive(&mut worm, &mut world, &input_at(tick));
    }

    let json = serde_json::to_string(&worm.snapshot()).unwrap();
    let snapshot: WormSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(snapshot, worm.snapshot());

    // Same seed, but the original's generator has moved on since spawn
    let mut world_b = SandboxWorld::default();
    let mut worm_b = spawn(&mut world_b, config);
    for (a, b) in worm.chain().segments().iter().zip(worm_b.chain().segments()) {
        let state = world.body_state(a.body).unwrap();
        world_b.set_position(b.body, state.position).unwrap();
        world_b.set_angle(b.body, state.angle).unwrap();
        world_b.set_velocity(b.body, state.velocity).unwrap();
        world_b.set_angular_velocity(b.body, state.angular_velocity).unwrap();
    }
    worm_b.restore(&mut world_b, snapshot).unwrap();

    let mut flopped = 0;
    for tick in 45..145 {
        let input = input_at(tick);
        let a = drive(&mut worm, &mut world, &input);
        let b = drive(&mut worm_b, &mut world_b, &input);

        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a.torques), bits(&b.torques), "torques diverged at {tick}");
        assert_eq!(bits(&a.frictions), bits(&b.frictions), "frictions diverged at {tick}");
        assert_eq!(bits(&a.lengths), bits(&b.lengths));
        assert_eq!(a.flags, b.flags);
        flopped += a
            .flags
            .iter()
            .filter(|f| f.contains(SegmentFlags::FLOPPED))
            .count();
    }
    assert!(flopped > 0);
}

#[test]
fn snapshot_rejected_by_other_chain() {
    let mut world = SandboxWorld::default();
    let nine = spawn(&mut world, WormConfig::with_segments(9));
    let mut four = spawn(&mut world, WormConfig::with_segments(4));
    let err = four.restore(&mut world, nine.snapshot()).unwrap_err();
    assert!(matches!(err, WormError::StateMismatch { .. }));
    assert!(four.is_alive());
}

#[test]
fn restore_rejects_corrupt_state() {
    let mut world = SandboxWorld::default();
    let mut worm = spawn(&mut world, WormConfig::with_segments(4));
    let mut state = worm.movement_state().clone();
    state.motion_envelope = f64::NAN;
    let err = worm.restore_movement_state(state).unwrap_err();
    assert!(matches!(err, WormError::StateMismatch { .. }));
}
