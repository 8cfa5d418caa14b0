//! The worm handle: chain, network, controller and governor behind one tick.

use nalgebra::Point2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};
use worm_physics::PhysicsWorld;
use worm_types::{BodyState, MovementInput, Result, SegmentTransform, WormConfig, WormError};

use crate::chain::SegmentChain;
use crate::controller::LocomotionController;
use crate::governor::{LocomotionMode, StabilizationGovernor};
use crate::guard::NumericGuard;
use crate::keyframe::KeyframeGait;
use crate::network::ConstraintNetwork;
use crate::plan::{SegmentFlags, TickPlan};
use crate::state::MovementState;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What one tick wrote to the engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TickReport {
    /// Mode the tick ran in.
    pub mode: LocomotionMode,
    /// Torque per segment.
    pub torques: Vec<f64>,
    /// Friction per segment.
    pub frictions: Vec<f64>,
    /// Constraint lengths after the write.
    pub lengths: Vec<f64>,
    /// Constraint stiffnesses after the write.
    pub stiffnesses: Vec<f64>,
    /// Non-finite values replaced or dropped by the guard.
    pub guard_events: usize,
    /// Per-segment planning flags.
    pub flags: Vec<SegmentFlags>,
}

/// Everything a worm carries from one tick to the next, apart from the
/// bodies themselves.
///
/// Restoring a snapshot into a worm spawned with the same configuration, in a
/// world whose bodies match the original's, reproduces the original's
/// subsequent ticks exactly.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WormSnapshot<R = ChaCha8Rng> {
    /// Controller state.
    pub movement: MovementState,
    /// Governor generator at its current stream position.
    pub rng: R,
    /// Governor mode of the last tick.
    pub mode: LocomotionMode,
    /// Last-known-good command values.
    pub guard: NumericGuard,
    /// Constraint lengths last written.
    pub lengths: Vec<f64>,
    /// Constraint stiffnesses last written.
    pub stiffnesses: Vec<f64>,
}

/// One worm in a physics world.
///
/// Owned by the caller. Ticking and despawning need the world the worm was
/// spawned in; after an engine failure the worm is dead and every further
/// tick returns [`WormError::ChainLost`].
///
/// ```
/// use worm_locomotion::Worm;
/// use worm_physics::SandboxWorld;
/// use worm_types::{MovementInput, Point2, WormConfig};
///
/// let mut world = SandboxWorld::default();
/// let mut worm = Worm::seeded(&mut world, Point2::new(0.0, 1.0), WormConfig::with_segments(6), 1)
///     .unwrap();
///
/// for _ in 0..30 {
///     worm.tick(&mut world, &MovementInput::new(1.0), 1.0 / 60.0).unwrap();
///     world.step(1.0 / 60.0).unwrap();
/// }
/// assert_eq!(worm.transforms(&world).unwrap().len(), 6);
/// worm.despawn(&mut world).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Worm<R = ChaCha8Rng> {
    config: WormConfig,
    chain: SegmentChain,
    network: ConstraintNetwork,
    controller: LocomotionController,
    governor: StabilizationGovernor<R>,
    guard: NumericGuard,
    alive: bool,
}

impl Worm<ChaCha8Rng> {
    /// Spawn with a seeded `ChaCha8` generator.
    pub fn seeded<W: PhysicsWorld + ?Sized>(
        world: &mut W,
        origin: Point2<f64>,
        config: WormConfig,
        seed: u64,
    ) -> Result<Self> {
        Self::spawn(world, origin, config, ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> Worm<R> {
    /// Build the chain and its constraints with the head at `origin`.
    ///
    /// The whole configuration is validated before the engine is touched.
    /// Nothing is left in the world if any step fails.
    pub fn spawn<W: PhysicsWorld + ?Sized>(
        world: &mut W,
        origin: Point2<f64>,
        config: WormConfig,
        rng: R,
    ) -> Result<Self> {
        config.validate()?;
        let governor = StabilizationGovernor::new(config.stabilization, rng)?;

        let chain = SegmentChain::build(world, origin, &config.chain)?;
        let network = match ConstraintNetwork::connect(world, &chain, &config.chain) {
            Ok(network) => network,
            Err(err) => {
                if let Err(cleanup) = chain.teardown(world) {
                    warn!(error = %cleanup, "failed to tear down chain after connect error");
                }
                return Err(err);
            }
        };
        let controller =
            match LocomotionController::new(config.locomotion, &chain, config.chain.base_radius) {
                Ok(controller) => controller,
                Err(err) => {
                    abandon(world, chain, network);
                    return Err(err);
                }
            };
        let guard = NumericGuard::new(&chain, &network);

        debug!(
            segments = chain.len(),
            constraints = network.len(),
            "spawned worm"
        );
        Ok(Self {
            config,
            chain,
            network,
            controller,
            governor,
            guard,
            alive: true,
        })
    }

    /// Plan and write one tick with the traveling-wave controller.
    ///
    /// Call before stepping the world.
    pub fn tick<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        input: &MovementInput,
        dt: f64,
    ) -> Result<TickReport> {
        let states = self.begin_tick(world, dt)?;
        let plan = self
            .controller
            .plan(&self.chain, &self.network, &states, input, dt)?;
        self.finish_tick(world, plan, &states)
    }

    /// Plan and write one tick with the legacy keyframe gait.
    pub fn tick_keyframe<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        gait: &mut KeyframeGait,
        input: &MovementInput,
        dt: f64,
    ) -> Result<TickReport> {
        let states = self.begin_tick(world, dt)?;
        let plan = gait.plan(
            &self.chain,
            &self.network,
            &states,
            input,
            dt,
            &self.config.locomotion,
        )?;
        self.finish_tick(world, plan, &states)
    }

    fn begin_tick<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &W,
        dt: f64,
    ) -> Result<Vec<BodyState>> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(WormError::InvalidTimestep(dt));
        }
        self.ensure_alive()?;
        self.chain.read_states(world).map_err(|err| self.lose(&err))
    }

    fn finish_tick<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        mut plan: TickPlan,
        states: &[BodyState],
    ) -> Result<TickReport> {
        self.governor
            .govern(&mut plan, &self.chain, &self.network, states);
        let guard_events = self.guard.sanitize(&mut plan);

        if let Err(err) = plan.apply(world, &mut self.network) {
            return Err(self.lose(&err));
        }
        self.controller.commit(&plan);

        let constraints = self.network.constraints();
        Ok(TickReport {
            mode: plan.mode,
            torques: plan.torques(),
            frictions: plan.frictions(),
            lengths: constraints.iter().map(|c| c.current_length()).collect(),
            stiffnesses: constraints.iter().map(|c| c.current_stiffness()).collect(),
            guard_events,
            flags: plan.segments.iter().map(|s| s.flags).collect(),
        })
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.alive {
            Ok(())
        } else {
            Err(WormError::chain_lost("worm was lost on an earlier tick"))
        }
    }

    fn lose(&mut self, err: &WormError) -> WormError {
        warn!(error = %err, "engine failure, worm lost");
        self.alive = false;
        WormError::chain_lost(err.to_string())
    }

    /// Segment positions and angles for rendering.
    pub fn transforms<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &W,
    ) -> Result<Vec<SegmentTransform>> {
        self.ensure_alive()?;
        self.chain.transforms(world).map_err(|err| self.lose(&err))
    }

    /// Replace the controller and governor tuning.
    ///
    /// The chain layout is fixed at spawn; changing it requires a respawn.
    pub fn update_config(&mut self, config: WormConfig) -> Result<()> {
        config.validate()?;
        if config.chain != self.config.chain {
            return Err(WormError::invalid_config("chain layout cannot change after spawn"));
        }
        self.controller.update_config(config.locomotion)?;
        self.governor.update_config(config.stabilization)?;
        self.config = config;
        Ok(())
    }

    /// Snapshot of the controller's movement state.
    #[must_use]
    pub fn movement_state(&self) -> &MovementState {
        self.controller.state()
    }

    /// Resume the controller from a state taken with
    /// [`movement_state`](Self::movement_state).
    ///
    /// Only the controller is replaced; use [`restore`](Self::restore) to
    /// also resume the governor's generator and the written constraints.
    pub fn restore_movement_state(&mut self, state: MovementState) -> Result<()> {
        state.validate(self.chain.len())?;
        self.controller = LocomotionController::from_state(
            self.config.locomotion,
            self.config.chain.base_radius,
            state,
        )?;
        Ok(())
    }

    /// Capture the worm's tick-to-tick state.
    #[must_use]
    pub fn snapshot(&self) -> WormSnapshot<R>
    where
        R: Clone,
    {
        let constraints = self.network.constraints();
        WormSnapshot {
            movement: self.controller.state().clone(),
            rng: self.governor.rng().clone(),
            mode: self.governor.mode(),
            guard: self.guard.clone(),
            lengths: constraints.iter().map(|c| c.current_length()).collect(),
            stiffnesses: constraints.iter().map(|c| c.current_stiffness()).collect(),
        }
    }

    /// Resume from a [`snapshot`](Self::snapshot).
    ///
    /// The saved constraint lengths and stiffnesses are written to `world`.
    /// Body states are the caller's to restore.
    pub fn restore<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        snapshot: WormSnapshot<R>,
    ) -> Result<()> {
        self.ensure_alive()?;
        let segments = self.chain.len();
        let constraints = self.network.len();
        snapshot.movement.validate(segments)?;
        if snapshot.lengths.len() != constraints
            || snapshot.stiffnesses.len() != constraints
            || !snapshot.guard.fits(segments, constraints)
        {
            return Err(WormError::state_mismatch(format!(
                "snapshot does not fit {segments} segments and {constraints} constraints"
            )));
        }
        let controller = LocomotionController::from_state(
            self.config.locomotion,
            self.config.chain.base_radius,
            snapshot.movement,
        )?;

        for (index, (&length, &stiffness)) in
            snapshot.lengths.iter().zip(&snapshot.stiffnesses).enumerate()
        {
            let written = self
                .network
                .set_length(world, index, length)
                .and_then(|_| self.network.set_stiffness(world, index, stiffness));
            if let Err(err) = written {
                return Err(self.lose(&err));
            }
        }

        self.controller = controller;
        self.guard = snapshot.guard;
        self.governor.resume(snapshot.rng, snapshot.mode);
        debug!(segments, "restored worm snapshot");
        Ok(())
    }

    /// Remove every constraint and body from the world.
    pub fn despawn<W: PhysicsWorld + ?Sized>(self, world: &mut W) -> Result<()> {
        let segments = self.chain.len();
        let constraints = self.network.teardown(world);
        let bodies = self.chain.teardown(world);
        debug!(segments, "despawned worm");
        constraints.and(bodies)
    }

    /// Whether the worm can still tick.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Mode of the last tick.
    #[must_use]
    pub fn mode(&self) -> LocomotionMode {
        self.governor.mode()
    }

    /// Segment bodies.
    #[must_use]
    pub fn chain(&self) -> &SegmentChain {
        &self.chain
    }

    /// Constraints.
    #[must_use]
    pub fn network(&self) -> &ConstraintNetwork {
        &self.network
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &WormConfig {
        &self.config
    }
}

fn abandon<W: PhysicsWorld + ?Sized>(
    world: &mut W,
    chain: SegmentChain,
    network: ConstraintNetwork,
) {
    if let Err(err) = network.teardown(world).and_then(|()| chain.teardown(world)) {
        warn!(error = %err, "failed to tear down partially spawned worm");
    }
}
