//! Timer-driven wave loops.
//!
//! Each engaged owner has at most one loop. Starting a loop spawns the
//! first batch immediately, then the owner's `IntervalTimer` produces one
//! batch per elapsed interval until the loop is stopped. Stopping removes
//! the loop synchronously, so a following start always gets a fresh timer.

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::TAU;
use std::sync::Arc;

use glam::DVec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use bastion_core::config::{MinionProfile, SpawnPattern};
use bastion_core::constants::{DEFAULT_VERTICAL_OFFSET, FALLBACK_BATCH_SIZE, FALLBACK_INTERVAL_SECS};
use bastion_core::enums::{DetectionCategory, MissingPresetPolicy, TargetRole, WaveLoopPhase};
use bastion_core::events::{MinionSpawned, PrimaryTarget};
use bastion_core::ids::{OwnerId, PoolHandle};
use bastion_core::types::Position;
use bastion_strategy::strategy::{notify_disengaged, notify_engaged};
use bastion_strategy::DefenseStrategy;

use crate::context::{SetupContext, WaveConfig};
use crate::error::{DefenseError, DefenseResult};
use crate::owners::OwnerSpatial;
use crate::pool_runner::PoolRunner;
use crate::timer::IntervalTimer;

/// Batch and cadence used under `MissingPresetPolicy::Degrade`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallbackWave {
    pub batch_size: u32,
    pub interval_secs: f64,
}

impl Default for FallbackWave {
    fn default() -> Self {
        Self {
            batch_size: FALLBACK_BATCH_SIZE,
            interval_secs: FALLBACK_INTERVAL_SECS,
        }
    }
}

/// Collaborators a batch needs, borrowed for the duration of one call.
pub struct SpawnEnv<'a> {
    pub pools: &'a mut PoolRunner,
    pub owners: &'a dyn OwnerSpatial,
    pub rng: &'a mut ChaCha8Rng,
    pub spawned: &'a mut Vec<MinionSpawned>,
}

#[derive(Debug)]
struct WaveLoop {
    category: DetectionCategory,
    context: Arc<SetupContext>,
    pool: Option<PoolHandle>,
    timer: IntervalTimer,
    batches: u64,
}

#[derive(Debug)]
pub struct WaveRunner {
    loops: BTreeMap<OwnerId, WaveLoop>,
    targets: HashMap<OwnerId, PrimaryTarget>,
    strategies: HashMap<OwnerId, Arc<dyn DefenseStrategy>>,
    missing_preset: MissingPresetPolicy,
    fallback: FallbackWave,
}

impl WaveRunner {
    pub fn new(missing_preset: MissingPresetPolicy, fallback: FallbackWave) -> Self {
        Self {
            loops: BTreeMap::new(),
            targets: HashMap::new(),
            strategies: HashMap::new(),
            missing_preset,
            fallback,
        }
    }

    /// Start the owner's wave loop.
    ///
    /// Returns `Ok(false)` if the loop was already running. The context is
    /// taken from the pool runner; without one (or without a usable wave on
    /// it) the missing-preset policy decides between failing and running
    /// the fallback wave. A fallback wave spawns at `fallback_radius`
    /// unless the context already carries a wave with its own radius.
    pub fn start_waves(
        &mut self,
        owner: OwnerId,
        category: DetectionCategory,
        strategy: Option<Arc<dyn DefenseStrategy>>,
        fallback_radius: f64,
        env: &mut SpawnEnv<'_>,
    ) -> DefenseResult<bool> {
        if self.loops.contains_key(&owner) {
            debug!(owner = %owner, "waves already running");
            return Ok(false);
        }
        if let Some(strategy) = strategy {
            self.strategies.insert(owner, strategy);
        }

        let context = match env.pools.try_get_configuration(owner) {
            Some(context) if context.usable_wave().is_some() => context,
            found => {
                let base = found.unwrap_or_else(|| {
                    let role = self.targets.get(&owner).map_or(TargetRole::Unknown, |t| t.role);
                    Arc::new(SetupContext::minimal(owner, category, role))
                });
                self.degraded_context(&base, fallback_radius)?
            }
        };

        let pool = env.pools.ensure_spawn_pool(&context);
        if pool.is_none() {
            warn!(owner = %owner, "no spawn pool available; batches will spawn nothing");
        }

        let Some(wave) = context.usable_wave() else {
            return Err(DefenseError::NoContext { owner });
        };
        let mut wave_loop = WaveLoop {
            category,
            timer: IntervalTimer::new(wave.interval_secs),
            context: Arc::clone(&context),
            pool,
            batches: 0,
        };

        spawn_batch(
            owner,
            &mut wave_loop,
            self.targets.get(&owner),
            self.strategies.get(&owner),
            env,
        );
        wave_loop.timer.start();
        info!(
            owner = %owner,
            category = ?category,
            batch = wave.batch_size,
            interval_secs = wave.interval_secs,
            "waves started"
        );
        self.loops.insert(owner, wave_loop);
        Ok(true)
    }

    /// Stop the owner's loop and drop its timer. Returns `false` if idle.
    pub fn stop_waves(&mut self, owner: OwnerId) -> bool {
        let Some(mut wave_loop) = self.loops.remove(&owner) else {
            debug!(owner = %owner, "waves already idle");
            return false;
        };
        wave_loop.timer.stop();
        if let Some(strategy) = self.strategies.get(&owner) {
            notify_disengaged(strategy.as_ref(), owner, wave_loop.category);
        }
        info!(owner = %owner, batches = wave_loop.batches, "waves stopped");
        true
    }

    /// Advance every running loop by `dt` seconds. Returns minions spawned.
    pub fn tick(&mut self, dt: f64, env: &mut SpawnEnv<'_>) -> usize {
        let Self {
            loops,
            targets,
            strategies,
            ..
        } = self;

        let mut total = 0;
        for (&owner, wave_loop) in loops.iter_mut() {
            let due = wave_loop.timer.advance(dt);
            for _ in 0..due {
                total += spawn_batch(
                    owner,
                    wave_loop,
                    targets.get(&owner),
                    strategies.get(&owner),
                    env,
                );
            }
        }
        total
    }

    pub fn missing_preset(&self) -> MissingPresetPolicy {
        self.missing_preset
    }

    pub fn configure_primary_target(&mut self, owner: OwnerId, target: PrimaryTarget) {
        self.targets.insert(owner, target);
    }

    pub fn primary_target(&self, owner: OwnerId) -> Option<&PrimaryTarget> {
        self.targets.get(&owner)
    }

    pub fn configure_strategy(&mut self, owner: OwnerId, strategy: Arc<dyn DefenseStrategy>) {
        self.strategies.insert(owner, strategy);
    }

    pub fn try_get_strategy(&self, owner: OwnerId) -> Option<Arc<dyn DefenseStrategy>> {
        self.strategies.get(&owner).cloned()
    }

    /// Stop the loop and drop the owner's target and strategy.
    pub fn forget(&mut self, owner: OwnerId) {
        self.stop_waves(owner);
        self.targets.remove(&owner);
        self.strategies.remove(&owner);
    }

    pub fn phase(&self, owner: OwnerId) -> WaveLoopPhase {
        if self.loops.contains_key(&owner) {
            WaveLoopPhase::Running
        } else {
            WaveLoopPhase::Idle
        }
    }

    pub fn is_running(&self, owner: OwnerId) -> bool {
        self.loops.contains_key(&owner)
    }

    /// Number of live timers across all owners.
    pub fn active_timer_count(&self) -> usize {
        self.loops.values().filter(|l| l.timer.is_running()).count()
    }

    /// Batches fired by the owner's current loop, including the immediate one.
    pub fn batches_fired(&self, owner: OwnerId) -> Option<u64> {
        self.loops.get(&owner).map(|l| l.batches)
    }

    /// Context the owner's current loop runs with.
    pub fn running_context(&self, owner: OwnerId) -> Option<Arc<SetupContext>> {
        self.loops.get(&owner).map(|l| Arc::clone(&l.context))
    }

    fn degraded_context(
        &self,
        base: &Arc<SetupContext>,
        fallback_radius: f64,
    ) -> DefenseResult<Arc<SetupContext>> {
        let owner = base.owner;
        let fallback_usable = self.fallback.batch_size > 0 && self.fallback.interval_secs > 0.0;
        if self.missing_preset == MissingPresetPolicy::Fail || !fallback_usable {
            error!(owner = %owner, "no usable wave preset; waves not started");
            return Err(DefenseError::NoContext { owner });
        }

        warn!(
            owner = %owner,
            batch = self.fallback.batch_size,
            interval_secs = self.fallback.interval_secs,
            "no usable wave preset; running fallback wave"
        );
        let spawn_radius = base
            .wave
            .as_ref()
            .map_or(fallback_radius, |w| w.spawn_radius);
        let mut degraded = SetupContext::clone(base);
        degraded.wave = Some(WaveConfig {
            preset_name: "fallback".to_string(),
            pool: base.pool_sources.first().cloned(),
            batch_size: self.fallback.batch_size,
            interval_secs: self.fallback.interval_secs,
            spawn_pattern: None,
            spawn_radius,
            vertical_offset: DEFAULT_VERTICAL_OFFSET,
        });
        Ok(Arc::new(degraded))
    }
}

fn spawn_batch(
    owner: OwnerId,
    wave_loop: &mut WaveLoop,
    target: Option<&PrimaryTarget>,
    strategy: Option<&Arc<dyn DefenseStrategy>>,
    env: &mut SpawnEnv<'_>,
) -> usize {
    wave_loop.batches += 1;
    let spawned = spawn_minions(owner, wave_loop, target, env);
    if let Some(strategy) = strategy {
        notify_engaged(strategy.as_ref(), owner, wave_loop.category);
    }
    spawned
}

fn spawn_minions(
    owner: OwnerId,
    wave_loop: &WaveLoop,
    target: Option<&PrimaryTarget>,
    env: &mut SpawnEnv<'_>,
) -> usize {
    let context = &wave_loop.context;
    let Some(wave) = context.wave.as_ref() else {
        return 0;
    };
    let Some(owner_position) = env.owners.position(owner) else {
        warn!(owner = %owner, "owner has no position; batch skipped");
        return 0;
    };
    let Some(pool) = wave_loop.pool else {
        warn!(owner = %owner, "no spawn pool; batch skipped");
        return 0;
    };

    let entry_phase_started = context
        .minion
        .as_ref()
        .is_some_and(MinionProfile::has_entry_phase);
    let mut spawned = 0;
    for _ in 0..wave.batch_size {
        let spawn_position = sample_spawn_position(owner_position, wave, env.rng);
        let Some(entity) = env.pools.spawn(pool, spawn_position) else {
            warn!(owner = %owner, pool = ?pool, "pool exhausted; spawn skipped");
            continue;
        };
        env.spawned.push(MinionSpawned {
            owner,
            category: wave_loop.category,
            entity,
            target: target.and_then(|t| t.entity),
            target_label: target.map(|t| t.label.clone()).unwrap_or_default(),
            target_role: target.map_or(context.role, |t| t.role),
            owner_position,
            spawn_position,
            entry_phase_started,
        });
        spawned += 1;
    }
    spawned
}

/// Random point within the wave's spawn radius, lifted by its vertical offset.
pub fn sample_spawn_position(center: Position, wave: &WaveConfig, rng: &mut ChaCha8Rng) -> Position {
    let radius = wave.spawn_radius.max(0.0);
    let angle = rng.gen_range(0.0..TAU);
    let u: f64 = rng.gen();
    // sqrt keeps the density uniform over area rather than over radius.
    let distance = match wave.spawn_pattern.unwrap_or_default() {
        SpawnPattern::Disc => radius * u.sqrt(),
        SpawnPattern::Ring { inner_fraction } => {
            let inner = inner_fraction.clamp(0.0, 1.0) * radius;
            (inner * inner + u * (radius * radius - inner * inner)).sqrt()
        }
    };
    center.offset(DVec2::from_angle(angle) * distance, wave.vertical_offset)
}
