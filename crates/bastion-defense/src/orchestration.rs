//! Orchestration service: resolves setup contexts and drives the runners.
//!
//! The service owns the state manager, pool runner, and wave runner it is
//! constructed with, plus every per-owner cache (resolved contexts,
//! selection index, owner extent). For a given owner the order is always
//! engagement state, then resolution, then pool warm-up, then wave start.

use std::collections::HashMap;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use bastion_core::config::DefenseEntry;
use bastion_core::constants::DEFAULT_OWNER_EXTENT;
use bastion_core::enums::{DetectionCategory, MissingPresetPolicy, SelectionPolicy, TargetRole};
use bastion_core::error::ConfigError;
use bastion_core::events::{MinionSpawned, PrimaryTarget};
use bastion_core::ids::OwnerId;
use bastion_strategy::strategy::select_profile;
use bastion_strategy::DefenseStrategy;

use crate::context::{ContextKey, SetupContext, WaveConfig};
use crate::error::{DefenseError, DefenseResult};
use crate::owners::OwnerSpatial;
use crate::pool_runner::PoolRunner;
use crate::state_manager::StateManager;
use crate::wave_runner::{SpawnEnv, WaveRunner};

/// The runners the service coordinates, injected at construction.
pub struct DefenseServices {
    pub state: StateManager,
    pub pools: PoolRunner,
    pub waves: WaveRunner,
}

#[derive(Debug, Clone)]
struct ConfiguredEntries {
    entries: Vec<DefenseEntry>,
    policy: SelectionPolicy,
}

pub struct OrchestrationService {
    state: StateManager,
    pools: PoolRunner,
    waves: WaveRunner,
    rng: ChaCha8Rng,
    entries: HashMap<OwnerId, ConfiguredEntries>,
    strategies: HashMap<OwnerId, Arc<dyn DefenseStrategy>>,
    contexts: HashMap<ContextKey, Arc<SetupContext>>,
    selection_index: HashMap<OwnerId, usize>,
    extent_cache: HashMap<OwnerId, f64>,
    resolutions: u64,
}

impl OrchestrationService {
    pub fn new(services: DefenseServices, seed: u64) -> Self {
        let DefenseServices { state, pools, waves } = services;
        Self {
            state,
            pools,
            waves,
            rng: ChaCha8Rng::seed_from_u64(seed),
            entries: HashMap::new(),
            strategies: HashMap::new(),
            contexts: HashMap::new(),
            selection_index: HashMap::new(),
            extent_cache: HashMap::new(),
            resolutions: 0,
        }
    }

    /// Attach configuration entries to an owner, replacing any previous ones.
    ///
    /// Every entry is validated first; on error nothing changes.
    pub fn configure_entries(
        &mut self,
        owner: OwnerId,
        entries: Vec<DefenseEntry>,
        policy: SelectionPolicy,
    ) -> Result<(), ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::NoEntries);
        }
        entries.iter().try_for_each(DefenseEntry::validate)?;

        self.invalidate_contexts(owner);
        self.selection_index.remove(&owner);
        debug!(owner = %owner, entries = entries.len(), ?policy, "entries configured");
        self.entries.insert(owner, ConfiguredEntries { entries, policy });
        Ok(())
    }

    /// Bind the owner's strategy. Cached contexts are rebuilt on next use.
    pub fn bind_strategy(&mut self, owner: OwnerId, strategy: Arc<dyn DefenseStrategy>) {
        self.invalidate_contexts(owner);
        self.waves.configure_strategy(owner, Arc::clone(&strategy));
        self.strategies.insert(owner, strategy);
    }

    pub fn strategy(&self, owner: OwnerId) -> Option<Arc<dyn DefenseStrategy>> {
        self.strategies.get(&owner).cloned()
    }

    /// Resolve (or fetch from cache) the context for `(owner, category, role)`.
    pub fn resolve_effective_config(
        &mut self,
        owner: OwnerId,
        category: DetectionCategory,
        role: TargetRole,
        owners: &dyn OwnerSpatial,
    ) -> DefenseResult<Arc<SetupContext>> {
        let key = ContextKey {
            owner,
            category,
            role,
        };
        if let Some(context) = self.contexts.get(&key) {
            return Ok(Arc::clone(context));
        }

        let configured = match self.entries.get(&owner) {
            Some(configured) if !configured.entries.is_empty() => configured,
            _ => return Err(DefenseError::NoEntries { owner }),
        };
        let count = configured.entries.len();
        let index = match configured.policy {
            SelectionPolicy::Sequential => {
                let next = self.selection_index.entry(owner).or_insert(0);
                let chosen = *next % count;
                *next = (chosen + 1) % count;
                chosen
            }
            SelectionPolicy::Random => self.rng.gen_range(0..count),
        };
        let entry = &configured.entries[index];
        let config_err = |source| DefenseError::config(owner, source);

        let binding = entry.binding_for(role);
        let preset = binding
            .and_then(|b| b.wave.as_ref())
            .or(entry.default_wave.as_ref())
            .ok_or_else(|| {
                config_err(ConfigError::MissingDefaultWave {
                    entry: entry.name.clone(),
                })
            })?;
        preset.validate().map_err(config_err)?;

        let strategy = self.strategies.get(&owner).cloned();
        let minion_level = binding
            .and_then(|b| b.minion.as_ref())
            .or(entry.default_minion.as_ref());
        let minion = select_profile(
            strategy.as_deref(),
            owner,
            role,
            preset.minion.as_ref(),
            minion_level,
        )
        .map_err(config_err)?;
        let pool = minion
            .pool
            .clone()
            .or_else(|| entry.pool.clone())
            .ok_or_else(|| {
                config_err(ConfigError::MissingPool {
                    entry: entry.name.clone(),
                    role,
                })
            })?;

        let extent = cached_extent(&mut self.extent_cache, owner, owners);

        let wave = WaveConfig {
            preset_name: preset.name.clone(),
            pool: Some(pool),
            batch_size: preset.batch_size,
            interval_secs: preset.interval_secs,
            spawn_pattern: preset.spawn_pattern,
            spawn_radius: extent + entry.spawn_radius_offset,
            vertical_offset: entry.vertical_offset,
        };
        let context = Arc::new(SetupContext {
            owner,
            category,
            role,
            entry_name: entry.name.clone(),
            resource: entry.resource.clone(),
            strategy,
            wave: Some(wave),
            minion: Some(minion),
            pool_sources: entry.pool_sources().into_iter().cloned().collect(),
        });

        self.resolutions += 1;
        debug!(
            owner = %owner,
            category = ?category,
            role = ?role,
            entry = %context.entry_name,
            "setup context resolved"
        );
        self.contexts.insert(key, Arc::clone(&context));
        Ok(context)
    }

    /// Configure pools for the context's owner, warm them when the context
    /// carries a usable wave, and register its strategy with the wave runner.
    pub fn prepare_runners(&mut self, context: &Arc<SetupContext>) {
        self.pools.configure_for_owner(context);
        if context.usable_wave().is_some() {
            self.pools.warm_up(context);
        }
        if let Some(strategy) = &context.strategy {
            self.waves
                .configure_strategy(context.owner, Arc::clone(strategy));
        }
    }

    pub fn configure_primary_target(&mut self, owner: OwnerId, target: PrimaryTarget) {
        self.waves.configure_primary_target(owner, target);
    }

    /// Start the owner's waves, resolving and warming lazily if nothing
    /// was prepared yet.
    pub fn start_waves(
        &mut self,
        owner: OwnerId,
        category: DetectionCategory,
        owners: &dyn OwnerSpatial,
        spawned: &mut Vec<MinionSpawned>,
    ) -> DefenseResult<bool> {
        if self.waves.is_running(owner) {
            debug!(owner = %owner, "waves already running");
            return Ok(false);
        }
        if !self.pools.is_configured(owner) && self.entries.contains_key(&owner) {
            let role = self
                .waves
                .primary_target(owner)
                .map_or(TargetRole::Unknown, |t| t.role);
            let context = self.resolve_effective_config(owner, category, role, owners)?;
            self.prepare_runners(&context);
        }

        let strategy = self.strategies.get(&owner).cloned();
        let radius = cached_extent(&mut self.extent_cache, owner, owners);
        let mut env = SpawnEnv {
            pools: &mut self.pools,
            owners,
            rng: &mut self.rng,
            spawned,
        };
        self.waves
            .start_waves(owner, category, strategy, radius, &mut env)
    }

    pub fn stop_waves(&mut self, owner: OwnerId) -> bool {
        self.waves.stop_waves(owner)
    }

    pub fn release_pools(&mut self, owner: OwnerId) -> usize {
        self.pools.release(owner)
    }

    /// Forget cached contexts, selection index, and extent for the owner.
    pub fn clear_context(&mut self, owner: OwnerId) {
        self.invalidate_contexts(owner);
        self.selection_index.remove(&owner);
        self.extent_cache.remove(&owner);
    }

    /// Advance every running wave loop.
    pub fn tick(
        &mut self,
        dt: f64,
        owners: &dyn OwnerSpatial,
        spawned: &mut Vec<MinionSpawned>,
    ) -> usize {
        let mut env = SpawnEnv {
            pools: &mut self.pools,
            owners,
            rng: &mut self.rng,
            spawned,
        };
        self.waves.tick(dt, &mut env)
    }

    // ---- Signal handlers ----

    /// First engagement: aim, resolve, warm, start.
    pub fn handle_engaged(
        &mut self,
        owner: OwnerId,
        category: DetectionCategory,
        role: TargetRole,
        target: PrimaryTarget,
        owners: &dyn OwnerSpatial,
        spawned: &mut Vec<MinionSpawned>,
    ) -> DefenseResult<()> {
        self.configure_primary_target(owner, target);
        match self.resolve_effective_config(owner, category, role, owners) {
            Ok(context) => self.prepare_runners(&context),
            // Unconfigured owners can still run the fallback wave.
            Err(DefenseError::NoEntries { .. })
                if self.waves.missing_preset() == MissingPresetPolicy::Degrade => {}
            Err(err) => return Err(err),
        }
        self.start_waves(owner, category, owners, spawned)?;
        Ok(())
    }

    /// Last disengagement stops waves; pools and caches stay for a resume.
    pub fn handle_disengaged(&mut self, owner: OwnerId) -> bool {
        self.stop_waves(owner)
    }

    /// Owner disabled: stop waves, release pools, drop caches and state.
    pub fn handle_disabled(&mut self, owner: OwnerId) {
        self.waves.forget(owner);
        let cleared = self.release_pools(owner);
        self.clear_context(owner);
        self.state.clear_owner(owner);
        info!(owner = %owner, pools_cleared = cleared, "owner disabled");
    }

    /// Disable the owner and drop its configuration entirely.
    pub fn forget_owner(&mut self, owner: OwnerId) {
        self.handle_disabled(owner);
        self.entries.remove(&owner);
        self.strategies.remove(&owner);
    }

    // ---- Accessors ----

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StateManager {
        &mut self.state
    }

    pub fn pools(&self) -> &PoolRunner {
        &self.pools
    }

    pub fn waves(&self) -> &WaveRunner {
        &self.waves
    }

    pub fn cached_context(&self, key: &ContextKey) -> Option<Arc<SetupContext>> {
        self.contexts.get(key).cloned()
    }

    /// Number of cache-miss resolutions performed so far.
    pub fn resolution_count(&self) -> u64 {
        self.resolutions
    }

    fn invalidate_contexts(&mut self, owner: OwnerId) {
        self.contexts.retain(|key, _| key.owner != owner);
    }
}

/// Owner extent, looked up once per owner and remembered until the owner's
/// caches are invalidated.
fn cached_extent(
    cache: &mut HashMap<OwnerId, f64>,
    owner: OwnerId,
    owners: &dyn OwnerSpatial,
) -> f64 {
    *cache.entry(owner).or_insert_with(|| {
        owners.approximate_extent(owner).unwrap_or_else(|| {
            warn!(owner = %owner, "no extent for owner; using default");
            DEFAULT_OWNER_EXTENT
        })
    })
}
