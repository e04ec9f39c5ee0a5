//! Resolved setup contexts.
//!
//! A context bundles everything a wave loop needs for one
//! (owner, category, role) key. Contexts are immutable once built and
//! shared by `Arc` between the orchestration cache, the pool runner, and
//! the wave runner.

use std::sync::Arc;

use bastion_core::config::{MinionProfile, PoolDescriptor, SpawnPattern};
use bastion_core::enums::{DetectionCategory, TargetRole};
use bastion_core::ids::OwnerId;
use bastion_strategy::DefenseStrategy;

/// Cache key for resolved contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextKey {
    pub owner: OwnerId,
    pub category: DetectionCategory,
    pub role: TargetRole,
}

/// The wave preset after resolution, with the spawn radius computed.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveConfig {
    pub preset_name: String,
    /// Pool minions are drawn from.
    pub pool: Option<PoolDescriptor>,
    pub batch_size: u32,
    pub interval_secs: f64,
    pub spawn_pattern: Option<SpawnPattern>,
    /// Owner extent plus the entry's radius offset (m).
    pub spawn_radius: f64,
    pub vertical_offset: f64,
}

#[derive(Debug, Clone)]
pub struct SetupContext {
    pub owner: OwnerId,
    pub category: DetectionCategory,
    pub role: TargetRole,
    /// Name of the entry this context was resolved from.
    pub entry_name: String,
    pub resource: Option<String>,
    pub strategy: Option<Arc<dyn DefenseStrategy>>,
    pub wave: Option<WaveConfig>,
    pub minion: Option<MinionProfile>,
    /// Every distinct pool reachable from the entry.
    pub pool_sources: Vec<PoolDescriptor>,
}

impl WaveConfig {
    pub fn is_usable(&self) -> bool {
        self.batch_size > 0 && self.interval_secs > 0.0
    }
}

impl SetupContext {
    /// A context with no entry behind it. Carries no wave until one is attached.
    pub fn minimal(owner: OwnerId, category: DetectionCategory, role: TargetRole) -> Self {
        Self {
            owner,
            category,
            role,
            entry_name: String::new(),
            resource: None,
            strategy: None,
            wave: None,
            minion: None,
            pool_sources: Vec::new(),
        }
    }

    pub fn key(&self) -> ContextKey {
        ContextKey {
            owner: self.owner,
            category: self.category,
            role: self.role,
        }
    }

    pub fn usable_wave(&self) -> Option<&WaveConfig> {
        self.wave.as_ref().filter(|w| w.is_usable())
    }

    /// Name of the pool waves spawn from.
    pub fn spawn_pool_name(&self) -> Option<&str> {
        self.wave
            .as_ref()
            .and_then(|w| w.pool.as_ref())
            .map(|p| p.name.as_str())
    }
}
