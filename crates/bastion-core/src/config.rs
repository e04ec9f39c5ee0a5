//! Authored wave and role configuration.
//!
//! These types are the data a designer attaches to an owner. They are
//! deserialized from JSON and validated before the engine ever sees them;
//! resolution re-validates the preset it picks so a bad value can never
//! turn into a wave that silently spawns nothing.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_VERTICAL_OFFSET;
use crate::enums::{SelectionPolicy, TargetRole};
use crate::error::ConfigError;

/// Describes a pool the allocator should create (or reuse, by name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolDescriptor {
    pub name: String,
    /// Maximum instances alive or idle at once.
    pub capacity: u32,
    /// Instances created up front by warm-up.
    #[serde(default)]
    pub prewarm: u32,
}

/// Behavior profile handed to a spawned minion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinionProfile {
    pub name: String,
    /// Pool the minion is drawn from.
    #[serde(default)]
    pub pool: Option<PoolDescriptor>,
    /// Length of the scripted entry phase (s). Zero means none.
    #[serde(default)]
    pub entry_phase_secs: f64,
}

/// Planar distribution of spawn points around the owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SpawnPattern {
    /// Uniform over the full disc of the spawn radius.
    #[default]
    Disc,
    /// Uniform over the annulus between `inner_fraction * radius` and `radius`.
    Ring { inner_fraction: f64 },
}

/// Batch size, cadence, and shape of one kind of wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WavePreset {
    pub name: String,
    pub batch_size: u32,
    pub interval_secs: f64,
    #[serde(default)]
    pub spawn_pattern: Option<SpawnPattern>,
    /// Wave-level minion profile; wins over the binding's minion profile.
    #[serde(default)]
    pub minion: Option<MinionProfile>,
}

/// Role-specific override inside an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub role: TargetRole,
    #[serde(default)]
    pub minion: Option<MinionProfile>,
    #[serde(default)]
    pub wave: Option<WavePreset>,
}

/// One configuration source attached to an owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefenseEntry {
    pub name: String,
    /// Domain resource this entry belongs to (faction asset, tier id, ...).
    #[serde(default)]
    pub resource: Option<String>,
    /// Context-level pool, used when the selected minion carries none.
    #[serde(default)]
    pub pool: Option<PoolDescriptor>,
    #[serde(default)]
    pub default_minion: Option<MinionProfile>,
    #[serde(default)]
    pub default_wave: Option<WavePreset>,
    #[serde(default)]
    pub bindings: Vec<RoleBinding>,
    /// Added to the owner's approximate extent to get the spawn radius.
    #[serde(default)]
    pub spawn_radius_offset: f64,
    #[serde(default = "default_vertical_offset")]
    pub vertical_offset: f64,
}

/// A complete authored configuration for one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefenseConfig {
    #[serde(default)]
    pub selection: SelectionPolicy,
    pub entries: Vec<DefenseEntry>,
}

fn default_vertical_offset() -> f64 {
    DEFAULT_VERTICAL_OFFSET
}

impl PoolDescriptor {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into(),
            capacity,
            prewarm: 0,
        }
    }

    pub fn with_prewarm(mut self, prewarm: u32) -> Self {
        self.prewarm = prewarm;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let reason = if self.name.trim().is_empty() {
            "empty name"
        } else if self.capacity == 0 {
            "capacity is 0"
        } else if self.prewarm > self.capacity {
            "prewarm exceeds capacity"
        } else {
            return Ok(());
        };
        Err(ConfigError::InvalidPoolDescriptor {
            name: self.name.clone(),
            reason: reason.to_string(),
        })
    }
}

impl MinionProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pool: None,
            entry_phase_secs: 0.0,
        }
    }

    pub fn with_pool(mut self, pool: PoolDescriptor) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn has_entry_phase(&self) -> bool {
        self.entry_phase_secs > 0.0
    }
}

impl WavePreset {
    pub fn new(name: impl Into<String>, batch_size: u32, interval_secs: f64) -> Self {
        Self {
            name: name.into(),
            batch_size,
            interval_secs,
            spawn_pattern: None,
            minion: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize {
                preset: self.name.clone(),
            });
        }
        // NaN fails this comparison too.
        if !(self.interval_secs > 0.0) {
            return Err(ConfigError::InvalidInterval {
                preset: self.name.clone(),
                interval_secs: self.interval_secs,
            });
        }
        if let Some(SpawnPattern::Ring { inner_fraction }) = self.spawn_pattern {
            if !(0.0..=1.0).contains(&inner_fraction) {
                return Err(ConfigError::InvalidSpawnPattern {
                    preset: self.name.clone(),
                    inner_fraction,
                });
            }
        }
        Ok(())
    }
}

impl DefenseEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource: None,
            pool: None,
            default_minion: None,
            default_wave: None,
            bindings: Vec::new(),
            spawn_radius_offset: 0.0,
            vertical_offset: DEFAULT_VERTICAL_OFFSET,
        }
    }

    /// The binding for `role`, if the entry declares one.
    pub fn binding_for(&self, role: TargetRole) -> Option<&RoleBinding> {
        self.bindings.iter().find(|b| b.role == role)
    }

    /// Every distinct pool reachable from this entry, by name, in the order
    /// context pool, default minion pool, then per-role pools.
    pub fn pool_sources(&self) -> Vec<&PoolDescriptor> {
        let candidates = self
            .pool
            .iter()
            .chain(self.default_minion.iter().filter_map(|m| m.pool.as_ref()))
            .chain(self.default_wave.iter().filter_map(wave_pool))
            .chain(self.bindings.iter().flat_map(|b| {
                b.minion
                    .iter()
                    .filter_map(|m| m.pool.as_ref())
                    .chain(b.wave.iter().filter_map(wave_pool))
            }));

        let mut out: Vec<&PoolDescriptor> = Vec::new();
        for descriptor in candidates {
            if !out.iter().any(|d| d.name == descriptor.name) {
                out.push(descriptor);
            }
        }
        out
    }

    /// Check everything that would make resolution fail later.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let default_wave = self
            .default_wave
            .as_ref()
            .ok_or_else(|| ConfigError::MissingDefaultWave {
                entry: self.name.clone(),
            })?;
        default_wave.validate()?;

        for (i, binding) in self.bindings.iter().enumerate() {
            if self.bindings[..i].iter().any(|b| b.role == binding.role) {
                return Err(ConfigError::DuplicateRoleBinding {
                    entry: self.name.clone(),
                    role: binding.role,
                });
            }
            if let Some(wave) = &binding.wave {
                wave.validate()?;
            }
        }

        for pool in self.pool_sources() {
            pool.validate()?;
        }
        Ok(())
    }
}

fn wave_pool(wave: &WavePreset) -> Option<&PoolDescriptor> {
    wave.minion.as_ref().and_then(|m| m.pool.as_ref())
}

impl DefenseConfig {
    /// Parse and validate a configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: DefenseConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entries.is_empty() {
            return Err(ConfigError::NoEntries);
        }
        self.entries.iter().try_for_each(DefenseEntry::validate)
    }
}
