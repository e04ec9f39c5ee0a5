//! Enumeration types used throughout the engine.

use serde::{Deserialize, Serialize};

/// Classification of a detected threat, used to pick wave configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetRole {
    /// Terminal value when no binding, table, or fallback matched.
    #[default]
    Unknown,
    /// Player-controlled ship.
    Player,
    /// Hostile AI faction.
    Hostile,
    /// Non-aligned traffic.
    Neutral,
}

impl TargetRole {
    pub fn is_known(self) -> bool {
        self != TargetRole::Unknown
    }
}

/// Which sensor layer of an owner raised the detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DetectionCategory {
    /// Outer early-warning shell.
    #[default]
    Perimeter,
    /// Orbital band around the owner.
    Orbit,
    /// Inside the owner's atmosphere.
    Atmosphere,
}

/// How an owner with several configured entries picks one at resolution time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionPolicy {
    /// Round-robin per owner; every entry is used once before the index wraps.
    #[default]
    Sequential,
    /// Uniform pick per resolution; repeats are allowed.
    Random,
}

/// Per-owner wave loop state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveLoopPhase {
    /// No timer exists for the owner.
    #[default]
    Idle,
    /// A repeating timer is active and spawning batches.
    Running,
}

/// What `StartWaves` does when no wave preset can be resolved for an owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingPresetPolicy {
    /// Refuse to start and report a configuration error.
    #[default]
    Fail,
    /// Start with the documented fallback wave and log a warning.
    Degrade,
}
