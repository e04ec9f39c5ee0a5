//! Errors raised by authored configuration.

use crate::enums::TargetRole;

/// A problem with authored wave/role configuration.
///
/// These are never degraded into defaults: validation reports them at
/// authoring time and resolution reports them again at runtime.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("entry '{entry}' has no default wave preset")]
    MissingDefaultWave { entry: String },

    #[error("wave preset '{preset}' has batch size 0")]
    InvalidBatchSize { preset: String },

    #[error("wave preset '{preset}' has non-positive interval {interval_secs}s")]
    InvalidInterval { preset: String, interval_secs: f64 },

    #[error("wave preset '{preset}' has ring inner fraction {inner_fraction} outside 0..=1")]
    InvalidSpawnPattern { preset: String, inner_fraction: f64 },

    #[error("entry '{entry}' binds role {role:?} more than once")]
    DuplicateRoleBinding { entry: String, role: TargetRole },

    #[error("no minion profile for role {role:?}: neither the wave nor the pool provides one")]
    MissingMinionProfile { role: TargetRole },

    #[error("no pool source for role {role:?} in entry '{entry}'")]
    MissingPool { entry: String, role: TargetRole },

    #[error("pool descriptor '{name}' is invalid: {reason}")]
    InvalidPoolDescriptor { name: String, reason: String },

    #[error("no configuration entries")]
    NoEntries,

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
