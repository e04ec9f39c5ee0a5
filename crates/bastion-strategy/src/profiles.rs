//! Minion profile selection.

use bastion_core::config::MinionProfile;
use bastion_core::enums::TargetRole;
use bastion_core::error::ConfigError;

/// Pick the profile a spawned minion uses.
///
/// The wave-level profile wins over the pool/minion-level one. Having
/// neither is a configuration error, never an implicit default.
pub fn select_minion_profile(
    role: TargetRole,
    wave_profile: Option<&MinionProfile>,
    minion_profile: Option<&MinionProfile>,
) -> Result<MinionProfile, ConfigError> {
    wave_profile
        .or(minion_profile)
        .cloned()
        .ok_or(ConfigError::MissingMinionProfile { role })
}
