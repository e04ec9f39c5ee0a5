//! Runtime failures surfaced by the orchestration layer.

use bastion_core::error::ConfigError;
use bastion_core::ids::OwnerId;

#[derive(Debug, thiserror::Error)]
pub enum DefenseError {
    #[error("{owner} has no configuration entries")]
    NoEntries { owner: OwnerId },

    #[error("{owner} is not registered")]
    UnknownOwner { owner: OwnerId },

    #[error("{owner} has no resolved setup context and fallback waves are disabled")]
    NoContext { owner: OwnerId },

    #[error("{owner}: {source}")]
    Config {
        owner: OwnerId,
        #[source]
        source: ConfigError,
    },
}

pub type DefenseResult<T> = Result<T, DefenseError>;

impl DefenseError {
    pub fn config(owner: OwnerId, source: ConfigError) -> Self {
        DefenseError::Config { owner, source }
    }
}
