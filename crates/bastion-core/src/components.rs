//! ECS components for pooled entities.
//!
//! Components are plain data structs with no methods.
//! Pool bookkeeping lives in the allocator, not in components.

use serde::{Deserialize, Serialize};

use crate::ids::PoolHandle;

/// Marks an entity as owned by a pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pooled {
    pub pool: PoolHandle,
}

/// Marks a pooled entity as currently handed out (not idle).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Active;

// Position is defined in types.rs but doubles as an ECS component.
pub use crate::types::Position;
