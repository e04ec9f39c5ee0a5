//! Pooled-entity allocator contract and the default hecs-backed allocator.
//!
//! The allocator is shared by every owner. It knows nothing about waves:
//! it registers pools by descriptor, hands out instances at a position,
//! and takes them back.

use std::collections::HashMap;

use hecs::{Entity, World};
use tracing::debug;

use bastion_core::components::{Active, Pooled};
use bastion_core::config::PoolDescriptor;
use bastion_core::error::ConfigError;
use bastion_core::ids::{EntityHandle, PoolHandle};
use bastion_core::types::Position;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("invalid pool descriptor: {0}")]
    InvalidDescriptor(#[source] ConfigError),
}

/// The allocator operations the pool and wave runners rely on.
pub trait PoolAllocator: Send {
    /// Register a pool, or return the existing handle for the same name.
    fn register(&mut self, descriptor: &PoolDescriptor) -> Result<PoolHandle, PoolError>;

    /// Create idle instances until the pool holds `count` (capped at capacity).
    /// Returns the number created.
    fn prewarm(&mut self, pool: PoolHandle, count: u32) -> u32;

    /// Hand out an instance at `position`, or `None` when the pool is exhausted.
    fn spawn_at(&mut self, pool: PoolHandle, position: Position) -> Option<EntityHandle>;

    /// Return every live instance of the pool. Returns how many were returned.
    fn clear(&mut self, pool: PoolHandle) -> usize;

    /// Instances of the pool currently handed out.
    fn live_count(&self, pool: PoolHandle) -> usize;
}

#[derive(Debug)]
struct PoolSlot {
    descriptor: PoolDescriptor,
    idle: Vec<Entity>,
    live: Vec<Entity>,
}

impl PoolSlot {
    fn total(&self) -> usize {
        self.idle.len() + self.live.len()
    }
}

/// Pool allocator whose instances are hecs entities carrying a `Position`.
#[derive(Default)]
pub struct HecsPool {
    world: World,
    slots: Vec<PoolSlot>,
    by_name: HashMap<String, PoolHandle>,
}

impl HecsPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only access to the instance world.
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn handle_for(&self, name: &str) -> Option<PoolHandle> {
        self.by_name.get(name).copied()
    }

    pub fn idle_count(&self, pool: PoolHandle) -> usize {
        self.slot(pool).map_or(0, |s| s.idle.len())
    }

    pub fn is_active(&self, handle: EntityHandle) -> bool {
        to_entity(handle).is_some_and(|e| self.world.get::<&Active>(e).is_ok())
    }

    pub fn position_of(&self, handle: EntityHandle) -> Option<Position> {
        let entity = to_entity(handle)?;
        self.world.get::<&Position>(entity).ok().map(|p| *p)
    }

    /// Return a single live instance to its pool (minion died, left range, ...).
    pub fn recycle(&mut self, handle: EntityHandle) -> bool {
        let Some(entity) = to_entity(handle) else {
            return false;
        };
        let Ok(pool) = self.world.get::<&Pooled>(entity).map(|p| p.pool) else {
            return false;
        };
        let Some(slot) = self.slots.get_mut(pool.0 as usize) else {
            return false;
        };
        let Some(index) = slot.live.iter().position(|&e| e == entity) else {
            return false;
        };
        slot.live.swap_remove(index);
        let _ = self.world.remove_one::<Active>(entity);
        slot.idle.push(entity);
        true
    }

    fn slot(&self, pool: PoolHandle) -> Option<&PoolSlot> {
        self.slots.get(pool.0 as usize)
    }
}

impl PoolAllocator for HecsPool {
    fn register(&mut self, descriptor: &PoolDescriptor) -> Result<PoolHandle, PoolError> {
        descriptor.validate().map_err(PoolError::InvalidDescriptor)?;

        if let Some(&handle) = self.by_name.get(&descriptor.name) {
            if self.slot(handle).is_some_and(|s| s.descriptor != *descriptor) {
                debug!(pool = %descriptor.name, "pool already registered with another descriptor; keeping the first");
            }
            return Ok(handle);
        }

        let handle = PoolHandle(self.slots.len() as u32);
        self.slots.push(PoolSlot {
            descriptor: descriptor.clone(),
            idle: Vec::new(),
            live: Vec::new(),
        });
        self.by_name.insert(descriptor.name.clone(), handle);
        Ok(handle)
    }

    fn prewarm(&mut self, pool: PoolHandle, count: u32) -> u32 {
        let Some(slot) = self.slots.get_mut(pool.0 as usize) else {
            return 0;
        };
        let target = count.min(slot.descriptor.capacity) as usize;
        let mut created = 0;
        while slot.total() < target {
            let entity = self.world.spawn((Pooled { pool }, Position::default()));
            slot.idle.push(entity);
            created += 1;
        }
        created
    }

    fn spawn_at(&mut self, pool: PoolHandle, position: Position) -> Option<EntityHandle> {
        let slot = self.slots.get_mut(pool.0 as usize)?;

        let entity = match slot.idle.pop() {
            Some(entity) => {
                if let Ok(mut current) = self.world.get::<&mut Position>(entity) {
                    *current = position;
                }
                entity
            }
            None if slot.total() < slot.descriptor.capacity as usize => {
                self.world.spawn((Pooled { pool }, position))
            }
            None => return None,
        };

        self.world.insert_one(entity, Active).ok()?;
        slot.live.push(entity);
        Some(EntityHandle(entity.to_bits().get()))
    }

    fn clear(&mut self, pool: PoolHandle) -> usize {
        let Some(slot) = self.slots.get_mut(pool.0 as usize) else {
            return 0;
        };
        let returned = slot.live.len();
        for entity in slot.live.drain(..) {
            let _ = self.world.remove_one::<Active>(entity);
            slot.idle.push(entity);
        }
        returned
    }

    fn live_count(&self, pool: PoolHandle) -> usize {
        self.slot(pool).map_or(0, |s| s.live.len())
    }
}

fn to_entity(handle: EntityHandle) -> Option<Entity> {
    Entity::from_bits(handle.0)
}
