//! Pool registration, warm-up, and release per owner.
//!
//! Knows nothing about waves. Registration is idempotent by pool name,
//! warm-up happens at most once per owner, and release only clears pools
//! no other owner still uses.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use bastion_core::ids::{EntityHandle, OwnerId, PoolHandle};
use bastion_core::types::Position;

use crate::context::SetupContext;
use crate::pool::PoolAllocator;

#[derive(Debug, Clone)]
struct RegisteredPool {
    name: String,
    handle: PoolHandle,
    prewarm: u32,
}

#[derive(Debug, Default)]
struct OwnerPools {
    /// Configured contexts, most recent last.
    contexts: Vec<Arc<SetupContext>>,
    pools: Vec<RegisteredPool>,
    warmed: bool,
}

impl OwnerPools {
    fn handle_for(&self, name: &str) -> Option<PoolHandle> {
        self.pools.iter().find(|p| p.name == name).map(|p| p.handle)
    }
}

pub struct PoolRunner {
    allocator: Option<Box<dyn PoolAllocator>>,
    owners: BTreeMap<OwnerId, OwnerPools>,
    /// Which owners reference each registered pool.
    users: HashMap<PoolHandle, BTreeSet<OwnerId>>,
}

impl PoolRunner {
    pub fn new(allocator: Option<Box<dyn PoolAllocator>>) -> Self {
        Self {
            allocator,
            owners: BTreeMap::new(),
            users: HashMap::new(),
        }
    }

    pub fn has_allocator(&self) -> bool {
        self.allocator.is_some()
    }

    /// Install (or replace) the shared allocator. Owners configured while it
    /// was absent register their pools on the next configure or spawn.
    pub fn attach_allocator(&mut self, allocator: Box<dyn PoolAllocator>) {
        self.allocator = Some(allocator);
    }

    /// Register every distinct pool reachable from the context.
    /// Returns how many pools were newly registered for the owner.
    pub fn configure_for_owner(&mut self, context: &Arc<SetupContext>) -> usize {
        let owner = context.owner;
        let entry = self.owners.entry(owner).or_default();
        entry.contexts.retain(|c| c.key() != context.key());
        entry.contexts.push(Arc::clone(context));

        let Some(allocator) = self.allocator.as_mut() else {
            warn!(owner = %owner, "no pool allocator; pool registration deferred");
            return 0;
        };

        let wave_pool = context.wave.as_ref().and_then(|w| w.pool.as_ref());
        let mut registered = 0;
        for descriptor in context.pool_sources.iter().chain(wave_pool) {
            if entry.handle_for(&descriptor.name).is_some() {
                continue;
            }
            match allocator.register(descriptor) {
                Ok(handle) => {
                    entry.pools.push(RegisteredPool {
                        name: descriptor.name.clone(),
                        handle,
                        prewarm: descriptor.prewarm,
                    });
                    self.users.entry(handle).or_default().insert(owner);
                    registered += 1;
                }
                Err(err) => {
                    warn!(owner = %owner, pool = %descriptor.name, error = %err, "skipping invalid pool");
                }
            }
        }
        if registered > 0 {
            debug!(owner = %owner, registered, "pools configured");
        }
        registered
    }

    /// Prewarm the owner's pools. Only the first call per owner does work.
    pub fn warm_up(&mut self, context: &Arc<SetupContext>) -> bool {
        let owner = context.owner;
        if !self.owners.contains_key(&owner) {
            self.configure_for_owner(context);
        }
        let Some(entry) = self.owners.get_mut(&owner) else {
            return false;
        };
        if entry.warmed {
            debug!(owner = %owner, "pools already warm");
            return false;
        }
        let Some(allocator) = self.allocator.as_mut() else {
            warn!(owner = %owner, "no pool allocator; warm-up deferred");
            return false;
        };

        let created: u32 = entry
            .pools
            .iter()
            .map(|p| allocator.prewarm(p.handle, p.prewarm))
            .sum();
        entry.warmed = true;
        info!(owner = %owner, pools = entry.pools.len(), created, "pools warmed");
        true
    }

    /// Clear the owner's pools and forget all of its bookkeeping.
    /// Returns how many pools were actually cleared.
    pub fn release(&mut self, owner: OwnerId) -> usize {
        let Some(entry) = self.owners.remove(&owner) else {
            return 0;
        };
        let mut cleared = 0;
        for pool in entry.pools {
            let still_used = match self.users.get_mut(&pool.handle) {
                Some(users) => {
                    users.remove(&owner);
                    !users.is_empty()
                }
                None => false,
            };
            if still_used {
                debug!(owner = %owner, pool = %pool.name, "pool kept; other owners use it");
                continue;
            }
            self.users.remove(&pool.handle);
            if let Some(allocator) = self.allocator.as_mut() {
                let returned = allocator.clear(pool.handle);
                debug!(owner = %owner, pool = %pool.name, returned, "pool cleared");
            }
            cleared += 1;
        }
        cleared
    }

    /// Most recently configured context for the owner.
    pub fn try_get_configuration(&self, owner: OwnerId) -> Option<Arc<SetupContext>> {
        self.owners.get(&owner).and_then(|e| e.contexts.last().cloned())
    }

    /// Handle of the pool the context spawns from, registering and warming
    /// the owner's pools first if that has not happened yet.
    pub fn ensure_spawn_pool(&mut self, context: &Arc<SetupContext>) -> Option<PoolHandle> {
        let name = context.spawn_pool_name()?;
        let known = self
            .owners
            .get(&context.owner)
            .and_then(|e| e.handle_for(name));
        let handle = match known {
            Some(handle) => handle,
            None => {
                self.configure_for_owner(context);
                self.owners.get(&context.owner)?.handle_for(name)?
            }
        };
        if !self.is_warmed(context.owner) {
            self.warm_up(context);
        }
        Some(handle)
    }

    pub fn spawn(&mut self, pool: PoolHandle, position: Position) -> Option<EntityHandle> {
        self.allocator.as_mut()?.spawn_at(pool, position)
    }

    pub fn live_count(&self, pool: PoolHandle) -> usize {
        self.allocator.as_ref().map_or(0, |a| a.live_count(pool))
    }

    pub fn is_configured(&self, owner: OwnerId) -> bool {
        self.owners.contains_key(&owner)
    }

    pub fn is_warmed(&self, owner: OwnerId) -> bool {
        self.owners.get(&owner).is_some_and(|e| e.warmed)
    }

    pub fn pool_handles(&self, owner: OwnerId) -> Vec<PoolHandle> {
        self.owners
            .get(&owner)
            .map(|e| e.pools.iter().map(|p| p.handle).collect())
            .unwrap_or_default()
    }

    pub fn handle_for(&self, owner: OwnerId, name: &str) -> Option<PoolHandle> {
        self.owners.get(&owner)?.handle_for(name)
    }

    /// Owners currently sharing a pool.
    pub fn users_of(&self, pool: PoolHandle) -> usize {
        self.users.get(&pool).map_or(0, BTreeSet::len)
    }
}
