//! Owner registry: explicit create/destroy lifecycle for defended objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use bastion_core::ids::OwnerId;
use bastion_core::types::Position;

/// Spatial facts about owners that the wave loop needs.
pub trait OwnerSpatial {
    fn position(&self, owner: OwnerId) -> Option<Position>;
    /// Approximate radius of the owner's body (m).
    fn approximate_extent(&self, owner: OwnerId) -> Option<f64>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerRecord {
    pub position: Position,
    pub extent: f64,
}

/// Arena of owner ids to their records.
#[derive(Debug, Default)]
pub struct OwnerRegistry {
    owners: BTreeMap<OwnerId, OwnerRecord>,
    next_id: u32,
}

impl OwnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, position: Position, extent: f64) -> OwnerId {
        let id = OwnerId(self.next_id);
        self.next_id += 1;
        self.owners.insert(id, OwnerRecord { position, extent });
        id
    }

    pub fn destroy(&mut self, owner: OwnerId) -> Option<OwnerRecord> {
        self.owners.remove(&owner)
    }

    pub fn contains(&self, owner: OwnerId) -> bool {
        self.owners.contains_key(&owner)
    }

    pub fn get(&self, owner: OwnerId) -> Option<&OwnerRecord> {
        self.owners.get(&owner)
    }

    pub fn set_position(&mut self, owner: OwnerId, position: Position) -> bool {
        match self.owners.get_mut(&owner) {
            Some(record) => {
                record.position = position;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = OwnerId> + '_ {
        self.owners.keys().copied()
    }
}

impl OwnerSpatial for OwnerRegistry {
    fn position(&self, owner: OwnerId) -> Option<Position> {
        self.owners.get(&owner).map(|r| r.position)
    }

    fn approximate_extent(&self, owner: OwnerId) -> Option<f64> {
        self.owners.get(&owner).map(|r| r.extent)
    }
}
