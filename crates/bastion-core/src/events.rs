//! Signals exchanged between the sensor system, the engine, and listeners.

use serde::{Deserialize, Serialize};

use crate::enums::{DetectionCategory, TargetRole};
use crate::ids::{DetectorId, EntityHandle, OwnerId};
use crate::types::Position;

/// What a detector saw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedTarget {
    /// Host-world entity being tracked, if the sensor knows it.
    pub entity: Option<EntityHandle>,
    pub position: Position,
    /// Identifier used for role lookup (ship name, faction tag, ...).
    pub label: String,
    /// Role the sensor already knows; wins over every lookup.
    pub requested_role: Option<TargetRole>,
}

/// The target minions are aimed at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryTarget {
    pub entity: Option<EntityHandle>,
    pub position: Position,
    pub label: String,
    pub role: TargetRole,
}

/// Raw input from the sensor system, queued for the next tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SensorEvent {
    Engage {
        owner: OwnerId,
        detector: DetectorId,
        category: DetectionCategory,
        target: DetectedTarget,
    },
    Disengage {
        owner: OwnerId,
        detector: DetectorId,
        category: DetectionCategory,
    },
    Disable { owner: OwnerId },
}

/// Reference-counted engagement transitions produced by the state manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngagementSignal {
    Engaged {
        owner: OwnerId,
        detector: DetectorId,
        category: DetectionCategory,
        role: TargetRole,
        is_first_engagement: bool,
        active_detector_count: usize,
    },
    Disengaged {
        owner: OwnerId,
        detector: DetectorId,
        category: DetectionCategory,
        is_last_disengagement: bool,
        active_detector_count: usize,
    },
    Disabled {
        owner: OwnerId,
        active_detector_count: usize,
    },
}

/// One per successfully spawned minion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinionSpawned {
    pub owner: OwnerId,
    pub category: DetectionCategory,
    pub entity: EntityHandle,
    pub target: Option<EntityHandle>,
    pub target_label: String,
    pub target_role: TargetRole,
    pub owner_position: Position,
    pub spawn_position: Position,
    /// The minion's profile has a scripted entry phase and it began on spawn.
    pub entry_phase_started: bool,
}

impl EngagementSignal {
    pub fn owner(&self) -> OwnerId {
        match self {
            EngagementSignal::Engaged { owner, .. }
            | EngagementSignal::Disengaged { owner, .. }
            | EngagementSignal::Disabled { owner, .. } => *owner,
        }
    }
}

impl PrimaryTarget {
    pub fn from_detected(target: &DetectedTarget, role: TargetRole) -> Self {
        Self {
            entity: target.entity,
            position: target.position,
            label: target.label.clone(),
            role,
        }
    }
}
