//! Per-owner engagement state.
//!
//! Converts raw engage/disengage calls into reference-counted
//! first-engagement / last-disengagement transitions. A detector is counted
//! at most once per owner and belongs to exactly one category at a time.
//! An owner's entry exists only while it has at least one active detector.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use bastion_core::enums::DetectionCategory;
use bastion_core::ids::{DetectorId, OwnerId};

#[derive(Debug, Clone)]
pub struct EngagementState {
    owner: OwnerId,
    detectors: BTreeMap<DetectorId, DetectionCategory>,
    by_category: BTreeMap<DetectionCategory, BTreeSet<DetectorId>>,
    /// Category of the first engagement; kept until the state is cleared.
    primary_category: DetectionCategory,
}

/// Outcome of a registration that changed the active detector set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngagementTransition {
    pub owner: OwnerId,
    pub detector: DetectorId,
    pub category: DetectionCategory,
    pub is_first: bool,
    pub is_last: bool,
    pub active_detector_count: usize,
    pub primary_category: DetectionCategory,
}

#[derive(Debug, Default)]
pub struct StateManager {
    states: BTreeMap<OwnerId, EngagementState>,
}

impl EngagementState {
    fn new(owner: OwnerId, primary_category: DetectionCategory) -> Self {
        Self {
            owner,
            detectors: BTreeMap::new(),
            by_category: BTreeMap::new(),
            primary_category,
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn active_detector_count(&self) -> usize {
        self.detectors.len()
    }

    pub fn primary_category(&self) -> DetectionCategory {
        self.primary_category
    }

    pub fn contains(&self, detector: DetectorId) -> bool {
        self.detectors.contains_key(&detector)
    }

    pub fn category_of(&self, detector: DetectorId) -> Option<DetectionCategory> {
        self.detectors.get(&detector).copied()
    }

    pub fn detectors(&self) -> impl Iterator<Item = DetectorId> + '_ {
        self.detectors.keys().copied()
    }

    /// Detectors currently filed under `category`.
    pub fn detectors_in(&self, category: DetectionCategory) -> impl Iterator<Item = DetectorId> + '_ {
        self.by_category.get(&category).into_iter().flatten().copied()
    }

    pub fn is_category_active(&self, category: DetectionCategory) -> bool {
        self.by_category.get(&category).is_some_and(|s| !s.is_empty())
    }

    fn file(&mut self, detector: DetectorId, category: DetectionCategory) {
        self.detectors.insert(detector, category);
        self.by_category.entry(category).or_default().insert(detector);
    }

    fn unfile(&mut self, detector: DetectorId) -> Option<DetectionCategory> {
        let category = self.detectors.remove(&detector)?;
        if let Some(set) = self.by_category.get_mut(&category) {
            set.remove(&detector);
            if set.is_empty() {
                self.by_category.remove(&category);
            }
        }
        Some(category)
    }
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `detector` to the owner's active set.
    ///
    /// Returns `None` when the detector was already active (the call is a
    /// no-op for counting; a category change is still recorded).
    pub fn register_engagement(
        &mut self,
        owner: OwnerId,
        category: DetectionCategory,
        detector: DetectorId,
    ) -> Option<EngagementTransition> {
        let state = self
            .states
            .entry(owner)
            .or_insert_with(|| EngagementState::new(owner, category));

        if let Some(previous) = state.category_of(detector) {
            if previous != category {
                state.unfile(detector);
                state.file(detector, category);
                debug!(owner = %owner, detector = %detector, from = ?previous, to = ?category, "detector moved category");
            } else {
                debug!(owner = %owner, detector = %detector, "duplicate engagement ignored");
            }
            return None;
        }

        state.file(detector, category);
        let count = state.active_detector_count();
        let is_first = count == 1;
        if is_first {
            info!(owner = %owner, category = ?category, "first engagement");
        }
        Some(EngagementTransition {
            owner,
            detector,
            category,
            is_first,
            is_last: false,
            active_detector_count: count,
            primary_category: state.primary_category,
        })
    }

    /// Remove `detector` from the owner's active set.
    ///
    /// Returns `None` when the detector was not active. When the last
    /// detector leaves, the owner's state is dropped from the table.
    pub fn register_disengagement(
        &mut self,
        owner: OwnerId,
        category: DetectionCategory,
        detector: DetectorId,
    ) -> Option<EngagementTransition> {
        let Some(state) = self.states.get_mut(&owner) else {
            debug!(owner = %owner, detector = %detector, "disengage for unengaged owner ignored");
            return None;
        };
        let Some(filed_under) = state.unfile(detector) else {
            debug!(owner = %owner, detector = %detector, "disengage for unknown detector ignored");
            return None;
        };
        if filed_under != category {
            debug!(owner = %owner, detector = %detector, reported = ?category, filed = ?filed_under, "disengage category mismatch");
        }

        let count = state.active_detector_count();
        let primary_category = state.primary_category;
        let is_last = count == 0;
        if is_last {
            self.states.remove(&owner);
            info!(owner = %owner, "last disengagement");
        }
        Some(EngagementTransition {
            owner,
            detector,
            category: filed_under,
            is_first: false,
            is_last,
            active_detector_count: count,
            primary_category,
        })
    }

    /// Drop the owner's state unconditionally.
    pub fn clear_owner(&mut self, owner: OwnerId) -> Option<EngagementState> {
        self.states.remove(&owner)
    }

    /// Drop every owner's state. Returns how many owners were engaged.
    pub fn clear_all(&mut self) -> usize {
        let cleared = self.states.len();
        self.states.clear();
        cleared
    }

    pub fn state(&self, owner: OwnerId) -> Option<&EngagementState> {
        self.states.get(&owner)
    }

    pub fn active_detector_count(&self, owner: OwnerId) -> usize {
        self.states.get(&owner).map_or(0, EngagementState::active_detector_count)
    }

    pub fn is_engaged(&self, owner: OwnerId) -> bool {
        self.states.contains_key(&owner)
    }

    pub fn engaged_owners(&self) -> impl Iterator<Item = OwnerId> + '_ {
        self.states.keys().copied()
    }
}
