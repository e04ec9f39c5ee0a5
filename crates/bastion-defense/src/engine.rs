//! Defense engine: the host-facing entry point.
//!
//! `DefenseEngine` owns the owner registry and the orchestration service,
//! turns queued sensor events into engagement signals, and advances the
//! wave loops. Completely headless, enabling deterministic testing.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use bastion_core::config::{DefenseConfig, DefenseEntry};
use bastion_core::constants::TICK_RATE;
use bastion_core::enums::{DetectionCategory, MissingPresetPolicy, SelectionPolicy};
use bastion_core::events::{
    DetectedTarget, EngagementSignal, MinionSpawned, PrimaryTarget, SensorEvent,
};
use bastion_core::ids::{DetectorId, OwnerId};
use bastion_core::types::{Position, SimTime};
use bastion_strategy::strategy;
use bastion_strategy::DefenseStrategy;

use crate::error::{DefenseError, DefenseResult};
use crate::orchestration::{DefenseServices, OrchestrationService};
use crate::owners::OwnerRegistry;
use crate::pool::{HecsPool, PoolAllocator};
use crate::pool_runner::PoolRunner;
use crate::state_manager::StateManager;
use crate::wave_runner::{FallbackWave, WaveRunner};

/// Configuration for a new engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefenseSettings {
    /// RNG seed for determinism. Same seed = same spawn positions and picks.
    pub seed: u64,
    /// Fixed ticks per second used by `tick()`.
    pub tick_rate: u32,
    pub missing_preset: MissingPresetPolicy,
    pub fallback_wave: FallbackWave,
}

impl Default for DefenseSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            tick_rate: TICK_RATE,
            missing_preset: MissingPresetPolicy::default(),
            fallback_wave: FallbackWave::default(),
        }
    }
}

impl DefenseSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Seconds per fixed tick.
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_rate.max(1) as f64
    }
}

/// A failure the engine absorbed during a tick instead of aborting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    pub owner: OwnerId,
    pub message: String,
}

/// Everything that happened during one tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DefenseFrame {
    pub time: SimTime,
    pub signals: Vec<EngagementSignal>,
    pub spawned: Vec<MinionSpawned>,
    pub faults: Vec<Fault>,
}

pub struct DefenseEngine {
    owners: OwnerRegistry,
    orchestration: OrchestrationService,
    settings: DefenseSettings,
    time: SimTime,
    sensor_queue: VecDeque<SensorEvent>,
    /// Target each active detector reported, with its resolved role.
    detections: HashMap<(OwnerId, DetectorId), PrimaryTarget>,
    /// Detector whose target the owner's minions are aimed at.
    primary_detector: HashMap<OwnerId, DetectorId>,

    // --- Per-tick output ---
    signals: Vec<EngagementSignal>,
    spawned: Vec<MinionSpawned>,
    faults: Vec<Fault>,
}

impl DefenseEngine {
    /// Engine backed by the built-in hecs pool allocator.
    pub fn new(settings: DefenseSettings) -> Self {
        Self::with_allocator(settings, Some(Box::new(HecsPool::new())))
    }

    /// Engine with a caller-supplied allocator, or none at all.
    pub fn with_allocator(
        settings: DefenseSettings,
        allocator: Option<Box<dyn PoolAllocator>>,
    ) -> Self {
        let services = DefenseServices {
            state: StateManager::new(),
            pools: PoolRunner::new(allocator),
            waves: WaveRunner::new(settings.missing_preset, settings.fallback_wave),
        };
        Self {
            owners: OwnerRegistry::new(),
            orchestration: OrchestrationService::new(services, settings.seed),
            settings,
            time: SimTime::default(),
            sensor_queue: VecDeque::new(),
            detections: HashMap::new(),
            primary_detector: HashMap::new(),
            signals: Vec::new(),
            spawned: Vec::new(),
            faults: Vec::new(),
        }
    }

    // ---- Owner lifecycle ----

    pub fn create_owner(&mut self, position: Position, extent: f64) -> OwnerId {
        self.owners.create(position, extent)
    }

    /// Disable the owner, drop its configuration, and remove it.
    pub fn destroy_owner(&mut self, owner: OwnerId) -> bool {
        if !self.owners.contains(owner) {
            return false;
        }
        let active_detector_count = self.active_detector_count(owner);
        self.orchestration.forget_owner(owner);
        self.forget_detections(owner);
        self.owners.destroy(owner);
        self.signals.push(EngagementSignal::Disabled {
            owner,
            active_detector_count,
        });
        true
    }

    pub fn set_owner_position(&mut self, owner: OwnerId, position: Position) -> bool {
        self.owners.set_position(owner, position)
    }

    // ---- Configuration ----

    pub fn configure_entries(
        &mut self,
        owner: OwnerId,
        entries: Vec<DefenseEntry>,
        policy: SelectionPolicy,
    ) -> DefenseResult<()> {
        if !self.owners.contains(owner) {
            return Err(DefenseError::UnknownOwner { owner });
        }
        self.orchestration
            .configure_entries(owner, entries, policy)
            .map_err(|source| DefenseError::config(owner, source))
    }

    pub fn configure(&mut self, owner: OwnerId, config: DefenseConfig) -> DefenseResult<()> {
        self.configure_entries(owner, config.entries, config.selection)
    }

    pub fn bind_strategy(
        &mut self,
        owner: OwnerId,
        strategy: Arc<dyn DefenseStrategy>,
    ) -> DefenseResult<()> {
        if !self.owners.contains(owner) {
            return Err(DefenseError::UnknownOwner { owner });
        }
        self.orchestration.bind_strategy(owner, strategy);
        Ok(())
    }

    // ---- Sensor input ----

    /// Queue a sensor event for processing at the next tick boundary.
    pub fn queue_sensor_event(&mut self, event: SensorEvent) {
        self.sensor_queue.push_back(event);
    }

    pub fn queue_sensor_events(&mut self, events: impl IntoIterator<Item = SensorEvent>) {
        self.sensor_queue.extend(events);
    }

    // ---- Stepping ----

    /// Advance by one fixed tick.
    pub fn tick(&mut self) -> DefenseFrame {
        self.step(self.settings.dt())
    }

    /// Process queued sensor events, then advance wave loops by `dt` seconds.
    pub fn step(&mut self, dt: f64) -> DefenseFrame {
        self.process_sensor_events();
        self.orchestration.tick(dt, &self.owners, &mut self.spawned);
        self.time.advance(dt);
        self.take_frame()
    }

    fn take_frame(&mut self) -> DefenseFrame {
        DefenseFrame {
            time: self.time,
            signals: std::mem::take(&mut self.signals),
            spawned: std::mem::take(&mut self.spawned),
            faults: std::mem::take(&mut self.faults),
        }
    }

    /// Disable every owner and drop all engagement state and pending input.
    pub fn shutdown(&mut self) -> DefenseFrame {
        let ids: Vec<OwnerId> = self.owners.ids().collect();
        for owner in ids {
            self.disable(owner);
        }
        self.orchestration.state_mut().clear_all();
        self.sensor_queue.clear();
        self.take_frame()
    }

    // ---- Accessors ----

    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn settings(&self) -> &DefenseSettings {
        &self.settings
    }

    pub fn owners(&self) -> &OwnerRegistry {
        &self.owners
    }

    pub fn orchestration(&self) -> &OrchestrationService {
        &self.orchestration
    }

    pub fn orchestration_mut(&mut self) -> &mut OrchestrationService {
        &mut self.orchestration
    }

    pub fn active_detector_count(&self, owner: OwnerId) -> usize {
        self.orchestration.state().active_detector_count(owner)
    }

    // ---- Event protocol ----

    fn process_sensor_events(&mut self) {
        while let Some(event) = self.sensor_queue.pop_front() {
            self.handle_sensor_event(event);
        }
    }

    fn handle_sensor_event(&mut self, event: SensorEvent) {
        match event {
            SensorEvent::Engage {
                owner,
                detector,
                category,
                target,
            } => self.engage(owner, detector, category, target),
            SensorEvent::Disengage {
                owner,
                detector,
                category,
            } => self.disengage(owner, detector, category),
            SensorEvent::Disable { owner } => self.disable(owner),
        }
    }

    fn engage(
        &mut self,
        owner: OwnerId,
        detector: DetectorId,
        category: DetectionCategory,
        target: DetectedTarget,
    ) {
        if !self.owners.contains(owner) {
            warn!(owner = %owner, detector = %detector, "engagement for unknown owner ignored");
            return;
        }
        let Some(transition) = self
            .orchestration
            .state_mut()
            .register_engagement(owner, category, detector)
        else {
            return;
        };

        let bound = self.orchestration.strategy(owner);
        let role = strategy::resolve_role(bound.as_deref(), owner, &target);
        let primary = PrimaryTarget::from_detected(&target, role);
        self.detections.insert((owner, detector), primary.clone());
        self.signals.push(EngagementSignal::Engaged {
            owner,
            detector,
            category,
            role,
            is_first_engagement: transition.is_first,
            active_detector_count: transition.active_detector_count,
        });

        if transition.is_first {
            self.primary_detector.insert(owner, detector);
            let result = self.orchestration.handle_engaged(
                owner,
                category,
                role,
                primary,
                &self.owners,
                &mut self.spawned,
            );
            if let Err(err) = result {
                self.fault(owner, err);
            }
        }
    }

    fn disengage(&mut self, owner: OwnerId, detector: DetectorId, category: DetectionCategory) {
        let Some(transition) = self
            .orchestration
            .state_mut()
            .register_disengagement(owner, category, detector)
        else {
            return;
        };
        self.detections.remove(&(owner, detector));
        self.signals.push(EngagementSignal::Disengaged {
            owner,
            detector,
            category: transition.category,
            is_last_disengagement: transition.is_last,
            active_detector_count: transition.active_detector_count,
        });

        if transition.is_last {
            self.primary_detector.remove(&owner);
            self.orchestration.handle_disengaged(owner);
        } else if self.primary_detector.get(&owner) == Some(&detector) {
            self.retarget(owner);
        }
    }

    fn disable(&mut self, owner: OwnerId) {
        if !self.owners.contains(owner) {
            warn!(owner = %owner, "disable for unknown owner ignored");
            return;
        }
        let active_detector_count = self.active_detector_count(owner);
        self.orchestration.handle_disabled(owner);
        self.forget_detections(owner);
        self.signals.push(EngagementSignal::Disabled {
            owner,
            active_detector_count,
        });
    }

    fn forget_detections(&mut self, owner: OwnerId) {
        self.detections.retain(|(o, _), _| *o != owner);
        self.primary_detector.remove(&owner);
    }

    /// Aim at a remaining detector's target after the primary one left.
    fn retarget(&mut self, owner: OwnerId) {
        let next = self.orchestration.state().state(owner).and_then(|state| {
            state
                .detectors()
                .find_map(|d| self.detections.get(&(owner, d)).map(|t| (d, t.clone())))
        });
        match next {
            Some((detector, target)) => {
                self.primary_detector.insert(owner, detector);
                self.orchestration.configure_primary_target(owner, target);
            }
            None => {
                self.primary_detector.remove(&owner);
            }
        }
    }

    fn fault(&mut self, owner: OwnerId, err: DefenseError) {
        error!(owner = %owner, error = %err, "engagement could not start waves");
        self.faults.push(Fault {
            owner,
            message: err.to_string(),
        });
    }
}
