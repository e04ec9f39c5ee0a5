//! End-to-end engagement scenarios driven through `DefenseEngine`.

use std::sync::Arc;

use bastion_core::config::DefenseConfig;
use bastion_core::enums::{DetectionCategory, MissingPresetPolicy, TargetRole};
use bastion_core::events::{DetectedTarget, EngagementSignal, SensorEvent};
use bastion_core::ids::{DetectorId, OwnerId};
use bastion_core::types::Position;
use bastion_defense::context::ContextKey;
use bastion_defense::{DefenseEngine, DefenseFrame, DefenseSettings};
use bastion_strategy::RoleTableStrategy;

const CATEGORY: DetectionCategory = DetectionCategory::Orbit;

const CONFIG: &str = r#"{
    "selection": "Sequential",
    "entries": [{
        "name": "home-defense",
        "pool": { "name": "drones", "capacity": 64, "prewarm": 8 },
        "default_minion": { "name": "drone" },
        "default_wave": { "name": "patrol", "batch_size": 1, "interval_secs": 5.0 },
        "bindings": [{
            "role": "Player",
            "minion": { "name": "hunter", "entry_phase_secs": 1.5 },
            "wave": { "name": "player-rush", "batch_size": 3, "interval_secs": 2.0 }
        }],
        "spawn_radius_offset": 10.0
    }]
}"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn engine_with(settings: DefenseSettings) -> (DefenseEngine, OwnerId) {
    init_tracing();
    let mut engine = DefenseEngine::new(settings);
    let owner = engine.create_owner(Position::new(0.0, 0.0, 0.0), 40.0);
    engine
        .configure(owner, DefenseConfig::from_json(CONFIG).unwrap())
        .unwrap();
    (engine, owner)
}

fn engine() -> (DefenseEngine, OwnerId) {
    engine_with(DefenseSettings::default())
}

fn detected(label: &str, role: Option<TargetRole>) -> DetectedTarget {
    DetectedTarget {
        entity: None,
        position: Position::new(900.0, 0.0, 120.0),
        label: label.to_string(),
        requested_role: role,
    }
}

fn engage(owner: OwnerId, detector: u32, target: DetectedTarget) -> SensorEvent {
    SensorEvent::Engage {
        owner,
        detector: DetectorId(detector),
        category: CATEGORY,
        target,
    }
}

fn disengage(owner: OwnerId, detector: u32) -> SensorEvent {
    SensorEvent::Disengage {
        owner,
        detector: DetectorId(detector),
        category: CATEGORY,
    }
}

/// Step `n` half-second frames and return the total minions spawned.
fn run(engine: &mut DefenseEngine, n: usize) -> usize {
    (0..n).map(|_| engine.step(0.5).spawned.len()).sum()
}

// ---- Wave cadence ----

#[test]
fn test_player_engagement_spawns_on_cadence_until_disengaged() {
    let (mut engine, owner) = engine();

    engine.queue_sensor_event(engage(owner, 1, detected("red-5", Some(TargetRole::Player))));
    let frame = engine.step(0.5);

    assert_eq!(frame.spawned.len(), 3, "first batch spawns immediately");
    assert!(matches!(
        frame.signals.as_slice(),
        [EngagementSignal::Engaged {
            is_first_engagement: true,
            active_detector_count: 1,
            role: TargetRole::Player,
            ..
        }]
    ));
    for minion in &frame.spawned {
        assert_eq!(minion.target_role, TargetRole::Player);
        assert!(minion.entry_phase_started);
        // Extent 40 plus offset 10.
        assert!(minion.owner_position.horizontal_range_to(&minion.spawn_position) <= 50.0 + 1e-9);
    }

    // Three more half-second frames complete the 2s interval.
    assert_eq!(run(&mut engine, 2), 0);
    assert_eq!(run(&mut engine, 1), 3);

    engine.queue_sensor_event(disengage(owner, 1));
    let frame = engine.step(0.5);
    assert!(frame.spawned.is_empty());
    assert!(matches!(
        frame.signals.as_slice(),
        [EngagementSignal::Disengaged {
            is_last_disengagement: true,
            active_detector_count: 0,
            ..
        }]
    ));
    assert_eq!(run(&mut engine, 20), 0);
    assert!(!engine.orchestration().waves().is_running(owner));
}

#[test]
fn test_unknown_role_uses_default_wave() {
    let (mut engine, owner) = engine();

    engine.queue_sensor_event(engage(owner, 1, detected("freighter", None)));
    let frame = engine.step(0.5);

    assert_eq!(frame.spawned.len(), 1);
    assert_eq!(frame.spawned[0].target_role, TargetRole::Unknown);
    assert!(!frame.spawned[0].entry_phase_started);
    assert_eq!(run(&mut engine, 9), 1);
}

#[test]
fn test_fixed_tick_advances_time() {
    let (mut engine, _) = engine();
    let dt = engine.settings().dt();
    for _ in 0..30 {
        engine.tick();
    }
    assert_eq!(engine.time().tick, 30);
    assert!((engine.time().elapsed_secs - 30.0 * dt).abs() < 1e-9);
}

// ---- Reference counting ----

#[test]
fn test_waves_run_while_any_detector_engaged() {
    let (mut engine, owner) = engine();
    engine.queue_sensor_events([
        engage(owner, 1, detected("red-5", Some(TargetRole::Player))),
        engage(owner, 2, detected("red-5", Some(TargetRole::Player))),
        engage(owner, 3, detected("red-5", Some(TargetRole::Player))),
        // Duplicate report from a detector that is already engaged.
        engage(owner, 2, detected("red-5", Some(TargetRole::Player))),
    ]);
    let frame = engine.step(0.5);

    assert_eq!(frame.signals.len(), 3);
    assert_eq!(frame.spawned.len(), 3, "only the first engagement starts waves");
    assert_eq!(engine.active_detector_count(owner), 3);

    engine.queue_sensor_events([disengage(owner, 1), disengage(owner, 2), disengage(owner, 9)]);
    let frame = engine.step(0.5);
    assert_eq!(frame.signals.len(), 2);
    assert_eq!(engine.active_detector_count(owner), 1);
    assert!(engine.orchestration().waves().is_running(owner));

    engine.queue_sensor_event(disengage(owner, 3));
    engine.step(0.5);
    assert_eq!(engine.active_detector_count(owner), 0);
    assert!(!engine.orchestration().waves().is_running(owner));
}

#[test]
fn test_disable_tears_down_owner() {
    let (mut engine, owner) = engine();
    engine.queue_sensor_events((1..=3).map(|d| engage(owner, d, detected("red-5", Some(TargetRole::Player)))));
    engine.step(0.5);
    assert_eq!(engine.orchestration().resolution_count(), 1);
    let pool = engine
        .orchestration()
        .pools()
        .handle_for(owner, "drones")
        .unwrap();
    assert_eq!(engine.orchestration().pools().live_count(pool), 3);

    engine.queue_sensor_event(SensorEvent::Disable { owner });
    let frame = engine.step(0.5);

    assert!(matches!(
        frame.signals.as_slice(),
        [EngagementSignal::Disabled {
            active_detector_count: 3,
            ..
        }]
    ));
    assert!(frame.spawned.is_empty());
    assert_eq!(engine.active_detector_count(owner), 0);
    assert!(!engine.orchestration().waves().is_running(owner));
    assert!(!engine.orchestration().pools().is_configured(owner));
    assert_eq!(engine.orchestration().pools().live_count(pool), 0);
    let key = ContextKey {
        owner,
        category: CATEGORY,
        role: TargetRole::Player,
    };
    assert!(engine.orchestration().cached_context(&key).is_none());

    // A new engagement after re-enable resolves from scratch.
    engine.queue_sensor_event(engage(owner, 4, detected("red-5", Some(TargetRole::Player))));
    let frame = engine.step(0.5);
    assert_eq!(frame.spawned.len(), 3);
    assert_eq!(engine.orchestration().resolution_count(), 2);
}

#[test]
fn test_destroy_owner_acts_as_disable() {
    let (mut engine, owner) = engine();
    engine.queue_sensor_event(engage(owner, 1, detected("red-5", Some(TargetRole::Player))));
    engine.step(0.5);

    assert!(engine.destroy_owner(owner));
    assert!(!engine.destroy_owner(owner));
    let frame = engine.step(0.5);

    assert!(matches!(
        frame.signals.as_slice(),
        [EngagementSignal::Disabled { .. }]
    ));
    assert!(!engine.orchestration().waves().is_running(owner));
    assert!(engine.owners().is_empty());
}

#[test]
fn test_shutdown_disables_every_owner() {
    let (mut engine, first) = engine();
    let second = engine.create_owner(Position::new(1000.0, 0.0, 0.0), 40.0);
    engine
        .configure(second, DefenseConfig::from_json(CONFIG).unwrap())
        .unwrap();
    engine.queue_sensor_events([
        engage(first, 1, detected("red-5", Some(TargetRole::Player))),
        engage(second, 1, detected("red-5", None)),
    ]);
    engine.step(0.5);
    engine.queue_sensor_event(disengage(first, 1));

    let frame = engine.shutdown();

    assert_eq!(frame.signals.len(), 2);
    assert!(frame
        .signals
        .iter()
        .all(|s| matches!(s, EngagementSignal::Disabled { .. })));
    assert_eq!(engine.orchestration().waves().active_timer_count(), 0);
    assert_eq!(engine.orchestration().state().engaged_owners().count(), 0);
    assert!(engine.step(0.5).signals.is_empty(), "pending input is dropped");
}

// ---- Targeting and strategy ----

#[test]
fn test_primary_target_moves_to_remaining_detector() {
    let (mut engine, owner) = engine();
    engine.queue_sensor_events([
        engage(owner, 1, detected("alpha", Some(TargetRole::Player))),
        engage(owner, 2, detected("bravo", Some(TargetRole::Player))),
    ]);
    let frame = engine.step(0.5);
    assert!(frame.spawned.iter().all(|m| m.target_label == "alpha"));

    engine.queue_sensor_event(disengage(owner, 1));
    let spawned: Vec<_> = (0..4).flat_map(|_| engine.step(0.5).spawned).collect();

    assert_eq!(spawned.len(), 3);
    assert!(spawned.iter().all(|m| m.target_label == "bravo"));
}

#[test]
fn test_strategy_resolves_role_from_label() {
    let (mut engine, owner) = engine();
    let strategy = RoleTableStrategy::new()
        .bind("red-5", TargetRole::Player)
        .with_fallback(TargetRole::Hostile);
    engine.bind_strategy(owner, Arc::new(strategy)).unwrap();

    engine.queue_sensor_events([
        engage(owner, 1, detected("red-5", None)),
        engage(owner, 2, detected("unknown-hull", None)),
    ]);
    let frame = engine.step(0.5);

    let roles: Vec<TargetRole> = frame
        .signals
        .iter()
        .filter_map(|s| match s {
            EngagementSignal::Engaged { role, .. } => Some(*role),
            _ => None,
        })
        .collect();
    assert_eq!(roles, [TargetRole::Player, TargetRole::Hostile]);
    assert_eq!(frame.spawned.len(), 3);
}

// ---- Failures ----

#[test]
fn test_unconfigured_owner_records_fault() {
    init_tracing();
    let mut engine = DefenseEngine::new(DefenseSettings::default());
    let owner = engine.create_owner(Position::default(), 10.0);

    engine.queue_sensor_event(engage(owner, 1, detected("red-5", Some(TargetRole::Player))));
    let frame = engine.step(0.5);

    assert_eq!(frame.faults.len(), 1);
    assert_eq!(frame.faults[0].owner, owner);
    // Bookkeeping still proceeds.
    assert_eq!(frame.signals.len(), 1);
    assert_eq!(engine.active_detector_count(owner), 1);
    assert!(!engine.orchestration().waves().is_running(owner));
}

#[test]
fn test_degrade_policy_runs_fallback_wave() {
    init_tracing();
    let settings = DefenseSettings::from_json(
        r#"{ "missing_preset": "Degrade", "fallback_wave": { "batch_size": 2, "interval_secs": 1.0 } }"#,
    )
    .unwrap();
    assert_eq!(settings.seed, DefenseSettings::default().seed);
    let mut engine = DefenseEngine::new(settings);
    let owner = engine.create_owner(Position::default(), 10.0);

    engine.queue_sensor_event(engage(owner, 1, detected("red-5", None)));
    let frame = engine.step(0.5);

    assert!(frame.faults.is_empty());
    assert!(engine.orchestration().waves().is_running(owner));
    let context = engine
        .orchestration()
        .waves()
        .running_context(owner)
        .unwrap();
    assert_eq!(context.usable_wave().map(|w| w.batch_size), Some(2));
}

#[test]
fn test_configure_unknown_owner_fails() {
    init_tracing();
    let mut engine = DefenseEngine::new(DefenseSettings::default());
    let config = DefenseConfig::from_json(CONFIG).unwrap();
    assert!(engine.configure(OwnerId(77), config).is_err());
}

#[test]
fn test_events_for_unknown_owner_are_ignored() {
    let (mut engine, _) = engine();
    engine.queue_sensor_event(engage(OwnerId(77), 1, detected("red-5", None)));
    let frame = engine.step(0.5);
    assert!(frame.signals.is_empty());
    assert!(frame.spawned.is_empty());

    engine.queue_sensor_event(SensorEvent::Disable { owner: OwnerId(77) });
    let frame = engine.step(0.5);
    assert!(frame.signals.is_empty());
}

// ---- Determinism ----

fn scripted_run(seed: u64) -> Vec<String> {
    let (mut engine, owner) = engine_with(DefenseSettings {
        seed,
        missing_preset: MissingPresetPolicy::Fail,
        ..Default::default()
    });
    engine.queue_sensor_event(engage(owner, 1, detected("red-5", Some(TargetRole::Player))));
    (0..12)
        .map(|_| {
            let frame: DefenseFrame = engine.step(0.5);
            serde_json::to_string(&frame).unwrap()
        })
        .collect()
}

#[test]
fn test_determinism_same_seed() {
    assert_eq!(scripted_run(12345), scripted_run(12345));
}

#[test]
fn test_determinism_different_seeds() {
    assert_ne!(scripted_run(111), scripted_run(222));
}
