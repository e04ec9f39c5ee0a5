#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::enums::*;
    use crate::error::ConfigError;
    use crate::events::EngagementSignal;
    use crate::ids::{DetectorId, OwnerId};
    use crate::types::Position;

    fn valid_entry() -> DefenseEntry {
        let mut entry = DefenseEntry::new("outpost");
        entry.pool = Some(PoolDescriptor::new("drones", 8));
        entry.default_wave = Some(WavePreset::new("trickle", 2, 3.0));
        entry
    }

    #[test]
    fn test_valid_entry_passes() {
        assert!(valid_entry().validate().is_ok());
    }

    #[test]
    fn test_missing_default_wave_is_error() {
        let mut entry = valid_entry();
        entry.default_wave = None;
        assert!(matches!(
            entry.validate(),
            Err(ConfigError::MissingDefaultWave { entry }) if entry == "outpost"
        ));
    }

    #[test]
    fn test_zero_batch_and_interval_rejected() {
        let mut entry = valid_entry();
        entry.default_wave = Some(WavePreset::new("empty", 0, 3.0));
        assert!(matches!(
            entry.validate(),
            Err(ConfigError::InvalidBatchSize { .. })
        ));

        entry.default_wave = Some(WavePreset::new("stalled", 2, 0.0));
        assert!(matches!(
            entry.validate(),
            Err(ConfigError::InvalidInterval { .. })
        ));

        entry.default_wave = Some(WavePreset::new("nan", 2, f64::NAN));
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_ring_inner_fraction_must_be_a_fraction() {
        let ring = |inner_fraction: f64| {
            let mut preset = WavePreset::new("ring", 2, 3.0);
            preset.spawn_pattern = Some(SpawnPattern::Ring { inner_fraction });
            preset
        };
        assert!(ring(0.0).validate().is_ok());
        assert!(ring(0.5).validate().is_ok());
        assert!(ring(1.0).validate().is_ok());
        for bad in [f64::NAN, f64::INFINITY, 1.5, -0.25] {
            assert!(matches!(
                ring(bad).validate(),
                Err(ConfigError::InvalidSpawnPattern { .. })
            ));
        }
    }

    #[test]
    fn test_duplicate_role_binding_rejected() {
        let mut entry = valid_entry();
        for _ in 0..2 {
            entry.bindings.push(RoleBinding {
                role: TargetRole::Player,
                minion: None,
                wave: None,
            });
        }
        assert!(matches!(
            entry.validate(),
            Err(ConfigError::DuplicateRoleBinding {
                role: TargetRole::Player,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_pool_descriptor_rejected() {
        let mut entry = valid_entry();
        entry.pool = Some(PoolDescriptor::new("drones", 0));
        assert!(matches!(
            entry.validate(),
            Err(ConfigError::InvalidPoolDescriptor { .. })
        ));
        assert!(PoolDescriptor::new("", 4).validate().is_err());
        assert!(PoolDescriptor::new("x", 4).with_prewarm(5).validate().is_err());
    }

    #[test]
    fn test_pool_sources_are_distinct_by_name() {
        let mut entry = valid_entry();
        entry.default_minion =
            Some(MinionProfile::new("grunt").with_pool(PoolDescriptor::new("drones", 8)));
        entry.bindings.push(RoleBinding {
            role: TargetRole::Player,
            minion: Some(MinionProfile::new("hunter").with_pool(PoolDescriptor::new("hunters", 4))),
            wave: None,
        });
        entry.bindings.push(RoleBinding {
            role: TargetRole::Hostile,
            minion: Some(MinionProfile::new("brute").with_pool(PoolDescriptor::new("hunters", 4))),
            wave: None,
        });

        let names: Vec<&str> = entry.pool_sources().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["drones", "hunters"]);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "selection": "Random",
            "entries": [{
                "name": "outpost",
                "pool": { "name": "drones", "capacity": 6, "prewarm": 2 },
                "default_wave": { "name": "trickle", "batch_size": 1, "interval_secs": 4.0 },
                "bindings": [{
                    "role": "Player",
                    "wave": {
                        "name": "swarm",
                        "batch_size": 3,
                        "interval_secs": 2.0,
                        "spawn_pattern": { "type": "Ring", "inner_fraction": 0.5 }
                    }
                }]
            }]
        }"#;
        let config = DefenseConfig::from_json(json).unwrap();
        assert_eq!(config.selection, SelectionPolicy::Random);
        let entry = &config.entries[0];
        assert_eq!(entry.vertical_offset, crate::constants::DEFAULT_VERTICAL_OFFSET);
        let swarm = entry.binding_for(TargetRole::Player).unwrap().wave.as_ref().unwrap();
        assert_eq!(swarm.batch_size, 3);
        assert_eq!(
            swarm.spawn_pattern,
            Some(SpawnPattern::Ring { inner_fraction: 0.5 })
        );
    }

    #[test]
    fn test_config_from_json_rejects_invalid() {
        let no_entries = r#"{ "entries": [] }"#;
        assert!(matches!(
            DefenseConfig::from_json(no_entries),
            Err(ConfigError::NoEntries)
        ));
        assert!(matches!(
            DefenseConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_signal_owner() {
        let signal = EngagementSignal::Disengaged {
            owner: OwnerId(7),
            detector: DetectorId(1),
            category: DetectionCategory::Orbit,
            is_last_disengagement: true,
            active_detector_count: 0,
        };
        assert_eq!(signal.owner(), OwnerId(7));
    }

    #[test]
    fn test_position_offset() {
        let origin = Position::new(10.0, 20.0, 0.0);
        let moved = origin.offset(glam::DVec2::new(3.0, 4.0), 2.0);
        assert_eq!(moved, Position::new(13.0, 24.0, 2.0));
        assert!((origin.horizontal_range_to(&moved) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_role_default_is_unknown() {
        assert_eq!(TargetRole::default(), TargetRole::Unknown);
        assert!(!TargetRole::Unknown.is_known());
        assert!(TargetRole::Player.is_known());
    }
}
