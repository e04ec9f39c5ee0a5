#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use bastion_core::config::MinionProfile;
    use bastion_core::enums::{DetectionCategory, TargetRole};
    use bastion_core::error::ConfigError;
    use bastion_core::events::DetectedTarget;
    use bastion_core::ids::OwnerId;
    use bastion_core::types::Position;

    use crate::profiles::select_minion_profile;
    use crate::roles::{resolve_role, RoleSource, SharedRoleTable};
    use crate::strategy::{self, DefenseStrategy, RoleTableStrategy};

    fn target(label: &str, requested: Option<TargetRole>) -> DetectedTarget {
        DetectedTarget {
            entity: None,
            position: Position::default(),
            label: label.to_string(),
            requested_role: requested,
        }
    }

    // ---- Role resolution ----

    #[test]
    fn test_requested_role_wins() {
        let local = HashMap::from([("vex".to_string(), TargetRole::Hostile)]);
        let (role, source) = resolve_role(
            "vex",
            Some(TargetRole::Player),
            &local,
            None,
            TargetRole::Neutral,
        );
        assert_eq!(role, TargetRole::Player);
        assert_eq!(source, RoleSource::Requested);
    }

    #[test]
    fn test_priority_local_then_shared_then_fallback() {
        let local = HashMap::from([("vex".to_string(), TargetRole::Hostile)]);
        let shared: SharedRoleTable = [("vex", TargetRole::Neutral), ("kestrel", TargetRole::Player)]
            .into_iter()
            .collect();

        let (role, source) = resolve_role("vex", None, &local, Some(&shared), TargetRole::Neutral);
        assert_eq!((role, source), (TargetRole::Hostile, RoleSource::Local));

        let (role, source) =
            resolve_role("kestrel", None, &local, Some(&shared), TargetRole::Neutral);
        assert_eq!((role, source), (TargetRole::Player, RoleSource::Shared));

        let (role, source) =
            resolve_role("stranger", None, &local, Some(&shared), TargetRole::Neutral);
        assert_eq!((role, source), (TargetRole::Neutral, RoleSource::Fallback));
    }

    #[test]
    fn test_unmatched_resolves_to_unknown() {
        let (role, source) = resolve_role(
            "stranger",
            Some(TargetRole::Unknown),
            &HashMap::new(),
            None,
            TargetRole::Unknown,
        );
        assert_eq!(role, TargetRole::Unknown);
        assert_eq!(source, RoleSource::Unmatched);
    }

    #[test]
    fn test_role_table_strategy_uses_shared_table() {
        let table: SharedRoleTable = [("raider", TargetRole::Hostile)].into_iter().collect();
        let strategy = RoleTableStrategy::new()
            .bind("kestrel", TargetRole::Player)
            .with_shared_table(Arc::new(table))
            .with_fallback(TargetRole::Neutral);

        assert_eq!(strategy.resolve_target_role("kestrel", None), TargetRole::Player);
        assert_eq!(strategy.resolve_target_role("raider", None), TargetRole::Hostile);
        assert_eq!(strategy.resolve_target_role("barge", None), TargetRole::Neutral);
        assert_eq!(
            strategy.resolve_target_role("raider", Some(TargetRole::Player)),
            TargetRole::Player
        );
    }

    #[test]
    fn test_shared_table_roundtrip_json() {
        let mut table = SharedRoleTable::new();
        table.insert("raider", TargetRole::Hostile);
        let json = serde_json::to_string(&table).unwrap();
        let back: SharedRoleTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 1);
    }

    // ---- Profile selection ----

    #[test]
    fn test_wave_profile_preferred_over_minion_profile() {
        let wave = MinionProfile::new("elite");
        let minion = MinionProfile::new("grunt");
        let chosen = select_minion_profile(TargetRole::Player, Some(&wave), Some(&minion)).unwrap();
        assert_eq!(chosen.name, "elite");

        let chosen = select_minion_profile(TargetRole::Player, None, Some(&minion)).unwrap();
        assert_eq!(chosen.name, "grunt");
    }

    #[test]
    fn test_missing_profiles_is_config_error() {
        let result = select_minion_profile(TargetRole::Hostile, None, None);
        assert!(matches!(
            result,
            Err(ConfigError::MissingMinionProfile {
                role: TargetRole::Hostile
            })
        ));
    }

    // ---- Guarded boundary ----

    #[derive(Debug, Default)]
    struct PanickingStrategy {
        engaged_calls: AtomicU32,
    }

    impl DefenseStrategy for PanickingStrategy {
        fn resolve_target_role(&self, _identifier: &str, _requested: Option<TargetRole>) -> TargetRole {
            panic!("role table corrupted");
        }

        fn select_minion_profile(
            &self,
            _role: TargetRole,
            _wave_profile: Option<&MinionProfile>,
            _minion_profile: Option<&MinionProfile>,
        ) -> Result<MinionProfile, ConfigError> {
            panic!("profile lookup failed");
        }

        fn on_engaged(&self, _owner: OwnerId, _category: DetectionCategory) {
            self.engaged_calls.fetch_add(1, Ordering::SeqCst);
            panic!("listener exploded");
        }
    }

    #[test]
    fn test_panicking_strategy_is_contained() {
        let panicky = PanickingStrategy::default();
        let owner = OwnerId(1);

        let role = strategy::resolve_role(
            Some(&panicky),
            owner,
            &target("raider", Some(TargetRole::Hostile)),
        );
        assert_eq!(role, TargetRole::Unknown);

        let minion = MinionProfile::new("grunt");
        let profile =
            strategy::select_profile(Some(&panicky), owner, TargetRole::Hostile, None, Some(&minion))
                .unwrap();
        assert_eq!(profile.name, "grunt");

        strategy::notify_engaged(&panicky, owner, DetectionCategory::Orbit);
        strategy::notify_engaged(&panicky, owner, DetectionCategory::Orbit);
        assert_eq!(panicky.engaged_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_resolve_without_strategy_uses_requested() {
        let owner = OwnerId(3);
        assert_eq!(
            strategy::resolve_role(None, owner, &target("kestrel", Some(TargetRole::Player))),
            TargetRole::Player
        );
        assert_eq!(
            strategy::resolve_role(None, owner, &target("kestrel", None)),
            TargetRole::Unknown
        );
    }
}
