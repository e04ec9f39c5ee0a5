//! The strategy capability bound to an owner, and the guarded call boundary.
//!
//! Strategies are resolved once when an owner is configured and held by
//! reference afterwards. Every call into a strategy from the engine goes
//! through the `guarded` helpers here: a panicking strategy is logged and
//! replaced by a safe default so orchestration state stays consistent.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error};

use bastion_core::config::MinionProfile;
use bastion_core::enums::{DetectionCategory, TargetRole};
use bastion_core::error::ConfigError;
use bastion_core::events::DetectedTarget;
use bastion_core::ids::OwnerId;

use crate::profiles;
use crate::roles::{self, RoleLookup, RoleSource};

/// Per-owner policy for role resolution and minion profile selection.
pub trait DefenseStrategy: fmt::Debug + Send + Sync {
    /// Role an incoming threat is treated as.
    fn resolve_target_role(&self, identifier: &str, requested: Option<TargetRole>) -> TargetRole;

    /// Profile a spawned minion uses. Defaults to wave-over-minion precedence.
    fn select_minion_profile(
        &self,
        role: TargetRole,
        wave_profile: Option<&MinionProfile>,
        minion_profile: Option<&MinionProfile>,
    ) -> Result<MinionProfile, ConfigError> {
        profiles::select_minion_profile(role, wave_profile, minion_profile)
    }

    /// Called after every wave batch while the owner is engaged.
    fn on_engaged(&self, _owner: OwnerId, _category: DetectionCategory) {}

    /// Called once when the owner's waves stop.
    fn on_disengaged(&self, _owner: OwnerId, _category: DetectionCategory) {}
}

/// Strategy backed by owner-local bindings, an optional shared table,
/// and a fallback role.
#[derive(Debug, Clone, Default)]
pub struct RoleTableStrategy {
    bindings: HashMap<String, TargetRole>,
    shared: Option<Arc<dyn RoleLookup>>,
    fallback: TargetRole,
}

impl RoleTableStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, identifier: impl Into<String>, role: TargetRole) -> Self {
        self.bindings.insert(identifier.into(), role);
        self
    }

    pub fn with_shared_table(mut self, table: Arc<dyn RoleLookup>) -> Self {
        self.shared = Some(table);
        self
    }

    pub fn with_fallback(mut self, role: TargetRole) -> Self {
        self.fallback = role;
        self
    }

    /// Resolve and report which source matched.
    pub fn resolve_with_source(
        &self,
        identifier: &str,
        requested: Option<TargetRole>,
    ) -> (TargetRole, RoleSource) {
        roles::resolve_role(
            identifier,
            requested,
            &self.bindings,
            self.shared.as_deref(),
            self.fallback,
        )
    }
}

impl DefenseStrategy for RoleTableStrategy {
    fn resolve_target_role(&self, identifier: &str, requested: Option<TargetRole>) -> TargetRole {
        let (role, source) = self.resolve_with_source(identifier, requested);
        debug!(identifier, ?role, ?source, "resolved target role");
        role
    }
}

/// Run a strategy hook, absorbing any panic it raises.
pub fn guarded<T>(owner: OwnerId, hook: &'static str, call: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(value) => Some(value),
        Err(payload) => {
            error!(
                owner = %owner,
                hook,
                reason = panic_message(payload.as_ref()),
                "strategy hook panicked; ignoring"
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Role for a detected target. Without a strategy the requested role is
/// used as-is; anything unresolvable ends as `Unknown`.
pub fn resolve_role(
    strategy: Option<&dyn DefenseStrategy>,
    owner: OwnerId,
    target: &DetectedTarget,
) -> TargetRole {
    match strategy {
        Some(strategy) => guarded(owner, "resolve_target_role", || {
            strategy.resolve_target_role(&target.label, target.requested_role)
        })
        .unwrap_or_default(),
        None => target.requested_role.unwrap_or_default(),
    }
}

/// Minion profile for `role`, via the strategy when one is bound.
pub fn select_profile(
    strategy: Option<&dyn DefenseStrategy>,
    owner: OwnerId,
    role: TargetRole,
    wave_profile: Option<&MinionProfile>,
    minion_profile: Option<&MinionProfile>,
) -> Result<MinionProfile, ConfigError> {
    let Some(strategy) = strategy else {
        return profiles::select_minion_profile(role, wave_profile, minion_profile);
    };
    guarded(owner, "select_minion_profile", || {
        strategy.select_minion_profile(role, wave_profile, minion_profile)
    })
    // A panicking strategy falls back to the stock precedence rule.
    .unwrap_or_else(|| profiles::select_minion_profile(role, wave_profile, minion_profile))
}

pub fn notify_engaged(strategy: &dyn DefenseStrategy, owner: OwnerId, category: DetectionCategory) {
    guarded(owner, "on_engaged", || strategy.on_engaged(owner, category));
}

pub fn notify_disengaged(
    strategy: &dyn DefenseStrategy,
    owner: OwnerId,
    category: DetectionCategory,
) {
    guarded(owner, "on_disengaged", || strategy.on_disengaged(owner, category));
}
