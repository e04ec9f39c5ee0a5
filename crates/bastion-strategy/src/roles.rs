//! Role lookup tables and the resolution chain.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use bastion_core::enums::TargetRole;

/// A table that maps identifiers to roles, possibly shared by many owners.
pub trait RoleLookup: fmt::Debug + Send + Sync {
    fn lookup(&self, identifier: &str) -> Option<TargetRole>;
}

/// Where a resolved role came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSource {
    Requested,
    Local,
    Shared,
    Fallback,
    /// Nothing matched; the role is `TargetRole::Unknown`.
    Unmatched,
}

/// Identifier → role table shared across owners.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SharedRoleTable {
    roles: HashMap<String, TargetRole>,
}

impl SharedRoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, identifier: impl Into<String>, role: TargetRole) -> Option<TargetRole> {
        self.roles.insert(identifier.into(), role)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, TargetRole)> for SharedRoleTable {
    fn from_iter<I: IntoIterator<Item = (S, TargetRole)>>(iter: I) -> Self {
        Self {
            roles: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl RoleLookup for SharedRoleTable {
    fn lookup(&self, identifier: &str) -> Option<TargetRole> {
        self.roles.get(identifier).copied()
    }
}

/// Resolve a role in priority order: requested, local, shared, fallback.
///
/// A requested `Unknown` counts as "not requested". Lookups that yield
/// `Unknown` are skipped so a later source can still match.
pub fn resolve_role(
    identifier: &str,
    requested: Option<TargetRole>,
    local: &HashMap<String, TargetRole>,
    shared: Option<&dyn RoleLookup>,
    fallback: TargetRole,
) -> (TargetRole, RoleSource) {
    if let Some(role) = requested.filter(|r| r.is_known()) {
        return (role, RoleSource::Requested);
    }
    if let Some(role) = local.get(identifier).copied().filter(|r| r.is_known()) {
        return (role, RoleSource::Local);
    }
    if let Some(role) = shared
        .and_then(|table| table.lookup(identifier))
        .filter(|r| r.is_known())
    {
        return (role, RoleSource::Shared);
    }
    if fallback.is_known() {
        return (fallback, RoleSource::Fallback);
    }
    (TargetRole::Unknown, RoleSource::Unmatched)
}
