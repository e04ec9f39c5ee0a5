//! Defense strategies for BASTION.
//!
//! Decides which role a detected threat is treated as and which minion
//! profile a spawned entity uses. Pure logic: no ECS, no pools, no timers.

pub mod profiles;
pub mod roles;
pub mod strategy;

pub use strategy::{DefenseStrategy, RoleTableStrategy};

#[cfg(test)]
mod tests;
