//! Core types and definitions for the BASTION defense engine.
//!
//! This crate defines the vocabulary shared across all other crates:
//! identifiers, geometry, roles and categories, engagement signals,
//! authored wave configuration, and constants.
//! It has no dependency on the ECS or any runtime framework.

pub mod components;
pub mod config;
pub mod constants;
pub mod enums;
pub mod error;
pub mod events;
pub mod ids;
pub mod types;

#[cfg(test)]
mod tests;
