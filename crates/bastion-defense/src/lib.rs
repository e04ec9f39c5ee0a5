//! Defense engagement engine for BASTION.
//!
//! Tracks which detectors are engaging each owner, resolves the wave
//! configuration that applies, and runs one timer-driven wave loop per
//! engaged owner that spawns pooled minions at the detected target.

pub mod context;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod owners;
pub mod pool;
pub mod pool_runner;
pub mod state_manager;
pub mod timer;
pub mod wave_runner;

pub use engine::{DefenseEngine, DefenseFrame, DefenseSettings};
pub use orchestration::OrchestrationService;
