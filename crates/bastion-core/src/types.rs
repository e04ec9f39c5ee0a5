//! Fundamental geometric and simulation types.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// 3D position in simulation space (meters, Cartesian).
/// x = East, y = North, z = Up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Simulation time tracking.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SimTime {
    /// Current tick number (increments by 1 each tick).
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub elapsed_secs: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Range to another position in meters (3D distance).
    pub fn range_to(&self, other: &Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Horizontal range (ignoring altitude).
    pub fn horizontal_range_to(&self, other: &Position) -> f64 {
        self.planar().distance(other.planar())
    }

    /// Projection onto the horizontal plane.
    pub fn planar(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    /// This position shifted by a planar offset and a vertical offset.
    pub fn offset(&self, planar: DVec2, vertical: f64) -> Position {
        Position::new(self.x + planar.x, self.y + planar.y, self.z + vertical)
    }
}

impl SimTime {
    /// Advance by one step of `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        self.tick += 1;
        self.elapsed_secs += dt;
    }
}
