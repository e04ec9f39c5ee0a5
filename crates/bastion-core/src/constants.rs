//! Engine constants and tuning parameters.

/// Engine tick rate (Hz).
pub const TICK_RATE: u32 = 30;

/// Seconds per tick.
pub const DT: f64 = 1.0 / TICK_RATE as f64;

// --- Wave fallback ---

/// Batch size used when waves start without a resolvable preset
/// and the missing-preset policy is `Degrade`.
pub const FALLBACK_BATCH_SIZE: u32 = 1;

/// Interval (seconds) paired with `FALLBACK_BATCH_SIZE`.
pub const FALLBACK_INTERVAL_SECS: f64 = 5.0;

// --- Wave timing ---

/// Most batches a single wave loop fires in one tick after a stall.
pub const MAX_CATCH_UP_INTERVALS: u32 = 8;

// --- Spawn geometry ---

/// Approximate owner radius (m) when the extent provider has none.
pub const DEFAULT_OWNER_EXTENT: f64 = 50.0;

/// Height above the owner's centre at which minions appear (m).
pub const DEFAULT_VERTICAL_OFFSET: f64 = 2.0;

/// Timer countdowns at or below this are treated as elapsed.
/// Absorbs drift from summing fixed `DT` steps.
pub const TIMER_EPSILON: f64 = 1e-9;
