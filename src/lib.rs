//! River Quiz - dodge obstacles, collect bonuses, answer questions
//!
//! Core modules:
//! - `sim`: Deterministic run simulation (state machine, timers, spawning, questions)
//! - `settings`: Data-driven game tuning
//! - `ui`: Presentation adapter seam
//! - `error`: Error kinds shared across the crate

pub mod error;
pub mod settings;
pub mod sim;
pub mod ui;

pub use error::GameError;
pub use settings::{Difficulty, GameConfig};

/// Game timing constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Simulation ticks per second
    pub const TICKS_PER_SEC: u64 = 120;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
}

/// Convert a millisecond duration to whole simulation ticks (at least 1)
#[inline]
pub fn ms_to_ticks(ms: u32) -> u64 {
    let ticks = (ms as u64 * consts::TICKS_PER_SEC + 500) / 1000;
    ticks.max(1)
}

/// Convert a tick count to whole seconds, rounded to nearest
#[inline]
pub fn ticks_to_rounded_secs(ticks: u64) -> u64 {
    (ticks + consts::TICKS_PER_SEC / 2) / consts::TICKS_PER_SEC
}
