//! Sort Rush - a timed color-sorting mini-game engine
//!
//! Core modules:
//! - `sim`: Deterministic round engine (spawning, transits, tray matching, collectors, timer)
//! - `tuning`: Data-driven game balance with per-mode presets
//! - `error`: Command rejections, engine faults and config errors
//!
//! Rendering and input live in the presentation layer. It feeds commands into
//! [`sim::GameState`] (or batches them through [`sim::tick`]) and reads back
//! [`sim::Snapshot`]s and [`sim::GameEvent`]s.

pub mod error;
pub mod sim;
pub mod tuning;

pub use error::{EngineFault, Rejected, TuningError};
pub use tuning::{Mode, Tuning};

/// Game configuration constants
pub mod consts {
    /// Round timer resolution (one time unit)
    pub const TIMER_INTERVAL_MS: u64 = 1000;

    /// Tray slots
    pub const TRAY_CAPACITY: usize = 7;
    /// Same-category idle blocks needed for a clear
    pub const MATCH_THRESHOLD: usize = 3;
    /// Points for every block that lands in the tray
    pub const LANDING_SCORE: u64 = 5;
    /// Points for an evaluation pass that clears at least one group
    pub const MATCH_BONUS: u64 = 100;
    /// Time the presentation gets to play the removal animation
    pub const REMOVAL_GRACE_MS: u64 = 420;
    pub const TRAY_TRANSIT_MS: u64 = 470;
    pub const TRAY_ROUND_SECS: u32 = 30;

    /// Fruit tunnels (basket mode)
    pub const TUNNEL_COUNT: usize = 5;
    pub const TUNNEL_SUPPLY: u32 = 10;
    /// Fruits needed to fill a basket and win
    pub const BASKET_CAPACITY: usize = 3;
    /// Fruit travel progress rate is 1.5/s
    pub const BASKET_TRANSIT_MS: u64 = 667;
    pub const BASKET_ROUND_SECS: u32 = 30;

    /// Points for a fruit that lands in the right basket
    pub const COLLECT_SCORE: u64 = 10;
    /// Points lost for a wrong-bin delivery (score floors at 0)
    pub const MISS_PENALTY: u64 = 5;
    pub const WIN_BONUS: u64 = 1000;
    pub const WIN_BONUS_PER_SECOND: u64 = 10;

    /// Catcher lanes fruits fall from
    pub const CATCHER_LANES: usize = 5;
    pub const CATCHER_SPAWN_MS: u64 = 1500;
    pub const CATCHER_ROTATE_MS: u64 = 8000;
    pub const CATCHER_TRANSIT_MS: u64 = 2400;
    pub const CATCHER_ROUND_SECS: u32 = 60;
}

/// Format seconds as a `MM:SS` countdown label
pub fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
