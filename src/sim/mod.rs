//! Deterministic simulation module
//!
//! All round logic lives here. This module must be pure and deterministic:
//! - Simulated millisecond clock only, advanced by [`tick`]/[`advance`]
//! - Randomness only through an injected [`RandomSource`]
//! - Stable iteration order (spawn order, slot order)
//! - No rendering or platform dependencies

pub mod collector;
pub mod entity;
pub mod random;
pub mod schedule;
pub mod state;
pub mod tick;
pub mod transit;
pub mod tray;

pub use collector::{Collector, CollectorId, route};
pub use entity::{Category, Entity, EntityId, EntityStatus};
pub use random::{RandomSource, ScriptedRandom, SeededRandom};
pub use schedule::{CancelToken, Fired, ScheduledKind, Scheduler};
pub use state::{
    GameEvent, GameState, InFlight, Landing, RoundPhase, Snapshot, Source, SourceId, SpawnRequest,
    Spawned,
};
pub use tick::{TickInput, advance, tick};
pub use transit::{Destination, Easing, Transit, TransitHandle, TransitSet, ease};
pub use tray::Tray;
