//! Error types
//!
//! Command rejections are reported synchronously as [`Rejected`] so the
//! presentation can react right away ("no space left"). Nothing is retried by
//! the engine.

use std::fmt;

use crate::sim::{CollectorId, EntityId, RoundPhase, SourceId};

/// Command issued to the round controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Spawn,
    Land,
    Miss,
    Cancel,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Start => "start",
            Command::Spawn => "spawn",
            Command::Land => "land",
            Command::Miss => "miss",
            Command::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

/// Why a spawn found no room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortfall {
    /// Every tray slot is occupied or reserved by an in-flight block
    TrayFull,
    /// Finite-supply source has nothing left
    SourceExhausted(SourceId),
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shortfall::TrayFull => f.write_str("no free tray slot"),
            Shortfall::SourceExhausted(source) => write!(f, "source {source} is exhausted"),
        }
    }
}

/// A command the round controller refused. State is untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejected {
    #[error("no capacity: {0}")]
    NoCapacity(Shortfall),

    #[error("{command} is not allowed while {phase}")]
    InvalidTransition { command: Command, phase: RoundPhase },

    #[error("unknown source {0}")]
    UnknownSource(SourceId),

    #[error("unknown collector {0}")]
    UnknownCollector(CollectorId),

    #[error("entity {0} is not in flight")]
    UnknownEntity(EntityId),

    #[error("source {0} has no fixed category and the palette is empty")]
    NoCategory(SourceId),

    #[error(transparent)]
    Fault(#[from] EngineFault),
}

/// Broken engine invariant. Unreachable while spawn-time slot reservation holds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineFault {
    #[error("slot {slot} already holds {occupant}, cannot place {entity}")]
    SlotOccupied {
        slot: usize,
        occupant: EntityId,
        entity: EntityId,
    },

    #[error("slot {slot} is outside a tray of capacity {capacity}")]
    SlotOutOfRange { slot: usize, capacity: usize },
}

/// Tuning load/validation errors
#[derive(Debug, thiserror::Error)]
pub enum TuningError {
    #[error("failed to parse tuning: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read tuning file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid tuning: {0}")]
    Invalid(&'static str),
}
