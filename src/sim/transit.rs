//! Transit animator
//!
//! Drives an entity from its source to its destination over a fixed duration.
//! The curve is cosmetic; what the engine relies on is the duration and that a
//! transit completes exactly once: [`TransitSet::advance`] and
//! [`TransitSet::finish`] both remove the transit they hand back, and
//! [`TransitSet::cancel_all`] drops everything without completing it.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collector::CollectorId;
use super::entity::{Entity, EntityId};
use super::state::SourceId;

/// Easing curves for transit motion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    /// Constant speed
    Linear,
    /// Decelerating arrival (quadratic)
    #[default]
    QuadOut,
    /// Decelerating arrival (cubic, snappier)
    CubicOut,
}

/// Apply an easing curve to normalized time (clamped to [0, 1])
pub fn ease(easing: Easing, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    match easing {
        Easing::Linear => t,
        Easing::QuadOut => t * (2.0 - t),
        Easing::CubicOut => {
            let p = t - 1.0;
            p * p * p + 1.0
        }
    }
}

/// Where a spawned entity is headed. Fixed at spawn, never reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// Reserved tray slot index
    Slot(usize),
    Collector(CollectorId),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Slot(slot) => write!(f, "slot {slot}"),
            Destination::Collector(id) => write!(f, "collector {id}"),
        }
    }
}

/// Identifies one in-flight transit within one round epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TransitHandle {
    pub entity: EntityId,
    pub epoch: u64,
}

/// One entity in flight
#[derive(Debug, Clone, Serialize)]
pub struct Transit {
    pub entity: Entity,
    pub source: SourceId,
    pub destination: Destination,
    pub origin: Vec2,
    pub target: Vec2,
    pub duration_ms: u64,
    pub elapsed_ms: u64,
    pub easing: Easing,
    epoch: u64,
}

impl Transit {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entity: Entity,
        source: SourceId,
        destination: Destination,
        origin: Vec2,
        target: Vec2,
        duration_ms: u64,
        easing: Easing,
        epoch: u64,
    ) -> Self {
        Self {
            entity,
            source,
            destination,
            origin,
            target,
            duration_ms,
            elapsed_ms: 0,
            easing,
            epoch,
        }
    }

    pub fn handle(&self) -> TransitHandle {
        TransitHandle {
            entity: self.entity.id,
            epoch: self.epoch,
        }
    }

    /// Round epoch this transit was started in
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Linear progress in [0, 1]
    pub fn progress(&self) -> f32 {
        if self.duration_ms == 0 {
            return 1.0;
        }
        (self.elapsed_ms as f32 / self.duration_ms as f32).min(1.0)
    }

    /// Current eased position between origin and target
    pub fn position(&self) -> Vec2 {
        self.origin.lerp(self.target, ease(self.easing, self.progress()))
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.elapsed_ms >= self.duration_ms
    }

    /// Milliseconds until arrival
    pub fn remaining_ms(&self) -> u64 {
        self.duration_ms.saturating_sub(self.elapsed_ms)
    }
}

/// All in-flight transits, kept in spawn order
#[derive(Debug, Clone, Default)]
pub struct TransitSet {
    flights: Vec<Transit>,
}

impl TransitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, transit: Transit) -> TransitHandle {
        let handle = transit.handle();
        self.flights.push(transit);
        handle
    }

    /// Advance every transit by `dt_ms`. Finished transits are removed and
    /// returned in spawn order.
    pub fn advance(&mut self, dt_ms: u64) -> Vec<Transit> {
        for transit in &mut self.flights {
            transit.elapsed_ms = transit.elapsed_ms.saturating_add(dt_ms);
        }
        let (finished, flying): (Vec<_>, Vec<_>) = std::mem::take(&mut self.flights)
            .into_iter()
            .partition(Transit::is_finished);
        self.flights = flying;
        finished
    }

    /// Complete a transit early (the presentation finished its animation)
    pub fn finish(&mut self, entity: EntityId) -> Option<Transit> {
        let idx = self.flights.iter().position(|t| t.entity.id == entity)?;
        Some(self.flights.remove(idx))
    }

    /// Drop one transit without completing it. A handle from an older epoch
    /// (or for a transit that already landed) cancels nothing.
    pub fn cancel(&mut self, handle: &TransitHandle) -> Option<Transit> {
        let idx = self
            .flights
            .iter()
            .position(|t| t.entity.id == handle.entity && t.epoch == handle.epoch)?;
        Some(self.flights.remove(idx))
    }

    /// Drop every transit without completing it. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.flights.len();
        self.flights.clear();
        count
    }

    /// Time until the next arrival, if anything is in flight
    pub fn next_arrival_in(&self) -> Option<u64> {
        self.flights.iter().map(Transit::remaining_ms).min()
    }

    /// Tray slots reserved by blocks still in flight
    pub fn reserved_slots(&self) -> Vec<usize> {
        self.flights
            .iter()
            .filter_map(|t| match t.destination {
                Destination::Slot(slot) => Some(slot),
                Destination::Collector(_) => None,
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transit> {
        self.flights.iter()
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}
