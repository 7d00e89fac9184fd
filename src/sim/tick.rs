//! Simulation tick
//!
//! Applies a batch of presentation commands, then advances the simulated
//! clock. Within a tick, arrivals and scheduled events are processed in time
//! order; an arrival and an event due at the same instant resolve arrival
//! first, so a basket filled on the last second wins before the timer runs out.

use super::entity::EntityId;
use super::state::{GameState, SpawnRequest};

/// Commands gathered for one tick, applied in field order
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Return to ready (abandons a running round)
    pub reset: bool,
    pub start: bool,
    /// Dispenser clicks / tunnel taps
    pub spawns: Vec<SpawnRequest>,
    /// Transits whose animation finished on the presentation side
    pub landed: Vec<EntityId>,
    /// Entities that fell past the catcher
    pub missed: Vec<EntityId>,
}

/// Apply `input` and advance the round by `dt_ms`
pub fn tick(state: &mut GameState, input: &TickInput, dt_ms: u64) {
    if input.reset {
        state.reset();
    }
    if input.start {
        if let Err(e) = state.start() {
            log::warn!("Start rejected: {e}");
        }
    }
    for request in &input.spawns {
        if let Err(e) = state.on_spawn_requested(*request) {
            log::debug!("Spawn rejected: {e}");
        }
    }
    for &entity in &input.landed {
        if let Err(e) = state.on_transit_complete(entity) {
            log::debug!("Landing rejected: {e}");
        }
    }
    for &entity in &input.missed {
        if let Err(e) = state.on_entity_missed(entity) {
            log::debug!("Miss rejected: {e}");
        }
    }

    advance(state, dt_ms);
}

/// Advance the clock by `dt_ms`, landing transits and firing due events in order
pub fn advance(state: &mut GameState, dt_ms: u64) {
    let until = state.scheduler.now_ms().saturating_add(dt_ms);

    loop {
        let now = state.scheduler.now_ms();
        let next_arrival = state.transits.next_arrival_in().map(|dt| now + dt);
        let next_event = state.scheduler.next_due();

        let next = match (next_arrival, next_event) {
            (Some(a), Some(e)) => a.min(e),
            (Some(a), None) => a,
            (None, Some(e)) => e,
            (None, None) => break,
        };
        if next > until {
            break;
        }

        let landed = state.transits.advance(next.saturating_sub(now));
        state.scheduler.advance_to(next);

        if !landed.is_empty() {
            for transit in landed {
                let entity = transit.entity.id;
                if let Err(e) = state.land(transit) {
                    log::debug!("Arrival of {} not committed: {e}", entity);
                }
            }
            continue;
        }

        if let Some(fired) = state.scheduler.pop_due(next) {
            state.dispatch(fired);
        }
    }

    let now = state.scheduler.now_ms();
    state.transits.advance(until.saturating_sub(now));
    state.scheduler.advance_to(until);
}
