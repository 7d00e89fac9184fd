//! Round state and the round controller
//!
//! [`GameState`] is the only writer of round phase, timer, score, tray,
//! collectors and the scheduler. The presentation issues commands through its
//! methods (or batches them into [`super::tick`]) and reads [`Snapshot`]s and
//! drained [`GameEvent`]s back.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collector::{self, Collector, CollectorId};
use super::entity::{Category, Entity, EntityId};
use super::random::{RandomSource, SeededRandom};
use super::schedule::{CancelToken, Fired, ScheduledKind, Scheduler};
use super::transit::{Destination, Transit, TransitHandle, TransitSet};
use super::tray::Tray;
use crate::error::{Command, Rejected, Shortfall, TuningError};
use crate::tuning::{Mode, Tuning};

/// Round lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    /// Waiting for start
    Ready,
    /// Timer running, spawns and landings accepted
    Playing,
    Won,
    Lost,
}

impl RoundPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RoundPhase::Won | RoundPhase::Lost)
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundPhase::Ready => "ready",
            RoundPhase::Playing => "playing",
            RoundPhase::Won => "won",
            RoundPhase::Lost => "lost",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub usize);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A dispenser, tunnel or lane entities spawn from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub position: Vec2,
    /// Fixed category; `None` picks from the palette
    pub category: Option<Category>,
    /// Remaining supply; `None` is unlimited
    pub remaining: Option<u32>,
}

impl Source {
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

/// Spawn trigger from a click/tap or the auto-spawner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub source: SourceId,
    /// Overrides the source's category
    pub category: Option<Category>,
    /// Explicit collector; default routing otherwise
    pub target: Option<CollectorId>,
}

impl SpawnRequest {
    pub fn from_source(source: SourceId) -> Self {
        Self {
            source,
            category: None,
            target: None,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_target(mut self, target: CollectorId) -> Self {
        self.target = Some(target);
        self
    }
}

/// Accepted spawn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spawned {
    pub entity: Entity,
    pub destination: Destination,
    pub handle: TransitHandle,
}

/// What a landing did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Landing {
    /// Block is in the tray; `matched` entities were flagged by this landing
    Placed { slot: usize, matched: usize },
    Collected { collector: CollectorId },
    /// Wrong bin (or full); the entity is gone
    Missed { collector: CollectorId },
}

/// State transitions for the presentation layer, drained after each mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    Spawned {
        entity: EntityId,
        category: Category,
        source: SourceId,
        destination: Destination,
    },
    Landed {
        entity: EntityId,
        destination: Destination,
    },
    /// Entities flagged for removal; compaction runs at `compact_at_ms`
    MatchFound {
        entities: Vec<EntityId>,
        compact_at_ms: u64,
    },
    Compacted {
        removed: Vec<EntityId>,
    },
    Collected {
        entity: EntityId,
        collector: CollectorId,
    },
    Missed {
        entity: EntityId,
        collector: CollectorId,
    },
    /// Fell past the catcher
    Dropped {
        entity: EntityId,
    },
    /// Transit cancelled by the presentation; its slot is free again
    Cancelled {
        entity: EntityId,
    },
    ScoreChanged {
        delta: i64,
        score: u64,
    },
    TimerTick {
        time_left: u32,
    },
    PhaseChanged {
        from: RoundPhase,
        to: RoundPhase,
    },
    CollectorRotated {
        collector: CollectorId,
        category: Category,
    },
}

/// Read-only projection for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub mode: Mode,
    pub phase: RoundPhase,
    pub time_left: u32,
    pub score: u64,
    pub now_ms: u64,
    pub tray: Option<Vec<Option<Entity>>>,
    pub collectors: Vec<Collector>,
    pub sources: Vec<Source>,
    pub in_flight: Vec<InFlight>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InFlight {
    pub entity: Entity,
    pub destination: Destination,
    pub origin: Vec2,
    pub target: Vec2,
    pub progress: f32,
    pub position: Vec2,
}

/// The round controller
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub(crate) tuning: Tuning,
    pub(crate) phase: RoundPhase,
    pub(crate) time_left: u32,
    pub(crate) score: u64,
    /// Bumped on reset; stale transits and events are ignored
    pub(crate) epoch: u64,
    pub(crate) tray: Option<Tray>,
    pub(crate) collectors: Vec<Collector>,
    pub(crate) sources: Vec<Source>,
    pub(crate) transits: TransitSet,
    pub(crate) scheduler: Scheduler,
    pub(crate) random: Box<dyn RandomSource>,
    pub(crate) events: Vec<GameEvent>,
    /// Matched groups waiting out their removal grace, keyed by the
    /// compaction event that clears them
    pub(crate) removals: Vec<(CancelToken, Vec<EntityId>)>,
    /// Next entity ID
    next_id: u32,
}

impl GameState {
    /// New round in `Ready` with the seeded random source.
    ///
    /// The tuning is validated first; zero periods or capacities would stall
    /// the clock or the board.
    pub fn new(tuning: Tuning, seed: u64) -> Result<Self, TuningError> {
        tuning.validate()?;
        let mut state = Self {
            seed,
            tuning,
            phase: RoundPhase::Ready,
            time_left: 0,
            score: 0,
            epoch: 0,
            tray: None,
            collectors: Vec::new(),
            sources: Vec::new(),
            transits: TransitSet::new(),
            scheduler: Scheduler::new(),
            random: Box::new(SeededRandom::new(seed)),
            events: Vec::new(),
            removals: Vec::new(),
            next_id: 1,
        };
        state.build_board();
        Ok(state)
    }

    /// Replace the random source (tests script category picks this way)
    pub fn with_random(mut self, random: impl RandomSource + 'static) -> Self {
        self.random = Box::new(random);
        self
    }

    /// Allocate a new entity ID
    fn next_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Fresh tray/collectors/sources from the tuning
    fn build_board(&mut self) {
        let tuning = &self.tuning;
        self.tray = tuning
            .mode
            .uses_tray()
            .then(|| Tray::new(tuning.tray_capacity));
        self.collectors = if tuning.mode.uses_tray() {
            Vec::new()
        } else {
            tuning
                .collectors
                .iter()
                .enumerate()
                .map(|(i, c)| Collector::new(CollectorId(i), c.category, c.capacity, c.position))
                .collect()
        };
        self.sources = tuning
            .sources
            .iter()
            .enumerate()
            .map(|(i, s)| Source {
                id: SourceId(i),
                position: s.position,
                category: s.category,
                remaining: s.supply,
            })
            .collect();
    }

    // === Accessors ===

    pub fn mode(&self) -> Mode {
        self.tuning.mode
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn now_ms(&self) -> u64 {
        self.scheduler.now_ms()
    }

    pub fn tray(&self) -> Option<&Tray> {
        self.tray.as_ref()
    }

    pub fn collectors(&self) -> &[Collector] {
        &self.collectors
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn transits(&self) -> &TransitSet {
        &self.transits
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Take all events emitted since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            mode: self.tuning.mode,
            phase: self.phase,
            time_left: self.time_left,
            score: self.score,
            now_ms: self.scheduler.now_ms(),
            tray: self.tray.as_ref().map(|t| t.slots().to_vec()),
            collectors: self.collectors.clone(),
            sources: self.sources.clone(),
            in_flight: self
                .transits
                .iter()
                .map(|t| InFlight {
                    entity: t.entity.clone(),
                    destination: t.destination,
                    origin: t.origin,
                    target: t.target,
                    progress: t.progress(),
                    position: t.position(),
                })
                .collect(),
        }
    }

    // === Lifecycle commands ===

    /// `ready -> playing`. Rejected (and nothing changes) in any other phase.
    pub fn start(&mut self) -> Result<(), Rejected> {
        if self.phase != RoundPhase::Ready {
            log::warn!("Ignoring start while {}", self.phase);
            return Err(self.invalid(Command::Start));
        }

        self.build_board();
        self.score = 0;
        self.time_left = self.tuning.round_secs;
        self.scheduler
            .schedule(self.tuning.timer_interval_ms, self.epoch, ScheduledKind::RoundTick);
        if let Some(period) = self.tuning.auto_spawn_ms {
            self.scheduler
                .schedule(period, self.epoch, ScheduledKind::AutoSpawn);
        }
        if let Some(period) = self.tuning.rotate_collectors_ms {
            self.scheduler
                .schedule(period, self.epoch, ScheduledKind::RotateCollectors);
        }

        log::info!(
            "Round started: {} mode, {}s, seed {}",
            self.tuning.mode.as_str(),
            self.time_left,
            self.seed
        );
        self.set_phase(RoundPhase::Playing);
        Ok(())
    }

    /// Abandon or close the round and return to `ready`.
    ///
    /// In-flight transits and pending events are dropped and the epoch moves
    /// on, so nothing from before the reset can touch the new round.
    pub fn reset(&mut self) {
        self.epoch += 1;
        let cancelled = self.transits.cancel_all();
        self.scheduler.cancel_all();
        self.removals.clear();
        self.build_board();
        self.score = 0;
        self.time_left = 0;

        log::info!(
            "Round reset (epoch {}, {} transits cancelled)",
            self.epoch,
            cancelled
        );
        self.set_phase(RoundPhase::Ready);
    }

    // === Play commands ===

    /// Spawn an entity from `request.source` and start its transit.
    ///
    /// The destination (tray slot or collector) is fixed here. Tray slots are
    /// reserved at spawn so two blocks in flight never target the same slot.
    pub fn on_spawn_requested(&mut self, request: SpawnRequest) -> Result<Spawned, Rejected> {
        if self.phase != RoundPhase::Playing {
            return Err(self.invalid(Command::Spawn));
        }

        let source = self
            .sources
            .get(request.source.0)
            .ok_or(Rejected::UnknownSource(request.source))?;
        if source.is_exhausted() {
            return Err(Rejected::NoCapacity(Shortfall::SourceExhausted(source.id)));
        }
        let origin = source.position;
        let fixed = request.category.or(source.category);

        // Tray capacity is checked before any random draw
        let slot = match &self.tray {
            Some(tray) => Some(
                tray.first_free_slot(&self.transits.reserved_slots())
                    .ok_or(Rejected::NoCapacity(Shortfall::TrayFull))?,
            ),
            None => None,
        };
        if let Some(target) = request.target {
            if self.collectors.get(target.0).is_none() {
                return Err(Rejected::UnknownCollector(target));
            }
        }

        let category = match fixed {
            Some(category) => category,
            None => self
                .random
                .pick_category(&self.tuning.palette)
                .ok_or(Rejected::NoCategory(request.source))?,
        };

        let (destination, target_pos) = match slot {
            Some(slot) => (Destination::Slot(slot), self.tuning.slot_position(slot)),
            None => {
                let collector = match request.target {
                    Some(target) => self.collectors.get(target.0),
                    None => collector::route(&self.collectors, category),
                }
                .ok_or(Rejected::UnknownCollector(
                    request.target.unwrap_or(CollectorId(0)),
                ))?;
                (Destination::Collector(collector.id), collector.position)
            }
        };

        // All checks passed; from here on the spawn happens
        if let Some(remaining) = self.sources[request.source.0].remaining.as_mut() {
            *remaining -= 1;
        }

        let entity = Entity::spawn(self.next_entity_id(), category);
        let transit = Transit::new(
            entity.clone(),
            request.source,
            destination,
            origin,
            target_pos,
            self.tuning.transit_ms,
            self.tuning.easing,
            self.epoch,
        );
        let handle = self.transits.begin(transit);

        log::debug!(
            "Spawned {} {} from source {} -> {}",
            category,
            entity.id,
            request.source,
            destination
        );
        self.events.push(GameEvent::Spawned {
            entity: entity.id,
            category,
            source: request.source,
            destination,
        });

        Ok(Spawned {
            entity,
            destination,
            handle,
        })
    }

    /// The presentation finished animating `entity`: commit it now
    pub fn on_transit_complete(&mut self, entity: EntityId) -> Result<Landing, Rejected> {
        if self.phase != RoundPhase::Playing {
            return Err(self.invalid(Command::Land));
        }
        let transit = self
            .transits
            .finish(entity)
            .ok_or(Rejected::UnknownEntity(entity))?;
        self.land(transit)
    }

    /// `entity` fell past every collector; it is discarded without scoring
    pub fn on_entity_missed(&mut self, entity: EntityId) -> Result<(), Rejected> {
        if self.phase != RoundPhase::Playing {
            return Err(self.invalid(Command::Miss));
        }
        self.transits
            .finish(entity)
            .ok_or(Rejected::UnknownEntity(entity))?;
        log::debug!("Dropped {}", entity);
        self.events.push(GameEvent::Dropped { entity });
        Ok(())
    }

    /// Abort an in-flight transit. The entity never lands and a reserved
    /// tray slot becomes free; spent supply is not refunded.
    pub fn cancel_transit(&mut self, handle: &TransitHandle) -> Result<(), Rejected> {
        if self.phase != RoundPhase::Playing {
            return Err(self.invalid(Command::Cancel));
        }
        let transit = self
            .transits
            .cancel(handle)
            .ok_or(Rejected::UnknownEntity(handle.entity))?;
        log::debug!("Cancelled transit of {} to {}", handle.entity, transit.destination);
        self.events.push(GameEvent::Cancelled {
            entity: handle.entity,
        });
        Ok(())
    }

    /// Commit a finished transit into its destination
    pub(crate) fn land(&mut self, transit: Transit) -> Result<Landing, Rejected> {
        let entity = transit.entity.id;
        if transit.epoch() != self.epoch || self.phase != RoundPhase::Playing {
            log::debug!("Discarding stale landing of {}", entity);
            return Err(Rejected::UnknownEntity(entity));
        }

        let landing = match transit.destination {
            Destination::Slot(slot) => {
                let Some(tray) = self.tray.as_mut() else {
                    return Err(Rejected::UnknownEntity(entity));
                };
                if let Err(fault) = tray.commit(slot, transit.entity) {
                    log::error!("Tray invariant violated: {fault}");
                    return Err(fault.into());
                }
                self.events.push(GameEvent::Landed {
                    entity,
                    destination: transit.destination,
                });
                self.add_score(self.tuning.landing_score as i64);
                let matched = self.evaluate_matches();
                Landing::Placed { slot, matched }
            }
            Destination::Collector(id) => {
                let collector = self
                    .collectors
                    .get_mut(id.0)
                    .ok_or(Rejected::UnknownCollector(id))?;
                match collector.collect(transit.entity) {
                    Ok(()) => {
                        self.events.push(GameEvent::Collected {
                            entity,
                            collector: id,
                        });
                        self.add_score(self.tuning.collect_score as i64);
                        Landing::Collected { collector: id }
                    }
                    Err(_discarded) => {
                        self.events.push(GameEvent::Missed {
                            entity,
                            collector: id,
                        });
                        self.add_score(-(self.tuning.miss_penalty as i64));
                        Landing::Missed { collector: id }
                    }
                }
            }
        };

        log::debug!("Landed {} ({:?})", entity, landing);
        self.check_outcome();
        Ok(landing)
    }

    /// Flag the leftmost matches for removal and schedule compaction.
    /// Returns how many entities were flagged.
    fn evaluate_matches(&mut self) -> usize {
        let Some(tray) = self.tray.as_mut() else {
            return 0;
        };
        let matched = tray.detect_matches(self.tuning.match_threshold);
        if matched.is_empty() {
            return 0;
        }
        tray.mark_removing(&matched);

        let token = self.scheduler.schedule(
            self.tuning.removal_grace_ms,
            self.epoch,
            ScheduledKind::Compact,
        );
        let compact_at_ms = self
            .scheduler
            .due_at(token)
            .unwrap_or_else(|| self.scheduler.now_ms());
        self.removals.push((token, matched.clone()));

        log::debug!("Match! Clearing {} blocks", matched.len());
        let count = matched.len();
        self.events.push(GameEvent::MatchFound {
            entities: matched,
            compact_at_ms,
        });
        self.add_score(self.tuning.match_bonus as i64);
        count
    }

    /// Grace of the group matched under `token` elapsed: drop exactly that
    /// group, repack, look for follow-up matches
    fn compact_tray(&mut self, token: CancelToken) {
        let Some(idx) = self.removals.iter().position(|(t, _)| *t == token) else {
            return;
        };
        let (_, group) = self.removals.remove(idx);
        let reserved = self.transits.reserved_slots();
        let Some(tray) = self.tray.as_mut() else {
            return;
        };
        let removed = tray.compact_around(&group, &reserved);
        if removed.is_empty() {
            return;
        }

        self.events.push(GameEvent::Compacted {
            removed: removed.iter().map(|e| e.id).collect(),
        });
        self.evaluate_matches();
        self.check_outcome();
    }

    /// Apply a score delta, floored at zero
    fn add_score(&mut self, delta: i64) {
        if delta == 0 {
            return;
        }
        self.score = self.score.saturating_add_signed(delta);
        self.events.push(GameEvent::ScoreChanged {
            delta,
            score: self.score,
        });
    }

    /// Win/loss predicates. Win is checked first so it takes precedence. A
    /// full tray is not a loss: spawns are refused until a match clears room.
    pub(crate) fn check_outcome(&mut self) {
        if self.phase != RoundPhase::Playing {
            return;
        }

        if let Some(full) = self.collectors.iter().find(|c| c.is_full()) {
            log::info!("Success! {} collector {} is full", full.category(), full.id);
            self.finish(RoundPhase::Won);
            return;
        }

        if self.time_left == 0 {
            log::info!("Time's up!");
            self.finish(RoundPhase::Lost);
        }
    }

    /// Enter a terminal phase: freeze the board and stop all timers
    fn finish(&mut self, phase: RoundPhase) {
        if phase == RoundPhase::Won {
            let bonus = self.tuning.win_bonus
                + self.tuning.win_bonus_per_second * u64::from(self.time_left);
            self.add_score(bonus as i64);
        }
        self.transits.cancel_all();
        self.scheduler.cancel_all();
        self.removals.clear();

        log::info!("Round {} with score {}", phase, self.score);
        self.set_phase(phase);
    }

    /// Run a scheduled event. Events from an older epoch are ignored.
    pub(crate) fn dispatch(&mut self, fired: Fired) {
        if fired.epoch != self.epoch || self.phase != RoundPhase::Playing {
            log::debug!("Ignoring stale {:?}", fired.kind);
            return;
        }

        match fired.kind {
            ScheduledKind::RoundTick => {
                self.time_left = self.time_left.saturating_sub(1);
                self.events.push(GameEvent::TimerTick {
                    time_left: self.time_left,
                });
                self.check_outcome();
                if self.phase == RoundPhase::Playing {
                    self.scheduler.schedule(
                        self.tuning.timer_interval_ms,
                        self.epoch,
                        ScheduledKind::RoundTick,
                    );
                }
            }
            ScheduledKind::Compact => self.compact_tray(fired.token),
            ScheduledKind::AutoSpawn => {
                if let Some(lane) = self.random.pick_index(self.sources.len()) {
                    let request = SpawnRequest::from_source(SourceId(lane));
                    if let Err(e) = self.on_spawn_requested(request) {
                        log::debug!("Auto-spawn rejected: {e}");
                    }
                }
                if let Some(period) = self.tuning.auto_spawn_ms {
                    self.scheduler
                        .schedule(period, self.epoch, ScheduledKind::AutoSpawn);
                }
            }
            ScheduledKind::RotateCollectors => {
                for i in 0..self.collectors.len() {
                    let Some(category) = self.random.pick_category(&self.tuning.palette) else {
                        break;
                    };
                    let collector = &mut self.collectors[i];
                    collector.set_category(category);
                    self.events.push(GameEvent::CollectorRotated {
                        collector: collector.id,
                        category,
                    });
                }
                if let Some(period) = self.tuning.rotate_collectors_ms {
                    self.scheduler
                        .schedule(period, self.epoch, ScheduledKind::RotateCollectors);
                }
            }
        }
    }

    fn set_phase(&mut self, to: RoundPhase) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        self.events.push(GameEvent::PhaseChanged { from, to });
    }

    fn invalid(&self, command: Command) -> Rejected {
        Rejected::InvalidTransition {
            command,
            phase: self.phase,
        }
    }
}

impl fmt::Debug for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameState")
            .field("seed", &self.seed)
            .field("mode", &self.tuning.mode)
            .field("phase", &self.phase)
            .field("time_left", &self.time_left)
            .field("score", &self.score)
            .field("epoch", &self.epoch)
            .field("in_flight", &self.transits.len())
            .finish_non_exhaustive()
    }
}
