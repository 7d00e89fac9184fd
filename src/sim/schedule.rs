//! Simulated clock and scheduled events
//!
//! Replaces ambient timers: the round timer, removal grace, auto-spawn and
//! collector rotation are queued here with a cancel token and the epoch they
//! belong to, and fire only when the clock is advanced. Tests drive time
//! explicitly.

use serde::Serialize;

/// Handle for cancelling a scheduled event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CancelToken(u64);

/// What to do when an event comes due
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledKind {
    /// Round countdown step
    RoundTick,
    /// Removal grace elapsed; compact the tray
    Compact,
    /// Automatic spawn from a random source
    AutoSpawn,
    /// Collectors pick a new accepted category
    RotateCollectors,
}

/// An event that came due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub token: CancelToken,
    pub due_ms: u64,
    pub epoch: u64,
    pub kind: ScheduledKind,
}

#[derive(Debug, Clone)]
struct Scheduled {
    due_ms: u64,
    token: CancelToken,
    epoch: u64,
    kind: ScheduledKind,
}

/// Event queue over a millisecond clock
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    now_ms: u64,
    next_token: u64,
    queue: Vec<Scheduled>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Queue `kind` to fire `delay_ms` from now
    pub fn schedule(&mut self, delay_ms: u64, epoch: u64, kind: ScheduledKind) -> CancelToken {
        let token = CancelToken(self.next_token);
        self.next_token += 1;
        self.queue.push(Scheduled {
            due_ms: self.now_ms.saturating_add(delay_ms),
            token,
            epoch,
            kind,
        });
        token
    }

    /// Returns false if the event already fired or was cancelled
    pub fn cancel(&mut self, token: CancelToken) -> bool {
        let before = self.queue.len();
        self.queue.retain(|s| s.token != token);
        self.queue.len() != before
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.queue.len();
        self.queue.clear();
        count
    }

    /// Due time of the earliest pending event
    pub fn next_due(&self) -> Option<u64> {
        self.queue.iter().map(|s| s.due_ms).min()
    }

    pub fn due_at(&self, token: CancelToken) -> Option<u64> {
        self.queue.iter().find(|s| s.token == token).map(|s| s.due_ms)
    }

    pub fn pending(&self, kind: ScheduledKind) -> usize {
        self.queue.iter().filter(|s| s.kind == kind).count()
    }

    /// Pop the earliest event due at or before `until_ms`, moving the clock to
    /// its due time. Ties fire in scheduling order.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<Fired> {
        let idx = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, s)| s.due_ms <= until_ms)
            .min_by_key(|(_, s)| (s.due_ms, s.token))
            .map(|(i, _)| i)?;
        let event = self.queue.remove(idx);
        self.advance_to(event.due_ms);
        Some(Fired {
            token: event.token,
            due_ms: event.due_ms,
            epoch: event.epoch,
            kind: event.kind,
        })
    }

    /// Move the clock forward (never backward)
    pub fn advance_to(&mut self, t_ms: u64) {
        self.now_ms = self.now_ms.max(t_ms);
    }
}
