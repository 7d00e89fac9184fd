//! Data-driven game balance
//!
//! Every mode has a preset ([`Tuning::for_mode`]). A JSON tuning file only
//! needs the keys it changes; the rest come from its mode's preset.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::TuningError;
use crate::sim::{Category, Easing};

/// Which variant of the game the round plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Color dispensers drop blocks into a 7-slot tray; three of a kind clear
    #[default]
    Tray,
    /// Fruit tunnels with finite supply feed two baskets; fill one to win
    Basket,
    /// Fruits rain down automatically into a catcher whose color keeps changing
    Catcher,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Tray, Mode::Basket, Mode::Catcher];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Tray => "tray",
            Mode::Basket => "basket",
            Mode::Catcher => "catcher",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tray" | "blocks" => Some(Mode::Tray),
            "basket" | "baskets" | "sorting" => Some(Mode::Basket),
            "catcher" | "catch" => Some(Mode::Catcher),
            _ => None,
        }
    }

    /// Whether entities land in tray slots (vs collectors)
    pub fn uses_tray(&self) -> bool {
        matches!(self, Mode::Tray)
    }
}

/// A dispenser / tunnel / lane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub position: Vec2,
    /// Fixed category; `None` picks from the palette
    #[serde(default)]
    pub category: Option<Category>,
    /// Finite supply; `None` never runs out
    #[serde(default)]
    pub supply: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorSpec {
    pub category: Category,
    pub capacity: usize,
    pub position: Vec2,
}

/// Game balance and board layout for one mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    pub mode: Mode,

    // === Round ===
    /// Countdown length in timer units
    pub round_secs: u32,
    pub timer_interval_ms: u64,

    // === Spawning ===
    /// Categories random picks draw from
    pub palette: Vec<Category>,
    pub sources: Vec<SourceSpec>,
    pub transit_ms: u64,
    pub easing: Easing,
    /// Automatic spawn period (catcher)
    pub auto_spawn_ms: Option<u64>,

    // === Tray ===
    pub tray_capacity: usize,
    /// Center of slot 0
    pub tray_origin: Vec2,
    pub slot_spacing: f32,
    pub match_threshold: usize,
    pub removal_grace_ms: u64,

    // === Collectors ===
    pub collectors: Vec<CollectorSpec>,
    /// Collector category rotation period (catcher)
    pub rotate_collectors_ms: Option<u64>,

    // === Scoring ===
    pub landing_score: u64,
    pub match_bonus: u64,
    pub collect_score: u64,
    pub miss_penalty: u64,
    pub win_bonus: u64,
    pub win_bonus_per_second: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self::tray()
    }
}

impl Tuning {
    /// Preset for a mode
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Tray => Self::tray(),
            Mode::Basket => Self::basket(),
            Mode::Catcher => Self::catcher(),
        }
    }

    /// Five color dispensers above a 7-slot tray
    pub fn tray() -> Self {
        let sources = Category::ALL
            .iter()
            .enumerate()
            .map(|(i, &category)| SourceSpec {
                position: Vec2::new(60.0 + i as f32 * 80.0, 20.0),
                category: Some(category),
                supply: None,
            })
            .collect();

        Self {
            mode: Mode::Tray,
            round_secs: TRAY_ROUND_SECS,
            timer_interval_ms: TIMER_INTERVAL_MS,
            palette: Category::ALL.to_vec(),
            sources,
            transit_ms: TRAY_TRANSIT_MS,
            easing: Easing::CubicOut,
            auto_spawn_ms: None,
            tray_capacity: TRAY_CAPACITY,
            tray_origin: Vec2::new(44.0, 420.0),
            slot_spacing: 64.0,
            match_threshold: MATCH_THRESHOLD,
            removal_grace_ms: REMOVAL_GRACE_MS,
            collectors: Vec::new(),
            rotate_collectors_ms: None,
            landing_score: LANDING_SCORE,
            match_bonus: MATCH_BONUS,
            collect_score: 0,
            miss_penalty: 0,
            win_bonus: 0,
            win_bonus_per_second: 0,
        }
    }

    /// Five fruit tunnels feeding a yellow and an orange basket
    pub fn basket() -> Self {
        let sources = (0..TUNNEL_COUNT)
            .map(|i| SourceSpec {
                position: Vec2::new(i as f32 * 4.0 - 8.0, -6.0),
                category: None,
                supply: Some(TUNNEL_SUPPLY),
            })
            .collect();

        Self {
            mode: Mode::Basket,
            round_secs: BASKET_ROUND_SECS,
            timer_interval_ms: TIMER_INTERVAL_MS,
            palette: vec![Category::Yellow, Category::Orange],
            sources,
            transit_ms: BASKET_TRANSIT_MS,
            easing: Easing::QuadOut,
            auto_spawn_ms: None,
            tray_capacity: 0,
            tray_origin: Vec2::ZERO,
            slot_spacing: 0.0,
            match_threshold: MATCH_THRESHOLD,
            removal_grace_ms: REMOVAL_GRACE_MS,
            collectors: vec![
                CollectorSpec {
                    category: Category::Yellow,
                    capacity: BASKET_CAPACITY,
                    position: Vec2::new(-3.0, 8.0),
                },
                CollectorSpec {
                    category: Category::Orange,
                    capacity: BASKET_CAPACITY,
                    position: Vec2::new(3.0, 8.0),
                },
            ],
            rotate_collectors_ms: None,
            landing_score: 0,
            match_bonus: 0,
            collect_score: COLLECT_SCORE,
            miss_penalty: MISS_PENALTY,
            win_bonus: WIN_BONUS,
            win_bonus_per_second: WIN_BONUS_PER_SECOND,
        }
    }

    /// Fruits falling from five lanes into one color-changing catcher
    pub fn catcher() -> Self {
        let sources = (0..CATCHER_LANES)
            .map(|i| SourceSpec {
                position: Vec2::new(80.0 + i as f32 * 160.0, -50.0),
                category: None,
                supply: None,
            })
            .collect();

        Self {
            mode: Mode::Catcher,
            round_secs: CATCHER_ROUND_SECS,
            timer_interval_ms: TIMER_INTERVAL_MS,
            palette: vec![Category::Yellow, Category::Orange],
            sources,
            transit_ms: CATCHER_TRANSIT_MS,
            easing: Easing::Linear,
            auto_spawn_ms: Some(CATCHER_SPAWN_MS),
            tray_capacity: 0,
            tray_origin: Vec2::ZERO,
            slot_spacing: 0.0,
            match_threshold: MATCH_THRESHOLD,
            removal_grace_ms: REMOVAL_GRACE_MS,
            // The catcher never fills up, so there is no win
            collectors: vec![CollectorSpec {
                category: Category::Yellow,
                capacity: usize::MAX,
                position: Vec2::new(400.0, 500.0),
            }],
            rotate_collectors_ms: Some(CATCHER_ROTATE_MS),
            landing_score: 0,
            match_bonus: 0,
            collect_score: COLLECT_SCORE,
            miss_penalty: MISS_PENALTY,
            win_bonus: 0,
            win_bonus_per_second: 0,
        }
    }

    /// Parse a (possibly partial) tuning document over its mode's preset
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let overrides: serde_json::Value = serde_json::from_str(json)?;
        let mode = match overrides.get("mode") {
            Some(mode) => serde_json::from_value(mode.clone())?,
            None => Mode::default(),
        };

        let mut merged = serde_json::to_value(Self::for_mode(mode))?;
        if let (Some(base), Some(patch)) = (merged.as_object_mut(), overrides.as_object()) {
            for (key, value) in patch {
                base.insert(key.clone(), value.clone());
            }
        }

        let tuning: Self = serde_json::from_value(merged)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Load a tuning file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TuningError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let tuning = Self::from_json(&json)?;
        log::info!(
            "Loaded {} tuning from {}",
            tuning.mode.as_str(),
            path.as_ref().display()
        );
        Ok(tuning)
    }

    pub fn to_json(&self) -> Result<String, TuningError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), TuningError> {
        if self.round_secs == 0 {
            return Err(TuningError::Invalid("round_secs must be positive"));
        }
        if self.timer_interval_ms == 0 {
            return Err(TuningError::Invalid("timer_interval_ms must be positive"));
        }
        if self.sources.is_empty() {
            return Err(TuningError::Invalid("at least one source is required"));
        }
        if self.palette.is_empty() && self.sources.iter().any(|s| s.category.is_none()) {
            return Err(TuningError::Invalid(
                "sources without a fixed category need a palette",
            ));
        }
        if self.transit_ms == 0 {
            return Err(TuningError::Invalid("transit_ms must be positive"));
        }
        if self.auto_spawn_ms == Some(0) || self.rotate_collectors_ms == Some(0) {
            return Err(TuningError::Invalid("periodic events need a positive period"));
        }

        if self.mode.uses_tray() {
            if self.tray_capacity == 0 {
                return Err(TuningError::Invalid("tray_capacity must be positive"));
            }
            if self.match_threshold < 2 {
                return Err(TuningError::Invalid("match_threshold must be at least 2"));
            }
        } else {
            if self.collectors.is_empty() {
                return Err(TuningError::Invalid("collector modes need a collector"));
            }
            if self.collectors.iter().any(|c| c.capacity == 0) {
                return Err(TuningError::Invalid("collector capacity must be positive"));
            }
        }
        Ok(())
    }

    /// Board position of a tray slot (where blocks are aimed)
    pub fn slot_position(&self, slot: usize) -> Vec2 {
        self.tray_origin + Vec2::new(slot as f32 * self.slot_spacing, 0.0)
    }
}
