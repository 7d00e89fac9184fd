//! Sort Rush headless driver
//!
//! Plays one round with a simple autoplayer at a fixed frame step and prints
//! the final snapshot as JSON. Useful for balancing tuning files.

use std::path::PathBuf;

use clap::Parser;

use sort_rush::sim::{
    Category, EntityId, GameEvent, GameState, SourceId, SpawnRequest, TickInput, tick,
};
use sort_rush::{Mode, Tuning, format_clock};

#[derive(Parser)]
#[command(version, about = "Sort Rush: headless round runner")]
struct Cli {
    /// Game mode (tray, basket, catcher). Ignored when --tuning is given.
    #[arg(long, default_value = "tray", value_parser = parse_mode)]
    mode: Mode,

    /// RNG seed
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// JSON tuning file (overlays the preset of its mode)
    #[arg(long, value_name = "PATH")]
    tuning: Option<PathBuf>,

    /// Stop after this much simulated time
    #[arg(long, default_value_t = 120_000)]
    max_ms: u64,

    /// Simulated time per frame
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    Mode::from_str(s).ok_or_else(|| format!("unknown mode '{s}'"))
}

/// Decides what the autoplayer does each frame
#[derive(Debug, Default)]
struct Autoplayer {
    next_source: usize,
    dodged: Vec<EntityId>,
}

impl Autoplayer {
    fn plan(&mut self, state: &GameState) -> TickInput {
        let mut input = TickInput::default();
        match state.mode() {
            Mode::Tray => {
                // One block at a time, feeding the color the tray holds most of
                if state.transits().is_empty() {
                    if let Some(source) = self.pick_tray_source(state) {
                        input.spawns.push(SpawnRequest::from_source(source));
                    }
                }
            }
            Mode::Basket => {
                if state.transits().is_empty() {
                    if let Some(source) = self.next_with_supply(state) {
                        input.spawns.push(SpawnRequest::from_source(source));
                    }
                }
            }
            Mode::Catcher => {
                let Some(catcher) = state.collectors().first() else {
                    return input;
                };
                for transit in state.transits().iter() {
                    let id = transit.entity.id;
                    if transit.progress() >= 0.5
                        && !catcher.accepts(transit.entity.category)
                        && !self.dodged.contains(&id)
                    {
                        self.dodged.push(id);
                        input.missed.push(id);
                    }
                }
            }
        }
        input
    }

    fn pick_tray_source(&mut self, state: &GameState) -> Option<SourceId> {
        let tray = state.tray()?;
        let mut counts: Vec<(Category, usize)> = Category::ALL.iter().map(|&c| (c, 0)).collect();
        for entity in tray.slots().iter().flatten().filter(|e| e.is_idle()) {
            if let Some(entry) = counts.iter_mut().find(|(c, _)| *c == entity.category) {
                entry.1 += 1;
            }
        }
        let wanted = counts
            .iter()
            .filter(|(_, n)| *n > 0)
            .max_by_key(|(_, n)| *n)
            .map(|(c, _)| *c);

        let sources = state.sources();
        match wanted.and_then(|c| sources.iter().find(|s| s.category == Some(c))) {
            Some(source) => Some(source.id),
            None => {
                let source = sources.get(self.next_source % sources.len().max(1))?;
                self.next_source += 1;
                Some(source.id)
            }
        }
    }

    fn next_with_supply(&mut self, state: &GameState) -> Option<SourceId> {
        let sources = state.sources();
        for _ in 0..sources.len() {
            let source = &sources[self.next_source % sources.len()];
            self.next_source += 1;
            if !source.is_exhausted() {
                return Some(source.id);
            }
        }
        None
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let tuning = match &cli.tuning {
        Some(path) => match Tuning::load(path) {
            Ok(tuning) => tuning,
            Err(e) => {
                eprintln!("Error loading {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => Tuning::for_mode(cli.mode),
    };
    if cli.frame_ms == 0 {
        eprintln!("Error: --frame-ms must be positive");
        std::process::exit(1);
    }

    log::info!("Sort Rush (native) starting...");
    let mut state = match GameState::new(tuning, cli.seed) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let mut autoplayer = Autoplayer::default();

    let start = TickInput {
        start: true,
        ..Default::default()
    };
    tick(&mut state, &start, 0);

    while !state.phase().is_terminal() && state.now_ms() < cli.max_ms {
        let input = autoplayer.plan(&state);
        tick(&mut state, &input, cli.frame_ms);

        for event in state.drain_events() {
            match event {
                GameEvent::TimerTick { time_left } => log::debug!("{}", format_clock(time_left)),
                other => log::trace!("{other:?}"),
            }
        }
    }

    log::info!(
        "Finished: {} with score {} after {} ms",
        state.phase(),
        state.score(),
        state.now_ms()
    );
    match serde_json::to_string_pretty(&state.snapshot()) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
