use anyhow::{Context, Result};
use serde::Serialize;
use std::time::{Duration, Instant};

use spellbinder_game::{
    GameEngine, GameState, MemoryStorage, ResourceId, StaticLoader, TalentPreset,
};

use crate::policy::{PolicyAction, SessionPolicy};

/// Parameters shared by every seed of a run.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub preset: Option<TalentPreset>,
    pub minutes: u64,
    pub tick_ms: u64,
    pub verbose: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            preset: Some(TalentPreset::Fire),
            minutes: 10,
            tick_ms: 1_000,
            verbose: false,
        }
    }
}

/// End-of-session numbers for one seed.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub seed: u64,
    pub preset: Option<String>,
    pub minutes: u64,
    pub level: u32,
    pub lifetime_experience: u64,
    pub skills: Vec<(String, u32)>,
    pub spells: Vec<String>,
    pub classes: Vec<String>,
    pub gold: f64,
    pub activities_completed: u32,
    pub explorations: u32,
    pub combats_won: u32,
    pub combats_lost: u32,
    pub round_trip_ok: bool,
    pub failures: Vec<String>,
    #[serde(skip)]
    pub wall_time: Duration,
}

impl SessionSummary {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Play one seed with `policy`, then save, reload and compare snapshots.
///
/// # Errors
///
/// Returns an error if the definitions cannot be loaded or the save cannot be read back.
pub fn run_session(
    seed: u64,
    config: &SessionConfig,
    policy: &mut dyn SessionPolicy,
) -> Result<SessionSummary> {
    let started = Instant::now();
    let engine = GameEngine::new(StaticLoader, MemoryStorage::default());
    let mut game = engine
        .new_game(seed, &format!("Sim-{seed}"), config.preset)
        .context("failed to create game")?;

    let tick_ms = config.tick_ms.max(1);
    let end = config.minutes.saturating_mul(60_000);
    let mut now = 0;
    game.tick(now);
    while now < end {
        let action = policy.act(&mut game);
        if config.verbose && action != PolicyAction::Idle {
            println!(
                "  [seed {seed} t={:>5}s] {} {action}",
                now / 1_000,
                policy.name()
            );
        }
        now += tick_ms;
        game.tick(now);
    }

    let mut failures = check_invariants(&game);
    let slot = format!("seed-{seed}");
    let round_trip_ok = if engine.save(&slot, &mut game, now) {
        let reloaded = engine
            .load(&slot)?
            .with_context(|| format!("save `{slot}` vanished"))?;
        reloaded.to_save(now) == game.to_save(now)
    } else {
        false
    };
    if !round_trip_ok {
        failures.push("save/reload snapshot mismatch".to_string());
    }

    Ok(summarize(seed, config, &game, round_trip_ok, failures, started.elapsed()))
}

fn check_invariants(game: &GameState) -> Vec<String> {
    let mut failures = Vec::new();
    for resource in game.player().resources().iter() {
        let value = resource.value();
        if !value.is_finite() || value < 0.0 {
            failures.push(format!("{} is {value}", resource.id));
        }
        if let Some(max) = resource.max()
            && value > max + 1e-9
        {
            failures.push(format!("{} exceeds its cap ({value} > {max})", resource.id));
        }
    }
    if game.player().level() == 0 {
        failures.push("player level dropped to zero".to_string());
    }
    failures
}

fn summarize(
    seed: u64,
    config: &SessionConfig,
    game: &GameState,
    round_trip_ok: bool,
    failures: Vec<String>,
    wall_time: Duration,
) -> SessionSummary {
    let player = game.player();
    let stats = game.stats();
    SessionSummary {
        seed,
        preset: config.preset.map(|p| p.as_str().to_string()),
        minutes: config.minutes,
        level: player.level(),
        lifetime_experience: player.lifetime_experience(),
        skills: player
            .skills()
            .iter()
            .map(|(def, skill)| (def.id.clone(), skill.level()))
            .collect(),
        spells: player
            .spells()
            .learned()
            .map(|(def, _)| def.id.clone())
            .collect(),
        classes: player.classes().unlocked_ids().to_vec(),
        gold: player.resources().value(ResourceId::Gold),
        activities_completed: stats.activities_completed,
        explorations: stats.explorations,
        combats_won: stats.combats_won,
        combats_lost: stats.combats_lost,
        round_trip_ok,
        failures,
        wall_time,
    }
}
