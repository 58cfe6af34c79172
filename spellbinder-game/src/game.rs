//! Game orchestrator: owns the player, scheduler, locales and any live encounter,
//! and drives the per-tick update cascade.
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::activity::{ActivityData, ActivityInstance, ActivityKind, ActivityRunner};
use crate::class_tree::ClassNode;
use crate::combat::{AutoOutcome, CombatConfig, CombatResult, CombatSystem};
use crate::constants::{
    COMBAT_TURN_DELAY_MS, EXPLORE_COMBAT_MAX_ROUNDS, REWARD_SKILL_EXP, SAVE_VERSION,
    achievement_ids,
};
use crate::definitions::Definitions;
use crate::explore::{ExploreEvent, LocaleManager};
use crate::item::EquipmentSlot;
use crate::learning::{
    practice_skill_exp, skill_practice, skill_training, spell_learning, training_skill_exp,
};
use crate::monster::Monster;
use crate::numbers::{floor_f64_to_u64, u64_to_f64};
use crate::player::Player;
use crate::resource::ResourceId;
use crate::save::{LoadError, RngState, SaveData, SaveMeta};
use crate::skill::Skill;
use crate::talent::TalentPreset;

/// Counters for the current session; not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub activities_completed: u32,
    pub explorations: u32,
    pub expeditions_failed: u32,
    pub combats_won: u32,
    pub combats_lost: u32,
    pub combats_drawn: u32,
}

/// How a completed activity's typed effect resolved.
enum Resolution {
    Settled,
    Forfeited,
}

#[derive(Debug)]
pub struct GameState {
    defs: Definitions,
    game_time_ms: u64,
    is_paused: bool,
    last_update_ms: Option<u64>,
    seed: u64,
    rng: ChaCha20Rng,
    preset: Option<TalentPreset>,
    player: Player,
    runner: ActivityRunner,
    locales: LocaleManager,
    combat: Option<CombatSystem>,
    combat_config: CombatConfig,
    next_turn_at_ms: u64,
    stats: SessionStats,
}

impl GameState {
    #[must_use]
    pub fn with_seed(
        seed: u64,
        name: impl Into<String>,
        preset: Option<TalentPreset>,
        defs: Definitions,
    ) -> Self {
        let player = Player::new(name, preset, &defs);
        let locales = LocaleManager::new(Arc::clone(&defs.locales));
        Self {
            defs,
            game_time_ms: 0,
            is_paused: false,
            last_update_ms: None,
            seed,
            rng: ChaCha20Rng::seed_from_u64(seed),
            preset,
            player,
            runner: ActivityRunner::new(),
            locales,
            combat: None,
            combat_config: CombatConfig::default(),
            next_turn_at_ms: 0,
            stats: SessionStats::default(),
        }
    }

    #[must_use]
    pub fn with_combat_config(mut self, config: CombatConfig) -> Self {
        self.combat_config = config;
        self
    }

    #[must_use]
    pub const fn combat_config(&self) -> &CombatConfig {
        &self.combat_config
    }

    #[must_use]
    pub const fn definitions(&self) -> &Definitions {
        &self.defs
    }

    #[must_use]
    pub const fn player(&self) -> &Player {
        &self.player
    }

    pub const fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    #[must_use]
    pub const fn runner(&self) -> &ActivityRunner {
        &self.runner
    }

    pub const fn runner_mut(&mut self) -> &mut ActivityRunner {
        &mut self.runner
    }

    #[must_use]
    pub const fn locales(&self) -> &LocaleManager {
        &self.locales
    }

    #[must_use]
    pub const fn combat(&self) -> Option<&CombatSystem> {
        self.combat.as_ref()
    }

    #[must_use]
    pub const fn stats(&self) -> SessionStats {
        self.stats
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub const fn preset(&self) -> Option<TalentPreset> {
        self.preset
    }

    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.is_paused
    }

    #[must_use]
    pub const fn game_time_ms(&self) -> u64 {
        self.game_time_ms
    }

    #[must_use]
    pub fn game_time_seconds(&self) -> f64 {
        u64_to_f64(self.game_time_ms) / 1000.0
    }

    /// Returns the new paused state.
    pub fn toggle_pause(&mut self) -> bool {
        self.is_paused = !self.is_paused;
        let message = if self.is_paused { "game paused" } else { "game resumed" };
        self.player.journal_mut().info(message);
        self.is_paused
    }

    /// Start over with a fresh player under the same name, preset and seed.
    pub fn reset(&mut self) {
        let name = self.player.name().to_string();
        self.player = Player::new(name, self.preset, &self.defs);
        self.runner = ActivityRunner::new();
        self.locales = LocaleManager::new(Arc::clone(&self.defs.locales));
        self.combat = None;
        self.rng = ChaCha20Rng::seed_from_u64(self.seed);
        self.game_time_ms = 0;
        self.is_paused = false;
        self.last_update_ms = None;
        self.next_turn_at_ms = 0;
        self.stats = SessionStats::default();
        self.player.journal_mut().info("game reset");
    }

    /// Advance the simulation to wall-clock `now_ms`.
    ///
    /// The first call only records the clock. Paused ticks move the wall clock but
    /// not the game clock. Returns the activity completed during this tick, if any.
    pub fn tick(&mut self, now_ms: u64) -> Option<ActivityInstance> {
        let delta_ms = self
            .last_update_ms
            .map_or(0, |last| now_ms.saturating_sub(last));
        self.last_update_ms = Some(now_ms);
        if self.is_paused {
            return None;
        }
        self.game_time_ms += delta_ms;
        let now = self.game_time_ms;

        self.player.set_clock(now);
        self.player.update(u64_to_f64(delta_ms) / 1000.0);
        self.discover_locales();
        self.advance_combat(now);

        let finished = self.runner.update(now);
        if let Some(instance) = &finished {
            self.complete_activity(instance);
        }
        self.player.settle_achievement_rewards();
        finished
    }

    fn discover_locales(&mut self) {
        let ctx = self.player.requirement_context();
        let found = self
            .locales
            .discover_eligible(&ctx, self.player.achievements_mut());
        for id in found {
            let name = self
                .locales
                .locale(&id)
                .map_or_else(|| id.clone(), |l| l.name.clone());
            self.player
                .journal_mut()
                .success(format!("discovered a new locale: {name}"));
        }
    }

    fn advance_combat(&mut self, now: u64) {
        let Some(combat) = self.combat.as_mut() else {
            return;
        };
        if combat.is_active() && now >= self.next_turn_at_ms {
            combat.step(&mut self.player, &mut self.rng);
            self.next_turn_at_ms = now + COMBAT_TURN_DELAY_MS;
        }
        if !combat.is_active() {
            let result = combat.result();
            self.combat = None;
            self.record_combat_result(result);
        }
    }

    fn record_combat_result(&mut self, result: CombatResult) {
        let journal = self.player.journal_mut();
        match result {
            CombatResult::Victory => {
                self.stats.combats_won += 1;
                journal.success("won the battle");
            }
            CombatResult::Defeat => {
                self.stats.combats_lost += 1;
                journal.warning("lost the battle");
            }
            CombatResult::Fled => journal.info("escaped from the battle"),
            CombatResult::Ongoing => {}
        }
    }

    /// Begin an interactive encounter; one half-turn resolves per turn delay.
    pub fn start_combat(&mut self, monster_ids: &[&str]) -> bool {
        if self.combat.is_some() {
            self.player
                .journal_mut()
                .warning("already in combat");
            return false;
        }
        if monster_ids.is_empty() {
            self.player.journal_mut().warning("no monsters to fight");
            return false;
        }
        let mut monsters = Vec::with_capacity(monster_ids.len());
        for id in monster_ids {
            let Some(def) = self.defs.monster(id) else {
                self.player
                    .journal_mut()
                    .warning(format!("unknown monster `{id}`"));
                return false;
            };
            monsters.push(Monster::spawn(def));
        }
        let names: Vec<&str> = monsters.iter().map(Monster::name).collect();
        let message = format!("combat started against {}", names.join(", "));
        self.combat = Some(CombatSystem::new(monsters, self.combat_config.clone()));
        self.next_turn_at_ms = self.game_time_ms;
        self.player.journal_mut().info(message);
        true
    }

    /// Leave the current encounter without rewards.
    pub fn flee(&mut self) -> bool {
        let Some(combat) = self.combat.as_mut() else {
            return false;
        };
        if !combat.flee() {
            return false;
        }
        self.combat = None;
        self.record_combat_result(CombatResult::Fled);
        true
    }

    /// Deduct costs and start or queue an activity. Returns the instance id.
    pub fn start_activity(&mut self, activity: ActivityData) -> Option<u64> {
        let name = activity.name.clone();
        let queued = self.runner.current().is_some();
        let started =
            self.runner
                .start_activity(activity, self.player.resources_mut(), self.game_time_ms);
        let journal = self.player.journal_mut();
        match started {
            Some(_) if queued => journal.info(format!("queued {name}")),
            Some(_) => journal.info(format!("started {name}")),
            None => journal.warning(format!("cannot afford {name}")),
        }
        started
    }

    /// Start one of the basic activities from the definition tables.
    pub fn start_basic_activity(&mut self, activity_id: &str) -> Option<u64> {
        let Some(activity) = self.defs.activity(activity_id).cloned() else {
            self.player
                .journal_mut()
                .warning(format!("unknown activity `{activity_id}`"));
            return None;
        };
        self.start_activity(activity)
    }

    pub fn start_spell_learning(&mut self, spell_id: &str) -> Option<u64> {
        let spells = Arc::clone(&self.defs.spells);
        let Some(def) = spells.get(spell_id) else {
            self.player
                .journal_mut()
                .warning(format!("unknown spell `{spell_id}`"));
            return None;
        };
        if self.player.spells().is_learned(spell_id) {
            self.player
                .journal_mut()
                .warning(format!("{} is already learned", def.name));
            return None;
        }
        if !def.can_learn(&self.player) {
            self.player
                .journal_mut()
                .warning(format!("requirements for {} are not met", def.name));
            return None;
        }
        let activity = spell_learning(def, self.player.talent());
        self.start_activity(activity)
    }

    pub fn start_skill_practice(&mut self, skill_id: &str) -> Option<u64> {
        let skills = Arc::clone(&self.defs.skills);
        let Some(def) = skills.get(skill_id) else {
            self.player
                .journal_mut()
                .warning(format!("unknown skill `{skill_id}`"));
            return None;
        };
        let Some((level, maxed)) = self
            .player
            .skills()
            .get(skill_id)
            .map(|s| (s.level(), s.is_maxed()))
        else {
            self.player
                .journal_mut()
                .warning(format!("{} must be acquired before practice", def.name));
            return None;
        };
        if maxed {
            self.player
                .journal_mut()
                .warning(format!("{} is already at its maximum level", def.name));
            return None;
        }
        let activity = skill_practice(def, level, self.player.talent());
        self.start_activity(activity)
    }

    pub fn start_skill_training(&mut self, skill_id: &str) -> Option<u64> {
        let skills = Arc::clone(&self.defs.skills);
        let Some(def) = skills.get(skill_id) else {
            self.player
                .journal_mut()
                .warning(format!("unknown skill `{skill_id}`"));
            return None;
        };
        let acquired = self.player.skills().get(skill_id).map(Skill::is_maxed);
        if acquired == Some(true) {
            self.player
                .journal_mut()
                .warning(format!("{} is already at its maximum level", def.name));
            return None;
        }
        if acquired.is_none() && !def.can_unlock(&self.player) {
            self.player
                .journal_mut()
                .warning(format!("requirements for {} are not met", def.name));
            return None;
        }
        let activity = skill_training(def, self.player.talent());
        self.start_activity(activity)
    }

    pub fn start_exploration(&mut self, locale_id: &str) -> Option<u64> {
        let stamina = self.player.resources().value(ResourceId::Stamina);
        if let Err(blocker) = self.locales.check_explore(locale_id, &self.player, stamina) {
            self.player
                .journal_mut()
                .warning(format!("cannot explore `{locale_id}`: {blocker}"));
            return None;
        }
        let activity = self
            .locales
            .create_explore_activity(locale_id, &mut self.rng)?;
        self.start_activity(activity)
    }

    pub fn unlock_class(&mut self, class_id: &str) -> bool {
        self.player.unlock_class(class_id)
    }

    /// Refused while an encounter is running.
    pub fn equip_item(&mut self, item_id: &str) -> bool {
        if self.combat.is_some() {
            self.player
                .journal_mut()
                .warning(format!("cannot change gear mid-combat: `{item_id}`"));
            return false;
        }
        self.player.equip(item_id)
    }

    pub fn unequip_item(&mut self, slot: EquipmentSlot) -> bool {
        if self.combat.is_some() {
            self.player
                .journal_mut()
                .warning(format!("cannot change gear mid-combat: {slot}"));
            return false;
        }
        self.player.unequip(slot)
    }

    pub fn use_item(&mut self, item_id: &str) -> bool {
        self.player.use_item(item_id)
    }

    pub fn available_classes(&mut self) -> Vec<&ClassNode> {
        let now = self.game_time_ms;
        self.player.available_classes(now)
    }

    fn complete_activity(&mut self, instance: &ActivityInstance) {
        let activity = &instance.activity;
        self.stats.activities_completed += 1;
        let achievements = self.player.achievements_mut();
        achievements.increment(achievement_ids::FIRST_ACTIVITY, 1.0);
        achievements.increment(achievement_ids::ACTIVITY_MASTER, 1.0);
        self.player
            .journal_mut()
            .success(format!("completed {}", activity.name));

        if let Some(kind) = &activity.kind {
            match self.resolve_kind(kind) {
                Ok(Resolution::Settled) => {}
                Ok(Resolution::Forfeited) => return,
                Err(reason) => {
                    self.player.journal_mut().warning(format!(
                        "{} could not be resolved: {reason}; rewards withheld",
                        activity.name
                    ));
                    return;
                }
            }
        }

        let skip_skill_exp = activity
            .kind
            .as_ref()
            .is_some_and(ActivityKind::grants_skill_exp);
        for reward in &activity.rewards {
            if skip_skill_exp && reward.resource == REWARD_SKILL_EXP {
                continue;
            }
            let amount = reward.roll(&mut self.rng);
            self.player.grant(&reward.resource, amount);
        }
    }

    fn resolve_kind(&mut self, kind: &ActivityKind) -> Result<Resolution, String> {
        match kind {
            ActivityKind::Learning { spell_id } => {
                if !self.player.grant_spell(spell_id) {
                    return Err(format!("unknown spell `{spell_id}`"));
                }
                self.player
                    .journal_mut()
                    .success(format!("learned spell `{spell_id}`"));
                Ok(Resolution::Settled)
            }
            ActivityKind::Practice { skill_id } => {
                let level = self
                    .player
                    .skills()
                    .get(skill_id)
                    .map(Skill::level)
                    .ok_or_else(|| format!("skill `{skill_id}` is not acquired"))?;
                self.player
                    .add_skill_exp(skill_id, practice_skill_exp(level));
                Ok(Resolution::Settled)
            }
            ActivityKind::Training { skill_id } => {
                if !self.player.grant_skill(skill_id) {
                    return Err(format!("unknown skill `{skill_id}`"));
                }
                self.player.add_skill_exp(skill_id, training_skill_exp());
                Ok(Resolution::Settled)
            }
            ActivityKind::Exploration { locale_id, events } => {
                self.resolve_expedition(locale_id, events)
            }
        }
    }

    fn resolve_expedition(
        &mut self,
        locale_id: &str,
        events: &[ExploreEvent],
    ) -> Result<Resolution, String> {
        let locales = Arc::clone(&self.defs.locales);
        let locale = locales
            .get(locale_id)
            .ok_or_else(|| format!("unknown locale `{locale_id}`"))?;
        let monsters = Arc::clone(&self.defs.monsters);

        for event in events {
            match event {
                ExploreEvent::Combat { monster_id, description } => {
                    let Some(def) = monsters.get(monster_id) else {
                        self.player
                            .journal_mut()
                            .warning(format!("unknown monster `{monster_id}` skipped"));
                        continue;
                    };
                    self.player.journal_mut().info(description.clone());
                    let mut combat = CombatSystem::from_defs([def], self.combat_config.clone());
                    let outcome =
                        combat.auto_execute(&mut self.player, &mut self.rng, EXPLORE_COMBAT_MAX_ROUNDS);
                    match outcome {
                        AutoOutcome::PlayerWon => {
                            self.stats.combats_won += 1;
                            self.player
                                .journal_mut()
                                .success(format!("defeated {}", def.name));
                        }
                        AutoOutcome::EnemyWon => {
                            self.stats.combats_lost += 1;
                            self.stats.expeditions_failed += 1;
                            self.player.journal_mut().warning(format!(
                                "defeated by {}; the expedition to {} is abandoned",
                                def.name, locale.name
                            ));
                            return Ok(Resolution::Forfeited);
                        }
                        AutoOutcome::Draw => {
                            self.stats.combats_drawn += 1;
                            self.player
                                .journal_mut()
                                .info(format!("broke away from {}", def.name));
                        }
                    }
                }
                ExploreEvent::Treasure { description } => {
                    let loot = locale.rewards.roll_treasure(&mut self.rng);
                    self.player.credit_loot(&loot);
                    self.player
                        .journal_mut()
                        .success(format!("{description} ({} gold)", loot.gold));
                }
                ExploreEvent::Resource { description } => {
                    let loot = locale.rewards.roll_mana(&mut self.rng);
                    self.player.credit_loot(&loot);
                    self.player.journal_mut().success(description.clone());
                }
                ExploreEvent::Empty { description } => {
                    self.player.journal_mut().info(description.clone());
                }
            }
        }

        let loot = locale.rewards.roll(&mut self.rng);
        self.player.credit_loot(&loot);
        let now = self.game_time_ms;
        self.locales
            .record_exploration(locale_id, now, self.player.achievements_mut());
        self.stats.explorations += 1;
        self.player.journal_mut().success(format!(
            "explored {}: {} gold, {} experience",
            locale.name, loot.gold, loot.experience
        ));
        Ok(Resolution::Settled)
    }

    /// Capture the whole game. `now_ms` is recorded as the save time.
    #[must_use]
    pub fn to_save(&self, now_ms: u64) -> SaveData {
        let (monsters, combat) = self.combat.as_ref().map_or_else(
            || (Vec::new(), None),
            |c| (c.monster_snapshots(), Some(c.progress())),
        );
        SaveData {
            version: SAVE_VERSION.to_string(),
            game_time: self.game_time_seconds(),
            is_paused: self.is_paused,
            last_update: self.last_update_ms.unwrap_or(0),
            player: self.player.snapshot(),
            activity_runner: self.runner.snapshot(),
            monsters,
            combat,
            locales: self.locales.snapshot(),
            rng: RngState {
                seed: self.seed,
                word_pos: u64::try_from(self.rng.get_word_pos()).unwrap_or(u64::MAX),
            },
            preset: self.preset,
            meta: SaveMeta {
                saved_at: now_ms,
                play_time: self.game_time_seconds(),
            },
        }
    }

    /// Rebuild a game from a save, re-bound to `defs`, with the default combat
    /// tuning. All or nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] when the save references ids missing from `defs`
    /// or lacks a required section.
    pub fn from_save(save: SaveData, defs: Definitions) -> Result<Self, LoadError> {
        Self::from_save_with_config(save, defs, CombatConfig::default())
    }

    /// [`GameState::from_save`] with caller-supplied combat tuning, which also
    /// drives any encounter restored from the save.
    ///
    /// # Errors
    ///
    /// Same as [`GameState::from_save`].
    pub fn from_save_with_config(
        save: SaveData,
        defs: Definitions,
        combat_config: CombatConfig,
    ) -> Result<Self, LoadError> {
        for instance in save
            .activity_runner
            .current_activity
            .iter()
            .chain(&save.activity_runner.queue)
        {
            validate_activity(&instance.activity, &defs)?;
        }
        let player = Player::restore(save.player, &defs)?;
        let locales = LocaleManager::restore(Arc::clone(&defs.locales), save.locales)?;
        let combat = match save.combat {
            Some(progress) => {
                let mut monsters = Vec::with_capacity(save.monsters.len());
                for snapshot in save.monsters {
                    let def = defs.monster(&snapshot.id).ok_or_else(|| LoadError::UnknownId {
                        kind: "monster",
                        id: snapshot.id.clone(),
                    })?;
                    monsters.push(Monster::restore(def, snapshot));
                }
                Some(CombatSystem::restore(monsters, progress, combat_config.clone()))
            }
            None => None,
        };
        let mut rng = ChaCha20Rng::seed_from_u64(save.rng.seed);
        rng.set_word_pos(u128::from(save.rng.word_pos));
        let game_time_ms = floor_f64_to_u64((save.game_time * 1000.0).round());
        Ok(Self {
            defs,
            game_time_ms,
            is_paused: save.is_paused,
            last_update_ms: (save.last_update > 0).then_some(save.last_update),
            seed: save.rng.seed,
            rng,
            preset: save.preset,
            player,
            runner: ActivityRunner::restore(save.activity_runner),
            locales,
            combat,
            combat_config,
            next_turn_at_ms: game_time_ms,
            stats: SessionStats::default(),
        })
    }
}

fn validate_activity(activity: &ActivityData, defs: &Definitions) -> Result<(), LoadError> {
    let missing = |kind: &'static str, id: &str| LoadError::UnknownId {
        kind,
        id: id.to_string(),
    };
    match &activity.kind {
        Some(ActivityKind::Learning { spell_id }) if !defs.spells.contains_key(spell_id) => {
            Err(missing("spell", spell_id))
        }
        Some(ActivityKind::Practice { skill_id } | ActivityKind::Training { skill_id })
            if !defs.skills.contains_key(skill_id) =>
        {
            Err(missing("skill", skill_id))
        }
        Some(ActivityKind::Exploration { locale_id, .. })
            if !defs.locales.contains_key(locale_id) =>
        {
            Err(missing("locale", locale_id))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityCost, ActivityReward};
    use crate::journal::JournalLevel;

    fn game() -> GameState {
        let defs = Definitions::load_from_static().unwrap();
        GameState::with_seed(42, "Tester", Some(TalentPreset::Fire), defs)
    }

    fn timed(id: &str, seconds: f64, rewards: Vec<ActivityReward>) -> ActivityData {
        ActivityData {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            duration: seconds,
            rewards,
            costs: Vec::new(),
            category: None,
            kind: None,
        }
    }

    #[test]
    fn first_tick_only_records_the_clock() {
        let mut game = game();
        game.tick(5_000);
        assert_eq!(game.game_time_ms(), 0);
        game.tick(6_500);
        assert_eq!(game.game_time_ms(), 1_500);
    }

    #[test]
    fn paused_ticks_freeze_game_time() {
        let mut game = game();
        game.tick(0);
        game.tick(1_000);
        assert!(game.toggle_pause());
        game.tick(5_000);
        assert_eq!(game.game_time_ms(), 1_000);
        assert!(!game.toggle_pause());
        game.tick(6_000);
        assert_eq!(game.game_time_ms(), 2_000);
    }

    #[test]
    fn unknown_reward_warns_and_the_rest_still_pays() {
        let mut game = game();
        game.tick(0);
        let gold = game.player().resources().value(ResourceId::Gold);
        let rewards = vec![
            ActivityReward::fixed("stardust", 5.0),
            ActivityReward::fixed("gold", 7.0),
        ];
        assert!(game.start_activity(timed("odd", 1.0, rewards)).is_some());
        let warnings = game.player().journal().count_level(JournalLevel::Warning);
        let finished = game.tick(1_000);
        assert!(finished.is_some());
        assert!((game.player().resources().value(ResourceId::Gold) - gold - 7.0).abs() < 1e-9);
        assert_eq!(
            game.player().journal().count_level(JournalLevel::Warning),
            warnings + 1
        );
    }

    #[test]
    fn training_grants_skill_exp_exactly_once() {
        let mut game = game();
        game.player_mut().resources_mut().add(ResourceId::Research, 100.0);
        game.player_mut().resources_mut().add(ResourceId::ManaFire, 100.0);
        game.tick(0);
        assert!(game.start_skill_training("fire_affinity").is_some());
        let mut now = 0;
        while game.player().skills().get("fire_affinity").is_none() {
            now += 1_000;
            game.tick(now);
            assert!(now < 60_000, "training never completed");
        }
        let skill = game.player().skills().get("fire_affinity").unwrap();
        // 100 exp: level 0 needs 100, so exactly one level and nothing left over
        assert_eq!(skill.level(), 1);
        assert_eq!(skill.exp(), 0);
    }

    #[test]
    fn practice_without_the_skill_withholds_rewards() {
        let mut game = game();
        game.tick(0);
        let practice = ActivityData {
            kind: Some(ActivityKind::Practice {
                skill_id: "fire_affinity".to_string(),
            }),
            ..timed(
                "practice_fire_affinity",
                1.0,
                vec![ActivityReward::fixed("experience", 5.0)],
            )
        };
        assert!(game.start_activity(practice).is_some());
        game.tick(1_000);
        assert_eq!(game.player().lifetime_experience(), 0);
        assert_eq!(game.stats().activities_completed, 1);
    }

    #[test]
    fn unaffordable_activity_is_rejected_without_cost() {
        let mut game = game();
        let expensive = ActivityData {
            costs: vec![ActivityCost {
                resource: ResourceId::Gold,
                amount: 1_000_000.0,
            }],
            ..timed("mansion", 10.0, Vec::new())
        };
        let gold = game.player().resources().value(ResourceId::Gold);
        assert!(game.start_activity(expensive).is_none());
        assert!((game.player().resources().value(ResourceId::Gold) - gold).abs() < f64::EPSILON);
        assert!(game.runner().is_idle());
    }

    #[test]
    fn interactive_combat_paces_half_turns() {
        let mut game = game();
        game.player_mut().grant_spell("spark");
        game.player_mut().resources_mut().add(ResourceId::ManaFire, 100.0);
        game.tick(0);
        assert!(game.start_combat(&["training_dummy"]));
        assert!(!game.start_combat(&["training_dummy"]));
        game.tick(100);
        let turns = game.combat().map(CombatSystem::turn_count);
        game.tick(200);
        assert_eq!(game.combat().map(CombatSystem::turn_count), turns);
        let mut now = 200;
        while game.combat().is_some() {
            now += COMBAT_TURN_DELAY_MS;
            game.tick(now);
            assert!(now < 120_000, "combat never finished");
        }
        assert_eq!(game.stats().combats_won, 1);
    }

    #[test]
    fn flee_ends_combat_without_rewards() {
        let mut game = game();
        game.tick(0);
        assert!(game.start_combat(&["slime"]));
        let gold = game.player().resources().value(ResourceId::Gold);
        assert!(game.flee());
        assert!(game.combat().is_none());
        assert!(!game.flee());
        assert!((game.player().resources().value(ResourceId::Gold) - gold).abs() < f64::EPSILON);
    }

    #[test]
    fn reset_restores_a_fresh_player() {
        let mut game = game();
        game.player_mut().add_experience(500);
        game.reset();
        assert_eq!(game.player().level(), 1);
        assert_eq!(game.player().name(), "Tester");
        assert_eq!(game.game_time_ms(), 0);
    }

    #[test]
    fn save_round_trip_is_identical() {
        let mut game = game();
        game.tick(0);
        game.start_basic_activity("meditate");
        game.start_basic_activity("study");
        game.tick(3_000);
        let save = game.to_save(99);
        let json = save.to_json().unwrap();
        let restored = GameState::from_save(
            SaveData::from_json(&json).unwrap(),
            game.definitions().clone(),
        )
        .unwrap();
        assert_eq!(restored.to_save(99), save);
    }
}
