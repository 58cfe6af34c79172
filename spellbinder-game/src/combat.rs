//! Turn-based combat: one player against a line of monsters.
//!
//! The engine alternates strictly between a player half-turn and a monster
//! half-turn. Interactive play advances one half-turn per [`CombatSystem::step`];
//! [`CombatSystem::auto_execute`] runs the whole loop synchronously.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{
    AUTO_COMBAT_MAX_ROUNDS, AUTO_COMBAT_ROUND_SECONDS, DEFAULT_MODIFIER_DURATION,
    WEALTHY_GOLD_THRESHOLD, achievement_ids,
};
use crate::element::Element;
use crate::monster::{
    Loot, Modifier, Modifiers, Monster, MonsterDef, MonsterSnapshot, modifier_total,
    tick_modifiers,
};
use crate::numbers::{floor_f64_to_u32, u64_to_f64};
use crate::player::Player;
use crate::resource::ResourceId;
use crate::spell::{SpellDef, SpellEffect, SpellEffectKind, SpellTarget};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatConfig {
    /// Effect kinds tried in order when choosing the player's spell.
    #[serde(default = "CombatConfig::default_priority")]
    pub priority: Vec<SpellEffectKind>,
    /// Seconds of cooldown decay per synchronous round.
    #[serde(default = "CombatConfig::default_round_seconds")]
    pub round_seconds: f64,
    #[serde(default = "CombatConfig::default_max_rounds")]
    pub max_rounds: u32,
}

impl CombatConfig {
    fn default_priority() -> Vec<SpellEffectKind> {
        vec![
            SpellEffectKind::Damage,
            SpellEffectKind::Heal,
            SpellEffectKind::Buff,
        ]
    }

    const fn default_round_seconds() -> f64 {
        AUTO_COMBAT_ROUND_SECONDS
    }

    const fn default_max_rounds() -> u32 {
        AUTO_COMBAT_MAX_ROUNDS
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            priority: Self::default_priority(),
            round_seconds: Self::default_round_seconds(),
            max_rounds: Self::default_max_rounds(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Turn {
    #[default]
    Player,
    Monster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CombatResult {
    #[default]
    Ongoing,
    Victory,
    Defeat,
    Fled,
}

impl CombatResult {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ongoing => "ongoing",
            Self::Victory => "victory",
            Self::Defeat => "defeat",
            Self::Fled => "fled",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Ongoing)
    }
}

impl fmt::Display for CombatResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse result of a synchronous encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoOutcome {
    PlayerWon,
    EnemyWon,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombatLogKind {
    Info,
    Damage,
    Heal,
    Buff,
    Debuff,
    Victory,
    Defeat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatLogEntry {
    pub turn: u32,
    #[serde(rename = "type")]
    pub kind: CombatLogKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// Turn state persisted alongside the monster snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatProgress {
    pub current_turn: Turn,
    pub is_active: bool,
    pub result: CombatResult,
    pub turn_count: u32,
    #[serde(default)]
    pub combat_log: Vec<CombatLogEntry>,
    #[serde(default)]
    pub player_buffs: Modifiers,
}

#[derive(Debug, Clone)]
pub struct CombatSystem {
    monsters: Vec<Monster>,
    current_turn: Turn,
    log: Vec<CombatLogEntry>,
    is_active: bool,
    result: CombatResult,
    turn_count: u32,
    player_buffs: Modifiers,
    config: CombatConfig,
    rewards: Option<Loot>,
}

impl CombatSystem {
    #[must_use]
    pub fn new(monsters: Vec<Monster>, config: CombatConfig) -> Self {
        let mut combat = Self {
            monsters,
            current_turn: Turn::Player,
            log: Vec::new(),
            is_active: true,
            result: CombatResult::Ongoing,
            turn_count: 0,
            player_buffs: Modifiers::new(),
            config,
            rewards: None,
        };
        combat.push_log(CombatLogKind::Info, "combat started".to_string());
        let count = combat.monsters.len();
        combat.push_log(CombatLogKind::Info, format!("encountered {count} monster(s)"));
        if count == 0 {
            combat.finish(CombatResult::Victory, "no opposition");
        }
        combat
    }

    /// Spawn fresh monster instances from their definitions.
    #[must_use]
    pub fn from_defs<'a>(defs: impl IntoIterator<Item = &'a MonsterDef>, config: CombatConfig) -> Self {
        Self::new(defs.into_iter().map(Monster::spawn).collect(), config)
    }

    #[must_use]
    pub fn restore(monsters: Vec<Monster>, progress: CombatProgress, config: CombatConfig) -> Self {
        Self {
            monsters,
            current_turn: progress.current_turn,
            log: progress.combat_log,
            is_active: progress.is_active,
            result: progress.result,
            turn_count: progress.turn_count,
            player_buffs: progress.player_buffs,
            config,
            rewards: None,
        }
    }

    #[must_use]
    pub fn progress(&self) -> CombatProgress {
        CombatProgress {
            current_turn: self.current_turn,
            is_active: self.is_active,
            result: self.result,
            turn_count: self.turn_count,
            combat_log: self.log.clone(),
            player_buffs: self.player_buffs.clone(),
        }
    }

    #[must_use]
    pub fn monster_snapshots(&self) -> Vec<MonsterSnapshot> {
        self.monsters.iter().map(Monster::snapshot).collect()
    }

    #[must_use]
    pub fn monsters(&self) -> &[Monster] {
        &self.monsters
    }

    #[must_use]
    pub const fn current_turn(&self) -> Turn {
        self.current_turn
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub const fn result(&self) -> CombatResult {
        self.result
    }

    #[must_use]
    pub const fn turn_count(&self) -> u32 {
        self.turn_count
    }

    #[must_use]
    pub fn log(&self) -> &[CombatLogEntry] {
        &self.log
    }

    #[must_use]
    pub const fn player_buffs(&self) -> &Modifiers {
        &self.player_buffs
    }

    #[must_use]
    pub const fn config(&self) -> &CombatConfig {
        &self.config
    }

    /// Loot credited on victory.
    #[must_use]
    pub const fn rewards(&self) -> Option<&Loot> {
        self.rewards.as_ref()
    }

    #[must_use]
    pub fn living_monsters(&self) -> usize {
        self.monsters.iter().filter(|m| m.is_alive()).count()
    }

    fn push_log(&mut self, kind: CombatLogKind, message: String) {
        self.push_entry(kind, message, None, None, None);
    }

    fn push_entry(
        &mut self,
        kind: CombatLogKind,
        message: String,
        actor: Option<&str>,
        target: Option<&str>,
        value: Option<f64>,
    ) {
        log::debug!(target: "spellbinder::combat", "[turn {}] {message}", self.turn_count);
        self.log.push(CombatLogEntry {
            turn: self.turn_count,
            kind,
            message,
            actor: actor.map(str::to_string),
            target: target.map(str::to_string),
            value,
        });
    }

    fn finish(&mut self, result: CombatResult, message: &str) {
        self.result = result;
        self.is_active = false;
        let kind = match result {
            CombatResult::Victory => CombatLogKind::Victory,
            CombatResult::Defeat => CombatLogKind::Defeat,
            CombatResult::Ongoing | CombatResult::Fled => CombatLogKind::Info,
        };
        self.push_log(kind, message.to_string());
    }

    /// Mana available for a spell; neutral spells draw from no pool.
    fn available_mana(player: &Player, def: &SpellDef) -> f64 {
        def.element
            .mana_resource()
            .map_or(0.0, |id| player.resources().value(id))
    }

    /// Pick the spell for this turn: first priority match, else any eligible spell.
    #[must_use]
    pub fn select_action(&self, player: &Player) -> Option<String> {
        let spells = player.spells();
        let eligible: Vec<&SpellDef> = spells
            .learned()
            .map(|(def, _)| def)
            .filter(|def| spells.can_cast(&def.id, Self::available_mana(player, def), player))
            .collect();
        self.config
            .priority
            .iter()
            .find_map(|kind| eligible.iter().find(|def| def.has_effect(*kind)))
            .or_else(|| eligible.first())
            .map(|def| def.id.clone())
    }

    /// Advance one half-turn. Returns the result afterwards.
    pub fn step(&mut self, player: &mut Player, rng: &mut impl Rng) -> CombatResult {
        match self.current_turn {
            Turn::Player => self.player_turn(player, rng),
            Turn::Monster => self.monster_turn(player),
        }
        self.result
    }

    /// End the encounter without rewards. Returns `false` when already over.
    pub fn flee(&mut self) -> bool {
        if !self.is_active {
            return false;
        }
        self.finish(CombatResult::Fled, "fled from combat");
        true
    }

    pub fn player_turn(&mut self, player: &mut Player, rng: &mut impl Rng) {
        if !self.is_active || self.current_turn != Turn::Player {
            return;
        }
        let Some(spell_id) = self.select_action(player) else {
            let name = player.name().to_string();
            self.push_entry(
                CombatLogKind::Info,
                format!("{name} has no usable spell and skips the turn"),
                Some(&name),
                None,
                None,
            );
            self.end_player_turn();
            return;
        };
        let Some(def) = player.spells().definition(&spell_id).cloned() else {
            self.end_player_turn();
            return;
        };
        if let Some(pool) = def.element.mana_resource()
            && !player.resources_mut().consume(pool, def.mana_cost)
        {
            self.end_player_turn();
            return;
        }
        player.spells_mut().cast(&def.id);
        let name = player.name().to_string();
        self.push_entry(
            CombatLogKind::Info,
            format!("{name} casts {}", def.name),
            Some(&name),
            None,
            Some(def.mana_cost),
        );
        for effect in &def.effects {
            if !self.is_active {
                break;
            }
            self.apply_effect(effect, &def, player, rng);
        }
        self.end_player_turn();
    }

    fn apply_effect(
        &mut self,
        effect: &SpellEffect,
        spell: &SpellDef,
        player: &mut Player,
        rng: &mut impl Rng,
    ) {
        let caster = player.name().to_string();
        let duration = effect.duration.unwrap_or(DEFAULT_MODIFIER_DURATION);
        let to_player = matches!(effect.target, SpellTarget::SelfTarget | SpellTarget::Ally);
        match effect.kind {
            SpellEffectKind::Damage => {
                let Some(index) = self.monsters.iter().position(Monster::is_alive) else {
                    return;
                };
                let element = effect.element.unwrap_or(spell.element);
                let base = effect.value
                    + player.spell_power(spell.element)
                    + modifier_total(&self.player_buffs, &Modifiers::new(), "attack");
                let damage = Self::element_damage(base, element, self.monsters[index].element());
                let monster = &mut self.monsters[index];
                let dealt = monster.take_damage(damage);
                let target = monster.name().to_string();
                let slain = !monster.is_alive();
                self.push_entry(
                    CombatLogKind::Damage,
                    format!("{target} takes {dealt} damage"),
                    Some(&caster),
                    Some(&target),
                    Some(f64::from(dealt)),
                );
                if slain {
                    self.push_entry(
                        CombatLogKind::Info,
                        format!("{target} is defeated"),
                        None,
                        Some(&target),
                        None,
                    );
                    self.check_victory(player, rng);
                }
            }
            SpellEffectKind::Heal => {
                let amount = effect.value + player.classes().custom_bonus("healing");
                let healed = player.resources_mut().add(ResourceId::Health, amount);
                self.push_entry(
                    CombatLogKind::Heal,
                    format!("{caster} recovers {healed} health"),
                    Some(&caster),
                    Some(&caster),
                    Some(healed),
                );
            }
            SpellEffectKind::Buff => {
                let modifier = Modifier {
                    stat: effect.stat.clone().unwrap_or_else(|| "attack".to_string()),
                    value: effect.value,
                    duration,
                    source: spell.name.clone(),
                };
                let stat = modifier.stat.clone();
                if to_player {
                    self.player_buffs.push(modifier);
                    self.push_entry(
                        CombatLogKind::Buff,
                        format!("{caster} gains {stat} +{}", effect.value),
                        Some(&caster),
                        Some(&caster),
                        Some(effect.value),
                    );
                } else if let Some(monster) = self.monsters.iter_mut().find(|m| m.is_alive()) {
                    monster.add_buff(modifier);
                    let target = monster.name().to_string();
                    self.push_entry(
                        CombatLogKind::Buff,
                        format!("{target} gains {stat} +{}", effect.value),
                        Some(&caster),
                        Some(&target),
                        Some(effect.value),
                    );
                }
            }
            SpellEffectKind::Debuff => {
                let Some(monster) = self.monsters.iter_mut().find(|m| m.is_alive()) else {
                    return;
                };
                let stat = effect.stat.clone().unwrap_or_else(|| "defense".to_string());
                monster.add_debuff(Modifier {
                    stat: stat.clone(),
                    value: effect.value,
                    duration,
                    source: spell.name.clone(),
                });
                let target = monster.name().to_string();
                self.push_entry(
                    CombatLogKind::Debuff,
                    format!("{target} suffers {stat} -{}", effect.value),
                    Some(&caster),
                    Some(&target),
                    Some(effect.value),
                );
            }
            SpellEffectKind::Summon => {
                self.push_entry(
                    CombatLogKind::Info,
                    format!("{caster} summons an ally, but it fades at once"),
                    Some(&caster),
                    None,
                    None,
                );
            }
        }
    }

    /// `floor(max(1, base × multiplier))`, before the defender's own defense.
    #[must_use]
    pub fn element_damage(base: f64, attacker: Element, defender: Element) -> u32 {
        floor_f64_to_u32((base * attacker.multiplier_against(defender)).max(1.0))
    }

    fn end_player_turn(&mut self) {
        self.turn_count += 1;
        for monster in &mut self.monsters {
            monster.tick_modifiers();
        }
        tick_modifiers(&mut self.player_buffs);
        if self.is_active {
            self.current_turn = Turn::Monster;
        }
    }

    pub fn monster_turn(&mut self, player: &mut Player) {
        if !self.is_active || self.current_turn != Turn::Monster {
            return;
        }
        let reduction = player.damage_reduction()
            + modifier_total(&self.player_buffs, &Modifiers::new(), "defense");
        let victim = player.name().to_string();
        for index in 0..self.monsters.len() {
            if !self.monsters[index].is_alive() {
                continue;
            }
            let (attacker, attack, element) = {
                let monster = &self.monsters[index];
                (monster.name().to_string(), monster.attack(), monster.element())
            };
            let raw = f64::from(attack) * element.multiplier_against(Element::Neutral);
            let damage = (raw.floor() - reduction).max(1.0);
            let dealt = player.resources_mut().drain(ResourceId::Health, damage);
            self.push_entry(
                CombatLogKind::Damage,
                format!("{attacker} hits {victim} for {dealt}"),
                Some(&attacker),
                Some(&victim),
                Some(dealt),
            );
            if player.resources().value(ResourceId::Health) <= 0.0 {
                self.push_entry(
                    CombatLogKind::Info,
                    format!("{victim} falls"),
                    Some(&attacker),
                    Some(&victim),
                    None,
                );
                self.finish(CombatResult::Defeat, "combat lost");
                return;
            }
        }
        self.current_turn = Turn::Player;
    }

    fn check_victory(&mut self, player: &mut Player, rng: &mut impl Rng) {
        if self.is_active && self.living_monsters() == 0 {
            self.finish(CombatResult::Victory, "combat won");
            self.settle_rewards(player, rng);
        }
    }

    fn settle_rewards(&mut self, player: &mut Player, rng: &mut impl Rng) {
        let mut loot = Loot::default();
        for monster in self.monsters.iter().filter(|m| !m.is_alive()) {
            loot.merge(monster.roll_drops(rng));
        }
        player.credit_loot(&loot);
        self.push_entry(
            CombatLogKind::Info,
            format!("gained {} gold and {} experience", loot.gold, loot.experience),
            None,
            None,
            Some(u64_to_f64(loot.gold)),
        );
        let achievements = player.achievements_mut();
        achievements.increment(achievement_ids::MONSTER_SLAYER, 1.0);
        if loot.gold >= WEALTHY_GOLD_THRESHOLD {
            achievements.increment(achievement_ids::WEALTHY_ADVENTURER, 1.0);
        }
        player.settle_achievement_rewards();
        self.rewards = Some(loot);
    }

    /// Run the encounter to completion without pacing.
    ///
    /// A round is one player half-turn plus one monster half-turn, after which
    /// spell cooldowns decay by the configured round length. Hitting the round
    /// cap leaves the encounter unresolved and reports a draw.
    pub fn auto_execute(
        &mut self,
        player: &mut Player,
        rng: &mut impl Rng,
        max_rounds: u32,
    ) -> AutoOutcome {
        if self.is_active && player.resources().value(ResourceId::Health) <= 0.0 {
            self.finish(CombatResult::Defeat, "too wounded to fight");
            return AutoOutcome::EnemyWon;
        }
        let mut rounds = 0;
        while self.is_active && rounds < max_rounds {
            rounds += 1;
            if self.current_turn == Turn::Player {
                self.player_turn(player, rng);
            }
            if self.current_turn == Turn::Monster {
                self.monster_turn(player);
            }
            player.spells_mut().update(self.config.round_seconds);
        }
        match self.result {
            CombatResult::Victory => AutoOutcome::PlayerWon,
            CombatResult::Defeat => AutoOutcome::EnemyWon,
            CombatResult::Ongoing | CombatResult::Fled => AutoOutcome::Draw,
        }
    }
}
