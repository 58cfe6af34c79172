//! The player aggregate: owns the ledger, talent and every progression manager.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::achievement::{AchievementManager, AchievementProgress, AchievementReward};
use crate::class_tree::{ClassBudget, ClassEffectKind, ClassManager, ClassNode, ClassSnapshot};
use crate::constants::{
    BASE_MANA_CAPACITY, BASE_MANA_REGEN_PER_SECOND, PLAYER_EXP_BASE, PLAYER_EXP_GROWTH,
    REWARD_EXPERIENCE,
};
use crate::definitions::Definitions;
use crate::element::Element;
use crate::item::{EquipmentSlot, Inventory, ItemEffect};
use crate::journal::Journal;
use crate::monster::Loot;
use crate::numbers::{exp_curve, floor_f64_to_u64, u64_to_f64};
use crate::predicate::PredicateContext;
use crate::resource::{ResourceId, ResourceManager};
use crate::save::LoadError;
use crate::skill::{Skill, SkillManager};
use crate::spell::{Spell, SpellManager};
use crate::talent::{Talent, TalentPreset};

/// Experience needed to advance from `level` to `level + 1`.
#[must_use]
pub fn player_required_exp(level: u32) -> u64 {
    exp_curve(PLAYER_EXP_BASE, PLAYER_EXP_GROWTH, level.saturating_sub(1))
}

/// Owned snapshot of everything requirement predicates read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequirementContext {
    pub talent: Talent,
    pub skill_levels: BTreeMap<String, u32>,
    pub level: u32,
    pub classes: Vec<String>,
    pub has_attack_spell: bool,
}

impl PredicateContext for RequirementContext {
    fn talent(&self, element: Element) -> f64 {
        self.talent.get(element)
    }

    fn skill_level(&self, skill_id: &str) -> Option<u32> {
        self.skill_levels.get(skill_id).copied()
    }

    fn player_level(&self) -> u32 {
        self.level
    }

    fn is_class_unlocked(&self, class_id: &str) -> bool {
        self.classes.iter().any(|c| c == class_id)
    }

    fn has_attack_spell(&self) -> bool {
        self.has_attack_spell
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub name: String,
    pub level: u32,
    pub experience: u64,
    #[serde(default)]
    pub lifetime_experience: u64,
    pub talent: Talent,
    pub resources: ResourceManager,
    #[serde(default)]
    pub skills: BTreeMap<String, Skill>,
    #[serde(default)]
    pub spells: BTreeMap<String, Spell>,
    #[serde(default)]
    pub classes: ClassSnapshot,
    #[serde(default)]
    pub achievements: BTreeMap<String, AchievementProgress>,
    #[serde(default)]
    pub items: BTreeMap<String, u32>,
    #[serde(default)]
    pub equipment: BTreeMap<EquipmentSlot, String>,
    #[serde(default)]
    pub bonuses: BTreeMap<String, f64>,
}

#[derive(Debug)]
pub struct Player {
    name: String,
    level: u32,
    experience: u64,
    lifetime_experience: u64,
    talent: Talent,
    resources: ResourceManager,
    skills: SkillManager,
    spells: SpellManager,
    classes: ClassManager,
    achievements: AchievementManager,
    inventory: Inventory,
    bonuses: BTreeMap<String, f64>,
    journal: Journal,
}

impl Player {
    #[must_use]
    pub fn new(name: impl Into<String>, preset: Option<TalentPreset>, defs: &Definitions) -> Self {
        let mut player = Self {
            name: name.into(),
            level: 1,
            experience: 0,
            lifetime_experience: 0,
            talent: preset.map_or_else(Talent::default, Talent::from_preset),
            resources: ResourceManager::create_default(),
            skills: SkillManager::new(defs.skills.clone()),
            spells: SpellManager::new(defs.spells.clone()),
            classes: ClassManager::new(defs.classes.clone()),
            achievements: AchievementManager::new(defs.achievements.clone()),
            inventory: Inventory::new(defs.items.clone()),
            bonuses: BTreeMap::new(),
            journal: Journal::default(),
        };
        player.apply_passive_bonuses();
        player
    }

    /// Rebind a snapshot to live definitions.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] when the snapshot references ids missing from `defs`.
    pub fn restore(snapshot: PlayerSnapshot, defs: &Definitions) -> Result<Self, LoadError> {
        let mut player = Self {
            name: snapshot.name,
            level: snapshot.level.max(1),
            experience: snapshot.experience,
            lifetime_experience: snapshot.lifetime_experience,
            talent: snapshot.talent,
            resources: snapshot.resources,
            skills: SkillManager::restore(defs.skills.clone(), snapshot.skills)?,
            spells: SpellManager::restore(defs.spells.clone(), snapshot.spells)?,
            classes: ClassManager::restore(defs.classes.clone(), snapshot.classes)?,
            achievements: AchievementManager::restore(
                defs.achievements.clone(),
                snapshot.achievements,
            )?,
            inventory: Inventory::restore(defs.items.clone(), snapshot.items, snapshot.equipment)?,
            bonuses: snapshot.bonuses,
            journal: Journal::default(),
        };
        for id in ResourceId::ALL {
            if player.resources.get(id).is_none() {
                return Err(LoadError::MissingSection(format!("player.resources.{id}")));
            }
        }
        player.apply_passive_bonuses();
        Ok(player)
    }

    #[must_use]
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            name: self.name.clone(),
            level: self.level,
            experience: self.experience,
            lifetime_experience: self.lifetime_experience,
            talent: self.talent,
            resources: self.resources.clone(),
            skills: self.skills.snapshot(),
            spells: self.spells.snapshot(),
            classes: self.classes.snapshot(),
            achievements: self.achievements.snapshot(),
            items: self.inventory.items().clone(),
            equipment: self.inventory.equipment().clone(),
            bonuses: self.bonuses.clone(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub const fn experience(&self) -> u64 {
        self.experience
    }

    #[must_use]
    pub const fn lifetime_experience(&self) -> u64 {
        self.lifetime_experience
    }

    #[must_use]
    pub fn experience_to_next_level(&self) -> u64 {
        player_required_exp(self.level)
    }

    #[must_use]
    pub const fn talent(&self) -> &Talent {
        &self.talent
    }

    pub const fn talent_mut(&mut self) -> &mut Talent {
        &mut self.talent
    }

    #[must_use]
    pub const fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    pub const fn resources_mut(&mut self) -> &mut ResourceManager {
        &mut self.resources
    }

    #[must_use]
    pub const fn skills(&self) -> &SkillManager {
        &self.skills
    }

    #[must_use]
    pub const fn spells(&self) -> &SpellManager {
        &self.spells
    }

    pub const fn spells_mut(&mut self) -> &mut SpellManager {
        &mut self.spells
    }

    #[must_use]
    pub const fn classes(&self) -> &ClassManager {
        &self.classes
    }

    #[must_use]
    pub const fn achievements(&self) -> &AchievementManager {
        &self.achievements
    }

    pub const fn achievements_mut(&mut self) -> &mut AchievementManager {
        &mut self.achievements
    }

    #[must_use]
    pub const fn journal(&self) -> &Journal {
        &self.journal
    }

    pub const fn journal_mut(&mut self) -> &mut Journal {
        &mut self.journal
    }

    #[must_use]
    pub const fn items(&self) -> &BTreeMap<String, u32> {
        self.inventory.items()
    }

    #[must_use]
    pub const fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    #[must_use]
    pub fn bonus(&self, name: &str) -> f64 {
        self.bonuses.get(name).copied().unwrap_or(0.0)
    }

    /// Defense summed over worn gear.
    #[must_use]
    pub fn equipment_defense(&self) -> f64 {
        self.inventory.defense()
    }

    pub fn add_item(&mut self, item_id: &str, count: u32) -> bool {
        match self.inventory.add(item_id, count) {
            Ok(()) => true,
            Err(blocker) => {
                self.journal
                    .warning(format!("cannot add item `{item_id}`: {blocker}"));
                false
            }
        }
    }

    /// Wear a carried item; whatever held the slot returns to the bag.
    pub fn equip(&mut self, item_id: &str) -> bool {
        match self.inventory.equip(item_id) {
            Ok((slot, replaced)) => {
                if let Some(previous) = replaced {
                    self.journal.info(format!("unequipped `{previous}`"));
                }
                self.journal.success(format!("equipped `{item_id}` as {slot}"));
                self.apply_passive_bonuses();
                true
            }
            Err(blocker) => {
                self.journal
                    .warning(format!("cannot equip `{item_id}`: {blocker}"));
                false
            }
        }
    }

    pub fn unequip(&mut self, slot: EquipmentSlot) -> bool {
        match self.inventory.unequip(slot) {
            Ok(item_id) => {
                self.journal.info(format!("unequipped `{item_id}`"));
                self.apply_passive_bonuses();
                true
            }
            Err(blocker) => {
                self.journal.warning(format!("cannot unequip {slot}: {blocker}"));
                false
            }
        }
    }

    /// Use one item: gear is equipped, consumables and books spend one and apply
    /// their effects.
    pub fn use_item(&mut self, item_id: &str) -> bool {
        if self
            .inventory
            .definition(item_id)
            .is_some_and(|def| def.slot.is_some())
        {
            return self.equip(item_id);
        }
        match self.inventory.take_for_use(item_id) {
            Ok(effects) => {
                for effect in &effects {
                    self.apply_item_effect(item_id, effect);
                }
                true
            }
            Err(blocker) => {
                self.journal
                    .warning(format!("cannot use `{item_id}`: {blocker}"));
                false
            }
        }
    }

    fn apply_item_effect(&mut self, item_id: &str, effect: &ItemEffect) {
        let target = effect.target.as_deref().unwrap_or_default();
        let applied = match effect.kind.as_str() {
            "restore_mana" => target
                .parse::<Element>()
                .ok()
                .and_then(Element::mana_resource)
                .map(|pool| self.resources.add(pool, effect.value))
                .is_some(),
            "restore_health" => {
                self.resources.add(ResourceId::Health, effect.value);
                true
            }
            "restore_stamina" => {
                self.resources.add(ResourceId::Stamina, effect.value);
                true
            }
            "add_gold" => {
                self.resources.add(ResourceId::Gold, effect.value);
                true
            }
            "add_research" => {
                self.resources.add(ResourceId::Research, effect.value);
                true
            }
            "add_experience" => {
                self.add_experience(floor_f64_to_u64(effect.value));
                true
            }
            "learn_skill" => self.grant_skill(target),
            "learn_spell" => {
                let ok = self.grant_spell(target);
                if ok {
                    self.journal.success(format!("learned spell `{target}`"));
                }
                ok
            }
            _ => false,
        };
        if !applied {
            self.journal.warning(format!(
                "item `{item_id}` effect `{}` had no effect",
                effect.kind
            ));
        }
    }

    pub fn set_clock(&mut self, now_ms: u64) {
        self.journal.set_clock(now_ms);
        self.achievements.set_clock(now_ms);
    }

    #[must_use]
    pub fn requirement_context(&self) -> RequirementContext {
        RequirementContext {
            talent: self.talent,
            skill_levels: self
                .skills
                .definitions()
                .keys()
                .map(|id| (id.clone(), self.skills.level(id).unwrap_or(0)))
                .collect(),
            level: self.level,
            classes: self.classes.unlocked_ids().to_vec(),
            has_attack_spell: self.spells.has_attack_spell(),
        }
    }

    /// Add experience with carry across level thresholds. Returns levels gained.
    pub fn add_experience(&mut self, amount: u64) -> u32 {
        self.experience = self.experience.saturating_add(amount);
        self.lifetime_experience = self.lifetime_experience.saturating_add(amount);
        let mut gained = 0;
        loop {
            let required = player_required_exp(self.level);
            if required == 0 || self.experience < required {
                break;
            }
            self.experience -= required;
            self.level += 1;
            gained += 1;
        }
        if gained > 0 {
            let level = self.level;
            self.journal.success(format!("{} reached level {level}", self.name));
        }
        gained
    }

    /// Flat damage added to spells of `element`.
    #[must_use]
    pub fn spell_power(&self, element: Element) -> f64 {
        self.classes.elemental_total(ClassEffectKind::SpellPower, element)
            + self.skills.effect_total("spell_power", Some(element))
            + self.inventory.equipped_total("spell_power", Some(element))
            + self.bonus("spell_power")
    }

    /// Aggregate reduction applied to incoming monster damage.
    #[must_use]
    pub fn damage_reduction(&self) -> f64 {
        self.equipment_defense()
            + self.skills.effect_total("damage_reduction", None)
            + self.classes.custom_bonus("defense")
            + self.bonus("damage_reduction")
    }

    /// Recompute caps, regen rates, skill caps and class-granted skills.
    ///
    /// Idempotent; runs on construction, load and every tick.
    pub fn apply_passive_bonuses(&mut self) {
        for element in Element::MAGICAL {
            let Some(id) = element.mana_resource() else {
                continue;
            };
            let capacity = BASE_MANA_CAPACITY * self.talent.mana_capacity_multiplier(element)
                + self.classes.elemental_total(ClassEffectKind::ManaCapacity, element)
                + self.skills.effect_total("mana_capacity", Some(element))
                + self.inventory.equipped_total("mana_capacity", Some(element));
            let regen = BASE_MANA_REGEN_PER_SECOND * self.talent.learning_speed_multiplier(element)
                + self.classes.elemental_total(ClassEffectKind::ManaRegen, element)
                + self.skills.effect_total("mana_regen", Some(element))
                + self.inventory.equipped_total("mana_regen", Some(element));
            if let Some(pool) = self.resources.get_mut(id) {
                pool.set_max(Some(capacity.max(0.0)));
                pool.set_rate_per_second(regen);
            }
        }
        self.skills
            .apply_max_level_bonuses(&self.classes.skill_max_bonuses());
        for skill_id in self.classes.granted_skills() {
            if !self.skills.is_acquired(&skill_id)
                && self.skills.acquire(&skill_id, &mut self.achievements)
            {
                self.journal.success(format!("class grants skill `{skill_id}`"));
            }
        }
    }

    /// Per-tick cascade: bonuses, regen, cooldowns, achievement rewards.
    pub fn update(&mut self, delta_seconds: f64) {
        self.apply_passive_bonuses();
        self.resources.update(delta_seconds);
        self.spells.update(delta_seconds);
        self.settle_achievement_rewards();
    }

    /// Credit a reward by id: a ledger pool or `experience`.
    pub fn grant(&mut self, resource: &str, amount: f64) -> bool {
        if resource == REWARD_EXPERIENCE {
            self.add_experience(floor_f64_to_u64(amount));
            return true;
        }
        match resource.parse::<ResourceId>() {
            Ok(id) => {
                self.resources.add(id, amount);
                true
            }
            Err(()) => {
                self.journal
                    .warning(format!("unknown reward resource `{resource}`"));
                false
            }
        }
    }

    /// Credit rolled drops: gold, experience, mana and items.
    pub fn credit_loot(&mut self, loot: &Loot) {
        self.resources.add(ResourceId::Gold, u64_to_f64(loot.gold));
        self.add_experience(loot.experience);
        for (pool, amount) in &loot.mana {
            self.resources.add(*pool, u64_to_f64(*amount));
        }
        for item in &loot.items {
            self.add_item(item, 1);
        }
    }

    /// Apply rewards queued by achievement unlocks until none remain.
    pub fn settle_achievement_rewards(&mut self) {
        loop {
            let pending = self.achievements.take_pending_rewards();
            if pending.is_empty() {
                break;
            }
            for (achievement_id, reward) in pending {
                let name = self
                    .achievements
                    .definition(&achievement_id)
                    .map_or_else(|| achievement_id.clone(), |d| d.name.clone());
                self.journal.success(format!("achievement unlocked: {name}"));
                self.apply_achievement_reward(&reward);
            }
        }
    }

    fn apply_achievement_reward(&mut self, reward: &AchievementReward) {
        match reward {
            AchievementReward::Resource {
                resource_id,
                amount,
            } => {
                self.grant(resource_id, *amount);
            }
            AchievementReward::Unlock { unlock_id } => {
                let granted = if self.skills.definition(unlock_id).is_some() {
                    self.grant_skill(unlock_id)
                } else {
                    self.grant_spell(unlock_id)
                };
                if !granted {
                    self.journal
                        .warning(format!("unknown unlock reward `{unlock_id}`"));
                }
            }
            AchievementReward::Bonus {
                bonus_type,
                bonus_value,
            } => {
                *self.bonuses.entry(bonus_type.clone()).or_insert(0.0) += bonus_value;
            }
        }
    }

    /// Acquire a skill without checking its requirements.
    pub fn grant_skill(&mut self, skill_id: &str) -> bool {
        let ok = self.skills.acquire(skill_id, &mut self.achievements);
        if ok {
            self.apply_passive_bonuses();
        }
        ok
    }

    /// Learn a spell without checking its requirements.
    pub fn grant_spell(&mut self, spell_id: &str) -> bool {
        self.spells.force_learn(spell_id, &mut self.achievements)
    }

    pub fn unlock_skill(&mut self, skill_id: &str) -> bool {
        let ctx = self.requirement_context();
        let ok = self
            .skills
            .unlock_skill(skill_id, &ctx, &mut self.achievements);
        if ok {
            self.apply_passive_bonuses();
        } else {
            self.journal
                .warning(format!("cannot unlock skill `{skill_id}`"));
        }
        ok
    }

    /// Returns levels gained, or `None` when the skill is not acquired.
    pub fn add_skill_exp(&mut self, skill_id: &str, amount: u64) -> Option<u32> {
        let gained = self.skills.add_exp(skill_id, amount)?;
        if gained > 0
            && let Some(skill) = self.skills.get(skill_id)
        {
            let level = skill.level();
            self.journal
                .success(format!("skill `{skill_id}` reached level {level}"));
            self.apply_passive_bonuses();
        }
        Some(gained)
    }

    pub fn learn_spell(&mut self, spell_id: &str) -> bool {
        let ctx = self.requirement_context();
        let ok = self
            .spells
            .learn_spell(spell_id, &ctx, &mut self.achievements);
        if ok {
            self.journal.success(format!("learned spell `{spell_id}`"));
        } else {
            self.journal
                .warning(format!("cannot learn spell `{spell_id}`"));
        }
        ok
    }

    #[must_use]
    pub fn class_budget(&self) -> ClassBudget {
        ClassBudget::from_ledger(&self.resources, u64_to_f64(self.lifetime_experience))
    }

    pub fn available_classes(&mut self, now_ms: u64) -> Vec<&ClassNode> {
        let ctx = self.requirement_context();
        let budget = self.class_budget();
        self.classes.available_classes(&ctx, budget, now_ms)
    }

    #[must_use]
    pub fn can_unlock_class(&self, class_id: &str) -> bool {
        let ctx = self.requirement_context();
        self.classes
            .can_unlock_class(class_id, &ctx, self.class_budget())
    }

    /// Unlock a class; talent bonuses apply only on the first unlock.
    pub fn unlock_class(&mut self, class_id: &str) -> bool {
        if self.classes.is_unlocked(class_id) {
            return true;
        }
        let ctx = self.requirement_context();
        let lifetime = u64_to_f64(self.lifetime_experience);
        let ok = self.classes.unlock_class(
            class_id,
            &ctx,
            &mut self.resources,
            lifetime,
            &mut self.achievements,
        );
        if !ok {
            self.journal
                .warning(format!("cannot unlock class `{class_id}`"));
            return false;
        }
        for (element, value) in self.classes.talent_bonuses(class_id) {
            self.talent.add(element, value);
        }
        let name = self
            .classes
            .tree()
            .node(class_id)
            .map_or_else(|| class_id.to_string(), |n| n.name.clone());
        self.journal.success(format!("class unlocked: {name}"));
        self.apply_passive_bonuses();
        true
    }
}

impl PredicateContext for Player {
    fn talent(&self, element: Element) -> f64 {
        self.talent.get(element)
    }

    fn skill_level(&self, skill_id: &str) -> Option<u32> {
        self.skills.level(skill_id)
    }

    fn player_level(&self) -> u32 {
        self.level
    }

    fn is_class_unlocked(&self, class_id: &str) -> bool {
        self.classes.is_unlocked(class_id)
    }

    fn has_attack_spell(&self) -> bool {
        self.spells.has_attack_spell()
    }
}
