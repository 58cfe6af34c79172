//! Spells: learnable combat actions with mana costs and cooldowns.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::achievement::AchievementManager;
use crate::constants::achievement_ids;
use crate::element::Element;
use crate::predicate::{Predicate, PredicateContext};
use crate::save::LoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpellEffectKind {
    Damage,
    Heal,
    Buff,
    Debuff,
    Summon,
}

impl SpellEffectKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Damage => "damage",
            Self::Heal => "heal",
            Self::Buff => "buff",
            Self::Debuff => "debuff",
            Self::Summon => "summon",
        }
    }
}

impl fmt::Display for SpellEffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpellTarget {
    #[serde(rename = "self")]
    SelfTarget,
    #[default]
    Enemy,
    Ally,
    Area,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellEffect {
    #[serde(rename = "type")]
    pub kind: SpellEffectKind,
    #[serde(default)]
    pub target: SpellTarget,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredSkill {
    pub skill_id: String,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub element: Element,
    #[serde(default = "SpellDef::default_level")]
    pub level: u32,
    pub mana_cost: f64,
    #[serde(default)]
    pub cooldown: f64,
    /// Informational; casts resolve instantly.
    #[serde(default)]
    pub cast_time: f64,
    pub effects: Vec<SpellEffect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock: Option<Predicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_skill: Option<RequiredSkill>,
}

impl SpellDef {
    const fn default_level() -> u32 {
        1
    }

    #[must_use]
    pub fn has_effect(&self, kind: SpellEffectKind) -> bool {
        self.effects.iter().any(|e| e.kind == kind)
    }

    #[must_use]
    pub fn meets_skill_requirement<C: PredicateContext + ?Sized>(&self, ctx: &C) -> bool {
        self.required_skill.as_ref().is_none_or(|req| {
            ctx.skill_level(&req.skill_id)
                .is_some_and(|level| level >= req.level)
        })
    }

    #[must_use]
    pub fn can_learn<C: PredicateContext + ?Sized>(&self, ctx: &C) -> bool {
        self.unlock.as_ref().is_none_or(|p| p.evaluate(ctx)) && self.meets_skill_requirement(ctx)
    }
}

/// Persisted spell state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spell {
    pub id: String,
    is_learned: bool,
    current_cooldown: f64,
}

impl Spell {
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            is_learned: false,
            current_cooldown: 0.0,
        }
    }

    #[must_use]
    pub const fn is_learned(&self) -> bool {
        self.is_learned
    }

    #[must_use]
    pub const fn current_cooldown(&self) -> f64 {
        self.current_cooldown
    }

    #[must_use]
    pub fn is_on_cooldown(&self) -> bool {
        self.current_cooldown > 0.0
    }

    /// Start the cooldown; fails while a previous cooldown is still running.
    pub fn cast(&mut self, cooldown: f64) -> bool {
        if self.is_on_cooldown() {
            return false;
        }
        self.current_cooldown = cooldown.max(0.0);
        true
    }

    pub fn update(&mut self, delta_seconds: f64) {
        if self.current_cooldown > 0.0 && delta_seconds > 0.0 {
            self.current_cooldown = (self.current_cooldown - delta_seconds).max(0.0);
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpellManager {
    defs: Arc<BTreeMap<String, SpellDef>>,
    spells: BTreeMap<String, Spell>,
}

impl SpellManager {
    #[must_use]
    pub fn new(defs: Arc<BTreeMap<String, SpellDef>>) -> Self {
        Self {
            defs,
            spells: BTreeMap::new(),
        }
    }

    /// Rebind persisted spells to their definitions.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::UnknownId`] when a saved spell has no definition.
    pub fn restore(
        defs: Arc<BTreeMap<String, SpellDef>>,
        saved: BTreeMap<String, Spell>,
    ) -> Result<Self, LoadError> {
        let mut manager = Self::new(defs);
        for (id, mut spell) in saved {
            if !manager.defs.contains_key(&id) {
                return Err(LoadError::UnknownId { kind: "spell", id });
            }
            spell.id.clone_from(&id);
            manager.spells.insert(id, spell);
        }
        Ok(manager)
    }

    #[must_use]
    pub fn definition(&self, id: &str) -> Option<&SpellDef> {
        self.defs.get(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Spell> {
        self.spells.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Spell> {
        self.spells.get_mut(id)
    }

    #[must_use]
    pub fn is_learned(&self, id: &str) -> bool {
        self.spells.get(id).is_some_and(Spell::is_learned)
    }

    /// Learn a spell when its predicate and skill prerequisite hold. Already learned is `true`.
    pub fn learn_spell<C: PredicateContext + ?Sized>(
        &mut self,
        id: &str,
        ctx: &C,
        achievements: &mut AchievementManager,
    ) -> bool {
        let Some(def) = self.defs.get(id) else {
            log::warn!("unknown spell `{id}`");
            return false;
        };
        if self.is_learned(id) {
            return true;
        }
        if !def.can_learn(ctx) {
            log::debug!("spell `{id}` requirements not met");
            return false;
        }
        self.force_learn(id, achievements)
    }

    /// Learn without checking requirements.
    pub fn force_learn(&mut self, id: &str, achievements: &mut AchievementManager) -> bool {
        let Some(def) = self.defs.get(id) else {
            return false;
        };
        let spell = self
            .spells
            .entry(id.to_string())
            .or_insert_with(|| Spell::new(id));
        if spell.is_learned {
            return true;
        }
        spell.is_learned = true;
        log::info!("spell learned: {}", def.name);
        achievements.increment(achievement_ids::FIRST_SPELL, 1.0);
        achievements.increment(achievement_ids::SPELL_COLLECTOR, 1.0);
        true
    }

    /// Learned, off cooldown, affordable, and skill prerequisite still met.
    #[must_use]
    pub fn can_cast<C: PredicateContext + ?Sized>(
        &self,
        id: &str,
        available_mana: f64,
        ctx: &C,
    ) -> bool {
        let (Some(def), Some(spell)) = (self.defs.get(id), self.spells.get(id)) else {
            return false;
        };
        spell.is_learned
            && !spell.is_on_cooldown()
            && available_mana >= def.mana_cost
            && def.meets_skill_requirement(ctx)
    }

    /// Start a learned spell's cooldown.
    pub fn cast(&mut self, id: &str) -> bool {
        let Some(cooldown) = self.defs.get(id).map(|d| d.cooldown) else {
            return false;
        };
        match self.spells.get_mut(id) {
            Some(spell) if spell.is_learned => spell.cast(cooldown),
            _ => false,
        }
    }

    pub fn update(&mut self, delta_seconds: f64) {
        for spell in self.spells.values_mut() {
            spell.update(delta_seconds);
        }
    }

    /// Learned spells in id order.
    pub fn learned(&self) -> impl Iterator<Item = (&SpellDef, &Spell)> {
        self.spells
            .iter()
            .filter(|(_, spell)| spell.is_learned)
            .filter_map(|(id, spell)| self.defs.get(id).map(|def| (def, spell)))
    }

    #[must_use]
    pub fn learned_count(&self) -> usize {
        self.spells.values().filter(|s| s.is_learned).count()
    }

    #[must_use]
    pub fn has_attack_spell(&self) -> bool {
        self.learned().any(|(def, _)| def.has_effect(SpellEffectKind::Damage))
    }

    #[must_use]
    pub fn learnable<C: PredicateContext + ?Sized>(&self, ctx: &C) -> Vec<&SpellDef> {
        self.defs
            .values()
            .filter(|d| !self.is_learned(&d.id) && d.can_learn(ctx))
            .collect()
    }

    #[must_use]
    pub fn locked<C: PredicateContext + ?Sized>(&self, ctx: &C) -> Vec<&SpellDef> {
        self.defs
            .values()
            .filter(|d| !self.is_learned(&d.id) && !d.can_learn(ctx))
            .collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Spell> {
        self.spells.clone()
    }
}
