//! Skills: leveled passive proficiencies with data-driven effects.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::constants::{SKILL_EXP_BASE, SKILL_EXP_GROWTH, achievement_ids};
use crate::achievement::AchievementManager;
use crate::element::Element;
use crate::expr;
use crate::numbers::{exp_curve, u64_to_f64};
use crate::predicate::{Predicate, PredicateContext};
use crate::save::LoadError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEffect {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub element: Element,
    pub max_level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock: Option<Predicate>,
    #[serde(default)]
    pub effects: Vec<SkillEffect>,
}

impl SkillDef {
    #[must_use]
    pub fn can_unlock<C: PredicateContext + ?Sized>(&self, ctx: &C) -> bool {
        self.unlock.as_ref().is_none_or(|p| p.evaluate(ctx))
    }
}

/// `floor(100 * 1.3^level)`
#[must_use]
pub fn required_exp_for(level: u32) -> u64 {
    exp_curve(SKILL_EXP_BASE, SKILL_EXP_GROWTH, level)
}

/// An acquired skill's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: String,
    current_level: u32,
    current_exp: u64,
    required_exp: u64,
    #[serde(skip)]
    max_level: u32,
}

impl Skill {
    #[must_use]
    pub fn new(def: &SkillDef) -> Self {
        Self {
            id: def.id.clone(),
            current_level: 0,
            current_exp: 0,
            required_exp: required_exp_for(0),
            max_level: def.max_level,
        }
    }

    #[must_use]
    pub const fn level(&self) -> u32 {
        self.current_level
    }

    #[must_use]
    pub const fn exp(&self) -> u64 {
        self.current_exp
    }

    #[must_use]
    pub const fn required_exp(&self) -> u64 {
        self.required_exp
    }

    #[must_use]
    pub const fn max_level(&self) -> u32 {
        self.max_level
    }

    #[must_use]
    pub const fn is_maxed(&self) -> bool {
        self.current_level >= self.max_level
    }

    #[must_use]
    pub const fn is_unlocked(&self) -> bool {
        self.current_level > 0
    }

    /// Percentage towards the next level; 100 when maxed.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.is_maxed() || self.required_exp == 0 {
            100.0
        } else {
            u64_to_f64(self.current_exp) / u64_to_f64(self.required_exp) * 100.0
        }
    }

    /// Add experience and level up as many times as it covers, carrying overflow.
    /// Returns the number of levels gained.
    pub fn add_exp(&mut self, amount: u64) -> u32 {
        if self.is_maxed() {
            return 0;
        }
        self.current_exp = self.current_exp.saturating_add(amount);
        let mut gained = 0;
        while !self.is_maxed() && self.current_exp >= self.required_exp {
            self.current_exp -= self.required_exp;
            self.current_level += 1;
            self.required_exp = required_exp_for(self.current_level);
            gained += 1;
        }
        gained
    }

    /// Scalar contributed by the first effect of `kind`.
    #[must_use]
    pub fn effect_value(&self, def: &SkillDef, kind: &str) -> f64 {
        let Some(effect) = def.effects.iter().find(|e| e.kind == kind) else {
            return 0.0;
        };
        let level = f64::from(self.current_level);
        let linear = effect.value * level;
        let Some(formula) = &effect.formula else {
            return linear;
        };
        let vars = |name: &str| (name == "level").then_some(level);
        match expr::eval_number(formula, &vars) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("skill `{}` formula `{formula}` failed: {err}", def.id);
                linear
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkillManager {
    defs: Arc<BTreeMap<String, SkillDef>>,
    skills: BTreeMap<String, Skill>,
}

impl SkillManager {
    #[must_use]
    pub fn new(defs: Arc<BTreeMap<String, SkillDef>>) -> Self {
        Self {
            defs,
            skills: BTreeMap::new(),
        }
    }

    /// Rebind persisted skills to their definitions.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::UnknownId`] when a saved skill has no definition.
    pub fn restore(
        defs: Arc<BTreeMap<String, SkillDef>>,
        saved: BTreeMap<String, Skill>,
    ) -> Result<Self, LoadError> {
        let mut manager = Self::new(defs);
        for (id, mut skill) in saved {
            let Some(def) = manager.defs.get(&id) else {
                return Err(LoadError::UnknownId { kind: "skill", id });
            };
            skill.id.clone_from(&id);
            skill.max_level = def.max_level;
            manager.skills.insert(id, skill);
        }
        Ok(manager)
    }

    #[must_use]
    pub fn definition(&self, id: &str) -> Option<&SkillDef> {
        self.defs.get(id)
    }

    #[must_use]
    pub fn definitions(&self) -> &BTreeMap<String, SkillDef> {
        &self.defs
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Skill> {
        self.skills.get(id)
    }

    #[must_use]
    pub fn is_acquired(&self, id: &str) -> bool {
        self.skills.contains_key(id)
    }

    /// Level of a skill; `None` when no such definition exists.
    #[must_use]
    pub fn level(&self, id: &str) -> Option<u32> {
        if !self.defs.contains_key(id) {
            return None;
        }
        Some(self.skills.get(id).map_or(0, Skill::level))
    }

    /// Acquire a skill when its unlock predicate holds. Already acquired is `true`.
    pub fn unlock_skill<C: PredicateContext + ?Sized>(
        &mut self,
        id: &str,
        ctx: &C,
        achievements: &mut AchievementManager,
    ) -> bool {
        let Some(def) = self.defs.get(id) else {
            log::warn!("unknown skill `{id}`");
            return false;
        };
        if self.skills.contains_key(id) {
            return true;
        }
        if !def.can_unlock(ctx) {
            log::debug!("skill `{id}` requirements not met");
            return false;
        }
        self.acquire(id, achievements)
    }

    /// Acquire without checking requirements (rewards and training grants).
    pub fn acquire(&mut self, id: &str, achievements: &mut AchievementManager) -> bool {
        let Some(def) = self.defs.get(id) else {
            return false;
        };
        if self.skills.contains_key(id) {
            return true;
        }
        self.skills.insert(id.to_string(), Skill::new(def));
        log::info!("skill acquired: {}", def.name);
        achievements.increment(achievement_ids::FIRST_SKILL, 1.0);
        achievements.increment(achievement_ids::SKILL_MASTER, 1.0);
        true
    }

    /// Returns levels gained, or `None` when the skill is not acquired.
    pub fn add_exp(&mut self, id: &str, amount: u64) -> Option<u32> {
        let skill = self.skills.get_mut(id)?;
        let gained = skill.add_exp(amount);
        if gained > 0 {
            log::info!("skill `{id}` reached level {}", skill.level());
        }
        Some(gained)
    }

    /// Raise effective max levels by the given per-skill bonuses.
    pub fn apply_max_level_bonuses(&mut self, bonuses: &BTreeMap<String, u32>) {
        for (id, skill) in &mut self.skills {
            if let Some(def) = self.defs.get(id) {
                let bonus = bonuses.get(id).copied().unwrap_or(0);
                skill.max_level = def.max_level.saturating_add(bonus);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SkillDef, &Skill)> {
        self.skills
            .iter()
            .filter_map(|(id, skill)| self.defs.get(id).map(|def| (def, skill)))
    }

    #[must_use]
    pub fn acquired_count(&self) -> usize {
        self.skills.len()
    }

    /// Acquired skills with at least one level.
    #[must_use]
    pub fn unlocked(&self) -> Vec<&Skill> {
        self.skills.values().filter(|s| s.is_unlocked()).collect()
    }

    /// Definitions not yet acquired whose requirements hold.
    #[must_use]
    pub fn unlockable<C: PredicateContext + ?Sized>(&self, ctx: &C) -> Vec<&SkillDef> {
        self.defs
            .values()
            .filter(|d| !self.skills.contains_key(&d.id) && d.can_unlock(ctx))
            .collect()
    }

    /// Definitions not yet acquired whose requirements fail.
    #[must_use]
    pub fn locked<C: PredicateContext + ?Sized>(&self, ctx: &C) -> Vec<&SkillDef> {
        self.defs
            .values()
            .filter(|d| !self.skills.contains_key(&d.id) && !d.can_unlock(ctx))
            .collect()
    }

    /// Sum of an effect kind across acquired skills, optionally limited to one element.
    #[must_use]
    pub fn effect_total(&self, kind: &str, element: Option<Element>) -> f64 {
        self.iter()
            .filter(|(def, _)| element.is_none_or(|el| def.element == el))
            .map(|(def, skill)| skill.effect_value(def, kind))
            .sum()
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Skill> {
        self.skills.clone()
    }
}
