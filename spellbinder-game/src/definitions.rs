//! Static definition tables and their validation.
//!
//! Tables are JSON arrays of records keyed by `id`. The default set is embedded
//! from `assets/data/`; callers may supply their own through
//! [`Definitions::from_json`].
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::achievement::{AchievementDef, AchievementReward};
use crate::activity::ActivityData;
use crate::class_tree::{ClassNode, ClassTree};
use crate::explore::LocaleData;
use crate::expr::{Expr, ExprError};
use crate::item::{ItemDef, ItemKind};
use crate::monster::MonsterDef;
use crate::predicate::Predicate;
use crate::skill::SkillDef;
use crate::spell::SpellDef;

const SKILLS_JSON: &str = include_str!("../assets/data/skills.json");
const SPELLS_JSON: &str = include_str!("../assets/data/spells.json");
const ACHIEVEMENTS_JSON: &str = include_str!("../assets/data/achievements.json");
const MONSTERS_JSON: &str = include_str!("../assets/data/monsters.json");
const LOCALES_JSON: &str = include_str!("../assets/data/locales.json");
const CLASSES_JSON: &str = include_str!("../assets/data/classes.json");
const ACTIVITIES_JSON: &str = include_str!("../assets/data/activities.json");
const ITEMS_JSON: &str = include_str!("../assets/data/items.json");

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to parse the {table} table: {source}")]
    Parse {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate {kind} id `{id}`")]
    DuplicateId { kind: &'static str, id: String },
    #[error("{kind} `{id}` references unknown {target_kind} `{target}`")]
    DanglingReference {
        kind: &'static str,
        id: String,
        target_kind: &'static str,
        target: String,
    },
    #[error("class prerequisites form a cycle through `{0}`")]
    Cycle(String),
    #[error("{kind} `{id}` has a malformed expression: {source}")]
    Expression {
        kind: &'static str,
        id: String,
        #[source]
        source: ExprError,
    },
    #[error("item `{0}` is equipment without a slot")]
    MissingSlot(String),
}

/// Raw JSON for every table.
#[derive(Debug, Clone, Copy)]
pub struct DefinitionTables<'a> {
    pub skills: &'a str,
    pub spells: &'a str,
    pub achievements: &'a str,
    pub monsters: &'a str,
    pub locales: &'a str,
    pub classes: &'a str,
    pub activities: &'a str,
    pub items: &'a str,
}

impl DefinitionTables<'static> {
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            skills: SKILLS_JSON,
            spells: SPELLS_JSON,
            achievements: ACHIEVEMENTS_JSON,
            monsters: MONSTERS_JSON,
            locales: LOCALES_JSON,
            classes: CLASSES_JSON,
            activities: ACTIVITIES_JSON,
            items: ITEMS_JSON,
        }
    }
}

/// Read-only context shared by every manager.
#[derive(Debug, Clone)]
pub struct Definitions {
    pub skills: Arc<BTreeMap<String, SkillDef>>,
    pub spells: Arc<BTreeMap<String, SpellDef>>,
    pub achievements: Arc<BTreeMap<String, AchievementDef>>,
    pub monsters: Arc<BTreeMap<String, MonsterDef>>,
    pub locales: Arc<BTreeMap<String, LocaleData>>,
    pub classes: Arc<ClassTree>,
    /// Basic activities offered without any unlock.
    pub activities: Arc<BTreeMap<String, ActivityData>>,
    pub items: Arc<BTreeMap<String, ItemDef>>,
}

fn parse<T: DeserializeOwned>(table: &'static str, json: &str) -> Result<Vec<T>, DefinitionError> {
    serde_json::from_str(json).map_err(|source| DefinitionError::Parse { table, source })
}

fn index<T>(
    kind: &'static str,
    records: Vec<T>,
    id_of: impl Fn(&T) -> &str,
) -> Result<BTreeMap<String, T>, DefinitionError> {
    let mut map = BTreeMap::new();
    for record in records {
        let id = id_of(&record).to_string();
        if map.contains_key(&id) {
            return Err(DefinitionError::DuplicateId { kind, id });
        }
        map.insert(id, record);
    }
    Ok(map)
}

impl Definitions {
    /// Parse and validate caller-supplied tables.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionError`] for malformed JSON, duplicate ids, references to
    /// unknown ids, class cycles or unparsable expressions.
    pub fn from_json(tables: DefinitionTables<'_>) -> Result<Self, DefinitionError> {
        let skills = index("skill", parse("skills", tables.skills)?, |d: &SkillDef| &d.id)?;
        let spells = index("spell", parse("spells", tables.spells)?, |d: &SpellDef| &d.id)?;
        let achievements = index(
            "achievement",
            parse("achievements", tables.achievements)?,
            |d: &AchievementDef| &d.id,
        )?;
        let monsters = index(
            "monster",
            parse("monsters", tables.monsters)?,
            |d: &MonsterDef| &d.id,
        )?;
        let locales = index("locale", parse("locales", tables.locales)?, |d: &LocaleData| {
            &d.id
        })?;
        let classes = ClassTree::from_nodes(parse::<ClassNode>("classes", tables.classes)?)?;
        let activities = index(
            "activity",
            parse("activities", tables.activities)?,
            |d: &ActivityData| &d.id,
        )?;
        let items = index("item", parse("items", tables.items)?, |d: &ItemDef| &d.id)?;
        let defs = Self {
            skills: Arc::new(skills),
            spells: Arc::new(spells),
            achievements: Arc::new(achievements),
            monsters: Arc::new(monsters),
            locales: Arc::new(locales),
            classes: Arc::new(classes),
            activities: Arc::new(activities),
            items: Arc::new(items),
        };
        defs.validate()?;
        Ok(defs)
    }

    /// The embedded default tables.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionError`] if the embedded data is inconsistent.
    pub fn load_from_static() -> Result<Self, DefinitionError> {
        Self::from_json(DefinitionTables::embedded())
    }

    #[must_use]
    pub fn monster(&self, id: &str) -> Option<&MonsterDef> {
        self.monsters.get(id)
    }

    #[must_use]
    pub fn item(&self, id: &str) -> Option<&ItemDef> {
        self.items.get(id)
    }

    #[must_use]
    pub fn activity(&self, id: &str) -> Option<&ActivityData> {
        self.activities.get(id)
    }

    fn check_predicate(
        &self,
        kind: &'static str,
        id: &str,
        predicate: &Predicate,
    ) -> Result<(), DefinitionError> {
        predicate
            .check_syntax()
            .map_err(|source| DefinitionError::Expression {
                kind,
                id: id.to_string(),
                source,
            })?;
        if let Some(target) = predicate
            .referenced_skills()
            .into_iter()
            .find(|s| !self.skills.contains_key(*s))
        {
            return Err(dangling(kind, id, "skill", target));
        }
        if let Some(target) = predicate
            .referenced_classes()
            .into_iter()
            .find(|c| self.classes.node(c).is_none())
        {
            return Err(dangling(kind, id, "class", target));
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), DefinitionError> {
        for skill in self.skills.values() {
            if let Some(unlock) = &skill.unlock {
                self.check_predicate("skill", &skill.id, unlock)?;
            }
            for formula in skill.effects.iter().filter_map(|e| e.formula.as_deref()) {
                Expr::parse(formula).map_err(|source| DefinitionError::Expression {
                    kind: "skill",
                    id: skill.id.clone(),
                    source,
                })?;
            }
        }
        for spell in self.spells.values() {
            if let Some(unlock) = &spell.unlock {
                self.check_predicate("spell", &spell.id, unlock)?;
            }
            if let Some(req) = &spell.required_skill
                && !self.skills.contains_key(&req.skill_id)
            {
                return Err(dangling("spell", &spell.id, "skill", &req.skill_id));
            }
        }
        for node in self.classes.nodes() {
            for requirement in &node.requirements {
                self.check_predicate("class", &node.id, requirement)?;
            }
        }
        for locale in self.locales.values() {
            if let Some(unlock) = &locale.unlock {
                self.check_predicate("locale", &locale.id, unlock)?;
            }
            if let Some(monster) = locale.monsters.iter().find(|m| !self.monsters.contains_key(*m)) {
                return Err(dangling("locale", &locale.id, "monster", monster));
            }
            if let Some(item) = locale.rewards.items.iter().find(|i| !self.items.contains_key(*i)) {
                return Err(dangling("locale", &locale.id, "item", item));
            }
        }
        for monster in self.monsters.values() {
            if let Some(spell) = monster.spells.iter().find(|s| !self.spells.contains_key(*s)) {
                return Err(dangling("monster", &monster.id, "spell", spell));
            }
            if let Some(item) = monster.drops.items.iter().find(|i| !self.items.contains_key(*i)) {
                return Err(dangling("monster", &monster.id, "item", item));
            }
        }
        for item in self.items.values() {
            if item.kind == ItemKind::Equipment && item.slot.is_none() {
                return Err(DefinitionError::MissingSlot(item.id.clone()));
            }
            for effect in item.effects.iter().filter(|e| e.kind.starts_with("learn_")) {
                let target = effect.target.as_deref().unwrap_or_default();
                let known = if effect.kind == "learn_skill" {
                    self.skills.contains_key(target)
                } else {
                    self.spells.contains_key(target)
                };
                if !known {
                    return Err(dangling("item", &item.id, "skill or spell", target));
                }
            }
        }
        for achievement in self.achievements.values() {
            for reward in &achievement.rewards {
                if let AchievementReward::Unlock { unlock_id } = reward
                    && !self.skills.contains_key(unlock_id)
                    && !self.spells.contains_key(unlock_id)
                {
                    return Err(dangling(
                        "achievement",
                        &achievement.id,
                        "skill or spell",
                        unlock_id,
                    ));
                }
            }
        }
        Ok(())
    }
}

fn dangling(kind: &'static str, id: &str, target_kind: &'static str, target: &str) -> DefinitionError {
    DefinitionError::DanglingReference {
        kind,
        id: id.to_string(),
        target_kind,
        target: target.to_string(),
    }
}
