//! Monster definitions, drop tables and per-encounter instances.
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

use crate::element::Element;
use crate::resource::ResourceId;

/// Inclusive roll range written as `"min~max"` or a single number in data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DropRange {
    pub min: u64,
    pub max: u64,
}

impl DropRange {
    #[must_use]
    pub const fn new(min: u64, max: u64) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    #[must_use]
    pub const fn fixed(value: u64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Uniform roll in `[min, max]`.
    pub fn roll(self, rng: &mut impl Rng) -> u64 {
        if self.min == self.max {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }

    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text.split_once('~') {
            Some((min, max)) => Some(Self::new(
                min.trim().parse().ok()?,
                max.trim().parse().ok()?,
            )),
            None => text.parse().ok().map(Self::fixed),
        }
    }
}

impl fmt::Display for DropRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}~{}", self.min, self.max)
        }
    }
}

impl Serialize for DropRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DropRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(Self::fixed(value)),
            Raw::Text(text) => Self::parse(&text)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid drop range `{text}`"))),
        }
    }
}

/// Rewards rolled from a monster or a locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DropTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gold: Option<DropRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<DropRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mana_fire: Option<DropRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mana_water: Option<DropRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mana_earth: Option<DropRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mana_wind: Option<DropRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
}

/// Result of rolling one or more drop tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Loot {
    pub gold: u64,
    pub experience: u64,
    pub mana: BTreeMap<ResourceId, u64>,
    pub items: Vec<String>,
}

impl Loot {
    pub fn merge(&mut self, other: Self) {
        self.gold += other.gold;
        self.experience += other.experience;
        for (id, amount) in other.mana {
            *self.mana.entry(id).or_insert(0) += amount;
        }
        self.items.extend(other.items);
    }
}

impl DropTable {
    fn mana_ranges(&self) -> [(ResourceId, Option<DropRange>); 4] {
        [
            (ResourceId::ManaFire, self.mana_fire),
            (ResourceId::ManaWater, self.mana_water),
            (ResourceId::ManaEarth, self.mana_earth),
            (ResourceId::ManaWind, self.mana_wind),
        ]
    }

    /// Roll every range; items contribute one random entry.
    pub fn roll(&self, rng: &mut impl Rng) -> Loot {
        let mut loot = Loot {
            gold: self.gold.map_or(0, |r| r.roll(rng)),
            experience: self.experience.map_or(0, |r| r.roll(rng)),
            ..Loot::default()
        };
        for (id, range) in self.mana_ranges() {
            if let Some(range) = range {
                let amount = range.roll(rng);
                if amount > 0 {
                    loot.mana.insert(id, amount);
                }
            }
        }
        if !self.items.is_empty() {
            let idx = rng.gen_range(0..self.items.len());
            loot.items.push(self.items[idx].clone());
        }
        loot
    }

    /// Roll only the currency part (treasure finds).
    pub fn roll_treasure(&self, rng: &mut impl Rng) -> Loot {
        let mut loot = self.roll(rng);
        loot.experience = 0;
        loot.mana.clear();
        loot
    }

    /// Roll only the mana part (resource finds).
    pub fn roll_mana(&self, rng: &mut impl Rng) -> Loot {
        let mut loot = self.roll(rng);
        loot.gold = 0;
        loot.experience = 0;
        loot.items.clear();
        loot
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub element: Element,
    pub health: u32,
    pub max_health: u32,
    pub attack: u32,
    #[serde(default)]
    pub defense: u32,
    #[serde(default)]
    pub spells: Vec<String>,
    #[serde(default)]
    pub drops: DropTable,
    #[serde(default = "MonsterDef::default_level")]
    pub level: u32,
}

impl MonsterDef {
    const fn default_level() -> u32 {
        1
    }
}

/// A timed stat adjustment. Positive values on buffs raise the stat,
/// on debuffs they lower it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    #[serde(rename = "type")]
    pub stat: String,
    pub value: f64,
    pub duration: u32,
    #[serde(default)]
    pub source: String,
}

pub type Modifiers = SmallVec<[Modifier; 4]>;

/// Decrement every duration and drop the expired entries.
pub fn tick_modifiers(list: &mut Modifiers) {
    for modifier in list.iter_mut() {
        modifier.duration = modifier.duration.saturating_sub(1);
    }
    list.retain(|m| m.duration > 0);
}

/// Net adjustment of `stat` across buffs minus debuffs.
#[must_use]
pub fn modifier_total(buffs: &Modifiers, debuffs: &Modifiers, stat: &str) -> f64 {
    let up: f64 = buffs.iter().filter(|m| m.stat == stat).map(|m| m.value).sum();
    let down: f64 = debuffs.iter().filter(|m| m.stat == stat).map(|m| m.value).sum();
    up - down
}

#[derive(Debug, Clone, PartialEq)]
pub struct Monster {
    def: MonsterDef,
    current_health: u32,
    is_alive: bool,
    pub buffs: Modifiers,
    pub debuffs: Modifiers,
}

/// Persisted monster state; stats come back from the definition table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonsterSnapshot {
    pub id: String,
    pub current_health: u32,
    pub is_alive: bool,
    #[serde(default)]
    pub buffs: Modifiers,
    #[serde(default)]
    pub debuffs: Modifiers,
}

impl Monster {
    #[must_use]
    pub fn spawn(def: &MonsterDef) -> Self {
        let current_health = def.health.min(def.max_health.max(def.health));
        Self {
            def: def.clone(),
            current_health,
            is_alive: current_health > 0,
            buffs: SmallVec::new(),
            debuffs: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn restore(def: &MonsterDef, snapshot: MonsterSnapshot) -> Self {
        Self {
            def: def.clone(),
            current_health: snapshot.current_health,
            is_alive: snapshot.is_alive,
            buffs: snapshot.buffs,
            debuffs: snapshot.debuffs,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> MonsterSnapshot {
        MonsterSnapshot {
            id: self.def.id.clone(),
            current_health: self.current_health,
            is_alive: self.is_alive,
            buffs: self.buffs.clone(),
            debuffs: self.debuffs.clone(),
        }
    }

    #[must_use]
    pub fn def(&self) -> &MonsterDef {
        &self.def
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.def.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.def.name
    }

    #[must_use]
    pub const fn element(&self) -> Element {
        self.def.element
    }

    #[must_use]
    pub const fn current_health(&self) -> u32 {
        self.current_health
    }

    #[must_use]
    pub fn max_health(&self) -> u32 {
        self.def.max_health.max(self.def.health)
    }

    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.is_alive
    }

    fn stat(&self, base: u32, stat: &str) -> u32 {
        let total = f64::from(base) + modifier_total(&self.buffs, &self.debuffs, stat);
        crate::numbers::floor_f64_to_u32(total)
    }

    /// Base attack adjusted by modifiers, never negative.
    #[must_use]
    pub fn attack(&self) -> u32 {
        self.stat(self.def.attack, "attack")
    }

    /// Base defense adjusted by modifiers, never negative.
    #[must_use]
    pub fn defense(&self) -> u32 {
        self.stat(self.def.defense, "defense")
    }

    /// Apply damage after defense, at least 1. Returns the damage dealt.
    pub fn take_damage(&mut self, damage: u32) -> u32 {
        if !self.is_alive {
            return 0;
        }
        let actual = damage.saturating_sub(self.defense()).max(1);
        self.current_health = self.current_health.saturating_sub(actual);
        if self.current_health == 0 {
            self.is_alive = false;
        }
        actual
    }

    /// Restore health up to max. Returns the amount healed.
    pub fn heal(&mut self, amount: u32) -> u32 {
        if !self.is_alive {
            return 0;
        }
        let missing = self.max_health().saturating_sub(self.current_health);
        let healed = amount.min(missing);
        self.current_health += healed;
        healed
    }

    pub fn add_buff(&mut self, modifier: Modifier) {
        self.buffs.push(modifier);
    }

    pub fn add_debuff(&mut self, modifier: Modifier) {
        self.debuffs.push(modifier);
    }

    pub fn tick_modifiers(&mut self) {
        tick_modifiers(&mut self.buffs);
        tick_modifiers(&mut self.debuffs);
    }

    #[must_use]
    pub fn health_percentage(&self) -> f64 {
        let max = self.max_health();
        if max == 0 {
            0.0
        } else {
            f64::from(self.current_health) / f64::from(max) * 100.0
        }
    }

    pub fn roll_drops(&self, rng: &mut impl Rng) -> Loot {
        self.def.drops.roll(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn slime() -> MonsterDef {
        serde_json::from_str(
            r#"{ "id": "slime", "name": "Slime", "element": "water", "health": 30,
                 "max_health": 30, "attack": 4, "defense": 2,
                 "drops": { "gold": "5~10", "experience": 12, "mana_water": "1~3", "items": ["goo"] } }"#,
        )
        .unwrap()
    }

    #[test]
    fn drop_ranges_parse_both_forms() {
        let def = slime();
        assert_eq!(def.drops.gold, Some(DropRange::new(5, 10)));
        assert_eq!(def.drops.experience, Some(DropRange::fixed(12)));
        assert_eq!(serde_json::to_value(def.drops.gold).unwrap(), "5~10");
        assert!(serde_json::from_str::<DropRange>("\"x~3\"").is_err());
        assert_eq!(DropRange::new(9, 2), DropRange { min: 2, max: 9 });
    }

    #[test]
    fn rolls_stay_within_ranges() {
        let def = slime();
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..50 {
            let loot = def.drops.roll(&mut rng);
            assert!((5..=10).contains(&loot.gold));
            assert_eq!(loot.experience, 12);
            let mana = loot.mana[&ResourceId::ManaWater];
            assert!((1..=3).contains(&mana));
            assert_eq!(loot.items, vec!["goo".to_string()]);
        }
        let treasure = def.drops.roll_treasure(&mut rng);
        assert_eq!(treasure.experience, 0);
        assert!(treasure.mana.is_empty());
    }

    #[test]
    fn damage_subtracts_defense_with_floor_of_one() {
        let mut monster = Monster::spawn(&slime());
        assert_eq!(monster.take_damage(10), 8);
        assert_eq!(monster.current_health(), 22);
        assert_eq!(monster.take_damage(1), 1);
        assert_eq!(monster.take_damage(100), 98);
        assert!(!monster.is_alive());
        assert_eq!(monster.current_health(), 0);
        assert_eq!(monster.take_damage(5), 0);
    }

    #[test]
    fn modifiers_adjust_stats_and_expire() {
        let mut monster = Monster::spawn(&slime());
        monster.add_debuff(Modifier {
            stat: "defense".into(),
            value: 5.0,
            duration: 2,
            source: "test".into(),
        });
        monster.add_buff(Modifier {
            stat: "attack".into(),
            value: 3.0,
            duration: 1,
            source: "test".into(),
        });
        assert_eq!(monster.defense(), 0);
        assert_eq!(monster.attack(), 7);
        monster.tick_modifiers();
        assert_eq!(monster.attack(), 4);
        assert_eq!(monster.defense(), 0);
        monster.tick_modifiers();
        assert_eq!(monster.defense(), 2);
        assert!(monster.buffs.is_empty() && monster.debuffs.is_empty());
    }

    #[test]
    fn heal_caps_at_max() {
        let mut monster = Monster::spawn(&slime());
        monster.take_damage(12);
        assert_eq!(monster.heal(50), 10);
        assert_eq!(monster.current_health(), 30);
    }

    #[test]
    fn snapshot_restores_progress() {
        let def = slime();
        let mut monster = Monster::spawn(&def);
        monster.take_damage(7);
        let snapshot = monster.snapshot();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["currentHealth"], 25);
        let restored = Monster::restore(&def, serde_json::from_value(json).unwrap());
        assert_eq!(restored, monster);
    }
}
