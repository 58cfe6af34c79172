//! Resource ledger: bounded numeric pools with passive regeneration.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    BASE_MANA_CAPACITY, HEALTH_REGEN_PER_SECOND, START_GOLD, START_HEALTH, START_STAMINA,
    STAMINA_REGEN_PER_SECOND,
};
use crate::element::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceId {
    Gold,
    Research,
    ManaFire,
    ManaWater,
    ManaEarth,
    ManaWind,
    Health,
    Stamina,
}

impl ResourceId {
    pub const ALL: [Self; 8] = [
        Self::Gold,
        Self::Research,
        Self::ManaFire,
        Self::ManaWater,
        Self::ManaEarth,
        Self::ManaWind,
        Self::Health,
        Self::Stamina,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gold => "gold",
            Self::Research => "research",
            Self::ManaFire => "mana_fire",
            Self::ManaWater => "mana_water",
            Self::ManaEarth => "mana_earth",
            Self::ManaWind => "mana_wind",
            Self::Health => "health",
            Self::Stamina => "stamina",
        }
    }

    /// Element whose mana this pool holds.
    #[must_use]
    pub const fn mana_element(self) -> Option<Element> {
        match self {
            Self::ManaFire => Some(Element::Fire),
            Self::ManaWater => Some(Element::Water),
            Self::ManaEarth => Some(Element::Earth),
            Self::ManaWind => Some(Element::Wind),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s.trim())
            .ok_or(())
    }
}

/// A single pool. `max: None` means unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ResourceRecord")]
pub struct Resource {
    pub id: ResourceId,
    value: f64,
    max: Option<f64>,
    #[serde(default)]
    rate_per_second: f64,
}

/// Unchecked wire form of a [`Resource`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceRecord {
    id: ResourceId,
    value: f64,
    max: Option<f64>,
    #[serde(default)]
    rate_per_second: f64,
}

impl TryFrom<ResourceRecord> for Resource {
    type Error = String;

    fn try_from(record: ResourceRecord) -> Result<Self, Self::Error> {
        let id = record.id;
        if !record.value.is_finite() || record.value < 0.0 {
            return Err(format!("{id} has invalid value {}", record.value));
        }
        if !record.rate_per_second.is_finite() {
            return Err(format!("{id} has invalid regen rate"));
        }
        if let Some(max) = record.max {
            if !max.is_finite() || max < 0.0 {
                return Err(format!("{id} has invalid max {max}"));
            }
            if record.value > max {
                return Err(format!("{id} value {} exceeds max {max}", record.value));
            }
        }
        Ok(Self {
            id,
            value: record.value,
            max: record.max,
            rate_per_second: record.rate_per_second,
        })
    }
}

impl Resource {
    #[must_use]
    pub fn new(id: ResourceId, value: f64, max: Option<f64>, rate_per_second: f64) -> Self {
        let mut resource = Self {
            id,
            value: 0.0,
            max: max.map(|m| m.max(0.0)),
            rate_per_second,
        };
        resource.add(value);
        resource
    }

    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    #[must_use]
    pub const fn max(&self) -> Option<f64> {
        self.max
    }

    #[must_use]
    pub const fn rate_per_second(&self) -> f64 {
        self.rate_per_second
    }

    /// Fill percentage; unbounded pools report 100.
    #[must_use]
    pub fn percent(&self) -> f64 {
        match self.max {
            Some(max) if max > 0.0 => self.value / max * 100.0,
            Some(_) => 0.0,
            None => 100.0,
        }
    }

    /// Add up to `amount`, clamped to `max`. Returns what was actually added.
    pub fn add(&mut self, amount: f64) -> f64 {
        if !(amount > 0.0) || !amount.is_finite() {
            return 0.0;
        }
        let target = self.value + amount;
        let next = self.max.map_or(target, |max| target.min(max)).max(self.value);
        let added = next - self.value;
        self.value = next;
        added
    }

    /// All-or-nothing deduction.
    pub fn consume(&mut self, amount: f64) -> bool {
        if !(amount >= 0.0) || self.value < amount {
            return false;
        }
        self.value -= amount;
        true
    }

    /// Remove up to `amount`, stopping at zero. Returns the amount removed.
    pub fn drain(&mut self, amount: f64) -> f64 {
        if !(amount > 0.0) {
            return 0.0;
        }
        let removed = amount.min(self.value);
        self.value -= removed;
        removed
    }

    pub fn set_max(&mut self, max: Option<f64>) {
        self.max = max.map(|m| m.max(0.0));
        if let Some(max) = self.max
            && self.value > max
        {
            self.value = max;
        }
    }

    pub const fn set_rate_per_second(&mut self, rate: f64) {
        self.rate_per_second = rate;
    }

    /// Fill to capacity; unbounded pools are left alone.
    pub fn fill(&mut self) {
        if let Some(max) = self.max {
            self.value = max;
        }
    }

    pub fn update(&mut self, delta_seconds: f64) {
        if self.rate_per_second != 0.0 && delta_seconds > 0.0 {
            self.add(self.rate_per_second * delta_seconds);
        }
    }
}

/// Owner of every pool, keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ResourceManager {
    resources: BTreeMap<ResourceId, Resource>,
}

impl ResourceManager {
    /// Starting ledger: 100 gold, empty research and mana, full health and stamina.
    #[must_use]
    pub fn create_default() -> Self {
        let mut manager = Self::default();
        manager.insert(Resource::new(ResourceId::Gold, START_GOLD, None, 0.0));
        manager.insert(Resource::new(ResourceId::Research, 0.0, None, 0.0));
        for element in Element::MAGICAL {
            if let Some(id) = element.mana_resource() {
                manager.insert(Resource::new(id, 0.0, Some(BASE_MANA_CAPACITY), 0.0));
            }
        }
        manager.insert(Resource::new(
            ResourceId::Health,
            START_HEALTH,
            Some(START_HEALTH),
            HEALTH_REGEN_PER_SECOND,
        ));
        manager.insert(Resource::new(
            ResourceId::Stamina,
            START_STAMINA,
            Some(START_STAMINA),
            STAMINA_REGEN_PER_SECOND,
        ));
        manager
    }

    pub fn insert(&mut self, resource: Resource) {
        self.resources.insert(resource.id, resource);
    }

    #[must_use]
    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(&id)
    }

    pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut Resource> {
        self.resources.get_mut(&id)
    }

    #[must_use]
    pub fn value(&self, id: ResourceId) -> f64 {
        self.get(id).map_or(0.0, Resource::value)
    }

    pub fn add(&mut self, id: ResourceId, amount: f64) -> f64 {
        self.get_mut(id).map_or(0.0, |r| r.add(amount))
    }

    pub fn consume(&mut self, id: ResourceId, amount: f64) -> bool {
        self.get_mut(id).is_some_and(|r| r.consume(amount))
    }

    /// Remove up to `amount`, stopping at zero. Returns what was removed.
    pub fn drain(&mut self, id: ResourceId, amount: f64) -> f64 {
        self.get_mut(id).map_or(0.0, |r| r.drain(amount))
    }

    #[must_use]
    pub fn can_afford(&self, costs: &[(ResourceId, f64)]) -> bool {
        // aggregate per id so two entries on the same pool are checked together
        let mut totals: BTreeMap<ResourceId, f64> = BTreeMap::new();
        for (id, amount) in costs {
            *totals.entry(*id).or_default() += amount.max(0.0);
        }
        totals
            .iter()
            .all(|(id, total)| self.get(*id).is_some_and(|r| r.value() >= *total))
    }

    /// Deduct every cost or none of them.
    pub fn consume_all(&mut self, costs: &[(ResourceId, f64)]) -> bool {
        if !self.can_afford(costs) {
            return false;
        }
        let snapshot = self.resources.clone();
        for (id, amount) in costs {
            if !self.consume(*id, *amount) {
                log::error!("deduction of {amount} {id} failed after validation");
                self.resources = snapshot;
                return false;
            }
        }
        true
    }

    pub fn update(&mut self, delta_seconds: f64) {
        for resource in self.resources.values_mut() {
            resource.update(delta_seconds);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }
}
