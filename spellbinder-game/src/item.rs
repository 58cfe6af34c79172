//! Item definitions, the carried bag and equipped gear.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::element::Element;
use crate::save::LoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Consumable,
    Equipment,
    Material,
    Book,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemRarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentSlot {
    Weapon,
    Armor,
    Accessory1,
    Accessory2,
}

impl EquipmentSlot {
    pub const ALL: [Self; 4] = [Self::Weapon, Self::Armor, Self::Accessory1, Self::Accessory2];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weapon => "weapon",
            Self::Armor => "armor",
            Self::Accessory1 => "accessory1",
            Self::Accessory2 => "accessory2",
        }
    }

    /// Both accessory slots accept the same gear.
    #[must_use]
    pub const fn accepts(self, declared: Self) -> bool {
        matches!(
            (self, declared),
            (Self::Weapon, Self::Weapon)
                | (Self::Armor, Self::Armor)
                | (
                    Self::Accessory1 | Self::Accessory2,
                    Self::Accessory1 | Self::Accessory2
                )
        )
    }
}

impl fmt::Display for EquipmentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEffect {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: f64,
    /// Element for `restore_mana`, skill or spell id for `learn_*`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(default)]
    pub rarity: ItemRarity,
    /// Trade value in gold.
    #[serde(default)]
    pub value: u32,
    #[serde(default)]
    pub effects: Vec<ItemEffect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<EquipmentSlot>,
    /// Gear bonuses to spell power and mana apply to this element only; all when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<Element>,
}

impl ItemDef {
    #[must_use]
    pub fn effect_value(&self, kind: &str) -> f64 {
        self.effects
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.value)
            .sum()
    }

    #[must_use]
    pub fn applies_to(&self, element: Option<Element>) -> bool {
        match (self.element, element) {
            (None, _) | (_, None) => true,
            (Some(own), Some(wanted)) => own == wanted,
        }
    }
}

/// Why an inventory operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemBlocker {
    UnknownItem,
    NotCarried,
    NotEquipment,
    WrongSlot,
    NotUsable,
    SlotEmpty,
}

impl ItemBlocker {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownItem => "unknown item",
            Self::NotCarried => "item not carried",
            Self::NotEquipment => "item cannot be equipped",
            Self::WrongSlot => "item does not fit that slot",
            Self::NotUsable => "item cannot be used",
            Self::SlotEmpty => "nothing equipped there",
        }
    }
}

impl fmt::Display for ItemBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Carried item counts plus one item per equipment slot.
///
/// Equipped items leave the bag and return to it when unequipped.
#[derive(Debug, Clone)]
pub struct Inventory {
    defs: Arc<BTreeMap<String, ItemDef>>,
    bag: BTreeMap<String, u32>,
    equipment: BTreeMap<EquipmentSlot, String>,
}

impl Inventory {
    #[must_use]
    pub const fn new(defs: Arc<BTreeMap<String, ItemDef>>) -> Self {
        Self {
            defs,
            bag: BTreeMap::new(),
            equipment: BTreeMap::new(),
        }
    }

    /// # Errors
    ///
    /// Returns [`LoadError::UnknownId`] for items missing from `defs`, or
    /// [`LoadError::Invalid`] when gear sits in a slot it does not fit.
    pub fn restore(
        defs: Arc<BTreeMap<String, ItemDef>>,
        bag: BTreeMap<String, u32>,
        equipment: BTreeMap<EquipmentSlot, String>,
    ) -> Result<Self, LoadError> {
        let unknown = |id: &String| LoadError::UnknownId {
            kind: "item",
            id: id.clone(),
        };
        if let Some(id) = bag.keys().find(|id| !defs.contains_key(*id)) {
            return Err(unknown(id));
        }
        for (slot, id) in &equipment {
            let def = defs.get(id).ok_or_else(|| unknown(id))?;
            if !def.slot.is_some_and(|declared| slot.accepts(declared)) {
                return Err(LoadError::Invalid(format!("`{id}` cannot be worn as {slot}")));
            }
        }
        Ok(Self {
            defs,
            bag: bag.into_iter().filter(|(_, count)| *count > 0).collect(),
            equipment,
        })
    }

    #[must_use]
    pub fn definition(&self, id: &str) -> Option<&ItemDef> {
        self.defs.get(id)
    }

    #[must_use]
    pub const fn items(&self) -> &BTreeMap<String, u32> {
        &self.bag
    }

    #[must_use]
    pub const fn equipment(&self) -> &BTreeMap<EquipmentSlot, String> {
        &self.equipment
    }

    #[must_use]
    pub fn quantity(&self, id: &str) -> u32 {
        self.bag.get(id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn equipped(&self, slot: EquipmentSlot) -> Option<&ItemDef> {
        self.equipment.get(&slot).and_then(|id| self.defs.get(id))
    }

    /// Trade value of everything carried, gear excluded.
    #[must_use]
    pub fn total_value(&self) -> u64 {
        self.bag
            .iter()
            .filter_map(|(id, count)| self.defs.get(id).map(|d| u64::from(d.value) * u64::from(*count)))
            .sum()
    }

    /// # Errors
    ///
    /// Returns [`ItemBlocker::UnknownItem`] for ids missing from the item table.
    pub fn add(&mut self, id: &str, count: u32) -> Result<(), ItemBlocker> {
        if !self.defs.contains_key(id) {
            return Err(ItemBlocker::UnknownItem);
        }
        if count > 0 {
            let held = self.bag.entry(id.to_string()).or_insert(0);
            *held = held.saturating_add(count);
        }
        Ok(())
    }

    /// All-or-nothing removal.
    ///
    /// # Errors
    ///
    /// Returns [`ItemBlocker::NotCarried`] when fewer than `count` are held.
    pub fn remove(&mut self, id: &str, count: u32) -> Result<(), ItemBlocker> {
        let held = self.quantity(id);
        if held < count || held == 0 {
            return Err(ItemBlocker::NotCarried);
        }
        if held == count {
            self.bag.remove(id);
        } else {
            self.bag.insert(id.to_string(), held - count);
        }
        Ok(())
    }

    /// Pick the slot a piece of gear goes into: its own slot, or for accessories
    /// the first free accessory slot.
    fn target_slot(&self, declared: EquipmentSlot) -> EquipmentSlot {
        match declared {
            EquipmentSlot::Accessory1 | EquipmentSlot::Accessory2 => [
                EquipmentSlot::Accessory1,
                EquipmentSlot::Accessory2,
            ]
            .into_iter()
            .find(|slot| !self.equipment.contains_key(slot))
            .unwrap_or(declared),
            other => other,
        }
    }

    /// Move one carried piece of gear into its slot. Returns the slot used and the
    /// id of whatever it replaced, which goes back into the bag.
    ///
    /// # Errors
    ///
    /// Returns an [`ItemBlocker`] when the item is unknown, not carried or not gear.
    pub fn equip(&mut self, id: &str) -> Result<(EquipmentSlot, Option<String>), ItemBlocker> {
        let def = self.defs.get(id).ok_or(ItemBlocker::UnknownItem)?;
        if def.kind != ItemKind::Equipment {
            return Err(ItemBlocker::NotEquipment);
        }
        let declared = def.slot.ok_or(ItemBlocker::WrongSlot)?;
        self.remove(id, 1)?;
        let slot = self.target_slot(declared);
        let replaced = self.equipment.insert(slot, id.to_string());
        if let Some(previous) = &replaced {
            *self.bag.entry(previous.clone()).or_insert(0) += 1;
        }
        Ok((slot, replaced))
    }

    /// Return the gear in `slot` to the bag.
    ///
    /// # Errors
    ///
    /// Returns [`ItemBlocker::SlotEmpty`] when nothing is equipped there.
    pub fn unequip(&mut self, slot: EquipmentSlot) -> Result<String, ItemBlocker> {
        let id = self.equipment.remove(&slot).ok_or(ItemBlocker::SlotEmpty)?;
        *self.bag.entry(id.clone()).or_insert(0) += 1;
        Ok(id)
    }

    /// Consume one consumable or book and hand back its effects.
    ///
    /// # Errors
    ///
    /// Returns an [`ItemBlocker`] when the item is unknown, not carried or not usable.
    pub fn take_for_use(&mut self, id: &str) -> Result<Vec<ItemEffect>, ItemBlocker> {
        let def = self.defs.get(id).ok_or(ItemBlocker::UnknownItem)?;
        if !matches!(def.kind, ItemKind::Consumable | ItemKind::Book) {
            return Err(ItemBlocker::NotUsable);
        }
        let effects = def.effects.clone();
        self.remove(id, 1)?;
        Ok(effects)
    }

    /// Sum of `kind` across equipped gear that applies to `element`.
    #[must_use]
    pub fn equipped_total(&self, kind: &str, element: Option<Element>) -> f64 {
        self.equipment
            .values()
            .filter_map(|id| self.defs.get(id))
            .filter(|def| def.applies_to(element))
            .map(|def| def.effect_value(kind))
            .sum()
    }

    /// Flat reduction to incoming damage from worn gear.
    #[must_use]
    pub fn defense(&self) -> f64 {
        self.equipped_total("defense", None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs() -> Arc<BTreeMap<String, ItemDef>> {
        let items: Vec<ItemDef> = serde_json::from_str(
            r#"[
                { "id": "vest", "name": "Vest", "type": "equipment", "slot": "armor",
                  "effects": [{ "type": "defense", "value": 4 }] },
                { "id": "plate", "name": "Plate", "type": "equipment", "slot": "armor",
                  "effects": [{ "type": "defense", "value": 9 }] },
                { "id": "ember_ring", "name": "Ember Ring", "type": "equipment",
                  "slot": "accessory1", "element": "fire",
                  "effects": [{ "type": "spell_power", "value": 2 }] },
                { "id": "tonic", "name": "Tonic", "type": "consumable", "value": 3,
                  "effects": [{ "type": "restore_health", "value": 20 }] },
                { "id": "gel", "name": "Gel", "type": "material", "value": 1 }
            ]"#,
        )
        .unwrap();
        Arc::new(items.into_iter().map(|d| (d.id.clone(), d)).collect())
    }

    #[test]
    fn equip_swaps_gear_through_the_bag() {
        let mut inventory = Inventory::new(defs());
        inventory.add("vest", 1).unwrap();
        inventory.add("plate", 1).unwrap();
        assert_eq!(inventory.equip("vest"), Ok((EquipmentSlot::Armor, None)));
        assert!((inventory.defense() - 4.0).abs() < f64::EPSILON);
        assert_eq!(inventory.quantity("vest"), 0);

        assert_eq!(
            inventory.equip("plate"),
            Ok((EquipmentSlot::Armor, Some("vest".to_string())))
        );
        assert!((inventory.defense() - 9.0).abs() < f64::EPSILON);
        assert_eq!(inventory.quantity("vest"), 1);

        assert_eq!(inventory.unequip(EquipmentSlot::Armor), Ok("plate".to_string()));
        assert!(inventory.defense().abs() < f64::EPSILON);
        assert_eq!(inventory.unequip(EquipmentSlot::Armor), Err(ItemBlocker::SlotEmpty));
    }

    #[test]
    fn refusals_leave_the_bag_alone() {
        let mut inventory = Inventory::new(defs());
        assert_eq!(inventory.equip("vest"), Err(ItemBlocker::NotCarried));
        inventory.add("gel", 2).unwrap();
        assert_eq!(inventory.equip("gel"), Err(ItemBlocker::NotEquipment));
        assert_eq!(inventory.take_for_use("gel"), Err(ItemBlocker::NotUsable));
        assert_eq!(inventory.remove("gel", 3), Err(ItemBlocker::NotCarried));
        assert_eq!(inventory.quantity("gel"), 2);
        assert_eq!(inventory.add("stardust", 1), Err(ItemBlocker::UnknownItem));
    }

    #[test]
    fn accessories_fill_both_slots_and_respect_element() {
        let mut inventory = Inventory::new(defs());
        inventory.add("ember_ring", 2).unwrap();
        assert_eq!(inventory.equip("ember_ring").map(|r| r.0), Ok(EquipmentSlot::Accessory1));
        assert_eq!(inventory.equip("ember_ring").map(|r| r.0), Ok(EquipmentSlot::Accessory2));
        assert!((inventory.equipped_total("spell_power", Some(Element::Fire)) - 4.0).abs() < 1e-9);
        assert!(inventory.equipped_total("spell_power", Some(Element::Water)).abs() < 1e-9);
    }

    #[test]
    fn using_a_consumable_spends_one() {
        let mut inventory = Inventory::new(defs());
        inventory.add("tonic", 2).unwrap();
        assert_eq!(inventory.total_value(), 6);
        let effects = inventory.take_for_use("tonic").unwrap();
        assert_eq!(effects[0].kind, "restore_health");
        assert_eq!(inventory.quantity("tonic"), 1);
    }

    #[test]
    fn restore_checks_ids_and_slots() {
        let mut equipment = BTreeMap::new();
        equipment.insert(EquipmentSlot::Weapon, "vest".to_string());
        assert!(matches!(
            Inventory::restore(defs(), BTreeMap::new(), equipment),
            Err(LoadError::Invalid(_))
        ));
        let mut bag = BTreeMap::new();
        bag.insert("ghost".to_string(), 1);
        assert!(matches!(
            Inventory::restore(defs(), bag, BTreeMap::new()),
            Err(LoadError::UnknownId { kind: "item", .. })
        ));
    }
}
