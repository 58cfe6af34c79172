//! Locales and exploration expeditions.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::achievement::AchievementManager;
use crate::activity::{ActivityCost, ActivityData, ActivityKind};
use crate::constants::{
    EXPLORE_COMBAT_ODDS, EXPLORE_MAX_EVENTS, EXPLORE_MIN_EVENTS, EXPLORE_RESOURCE_ODDS,
    EXPLORE_TREASURE_ODDS, achievement_ids,
};
use crate::monster::DropTable;
use crate::predicate::{Predicate, PredicateContext};
use crate::resource::ResourceId;
use crate::save::LoadError;

const TREASURE_FINDS: [&str; 3] = ["a treasure chest", "a hidden cache", "an ancient relic"];
const RESOURCE_FINDS: [&str; 3] = ["a mana node", "a patch of herbs", "an ore vein"];
const EMPTY_FINDS: [&str; 3] = [
    "The area is quiet; nothing of note turns up.",
    "You search carefully but find nothing worth taking.",
    "Other adventurers have already picked this place clean.",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocaleData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub danger_level: u32,
    /// Locales without a requirement start discovered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock: Option<Predicate>,
    #[serde(default)]
    pub monsters: Vec<String>,
    #[serde(default)]
    pub rewards: DropTable,
    /// Seconds.
    pub explore_duration: f64,
    #[serde(default)]
    pub stamina_cost: f64,
}

impl LocaleData {
    #[must_use]
    pub fn requirements_met<C: PredicateContext + ?Sized>(&self, ctx: &C) -> bool {
        self.unlock.as_ref().is_none_or(|p| p.evaluate(ctx))
    }
}

/// One pre-rolled step of an expedition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ExploreEvent {
    Combat { monster_id: String, description: String },
    Treasure { description: String },
    Resource { description: String },
    Empty { description: String },
}

impl ExploreEvent {
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::Combat { description, .. }
            | Self::Treasure { description }
            | Self::Resource { description }
            | Self::Empty { description } => description,
        }
    }

    #[must_use]
    pub const fn is_combat(&self) -> bool {
        matches!(self, Self::Combat { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LocaleState {
    pub discovered: bool,
    pub explored_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_explored_ms: Option<u64>,
}

/// Why an expedition cannot start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExploreBlocker {
    UnknownLocale,
    Undiscovered,
    RequirementsUnmet,
    NotEnoughStamina,
}

impl ExploreBlocker {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownLocale => "unknown locale",
            Self::Undiscovered => "locale not discovered",
            Self::RequirementsUnmet => "requirements not met",
            Self::NotEnoughStamina => "not enough stamina",
        }
    }
}

impl fmt::Display for ExploreBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct LocaleManager {
    defs: Arc<BTreeMap<String, LocaleData>>,
    states: BTreeMap<String, LocaleState>,
}

impl LocaleManager {
    #[must_use]
    pub fn new(defs: Arc<BTreeMap<String, LocaleData>>) -> Self {
        let states = defs
            .values()
            .map(|locale| {
                let state = LocaleState {
                    discovered: locale.unlock.is_none(),
                    ..LocaleState::default()
                };
                (locale.id.clone(), state)
            })
            .collect();
        Self { defs, states }
    }

    /// Rebind saved locale progress.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::UnknownId`] for progress naming an undefined locale.
    pub fn restore(
        defs: Arc<BTreeMap<String, LocaleData>>,
        saved: BTreeMap<String, LocaleState>,
    ) -> Result<Self, LoadError> {
        let mut manager = Self::new(defs);
        for (id, state) in saved {
            let Some(slot) = manager.states.get_mut(&id) else {
                return Err(LoadError::UnknownId { kind: "locale", id });
            };
            *slot = state;
        }
        Ok(manager)
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, LocaleState> {
        self.states.clone()
    }

    #[must_use]
    pub fn locale(&self, id: &str) -> Option<&LocaleData> {
        self.defs.get(id)
    }

    #[must_use]
    pub fn state(&self, id: &str) -> Option<&LocaleState> {
        self.states.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LocaleData, &LocaleState)> {
        self.defs
            .values()
            .filter_map(|def| self.states.get(&def.id).map(|state| (def, state)))
    }

    #[must_use]
    pub fn discovered(&self) -> Vec<&LocaleData> {
        self.iter()
            .filter(|(_, state)| state.discovered)
            .map(|(def, _)| def)
            .collect()
    }

    /// Discovered locales whose requirements currently hold, by danger level.
    #[must_use]
    pub fn available<C: PredicateContext + ?Sized>(&self, ctx: &C) -> Vec<&LocaleData> {
        let mut list: Vec<&LocaleData> = self
            .discovered()
            .into_iter()
            .filter(|def| def.requirements_met(ctx))
            .collect();
        list.sort_by_key(|def| def.danger_level);
        list
    }

    /// Mark a locale discovered. `true` only on the first discovery.
    pub fn discover(&mut self, id: &str, achievements: &mut AchievementManager) -> bool {
        let Some(state) = self.states.get_mut(id) else {
            log::warn!("cannot discover unknown locale `{id}`");
            return false;
        };
        if state.discovered {
            return false;
        }
        state.discovered = true;
        log::info!("locale discovered: {id}");
        achievements.increment(achievement_ids::EXPLORER, 1.0);
        true
    }

    /// Discover every hidden locale whose requirement now holds. Returns their ids.
    pub fn discover_eligible<C: PredicateContext + ?Sized>(
        &mut self,
        ctx: &C,
        achievements: &mut AchievementManager,
    ) -> Vec<String> {
        let ready: Vec<String> = self
            .iter()
            .filter(|(def, state)| !state.discovered && def.requirements_met(ctx))
            .map(|(def, _)| def.id.clone())
            .collect();
        ready
            .into_iter()
            .filter(|id| self.discover(id, achievements))
            .collect()
    }

    /// # Errors
    ///
    /// Returns the first [`ExploreBlocker`] preventing an expedition.
    pub fn check_explore<C: PredicateContext + ?Sized>(
        &self,
        id: &str,
        ctx: &C,
        stamina: f64,
    ) -> Result<(), ExploreBlocker> {
        let (Some(def), Some(state)) = (self.defs.get(id), self.states.get(id)) else {
            return Err(ExploreBlocker::UnknownLocale);
        };
        if !state.discovered {
            return Err(ExploreBlocker::Undiscovered);
        }
        if !def.requirements_met(ctx) {
            return Err(ExploreBlocker::RequirementsUnmet);
        }
        if stamina < def.stamina_cost {
            return Err(ExploreBlocker::NotEnoughStamina);
        }
        Ok(())
    }

    #[must_use]
    pub fn can_explore<C: PredicateContext + ?Sized>(&self, id: &str, ctx: &C, stamina: f64) -> bool {
        self.check_explore(id, ctx, stamina).is_ok()
    }

    pub fn record_exploration(
        &mut self,
        id: &str,
        now_ms: u64,
        achievements: &mut AchievementManager,
    ) -> bool {
        let Some(state) = self.states.get_mut(id) else {
            return false;
        };
        state.explored_count += 1;
        state.last_explored_ms = Some(now_ms);
        achievements.increment(achievement_ids::EXPLORER, 1.0);
        true
    }

    /// Build an expedition with its events rolled up front.
    pub fn create_explore_activity(&self, id: &str, rng: &mut impl Rng) -> Option<ActivityData> {
        let locale = self.defs.get(id)?;
        Some(ActivityData {
            id: format!("explore_{}", locale.id),
            name: format!("Explore {}", locale.name),
            description: locale.description.clone(),
            duration: locale.explore_duration,
            rewards: Vec::new(),
            costs: if locale.stamina_cost > 0.0 {
                vec![ActivityCost {
                    resource: ResourceId::Stamina,
                    amount: locale.stamina_cost,
                }]
            } else {
                Vec::new()
            },
            category: Some("exploration".to_string()),
            kind: Some(ActivityKind::Exploration {
                locale_id: locale.id.clone(),
                events: roll_events(locale, rng),
            }),
        })
    }
}

fn pick<'a>(options: &[&'a str], rng: &mut impl Rng) -> &'a str {
    options[rng.gen_range(0..options.len())]
}

fn combat_event(locale: &LocaleData, rng: &mut impl Rng) -> Option<ExploreEvent> {
    if locale.monsters.is_empty() {
        return None;
    }
    let monster_id = locale.monsters[rng.gen_range(0..locale.monsters.len())].clone();
    Some(ExploreEvent::Combat {
        description: format!("A {monster_id} blocks the way!"),
        monster_id,
    })
}

fn roll_event(locale: &LocaleData, rng: &mut impl Rng) -> ExploreEvent {
    let roll: f64 = rng.gen_range(0.0..1.0);
    if roll < EXPLORE_COMBAT_ODDS
        && let Some(event) = combat_event(locale, rng)
    {
        return event;
    }
    if roll < EXPLORE_TREASURE_ODDS {
        ExploreEvent::Treasure {
            description: format!("You found {}!", pick(&TREASURE_FINDS, rng)),
        }
    } else if roll < EXPLORE_RESOURCE_ODDS {
        ExploreEvent::Resource {
            description: format!("You found {} worth harvesting.", pick(&RESOURCE_FINDS, rng)),
        }
    } else {
        ExploreEvent::Empty {
            description: pick(&EMPTY_FINDS, rng).to_string(),
        }
    }
}

/// 3 to 5 events; at least one is a fight when the locale has monsters.
fn roll_events(locale: &LocaleData, rng: &mut impl Rng) -> Vec<ExploreEvent> {
    let count = rng.gen_range(EXPLORE_MIN_EVENTS..=EXPLORE_MAX_EVENTS);
    let mut events: Vec<ExploreEvent> = (0..count).map(|_| roll_event(locale, rng)).collect();
    if !events.iter().any(ExploreEvent::is_combat) {
        let slot = rng.gen_range(0..events.len());
        if let Some(event) = combat_event(locale, rng) {
            events[slot] = event;
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievement::AchievementDef;
    use crate::element::Element;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    struct Ctx {
        attack: bool,
    }

    impl PredicateContext for Ctx {
        fn talent(&self, _element: Element) -> f64 {
            0.0
        }
        fn skill_level(&self, _skill_id: &str) -> Option<u32> {
            None
        }
        fn player_level(&self) -> u32 {
            1
        }
        fn is_class_unlocked(&self, _class_id: &str) -> bool {
            false
        }
        fn has_attack_spell(&self) -> bool {
            self.attack
        }
    }

    fn defs() -> Arc<BTreeMap<String, LocaleData>> {
        let list: Vec<LocaleData> = serde_json::from_str(
            r#"[
              { "id": "meadow", "name": "Meadow", "danger_level": 1, "monsters": ["slime"],
                "rewards": { "gold": "5~10", "mana_water": "2~4" },
                "explore_duration": 20, "stamina_cost": 10 },
              { "id": "cave", "name": "Cave", "danger_level": 3, "monsters": ["bat", "golem"],
                "unlock": { "type": "has_attack_spell" },
                "explore_duration": 40, "stamina_cost": 20 },
              { "id": "garden", "name": "Garden", "explore_duration": 5 }
            ]"#,
        )
        .unwrap();
        Arc::new(list.into_iter().map(|l| (l.id.clone(), l)).collect())
    }

    fn achievements() -> AchievementManager {
        let list: Vec<AchievementDef> = serde_json::from_str(
            r#"[{ "id": "explorer", "name": "Explorer", "condition": { "type": "explore", "required": 5 } }]"#,
        )
        .unwrap();
        AchievementManager::new(Arc::new(list.into_iter().map(|d| (d.id.clone(), d)).collect()))
    }

    #[test]
    fn gated_locales_start_hidden_and_are_discovered_once() {
        let mut manager = LocaleManager::new(defs());
        let mut achievements = achievements();
        assert!(manager.state("meadow").unwrap().discovered);
        assert!(!manager.state("cave").unwrap().discovered);
        assert_eq!(
            manager.check_explore("cave", &Ctx { attack: true }, 100.0),
            Err(ExploreBlocker::Undiscovered)
        );
        assert!(manager.discover_eligible(&Ctx { attack: false }, &mut achievements).is_empty());
        assert_eq!(
            manager.discover_eligible(&Ctx { attack: true }, &mut achievements),
            vec!["cave".to_string()]
        );
        assert!(!manager.discover("cave", &mut achievements));
        let explorer = achievements.get("explorer").unwrap();
        assert!((explorer.current - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn blockers_are_reported_in_order() {
        let manager = LocaleManager::new(defs());
        let ctx = Ctx { attack: false };
        assert_eq!(
            manager.check_explore("nowhere", &ctx, 100.0),
            Err(ExploreBlocker::UnknownLocale)
        );
        assert_eq!(
            manager.check_explore("meadow", &ctx, 5.0),
            Err(ExploreBlocker::NotEnoughStamina)
        );
        assert!(manager.can_explore("meadow", &ctx, 10.0));
        let names: Vec<_> = manager.available(&ctx).iter().map(|l| l.id.as_str()).collect();
        assert_eq!(names, vec!["garden", "meadow"]);
    }

    #[test]
    fn expeditions_roll_three_to_five_events_with_a_fight() {
        let manager = LocaleManager::new(defs());
        for seed in 0..40 {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let activity = manager.create_explore_activity("cave", &mut rng).unwrap();
            assert_eq!(activity.cost_list(), vec![(ResourceId::Stamina, 20.0)]);
            let Some(ActivityKind::Exploration { locale_id, events }) = activity.kind else {
                panic!("expected exploration payload");
            };
            assert_eq!(locale_id, "cave");
            assert!((3..=5).contains(&events.len()));
            assert!(events.iter().any(ExploreEvent::is_combat));
        }
    }

    #[test]
    fn locales_without_monsters_never_fight() {
        let manager = LocaleManager::new(defs());
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let activity = manager.create_explore_activity("garden", &mut rng).unwrap();
        assert!(activity.costs.is_empty());
        let Some(ActivityKind::Exploration { events, .. }) = activity.kind else {
            panic!("expected exploration payload");
        };
        assert!(!events.iter().any(ExploreEvent::is_combat));
    }

    #[test]
    fn exploration_is_recorded_and_restored() {
        let mut manager = LocaleManager::new(defs());
        let mut achievements = achievements();
        assert!(manager.record_exploration("meadow", 1_234, &mut achievements));
        let saved = manager.snapshot();
        let restored = LocaleManager::restore(defs(), saved.clone()).unwrap();
        assert_eq!(restored.snapshot(), saved);
        assert_eq!(restored.state("meadow").unwrap().explored_count, 1);
        let mut bogus = saved;
        bogus.insert("atlantis".into(), LocaleState::default());
        assert!(LocaleManager::restore(defs(), bogus).is_err());
    }
}
