use std::fmt;

use spellbinder_game::learning::{skill_practice, skill_training, spell_learning};
use spellbinder_game::{ActivityData, EquipmentSlot, GameState, ResourceId};

/// Health fraction below which expeditions are postponed.
const EXPEDITION_HEALTH_FLOOR: f64 = 0.6;

/// What a policy did on one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyAction {
    Idle,
    UnlockedClass(String),
    Equipped(String),
    LearningSpell(String),
    Exploring(String),
    TrainingSkill(String),
    PracticingSkill(String),
    Basic(String),
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::UnlockedClass(id) => write!(f, "unlocked class {id}"),
            Self::Equipped(id) => write!(f, "equipped {id}"),
            Self::LearningSpell(id) => write!(f, "learning {id}"),
            Self::Exploring(id) => write!(f, "exploring {id}"),
            Self::TrainingSkill(id) => write!(f, "training {id}"),
            Self::PracticingSkill(id) => write!(f, "practicing {id}"),
            Self::Basic(id) => write!(f, "{id}"),
        }
    }
}

/// Policy interface for automated sessions.
pub trait SessionPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Inspect the game between ticks and issue at most one command.
    fn act(&mut self, game: &mut GameState) -> PolicyAction;
}

/// Keeps the scheduler fed with the most useful affordable activity.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptedPolicy;

fn affordable(game: &GameState, activity: &ActivityData) -> bool {
    game.player()
        .resources()
        .can_afford(&activity.cost_list())
}

impl ScriptedPolicy {
    fn unlock_cheapest_class(game: &mut GameState) -> Option<PolicyAction> {
        let cheapest = game
            .available_classes()
            .into_iter()
            .min_by(|a, b| a.costs.gold.total_cmp(&b.costs.gold))
            .map(|node| node.id.clone())?;
        game.unlock_class(&cheapest)
            .then_some(PolicyAction::UnlockedClass(cheapest))
    }

    /// Wear carried gear when its slot is free.
    fn equip_gear(game: &mut GameState) -> Option<PolicyAction> {
        let inventory = game.player().inventory();
        let item_id = inventory
            .items()
            .keys()
            .filter_map(|id| inventory.definition(id))
            .find(|def| {
                def.slot.is_some_and(|slot| {
                    EquipmentSlot::ALL
                        .into_iter()
                        .any(|free| free.accepts(slot) && inventory.equipped(free).is_none())
                })
            })
            .map(|def| def.id.clone())?;
        game.equip_item(&item_id)
            .then_some(PolicyAction::Equipped(item_id))
    }

    fn learn_spell(game: &mut GameState) -> Option<PolicyAction> {
        let player = game.player();
        let spell_id = player
            .spells()
            .learnable(player)
            .into_iter()
            .find(|def| affordable(game, &spell_learning(def, player.talent())))
            .map(|def| def.id.clone())?;
        game.start_spell_learning(&spell_id)
            .map(|_| PolicyAction::LearningSpell(spell_id))
    }

    fn explore(game: &mut GameState) -> Option<PolicyAction> {
        let player = game.player();
        let health = player.resources().get(ResourceId::Health)?;
        if health.percent() < EXPEDITION_HEALTH_FLOOR * 100.0
            || !player.spells().has_attack_spell()
        {
            return None;
        }
        let stamina = player.resources().value(ResourceId::Stamina);
        let locale_id = game
            .locales()
            .available(player)
            .into_iter()
            .next()
            .filter(|locale| game.locales().can_explore(&locale.id, player, stamina))
            .map(|locale| locale.id.clone())?;
        game.start_exploration(&locale_id)
            .map(|_| PolicyAction::Exploring(locale_id))
    }

    fn advance_primary_skill(game: &mut GameState) -> Option<PolicyAction> {
        let player = game.player();
        let primary = player.talent().primary();
        let talent = player.talent();

        let practice = player
            .skills()
            .iter()
            .filter(|(def, skill)| def.element == primary && !skill.is_maxed())
            .max_by_key(|(_, skill)| skill.level())
            .filter(|(def, skill)| affordable(game, &skill_practice(def, skill.level(), talent)))
            .map(|(def, _)| def.id.clone());
        if let Some(skill_id) = practice {
            return game
                .start_skill_practice(&skill_id)
                .map(|_| PolicyAction::PracticingSkill(skill_id));
        }

        let training = player
            .skills()
            .unlockable(player)
            .into_iter()
            .filter(|def| def.element == primary)
            .find(|def| affordable(game, &skill_training(def, talent)))
            .map(|def| def.id.clone())?;
        game.start_skill_training(&training)
            .map(|_| PolicyAction::TrainingSkill(training))
    }

    fn basic(game: &mut GameState) -> Option<PolicyAction> {
        let health = game.player().resources().get(ResourceId::Health)?;
        let wanted = if health.percent() < EXPEDITION_HEALTH_FLOOR * 100.0 {
            ["meditate", "odd_jobs", "study"]
        } else {
            ["study", "odd_jobs", "meditate"]
        };
        let activity_id = wanted.into_iter().find(|id| {
            game.definitions()
                .activity(id)
                .is_some_and(|activity| affordable(game, activity))
        })?;
        game.start_basic_activity(activity_id)
            .map(|_| PolicyAction::Basic(activity_id.to_string()))
    }
}

impl SessionPolicy for ScriptedPolicy {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn act(&mut self, game: &mut GameState) -> PolicyAction {
        if game.combat().is_some() || !game.runner().is_idle() {
            return PolicyAction::Idle;
        }
        Self::unlock_cheapest_class(game)
            .or_else(|| Self::equip_gear(game))
            .or_else(|| Self::learn_spell(game))
            .or_else(|| Self::explore(game))
            .or_else(|| Self::advance_primary_skill(game))
            .or_else(|| Self::basic(game))
            .unwrap_or(PolicyAction::Idle)
    }
}
