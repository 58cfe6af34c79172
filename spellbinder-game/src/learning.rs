//! Factories for spell learning, skill practice and skill training activities.
use crate::activity::{ActivityCost, ActivityData, ActivityKind, ActivityReward};
use crate::constants::{
    PRACTICE_BASE_SECONDS, PRACTICE_FLOOR_SECONDS, PRACTICE_MANA_COST, PRACTICE_PLAYER_EXP,
    PRACTICE_SKILL_EXP, PRACTICE_SKILL_EXP_PER_LEVEL, REWARD_EXPERIENCE, REWARD_SKILL_EXP,
    SPELL_LEARN_BASE_SECONDS, SPELL_LEARN_EXP_PER_LEVEL, SPELL_LEARN_FLOOR_SECONDS,
    SPELL_LEARN_GOLD_PER_LEVEL, SPELL_LEARN_RESEARCH_PER_LEVEL, TRAINING_BASE_SECONDS,
    TRAINING_FLOOR_SECONDS, TRAINING_GOLD_COST, TRAINING_MANA_COST, TRAINING_PLAYER_EXP,
    TRAINING_RESEARCH_COST, TRAINING_SKILL_EXP,
};
use crate::element::Element;
use crate::numbers::u64_to_f64;
use crate::resource::ResourceId;
use crate::skill::SkillDef;
use crate::spell::SpellDef;
use crate::talent::{Talent, scaled_duration};

const fn cost(resource: ResourceId, amount: f64) -> ActivityCost {
    ActivityCost { resource, amount }
}

fn duration_for(base: f64, floor: f64, talent: &Talent, element: Element) -> f64 {
    scaled_duration(base, floor, talent.get(element)).floor()
}

fn mana_cost(element: Element, amount: f64) -> Option<ActivityCost> {
    element.mana_resource().map(|pool| cost(pool, amount))
}

/// Skill experience granted by completing a practice session at `level`.
#[must_use]
pub const fn practice_skill_exp(level: u32) -> u64 {
    PRACTICE_SKILL_EXP + PRACTICE_SKILL_EXP_PER_LEVEL * level as u64
}

#[must_use]
pub const fn training_skill_exp() -> u64 {
    TRAINING_SKILL_EXP
}

#[must_use]
pub fn spell_learning(spell: &SpellDef, talent: &Talent) -> ActivityData {
    let level = f64::from(spell.level.max(1));
    ActivityData {
        id: format!("learn_{}", spell.id),
        name: format!("Learn {}", spell.name),
        description: format!("Study the {} spell until it can be cast.", spell.name),
        duration: duration_for(
            SPELL_LEARN_BASE_SECONDS,
            SPELL_LEARN_FLOOR_SECONDS,
            talent,
            spell.element,
        ),
        rewards: vec![ActivityReward::fixed(
            REWARD_EXPERIENCE,
            level * SPELL_LEARN_EXP_PER_LEVEL,
        )],
        costs: vec![
            cost(ResourceId::Research, level * SPELL_LEARN_RESEARCH_PER_LEVEL),
            cost(ResourceId::Gold, level * SPELL_LEARN_GOLD_PER_LEVEL),
        ],
        category: Some("learning".to_string()),
        kind: Some(ActivityKind::Learning {
            spell_id: spell.id.clone(),
        }),
    }
}

/// Practice an acquired skill at its `current_level`.
#[must_use]
pub fn skill_practice(skill: &SkillDef, current_level: u32, talent: &Talent) -> ActivityData {
    let mut costs: Vec<ActivityCost> = mana_cost(skill.element, PRACTICE_MANA_COST)
        .into_iter()
        .collect();
    if current_level > 0 {
        costs.push(cost(ResourceId::Gold, f64::from(current_level)));
    }
    ActivityData {
        id: format!("practice_{}", skill.id),
        name: format!("Practice {}", skill.name),
        description: format!("Drill {} to gain experience.", skill.name),
        duration: duration_for(
            PRACTICE_BASE_SECONDS,
            PRACTICE_FLOOR_SECONDS,
            talent,
            skill.element,
        ),
        rewards: vec![
            ActivityReward::fixed(REWARD_SKILL_EXP, u64_to_f64(PRACTICE_SKILL_EXP)),
            ActivityReward::fixed(REWARD_EXPERIENCE, PRACTICE_PLAYER_EXP),
        ],
        costs,
        category: Some("practice".to_string()),
        kind: Some(ActivityKind::Practice {
            skill_id: skill.id.clone(),
        }),
    }
}

/// Train a skill; completion acquires it if needed, then grants experience.
#[must_use]
pub fn skill_training(skill: &SkillDef, talent: &Talent) -> ActivityData {
    let mut costs: Vec<ActivityCost> = mana_cost(skill.element, TRAINING_MANA_COST)
        .into_iter()
        .collect();
    costs.push(cost(ResourceId::Research, TRAINING_RESEARCH_COST));
    costs.push(cost(ResourceId::Gold, TRAINING_GOLD_COST));
    ActivityData {
        id: format!("train_{}", skill.id),
        name: format!("Train {}", skill.name),
        description: format!("Intensive study of {} under a mentor.", skill.name),
        duration: duration_for(
            TRAINING_BASE_SECONDS,
            TRAINING_FLOOR_SECONDS,
            talent,
            skill.element,
        ),
        rewards: vec![
            ActivityReward::fixed(REWARD_SKILL_EXP, u64_to_f64(TRAINING_SKILL_EXP)),
            ActivityReward::fixed(REWARD_EXPERIENCE, TRAINING_PLAYER_EXP),
        ],
        costs,
        category: Some("training".to_string()),
        kind: Some(ActivityKind::Training {
            skill_id: skill.id.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::talent::TalentPreset;

    fn fire_skill() -> SkillDef {
        serde_json::from_str(
            r#"{ "id": "fire_affinity", "name": "Fire Affinity", "element": "fire", "max_level": 10 }"#,
        )
        .unwrap()
    }

    fn neutral_spell() -> SpellDef {
        serde_json::from_str(
            r#"{ "id": "ward", "name": "Ward", "element": "neutral", "level": 2, "mana_cost": 0,
                 "effects": [{ "type": "buff", "target": "self", "value": 3 }] }"#,
        )
        .unwrap()
    }

    #[test]
    fn spell_learning_scales_with_level() {
        let data = spell_learning(&neutral_spell(), &Talent::default());
        assert_eq!(data.id, "learn_ward");
        assert!((data.duration - 30.0).abs() < f64::EPSILON);
        assert_eq!(
            data.cost_list(),
            vec![(ResourceId::Research, 20.0), (ResourceId::Gold, 10.0)]
        );
        assert!((data.rewards[0].amount - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn full_talent_halves_practice_time() {
        let fire = Talent::from_preset(TalentPreset::Fire);
        let data = skill_practice(&fire_skill(), 3, &fire);
        // 20 * (1 - 70/200) = 13
        assert!((data.duration - 13.0).abs() < f64::EPSILON);
        assert_eq!(
            data.cost_list(),
            vec![(ResourceId::ManaFire, 10.0), (ResourceId::Gold, 3.0)]
        );
        let maxed = Talent::new(100.0, 0.0, 0.0, 0.0);
        let halved = skill_practice(&fire_skill(), 0, &maxed);
        assert!((halved.duration - 10.0).abs() < f64::EPSILON);
        assert_eq!(halved.cost_list().len(), 1);
        assert_eq!(practice_skill_exp(3), 56);
    }

    #[test]
    fn durations_never_drop_below_their_floors() {
        for (base, floor) in [
            (SPELL_LEARN_BASE_SECONDS, SPELL_LEARN_FLOOR_SECONDS),
            (PRACTICE_BASE_SECONDS, PRACTICE_FLOOR_SECONDS),
            (TRAINING_BASE_SECONDS, TRAINING_FLOOR_SECONDS),
        ] {
            assert!((scaled_duration(base, floor, 199.0) - floor).abs() < f64::EPSILON);
        }
        assert!((SPELL_LEARN_FLOOR_SECONDS - 5.0).abs() < f64::EPSILON);
        assert!((PRACTICE_FLOOR_SECONDS - 3.0).abs() < f64::EPSILON);
        assert!((TRAINING_FLOOR_SECONDS - 5.0).abs() < f64::EPSILON);
        let maxed = Talent::new(100.0, 100.0, 100.0, 100.0);
        let learn = spell_learning(&neutral_spell(), &maxed);
        assert!(learn.duration >= SPELL_LEARN_FLOOR_SECONDS);
        let train = skill_training(&fire_skill(), &maxed);
        assert!((train.duration - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn training_costs_mana_research_and_gold() {
        let data = skill_training(&fire_skill(), &Talent::default());
        assert_eq!(data.id, "train_fire_affinity");
        assert!((data.duration - 25.0).abs() < f64::EPSILON);
        assert_eq!(data.costs.len(), 3);
        assert!(matches!(data.kind, Some(ActivityKind::Training { .. })));
        assert_eq!(training_skill_exp(), 100);
    }
}
