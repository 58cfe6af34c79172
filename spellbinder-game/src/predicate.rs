//! Requirement predicates gating skills, spells, classes and locales.
//!
//! Predicates are a closed set of variants walked by [`Predicate::evaluate`].
//! `Custom` falls back to the safe expression evaluator in [`crate::expr`].

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::expr;

/// Read-only view of the player used while checking requirements.
pub trait PredicateContext {
    fn talent(&self, element: Element) -> f64;

    /// Level of a skill, `Some(0)` when defined but not acquired, `None` when unknown.
    fn skill_level(&self, skill_id: &str) -> Option<u32>;

    fn player_level(&self) -> u32;

    fn is_class_unlocked(&self, class_id: &str) -> bool;

    fn has_attack_spell(&self) -> bool {
        false
    }

    /// Variable lookup used by custom conditions.
    fn variable(&self, name: &str) -> Option<f64> {
        if let Ok(element) = name.parse::<Element>()
            && element.is_magical()
        {
            return Some(self.talent(element));
        }
        match name {
            "level" | "player_level" => Some(f64::from(self.player_level())),
            "has_attack_spell" => Some(if self.has_attack_spell() { 1.0 } else { 0.0 }),
            other => self.skill_level(other).map(f64::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    Always,
    Talent { element: Element, value: f64 },
    Skill { id: String, value: u32 },
    Level { value: u32 },
    PreviousClass { id: String },
    HasAttackSpell,
    Custom { condition: String },
    All { of: Vec<Predicate> },
    Any { of: Vec<Predicate> },
    Not { predicate: Box<Predicate> },
}

impl Predicate {
    #[must_use]
    pub fn evaluate<C: PredicateContext + ?Sized>(&self, ctx: &C) -> bool {
        match self {
            Self::Always => true,
            Self::Talent { element, value } => ctx.talent(*element) >= *value,
            Self::Skill { id, value } => ctx.skill_level(id).is_some_and(|level| level >= *value),
            Self::Level { value } => ctx.player_level() >= *value,
            Self::PreviousClass { id } => ctx.is_class_unlocked(id),
            Self::HasAttackSpell => ctx.has_attack_spell(),
            Self::Custom { condition } => {
                expr::check_condition(condition, &|name| ctx.variable(name))
            }
            Self::All { of } => of.iter().all(|p| p.evaluate(ctx)),
            Self::Any { of } => of.iter().any(|p| p.evaluate(ctx)),
            Self::Not { predicate } => !predicate.evaluate(ctx),
        }
    }

    /// Skill ids named directly by this predicate tree.
    #[must_use]
    pub fn referenced_skills(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect(&mut out, &mut Vec::new());
        out
    }

    /// Class ids named directly by this predicate tree.
    #[must_use]
    pub fn referenced_classes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect(&mut Vec::new(), &mut out);
        out
    }

    fn collect<'a>(&'a self, skills: &mut Vec<&'a str>, classes: &mut Vec<&'a str>) {
        match self {
            Self::Skill { id, .. } => skills.push(id),
            Self::PreviousClass { id } => classes.push(id),
            Self::All { of } | Self::Any { of } => {
                for p in of {
                    p.collect(skills, classes);
                }
            }
            Self::Not { predicate } => predicate.collect(skills, classes),
            _ => {}
        }
    }

    /// Validate custom conditions parse.
    ///
    /// # Errors
    ///
    /// Returns the first [`expr::ExprError`] found in a `Custom` node.
    pub fn check_syntax(&self) -> Result<(), expr::ExprError> {
        match self {
            Self::Custom { condition } => expr::Expr::parse(condition).map(|_| ()),
            Self::All { of } | Self::Any { of } => of.iter().try_for_each(Self::check_syntax),
            Self::Not { predicate } => predicate.check_syntax(),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Fixture {
        talents: HashMap<Element, f64>,
        skills: HashMap<&'static str, u32>,
        level: u32,
        classes: Vec<&'static str>,
    }

    impl PredicateContext for Fixture {
        fn talent(&self, element: Element) -> f64 {
            self.talents.get(&element).copied().unwrap_or(0.0)
        }

        fn skill_level(&self, skill_id: &str) -> Option<u32> {
            self.skills.get(skill_id).copied()
        }

        fn player_level(&self) -> u32 {
            self.level
        }

        fn is_class_unlocked(&self, class_id: &str) -> bool {
            self.classes.contains(&class_id)
        }
    }

    fn fixture() -> Fixture {
        Fixture {
            talents: HashMap::from([(Element::Fire, 45.0), (Element::Earth, 10.0)]),
            skills: HashMap::from([("fire_affinity", 3), ("earth_affinity", 0)]),
            level: 4,
            classes: vec!["apprentice"],
        }
    }

    #[test]
    fn evaluates_leaf_kinds() {
        let ctx = fixture();
        assert!(Predicate::Talent { element: Element::Fire, value: 40.0 }.evaluate(&ctx));
        assert!(!Predicate::Talent { element: Element::Earth, value: 20.0 }.evaluate(&ctx));
        assert!(Predicate::Skill { id: "fire_affinity".into(), value: 3 }.evaluate(&ctx));
        assert!(!Predicate::Skill { id: "ghost".into(), value: 0 }.evaluate(&ctx));
        assert!(Predicate::Level { value: 4 }.evaluate(&ctx));
        assert!(Predicate::PreviousClass { id: "apprentice".into() }.evaluate(&ctx));
        assert!(!Predicate::HasAttackSpell.evaluate(&ctx));
    }

    #[test]
    fn combinators_and_custom_conditions() {
        let ctx = fixture();
        let json = r#"{
            "type": "all",
            "of": [
                { "type": "custom", "condition": "fire >= 40 && fire_affinity >= 2" },
                { "type": "not", "predicate": { "type": "level", "value": 10 } },
                { "type": "any", "of": [
                    { "type": "previous_class", "id": "missing" },
                    { "type": "always" }
                ]}
            ]
        }"#;
        let predicate: Predicate = serde_json::from_str(json).unwrap();
        assert!(predicate.evaluate(&ctx));
        assert_eq!(predicate.referenced_classes(), vec!["missing"]);
        assert!(predicate.check_syntax().is_ok());
    }

    #[test]
    fn malformed_custom_condition_fails_closed() {
        let ctx = fixture();
        let broken = Predicate::Custom { condition: "fire >= (".into() };
        assert!(!broken.evaluate(&ctx));
        assert!(broken.check_syntax().is_err());
        let unknown = Predicate::Custom { condition: "mystery > 0".into() };
        assert!(!unknown.evaluate(&ctx));
    }
}
