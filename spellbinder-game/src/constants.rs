//! Centralized balance and tuning constants for the Spellbinder simulation.
//!
//! These values define the deterministic math for the core simulation.
//! Static content (skills, spells, monsters, classes) lives in the JSON
//! assets; the numbers below only shape how that content is processed.

// Persistence --------------------------------------------------------------
pub const SAVE_VERSION: &str = "1.0.0";

// Journal ------------------------------------------------------------------
pub const JOURNAL_CAPACITY: usize = 200;

// Resource ledger defaults -------------------------------------------------
pub(crate) const START_GOLD: f64 = 100.0;
pub(crate) const START_HEALTH: f64 = 100.0;
pub(crate) const HEALTH_REGEN_PER_SECOND: f64 = 1.0;
pub(crate) const START_STAMINA: f64 = 100.0;
pub(crate) const STAMINA_REGEN_PER_SECOND: f64 = 0.5;
pub(crate) const BASE_MANA_CAPACITY: f64 = 100.0;
pub(crate) const BASE_MANA_REGEN_PER_SECOND: f64 = 0.1;

// Talent -------------------------------------------------------------------
pub const TALENT_MIN: f64 = 0.0;
pub const TALENT_MAX: f64 = 100.0;
pub(crate) const TALENT_CAPACITY_DIVISOR: f64 = 200.0;
pub(crate) const TALENT_LEARNING_DIVISOR: f64 = 100.0;
pub(crate) const TALENT_DURATION_DIVISOR: f64 = 200.0;

// Experience curves --------------------------------------------------------
pub(crate) const SKILL_EXP_BASE: f64 = 100.0;
pub(crate) const SKILL_EXP_GROWTH: f64 = 1.3;
pub(crate) const PLAYER_EXP_BASE: f64 = 100.0;
pub(crate) const PLAYER_EXP_GROWTH: f64 = 1.5;

// Class manager ------------------------------------------------------------
pub const CLASS_CACHE_WINDOW_MS: u64 = 500;

// Combat -------------------------------------------------------------------
pub(crate) const ELEMENT_ADVANTAGE: f64 = 1.5;
pub(crate) const ELEMENT_DISADVANTAGE: f64 = 0.75;
pub(crate) const DEFAULT_MODIFIER_DURATION: u32 = 3;
pub const COMBAT_TURN_DELAY_MS: u64 = 500;
pub(crate) const AUTO_COMBAT_MAX_ROUNDS: u32 = 100;
pub(crate) const AUTO_COMBAT_ROUND_SECONDS: f64 = 1.0;
pub(crate) const WEALTHY_GOLD_THRESHOLD: u64 = 100;

// Learning activities ------------------------------------------------------
pub(crate) const SPELL_LEARN_BASE_SECONDS: f64 = 30.0;
pub(crate) const SPELL_LEARN_FLOOR_SECONDS: f64 = 5.0;
pub(crate) const SPELL_LEARN_RESEARCH_PER_LEVEL: f64 = 10.0;
pub(crate) const SPELL_LEARN_GOLD_PER_LEVEL: f64 = 5.0;
pub(crate) const SPELL_LEARN_EXP_PER_LEVEL: f64 = 5.0;
pub(crate) const PRACTICE_BASE_SECONDS: f64 = 20.0;
pub(crate) const PRACTICE_FLOOR_SECONDS: f64 = 3.0;
pub(crate) const PRACTICE_MANA_COST: f64 = 10.0;
pub(crate) const PRACTICE_SKILL_EXP: u64 = 50;
pub(crate) const PRACTICE_SKILL_EXP_PER_LEVEL: u64 = 2;
pub(crate) const PRACTICE_PLAYER_EXP: f64 = 5.0;
pub(crate) const TRAINING_BASE_SECONDS: f64 = 25.0;
pub(crate) const TRAINING_FLOOR_SECONDS: f64 = 5.0;
pub(crate) const TRAINING_MANA_COST: f64 = 15.0;
pub(crate) const TRAINING_RESEARCH_COST: f64 = 20.0;
pub(crate) const TRAINING_GOLD_COST: f64 = 10.0;
pub(crate) const TRAINING_SKILL_EXP: u64 = 100;
pub(crate) const TRAINING_PLAYER_EXP: f64 = 10.0;

// Exploration --------------------------------------------------------------
pub(crate) const EXPLORE_MIN_EVENTS: usize = 3;
pub(crate) const EXPLORE_MAX_EVENTS: usize = 5;
pub(crate) const EXPLORE_COMBAT_ODDS: f64 = 0.4;
pub(crate) const EXPLORE_TREASURE_ODDS: f64 = 0.7;
pub(crate) const EXPLORE_RESOURCE_ODDS: f64 = 0.9;
pub(crate) const EXPLORE_COMBAT_MAX_ROUNDS: u32 = 50;

// Reward pseudo-resources --------------------------------------------------
pub const REWARD_EXPERIENCE: &str = "experience";
pub const REWARD_SKILL_EXP: &str = "skill_exp";

// Achievement hooks --------------------------------------------------------
pub mod achievement_ids {
    pub const FIRST_SKILL: &str = "first_skill";
    pub const SKILL_MASTER: &str = "skill_master";
    pub const FIRST_SPELL: &str = "first_spell";
    pub const SPELL_COLLECTOR: &str = "spell_collector";
    pub const FIRST_ACTIVITY: &str = "first_activity";
    pub const ACTIVITY_MASTER: &str = "activity_master";
    pub const MONSTER_SLAYER: &str = "monster_slayer";
    pub const WEALTHY_ADVENTURER: &str = "wealthy_adventurer";
    pub const FIRST_CLASS: &str = "first_class";
    pub const EXPLORER: &str = "explorer";
}
