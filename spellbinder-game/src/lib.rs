//! Spellbinder Game Engine
//!
//! Platform-agnostic simulation core for the Spellbinder idle RPG: resources and
//! talent, skill/spell/class/achievement progression, turn-based combat, the
//! activity scheduler and the orchestrator that ties them together each tick.
//! This crate has no UI or platform-specific dependencies.

pub mod achievement;
pub mod activity;
pub mod class_tree;
pub mod combat;
pub mod constants;
pub mod definitions;
pub mod element;
pub mod events;
pub mod explore;
pub mod expr;
pub mod game;
pub mod item;
pub mod journal;
pub mod learning;
pub mod monster;
pub mod numbers;
pub mod player;
pub mod predicate;
pub mod resource;
pub mod save;
pub mod skill;
pub mod spell;
pub mod talent;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

// Re-export commonly used types
pub use achievement::{
    AchievementDef, AchievementKind, AchievementManager, AchievementProgress, AchievementReward,
    AchievementUnlocked,
};
pub use activity::{
    ActivityCost, ActivityData, ActivityInstance, ActivityKind, ActivityReward, ActivityRunner,
    ActivityRunnerSnapshot,
};
pub use class_tree::{
    ClassBudget, ClassCosts, ClassEffect, ClassEffectKind, ClassManager, ClassNode, ClassTree,
};
pub use combat::{
    AutoOutcome, CombatConfig, CombatLogEntry, CombatProgress, CombatResult, CombatSystem, Turn,
};
pub use definitions::{DefinitionError, DefinitionTables, Definitions};
pub use element::Element;
pub use events::{EventBus, SubscriptionId};
pub use explore::{ExploreBlocker, ExploreEvent, LocaleData, LocaleManager, LocaleState};
pub use expr::{Expr, ExprError};
pub use game::{GameState, SessionStats};
pub use item::{
    EquipmentSlot, Inventory, ItemBlocker, ItemDef, ItemEffect, ItemKind, ItemRarity,
};
pub use journal::{Journal, JournalEntry, JournalLevel};
pub use monster::{DropRange, DropTable, Loot, Modifier, Monster, MonsterDef};
pub use player::{Player, PlayerSnapshot, RequirementContext};
pub use predicate::{Predicate, PredicateContext};
pub use resource::{Resource, ResourceId, ResourceManager};
pub use save::{LoadError, SaveData};
pub use skill::{Skill, SkillDef, SkillManager};
pub use spell::{Spell, SpellDef, SpellEffectKind, SpellManager};
pub use talent::{Talent, TalentPreset};

/// Trait for abstracting where definition tables come from.
/// Platform-specific implementations should provide this
pub trait DataLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load and validate every definition table
    ///
    /// # Errors
    ///
    /// Returns an error if the tables cannot be read or fail validation.
    fn load_definitions(&self) -> Result<Definitions, Self::Error>;
}

/// Trait for abstracting save/load operations
/// Platform-specific implementations should provide this
pub trait GameStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save a snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    fn save_game(&self, save_name: &str, save: &SaveData) -> Result<(), Self::Error>;

    /// Load a snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the stored snapshot cannot be read or decoded.
    fn load_game(&self, save_name: &str) -> Result<Option<SaveData>, Self::Error>;

    /// Delete a saved game
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    fn delete_save(&self, save_name: &str) -> Result<(), Self::Error>;

    fn has_save(&self, save_name: &str) -> bool;
}

/// Loader for the tables embedded in this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticLoader;

impl DataLoader for StaticLoader {
    type Error = DefinitionError;

    fn load_definitions(&self) -> Result<Definitions, Self::Error> {
        Definitions::load_from_static()
    }
}

/// In-memory storage holding saves as JSON documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    saves: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Raw JSON of a save, if present.
    #[must_use]
    pub fn raw(&self, save_name: &str) -> Option<String> {
        self.saves.borrow().get(save_name).cloned()
    }

    /// Overwrite a save with arbitrary JSON.
    pub fn put_raw(&self, save_name: &str, json: impl Into<String>) {
        self.saves
            .borrow_mut()
            .insert(save_name.to_string(), json.into());
    }
}

impl GameStorage for MemoryStorage {
    type Error = LoadError;

    fn save_game(&self, save_name: &str, save: &SaveData) -> Result<(), Self::Error> {
        let json = save.to_json()?;
        self.saves.borrow_mut().insert(save_name.to_string(), json);
        Ok(())
    }

    fn load_game(&self, save_name: &str) -> Result<Option<SaveData>, Self::Error> {
        self.saves
            .borrow()
            .get(save_name)
            .map(|json| SaveData::from_json(json))
            .transpose()
    }

    fn delete_save(&self, save_name: &str) -> Result<(), Self::Error> {
        self.saves.borrow_mut().remove(save_name);
        Ok(())
    }

    fn has_save(&self, save_name: &str) -> bool {
        self.saves.borrow().contains_key(save_name)
    }
}

/// Main game engine for managing game instances
pub struct GameEngine<L, S>
where
    L: DataLoader,
    S: GameStorage,
{
    data_loader: L,
    storage: S,
    combat_config: CombatConfig,
}

impl<L, S> GameEngine<L, S>
where
    L: DataLoader,
    S: GameStorage,
{
    /// Create a new game engine with the provided data loader and storage
    pub fn new(data_loader: L, storage: S) -> Self {
        Self {
            data_loader,
            storage,
            combat_config: CombatConfig::default(),
        }
    }

    /// Combat tuning applied to every game this engine creates or loads.
    #[must_use]
    pub fn with_combat_config(mut self, config: CombatConfig) -> Self {
        self.combat_config = config;
        self
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Create a new game with the given seed, player name and talent preset
    ///
    /// # Errors
    ///
    /// Returns an error if the definition tables cannot be loaded.
    pub fn new_game(
        &self,
        seed: u64,
        name: &str,
        preset: Option<TalentPreset>,
    ) -> Result<GameState, L::Error> {
        let defs = self.data_loader.load_definitions()?;
        Ok(GameState::with_seed(seed, name, preset, defs)
            .with_combat_config(self.combat_config.clone()))
    }

    /// Save a game. Failures are journaled and reported as `false`.
    pub fn save(&self, save_name: &str, game: &mut GameState, now_ms: u64) -> bool {
        let snapshot = game.to_save(now_ms);
        match self.storage.save_game(save_name, &snapshot) {
            Ok(()) => {
                log::debug!("saved `{save_name}`");
                true
            }
            Err(err) => {
                game.player_mut()
                    .journal_mut()
                    .error(format!("failed to save `{save_name}`: {err}"));
                false
            }
        }
    }

    /// Load a game and re-bind it to freshly loaded definitions
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be read, decoded or re-bound.
    pub fn load(&self, save_name: &str) -> Result<Option<GameState>, anyhow::Error> {
        let Some(save) = self.storage.load_game(save_name)? else {
            return Ok(None);
        };
        let defs = self.data_loader.load_definitions()?;
        Ok(Some(GameState::from_save_with_config(
            save,
            defs,
            self.combat_config.clone(),
        )?))
    }

    /// Delete a saved game
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    pub fn delete(&self, save_name: &str) -> Result<(), S::Error> {
        self.storage.delete_save(save_name)
    }

    #[must_use]
    pub fn has_save(&self, save_name: &str) -> bool {
        self.storage.has_save(save_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[derive(Clone, Copy, Default)]
    struct FailingStorage;

    #[derive(Debug, thiserror::Error)]
    #[error("disk full")]
    struct DiskFull;

    impl GameStorage for FailingStorage {
        type Error = DiskFull;

        fn save_game(&self, _save_name: &str, _save: &SaveData) -> Result<(), Self::Error> {
            Err(DiskFull)
        }

        fn load_game(&self, _save_name: &str) -> Result<Option<SaveData>, Self::Error> {
            Ok(None)
        }

        fn delete_save(&self, _save_name: &str) -> Result<(), Self::Error> {
            Ok(())
        }

        fn has_save(&self, _save_name: &str) -> bool {
            false
        }
    }

    #[derive(Clone, Copy, Default)]
    struct FixtureLoader;

    impl DataLoader for FixtureLoader {
        type Error = Infallible;

        fn load_definitions(&self) -> Result<Definitions, Self::Error> {
            Ok(Definitions::load_from_static().unwrap())
        }
    }

    #[test]
    fn engine_creates_and_roundtrips_state() {
        let engine = GameEngine::new(FixtureLoader, MemoryStorage::default());
        let mut game = engine
            .new_game(0xABCD, "Mira", Some(TalentPreset::Earth))
            .unwrap();
        game.tick(0);
        game.player_mut().resources_mut().add(ResourceId::Gold, 150.0);
        game.tick(2_000);
        assert!(engine.save("slot-one", &mut game, 1_700_000_000_000));
        assert!(engine.has_save("slot-one"));

        let loaded = engine.load("slot-one").unwrap().expect("save exists");
        assert_eq!(loaded.player().name(), "Mira");
        assert_eq!(loaded.preset(), Some(TalentPreset::Earth));
        assert_eq!(loaded.to_save(1_700_000_000_000), game.to_save(1_700_000_000_000));
        assert!(engine.load("missing-slot").unwrap().is_none());

        engine.delete("slot-one").unwrap();
        assert!(!engine.has_save("slot-one"));
    }

    #[test]
    fn failed_save_is_journaled() {
        let engine = GameEngine::new(StaticLoader, FailingStorage);
        let mut game = engine.new_game(1, "Mira", None).unwrap();
        assert!(!engine.save("slot", &mut game, 0));
        assert_eq!(game.player().journal().count_level(JournalLevel::Error), 1);
    }

    #[test]
    fn loaded_games_keep_the_engine_combat_tuning() {
        let config = CombatConfig {
            round_seconds: 2.5,
            max_rounds: 12,
            ..CombatConfig::default()
        };
        let engine = GameEngine::new(StaticLoader, MemoryStorage::default())
            .with_combat_config(config.clone());
        let mut game = engine.new_game(3, "Mira", None).unwrap();
        assert_eq!(game.combat_config(), &config);
        assert!(engine.save("tuned", &mut game, 0));
        let loaded = engine.load("tuned").unwrap().unwrap();
        assert_eq!(loaded.combat_config(), &config);
    }

    #[test]
    fn corrupt_save_fails_to_load() {
        let storage = MemoryStorage::default();
        storage.put_raw("broken", r#"{ "version": "1.0.0" }"#);
        let engine = GameEngine::new(StaticLoader, storage);
        assert!(engine.load("broken").is_err());
    }
}
