use spellbinder_game::{
    ActivityData, ActivityKind, ActivityReward, Definitions, GameEngine, GameState, LoadError,
    MemoryStorage, ResourceId, SaveData, StaticLoader, TalentPreset,
};

fn defs() -> Definitions {
    Definitions::load_from_static().unwrap()
}

fn busy_game(seed: u64) -> GameState {
    let mut game = GameState::with_seed(seed, "Rin", Some(TalentPreset::Water), defs());
    game.tick(0);
    assert!(game.start_basic_activity("meditate").is_some());
    assert!(game.start_basic_activity("study").is_some());
    assert!(game.start_basic_activity("odd_jobs").is_some());
    game
}

fn reload(save: &SaveData) -> Result<GameState, LoadError> {
    let json = save.to_json()?;
    GameState::from_save(SaveData::from_json(&json)?, defs())
}

#[test]
fn engine_persists_through_shared_memory_storage() {
    let storage = MemoryStorage::default();
    let engine = GameEngine::new(StaticLoader, storage.clone());
    let mut game = engine.new_game(99, "Rin", Some(TalentPreset::Water)).unwrap();
    game.tick(0);
    game.start_basic_activity("meditate");
    game.tick(4_000);

    assert!(engine.save("auto", &mut game, 1_234));
    let raw = storage.raw("auto").unwrap();
    assert!(raw.contains("\"version\":\"1.0.0\""));
    assert!(raw.contains("\"activityRunner\""));

    let loaded = engine.load("auto").unwrap().unwrap();
    assert_eq!(loaded.to_save(1_234), game.to_save(1_234));
    assert_eq!(loaded.seed(), 99);
}

#[test]
fn restored_game_runs_in_lockstep() {
    let mut original = busy_game(2024);
    let mut now = 0;
    while now < 10_000 {
        now += 500;
        original.tick(now);
    }
    let mut restored = reload(&original.to_save(now)).unwrap();

    while now < 90_000 {
        now += 500;
        let a = original.tick(now);
        let b = restored.tick(now);
        assert_eq!(a, b, "diverged at {now}");
        if now % 5_000 == 0 {
            assert_eq!(original.to_save(now), restored.to_save(now), "diverged at {now}");
        }
    }
    assert!(original.runner().is_idle());
    assert_eq!(original.to_save(now), restored.to_save(now));
}

#[test]
fn encounter_in_progress_survives_a_reload() {
    let mut game = GameState::with_seed(5, "Rin", Some(TalentPreset::Fire), defs());
    game.player_mut().grant_spell("spark");
    game.player_mut().resources_mut().add(ResourceId::ManaFire, 100.0);
    game.tick(0);
    assert!(game.start_combat(&["wolf"]));
    game.tick(500);
    game.tick(1_000);

    let save = game.to_save(1_000);
    assert!(save.combat.is_some());
    assert_eq!(save.monsters.len(), 1);
    let restored = reload(&save).unwrap();
    let combat = restored.combat().unwrap();
    assert_eq!(
        combat.monsters()[0].current_health(),
        game.combat().unwrap().monsters()[0].current_health()
    );
    assert_eq!(restored.to_save(1_000), save);
}

#[test]
fn queued_learning_of_an_unknown_spell_rejects_the_save() {
    let mut game = busy_game(1);
    let bogus = ActivityData {
        id: "learn_ghost".to_string(),
        name: "Learn Ghost".to_string(),
        description: String::new(),
        duration: 10.0,
        rewards: vec![ActivityReward::fixed("experience", 5.0)],
        costs: Vec::new(),
        category: Some("learning".to_string()),
        kind: Some(ActivityKind::Learning {
            spell_id: "ghost_lance".to_string(),
        }),
    };
    assert!(game.start_activity(bogus).is_some());

    match reload(&game.to_save(0)) {
        Err(LoadError::UnknownId { kind, id }) => {
            assert_eq!(kind, "spell");
            assert_eq!(id, "ghost_lance");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn unknown_class_in_the_player_rejects_the_save() {
    let game = busy_game(1);
    let mut save = game.to_save(0);
    save.player
        .classes
        .unlocked_classes
        .push("lich_king".to_string());
    assert!(matches!(
        reload(&save),
        Err(LoadError::UnknownId { kind: "class", .. })
    ));
}

#[test]
fn missing_runner_section_is_named() {
    let game = busy_game(3);
    let mut value = serde_json::to_value(game.to_save(0)).unwrap();
    value.as_object_mut().unwrap().remove("activityRunner");
    match SaveData::from_json(&value.to_string()) {
        Err(LoadError::MissingSection(section)) => assert_eq!(section, "activityRunner"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn older_version_still_loads() {
    let game = busy_game(4);
    let mut save = game.to_save(0);
    save.version = "0.9.0".to_string();
    let parsed = SaveData::from_json(&save.to_json().unwrap()).unwrap();
    assert!(!parsed.is_current_version());
    let restored = GameState::from_save(parsed, defs()).unwrap();
    assert_eq!(restored.runner().queue().len(), 2);
    assert!(restored.runner().current().is_some());
}

#[test]
fn progression_and_cooldowns_survive_json() {
    let mut game = GameState::with_seed(77, "Rin", Some(TalentPreset::Fire), defs());
    game.tick(0);
    {
        let player = game.player_mut();
        player.resources_mut().add(ResourceId::Gold, 1_000.0);
        player.resources_mut().add(ResourceId::Research, 200.0);
        player.add_experience(500);
        assert!(player.unlock_skill("fire_affinity"));
        assert!(player.unlock_skill("wind_affinity"));
        player.add_skill_exp("fire_affinity", 120);
        assert!(player.grant_spell("arcane_bolt"));
        assert!(player.spells_mut().cast("arcane_bolt"));
        assert!(player.unlock_class("apprentice"));
        assert!(player.unlock_class("fire_acolyte"));
        assert!(player.unlock_class("wind_acolyte"));
    }
    let before = game.player();
    let cooldown = before.spells().get("arcane_bolt").unwrap().current_cooldown();
    assert!(cooldown > 0.0);
    assert_eq!(before.classes().unlocked_ids().len(), 3);

    let json = game.to_save(5_000).to_json().unwrap();
    let restored = GameState::from_save(SaveData::from_json(&json).unwrap(), defs()).unwrap();
    let after = restored.player();

    assert_eq!(after.name(), before.name());
    assert_eq!(after.level(), before.level());
    assert_eq!(after.experience(), before.experience());
    assert_eq!(after.lifetime_experience(), before.lifetime_experience());
    assert_eq!(after.talent(), before.talent());
    for id in ["fire_affinity", "wind_affinity"] {
        let (a, b) = (after.skills().get(id).unwrap(), before.skills().get(id).unwrap());
        assert_eq!(a.level(), b.level(), "{id} level");
        assert_eq!(a.exp(), b.exp(), "{id} exp");
    }
    assert_eq!(after.skills().acquired_count(), before.skills().acquired_count());
    let spell = after.spells().get("arcane_bolt").unwrap();
    assert!(spell.is_learned());
    assert!((spell.current_cooldown() - cooldown).abs() < 1e-9);
    assert_eq!(after.classes().unlocked_ids(), before.classes().unlocked_ids());
    for id in ResourceId::ALL {
        assert_eq!(after.resources().get(id), before.resources().get(id), "{id}");
    }
    assert_eq!(restored.to_save(5_000), game.to_save(5_000));
}
