use spellbinder_game::{
    AutoOutcome, CombatConfig, CombatResult, CombatSystem, Definitions, GameState, Player,
    ResourceId, TalentPreset,
    constants::{COMBAT_TURN_DELAY_MS, achievement_ids},
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn defs() -> Definitions {
    Definitions::load_from_static().unwrap()
}

fn fire_game(seed: u64) -> GameState {
    GameState::with_seed(seed, "Ash", Some(TalentPreset::Fire), defs())
}

fn arm(game: &mut GameState) {
    let player = game.player_mut();
    assert!(player.grant_spell("spark"));
    player.resources_mut().add(ResourceId::ManaFire, 200.0);
}

/// Tick in half-turn steps until the encounter ends.
fn fight_out(game: &mut GameState, mut now: u64) -> u64 {
    while game.combat().is_some() {
        now += COMBAT_TURN_DELAY_MS;
        game.tick(now);
        assert!(now < 300_000, "combat never finished");
    }
    now
}

#[test]
fn slime_encounter_pays_out_its_drop_table() {
    let mut game = fire_game(11);
    arm(&mut game);
    game.tick(0);
    let gold = game.player().resources().value(ResourceId::Gold);

    assert!(game.start_combat(&["slime"]));
    fight_out(&mut game, 0);

    assert_eq!(game.stats().combats_won, 1);
    let earned = game.player().resources().value(ResourceId::Gold) - gold;
    assert!((2.0..=6.0).contains(&earned), "earned {earned}");
    assert_eq!(game.player().items().get("slime_gel"), Some(&1));
    let slayer = game
        .player()
        .achievements()
        .get(achievement_ids::MONSTER_SLAYER)
        .unwrap();
    assert!((slayer.current - 1.0).abs() < f64::EPSILON);
}

#[test]
fn unknown_monster_never_starts_an_encounter() {
    let mut game = fire_game(3);
    game.tick(0);
    assert!(!game.start_combat(&["slime", "basilisk"]));
    assert!(!game.start_combat(&[]));
    assert!(game.combat().is_none());
}

#[test]
fn a_player_without_spells_only_trades_blows() {
    let defs = defs();
    let mut player = Player::new("Pacifist", Some(TalentPreset::Earth), &defs);
    let mut rng = ChaCha20Rng::seed_from_u64(8);
    let dummy = defs.monster("training_dummy").unwrap();
    let mut combat = CombatSystem::from_defs([dummy], CombatConfig::default());

    let outcome = combat.auto_execute(&mut player, &mut rng, 10);

    assert_eq!(outcome, AutoOutcome::Draw);
    assert!(combat.is_active());
    assert_eq!(combat.monsters()[0].current_health(), 30);
    assert!((player.resources().value(ResourceId::Health) - 90.0).abs() < 1e-9);
}

#[test]
fn spark_wins_against_advantaged_and_resisting_targets() {
    let defs = defs();
    for id in ["wolf", "slime"] {
        let def = defs.monster(id).unwrap();
        let mut player = Player::new("Ash", Some(TalentPreset::Fire), &defs);
        assert!(player.grant_spell("spark"));
        player.resources_mut().add(ResourceId::ManaFire, 200.0);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let mut combat = CombatSystem::from_defs([def], CombatConfig::default());
        assert_eq!(
            combat.auto_execute(&mut player, &mut rng, 50),
            AutoOutcome::PlayerWon,
            "lost to {id}"
        );
        assert!(combat.log().iter().any(|entry| entry.message.contains("Spark")));
    }
}

#[test]
fn defeat_ends_the_expedition_without_the_final_reward() {
    let mut game = fire_game(21);
    game.tick(0);
    assert!(game.start_exploration("training_grounds").is_some());
    game.tick(19_000);
    assert!(game.runner().current().is_some());

    game.player_mut()
        .resources_mut()
        .drain(ResourceId::Health, 1_000.0);
    let finished = game.tick(20_000);

    assert!(finished.is_some());
    let stats = game.stats();
    assert_eq!(stats.combats_lost, 1);
    assert_eq!(stats.expeditions_failed, 1);
    assert_eq!(stats.explorations, 0);
    assert_eq!(
        game.locales().state("training_grounds").unwrap().explored_count,
        0
    );
}

#[test]
fn armed_expedition_completes_and_counts() {
    let mut game = fire_game(5);
    arm(&mut game);
    game.tick(0);
    let stamina = game.player().resources().value(ResourceId::Stamina);
    assert!(game.start_exploration("training_grounds").is_some());
    assert!(
        (stamina - game.player().resources().value(ResourceId::Stamina) - 10.0).abs() < 1e-9
    );

    let mut now = 0;
    while !game.runner().is_idle() {
        now += 1_000;
        game.tick(now);
        assert!(now < 60_000, "expedition never finished");
    }

    let stats = game.stats();
    assert_eq!(stats.explorations, 1);
    assert!(stats.combats_won >= 1);
    assert_eq!(stats.combats_lost, 0);
    let state = game.locales().state("training_grounds").unwrap();
    assert_eq!(state.explored_count, 1);
    assert_eq!(state.last_explored_ms, Some(20_000));
}

#[test]
fn locked_locales_refuse_expeditions() {
    let mut game = fire_game(2);
    game.tick(0);
    assert!(game.start_exploration("dragon_roost").is_none());
    assert!(game.start_exploration("atlantis").is_none());
    game.player_mut()
        .resources_mut()
        .drain(ResourceId::Stamina, 1_000.0);
    assert!(game.start_exploration("training_grounds").is_none());
    assert!(game.runner().is_idle());
}

#[test]
fn finished_encounter_rejects_further_input() {
    let defs = defs();
    let mut player = Player::new("Ash", Some(TalentPreset::Fire), &defs);
    assert!(player.grant_spell("spark"));
    player.resources_mut().add(ResourceId::ManaFire, 200.0);
    let mut rng = ChaCha20Rng::seed_from_u64(13);
    let dummy = defs.monster("training_dummy").unwrap();
    let mut combat = CombatSystem::from_defs([dummy], CombatConfig::default());
    combat.auto_execute(&mut player, &mut rng, 50);
    assert_eq!(combat.result(), CombatResult::Victory);

    let turns = combat.turn_count();
    assert_eq!(combat.step(&mut player, &mut rng), CombatResult::Victory);
    assert_eq!(combat.turn_count(), turns);
    assert!(!combat.flee());
}
