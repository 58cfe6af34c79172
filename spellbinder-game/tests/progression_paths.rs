use spellbinder_game::{
    ClassNode, Definitions, Element, GameState, Player, ResourceId, TalentPreset,
    constants::achievement_ids,
};

fn defs() -> Definitions {
    Definitions::load_from_static().unwrap()
}

fn fire_game() -> GameState {
    GameState::with_seed(7, "Ash", Some(TalentPreset::Fire), defs())
}

fn tick_until(game: &mut GameState, mut now: u64, done: impl Fn(&GameState) -> bool) -> u64 {
    while !done(game) {
        now += 1_000;
        game.tick(now);
        assert!(now < 600_000, "condition never reached");
    }
    now
}

#[test]
fn fireball_waits_for_fire_affinity_two() {
    let mut game = fire_game();
    game.player_mut().resources_mut().add(ResourceId::Research, 50.0);
    game.tick(0);
    assert!(game.start_spell_learning("fireball").is_none());

    assert!(game.player_mut().grant_skill("fire_affinity"));
    assert_eq!(game.player_mut().add_skill_exp("fire_affinity", 230), Some(2));
    assert_eq!(game.player().skills().level("fire_affinity"), Some(2));

    let research = game.player().resources().value(ResourceId::Research);
    assert!(game.start_spell_learning("fireball").is_some());
    assert!(
        (research - game.player().resources().value(ResourceId::Research) - 20.0).abs() < 1e-9
    );
    assert!(game.start_spell_learning("nova").is_none());

    tick_until(&mut game, 0, |g| g.player().spells().is_learned("fireball"));
    assert!(game.runner().is_idle());
    assert!(game.player().achievements().is_unlocked(achievement_ids::FIRST_SPELL));
    assert!(game.start_spell_learning("fireball").is_none());
}

#[test]
fn class_path_climbs_from_the_root() {
    let defs = defs();
    let ids: Vec<&str> = defs
        .classes
        .path_to("fire_mage")
        .into_iter()
        .map(|node: &ClassNode| node.id.as_str())
        .collect();
    assert_eq!(ids, ["apprentice", "fire_acolyte", "fire_mage"]);
    assert!(defs.classes.path_to("nonexistent").is_empty());

    let tiers = defs.classes.tree_structure();
    assert_eq!(tiers.get(&0).map(Vec::len), Some(1));
    assert!(tiers.get(&1).is_some_and(|tier| tier.len() >= 4));
}

#[test]
fn acolyte_unlock_pays_gold_and_grants_its_affinity() {
    let mut game = fire_game();
    game.tick(0);
    assert!(!game.unlock_class("fire_acolyte"));
    assert!(game.unlock_class("apprentice"));

    // lifetime experience is a threshold, not a price
    assert!(!game.unlock_class("fire_acolyte"));
    game.player_mut().add_experience(50);
    let lifetime = game.player().lifetime_experience();
    assert!(game.available_classes().iter().any(|c| c.id == "fire_acolyte"));
    assert!(game.unlock_class("fire_acolyte"));

    let player = game.player();
    assert_eq!(player.lifetime_experience(), lifetime);
    assert!(player.resources().value(ResourceId::Gold).abs() < 1e-9);
    assert!((player.talent().get(Element::Fire) - 75.0).abs() < 1e-9);
    assert!(player.skills().is_acquired("fire_affinity"));
    let capacity = player
        .resources()
        .get(ResourceId::ManaFire)
        .and_then(|r| r.max())
        .unwrap();
    assert!(capacity >= 157.5, "capacity {capacity}");
    assert!(player.achievements().is_unlocked(achievement_ids::FIRST_CLASS));

    // a repeat unlock is a no-op and pays nothing twice
    assert!(game.unlock_class("fire_acolyte"));
    assert!((game.player().talent().get(Element::Fire) - 75.0).abs() < 1e-9);
}

#[test]
fn custom_condition_reads_talent_sum_and_level() {
    let defs = defs();
    let mut player = Player::new("Sage", Some(TalentPreset::Fire), &defs);
    assert!(!player.unlock_skill("elemental_harmony"));

    assert_eq!(player.add_experience(1_000), 4);
    assert_eq!(player.level(), 5);
    assert!(!player.unlock_skill("elemental_harmony"));

    player.talent_mut().set(Element::Water, 55.0);
    assert!(player.unlock_skill("elemental_harmony"));
    assert!(player.skills().is_acquired("elemental_harmony"));
}

#[test]
fn five_skills_earn_the_spell_power_bonus() {
    let defs = defs();
    let mut player = Player::new("Polymath", Some(TalentPreset::Wind), &defs);
    for id in [
        "fire_affinity",
        "water_affinity",
        "earth_affinity",
        "wind_affinity",
    ] {
        assert!(player.grant_skill(id));
    }
    assert!(player.bonus("spell_power").abs() < f64::EPSILON);
    assert!(player.grant_skill("fortitude"));
    player.settle_achievement_rewards();

    assert!((player.bonus("spell_power") - 2.0).abs() < f64::EPSILON);
    assert!((player.resources().value(ResourceId::Research) - 10.0).abs() < 1e-9);
    assert!(player.achievements().is_unlocked(achievement_ids::SKILL_MASTER));

    // rewards are paid once
    player.settle_achievement_rewards();
    assert!((player.bonus("spell_power") - 2.0).abs() < f64::EPSILON);
}

#[test]
fn learning_an_attack_spell_reveals_the_woods() {
    let mut game = fire_game();
    game.tick(0);
    let discovered = |g: &GameState| {
        g.locales()
            .state("whispering_woods")
            .is_some_and(|s| s.discovered)
    };
    assert!(!discovered(&game));
    assert!(game.locales().state("training_grounds").unwrap().discovered);

    assert!(game.player_mut().grant_spell("spark"));
    game.tick(500);
    assert!(discovered(&game));
    assert!(!game.locales().state("goblin_caves").unwrap().discovered);
}

#[test]
fn skill_training_acquires_then_practice_levels() {
    let mut game = fire_game();
    let player = game.player_mut();
    player.resources_mut().add(ResourceId::Research, 100.0);
    player.resources_mut().add(ResourceId::ManaFire, 100.0);
    game.tick(0);

    assert!(game.start_skill_practice("fire_affinity").is_none());
    assert!(game.start_skill_training("fire_affinity").is_some());
    let now = tick_until(&mut game, 0, |g| g.player().skills().is_acquired("fire_affinity"));
    assert_eq!(game.player().skills().level("fire_affinity"), Some(1));

    assert!(game.start_skill_practice("fire_affinity").is_some());
    tick_until(&mut game, now, |g| g.runner().is_idle());
    let skill = game.player().skills().get("fire_affinity").unwrap();
    assert_eq!(skill.level(), 1);
    assert_eq!(skill.exp(), 52);
}
