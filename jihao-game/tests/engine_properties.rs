use std::collections::HashSet;

use chrono::{TimeDelta, Utc};
use jihao_game::{
    Choice, CompareOp, Condition, ContentCatalog, Effect, Ending, EndingCollection, EndingType,
    GameState, MemoryStore, Rarity, SaveManager, StatKey, Stats, TerminationReason,
    apply_balanced_effect, apply_choice, calculate_ending, check_condition, check_termination,
    composite_score, init_game, select_scenes_for_game,
};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const CATALOG_JSON: &str = include_str!("../../assets/data/catalog.json");

fn catalog() -> ContentCatalog {
    ContentCatalog::from_json(CATALOG_JSON)
        .expect("fixture parses")
        .validated()
        .expect("fixture validates")
}

fn ending(id: &str, kind: EndingType, priority: i32, conditions: Vec<Condition>) -> Ending {
    Ending {
        id: id.to_string(),
        kind,
        rarity: Rarity::Uncommon,
        title: id.to_string(),
        description: String::new(),
        conditions,
        priority,
        path_sequence: Vec::new(),
    }
}

fn state_with(stats: Stats, turn_count: u32) -> GameState {
    let mut state = init_game(Vec::new());
    state.stats = stats;
    state.turn_count = turn_count;
    state.composite_score = composite_score(&state.stats, &state.flags);
    state
}

#[test]
fn stats_stay_in_bounds_for_random_choice_sequences() {
    let catalog = catalog();
    let extreme = Choice::new(
        "extreme",
        "Everything at once",
        StatKey::ALL
            .into_iter()
            .flat_map(|key| [Effect::stat(key, -100), Effect::stat(key, 100)])
            .collect(),
    );
    let mut rng = SmallRng::seed_from_u64(0x5EED);

    for _ in 0..200 {
        let mut state = init_game(Vec::new());
        for _ in 0..60 {
            let scene = catalog.scenes.choose(&mut rng).expect("scenes");
            let choice = if rng.gen_bool(0.1) {
                &extreme
            } else {
                scene.choices.choose(&mut rng).expect("choices")
            };
            state = apply_choice(&state, choice, scene);
            assert!(state.stats.in_bounds(), "out of bounds: {:?}", state.stats);
            assert!((0.0..=100.0).contains(&state.composite_score));
        }
    }
}

#[test]
fn balance_floor_holds_for_every_healthy_stat() {
    for current in 6..=100 {
        for raw in -100..0 {
            let delta = apply_balanced_effect(current, raw);
            assert!(
                current + delta >= 5,
                "floor broken at current={current} raw={raw} delta={delta}"
            );
            assert!(delta <= 0, "negative delta turned positive at {current}/{raw}");
        }
    }
}

#[test]
fn balance_escape_reaches_zero_from_the_floor() {
    for raw in -100..=-2 {
        let mut value = 5;
        let mut steps = 0;
        while value > 0 {
            value = (value + apply_balanced_effect(value, raw)).clamp(0, 100);
            steps += 1;
            assert!(steps <= 20, "stuck at {value} with raw delta {raw}");
        }
    }
}

#[test]
fn positive_deltas_pass_through() {
    for current in 0..=100 {
        for raw in 0..=100 {
            assert_eq!(apply_balanced_effect(current, raw), raw);
        }
    }
}

#[test]
fn condition_evaluation_has_no_hidden_state() {
    let stats = Stats::INITIAL;
    let flags = ["vpn_user".to_string()].into_iter().collect();
    let conditions = [
        Condition::stat(StatKey::Sanity, CompareOp::Gte, 60),
        Condition::stat(StatKey::Wealth, CompareOp::Lt, 30),
        Condition::has_flag("vpn_user"),
        Condition::not_flag("vpn_user"),
    ];
    for condition in &conditions {
        let first = check_condition(&stats, condition, &flags);
        for _ in 0..10 {
            assert_eq!(check_condition(&stats, condition, &flags), first);
        }
    }
}

#[test]
fn higher_priority_match_wins() {
    let endings = vec![
        ending(
            "sane",
            EndingType::Positive,
            20,
            vec![Condition::stat(StatKey::Sanity, CompareOp::Gte, 60)],
        ),
        ending(
            "hustler",
            EndingType::Positive,
            100,
            vec![
                Condition::stat(StatKey::BilliardsSkill, CompareOp::Gte, 90),
                Condition::stat(StatKey::Wealth, CompareOp::Gte, 80),
            ],
        ),
    ];
    let stats = Stats {
        academic_standing: 50,
        digital_safety: 50,
        wealth: 85,
        billiards_skill: 95,
        sanity: 70,
    };
    let mut rng = SmallRng::seed_from_u64(1);
    let chosen = calculate_ending(&stats, &endings, &Default::default(), &mut rng);
    assert_eq!(chosen.map(|e| e.id.as_str()), Some("hustler"));
}

#[test]
fn low_sanity_selects_matching_negative_ending() {
    let endings = vec![
        ending(
            "anxious",
            EndingType::Negative,
            40,
            vec![Condition::stat(StatKey::Sanity, CompareOp::Lt, 20)],
        ),
        ending("fine", EndingType::Positive, 1, Vec::new()),
    ];
    let stats = Stats::uniform(30).with(StatKey::Sanity, 15);
    let mut rng = SmallRng::seed_from_u64(2);
    let chosen = calculate_ending(&stats, &endings, &Default::default(), &mut rng);
    assert_eq!(chosen.map(|e| e.id.as_str()), Some("anxious"));
}

#[test]
fn flag_gated_ending_needs_its_flag() {
    let catalog = catalog();
    let stats = Stats::uniform(40).with(StatKey::Sanity, 80);
    let mut flags = Default::default();
    let mut rng = SmallRng::seed_from_u64(3);

    let without = calculate_ending(&stats, &catalog.endings, &flags, &mut rng);
    assert_eq!(without.map(|e| e.id.as_str()), Some("steady-graduate"));

    flags = ["good_reputation".to_string()].into_iter().collect();
    let with = calculate_ending(&stats, &catalog.endings, &flags, &mut rng);
    assert_eq!(with.map(|e| e.id.as_str()), Some("tianjin-local"));
}

#[test]
fn danger_zone_waits_for_five_turns() {
    let catalog = catalog();
    let stats = Stats::INITIAL.with(StatKey::DigitalSafety, 8);
    let mut rng = SmallRng::seed_from_u64(4);

    for turn in 0..5 {
        let state = state_with(stats, turn);
        assert!(state.composite_score >= 25.0);
        assert_eq!(check_termination(&state, &catalog.endings, &mut rng), None);
    }

    let termination = check_termination(&state_with(stats, 5), &catalog.endings, &mut rng)
        .expect("danger zone fires at turn five");
    assert_eq!(termination.reason, TerminationReason::DangerZone);
    assert_eq!(
        termination.ending.map(|e| e.id),
        Some(String::from("firewall-casualty"))
    );
}

#[test]
fn initial_batch_guarantees_two_minigames() {
    let catalog = catalog();
    let available = catalog
        .scenes
        .iter()
        .filter(|scene| scene.minigame.is_some())
        .count();
    assert!(available >= 2);

    for seed in 0..200 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let batch = select_scenes_for_game(&catalog.scenes, 10, 2, &mut rng);
        assert_eq!(batch.len(), 10);
        let minigames = batch.iter().filter(|scene| scene.minigame.is_some()).count();
        assert!(minigames >= 2, "seed {seed} dealt {minigames} mini-games");
        let ids: HashSet<&str> = batch.iter().map(|scene| scene.id.as_str()).collect();
        assert_eq!(ids.len(), batch.len());
    }
}

#[test]
fn damped_delta_sits_between_full_and_zero() {
    let delta = apply_balanced_effect(15, -10);
    assert!(-10 < delta && delta < 0, "got {delta}");
}

#[test]
fn large_hit_is_clipped_to_the_floor() {
    assert_eq!(10 + apply_balanced_effect(10, -20), 5);
}

#[test]
fn day_old_save_is_discarded_and_removed() {
    let store = MemoryStore::new();
    let saves = SaveManager::new(store.clone());
    let now = Utc::now();
    saves.save_game_at(&init_game(Vec::new()), now - TimeDelta::hours(25));
    assert_eq!(store.len(), 1);

    assert!(saves.load_game_at(now).is_none());
    assert!(store.is_empty());
}

#[test]
fn unlocking_an_ending_twice_is_idempotent() {
    let catalog = catalog();
    let collection = EndingCollection::new(MemoryStore::new());
    let ending = catalog.ending("burnout").expect("fixture ending");
    collection.save_unlocked(ending);
    collection.save_unlocked(ending);
    assert_eq!(collection.unlocked().len(), 1);
    assert_eq!(collection.stats().negative, 1);
}
