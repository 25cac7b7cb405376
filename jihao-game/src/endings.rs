//! Termination waterfall and ending resolution.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;

use crate::conditions::check_all_conditions;
use crate::constants::{
    CONSECUTIVE_VICTORY, GENERIC_POSITIVE_AVERAGE, MIN_TURNS_FOR_DANGER_CHECK, NEGATIVE_SCORE,
    SURVIVAL_MIN_SCORE, SURVIVAL_TURNS,
};
use crate::data::{Ending, EndingType, Rarity};
use crate::engine::{critical_stat, danger_stat, has_balanced_mastery};
use crate::numbers::{round_f64_to_i32, usize_to_f64};
use crate::state::GameState;
use crate::stats::{Flags, StatKey, Stats};

/// Which termination rule ended a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    SecretPath,
    CriticalStat,
    LowScore,
    DangerZone,
    Victory,
    BalancedMastery,
    Survival,
}

impl TerminationReason {
    pub const ALL: [Self; 7] = [
        Self::SecretPath,
        Self::CriticalStat,
        Self::LowScore,
        Self::DangerZone,
        Self::Victory,
        Self::BalancedMastery,
        Self::Survival,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SecretPath => "secret_path",
            Self::CriticalStat => "critical_stat",
            Self::LowScore => "low_score",
            Self::DangerZone => "danger_zone",
            Self::Victory => "victory",
            Self::BalancedMastery => "balanced_mastery",
            Self::Survival => "survival",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision to end a run.
///
/// `ending` is `None` only when the catalog holds no endings at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
    pub reason: TerminationReason,
    pub ending: Option<Ending>,
}

fn by_priority<'a>(endings: impl Iterator<Item = &'a Ending>) -> Vec<&'a Ending> {
    let mut sorted: Vec<&Ending> = endings.collect();
    sorted.sort_by_key(|ending| Reverse(ending.priority));
    sorted
}

fn first_matching<'a>(
    endings: impl Iterator<Item = &'a Ending>,
    stats: &Stats,
    flags: &Flags,
) -> Option<&'a Ending> {
    by_priority(endings)
        .into_iter()
        .find(|ending| check_all_conditions(stats, &ending.conditions, flags))
}

fn matching_of_type<'a>(
    endings: &'a [Ending],
    kind: EndingType,
    stats: &Stats,
    flags: &Flags,
) -> Option<&'a Ending> {
    first_matching(
        endings.iter().filter(|ending| ending.kind == kind),
        stats,
        flags,
    )
}

fn path_matches(choice_path: &[String], sequence: &[String]) -> bool {
    !sequence.is_empty() && choice_path.ends_with(sequence)
}

fn pick_uniform<'a, R: Rng + ?Sized>(pool: &[&'a Ending], rng: &mut R) -> Option<&'a Ending> {
    if pool.is_empty() {
        return None;
    }
    pool.get(rng.gen_range(0..pool.len())).copied()
}

/// Random ending used when no ending's conditions match.
///
/// With a preferred type, endings of that type in the lowest rarity tier
/// present win over rarer ones; a type with no endings at all falls back to
/// the whole catalog. Without a
/// preference the stat average picks the type.
pub fn generic_ending<'a, R: Rng + ?Sized>(
    stats: &Stats,
    endings: &'a [Ending],
    prefer: Option<EndingType>,
    rng: &mut R,
) -> Option<&'a Ending> {
    let of_type = |kind: EndingType| -> Vec<&'a Ending> {
        endings
            .iter()
            .filter(|ending| ending.kind == kind)
            .collect()
    };

    if let Some(kind) = prefer {
        let typed = of_type(kind);
        if let Some(lowest) = typed.iter().map(|ending| ending.rarity).min() {
            let tier: Vec<&Ending> = typed
                .iter()
                .copied()
                .filter(|ending| ending.rarity == lowest)
                .collect();
            if let Some(ending) = pick_uniform(&tier, rng) {
                return Some(ending);
            }
        }
        log::warn!("no {kind} endings in catalog; falling back to any ending");
        let all: Vec<&Ending> = endings.iter().collect();
        return pick_uniform(&all, rng);
    }

    let average = f64::from(stats.total()) / usize_to_f64(StatKey::ALL.len());
    let positive = of_type(EndingType::Positive);
    if average >= GENERIC_POSITIVE_AVERAGE
        && let Some(ending) = pick_uniform(&positive, rng)
    {
        return Some(ending);
    }
    let negative = of_type(EndingType::Negative);
    pick_uniform(&negative, rng).or_else(|| endings.first())
}

/// Best ending for a set of final stats, ignoring termination rules.
pub fn calculate_ending<'a, R: Rng + ?Sized>(
    stats: &Stats,
    endings: &'a [Ending],
    flags: &Flags,
    rng: &mut R,
) -> Option<&'a Ending> {
    first_matching(endings.iter(), stats, flags)
        .or_else(|| generic_ending(stats, endings, None, rng))
}

/// Rounded average of the five stats.
#[must_use]
pub fn ending_score(stats: &Stats) -> i32 {
    round_f64_to_i32(f64::from(stats.total()) / usize_to_f64(StatKey::ALL.len()))
}

fn terminate(reason: TerminationReason, ending: Option<&Ending>) -> Option<Termination> {
    log::debug!(
        "run terminated: {reason} -> {}",
        ending.map_or("<none>", |ending| ending.id.as_str())
    );
    Some(Termination {
        reason,
        ending: ending.cloned(),
    })
}

/// Decide whether the post-turn `state` ends the run.
///
/// Rules run in a fixed order and the first that fires wins. Only the ending
/// category implied by the firing rule is searched.
pub fn check_termination<R: Rng + ?Sized>(
    state: &GameState,
    endings: &[Ending],
    rng: &mut R,
) -> Option<Termination> {
    let stats = &state.stats;
    let flags = &state.flags;

    let secrets = by_priority(endings.iter().filter(|ending| {
        ending.rarity == Rarity::Secret && !ending.path_sequence.is_empty()
    }));
    if let Some(secret) = secrets.into_iter().find(|ending| {
        path_matches(&state.choice_path, &ending.path_sequence)
            && check_all_conditions(stats, &ending.conditions, flags)
    }) {
        return terminate(TerminationReason::SecretPath, Some(secret));
    }

    let negative_or_generic = |rng: &mut R| {
        matching_of_type(endings, EndingType::Negative, stats, flags)
            .or_else(|| generic_ending(stats, endings, Some(EndingType::Negative), rng))
    };

    if critical_stat(stats).is_some() {
        return terminate(TerminationReason::CriticalStat, negative_or_generic(rng));
    }

    if state.composite_score < NEGATIVE_SCORE {
        return terminate(TerminationReason::LowScore, negative_or_generic(rng));
    }

    if state.turn_count >= MIN_TURNS_FOR_DANGER_CHECK
        && danger_stat(stats).is_some()
        && let Some(ending) = matching_of_type(endings, EndingType::Negative, stats, flags)
    {
        return terminate(TerminationReason::DangerZone, Some(ending));
    }

    let positive_or_generic = |rng: &mut R| {
        matching_of_type(endings, EndingType::Positive, stats, flags)
            .or_else(|| generic_ending(stats, endings, Some(EndingType::Positive), rng))
    };

    if state.consecutive_high_score >= CONSECUTIVE_VICTORY {
        return terminate(TerminationReason::Victory, positive_or_generic(rng));
    }

    if has_balanced_mastery(stats)
        && let Some(ending) = first_matching(
            endings.iter().filter(|ending| {
                ending.rarity == Rarity::Legendary && ending.kind == EndingType::Positive
            }),
            stats,
            flags,
        )
    {
        return terminate(TerminationReason::BalancedMastery, Some(ending));
    }

    if state.turn_count >= SURVIVAL_TURNS && state.composite_score >= SURVIVAL_MIN_SCORE {
        return terminate(TerminationReason::Survival, positive_or_generic(rng));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CompareOp, Condition};
    use crate::engine::composite_score;
    use crate::state::init_game;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn ending(id: &str, kind: EndingType, rarity: Rarity, priority: i32) -> Ending {
        Ending {
            id: id.to_string(),
            kind,
            rarity,
            title: id.to_uppercase(),
            description: String::new(),
            conditions: Vec::new(),
            priority,
            path_sequence: Vec::new(),
        }
    }

    fn with_conditions(mut ending: Ending, conditions: Vec<Condition>) -> Ending {
        ending.conditions = conditions;
        ending
    }

    fn state_with(stats: Stats) -> GameState {
        let mut state = init_game(Vec::new());
        state.stats = stats;
        state.composite_score = composite_score(&stats, &state.flags);
        state
    }

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(7)
    }

    fn catalog() -> Vec<Ending> {
        vec![
            ending("plain-win", EndingType::Positive, Rarity::Common, 1),
            ending("plain-loss", EndingType::Negative, Rarity::Common, 1),
            with_conditions(
                ending("breakdown", EndingType::Negative, Rarity::Uncommon, 40),
                vec![Condition::stat(StatKey::Sanity, CompareOp::Lt, 20)],
            ),
            with_conditions(
                ending("pool-shark", EndingType::Positive, Rarity::Rare, 100),
                vec![
                    Condition::stat(StatKey::BilliardsSkill, CompareOp::Gte, 90),
                    Condition::stat(StatKey::Wealth, CompareOp::Gte, 80),
                ],
            ),
            with_conditions(
                ending("zen", EndingType::Positive, Rarity::Uncommon, 10),
                vec![Condition::stat(StatKey::Sanity, CompareOp::Gte, 60)],
            ),
        ]
    }

    #[test]
    fn healthy_start_does_not_terminate() {
        let state = init_game(Vec::new());
        assert_eq!(check_termination(&state, &catalog(), &mut rng()), None);
    }

    #[test]
    fn calculate_ending_prefers_higher_priority() {
        let stats = Stats {
            academic_standing: 50,
            digital_safety: 50,
            wealth: 85,
            billiards_skill: 95,
            sanity: 70,
        };
        let endings = catalog();
        let chosen = calculate_ending(&stats, &endings, &Flags::new(), &mut rng());
        assert_eq!(chosen.map(|e| e.id.as_str()), Some("pool-shark"));
    }

    #[test]
    fn calculate_ending_resolves_low_sanity() {
        let stats = Stats::uniform(30).with(StatKey::Sanity, 15);
        let endings = catalog();
        let chosen = calculate_ending(&stats, &endings, &Flags::new(), &mut rng());
        assert_eq!(chosen.map(|e| e.id.as_str()), Some("breakdown"));
    }

    #[test]
    fn critical_stat_picks_matching_negative() {
        let state = state_with(Stats::uniform(50).with(StatKey::Sanity, 0));
        let termination = check_termination(&state, &catalog(), &mut rng()).unwrap();
        assert_eq!(termination.reason, TerminationReason::CriticalStat);
        assert_eq!(termination.ending.unwrap().id, "breakdown");
    }

    #[test]
    fn critical_stat_falls_back_to_common_negative() {
        let state = state_with(Stats::uniform(50).with(StatKey::Wealth, 0));
        let termination = check_termination(&state, &catalog(), &mut rng()).unwrap();
        assert_eq!(termination.reason, TerminationReason::CriticalStat);
        assert_eq!(termination.ending.unwrap().id, "plain-loss");
    }

    #[test]
    fn low_score_terminates_negative() {
        let state = state_with(Stats::uniform(20));
        assert!(state.composite_score < NEGATIVE_SCORE);
        let termination = check_termination(&state, &catalog(), &mut rng()).unwrap();
        assert_eq!(termination.reason, TerminationReason::LowScore);
        assert_eq!(termination.ending.unwrap().kind, EndingType::Negative);
    }

    #[test]
    fn danger_zone_waits_for_minimum_turns() {
        let mut state = state_with(
            Stats::uniform(60)
                .with(StatKey::Sanity, 8)
                .with(StatKey::Wealth, 60),
        );
        state.turn_count = MIN_TURNS_FOR_DANGER_CHECK - 1;
        assert_eq!(check_termination(&state, &catalog(), &mut rng()), None);

        state.turn_count = MIN_TURNS_FOR_DANGER_CHECK;
        let termination = check_termination(&state, &catalog(), &mut rng()).unwrap();
        assert_eq!(termination.reason, TerminationReason::DangerZone);
        assert_eq!(termination.ending.unwrap().id, "breakdown");
    }

    #[test]
    fn danger_zone_without_match_continues() {
        let mut state = state_with(Stats::uniform(60).with(StatKey::Wealth, 8));
        state.turn_count = 12;
        let endings: Vec<Ending> = catalog()
            .into_iter()
            .filter(|ending| !ending.conditions.is_empty())
            .collect();
        assert_eq!(check_termination(&state, &endings, &mut rng()), None);
    }

    #[test]
    fn billiards_skill_is_not_a_danger_stat() {
        let mut state = state_with(Stats::uniform(60).with(StatKey::BilliardsSkill, 3));
        state.turn_count = 12;
        let endings = vec![
            ending("plain-win", EndingType::Positive, Rarity::Common, 1),
            ending("plain-loss", EndingType::Negative, Rarity::Common, 1),
        ];
        assert_eq!(check_termination(&state, &endings, &mut rng()), None);
    }

    #[test]
    fn victory_streak_picks_positive() {
        let mut state = state_with(Stats::uniform(85));
        state.consecutive_high_score = CONSECUTIVE_VICTORY;
        let termination = check_termination(&state, &catalog(), &mut rng()).unwrap();
        assert_eq!(termination.reason, TerminationReason::Victory);
        assert_eq!(termination.ending.unwrap().id, "zen");
    }

    #[test]
    fn mastery_requires_a_legendary_ending() {
        let state = state_with(Stats::uniform(75));
        assert_eq!(check_termination(&state, &catalog(), &mut rng()), None);

        let mut endings = catalog();
        endings.push(ending("renaissance", EndingType::Positive, Rarity::Legendary, 5));
        let termination = check_termination(&state, &endings, &mut rng()).unwrap();
        assert_eq!(termination.reason, TerminationReason::BalancedMastery);
        assert_eq!(termination.ending.unwrap().id, "renaissance");
    }

    #[test]
    fn survival_needs_turns_and_score() {
        let mut state = state_with(Stats::uniform(65).with(StatKey::Sanity, 50));
        state.turn_count = SURVIVAL_TURNS - 1;
        assert_eq!(check_termination(&state, &catalog(), &mut rng()), None);
        state.turn_count = SURVIVAL_TURNS;
        let termination = check_termination(&state, &catalog(), &mut rng()).unwrap();
        assert_eq!(termination.reason, TerminationReason::Survival);
        assert_eq!(termination.ending.unwrap().kind, EndingType::Positive);
    }

    #[test]
    fn secret_path_beats_critical_stat() {
        let mut secret = ending("night-owl", EndingType::Negative, Rarity::Secret, 999);
        secret.path_sequence = vec![String::from("stay-up"), String::from("stay-up")];
        let mut endings = catalog();
        endings.push(secret);

        let mut state = state_with(Stats::uniform(50).with(StatKey::Sanity, 0));
        state.choice_path = vec![
            String::from("study"),
            String::from("stay-up"),
            String::from("stay-up"),
        ];
        let termination = check_termination(&state, &endings, &mut rng()).unwrap();
        assert_eq!(termination.reason, TerminationReason::SecretPath);
        assert_eq!(termination.ending.unwrap().id, "night-owl");

        state.choice_path.push(String::from("study"));
        let termination = check_termination(&state, &endings, &mut rng()).unwrap();
        assert_eq!(termination.reason, TerminationReason::CriticalStat);
    }

    #[test]
    fn path_endings_stay_in_condition_scans() {
        let mut secret = ending("night-owl", EndingType::Positive, Rarity::Secret, 999);
        secret.path_sequence = vec![String::from("stay-up")];
        let mut endings = catalog();
        endings.push(secret);

        let stats = Stats::uniform(60);
        let chosen = calculate_ending(&stats, &endings, &Flags::new(), &mut rng()).unwrap();
        assert_eq!(chosen.id, "night-owl");

        let mut state = state_with(stats);
        state.consecutive_high_score = CONSECUTIVE_VICTORY;
        let termination = check_termination(&state, &endings, &mut rng()).unwrap();
        assert_eq!(termination.reason, TerminationReason::Victory);
        assert_eq!(termination.ending.unwrap().id, "night-owl");
    }

    #[test]
    fn generic_fallback_prefers_the_lowest_rarity_present() {
        let endings = vec![
            ending("legend", EndingType::Positive, Rarity::Legendary, 1),
            ending("rare-a", EndingType::Positive, Rarity::Rare, 1),
            ending("rare-b", EndingType::Positive, Rarity::Rare, 1),
            ending("loss", EndingType::Negative, Rarity::Common, 1),
        ];
        let mut rng = rng();
        for _ in 0..50 {
            let picked =
                generic_ending(&Stats::INITIAL, &endings, Some(EndingType::Positive), &mut rng)
                    .unwrap();
            assert!(picked.id.starts_with("rare-"), "{}", picked.id);
        }
    }

    #[test]
    fn secret_path_also_checks_conditions() {
        let mut secret = with_conditions(
            ending("hustler", EndingType::Positive, Rarity::Secret, 50),
            vec![Condition::has_flag("pool_hustler")],
        );
        secret.path_sequence = vec![String::from("bet-big")];
        let endings = vec![secret];
        let mut state = init_game(Vec::new());
        state.choice_path = vec![String::from("bet-big")];
        assert_eq!(check_termination(&state, &endings, &mut rng()), None);

        state.flags.insert(String::from("pool_hustler"));
        let termination = check_termination(&state, &endings, &mut rng()).unwrap();
        assert_eq!(termination.reason, TerminationReason::SecretPath);
    }

    #[test]
    fn flag_gated_ending_needs_its_flag() {
        let gated = with_conditions(
            ending("jailed", EndingType::Negative, Rarity::Rare, 80),
            vec![Condition::has_flag("criminal_record")],
        );
        let mut endings = catalog();
        endings.push(gated);
        let state = state_with(Stats::uniform(50).with(StatKey::DigitalSafety, 0));
        let termination = check_termination(&state, &endings, &mut rng()).unwrap();
        assert_ne!(termination.ending.unwrap().id, "jailed");

        let mut flagged = state.clone();
        flagged.flags.insert(String::from("criminal_record"));
        let termination = check_termination(&flagged, &endings, &mut rng()).unwrap();
        assert_eq!(termination.ending.unwrap().id, "jailed");
    }

    #[test]
    fn generic_fallback_uses_whole_catalog_when_type_missing() {
        let endings = vec![ending("only-win", EndingType::Positive, Rarity::Rare, 1)];
        let chosen = generic_ending(
            &Stats::INITIAL,
            &endings,
            Some(EndingType::Negative),
            &mut rng(),
        );
        assert_eq!(chosen.map(|e| e.id.as_str()), Some("only-win"));

        let state = state_with(Stats::uniform(50).with(StatKey::Wealth, 0));
        let termination = check_termination(&state, &[], &mut rng()).unwrap();
        assert_eq!(termination.reason, TerminationReason::CriticalStat);
        assert!(termination.ending.is_none());
    }

    #[test]
    fn generic_fallback_prefers_common_rarity() {
        let endings = vec![
            ending("rare-loss", EndingType::Negative, Rarity::Rare, 1),
            ending("common-loss", EndingType::Negative, Rarity::Common, 1),
        ];
        let mut rng = rng();
        for _ in 0..50 {
            let chosen =
                generic_ending(&Stats::INITIAL, &endings, Some(EndingType::Negative), &mut rng);
            assert_eq!(chosen.map(|e| e.id.as_str()), Some("common-loss"));
        }
    }

    #[test]
    fn generic_fallback_without_preference_uses_average() {
        let endings = vec![
            ending("loss", EndingType::Negative, Rarity::Common, 1),
            ending("win", EndingType::Positive, Rarity::Common, 1),
        ];
        let high = generic_ending(&Stats::uniform(50), &endings, None, &mut rng());
        assert_eq!(high.map(|e| e.id.as_str()), Some("win"));
        let low = generic_ending(&Stats::uniform(49), &endings, None, &mut rng());
        assert_eq!(low.map(|e| e.id.as_str()), Some("loss"));

        let only_win = vec![ending("win", EndingType::Positive, Rarity::Common, 1)];
        let first = generic_ending(&Stats::uniform(10), &only_win, None, &mut rng());
        assert_eq!(first.map(|e| e.id.as_str()), Some("win"));
    }

    #[test]
    fn ending_score_is_rounded_average() {
        assert_eq!(ending_score(&Stats::INITIAL), 40);
        assert_eq!(ending_score(&Stats::uniform(0).with(StatKey::Wealth, 3)), 1);
    }
}
