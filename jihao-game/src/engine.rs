//! Turn engine: applies one choice to a run and derives the next state.
use serde::{Deserialize, Serialize};

use crate::balance::apply_balanced_effect;
use crate::constants::{
    BALANCED_MASTERY, CRITICAL_STAT, DANGER_STAT, MINIGAME_COMPLETE_CHOICE_ID,
    MINIGAME_LOSS_TEXT, MINIGAME_WIN_TEXT, NEGATIVE_FLAGS, NEGATIVE_FLAG_PENALTY, POSITIVE_FLAGS,
    POSITIVE_FLAG_BONUS, SCORE_MAX, SCORE_MIN, VICTORY_SCORE, WEIGHT_ACADEMIC_STANDING,
    WEIGHT_BILLIARDS_SKILL, WEIGHT_DIGITAL_SAFETY, WEIGHT_SANITY, WEIGHT_WEALTH,
};
use crate::data::{Choice, Effect, FlagOp, Scene};
use crate::state::{GameState, HistoryEntry, MinigameOutcome};
use crate::stats::{Flags, StatKey, Stats};

/// Weighted summary of all five stats plus flag bonuses, clamped to `0..=100`.
#[must_use]
pub fn composite_score(stats: &Stats, flags: &Flags) -> f64 {
    let base = f64::from(stats.academic_standing) * WEIGHT_ACADEMIC_STANDING
        + f64::from(stats.sanity) * WEIGHT_SANITY
        + f64::from(stats.wealth) * WEIGHT_WEALTH
        + f64::from(stats.digital_safety) * WEIGHT_DIGITAL_SAFETY
        + f64::from(stats.billiards_skill) * WEIGHT_BILLIARDS_SKILL;

    let adjustment: f64 = flags
        .iter()
        .map(|flag| {
            let mut delta = 0.0;
            if POSITIVE_FLAGS.contains(&flag.as_str()) {
                delta += POSITIVE_FLAG_BONUS;
            }
            if NEGATIVE_FLAGS.contains(&flag.as_str()) {
                delta -= NEGATIVE_FLAG_PENALTY;
            }
            delta
        })
        .sum();

    (base + adjustment).clamp(SCORE_MIN, SCORE_MAX)
}

/// First stat at or below the critical line.
#[must_use]
pub fn critical_stat(stats: &Stats) -> Option<StatKey> {
    stats
        .iter()
        .find(|(_, value)| *value <= CRITICAL_STAT)
        .map(|(key, _)| key)
}

/// First non-skill stat at or below the danger line.
#[must_use]
pub fn danger_stat(stats: &Stats) -> Option<StatKey> {
    stats
        .iter()
        .find(|(key, value)| !key.is_skill_only() && *value <= DANGER_STAT)
        .map(|(key, _)| key)
}

#[must_use]
pub fn has_balanced_mastery(stats: &Stats) -> bool {
    stats.iter().all(|(_, value)| value >= BALANCED_MASTERY)
}

fn apply_effects(stats: &mut Stats, flags: &mut Flags, effects: &[Effect]) {
    for effect in effects {
        match effect {
            Effect::Stat { stat, change } => {
                let Some(key) = stat.key() else {
                    log::debug!("ignoring effect on unknown stat {stat}");
                    continue;
                };
                let current = stats.get(key);
                let balanced = apply_balanced_effect(current, *change);
                stats.set(key, current.saturating_add(balanced));
            }
            Effect::Flag { op, flag } => match op {
                FlagOp::SetFlag => {
                    flags.insert(flag.clone());
                }
                FlagOp::ClearFlag => {
                    flags.remove(flag);
                }
            },
        }
    }
}

/// Apply `choice`, played on `scene`, to `state`.
///
/// Effects run in order through the balance modulator, each seeing the
/// previous effect's result. The returned state has its history, composite
/// score, victory streak, choice path and cursor advanced; it is never marked
/// game over here.
#[must_use]
pub fn apply_choice(state: &GameState, choice: &Choice, scene: &Scene) -> GameState {
    let mut stats = state.stats;
    let mut flags = state.flags.clone();
    apply_effects(&mut stats, &mut flags, &choice.effects);

    let entry = HistoryEntry {
        scene_id: scene.id.clone(),
        scene_text: scene.text.clone(),
        scene_category: scene.category,
        choice_id: choice.id.clone(),
        choice_text: choice.text.clone(),
        effects: choice.stat_effects().collect(),
        triggered_minigame: if choice.trigger_minigame {
            scene.minigame.map(|config| config.kind)
        } else {
            None
        },
        minigame_result: None,
    };

    let score = composite_score(&stats, &flags);
    let consecutive_high_score = if score >= VICTORY_SCORE {
        state.consecutive_high_score.saturating_add(1)
    } else {
        0
    };

    let mut scene_history = state.scene_history.clone();
    scene_history.push(entry);
    let mut choice_path = state.choice_path.clone();
    choice_path.push(choice.id.clone());

    GameState {
        stats,
        flags,
        current_scene: state.current_scene.saturating_add(1),
        scene_history,
        turn_count: state.turn_count.saturating_add(1),
        composite_score: score,
        choice_path,
        consecutive_high_score,
        ..state.clone()
    }
}

/// Ad-hoc stat mutation outside the choice pipeline: clamped, not balanced.
#[must_use]
pub fn apply_stat_change(state: &GameState, stat: StatKey, change: i32) -> GameState {
    let mut stats = state.stats;
    stats.set(stat, stats.get(stat).saturating_add(change));
    GameState {
        stats,
        composite_score: composite_score(&stats, &state.flags),
        ..state.clone()
    }
}

/// Sparse stat deltas reported by a mini-game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinigameReward {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_standing: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digital_safety: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wealth: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billiards_skill: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanity: Option<i32>,
}

impl MinigameReward {
    #[must_use]
    pub const fn get(&self, key: StatKey) -> Option<i32> {
        match key {
            StatKey::AcademicStanding => self.academic_standing,
            StatKey::DigitalSafety => self.digital_safety,
            StatKey::Wealth => self.wealth,
            StatKey::BilliardsSkill => self.billiards_skill,
            StatKey::Sanity => self.sanity,
        }
    }

    #[must_use]
    pub const fn with(mut self, key: StatKey, change: i32) -> Self {
        match key {
            StatKey::AcademicStanding => self.academic_standing = Some(change),
            StatKey::DigitalSafety => self.digital_safety = Some(change),
            StatKey::Wealth => self.wealth = Some(change),
            StatKey::BilliardsSkill => self.billiards_skill = Some(change),
            StatKey::Sanity => self.sanity = Some(change),
        }
        self
    }

    pub fn changes(&self) -> impl Iterator<Item = (StatKey, i32)> + '_ {
        StatKey::ALL
            .into_iter()
            .filter_map(|key| self.get(key).map(|change| (key, change)))
    }
}

/// Apply every field present in `reward` as a clamped stat change.
#[must_use]
pub fn apply_minigame_reward(state: &GameState, reward: &MinigameReward) -> GameState {
    reward
        .changes()
        .fold(state.clone(), |acc, (key, change)| {
            apply_stat_change(&acc, key, change)
        })
}

/// Synthetic choice that closes out a mini-game turn.
#[must_use]
pub fn minigame_completion_choice(outcome: MinigameOutcome) -> Choice {
    let text = match outcome {
        MinigameOutcome::Win => MINIGAME_WIN_TEXT,
        MinigameOutcome::Lose => MINIGAME_LOSS_TEXT,
    };
    Choice::new(MINIGAME_COMPLETE_CHOICE_ID, text, Vec::new())
}

/// Close out a mini-game: apply the reward, then advance the turn with the
/// synthetic completion choice and tag its history entry.
#[must_use]
pub fn complete_minigame(
    state: &GameState,
    scene: &Scene,
    outcome: MinigameOutcome,
    reward: &MinigameReward,
) -> GameState {
    let rewarded = apply_minigame_reward(state, reward);
    let choice = minigame_completion_choice(outcome);
    let mut next = apply_choice(&rewarded, &choice, scene);
    if let Some(entry) = next.scene_history.last_mut() {
        entry.triggered_minigame = scene.minigame.map(|config| config.kind);
        entry.minigame_result = Some(outcome);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FLOAT_EPSILON;
    use crate::data::{Animation, MinigameConfig, MinigameType, SceneCategory};
    use crate::state::init_game;
    use crate::stats::StatRef;

    fn scene_with(choices: Vec<Choice>) -> Scene {
        Scene {
            id: String::from("dorm-night"),
            category: SceneCategory::TianjinLife,
            text: String::from("Lights out."),
            animation: Animation::Talking,
            choices,
            minigame: Some(MinigameConfig {
                kind: MinigameType::Billiards,
                difficulty: 2,
            }),
        }
    }

    #[test]
    fn composite_score_matches_weights_and_flags() {
        let stats = Stats::INITIAL;
        assert!((composite_score(&stats, &Flags::new()) - 39.0).abs() < FLOAT_EPSILON);

        let flags: Flags = ["graduated", "criminal_record", "unrelated"]
            .into_iter()
            .map(String::from)
            .collect();
        assert!((composite_score(&stats, &flags) - 37.0).abs() < FLOAT_EPSILON);

        assert!((composite_score(&Stats::uniform(100), &Flags::new()) - 100.0).abs() < FLOAT_EPSILON);
        let bad: Flags = ["expelled", "debt_crisis"].into_iter().map(String::from).collect();
        assert!(composite_score(&Stats::uniform(0), &bad).abs() < FLOAT_EPSILON);
    }

    #[test]
    fn effects_apply_sequentially_through_balance() {
        let choice = Choice::new(
            "binge",
            "Binge",
            vec![
                Effect::stat(StatKey::Sanity, -30),
                Effect::stat(StatKey::Sanity, -30),
                Effect::stat(StatKey::Wealth, 15),
            ],
        );
        let scene = scene_with(vec![choice.clone()]);
        let state = init_game(vec![scene.clone()]);
        let next = apply_choice(&state, &choice, &scene);
        // 60 -30 -> 30, then 30 -30 is clipped to the floor.
        assert_eq!(next.stats.sanity, 5);
        assert_eq!(next.stats.wealth, 45);
        assert_eq!(state.stats, Stats::INITIAL);
    }

    #[test]
    fn apply_choice_advances_bookkeeping() {
        let choice = Choice {
            trigger_minigame: true,
            ..Choice::new(
                "rack-em",
                "Rack 'em",
                vec![
                    Effect::stat(StatKey::BilliardsSkill, 5),
                    Effect::set_flag("good_reputation"),
                ],
            )
        };
        let scene = scene_with(vec![choice.clone()]);
        let state = init_game(vec![scene.clone(), scene.clone()]);
        let next = apply_choice(&state, &choice, &scene);

        assert_eq!(next.turn_count, 1);
        assert_eq!(next.current_scene, 1);
        assert_eq!(next.choice_path, vec![String::from("rack-em")]);
        assert_eq!(next.scene_history.len(), 1);
        let entry = &next.scene_history[0];
        assert_eq!(entry.scene_id, "dorm-night");
        assert_eq!(entry.effects.len(), 1);
        assert_eq!(entry.triggered_minigame, Some(MinigameType::Billiards));
        assert!(next.flags.contains("good_reputation"));
        assert!(
            (next.composite_score - composite_score(&next.stats, &next.flags)).abs()
                < FLOAT_EPSILON
        );
        assert!(!next.is_game_over);
    }

    #[test]
    fn flags_are_idempotent() {
        let set = Choice::new("set", "set", vec![Effect::set_flag("healthy"), Effect::set_flag("healthy")]);
        let clear = Choice::new("clear", "clear", vec![Effect::clear_flag("healthy")]);
        let scene = scene_with(vec![set.clone(), clear.clone()]);
        let state = init_game(vec![scene.clone()]);
        let once = apply_choice(&state, &set, &scene);
        let twice = apply_choice(&once, &set, &scene);
        assert_eq!(twice.flags.len(), 1);
        let cleared = apply_choice(&twice, &clear, &scene);
        assert!(cleared.flags.is_empty());
        let cleared_again = apply_choice(&cleared, &clear, &scene);
        assert!(cleared_again.flags.is_empty());
    }

    #[test]
    fn unknown_stat_effects_are_ignored() {
        let choice = Choice::new(
            "flirt",
            "Flirt",
            vec![Effect::Stat {
                stat: StatRef::Unknown(String::from("charisma")),
                change: 50,
            }],
        );
        let scene = scene_with(vec![choice.clone()]);
        let state = init_game(vec![scene.clone()]);
        let next = apply_choice(&state, &choice, &scene);
        assert_eq!(next.stats, Stats::INITIAL);
        assert_eq!(next.turn_count, 1);
        assert_eq!(next.scene_history[0].effects.len(), 1);
    }

    #[test]
    fn victory_streak_counts_and_resets() {
        let boost = Choice::new(
            "boost",
            "boost",
            StatKey::ALL.into_iter().map(|key| Effect::stat(key, 100)).collect(),
        );
        let crash = Choice::new(
            "crash",
            "crash",
            vec![
                Effect::stat(StatKey::Sanity, -60),
                Effect::stat(StatKey::AcademicStanding, -60),
            ],
        );
        let scene = scene_with(vec![boost.clone(), crash.clone()]);
        let state = init_game(vec![scene.clone()]);
        let one = apply_choice(&state, &boost, &scene);
        let two = apply_choice(&one, &boost, &scene);
        assert_eq!(two.consecutive_high_score, 2);
        let reset = apply_choice(&two, &crash, &scene);
        assert_eq!(reset.consecutive_high_score, 0);
    }

    #[test]
    fn stat_helpers_detect_thresholds() {
        assert_eq!(critical_stat(&Stats::INITIAL), None);
        assert_eq!(
            critical_stat(&Stats::INITIAL.with(StatKey::Wealth, 0)),
            Some(StatKey::Wealth)
        );
        assert_eq!(danger_stat(&Stats::INITIAL.with(StatKey::BilliardsSkill, 3)), None);
        assert_eq!(
            danger_stat(&Stats::INITIAL.with(StatKey::Sanity, 10)),
            Some(StatKey::Sanity)
        );
        assert!(has_balanced_mastery(&Stats::uniform(70)));
        assert!(!has_balanced_mastery(&Stats::uniform(70).with(StatKey::Wealth, 69)));
    }

    #[test]
    fn stat_change_is_clamped_and_rescored() {
        let state = init_game(Vec::new());
        let next = apply_stat_change(&state, StatKey::Wealth, 500);
        assert_eq!(next.stats.wealth, 100);
        assert_eq!(next.turn_count, 0);
        assert!(
            (next.composite_score - composite_score(&next.stats, &next.flags)).abs()
                < FLOAT_EPSILON
        );
        let drained = apply_stat_change(&state, StatKey::Sanity, -500);
        assert_eq!(drained.stats.sanity, 0);
    }

    #[test]
    fn minigame_completion_applies_reward_and_tags_history() {
        let scene = scene_with(vec![Choice::new("play", "play", Vec::new())]);
        let state = init_game(vec![scene.clone()]);
        let reward = MinigameReward::default()
            .with(StatKey::BilliardsSkill, 8)
            .with(StatKey::Wealth, -40);
        let next = complete_minigame(&state, &scene, MinigameOutcome::Win, &reward);
        assert_eq!(next.stats.billiards_skill, 58);
        // Rewards skip the balance floor.
        assert_eq!(next.stats.wealth, 0);
        assert_eq!(next.turn_count, 1);
        let entry = &next.scene_history[0];
        assert_eq!(entry.choice_id, MINIGAME_COMPLETE_CHOICE_ID);
        assert_eq!(entry.choice_text, MINIGAME_WIN_TEXT);
        assert!(entry.effects.is_empty());
        assert_eq!(entry.minigame_result, Some(MinigameOutcome::Win));
        assert_eq!(entry.triggered_minigame, Some(MinigameType::Billiards));
    }

    #[test]
    fn reward_decodes_sparse_fields() {
        let reward: MinigameReward =
            serde_json::from_str(r#"{"billiardsSkill":5,"sanity":-2}"#).expect("deserialize");
        let changes: Vec<_> = reward.changes().collect();
        assert_eq!(
            changes,
            vec![(StatKey::BilliardsSkill, 5), (StatKey::Sanity, -2)]
        );
    }
}
