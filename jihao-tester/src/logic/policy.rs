use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use jihao_game::{Choice, Effect, GameState, Scene, StatKey};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;

/// Decision returned by a [`PlayerPolicy`]
#[derive(Debug, Clone)]
pub struct PolicyDecision {
    pub choice_index: usize,
    pub rationale: Option<String>,
}

impl PolicyDecision {
    #[must_use]
    pub const fn new(choice_index: usize, rationale: Option<String>) -> Self {
        Self {
            choice_index,
            rationale,
        }
    }
}

/// Policy interface for automated play strategies.
pub trait PlayerPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Select a choice on the current scene.
    fn pick_choice(&mut self, state: &GameState, scene: &Scene) -> PolicyDecision;
}

/// Built-in gameplay strategies for automated runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum GameplayStrategy {
    Cautious,
    Greedy,
    Balanced,
    Random,
}

impl GameplayStrategy {
    pub const ALL: [Self; 4] = [Self::Cautious, Self::Greedy, Self::Balanced, Self::Random];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cautious => "Cautious",
            Self::Greedy => "Greedy",
            Self::Balanced => "Balanced",
            Self::Random => "Random",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn PlayerPolicy> {
        match self {
            Self::Cautious => Box::new(CautiousPolicy),
            Self::Greedy => Box::new(GreedyPolicy),
            Self::Balanced => Box::new(BalancedPolicy),
            Self::Random => Box::new(RandomPolicy::new(seed)),
        }
    }
}

impl fmt::Display for GameplayStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GameplayStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cautious" => Ok(Self::Cautious),
            "greedy" => Ok(Self::Greedy),
            "balanced" => Ok(Self::Balanced),
            "random" => Ok(Self::Random),
            other => bail!("Unknown strategy: {other}"),
        }
    }
}

struct CautiousPolicy;
struct GreedyPolicy;
struct BalancedPolicy;

struct RandomPolicy {
    rng: ChaCha20Rng,
}

impl RandomPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

fn stat_changes(choice: &Choice) -> impl Iterator<Item = (StatKey, i32)> + '_ {
    choice.effects.iter().filter_map(|effect| match effect {
        Effect::Stat { stat, change } => stat.key().map(|key| (key, *change)),
        Effect::Flag { .. } => None,
    })
}

/// Magnitude of the single worst loss a choice can inflict.
fn worst_loss(choice: &Choice) -> i32 {
    stat_changes(choice)
        .map(|(_, change)| (-change).max(0))
        .max()
        .unwrap_or(0)
}

fn total_delta(choice: &Choice) -> i32 {
    stat_changes(choice).map(|(_, change)| change).sum()
}

/// Net change to `stat` caused by `choice`.
fn delta_for(choice: &Choice, stat: StatKey) -> i32 {
    stat_changes(choice)
        .filter(|(key, _)| *key == stat)
        .map(|(_, change)| change)
        .sum()
}

fn weakest_stat(state: &GameState) -> StatKey {
    state
        .stats
        .iter()
        .filter(|(key, _)| !key.is_skill_only())
        .min_by_key(|(_, value)| *value)
        .map_or(StatKey::Sanity, |(key, _)| key)
}

impl PlayerPolicy for CautiousPolicy {
    fn name(&self) -> &'static str {
        "Cautious"
    }

    fn pick_choice(&mut self, _state: &GameState, scene: &Scene) -> PolicyDecision {
        let (idx, risk) = scene
            .choices
            .iter()
            .enumerate()
            .map(|(idx, choice)| (idx, worst_loss(choice)))
            .min_by_key(|(_, risk)| *risk)
            .unwrap_or((0, 0));

        PolicyDecision::new(idx, Some(format!("worst loss {risk}")))
    }
}

impl PlayerPolicy for GreedyPolicy {
    fn name(&self) -> &'static str {
        "Greedy"
    }

    fn pick_choice(&mut self, _state: &GameState, scene: &Scene) -> PolicyDecision {
        let (idx, reward) = scene
            .choices
            .iter()
            .enumerate()
            .map(|(idx, choice)| (idx, total_delta(choice)))
            .max_by_key(|(_, reward)| *reward)
            .unwrap_or((0, 0));

        PolicyDecision::new(idx, Some(format!("total delta {reward}")))
    }
}

impl PlayerPolicy for BalancedPolicy {
    fn name(&self) -> &'static str {
        "Balanced"
    }

    fn pick_choice(&mut self, state: &GameState, scene: &Scene) -> PolicyDecision {
        let target = weakest_stat(state);
        let (idx, score) = scene
            .choices
            .iter()
            .enumerate()
            .map(|(idx, choice)| (idx, delta_for(choice, target) * 3 + total_delta(choice)))
            .max_by_key(|(_, score)| *score)
            .unwrap_or((0, 0));

        PolicyDecision::new(idx, Some(format!("helps {target} score {score}")))
    }
}

impl PlayerPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "Random"
    }

    fn pick_choice(&mut self, _state: &GameState, scene: &Scene) -> PolicyDecision {
        if scene.choices.is_empty() {
            return PolicyDecision::new(0, Some("no choices".to_string()));
        }
        let idx = self.rng.gen_range(0..scene.choices.len());
        PolicyDecision::new(idx, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jihao_game::{Animation, SceneCategory, init_game};

    fn scene() -> Scene {
        Scene {
            id: "crossroads".to_string(),
            category: SceneCategory::FinancialTemptations,
            text: "Pick one.".to_string(),
            animation: Animation::Talking,
            choices: vec![
                Choice::new(
                    "gamble",
                    "Gamble",
                    vec![
                        Effect::stat(StatKey::Wealth, 30),
                        Effect::stat(StatKey::Sanity, -20),
                    ],
                ),
                Choice::new("rest", "Rest", vec![Effect::stat(StatKey::Sanity, 3)]),
                Choice::new(
                    "study",
                    "Study",
                    vec![
                        Effect::stat(StatKey::AcademicStanding, 8),
                        Effect::stat(StatKey::Sanity, -2),
                    ],
                ),
            ],
            minigame: None,
        }
    }

    #[test]
    fn cautious_avoids_big_losses() {
        let decision = CautiousPolicy.pick_choice(&init_game(Vec::new()), &scene());
        assert_eq!(decision.choice_index, 1);
    }

    #[test]
    fn greedy_maximizes_total_delta() {
        let decision = GreedyPolicy.pick_choice(&init_game(Vec::new()), &scene());
        assert_eq!(decision.choice_index, 0);
    }

    #[test]
    fn balanced_feeds_the_weakest_stat() {
        // Academic standing starts lowest at 20.
        let decision = BalancedPolicy.pick_choice(&init_game(Vec::new()), &scene());
        assert_eq!(decision.choice_index, 2);
    }

    #[test]
    fn random_policy_is_seeded() {
        let picks = |seed| {
            let mut policy = RandomPolicy::new(seed);
            (0..16)
                .map(|_| policy.pick_choice(&init_game(Vec::new()), &scene()).choice_index)
                .collect::<Vec<_>>()
        };
        assert_eq!(picks(3), picks(3));
        assert!(picks(3).iter().all(|idx| *idx < 3));
    }

    #[test]
    fn strategies_parse_case_insensitively() {
        assert_eq!(
            "GREEDY".parse::<GameplayStrategy>().unwrap(),
            GameplayStrategy::Greedy
        );
        assert!("reckless".parse::<GameplayStrategy>().is_err());
    }
}
