use std::collections::{BTreeMap, BTreeSet, HashSet};

use jihao_game::{
    ContentCatalog, EndingType, GameSession, MemoryStore, MinigameReward, MinigameType, Rarity,
    SelectionTrace, StatKey, Stats, TerminationReason, TurnOutcome,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;

use crate::logic::policy::GameplayStrategy;

const NON_REPEAT_WINDOW: usize = 5;
const MINIGAME_SEED_SALT: u64 = 0x6D69_6E69_6761_6D65;

/// Configuration for a simulated run.
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub seed: u64,
    pub strategy: GameplayStrategy,
    pub max_turns: u32,
}

impl SimulationConfig {
    #[must_use]
    pub const fn new(strategy: GameplayStrategy, seed: u64) -> Self {
        Self {
            seed,
            strategy,
            max_turns: 100,
        }
    }

    #[must_use]
    pub const fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }
}

/// How a simulated run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// A termination rule fired.
    Ended,
    /// The engine refused to continue; always paired with a violation.
    Aborted,
    /// The turn cap was reached.
    TurnCap,
}

impl RunStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ended => "ended",
            Self::Aborted => "aborted",
            Self::TurnCap => "turn_cap",
        }
    }
}

/// Summary of one simulated run.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub strategy: GameplayStrategy,
    pub seed: u64,
    pub turns: u32,
    pub status: RunStatus,
    pub reason: Option<TerminationReason>,
    pub ending_id: Option<String>,
    pub ending_type: Option<EndingType>,
    pub ending_rarity: Option<Rarity>,
    pub final_stats: Stats,
    pub final_score: f64,
    pub minigames_played: u32,
    /// Weighted picks made to refill the scene pool.
    pub selection_picks: u32,
    /// Picks that fell back to a uniform draw.
    pub relaxed_picks: u32,
    /// Per category, the summed share of total candidate weight over all picks.
    pub category_weight_share: BTreeMap<String, f64>,
    pub violations: Vec<String>,
}

/// Add one pick's weight split per category to `shares`.
fn record_selection(
    catalog: &ContentCatalog,
    trace: &SelectionTrace,
    shares: &mut BTreeMap<String, f64>,
) {
    let total = trace.total_weight();
    if total <= 0.0 {
        return;
    }
    for candidate in &trace.candidates {
        let Some(scene) = catalog.scene(&candidate.id) else {
            continue;
        };
        *shares.entry(scene.category.as_str().to_string()).or_insert(0.0) +=
            candidate.final_weight / total;
    }
}

/// Reward reported by the coin-flip stand-in for a mini-game.
#[must_use]
pub fn minigame_reward(kind: MinigameType, difficulty: u32, won: bool) -> MinigameReward {
    let scale = i32::try_from(difficulty.clamp(1, 5)).unwrap_or(1);
    let base = MinigameReward::default();
    match (kind, won) {
        (MinigameType::Billiards, true) => base
            .with(StatKey::Wealth, 5 * scale)
            .with(StatKey::Sanity, 3 * scale)
            .with(StatKey::BilliardsSkill, 2 * scale),
        (MinigameType::Moneyrun, true) => base
            .with(StatKey::Wealth, 6 * scale)
            .with(StatKey::Sanity, 2 * scale),
        (MinigameType::Campnou, true) => base.with(StatKey::Sanity, 5 * scale),
        (MinigameType::Billiards, false) => base
            .with(StatKey::Wealth, -3 * scale)
            .with(StatKey::Sanity, -3 * scale),
        (MinigameType::Moneyrun, false) => base
            .with(StatKey::Wealth, -5 * scale)
            .with(StatKey::DigitalSafety, -5 * scale)
            .with(StatKey::Sanity, -4 * scale),
        (MinigameType::Campnou, false) => base.with(StatKey::Sanity, -3 * scale),
    }
}

/// Invariant violations visible in the session's current state.
fn check_invariants(session: &GameSession<MemoryStore>, pool_size: usize) -> Vec<String> {
    let state = session.state();
    let mut violations = Vec::new();

    if !state.stats.in_bounds() {
        violations.push(format!(
            "turn {}: stats out of bounds {:?}",
            state.turn_count, state.stats
        ));
    }
    if !(0.0..=100.0).contains(&state.composite_score) {
        violations.push(format!(
            "turn {}: composite score {}",
            state.turn_count, state.composite_score
        ));
    }
    let turns = usize::try_from(state.turn_count).unwrap_or(usize::MAX);
    if state.scene_history.len() != turns {
        violations.push(format!(
            "turn {}: history holds {} entries",
            state.turn_count,
            state.scene_history.len()
        ));
    }
    if pool_size >= NON_REPEAT_WINDOW {
        let recent: Vec<&str> = state.recent_scene_ids(NON_REPEAT_WINDOW).collect();
        let unique: HashSet<&str> = recent.iter().copied().collect();
        if unique.len() != recent.len() {
            violations.push(format!(
                "turn {}: scene repeated within {NON_REPEAT_WINDOW} turns {recent:?}",
                state.turn_count
            ));
        }
    }
    violations
}

/// Play one run to completion with the configured strategy.
#[must_use]
pub fn run_simulation(catalog: &ContentCatalog, config: SimulationConfig) -> RunRecord {
    let mut session = GameSession::new(catalog.clone(), MemoryStore::new(), config.seed);
    let mut policy = config.strategy.create_policy(config.seed);
    let mut coin = ChaCha20Rng::seed_from_u64(config.seed ^ MINIGAME_SEED_SALT);
    let mut violations = Vec::new();
    let mut minigames_played = 0;
    let mut selection_picks = 0;
    let mut relaxed_picks = 0;
    let mut category_weight_share = BTreeMap::new();

    session.start();
    let status = loop {
        if session.state().turn_count >= config.max_turns {
            break RunStatus::TurnCap;
        }
        let Some(scene) = session.current_scene() else {
            violations.push(format!(
                "turn {}: no scene dealt on a live run",
                session.state().turn_count
            ));
            break RunStatus::Aborted;
        };
        let decision = policy.pick_choice(session.state(), scene);
        let Some(choice) = scene.choices.get(decision.choice_index) else {
            violations.push(format!(
                "{} picked missing choice {} on {}",
                policy.name(),
                decision.choice_index,
                scene.id
            ));
            break RunStatus::Aborted;
        };
        log::debug!(
            "turn {} | {} -> {} ({})",
            session.state().turn_count,
            scene.id,
            choice.id,
            decision.rationale.as_deref().unwrap_or("-")
        );
        let choice_id = choice.id.clone();
        let pool_before = session.state().selected_scenes.len();

        let mut outcome = match session.choose(&choice_id) {
            Ok(outcome) => outcome,
            Err(err) => {
                violations.push(format!("choice {choice_id} rejected: {err}"));
                break RunStatus::Aborted;
            }
        };
        if let TurnOutcome::Minigame { kind, difficulty } = outcome {
            minigames_played += 1;
            let won = coin.gen_bool(0.5);
            outcome = match session.complete_minigame(won, minigame_reward(kind, difficulty, won)) {
                Ok(outcome) => outcome,
                Err(err) => {
                    violations.push(format!("mini-game rejected: {err}"));
                    break RunStatus::Aborted;
                }
            };
        }

        if session.state().selected_scenes.len() > pool_before
            && let Some(trace) = session.last_selection()
        {
            selection_picks += 1;
            if trace.relaxed {
                relaxed_picks += 1;
            }
            record_selection(catalog, trace, &mut category_weight_share);
        }

        violations.extend(check_invariants(&session, catalog.scenes.len()));
        if matches!(outcome, TurnOutcome::Ended { .. }) {
            break RunStatus::Ended;
        }
    };

    let state = session.state();
    let ending = state.current_ending.as_ref();
    RunRecord {
        strategy: config.strategy,
        seed: config.seed,
        turns: state.turn_count,
        status,
        reason: state.termination_reason,
        ending_id: ending.map(|ending| ending.id.clone()),
        ending_type: ending.map(|ending| ending.kind),
        ending_rarity: ending.map(|ending| ending.rarity),
        final_stats: state.stats,
        final_score: state.composite_score,
        minigames_played,
        selection_picks,
        relaxed_picks,
        category_weight_share,
        violations,
    }
}

/// Run every strategy against every seed, `iterations` times each.
#[must_use]
pub fn run_batch(
    catalog: &ContentCatalog,
    strategies: &[GameplayStrategy],
    seeds: &[u64],
    iterations: usize,
    max_turns: u32,
) -> Vec<RunRecord> {
    let iterations = iterations.max(1);
    let mut records = Vec::with_capacity(strategies.len() * seeds.len() * iterations);
    for &strategy in strategies {
        for &seed in seeds {
            for iteration in 0..iterations {
                let offset = u64::try_from(iteration).unwrap_or(0);
                let config =
                    SimulationConfig::new(strategy, seed.wrapping_add(offset)).with_max_turns(max_turns);
                records.push(run_simulation(catalog, config));
            }
        }
    }
    records
}

#[derive(Debug, Clone, Default)]
struct RunningStats {
    count: u32,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn add(&mut self, value: f64) {
        self.count += 1;
        let count = f64::from(self.count);
        let delta = value - self.mean;
        self.mean += delta / count;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    const fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    fn std_dev(&self) -> f64 {
        if self.count > 1 {
            (self.m2 / f64::from(self.count - 1)).sqrt()
        } else {
            0.0
        }
    }
}

/// Per-strategy roll-up of simulated runs.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyAggregate {
    pub strategy: GameplayStrategy,
    pub runs: usize,
    pub mean_turns: f64,
    pub std_turns: f64,
    pub mean_score: f64,
    pub statuses: BTreeMap<String, usize>,
    pub ending_types: BTreeMap<String, usize>,
    pub reasons: BTreeMap<String, usize>,
    pub distinct_endings: usize,
    pub selection_picks: u32,
    pub relaxed_picks: u32,
    /// Mean share of candidate weight each category received per weighted pick.
    pub category_weight_share: BTreeMap<String, f64>,
    pub violations: usize,
}

#[must_use]
pub fn aggregate_runs(records: &[RunRecord]) -> Vec<StrategyAggregate> {
    let mut grouped: BTreeMap<GameplayStrategy, Vec<&RunRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.strategy).or_default().push(record);
    }

    grouped
        .into_iter()
        .map(|(strategy, runs)| {
            let mut turns = RunningStats::default();
            let mut score = RunningStats::default();
            let mut statuses = BTreeMap::new();
            let mut ending_types = BTreeMap::new();
            let mut reasons = BTreeMap::new();
            let mut endings = BTreeSet::new();
            let mut violations = 0;
            let mut selection_picks = 0;
            let mut relaxed_picks = 0;
            let mut category_weight_share: BTreeMap<String, f64> = BTreeMap::new();

            for run in &runs {
                turns.add(f64::from(run.turns));
                score.add(run.final_score);
                *statuses.entry(run.status.label().to_string()).or_insert(0) += 1;
                if let Some(kind) = run.ending_type {
                    *ending_types.entry(kind.as_str().to_string()).or_insert(0) += 1;
                }
                if let Some(reason) = run.reason {
                    *reasons.entry(reason.as_str().to_string()).or_insert(0) += 1;
                }
                if let Some(id) = &run.ending_id {
                    endings.insert(id.as_str());
                }
                violations += run.violations.len();
                selection_picks += run.selection_picks;
                relaxed_picks += run.relaxed_picks;
                for (category, share) in &run.category_weight_share {
                    *category_weight_share.entry(category.clone()).or_insert(0.0) += share;
                }
            }
            let weighted_picks = selection_picks - relaxed_picks;
            if weighted_picks > 0 {
                let picks = f64::from(weighted_picks);
                for share in category_weight_share.values_mut() {
                    *share /= picks;
                }
            }

            StrategyAggregate {
                strategy,
                runs: runs.len(),
                mean_turns: turns.mean(),
                std_turns: turns.std_dev(),
                mean_score: score.mean(),
                statuses,
                ending_types,
                reasons,
                distinct_endings: endings.len(),
                selection_picks,
                relaxed_picks,
                category_weight_share,
                violations,
            }
        })
        .collect()
}
