//! Scene selection: the opening batch and the weighted pick for each later turn.
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, HashSet};

use crate::constants::{
    CATEGORY_DIVERSITY_BONUS, DEFAULT_EXPANSION_BATCH, DIFFICULTY_START_TURN,
    DIFFICULTY_TURN_DIVISOR, HIGH_STAKES_DAMPING, HIGH_STAKES_DELTA, MIN_SCENE_WEIGHT,
    MINIGAME_BONUS, MINIGAME_BONUS_CHANCE, NEXT_SCENE_POOL_ID, OVERREPRESENTED_PENALTY,
    OVERREPRESENTED_RATIO, RECENT_CATEGORY_WINDOW, RECENT_SCENE_WINDOW, RELEVANCE_WEIGHT,
    STRONG_STAT_CHALLENGE, STRONG_STAT_THRESHOLD, UNDERREPRESENTED_BONUS,
    UNDERREPRESENTED_RATIO, WEAK_STAT_RELEVANCE_SCALE, WEAK_STAT_THRESHOLD,
};
use crate::data::{Effect, Scene, SceneCategory};
use crate::numbers::usize_to_f64;
use crate::state::{GameState, HistoryEntry};
use crate::stats::Stats;
use crate::trace::{SelectionTrace, WeightFactor, WeightedCandidate};

/// Pick the opening batch of scenes for a run.
///
/// Mini-game scenes come first up to `min_minigames`, then one scene per
/// category in shuffled category order, then random fill. The combined batch
/// is shuffled again. Returns fewer than `count` scenes only when the pool
/// itself is smaller.
pub fn select_scenes_for_game<R: Rng + ?Sized>(
    all_scenes: &[Scene],
    count: usize,
    min_minigames: usize,
    rng: &mut R,
) -> Vec<Scene> {
    let mut selected: Vec<&Scene> = Vec::with_capacity(count.min(all_scenes.len()));
    let mut taken: HashSet<&str> = HashSet::new();

    let mut minigames: Vec<&Scene> = all_scenes
        .iter()
        .filter(|scene| scene.minigame.is_some())
        .collect();
    minigames.shuffle(rng);
    for scene in minigames {
        if selected.len() >= min_minigames || selected.len() >= count {
            break;
        }
        if taken.insert(scene.id.as_str()) {
            selected.push(scene);
        }
    }

    let mut by_category: BTreeMap<SceneCategory, Vec<&Scene>> = BTreeMap::new();
    for scene in all_scenes
        .iter()
        .filter(|scene| !taken.contains(scene.id.as_str()))
    {
        by_category.entry(scene.category).or_default().push(scene);
    }
    let mut categories = SceneCategory::ALL;
    categories.shuffle(rng);
    for category in categories {
        if selected.len() >= count {
            break;
        }
        let Some(pool) = by_category.get(&category) else {
            continue;
        };
        if let Some(scene) = pool.choose(rng).copied()
            && taken.insert(scene.id.as_str())
        {
            selected.push(scene);
        }
    }

    if selected.len() < count {
        let mut remaining: Vec<&Scene> = all_scenes
            .iter()
            .filter(|scene| !taken.contains(scene.id.as_str()))
            .collect();
        remaining.shuffle(rng);
        for scene in remaining {
            if selected.len() >= count {
                break;
            }
            if taken.insert(scene.id.as_str()) {
                selected.push(scene);
            }
        }
    }

    selected.shuffle(rng);
    selected.into_iter().cloned().collect()
}

/// How much a scene's choices could lift weak stats or test strong ones.
#[must_use]
pub fn stat_relevance(scene: &Scene, stats: &Stats) -> f64 {
    scene
        .effects()
        .filter_map(|effect| match effect {
            Effect::Stat { stat, change } => stat.key().map(|key| (stats.get(key), *change)),
            Effect::Flag { .. } => None,
        })
        .map(|(value, change)| {
            let mut relevance = 0.0;
            if value < WEAK_STAT_THRESHOLD && change > 0 {
                relevance += f64::from(WEAK_STAT_THRESHOLD - value)
                    * WEAK_STAT_RELEVANCE_SCALE
                    * f64::from(change);
            }
            if value > STRONG_STAT_THRESHOLD && change < 0 {
                relevance += STRONG_STAT_CHALLENGE;
            }
            relevance
        })
        .sum()
}

/// Any choice with a stat swing of at least the high-stakes delta.
#[must_use]
pub fn is_high_stakes(scene: &Scene) -> bool {
    scene
        .effects()
        .filter_map(Effect::change)
        .any(|change| change.saturating_abs() >= HIGH_STAKES_DELTA)
}

/// Bonus for categories absent from the recent window.
#[must_use]
pub fn category_diversity_factor(scene: &Scene, recent_categories: &[SceneCategory]) -> f64 {
    if recent_categories.contains(&scene.category) {
        1.0
    } else {
        CATEGORY_DIVERSITY_BONUS
    }
}

#[must_use]
pub fn relevance_factor(scene: &Scene, stats: &Stats) -> f64 {
    stat_relevance(scene, stats).mul_add(RELEVANCE_WEIGHT, 1.0)
}

/// Scaling applied to high-stakes scenes once the run is past the opening turns.
#[must_use]
pub fn difficulty_factor(scene: &Scene, turn_count: u32) -> f64 {
    if turn_count > DIFFICULTY_START_TURN && is_high_stakes(scene) {
        (1.0 + f64::from(turn_count) / DIFFICULTY_TURN_DIVISOR) * HIGH_STAKES_DAMPING
    } else {
        1.0
    }
}

/// Occasional bonus for mini-game scenes. Draws only for scenes that carry one.
pub fn minigame_factor<R: Rng + ?Sized>(scene: &Scene, rng: &mut R) -> f64 {
    if scene.minigame.is_some() && rng.gen_bool(MINIGAME_BONUS_CHANCE) {
        MINIGAME_BONUS
    } else {
        1.0
    }
}

/// Rebalance categories by their share of the whole history.
#[must_use]
pub fn rotation_factor(scene: &Scene, history: &[HistoryEntry]) -> f64 {
    let played = history
        .iter()
        .filter(|entry| entry.scene_category == scene.category)
        .count();
    let ratio = usize_to_f64(played) / usize_to_f64(history.len().max(1));
    if ratio < UNDERREPRESENTED_RATIO {
        UNDERREPRESENTED_BONUS
    } else if ratio > OVERREPRESENTED_RATIO {
        OVERREPRESENTED_PENALTY
    } else {
        1.0
    }
}

/// Cumulative-weight draw over `weights`.
///
/// Returns the chosen index and the roll. Falls back to the last index when
/// rounding leaves the roll past the final bucket.
pub fn choose_weighted<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Option<(usize, f64)> {
    let total: f64 = weights.iter().sum();
    if weights.is_empty() || !total.is_finite() || total <= 0.0 {
        return None;
    }

    let roll = rng.gen_range(0.0..total);
    let mut remaining = roll;
    for (idx, weight) in weights.iter().enumerate() {
        remaining -= weight;
        if remaining <= 0.0 {
            return Some((idx, roll));
        }
    }
    Some((weights.len() - 1, roll))
}

fn weigh_candidate<R: Rng + ?Sized>(
    scene: &Scene,
    state: &GameState,
    recent_categories: &[SceneCategory],
    rng: &mut R,
) -> WeightedCandidate {
    let multipliers = vec![
        WeightFactor::new(
            "category_diversity",
            category_diversity_factor(scene, recent_categories),
        ),
        WeightFactor::new("stat_relevance", relevance_factor(scene, &state.stats)),
        WeightFactor::new("difficulty", difficulty_factor(scene, state.turn_count)),
        WeightFactor::new("minigame", minigame_factor(scene, rng)),
        WeightFactor::new("rotation", rotation_factor(scene, &state.scene_history)),
    ];
    let base_weight = 1.0;
    let product: f64 = multipliers.iter().map(|factor| factor.value).product();
    WeightedCandidate {
        id: scene.id.clone(),
        base_weight,
        multipliers,
        final_weight: (base_weight * product).max(MIN_SCENE_WEIGHT),
    }
}

/// Weighted pick of the next scene for a running game.
///
/// Scenes from the last few turns, and scenes already queued in the pool, are
/// excluded; when that leaves nothing the
/// pick relaxes to a uniform draw over every scene. Returns `None` only for an
/// empty scene list.
pub fn select_next_scene<'a, R: Rng + ?Sized>(
    state: &GameState,
    all_scenes: &'a [Scene],
    rng: &mut R,
) -> Option<(&'a Scene, SelectionTrace)> {
    let recent_ids: HashSet<&str> = state
        .recent_scene_ids(RECENT_SCENE_WINDOW)
        .chain(state.queued_scene_ids())
        .collect();
    let recent_categories: Vec<SceneCategory> =
        state.recent_categories(RECENT_CATEGORY_WINDOW).collect();

    let candidates: Vec<&Scene> = all_scenes
        .iter()
        .filter(|scene| !recent_ids.contains(scene.id.as_str()))
        .collect();

    if candidates.is_empty() {
        let scene = all_scenes.choose(rng)?;
        log::debug!(
            "scene pool exhausted by recency window; relaxed pick {}",
            scene.id
        );
        let trace = SelectionTrace {
            pool_id: String::from(NEXT_SCENE_POOL_ID),
            roll: 0.0,
            candidates: Vec::new(),
            chosen_id: scene.id.clone(),
            relaxed: true,
        };
        return Some((scene, trace));
    }

    let weighted: Vec<WeightedCandidate> = candidates
        .iter()
        .map(|scene| weigh_candidate(scene, state, &recent_categories, rng))
        .collect();
    let weights: Vec<f64> = weighted.iter().map(|c| c.final_weight).collect();
    let (idx, roll) = choose_weighted(&weights, rng)?;
    let chosen = candidates.get(idx).copied()?;

    log::debug!(
        "next scene turn {} | candidates:{} roll:{roll:.3} -> {}",
        state.turn_count,
        candidates.len(),
        chosen.id
    );

    let trace = SelectionTrace {
        pool_id: String::from(NEXT_SCENE_POOL_ID),
        roll,
        candidates: weighted,
        chosen_id: chosen.id.clone(),
        relaxed: false,
    };
    Some((chosen, trace))
}

/// Append a fresh category-diverse batch plus the dynamically chosen next
/// scene to `current`, skipping ids already present.
pub fn expand_scene_pool<R: Rng + ?Sized>(
    current: &[Scene],
    all_scenes: &[Scene],
    state: &GameState,
    batch_size: usize,
    rng: &mut R,
) -> Vec<Scene> {
    let known: HashSet<&str> = current.iter().map(|scene| scene.id.as_str()).collect();
    let unseen: Vec<Scene> = all_scenes
        .iter()
        .filter(|scene| !known.contains(scene.id.as_str()))
        .cloned()
        .collect();
    let mut fresh = select_scenes_for_game(&unseen, batch_size, 0, rng);

    if let Some((next, _)) = select_next_scene(state, all_scenes, rng)
        && !known.contains(next.id.as_str())
        && !fresh.iter().any(|scene| scene.id == next.id)
    {
        fresh.push(next.clone());
    }

    let mut pool = current.to_vec();
    pool.extend(fresh);
    pool
}

/// [`expand_scene_pool`] with the default batch size.
pub fn expand_scene_pool_default<R: Rng + ?Sized>(
    current: &[Scene],
    all_scenes: &[Scene],
    state: &GameState,
    rng: &mut R,
) -> Vec<Scene> {
    expand_scene_pool(current, all_scenes, state, DEFAULT_EXPANSION_BATCH, rng)
}
