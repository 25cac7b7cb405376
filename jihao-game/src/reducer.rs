//! Single transition function from (state, action) to the next state.
use rand::Rng;

use crate::constants::{DEFAULT_MIN_MINIGAMES, INITIAL_SCENE_COUNT, POOL_REFILL_MARGIN};
use crate::data::{Choice, ContentCatalog, Scene};
use crate::endings::check_termination;
use crate::engine::{
    MinigameReward, apply_choice, apply_stat_change, complete_minigame, composite_score,
};
use crate::selector::{select_next_scene, select_scenes_for_game};
use crate::state::{GameState, MinigameOutcome, init_game};
use crate::stats::StatKey;
use crate::trace::SelectionTrace;

/// Everything that can happen to a run.
#[derive(Debug, Clone, PartialEq)]
pub enum GameAction {
    StartGame,
    MakeChoice {
        choice: Choice,
        scene: Scene,
    },
    CompleteMinigame {
        scene: Scene,
        outcome: MinigameOutcome,
        reward: MinigameReward,
    },
    ApplyStatChange {
        stat: StatKey,
        change: i32,
    },
    RestoreSave(Box<GameState>),
    AddNextScene(Scene),
    Reset,
}

/// Resolve termination for a freshly played turn, or top up the scene pool.
///
/// The pool is the log of scenes dealt so far, so a refill may repeat an id
/// played earlier; the selector's recency window keeps repeats apart.
fn finish_turn<R: Rng + ?Sized>(
    mut next: GameState,
    catalog: &ContentCatalog,
    rng: &mut R,
) -> (GameState, Option<SelectionTrace>) {
    if let Some(termination) = check_termination(&next, &catalog.endings, rng) {
        next.is_game_over = true;
        next.current_ending = termination.ending;
        next.termination_reason = Some(termination.reason);
        return (next, None);
    }

    if next.current_scene.saturating_add(POOL_REFILL_MARGIN) >= next.selected_scenes.len()
        && let Some((scene, trace)) = select_next_scene(&next, &catalog.scenes, rng)
    {
        next.selected_scenes.push(scene.clone());
        return (next, Some(trace));
    }
    (next, None)
}

fn add_scene(state: &GameState, scene: Scene) -> GameState {
    if state.has_scene(&scene.id) {
        return state.clone();
    }
    let mut next = state.clone();
    next.selected_scenes.push(scene);
    next
}

/// Apply `action` to `state`.
///
/// Turns played against a finished run are ignored.
pub fn reduce<R: Rng + ?Sized>(
    state: &GameState,
    action: GameAction,
    catalog: &ContentCatalog,
    rng: &mut R,
) -> GameState {
    reduce_traced(state, action, catalog, rng).0
}

/// [`reduce`], also returning the trace of the scene pick made to refill the
/// pool, if the transition made one.
pub fn reduce_traced<R: Rng + ?Sized>(
    state: &GameState,
    action: GameAction,
    catalog: &ContentCatalog,
    rng: &mut R,
) -> (GameState, Option<SelectionTrace>) {
    match action {
        GameAction::StartGame => (
            init_game(select_scenes_for_game(
                &catalog.scenes,
                INITIAL_SCENE_COUNT,
                DEFAULT_MIN_MINIGAMES,
                rng,
            )),
            None,
        ),
        GameAction::MakeChoice { .. } | GameAction::CompleteMinigame { .. }
            if state.is_game_over =>
        {
            log::debug!("ignoring turn on finished run");
            (state.clone(), None)
        }
        GameAction::MakeChoice { choice, scene } => {
            finish_turn(apply_choice(state, &choice, &scene), catalog, rng)
        }
        GameAction::CompleteMinigame {
            scene,
            outcome,
            reward,
        } => finish_turn(
            complete_minigame(state, &scene, outcome, &reward),
            catalog,
            rng,
        ),
        GameAction::ApplyStatChange { stat, change } => {
            (apply_stat_change(state, stat, change), None)
        }
        GameAction::RestoreSave(saved) => {
            let mut restored = *saved;
            restored.composite_score = composite_score(&restored.stats, &restored.flags);
            (restored, None)
        }
        GameAction::AddNextScene(scene) => (add_scene(state, scene), None),
        GameAction::Reset => (GameState::default(), None),
    }
}
