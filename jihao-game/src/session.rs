//! Session wrapper binding a run to its catalog, RNG and persistence.
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::collection::EndingCollection;
use crate::data::{ContentCatalog, Ending, MinigameType, Scene};
use crate::endings::TerminationReason;
use crate::engine::MinigameReward;
use crate::persistence::{KeyValueStore, SaveConfig, SaveManager};
use crate::reducer::{GameAction, reduce, reduce_traced};
use crate::state::{GameState, MinigameOutcome};
use crate::stats::StatKey;
use crate::trace::SelectionTrace;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("the run is over")]
    GameOver,
    #[error("no scene is available")]
    NoScene,
    #[error("scene `{scene}` has no choice `{choice}`")]
    UnknownChoice { scene: String, choice: String },
    #[error("a mini-game is waiting for its result")]
    MinigamePending,
    #[error("no mini-game is waiting for a result")]
    NoPendingMinigame,
}

/// Mini-game launched by a choice, waiting for its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMinigame {
    #[serde(rename = "type")]
    pub kind: MinigameType,
    pub difficulty: u32,
    pub scene: Scene,
}

/// What a player action led to.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Continue,
    Minigame { kind: MinigameType, difficulty: u32 },
    Ended {
        reason: TerminationReason,
        ending: Option<Ending>,
    },
}

/// High-level session wrapper owning state, content, RNG and storage.
///
/// Every transition goes through [`reduce`]. Runs in progress are auto-saved
/// after each transition; a finished run clears the save and records its
/// ending in the collection.
#[derive(Debug)]
pub struct GameSession<S: KeyValueStore + Clone> {
    catalog: ContentCatalog,
    state: GameState,
    rng: ChaCha20Rng,
    seed: u64,
    saves: SaveManager<S>,
    collection: EndingCollection<S>,
    pending: Option<PendingMinigame>,
    last_selection: Option<SelectionTrace>,
}

impl<S: KeyValueStore + Clone> GameSession<S> {
    /// Construct a session with a deterministic RNG seeded from `seed`.
    pub fn new(catalog: ContentCatalog, store: S, seed: u64) -> Self {
        Self::with_config(catalog, store, SaveConfig::default(), seed)
    }

    /// Construct a session seeded from the thread RNG.
    pub fn with_random_seed(catalog: ContentCatalog, store: S) -> Self {
        Self::new(catalog, store, rand::random())
    }

    pub fn with_config(catalog: ContentCatalog, store: S, config: SaveConfig, seed: u64) -> Self {
        let collection = EndingCollection::with_key(store.clone(), config.endings_key.clone());
        Self {
            catalog,
            state: GameState::default(),
            rng: ChaCha20Rng::seed_from_u64(seed),
            seed,
            saves: SaveManager::with_config(store, config),
            collection,
            pending: None,
            last_selection: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    #[must_use]
    pub const fn catalog(&self) -> &ContentCatalog {
        &self.catalog
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub const fn pending_minigame(&self) -> Option<&PendingMinigame> {
        self.pending.as_ref()
    }

    #[must_use]
    pub const fn collection(&self) -> &EndingCollection<S> {
        &self.collection
    }

    #[must_use]
    pub const fn saves(&self) -> &SaveManager<S> {
        &self.saves
    }

    /// Weight breakdown of the most recent scene pick that refilled the pool.
    #[must_use]
    pub const fn last_selection(&self) -> Option<&SelectionTrace> {
        self.last_selection.as_ref()
    }

    #[must_use]
    pub fn current_scene(&self) -> Option<&Scene> {
        self.state.current_scene()
    }

    /// Deterministically reseed the session RNG.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = ChaCha20Rng::seed_from_u64(seed);
    }

    fn dispatch(&mut self, action: GameAction) {
        let (state, trace) = reduce_traced(&self.state, action, &self.catalog, &mut self.rng);
        self.state = state;
        if trace.is_some() {
            self.last_selection = trace;
        }
        self.persist();
    }

    fn persist(&self) {
        if self.state.is_game_over {
            self.saves.clear_save();
            if let Some(ending) = &self.state.current_ending {
                self.collection.save_unlocked(ending);
            }
        } else if self.state.has_started() {
            self.saves.save_game(&self.state);
        }
    }

    fn outcome(&self) -> TurnOutcome {
        match self.state.termination_reason {
            Some(reason) if self.state.is_game_over => TurnOutcome::Ended {
                reason,
                ending: self.state.current_ending.clone(),
            },
            _ => TurnOutcome::Continue,
        }
    }

    /// Begin a new run, discarding any saved one.
    pub fn start(&mut self) {
        self.saves.clear_save();
        self.pending = None;
        self.last_selection = None;
        self.dispatch(GameAction::StartGame);
    }

    /// Play `choice_id` on the current scene.
    ///
    /// A choice that triggers the scene's mini-game does not apply its own
    /// effects; the turn completes through [`GameSession::complete_minigame`].
    ///
    /// # Errors
    ///
    /// Returns an error if the run is over, a mini-game is pending, there is
    /// no current scene, or the scene has no such choice.
    pub fn choose(&mut self, choice_id: &str) -> Result<TurnOutcome, SessionError> {
        if self.state.is_game_over {
            return Err(SessionError::GameOver);
        }
        if self.pending.is_some() {
            return Err(SessionError::MinigamePending);
        }
        let scene = self.current_scene().ok_or(SessionError::NoScene)?.clone();
        let choice = scene
            .choice(choice_id)
            .ok_or_else(|| SessionError::UnknownChoice {
                scene: scene.id.clone(),
                choice: choice_id.to_string(),
            })?
            .clone();

        if choice.trigger_minigame
            && let Some(config) = scene.minigame
        {
            self.pending = Some(PendingMinigame {
                kind: config.kind,
                difficulty: config.difficulty,
                scene,
            });
            return Ok(TurnOutcome::Minigame {
                kind: config.kind,
                difficulty: config.difficulty,
            });
        }

        self.dispatch(GameAction::MakeChoice { choice, scene });
        Ok(self.outcome())
    }

    /// Report the pending mini-game's result and finish its turn.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoPendingMinigame`] if no mini-game is running.
    pub fn complete_minigame(
        &mut self,
        won: bool,
        reward: MinigameReward,
    ) -> Result<TurnOutcome, SessionError> {
        let pending = self.pending.take().ok_or(SessionError::NoPendingMinigame)?;
        self.dispatch(GameAction::CompleteMinigame {
            scene: pending.scene,
            outcome: MinigameOutcome::from_won(won),
            reward,
        });
        Ok(self.outcome())
    }

    pub fn apply_stat_change(&mut self, stat: StatKey, change: i32) {
        self.dispatch(GameAction::ApplyStatChange { stat, change });
    }

    /// Resume the saved run. Returns `false` when no usable save exists.
    pub fn restore(&mut self) -> bool {
        let Some(saved) = self.saves.load_game() else {
            return false;
        };
        self.pending = None;
        self.dispatch(GameAction::RestoreSave(Box::new(saved.state)));
        true
    }

    #[must_use]
    pub fn has_saved_game(&self) -> bool {
        self.saves.has_saved_game()
    }

    /// Abandon the run and clear its save.
    pub fn reset(&mut self) {
        self.pending = None;
        self.last_selection = None;
        self.saves.clear_save();
        self.state = reduce(&self.state, GameAction::Reset, &self.catalog, &mut self.rng);
    }

    /// Consume the session, returning the underlying game state.
    #[must_use]
    pub fn into_state(self) -> GameState {
        self.state
    }
}
